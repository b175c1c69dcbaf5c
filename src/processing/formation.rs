use cgmath::Vector3;
use serde::Serialize;

use super::color::Color;
use crate::error::Error;

/// One slot of the mosaic: where a photo ends up and the colour it stands for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Target {
    pub position: Vector3<f32>,
    pub color: Color,
}

/// Ordered target slots produced by either sampler.
///
/// The index into `targets` is the slot index photos are assigned to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Formation {
    pub targets: Vec<Target>,
    pub cell_size: f32,
}

impl Formation {
    pub fn new(targets: Vec<Target>, cell_size: f32) -> Result<Self, Error> {
        if targets.is_empty() {
            return Err(Error::EmptyResultSet("logo sampling"));
        }
        Ok(Self { targets, cell_size })
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn position(&self, slot: usize) -> Option<Vector3<f32>> {
        self.targets.get(slot).map(|t| t.position)
    }
}
