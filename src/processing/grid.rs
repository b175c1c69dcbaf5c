use std::path::Path;

use cgmath::Vector3;
use image::RgbaImage;
use serde::Serialize;
use tracing::{debug, instrument};

use super::color::{Color, average_region};
use super::decode::decode_rgba8_apply_exif;
use super::formation::{Formation, Target};
use crate::config::{SamplerOptions, YAxis};
use crate::error::Error;

/// A cell whose average alpha cleared the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GridCell {
    pub grid_x: u32,
    /// Row index counted from the top of the source image.
    pub grid_y: u32,
    pub position: Vector3<f32>,
    pub color: Color,
}

/// Valid cells of a sampled logo, row-major by `grid_y` then `grid_x`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Grid {
    pub cols: u32,
    pub rows: u32,
    pub cell_size: f32,
    pub cells: Vec<GridCell>,
}

impl Grid {
    pub fn formation(&self) -> Result<Formation, Error> {
        let targets = self
            .cells
            .iter()
            .map(|c| Target {
                position: c.position,
                color: c.color,
            })
            .collect();
        Formation::new(targets, self.cell_size)
    }
}

/// Column and row counts for an image of `width × height` at `resolution`
/// cells along its longest side.
pub fn grid_dimensions(width: u32, height: u32, resolution: u32) -> (u32, u32) {
    let resolution = resolution.max(1);
    let aspect = width.max(1) as f32 / height.max(1) as f32;
    let (cols, rows) = if aspect >= 1.0 {
        (resolution, (resolution as f32 / aspect).round_ties_even() as u32)
    } else {
        ((resolution as f32 * aspect).round_ties_even() as u32, resolution)
    };
    (cols.max(1), rows.max(1))
}

#[derive(Debug, Clone, Copy)]
pub struct GridSampler {
    pub resolution: u32,
    pub alpha_threshold: f32,
    pub logo_scale: f32,
    pub y_axis: YAxis,
}

impl From<&SamplerOptions> for GridSampler {
    fn from(opts: &SamplerOptions) -> Self {
        Self {
            resolution: opts.grid_resolution,
            alpha_threshold: opts.alpha_threshold,
            logo_scale: opts.logo_scale,
            y_axis: opts.y_axis,
        }
    }
}

impl GridSampler {
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn sample_file(&self, path: &Path) -> Result<Grid, Error> {
        let img = decode_rgba8_apply_exif(path)?;
        Ok(self.sample(&img))
    }

    pub fn sample(&self, img: &RgbaImage) -> Grid {
        let (w, h) = img.dimensions();
        let (cols, rows) = grid_dimensions(w, h, self.resolution);
        let cell_size = self.logo_scale / cols.max(rows) as f32;
        let offset_x = (cols - 1) as f32 * cell_size / 2.0;
        let offset_y = (rows - 1) as f32 * cell_size / 2.0;

        let mut cells = Vec::new();
        for gy in 0..rows {
            let (y0, y1) = cell_span(gy, rows, h);
            for gx in 0..cols {
                let (x0, x1) = cell_span(gx, cols, w);
                let color = average_region(img, x0, y0, x1, y1);
                if color.a <= self.alpha_threshold {
                    continue;
                }
                let world_x = gx as f32 * cell_size - offset_x;
                let world_y = match self.y_axis {
                    YAxis::Upright => offset_y - gy as f32 * cell_size,
                    YAxis::Raw => gy as f32 * cell_size - offset_y,
                };
                cells.push(GridCell {
                    grid_x: gx,
                    grid_y: gy,
                    position: Vector3::new(world_x, world_y, 0.0),
                    color,
                });
            }
        }
        debug!(cols, rows, cell_size, valid = cells.len(), "sampled logo grid");
        Grid {
            cols,
            rows,
            cell_size,
            cells,
        }
    }
}

/// Pixel range `[start, end)` covered by cell `index` of `count` along an
/// axis of `dim` pixels.
fn cell_span(index: u32, count: u32, dim: u32) -> (u32, u32) {
    if dim == 0 {
        return (0, 0);
    }
    let start = (u64::from(index) * u64::from(dim) / u64::from(count)) as u32;
    let end = (u64::from(index + 1) * u64::from(dim) / u64::from(count)) as u32;
    (start.min(dim - 1), end.min(dim))
}
