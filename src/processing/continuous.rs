use std::path::Path;

use cgmath::{MetricSpace, Vector3, Zero};
use image::RgbaImage;
use tracing::{debug, instrument, warn};

use super::color::Color;
use super::decode::decode_rgba8_apply_exif;
use super::formation::{Formation, Target};
use crate::config::{SamplerOptions, YAxis};
use crate::error::Error;

/// Per-pixel sampler for logos that should not snap to a grid.
#[derive(Debug, Clone, Copy)]
pub struct ContinuousSampler {
    pub resolution: u32,
    pub alpha_threshold: f32,
    pub logo_scale: f32,
    pub min_distance: f32,
    pub optimize: bool,
    pub y_axis: YAxis,
}

impl From<&SamplerOptions> for ContinuousSampler {
    fn from(opts: &SamplerOptions) -> Self {
        Self {
            resolution: opts.continuous.sampling_resolution,
            alpha_threshold: opts.alpha_threshold,
            logo_scale: opts.logo_scale,
            min_distance: opts.continuous.min_distance,
            optimize: opts.continuous.optimize,
            y_axis: opts.y_axis,
        }
    }
}

impl ContinuousSampler {
    #[instrument(skip(self), fields(path = %path.display()))]
    pub fn sample_file(&self, path: &Path) -> Result<Formation, Error> {
        let img = decode_rgba8_apply_exif(path)?;
        self.sample(&img)
    }

    pub fn sample(&self, img: &RgbaImage) -> Result<Formation, Error> {
        let candidates = self.candidates(img);
        let found = candidates.len();
        let mut targets = if self.optimize {
            filter_overlaps(candidates, self.min_distance)
        } else {
            candidates
        };
        if targets.is_empty() {
            warn!("no pixel cleared the alpha threshold; falling back to the origin");
            targets.push(Target {
                position: Vector3::zero(),
                color: Color {
                    r: 1.0,
                    g: 1.0,
                    b: 1.0,
                    a: 1.0,
                },
            });
        }
        debug!(found, kept = targets.len(), "sampled continuous positions");
        Formation::new(targets, self.logo_scale / self.resolution.max(1) as f32)
    }

    /// Candidate targets in row-major order.
    pub fn candidates(&self, img: &RgbaImage) -> Vec<Target> {
        let (w, h) = img.dimensions();
        if w == 0 || h == 0 {
            return Vec::new();
        }
        let resolution = self.resolution.max(1);
        let step_x = (w / resolution).max(1) as usize;
        let step_y = (h / resolution).max(1) as usize;
        let aspect = w as f32 / h as f32;
        let (logo_w, logo_h) = if aspect >= 1.0 {
            (self.logo_scale, self.logo_scale / aspect)
        } else {
            (self.logo_scale * aspect, self.logo_scale)
        };
        let (wf, hf) = (w as f32, h as f32);

        let mut out = Vec::new();
        for y in (0..h).step_by(step_y) {
            for x in (0..w).step_by(step_x) {
                let color = Color::from_rgba8(img.get_pixel(x, y));
                if color.a <= self.alpha_threshold {
                    continue;
                }
                let world_x = (x as f32 - wf / 2.0) / wf * logo_w;
                let world_y = match self.y_axis {
                    YAxis::Upright => (hf / 2.0 - y as f32) / hf * logo_h,
                    YAxis::Raw => (y as f32 - hf / 2.0) / hf * logo_h,
                };
                out.push(Target {
                    position: Vector3::new(world_x, world_y, 0.0),
                    color,
                });
            }
        }
        out
    }
}

/// Greedy minimum-distance filter.
///
/// Keeps a candidate only when it is at least `min_distance` away from every
/// candidate kept before it. Order is preserved; rejected candidates are gone.
pub fn filter_overlaps(candidates: Vec<Target>, min_distance: f32) -> Vec<Target> {
    let mut accepted: Vec<Target> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let clear = accepted
            .iter()
            .all(|kept| kept.position.distance(candidate.position) >= min_distance);
        if clear {
            accepted.push(candidate);
        }
    }
    accepted
}
