//! Assigning photos to formation slots and flying them in.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use cgmath::Vector3;
use rand::Rng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use super::animation::{Countdown, Pose};
use super::photo::{PhotoPhase, PlacedPhoto};
use crate::cache::PhotoTexture;
use crate::config::{PlacementMode, PlacementOptions, StageBounds};
use crate::library::PhotoQueue;
use crate::processing::formation::Formation;

/// Stage edge a photo enters from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Left,
    Right,
    Top,
    Bottom,
}

impl Edge {
    pub const ALL: [Edge; 4] = [Edge::Left, Edge::Right, Edge::Top, Edge::Bottom];

    pub fn random(rng: &mut impl Rng) -> Self {
        Self::ALL[rng.random_range(0..Self::ALL.len())]
    }
}

/// A point just outside `edge` of the stage, uniform along the edge.
pub fn spawn_point(
    edge: Edge,
    stage: &StageBounds,
    start_distance: f32,
    rng: &mut impl Rng,
) -> Vector3<f32> {
    let (hw, hh) = (stage.half_width, stage.half_height);
    let along_x = rng.random_range(-hw..=hw);
    let along_y = rng.random_range(-hh..=hh);
    match edge {
        Edge::Left => Vector3::new(-(hw + start_distance), along_y, 0.0),
        Edge::Right => Vector3::new(hw + start_distance, along_y, 0.0),
        Edge::Top => Vector3::new(along_x, hh + start_distance, 0.0),
        Edge::Bottom => Vector3::new(along_x, -(hh + start_distance), 0.0),
    }
}

/// Scale a placed photo is drawn at, never below the minimum footprint.
pub fn display_size(opts: &PlacementOptions, cell_size: f32) -> f32 {
    let size = if opts.fit_to_grid_cell {
        cell_size * opts.scale_padding
    } else {
        opts.display_size * opts.display_scale
    };
    size.max(opts.min_display_size)
}

#[derive(Debug)]
struct PendingPhoto {
    path: PathBuf,
    texture: Option<Arc<PhotoTexture>>,
}

/// Everything a placement step reads or writes besides its own state.
pub struct PlacementContext<'a> {
    pub formation: &'a Formation,
    pub opts: &'a PlacementOptions,
    pub stage: &'a StageBounds,
    pub queue: &'a mut PhotoQueue,
    pub photos: &'a mut Vec<PlacedPhoto>,
    pub rng: &'a mut StdRng,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementProgress {
    Running,
    Complete,
}

/// An in-progress placement.
///
/// Photos are drawn from the queue ahead of the slots they will fill, at most
/// two launches' worth, and requested from the loader. A launch fires once the
/// photos it needs have all arrived and the launch interval has passed.
#[derive(Debug)]
pub struct PlacementRun {
    mode: PlacementMode,
    slots: VecDeque<usize>,
    pending: VecDeque<PendingPhoto>,
    requests: Vec<PathBuf>,
    launch_timer: Countdown,
    completion: Option<Countdown>,
    launches: usize,
}

impl PlacementRun {
    pub fn new(
        formation: &Formation,
        opts: &PlacementOptions,
        queue: &mut PhotoQueue,
        rng: &mut StdRng,
    ) -> Self {
        let mut slots: Vec<usize> = (0..formation.len()).collect();
        if opts.randomize_sequence {
            slots.shuffle(rng);
        }
        let mut run = Self {
            mode: opts.mode,
            slots: slots.into(),
            pending: VecDeque::new(),
            requests: Vec::new(),
            launch_timer: Countdown::new(Duration::ZERO),
            completion: None,
            launches: 0,
        };
        run.top_up(opts, queue);
        info!(
            slots = run.slots.len(),
            mode = ?opts.mode,
            "placement started"
        );
        run
    }

    pub fn remaining_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn launches(&self) -> usize {
        self.launches
    }

    pub fn take_requests(&mut self) -> Vec<PathBuf> {
        std::mem::take(&mut self.requests)
    }

    /// Photos drawn but not launched yet.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Attach a decoded texture to every pending entry waiting for it.
    pub fn texture_ready(&mut self, texture: &Arc<PhotoTexture>) -> bool {
        let mut used = false;
        for p in self.pending.iter_mut().filter(|p| p.path == texture.path) {
            if p.texture.is_none() {
                p.texture = Some(Arc::clone(texture));
                used = true;
            }
        }
        used
    }

    /// Drop a photo that will never load and draw replacements.
    pub fn photo_failed(&mut self, path: &Path, opts: &PlacementOptions, queue: &mut PhotoQueue) {
        let before = self.pending.len();
        self.pending.retain(|p| p.path != path);
        queue.remove(path);
        warn!(
            path = %path.display(),
            dropped = before - self.pending.len(),
            "skipping photo that failed to load"
        );
        self.top_up(opts, queue);
    }

    /// Advance by `dt`: launch what is ready, then check for completion.
    pub fn step(&mut self, dt: f32, ctx: &mut PlacementContext<'_>) -> PlacementProgress {
        self.launch_timer.tick(dt);
        if !self.slots.is_empty() && self.launch_timer.is_done() {
            self.try_launch(ctx);
        }

        if !self.slots.is_empty() && self.pending.is_empty() && ctx.queue.is_empty() {
            warn!(
                unfilled = self.slots.len(),
                "no loadable photos left; finishing with a partial mosaic"
            );
            self.slots.clear();
        }

        if !self.slots.is_empty() || ctx.photos.iter().any(PlacedPhoto::is_moving) {
            return PlacementProgress::Running;
        }
        let pause = self
            .completion
            .get_or_insert_with(|| Countdown::new(ctx.opts.completion_pause));
        if pause.tick(dt) {
            info!(placed = ctx.photos.len(), "formation complete");
            PlacementProgress::Complete
        } else {
            PlacementProgress::Running
        }
    }

    fn batch_size(&self, opts: &PlacementOptions) -> usize {
        match self.mode {
            PlacementMode::Burst => opts.images_per_burst.max(1),
            PlacementMode::Sequential => 1,
            PlacementMode::Instant => self.slots.len().max(1),
        }
    }

    fn lookahead(&self, opts: &PlacementOptions) -> usize {
        match self.mode {
            PlacementMode::Instant => self.slots.len(),
            _ => opts.images_per_burst.max(1) * 2,
        }
    }

    fn top_up(&mut self, opts: &PlacementOptions, queue: &mut PhotoQueue) {
        let want = self.lookahead(opts).min(self.slots.len());
        while self.pending.len() < want {
            let Some(path) = queue.next_photo() else {
                break;
            };
            self.requests.push(path.clone());
            self.pending.push_back(PendingPhoto {
                path,
                texture: None,
            });
        }
    }

    fn try_launch(&mut self, ctx: &mut PlacementContext<'_>) {
        let ready = self
            .pending
            .iter()
            .take_while(|p| p.texture.is_some())
            .count();
        let count = match self.mode {
            // whatever has arrived, in order
            PlacementMode::Instant => ready.min(self.slots.len()),
            _ => {
                let needed = self.batch_size(ctx.opts).min(self.slots.len());
                if ready < needed {
                    return;
                }
                needed
            }
        };
        if count == 0 {
            return;
        }

        let cell_size = ctx.formation.cell_size;
        let scale = display_size(ctx.opts, cell_size);
        let burst_edge = Edge::random(&mut *ctx.rng);
        for _ in 0..count {
            let (Some(slot), Some(PendingPhoto { texture: Some(texture), .. })) =
                (self.slots.pop_front(), self.pending.pop_front())
            else {
                break;
            };
            let Some(home) = ctx.formation.position(slot) else {
                continue;
            };
            let index = ctx.photos.len();
            if self.mode == PlacementMode::Instant {
                let mut photo = PlacedPhoto::spawn(texture, slot, index, home, scale, home);
                photo.snap(Pose::new(home, scale), PhotoPhase::InFormation);
                ctx.photos.push(photo);
                continue;
            }

            let edge = match self.mode {
                PlacementMode::Burst if ctx.opts.burst_from_same_side => burst_edge,
                _ => Edge::random(&mut *ctx.rng),
            };
            let start = spawn_point(edge, ctx.stage, ctx.opts.start_distance, &mut *ctx.rng);
            let delay = match self.mode {
                PlacementMode::Burst => ctx
                    .opts
                    .burst_spread
                    .mul_f32(ctx.rng.random_range(0.0..=1.0)),
                _ => Duration::ZERO,
            };
            let mut photo = PlacedPhoto::spawn(texture, slot, index, home, scale, start);
            photo.move_to(
                Pose::new(home, scale),
                ctx.opts.fly_in_duration,
                delay,
                ctx.opts.fly_in_curve,
                PhotoPhase::FlyingIn,
            );
            ctx.photos.push(photo);
        }

        self.launches += 1;
        let interval = match self.mode {
            PlacementMode::Burst => ctx.opts.burst_interval,
            PlacementMode::Sequential => ctx.opts.sequential_delay,
            PlacementMode::Instant => Duration::ZERO,
        };
        self.launch_timer = Countdown::new(interval);
        debug!(
            launched = count,
            remaining = self.slots.len(),
            "launched photos"
        );
        self.top_up(ctx.opts, ctx.queue);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::color::Color;
    use crate::processing::formation::Target;
    use image::RgbaImage;
    use rand::SeedableRng;

    fn formation(n: usize) -> Formation {
        let targets = (0..n)
            .map(|i| Target {
                position: Vector3::new(i as f32, 0.0, 0.0),
                color: Color::TRANSPARENT,
            })
            .collect();
        Formation::new(targets, 0.5).unwrap()
    }

    fn texture(path: &Path) -> Arc<PhotoTexture> {
        Arc::new(PhotoTexture::new(path.to_path_buf(), RgbaImage::new(1, 1)))
    }

    #[test]
    fn spawn_points_sit_outside_the_stage() {
        let stage = StageBounds::default();
        let mut rng = StdRng::seed_from_u64(3);
        for edge in Edge::ALL {
            for _ in 0..20 {
                let p = spawn_point(edge, &stage, 2.0, &mut rng);
                let outside = p.x.abs() >= stage.half_width + 2.0 - 1e-4
                    || p.y.abs() >= stage.half_height + 2.0 - 1e-4;
                assert!(outside, "{edge:?} {p:?}");
            }
        }
    }

    #[test]
    fn display_size_respects_minimum_footprint() {
        let mut opts = PlacementOptions::default();
        assert!((display_size(&opts, 0.5) - 0.5).abs() < 1e-6);
        opts.min_display_size = 0.8;
        assert!((display_size(&opts, 0.5) - 0.8).abs() < 1e-6);
        opts.fit_to_grid_cell = false;
        opts.display_size = 2.0;
        opts.display_scale = 1.5;
        assert!((display_size(&opts, 0.5) - 3.0).abs() < 1e-6);
    }

    #[test]
    fn preloads_two_bursts_ahead() {
        let opts = PlacementOptions {
            images_per_burst: 3,
            ..PlacementOptions::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let mut queue = PhotoQueue::new(
            vec![PathBuf::from("a"), PathBuf::from("b")],
            false,
            StdRng::seed_from_u64(2),
        );
        let mut run = PlacementRun::new(&formation(20), &opts, &mut queue, &mut rng);
        assert_eq!(run.pending_len(), 6);
        assert_eq!(run.take_requests().len(), 6);
        assert!(run.take_requests().is_empty());
    }

    #[test]
    fn burst_waits_for_every_texture_then_launches_together() {
        let opts = PlacementOptions {
            images_per_burst: 2,
            burst_spread: Duration::ZERO,
            ..PlacementOptions::default()
        };
        let f = formation(4);
        let stage = StageBounds::default();
        let mut rng = StdRng::seed_from_u64(9);
        let mut queue = PhotoQueue::new(
            vec![PathBuf::from("a"), PathBuf::from("b")],
            false,
            StdRng::seed_from_u64(2),
        );
        let mut photos = Vec::new();
        let mut run = PlacementRun::new(&f, &opts, &mut queue, &mut rng);
        run.texture_ready(&texture(Path::new("a")));

        let mut ctx = PlacementContext {
            formation: &f,
            opts: &opts,
            stage: &stage,
            queue: &mut queue,
            photos: &mut photos,
            rng: &mut rng,
        };
        assert_eq!(run.step(0.1, &mut ctx), PlacementProgress::Running);
        assert!(ctx.photos.is_empty());

        run.texture_ready(&texture(Path::new("b")));
        run.step(0.1, &mut ctx);
        assert_eq!(ctx.photos.len(), 2);
        assert_eq!(run.launches(), 1);
        assert!(ctx.photos.iter().all(|p| p.phase == PhotoPhase::FlyingIn));
    }

    #[test]
    fn failed_photo_is_replaced_from_the_queue() {
        let opts = PlacementOptions {
            images_per_burst: 1,
            ..PlacementOptions::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let mut queue = PhotoQueue::new(
            vec![PathBuf::from("bad"), PathBuf::from("good")],
            false,
            StdRng::seed_from_u64(2),
        );
        let mut run = PlacementRun::new(&formation(3), &opts, &mut queue, &mut rng);
        run.take_requests();
        run.photo_failed(Path::new("bad"), &opts, &mut queue);
        assert_eq!(queue.len(), 1);
        assert_eq!(run.pending_len(), 2);
        assert!(
            run.take_requests()
                .iter()
                .all(|p| p == Path::new("good"))
        );
    }
}
