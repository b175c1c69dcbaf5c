//! Post-formation effects: overlays, fade cycles, scatter sampling and the showcase.

use std::time::Duration;

use cgmath::{InnerSpace, Vector3};
use rand::Rng;
use serde::Serialize;
use tracing::debug;

use super::animation::{Countdown, Curve, Pose, Tween};
use super::photo::{PhotoPhase, PlacedPhoto};
use crate::config::{FadeOptions, ShowcaseOptions};

/// The logo image shown over (or instead of) the photos.
#[derive(Debug, Clone, Default)]
pub struct LogoOverlay {
    alpha: f32,
    fade: Option<Tween<f32>>,
}

impl LogoOverlay {
    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn fade_to(&mut self, alpha: f32, duration: Duration) {
        self.fade = Some(Tween::new(self.alpha, alpha, duration, Curve::SmoothStep));
    }

    pub fn set(&mut self, alpha: f32) {
        self.fade = None;
        self.alpha = alpha;
    }

    pub fn toggle(&mut self) {
        let next = if self.alpha > 0.5 { 0.0 } else { 1.0 };
        self.set(next);
    }

    pub fn halt(&mut self) {
        self.fade = None;
    }

    pub fn advance(&mut self, dt: f32) {
        if let Some(fade) = self.fade.as_mut() {
            self.alpha = fade.advance(dt);
            if fade.is_finished() {
                self.fade = None;
            }
        }
    }
}

/// Operator-facing status line.
#[derive(Debug, Clone, Default)]
pub struct StatusOverlay {
    pub visible: bool,
    pub message: String,
}

impl StatusOverlay {
    pub fn show(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    pub fn visible_message(&self) -> Option<&str> {
        self.visible.then_some(self.message.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FadeStage {
    FadingOut,
    Hidden,
    FadingIn,
    Pause,
}

/// Repeated fade-out / wait / fade-in of every photo.
#[derive(Debug, Clone)]
pub struct FadeCycle {
    stage: FadeStage,
    timer: Countdown,
    completed: u32,
    max_cycles: u32,
}

impl FadeCycle {
    /// Start fading out. `max_cycles == 0` repeats forever.
    pub fn start(
        photos: &mut [PlacedPhoto],
        logo: &mut LogoOverlay,
        opts: &FadeOptions,
        max_cycles: u32,
    ) -> Self {
        let mut cycle = Self {
            stage: FadeStage::FadingOut,
            timer: Countdown::new(Duration::ZERO),
            completed: 0,
            max_cycles,
        };
        cycle.fade_out(photos, logo, opts);
        cycle
    }

    pub fn stage(&self) -> FadeStage {
        self.stage
    }

    pub fn completed(&self) -> u32 {
        self.completed
    }

    /// Returns `true` once the last cycle has faded back in.
    pub fn tick(
        &mut self,
        dt: f32,
        photos: &mut [PlacedPhoto],
        logo: &mut LogoOverlay,
        opts: &FadeOptions,
    ) -> bool {
        if !self.timer.tick(dt) {
            return false;
        }
        match self.stage {
            FadeStage::FadingOut => {
                settle_alpha(photos, 0.0);
                self.stage = FadeStage::Hidden;
                self.timer = Countdown::new(opts.wait);
            }
            FadeStage::Hidden => {
                for p in photos.iter_mut() {
                    p.fade_to(1.0, opts.fade_in);
                }
                if opts.logo_transition {
                    logo.fade_to(0.0, logo_duration(opts));
                }
                self.stage = FadeStage::FadingIn;
                self.timer = Countdown::new(opts.fade_in);
            }
            FadeStage::FadingIn => {
                settle_alpha(photos, 1.0);
                self.completed += 1;
                debug!(completed = self.completed, "fade cycle finished");
                if self.max_cycles > 0 && self.completed >= self.max_cycles {
                    return true;
                }
                self.stage = FadeStage::Pause;
                self.timer = Countdown::new(opts.pause_between);
            }
            FadeStage::Pause => self.fade_out(photos, logo, opts),
        }
        false
    }

    fn fade_out(&mut self, photos: &mut [PlacedPhoto], logo: &mut LogoOverlay, opts: &FadeOptions) {
        for p in photos.iter_mut() {
            p.fade_to(0.0, opts.fade_out);
        }
        if opts.logo_transition {
            logo.fade_to(1.0, logo_duration(opts));
        }
        self.stage = FadeStage::FadingOut;
        self.timer = Countdown::new(opts.fade_out);
    }
}

fn logo_duration(opts: &FadeOptions) -> Duration {
    opts.logo_fade_duration.mul_f32(0.7)
}

fn settle_alpha(photos: &mut [PlacedPhoto], alpha: f32) {
    for p in photos.iter_mut() {
        p.stop_fade();
        p.alpha = alpha;
    }
}

/// Uniform point in the box `[-bounds, bounds]`.
pub fn random_scatter(bounds: Vector3<f32>, rng: &mut impl Rng) -> Vector3<f32> {
    let mut axis = |b: f32| if b > 0.0 { rng.random_range(-b..=b) } else { 0.0 };
    Vector3::new(axis(bounds.x), axis(bounds.y), axis(bounds.z))
}

/// Random unit vector for the float motion.
pub fn random_direction(rng: &mut impl Rng) -> Vector3<f32> {
    let v = Vector3::new(
        rng.random_range(-1.0..=1.0f32),
        rng.random_range(-1.0..=1.0f32),
        rng.random_range(-1.0..=1.0f32),
    );
    if v.magnitude2() < 1e-6 {
        Vector3::unit_y()
    } else {
        v.normalize()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ShowcaseStage {
    Entering,
    Holding(Countdown),
    Exiting,
}

/// One photo brought to the foreground while the rest keep floating.
#[derive(Debug, Clone)]
pub struct Showcase {
    photo: usize,
    stage: ShowcaseStage,
}

impl Showcase {
    /// Pick a random photo and send it in from the entry position.
    pub fn begin(
        photos: &mut [PlacedPhoto],
        opts: &ShowcaseOptions,
        rng: &mut impl Rng,
    ) -> Option<Self> {
        let candidates: Vec<usize> = photos
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.showcased && p.phase == PhotoPhase::Floating)
            .map(|(i, _)| i)
            .collect();
        if candidates.is_empty() {
            return None;
        }
        let photo = candidates[rng.random_range(0..candidates.len())];
        let p = &mut photos[photo];
        p.showcased = true;
        p.snap(
            Pose::new(Vector3::from(opts.entry_position), opts.scale),
            PhotoPhase::Showcasing,
        );
        p.move_to(
            Pose::new(Vector3::from(opts.position), opts.scale),
            opts.entry_duration,
            Duration::ZERO,
            Curve::SmoothStep,
            PhotoPhase::Showcasing,
        );
        debug!(photo = %p.texture.name, "showcasing photo");
        Some(Self {
            photo,
            stage: ShowcaseStage::Entering,
        })
    }

    pub fn photo(&self) -> usize {
        self.photo
    }

    /// Returns `true` once the photo is back at its scatter base.
    pub fn tick(&mut self, dt: f32, photos: &mut [PlacedPhoto], opts: &ShowcaseOptions) -> bool {
        let Some(p) = photos.get_mut(self.photo) else {
            return true;
        };
        let next = match self.stage {
            ShowcaseStage::Entering if !p.is_moving() => {
                ShowcaseStage::Holding(Countdown::new(opts.hold))
            }
            ShowcaseStage::Holding(mut timer) => {
                if timer.tick(dt) {
                    let back = Pose::new(p.scatter, p.home_scale);
                    p.move_to(
                        back,
                        opts.exit_duration,
                        Duration::ZERO,
                        Curve::SmoothStep,
                        PhotoPhase::Showcasing,
                    );
                    ShowcaseStage::Exiting
                } else {
                    ShowcaseStage::Holding(timer)
                }
            }
            ShowcaseStage::Exiting if !p.is_moving() => {
                p.showcased = false;
                p.phase = PhotoPhase::Floating;
                return true;
            }
            stage => stage,
        };
        self.stage = next;
        false
    }

    /// Release the photo early; whatever motion replaces this owns it next.
    pub fn release(self, photos: &mut [PlacedPhoto]) {
        if let Some(p) = photos.get_mut(self.photo) {
            p.showcased = false;
        }
    }
}
