//! Time-parameterised interpolation: easing curves, tweens and countdowns.
//!
//! Nothing here owns a clock. Callers advance tweens with the tick delta and
//! read back the sample.

use std::time::Duration;

use cgmath::Vector3;
use serde::Deserialize;

/// Easing curve evaluated on normalised time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Curve {
    Linear,
    #[default]
    SmoothStep,
    EaseIn,
    EaseOut,
    EaseInOut,
}

impl Curve {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::SmoothStep => t * t * (3.0 - 2.0 * t),
            Self::EaseIn => t * t,
            Self::EaseOut => 1.0 - (1.0 - t) * (1.0 - t),
            Self::EaseInOut => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    1.0 - (-2.0 * t + 2.0).powi(2) / 2.0
                }
            }
        }
    }
}

pub trait Lerp: Sized {
    fn lerp(a: &Self, b: &Self, t: f32) -> Self;
}

impl Lerp for f32 {
    fn lerp(a: &Self, b: &Self, t: f32) -> Self {
        a + (b - a) * t
    }
}

impl Lerp for Vector3<f32> {
    fn lerp(a: &Self, b: &Self, t: f32) -> Self {
        *a + (*b - *a) * t
    }
}

/// Where a photo is and how large it is drawn.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vector3<f32>,
    pub scale: f32,
}

impl Pose {
    pub fn new(position: Vector3<f32>, scale: f32) -> Self {
        Self { position, scale }
    }
}

impl Lerp for Pose {
    fn lerp(a: &Self, b: &Self, t: f32) -> Self {
        Self {
            position: Lerp::lerp(&a.position, &b.position, t),
            scale: Lerp::lerp(&a.scale, &b.scale, t),
        }
    }
}

/// Interpolates `from` → `to` after an optional delay.
#[derive(Debug, Clone, Copy)]
pub struct Tween<T> {
    from: T,
    to: T,
    delay: f32,
    duration: f32,
    curve: Curve,
    elapsed: f32,
}

impl<T: Lerp + Copy> Tween<T> {
    pub fn new(from: T, to: T, duration: Duration, curve: Curve) -> Self {
        Self {
            from,
            to,
            delay: 0.0,
            duration: duration.as_secs_f32(),
            curve,
            elapsed: 0.0,
        }
    }

    #[must_use]
    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay.as_secs_f32();
        self
    }

    pub fn to(&self) -> T {
        self.to
    }

    /// Whether the delay has passed.
    pub fn has_started(&self) -> bool {
        self.elapsed >= self.delay
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed >= self.delay + self.duration
    }

    /// Sample at the current elapsed time. The end value is returned exactly.
    pub fn value(&self) -> T {
        if self.is_finished() {
            return self.to;
        }
        if !self.has_started() {
            return self.from;
        }
        let t = (self.elapsed - self.delay) / self.duration;
        T::lerp(&self.from, &self.to, self.curve.apply(t))
    }

    /// Move time forward by `dt` seconds and return the new sample.
    pub fn advance(&mut self, dt: f32) -> T {
        self.elapsed += dt.max(0.0);
        self.value()
    }
}

/// Counts a dwell period down to zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Countdown {
    remaining: f32,
}

impl Countdown {
    pub fn new(duration: Duration) -> Self {
        Self {
            remaining: duration.as_secs_f32(),
        }
    }

    /// Returns `true` once the countdown has run out.
    pub fn tick(&mut self, dt: f32) -> bool {
        self.remaining -= dt.max(0.0);
        self.is_done()
    }

    pub fn is_done(&self) -> bool {
        self.remaining <= 0.0
    }

    pub fn remaining(&self) -> f32 {
        self.remaining.max(0.0)
    }
}
