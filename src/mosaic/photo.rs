use std::sync::Arc;
use std::time::Duration;

use cgmath::Vector3;
use serde::Serialize;

use super::animation::{Curve, Pose, Tween};
use crate::cache::PhotoTexture;

/// Where a photo is in its motion cycle. Alpha fades run independently of this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PhotoPhase {
    OffscreenSpawn,
    FlyingIn,
    InFormation,
    Scattering,
    Floating,
    Showcasing,
    ReturningToFormation,
}

impl PhotoPhase {
    /// Phase a photo settles in once the motion started in `self` finishes.
    fn settled(self) -> Self {
        match self {
            Self::OffscreenSpawn | Self::FlyingIn | Self::ReturningToFormation => Self::InFormation,
            Self::Scattering => Self::Floating,
            other => other,
        }
    }
}

/// Ambient float target for the photo at `index`.
pub fn floating_target(
    base: Vector3<f32>,
    direction: Vector3<f32>,
    clock: f32,
    speed: f32,
    index: usize,
    range: f32,
) -> Vector3<f32> {
    base + direction * ((clock * speed + index as f32).sin() * range)
}

#[derive(Debug)]
pub struct PlacedPhoto {
    pub texture: Arc<PhotoTexture>,
    /// Target slot in the formation.
    pub slot: usize,
    /// Placement order; offsets the float phase.
    pub index: usize,
    pub home: Vector3<f32>,
    /// Scale the photo has when it sits in formation.
    pub home_scale: f32,
    pub position: Vector3<f32>,
    pub scale: f32,
    pub alpha: f32,
    pub scatter: Vector3<f32>,
    pub float_direction: Vector3<f32>,
    pub showcased: bool,
    pub phase: PhotoPhase,
    motion: Option<Tween<Pose>>,
    fade: Option<Tween<f32>>,
}

impl PlacedPhoto {
    pub fn spawn(
        texture: Arc<PhotoTexture>,
        slot: usize,
        index: usize,
        home: Vector3<f32>,
        home_scale: f32,
        spawn_at: Vector3<f32>,
    ) -> Self {
        Self {
            texture,
            slot,
            index,
            home,
            home_scale,
            position: spawn_at,
            scale: home_scale,
            alpha: 1.0,
            scatter: home,
            float_direction: Vector3::new(0.0, 1.0, 0.0),
            showcased: false,
            phase: PhotoPhase::OffscreenSpawn,
            motion: None,
            fade: None,
        }
    }

    pub fn pose(&self) -> Pose {
        Pose::new(self.position, self.scale)
    }

    pub fn home_pose(&self) -> Pose {
        Pose::new(self.home, self.home_scale)
    }

    pub fn is_moving(&self) -> bool {
        self.motion.is_some()
    }

    pub fn is_fading(&self) -> bool {
        self.fade.is_some()
    }

    /// Start a motion from the current pose, replacing any motion in flight.
    ///
    /// A `delay` holds the photo in place first; a pending fly-in stays in
    /// `OffscreenSpawn` until its delay has passed.
    pub fn move_to(
        &mut self,
        to: Pose,
        duration: Duration,
        delay: Duration,
        curve: Curve,
        phase: PhotoPhase,
    ) {
        self.motion = Some(Tween::new(self.pose(), to, duration, curve).delayed(delay));
        self.phase = phase;
        if phase == PhotoPhase::FlyingIn && !delay.is_zero() {
            self.phase = PhotoPhase::OffscreenSpawn;
        }
    }

    /// Jump to `pose` immediately, dropping any motion in flight.
    pub fn snap(&mut self, pose: Pose, phase: PhotoPhase) {
        self.motion = None;
        self.position = pose.position;
        self.scale = pose.scale;
        self.phase = phase;
    }

    /// Linear alpha fade from the current alpha, replacing any fade in flight.
    pub fn fade_to(&mut self, alpha: f32, duration: Duration) {
        self.fade = Some(Tween::new(self.alpha, alpha, duration, Curve::Linear));
    }

    /// Drop every tween; the photo keeps what was last applied.
    pub fn halt(&mut self) {
        self.motion = None;
        self.fade = None;
    }

    pub fn stop_fade(&mut self) {
        self.fade = None;
    }

    /// Chase `target` at `rate` per second.
    pub fn follow(&mut self, target: Vector3<f32>, rate: f32, dt: f32) {
        let k = (dt * rate).clamp(0.0, 1.0);
        self.position += (target - self.position) * k;
    }

    /// Advance the tweens by `dt`, writing their samples and pruning finished ones.
    pub fn advance(&mut self, dt: f32) {
        if let Some(motion) = self.motion.as_mut() {
            let pose = motion.advance(dt);
            self.position = pose.position;
            self.scale = pose.scale;
            if self.phase == PhotoPhase::OffscreenSpawn && motion.has_started() {
                self.phase = PhotoPhase::FlyingIn;
            }
            if motion.is_finished() {
                self.motion = None;
                self.phase = self.phase.settled();
            }
        }
        if let Some(fade) = self.fade.as_mut() {
            self.alpha = fade.advance(dt);
            if fade.is_finished() {
                self.fade = None;
            }
        }
    }

    pub fn snapshot(&self) -> PhotoSnapshot {
        PhotoSnapshot {
            name: self.texture.name.clone(),
            slot: self.slot,
            position: self.position,
            scale: self.scale,
            alpha: self.alpha,
            phase: self.phase,
            showcased: self.showcased,
        }
    }
}

/// Render-facing view of a placed photo.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PhotoSnapshot {
    pub name: String,
    pub slot: usize,
    pub position: Vector3<f32>,
    pub scale: f32,
    pub alpha: f32,
    pub phase: PhotoPhase,
    pub showcased: bool,
}
