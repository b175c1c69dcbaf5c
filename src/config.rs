use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Result, ensure};
use cgmath::Vector3;
use serde::Deserialize;
use tracing::warn;

use crate::mosaic::animation::Curve;
use crate::settings::InstallationSettings;

/// Which sampler turns the logo into target positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SamplingMode {
    #[default]
    Grid,
    Continuous,
}

/// How image rows map onto world Y.
///
/// Image rows are counted from the top. `Upright` flips them so the mosaic
/// reads like the logo; `Raw` keeps row order as world order, which shows a
/// top-origin logo upside down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum YAxis {
    #[default]
    Upright,
    Raw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlacementMode {
    #[default]
    Burst,
    Sequential,
    Instant,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SamplerOptions {
    pub mode: SamplingMode,
    /// Overall size of the mosaic in world units (longest side).
    pub logo_scale: f32,
    /// Number of cells along the longest side of the logo.
    pub grid_resolution: u32,
    /// Cells/pixels at or below this average alpha are dropped.
    pub alpha_threshold: f32,
    pub y_axis: YAxis,
    pub continuous: ContinuousOptions,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            mode: SamplingMode::Grid,
            logo_scale: 10.0,
            grid_resolution: 32,
            alpha_threshold: 0.1,
            y_axis: YAxis::Upright,
            continuous: ContinuousOptions::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ContinuousOptions {
    /// Samples along each axis; the pixel stride is `dimension / resolution`.
    pub sampling_resolution: u32,
    /// Minimum distance between accepted positions.
    pub min_distance: f32,
    /// Run the greedy overlap filter.
    pub optimize: bool,
}

impl Default for ContinuousOptions {
    fn default() -> Self {
        Self {
            sampling_resolution: 50,
            min_distance: 1.0,
            optimize: true,
        }
    }
}

/// Visible stage rectangle, centred on the origin.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StageBounds {
    pub half_width: f32,
    pub half_height: f32,
}

impl Default for StageBounds {
    fn default() -> Self {
        Self {
            half_width: 8.0,
            half_height: 4.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct PlacementOptions {
    pub mode: PlacementMode,
    /// Shuffle the photo queue.
    pub shuffle_images: bool,
    /// Shuffle the order in which target slots are filled.
    pub randomize_sequence: bool,
    pub images_per_burst: usize,
    #[serde(with = "humantime_serde")]
    pub burst_interval: Duration,
    /// Upper bound of the random per-photo delay inside a burst.
    #[serde(with = "humantime_serde")]
    pub burst_spread: Duration,
    pub burst_from_same_side: bool,
    #[serde(with = "humantime_serde")]
    pub sequential_delay: Duration,
    #[serde(with = "humantime_serde")]
    pub fly_in_duration: Duration,
    pub fly_in_curve: Curve,
    /// Distance outside the stage where photos spawn.
    pub start_distance: f32,
    pub fit_to_grid_cell: bool,
    pub scale_padding: f32,
    pub display_size: f32,
    pub display_scale: f32,
    pub min_display_size: f32,
    #[serde(with = "humantime_serde")]
    pub completion_pause: Duration,
}

impl Default for PlacementOptions {
    fn default() -> Self {
        Self {
            mode: PlacementMode::Burst,
            shuffle_images: true,
            randomize_sequence: true,
            images_per_burst: 8,
            burst_interval: Duration::from_secs(1),
            burst_spread: Duration::from_millis(300),
            burst_from_same_side: true,
            sequential_delay: Duration::from_millis(150),
            fly_in_duration: Duration::from_secs(3),
            fly_in_curve: Curve::SmoothStep,
            start_distance: 2.0,
            fit_to_grid_cell: true,
            scale_padding: 1.0,
            display_size: 1.0,
            display_scale: 1.0,
            min_display_size: 0.05,
            completion_pause: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct LoaderOptions {
    /// Edge length of the square textures photos are resampled to.
    pub square_image_size: u32,
    /// Maximum number of concurrent decodes.
    pub max_concurrent_loads: usize,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            square_image_size: 512,
            max_concurrent_loads: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FloatingOptions {
    pub enabled: bool,
    pub speed: f32,
    pub range: f32,
    /// How quickly a photo chases its floating target, per second.
    pub follow_rate: f32,
    /// Half-extents of the box scatter positions are drawn from.
    pub bounds: [f32; 3],
    #[serde(with = "humantime_serde")]
    pub scatter_duration: Duration,
    pub curve: Curve,
}

impl Default for FloatingOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            speed: 1.0,
            range: 2.0,
            follow_rate: 2.0,
            bounds: [15.0, 10.0, 8.0],
            scatter_duration: Duration::from_secs(3),
            curve: Curve::SmoothStep,
        }
    }
}

impl FloatingOptions {
    pub fn bounds(&self) -> Vector3<f32> {
        Vector3::from(self.bounds)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct FadeOptions {
    /// Run fade cycles as part of the post-completion effects.
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub fade_out: Duration,
    #[serde(with = "humantime_serde")]
    pub fade_in: Duration,
    /// Time spent fully hidden.
    #[serde(with = "humantime_serde")]
    pub wait: Duration,
    #[serde(with = "humantime_serde")]
    pub pause_between: Duration,
    /// Number of cycles; 0 repeats forever.
    pub max_cycles: u32,
    pub logo_transition: bool,
    /// The logo fades over 70% of this.
    #[serde(with = "humantime_serde")]
    pub logo_fade_duration: Duration,
}

impl Default for FadeOptions {
    fn default() -> Self {
        Self {
            enabled: false,
            fade_out: Duration::from_secs(2),
            fade_in: Duration::from_secs(2),
            wait: Duration::from_secs(5),
            pause_between: Duration::from_secs(2),
            max_cycles: 3,
            logo_transition: true,
            logo_fade_duration: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ReformationOptions {
    pub auto: bool,
    #[serde(with = "humantime_serde")]
    pub time_in_scattered: Duration,
    #[serde(with = "humantime_serde")]
    pub duration: Duration,
    pub cycle: bool,
    #[serde(with = "humantime_serde")]
    pub time_in_formed: Duration,
    pub curve: Curve,
}

impl Default for ReformationOptions {
    fn default() -> Self {
        Self {
            auto: true,
            time_in_scattered: Duration::from_secs(15),
            duration: Duration::from_secs(4),
            cycle: true,
            time_in_formed: Duration::from_secs(10),
            curve: Curve::SmoothStep,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ShowcaseOptions {
    pub enabled: bool,
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    #[serde(with = "humantime_serde")]
    pub entry_duration: Duration,
    #[serde(with = "humantime_serde")]
    pub hold: Duration,
    #[serde(with = "humantime_serde")]
    pub exit_duration: Duration,
    pub position: [f32; 3],
    pub entry_position: [f32; 3],
    pub scale: f32,
}

impl Default for ShowcaseOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: Duration::from_secs(5),
            entry_duration: Duration::from_millis(1500),
            hold: Duration::from_secs(5),
            exit_duration: Duration::from_secs(2),
            position: [0.0, 0.0, -3.0],
            entry_position: [0.0, -8.0, -3.0],
            scale: 1.0,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EffectOptions {
    /// Start floating/fading automatically once the mosaic forms (manual mode only).
    pub auto_start: bool,
    pub floating: FloatingOptions,
    pub fade: FadeOptions,
    pub reformation: ReformationOptions,
    pub showcase: ShowcaseOptions,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SequencerOptions {
    pub enabled: bool,
    /// How long the scatter effect floats before the sequence moves on.
    #[serde(with = "humantime_serde")]
    pub effect_3d_duration: Duration,
}

impl Default for SequencerOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            effect_3d_duration: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Configuration {
    /// Folder scanned (top level only) for photos.
    pub photo_library_path: PathBuf,
    /// Logo image the mosaic recreates.
    pub logo_path: Option<PathBuf>,
    /// JSON installation settings; values there override this file.
    pub settings_path: Option<PathBuf>,
    /// Controller ticks per second.
    pub tick_rate_hz: u32,
    /// Optional deterministic seed for shuffles and random motion.
    pub startup_shuffle_seed: Option<u64>,
    pub stage: StageBounds,
    pub sampler: SamplerOptions,
    pub placement: PlacementOptions,
    pub loader: LoaderOptions,
    pub effects: EffectOptions,
    pub sequencer: SequencerOptions,
}

impl Configuration {
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self> {
        let s = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&s)?)
    }

    /// Validate runtime invariants that cannot be expressed via serde defaults alone.
    pub fn validated(self) -> Result<Self> {
        ensure!(self.tick_rate_hz > 0, "tick-rate-hz must be greater than zero");
        ensure!(
            self.sampler.logo_scale > 0.0,
            "sampler.logo-scale must be positive"
        );
        ensure!(
            self.sampler.grid_resolution > 0,
            "sampler.grid-resolution must be greater than zero"
        );
        ensure!(
            (0.0..1.0).contains(&self.sampler.alpha_threshold),
            "sampler.alpha-threshold must be within [0, 1)"
        );
        ensure!(
            self.sampler.continuous.sampling_resolution > 0,
            "sampler.continuous.sampling-resolution must be greater than zero"
        );
        ensure!(
            self.sampler.continuous.min_distance >= 0.0,
            "sampler.continuous.min-distance must not be negative"
        );
        ensure!(
            self.placement.images_per_burst > 0,
            "placement.images-per-burst must be greater than zero"
        );
        ensure!(
            self.placement.min_display_size >= 0.0,
            "placement.min-display-size must not be negative"
        );
        ensure!(
            self.loader.square_image_size > 0,
            "loader.square-image-size must be greater than zero"
        );
        ensure!(
            self.loader.max_concurrent_loads > 0,
            "loader.max-concurrent-loads must be greater than zero"
        );
        ensure!(
            self.effects.floating.bounds.iter().all(|b| *b >= 0.0),
            "effects.floating.bounds must not be negative"
        );
        ensure!(
            self.stage.half_width > 0.0 && self.stage.half_height > 0.0,
            "stage half extents must be positive"
        );
        Ok(self)
    }

    /// Fold the JSON installation settings over this configuration.
    pub fn apply_settings(&mut self, settings: &InstallationSettings) {
        self.photo_library_path = settings.photo_folder_path.clone();
        self.sequencer.enabled = settings.enable_sequencer;
        let secs = settings.sequencer_3d_effect_duration;
        match Duration::try_from_secs_f32(secs) {
            Ok(duration) => self.sequencer.effect_3d_duration = duration,
            Err(err) => warn!(
                value = secs,
                error = %err,
                kept = ?self.sequencer.effect_3d_duration,
                "ignoring unusable sequencer3DEffectDuration"
            ),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate_hz.max(1)))
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            photo_library_path: PathBuf::from("Photos"),
            logo_path: None,
            settings_path: None,
            tick_rate_hz: 60,
            startup_shuffle_seed: None,
            stage: StageBounds::default(),
            sampler: SamplerOptions::default(),
            placement: PlacementOptions::default(),
            loader: LoaderOptions::default(),
            effects: EffectOptions::default(),
            sequencer: SequencerOptions::default(),
        }
    }
}
