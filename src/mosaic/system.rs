//! The controller that owns every placed photo and the one state value
//! describing what the installation is doing.
//!
//! Time only moves in [`PhotoSystem::tick`]. Actions change state
//! synchronously; nothing here blocks or awaits.

use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::actions::Action;
use super::animation::{Countdown, Pose};
use super::effects::{
    FadeCycle, LogoOverlay, Showcase, StatusOverlay, random_direction, random_scatter,
};
use super::photo::{PhotoPhase, PhotoSnapshot, PlacedPhoto, floating_target};
use super::placement::{PlacementContext, PlacementProgress, PlacementRun};
use super::sequencer::{Key, Sequencer};
use crate::cache::PhotoTexture;
use crate::config::{Configuration, ReformationOptions};
use crate::error::Error;
use crate::events::InventoryEvent;
use crate::library::PhotoQueue;
use crate::processing::formation::Formation;

/// What happens when a scatter's dwell time runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AfterDwell {
    /// Stop floating and leave the photos where they are.
    Settle,
    /// Fly home; with `cycle`, scatter again after the formed dwell.
    Reform { cycle: bool },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScatterPlan {
    /// Time spent floating; `None` floats until told otherwise.
    pub dwell: Option<Duration>,
    pub after: AfterDwell,
    /// Run fade cycles alongside the floating.
    pub with_fade: bool,
}

impl ScatterPlan {
    /// Float for `duration`, then settle.
    pub fn timed(duration: Duration) -> Self {
        Self {
            dwell: Some(duration),
            after: AfterDwell::Settle,
            with_fade: false,
        }
    }

    pub fn manual(reform: &ReformationOptions, with_fade: bool) -> Self {
        let (dwell, after) = if reform.auto {
            (
                Some(reform.time_in_scattered),
                AfterDwell::Reform {
                    cycle: reform.cycle,
                },
            )
        } else {
            (None, AfterDwell::Settle)
        };
        Self {
            dwell,
            after,
            with_fade,
        }
    }

    pub fn cycling(reform: &ReformationOptions) -> Self {
        Self {
            dwell: Some(reform.time_in_scattered),
            after: AfterDwell::Reform { cycle: true },
            with_fade: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScatterStage {
    /// Photos are flying out to their scatter positions.
    Transition,
    Floating,
    /// Floating stopped; photos stay put until the next action.
    Settled,
}

#[derive(Debug)]
pub struct ScatterRun {
    plan: ScatterPlan,
    stage: ScatterStage,
    clock: f32,
    dwell: Option<Countdown>,
    showcase: Option<Showcase>,
    showcase_timer: Countdown,
    fade: Option<FadeCycle>,
}

impl ScatterRun {
    fn new(plan: ScatterPlan, fade: Option<FadeCycle>, showcase_interval: Duration) -> Self {
        Self {
            plan,
            stage: ScatterStage::Transition,
            clock: 0.0,
            dwell: None,
            showcase: None,
            showcase_timer: Countdown::new(showcase_interval),
            fade,
        }
    }

    fn settled() -> Self {
        Self {
            stage: ScatterStage::Settled,
            ..Self::new(ScatterPlan::timed(Duration::ZERO), None, Duration::ZERO)
        }
    }

    pub fn plan(&self) -> ScatterPlan {
        self.plan
    }

    pub fn stage(&self) -> ScatterStage {
        self.stage
    }

    pub fn showcased(&self) -> Option<usize> {
        self.showcase.as_ref().map(Showcase::photo)
    }
}

#[derive(Debug, Default)]
pub struct FormedState {
    rescatter: Option<(Countdown, ScatterPlan)>,
}

impl FormedState {
    /// Whether a cycling scatter is scheduled.
    pub fn will_rescatter(&self) -> bool {
        self.rescatter.is_some()
    }
}

#[derive(Debug)]
pub struct Reformation {
    then: Option<ScatterPlan>,
}

/// Everything the installation can be doing, as one value.
#[derive(Debug, Default)]
pub enum PhotoSystemState {
    #[default]
    Empty,
    Placing(PlacementRun),
    Formed(FormedState),
    FadeCycling(FadeCycle),
    Scattered(ScatterRun),
    Reforming(Reformation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StateKind {
    Empty,
    Placing,
    Formed,
    FadeCycling,
    Scattered,
    Reforming,
}

impl PhotoSystemState {
    pub fn kind(&self) -> StateKind {
        match self {
            Self::Empty => StateKind::Empty,
            Self::Placing(_) => StateKind::Placing,
            Self::Formed(_) => StateKind::Formed,
            Self::FadeCycling(_) => StateKind::FadeCycling,
            Self::Scattered(_) => StateKind::Scattered,
            Self::Reforming(_) => StateKind::Reforming,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SequenceStatus {
    pub enabled: bool,
    pub sequence: u8,
    pub step: u8,
    pub next: Key,
}

/// Snapshot handed to whatever draws the installation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frame {
    pub clock: f32,
    pub state: StateKind,
    pub photos: Vec<PhotoSnapshot>,
    pub logo_alpha: f32,
    pub status: Option<String>,
    pub sequence: SequenceStatus,
}

pub struct PhotoSystem {
    cfg: Configuration,
    formation: Formation,
    queue: PhotoQueue,
    photos: Vec<PlacedPhoto>,
    state: PhotoSystemState,
    sequencer: Sequencer,
    logo: LogoOverlay,
    status: StatusOverlay,
    rng: StdRng,
    clock: f32,
}

impl PhotoSystem {
    pub fn new(cfg: Configuration, formation: Formation, seed: Option<u64>) -> Self {
        let mut rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let queue = PhotoQueue::new(
            Vec::new(),
            cfg.placement.shuffle_images,
            StdRng::from_rng(&mut rng),
        );
        let sequencer = Sequencer::new(cfg.sequencer.enabled);
        let mut status = StatusOverlay::default();
        if sequencer.is_enabled() {
            status.show("Sequencer ready. Press '1' to begin");
        } else {
            status.show("Ready");
        }
        Self {
            cfg,
            formation,
            queue,
            photos: Vec::new(),
            state: PhotoSystemState::Empty,
            sequencer,
            logo: LogoOverlay::default(),
            status,
            rng,
            clock: 0.0,
        }
    }

    pub fn state(&self) -> &PhotoSystemState {
        &self.state
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn photos(&self) -> &[PlacedPhoto] {
        &self.photos
    }

    pub fn formation(&self) -> &Formation {
        &self.formation
    }

    pub fn library_len(&self) -> usize {
        self.queue.len()
    }

    pub fn logo_alpha(&self) -> f32 {
        self.logo.alpha()
    }

    /// Replace the known photos, e.g. after the startup scan.
    pub fn set_library(&mut self, photos: Vec<PathBuf>) {
        info!(count = photos.len(), "photo library updated");
        self.queue = PhotoQueue::new(
            photos,
            self.cfg.placement.shuffle_images,
            StdRng::from_rng(&mut self.rng),
        );
    }

    pub fn inventory(&mut self, event: InventoryEvent) {
        match event {
            InventoryEvent::PhotoAdded(path) => {
                debug!(path = %path.display(), "photo added");
                self.queue.add(path);
            }
            InventoryEvent::PhotoRemoved(path) => {
                debug!(path = %path.display(), "photo removed");
                self.queue.remove(&path);
            }
            InventoryEvent::ScanComplete => {
                info!(photos = self.library_len(), "photo library ready");
            }
        }
    }

    pub fn photo_loaded(&mut self, texture: Arc<PhotoTexture>) {
        if let PhotoSystemState::Placing(run) = &mut self.state
            && !run.texture_ready(&texture)
        {
            debug!(path = %texture.path.display(), "texture arrived with nobody waiting");
        }
    }

    pub fn photo_failed(&mut self, path: &Path) {
        match &mut self.state {
            PhotoSystemState::Placing(run) => {
                run.photo_failed(path, &self.cfg.placement, &mut self.queue);
            }
            _ => {
                self.queue.remove(path);
            }
        }
    }

    /// Paths the loader should decode next.
    pub fn take_load_requests(&mut self) -> Vec<PathBuf> {
        match &mut self.state {
            PhotoSystemState::Placing(run) => run.take_requests(),
            _ => Vec::new(),
        }
    }

    /// Whether the effect started by the last sequenced action is still running.
    pub fn is_busy(&self) -> bool {
        match &self.state {
            PhotoSystemState::Empty | PhotoSystemState::Formed(_) => false,
            PhotoSystemState::Placing(_)
            | PhotoSystemState::FadeCycling(_)
            | PhotoSystemState::Reforming(_) => true,
            PhotoSystemState::Scattered(run) => {
                run.stage != ScatterStage::Settled || self.photos.iter().any(PlacedPhoto::is_moving)
            }
        }
    }

    /// Run `action` through the sequencer gate.
    ///
    /// Rejections are logged and shown on the status overlay; the running
    /// system is left as it was.
    pub fn handle(&mut self, action: Action) -> Result<(), Error> {
        let result = self.dispatch(action);
        match &result {
            Ok(()) => info!(%action, state = ?self.state.kind(), "action accepted"),
            Err(err) => {
                warn!(%action, error = %err, "action rejected");
                self.status.show(err.to_string());
            }
        }
        result
    }

    fn dispatch(&mut self, action: Action) -> Result<(), Error> {
        if action.is_manual_only() && self.sequencer.is_enabled() {
            return Err(Error::ActionUnavailable {
                action,
                reason: "sequencer is enabled",
            });
        }
        let key = action.sequence_key();
        if let Some(key) = key {
            self.sequencer.check(key)?;
            if self.sequencer.is_enabled() && self.is_busy() {
                return Err(Error::SequenceBusy { expected: key });
            }
        }

        self.run_action(action)?;

        if let Some(key) = key {
            self.sequencer.accept(key)?;
            if self.sequencer.is_enabled() {
                let (sequence, step) = self.sequencer.position();
                self.status.show(format!(
                    "Sequence {sequence}, step {step}: press '{}' next",
                    self.sequencer.next_expected()
                ));
            }
        }
        Ok(())
    }

    fn run_action(&mut self, action: Action) -> Result<(), Error> {
        match action {
            Action::StartFormation => {
                self.state = self.begin_placement()?;
                self.status.show("Placing photos");
            }
            Action::StartFadeCycles => {
                self.require_photos(action)?;
                let fade = &self.cfg.effects.fade;
                let max_cycles = if self.sequencer.is_enabled() {
                    fade.max_cycles.max(1)
                } else {
                    fade.max_cycles
                };
                self.stop_effects();
                self.state = PhotoSystemState::FadeCycling(FadeCycle::start(
                    &mut self.photos,
                    &mut self.logo,
                    &self.cfg.effects.fade,
                    max_cycles,
                ));
                self.status.show("Fade cycles running");
            }
            Action::StartScatter => {
                self.require_photos(action)?;
                let plan = if self.sequencer.is_enabled() {
                    ScatterPlan::timed(self.cfg.sequencer.effect_3d_duration)
                } else {
                    ScatterPlan::manual(&self.cfg.effects.reformation, false)
                };
                self.state = self.begin_scatter(plan);
            }
            Action::ReturnToFormation => {
                self.require_photos(action)?;
                if matches!(self.state, PhotoSystemState::Formed(_)) {
                    info!("photos are already in formation");
                    return Ok(());
                }
                self.stop_effects();
                self.state = self.begin_reformation(None);
            }
            Action::StartBothEffects => {
                self.require_photos(action)?;
                let plan = ScatterPlan::manual(&self.cfg.effects.reformation, true);
                self.state = self.begin_scatter(plan);
            }
            Action::StartCycling => {
                self.require_photos(action)?;
                let plan = ScatterPlan::cycling(&self.cfg.effects.reformation);
                self.state = self.begin_scatter(plan);
            }
            Action::StopAll => {
                if matches!(
                    self.state,
                    PhotoSystemState::Empty | PhotoSystemState::Placing(_)
                ) {
                    return Ok(());
                }
                self.stop_effects();
                self.state = self.resting_state();
                self.status.show("Effects stopped");
            }
            Action::Reset => {
                let placing = matches!(self.state, PhotoSystemState::Placing(_));
                if !placing {
                    self.stop_effects();
                }
                for p in &mut self.photos {
                    p.halt();
                    p.showcased = false;
                    p.snap(p.home_pose(), PhotoPhase::InFormation);
                    p.alpha = 1.0;
                }
                if !placing && !self.photos.is_empty() {
                    self.state = PhotoSystemState::Formed(FormedState::default());
                }
                self.status.show("Reset to formation");
            }
            Action::Clear => {
                let cleared = self.photos.len();
                self.photos.clear();
                self.state = PhotoSystemState::Empty;
                self.sequencer.reset();
                self.logo.set(0.0);
                info!(cleared, "cleared placed photos");
                self.status.show("Cleared");
            }
            Action::ToggleLogo => self.logo.toggle(),
            Action::ToggleStatus => self.status.toggle(),
        }
        Ok(())
    }

    fn require_photos(&self, action: Action) -> Result<(), Error> {
        if matches!(self.state, PhotoSystemState::Placing(_)) {
            return Err(Error::ActionUnavailable {
                action,
                reason: "placement in progress",
            });
        }
        if self.photos.is_empty() {
            return Err(Error::ActionUnavailable {
                action,
                reason: "no photos placed yet",
            });
        }
        Ok(())
    }

    fn begin_placement(&mut self) -> Result<PhotoSystemState, Error> {
        if matches!(self.state, PhotoSystemState::Placing(_)) {
            return Err(Error::ActionUnavailable {
                action: Action::StartFormation,
                reason: "placement already running",
            });
        }
        if self.queue.is_empty() {
            return Err(Error::EmptyResultSet("photo discovery"));
        }
        self.photos.clear();
        self.logo.set(0.0);
        let run = PlacementRun::new(
            &self.formation,
            &self.cfg.placement,
            &mut self.queue,
            &mut self.rng,
        );
        Ok(PhotoSystemState::Placing(run))
    }

    /// Send every photo to a fresh random position.
    fn begin_scatter(&mut self, plan: ScatterPlan) -> PhotoSystemState {
        self.stop_effects();
        let floating = &self.cfg.effects.floating;
        let bounds = floating.bounds();
        for p in &mut self.photos {
            p.scatter = random_scatter(bounds, &mut self.rng);
            p.float_direction = random_direction(&mut self.rng);
            p.move_to(
                Pose::new(p.scatter, p.home_scale),
                floating.scatter_duration,
                Duration::ZERO,
                floating.curve,
                PhotoPhase::Scattering,
            );
        }
        let fade = plan.with_fade.then(|| {
            FadeCycle::start(
                &mut self.photos,
                &mut self.logo,
                &self.cfg.effects.fade,
                self.cfg.effects.fade.max_cycles,
            )
        });
        info!(photos = self.photos.len(), ?plan, "scattering");
        self.status.show("3D scatter");
        PhotoSystemState::Scattered(ScatterRun::new(
            plan,
            fade,
            self.cfg.effects.showcase.interval,
        ))
    }

    /// Fly every photo home; `then` schedules the next scatter after the formed dwell.
    fn begin_reformation(&mut self, then: Option<ScatterPlan>) -> PhotoSystemState {
        let reform = &self.cfg.effects.reformation;
        let fade = &self.cfg.effects.fade;
        let mut faded = false;
        for p in &mut self.photos {
            p.showcased = false;
            p.move_to(
                p.home_pose(),
                reform.duration,
                Duration::ZERO,
                reform.curve,
                PhotoPhase::ReturningToFormation,
            );
            if p.alpha < 1.0 {
                p.fade_to(1.0, reform.duration);
                faded = true;
            }
        }
        if faded && fade.logo_transition {
            self.logo.fade_to(0.0, fade.logo_fade_duration.mul_f32(0.7));
        }
        info!(photos = self.photos.len(), "returning to formation");
        self.status.show("Returning to formation");
        PhotoSystemState::Reforming(Reformation { then })
    }

    fn stop_effects(&mut self) {
        self.logo.halt();
        for p in &mut self.photos {
            p.halt();
            p.showcased = false;
            if p.phase != PhotoPhase::InFormation {
                p.phase = PhotoPhase::Floating;
            }
        }
    }

    /// State matching the photos once nothing is running.
    fn resting_state(&self) -> PhotoSystemState {
        if self.photos.is_empty() {
            PhotoSystemState::Empty
        } else if self
            .photos
            .iter()
            .all(|p| p.phase == PhotoPhase::InFormation)
        {
            PhotoSystemState::Formed(FormedState::default())
        } else {
            PhotoSystemState::Scattered(ScatterRun::settled())
        }
    }

    /// Advance the shared clock by `dt` seconds.
    pub fn tick(&mut self, dt: f32) {
        let dt = dt.max(0.0);
        self.clock += dt;
        for p in &mut self.photos {
            p.advance(dt);
        }
        self.logo.advance(dt);

        self.state = match mem::take(&mut self.state) {
            PhotoSystemState::Empty => PhotoSystemState::Empty,
            PhotoSystemState::Placing(run) => self.tick_placing(run, dt),
            PhotoSystemState::Formed(formed) => self.tick_formed(formed, dt),
            PhotoSystemState::FadeCycling(cycle) => self.tick_fading(cycle, dt),
            PhotoSystemState::Scattered(run) => self.tick_scatter(run, dt),
            PhotoSystemState::Reforming(reform) => self.tick_reforming(reform),
        };
    }

    fn tick_placing(&mut self, mut run: PlacementRun, dt: f32) -> PhotoSystemState {
        let mut ctx = PlacementContext {
            formation: &self.formation,
            opts: &self.cfg.placement,
            stage: &self.cfg.stage,
            queue: &mut self.queue,
            photos: &mut self.photos,
            rng: &mut self.rng,
        };
        match run.step(dt, &mut ctx) {
            PlacementProgress::Running => PhotoSystemState::Placing(run),
            PlacementProgress::Complete => self.formation_complete(),
        }
    }

    fn formation_complete(&mut self) -> PhotoSystemState {
        if self.photos.is_empty() {
            self.status.show("No photos could be placed");
            return PhotoSystemState::Empty;
        }
        self.status.show("Formation complete");
        let effects = &self.cfg.effects;
        if self.sequencer.is_enabled() || !effects.auto_start {
            return PhotoSystemState::Formed(FormedState::default());
        }
        match (effects.floating.enabled, effects.fade.enabled) {
            (true, with_fade) => {
                let plan = ScatterPlan::manual(&effects.reformation, with_fade);
                self.begin_scatter(plan)
            }
            (false, true) => {
                let max_cycles = effects.fade.max_cycles;
                PhotoSystemState::FadeCycling(FadeCycle::start(
                    &mut self.photos,
                    &mut self.logo,
                    &self.cfg.effects.fade,
                    max_cycles,
                ))
            }
            (false, false) => PhotoSystemState::Formed(FormedState::default()),
        }
    }

    fn tick_formed(&mut self, mut formed: FormedState, dt: f32) -> PhotoSystemState {
        if let Some((timer, plan)) = formed.rescatter.as_mut()
            && timer.tick(dt)
        {
            let plan = *plan;
            return self.begin_scatter(plan);
        }
        PhotoSystemState::Formed(formed)
    }

    fn tick_fading(&mut self, mut cycle: FadeCycle, dt: f32) -> PhotoSystemState {
        if cycle.tick(dt, &mut self.photos, &mut self.logo, &self.cfg.effects.fade) {
            info!(cycles = cycle.completed(), "fade cycles finished");
            self.status.show("Fade cycles complete");
            return self.resting_state();
        }
        PhotoSystemState::FadeCycling(cycle)
    }

    fn tick_scatter(&mut self, mut run: ScatterRun, dt: f32) -> PhotoSystemState {
        run.clock += dt;
        if let Some(fade) = run.fade.as_mut()
            && fade.tick(dt, &mut self.photos, &mut self.logo, &self.cfg.effects.fade)
        {
            run.fade = None;
        }

        match run.stage {
            ScatterStage::Transition => {
                if !self.photos.iter().any(PlacedPhoto::is_moving) {
                    run.stage = ScatterStage::Floating;
                    run.dwell = run.plan.dwell.map(Countdown::new);
                    debug!("scatter transition finished; floating");
                }
            }
            ScatterStage::Floating => {
                self.float_photos(run.clock, dt);
                self.tick_showcase(&mut run, dt);
                if let Some(dwell) = run.dwell.as_mut()
                    && dwell.tick(dt)
                {
                    if let Some(showcase) = run.showcase.take() {
                        self.return_showcased(showcase);
                    }
                    match run.plan.after {
                        AfterDwell::Settle => {
                            run.stage = ScatterStage::Settled;
                            info!("3D effect finished; photos settled");
                            self.status.show("3D effect complete");
                        }
                        AfterDwell::Reform { cycle } => {
                            return self.begin_reformation(cycle.then_some(run.plan));
                        }
                    }
                }
            }
            ScatterStage::Settled => {}
        }
        PhotoSystemState::Scattered(run)
    }

    fn float_photos(&mut self, clock: f32, dt: f32) {
        let floating = &self.cfg.effects.floating;
        if !floating.enabled {
            return;
        }
        for p in &mut self.photos {
            if p.showcased || p.is_moving() {
                continue;
            }
            let target = floating_target(
                p.scatter,
                p.float_direction,
                clock,
                floating.speed,
                p.index,
                floating.range,
            );
            p.follow(target, floating.follow_rate, dt);
        }
    }

    fn tick_showcase(&mut self, run: &mut ScatterRun, dt: f32) {
        let opts = &self.cfg.effects.showcase;
        if !opts.enabled {
            return;
        }
        if let Some(showcase) = run.showcase.as_mut() {
            if showcase.tick(dt, &mut self.photos, opts) {
                run.showcase = None;
                run.showcase_timer = Countdown::new(opts.interval);
            }
        } else if run.showcase_timer.tick(dt) {
            run.showcase = Showcase::begin(&mut self.photos, opts, &mut self.rng);
        }
    }

    fn return_showcased(&mut self, showcase: Showcase) {
        let idx = showcase.photo();
        showcase.release(&mut self.photos);
        if let Some(p) = self.photos.get_mut(idx) {
            p.move_to(
                Pose::new(p.scatter, p.home_scale),
                self.cfg.effects.showcase.exit_duration,
                Duration::ZERO,
                self.cfg.effects.floating.curve,
                PhotoPhase::Scattering,
            );
        }
    }

    fn tick_reforming(&mut self, reform: Reformation) -> PhotoSystemState {
        if self.photos.iter().any(PlacedPhoto::is_moving) {
            return PhotoSystemState::Reforming(reform);
        }
        info!("back in formation");
        self.status.show("Back in formation");
        let rescatter = reform
            .then
            .map(|plan| (Countdown::new(self.cfg.effects.reformation.time_in_formed), plan));
        PhotoSystemState::Formed(FormedState { rescatter })
    }

    pub fn frame(&self) -> Frame {
        let (sequence, step) = self.sequencer.position();
        Frame {
            clock: self.clock,
            state: self.state.kind(),
            photos: self.photos.iter().map(PlacedPhoto::snapshot).collect(),
            logo_alpha: self.logo.alpha(),
            status: self.status.visible_message().map(str::to_owned),
            sequence: SequenceStatus {
                enabled: self.sequencer.is_enabled(),
                sequence,
                step,
                next: self.sequencer.next_expected(),
            },
        }
    }
}
