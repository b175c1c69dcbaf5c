use cgmath::{MetricSpace, Vector3};
use image::{Rgba, RgbaImage};
use photo_mosaic::cache::{PhotoTexture, TextureCache};
use photo_mosaic::config::{Configuration, LoaderOptions};
use photo_mosaic::error::Error;
use photo_mosaic::events::InventoryEvent;
use photo_mosaic::mosaic::actions::Action;
use photo_mosaic::mosaic::photo::PhotoPhase;
use photo_mosaic::mosaic::sequencer::Key;
use photo_mosaic::mosaic::system::{PhotoSystem, PhotoSystemState, StateKind};
use photo_mosaic::processing::color::Color;
use photo_mosaic::processing::formation::{Formation, Target};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

const DT: f32 = 1.0 / 60.0;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

/// Short timings so whole effect cycles fit in a few simulated seconds.
fn quick_config(sequencer: bool) -> Configuration {
    let mut cfg = Configuration::default();
    cfg.sequencer.enabled = sequencer;
    cfg.sequencer.effect_3d_duration = ms(500);

    let p = &mut cfg.placement;
    p.images_per_burst = 2;
    p.burst_interval = ms(100);
    p.burst_spread = ms(50);
    p.fly_in_duration = ms(200);
    p.completion_pause = ms(100);

    let e = &mut cfg.effects;
    e.floating.scatter_duration = ms(200);
    e.fade.fade_out = ms(100);
    e.fade.fade_in = ms(100);
    e.fade.wait = ms(100);
    e.fade.pause_between = ms(100);
    e.fade.max_cycles = 1;
    e.fade.logo_fade_duration = ms(100);
    e.reformation.duration = ms(200);
    e.reformation.time_in_scattered = ms(500);
    e.reformation.time_in_formed = ms(300);
    e.showcase.interval = ms(100);
    e.showcase.entry_duration = ms(100);
    e.showcase.hold = ms(100);
    e.showcase.exit_duration = ms(100);
    cfg
}

fn line_formation(n: usize) -> Formation {
    let targets = (0..n)
        .map(|i| Target {
            position: Vector3::new(i as f32 - n as f32 / 2.0, 1.0, 0.0),
            color: Color::from_rgba8(&Rgba([255, 255, 255, 255])),
        })
        .collect();
    Formation::new(targets, 1.0).unwrap()
}

fn library(n: usize) -> Vec<PathBuf> {
    (0..n).map(|i| PathBuf::from(format!("/photos/p{i}.jpg"))).collect()
}

/// Answer every pending load request with a tiny texture.
fn serve_loads(system: &mut PhotoSystem) {
    for path in system.take_load_requests() {
        let texture = PhotoTexture::new(path, RgbaImage::new(2, 2));
        system.photo_loaded(Arc::new(texture));
    }
}

/// Tick until `done` holds, serving loads along the way. Panics after `max_secs`.
fn run_until(system: &mut PhotoSystem, max_secs: f32, done: impl Fn(&PhotoSystem) -> bool) {
    let mut elapsed = 0.0;
    while !done(system) {
        assert!(
            elapsed < max_secs,
            "timed out in state {:?}",
            system.state().kind()
        );
        serve_loads(system);
        system.tick(DT);
        elapsed += DT;
    }
}

fn in_state(kind: StateKind) -> impl Fn(&PhotoSystem) -> bool {
    move |s| s.state().kind() == kind
}

fn idle(s: &PhotoSystem) -> bool {
    !s.is_busy()
}

fn formed_system(sequencer: bool, slots: usize, photos: usize) -> PhotoSystem {
    let mut system = PhotoSystem::new(quick_config(sequencer), line_formation(slots), Some(7));
    system.set_library(library(photos));
    system.handle(Action::StartFormation).unwrap();
    run_until(&mut system, 10.0, in_state(StateKind::Formed));
    system
}

#[tokio::test]
async fn burst_placement_through_the_cache_forms_the_logo() {
    let dir = tempfile::tempdir().unwrap();
    let mut paths = Vec::new();
    for i in 0..3 {
        let path = dir.path().join(format!("photo{i}.png"));
        RgbaImage::from_pixel(6, 4, Rgba([i * 40, 10, 10, 255]))
            .save(&path)
            .unwrap();
        paths.push(path);
    }
    let cache = TextureCache::new(&LoaderOptions {
        square_image_size: 8,
        max_concurrent_loads: 2,
    });

    let formation = line_formation(5);
    let mut system = PhotoSystem::new(quick_config(false), formation.clone(), Some(1));
    for path in &paths {
        system.inventory(InventoryEvent::PhotoAdded(path.clone()));
    }
    assert_eq!(system.library_len(), 3);
    system.handle(Action::StartFormation).unwrap();
    assert_eq!(system.state().kind(), StateKind::Placing);

    let mut elapsed = 0.0;
    while system.state().kind() != StateKind::Formed {
        assert!(elapsed < 10.0, "placement never finished");
        for path in system.take_load_requests() {
            let texture = cache.get_or_load(&path).await.unwrap();
            system.photo_loaded(texture);
        }
        system.tick(DT);
        elapsed += DT;
    }

    // fewer photos than slots: the library is reused, each photo decoded once
    assert_eq!(system.photos().len(), 5);
    assert_eq!(cache.decode_count(), 3);
    let mut slots: Vec<usize> = system.photos().iter().map(|p| p.slot).collect();
    slots.sort();
    assert_eq!(slots, vec![0, 1, 2, 3, 4]);
    for p in system.photos() {
        assert_eq!(p.phase, PhotoPhase::InFormation);
        assert_eq!(p.texture.image.dimensions(), (8, 8));
        let target = formation.position(p.slot).unwrap();
        assert!(p.position.distance(target) < 1e-4);
    }
}

#[test]
fn start_formation_without_photos_is_empty_result() {
    let mut system = PhotoSystem::new(quick_config(false), line_formation(3), Some(1));
    let err = system.handle(Action::StartFormation).unwrap_err();
    assert!(matches!(err, Error::EmptyResultSet(_)));
    assert_eq!(system.state().kind(), StateKind::Empty);
}

#[test]
fn broken_photos_are_skipped_during_placement() {
    let mut system = PhotoSystem::new(quick_config(false), line_formation(4), Some(3));
    let mut photos = library(3);
    photos.push(PathBuf::from("/photos/broken.jpg"));
    system.set_library(photos);
    system.handle(Action::StartFormation).unwrap();

    let broken = PathBuf::from("/photos/broken.jpg");
    let mut elapsed = 0.0;
    while system.state().kind() != StateKind::Formed {
        assert!(elapsed < 10.0, "placement never finished");
        for path in system.take_load_requests() {
            if path == broken {
                system.photo_failed(&path);
            } else {
                system.photo_loaded(Arc::new(PhotoTexture::new(path, RgbaImage::new(2, 2))));
            }
        }
        system.tick(DT);
        elapsed += DT;
    }
    assert_eq!(system.library_len(), 3);
    assert_eq!(system.photos().len(), 4);
    assert!(system.photos().iter().all(|p| p.texture.path != broken));
}

#[test]
fn sequencer_rejects_out_of_order_keys() {
    let mut system = PhotoSystem::new(quick_config(true), line_formation(3), Some(2));
    system.set_library(library(3));

    let err = system.handle(Action::StartScatter).unwrap_err();
    assert!(matches!(
        err,
        Error::InvalidSequenceInput {
            expected: Key::One,
            got: Key::Three
        }
    ));
    assert_eq!(system.sequencer().position(), (1, 1));
    assert_eq!(system.state().kind(), StateKind::Empty);
}

#[test]
fn sequencer_refuses_keys_while_busy() {
    let mut system = PhotoSystem::new(quick_config(true), line_formation(3), Some(2));
    system.set_library(library(3));
    system.handle(Action::StartFormation).unwrap();
    assert!(system.is_busy());

    let err = system.handle(Action::StartFadeCycles).unwrap_err();
    assert!(matches!(err, Error::SequenceBusy { expected: Key::Two }));
    assert_eq!(system.sequencer().position(), (1, 2));
    assert_eq!(system.state().kind(), StateKind::Placing);
}

#[test]
fn manual_only_actions_need_manual_mode() {
    let mut system = formed_system(true, 3, 3);
    for action in [Action::StartBothEffects, Action::StartCycling] {
        let err = system.handle(action).unwrap_err();
        assert!(matches!(err, Error::ActionUnavailable { .. }));
    }
    assert_eq!(system.state().kind(), StateKind::Formed);
}

#[test]
fn full_sequence_then_repeat() {
    let mut system = formed_system(true, 4, 4);
    assert_eq!(system.sequencer().position(), (1, 2));
    assert_eq!(system.logo_alpha(), 0.0);

    // 2: one bounded fade cycle, back to formed
    system.handle(Action::StartFadeCycles).unwrap();
    assert_eq!(system.state().kind(), StateKind::FadeCycling);
    run_until(&mut system, 5.0, in_state(StateKind::Formed));
    assert!(system.photos().iter().all(|p| p.alpha == 1.0));

    // 3: timed scatter that settles on its own
    system.handle(Action::StartScatter).unwrap();
    assert_eq!(system.state().kind(), StateKind::Scattered);
    run_until(&mut system, 5.0, idle);
    assert_eq!(system.state().kind(), StateKind::Scattered);
    assert!(system.photos().iter().all(|p| !p.showcased));

    // 4: home again; sequence 2 starts
    system.handle(Action::ReturnToFormation).unwrap();
    assert_eq!(system.state().kind(), StateKind::Reforming);
    run_until(&mut system, 5.0, in_state(StateKind::Formed));
    assert_eq!(system.sequencer().position(), (2, 1));
    assert_eq!(system.sequencer().next_expected(), Key::Four);
    for p in system.photos() {
        assert_eq!(p.phase, PhotoPhase::InFormation);
        assert!(p.position.distance(p.home) < 1e-4);
    }

    // sequence 2 opens with a return that is already satisfied
    system.handle(Action::ReturnToFormation).unwrap();
    assert_eq!(system.sequencer().position(), (2, 2));
    assert_eq!(system.sequencer().next_expected(), Key::Two);
}

#[test]
fn clear_resets_the_sequence() {
    let mut system = formed_system(true, 3, 3);
    system.handle(Action::Clear).unwrap();
    assert_eq!(system.state().kind(), StateKind::Empty);
    assert!(system.photos().is_empty());
    assert_eq!(system.sequencer().position(), (1, 1));

    let err = system.handle(Action::StartFadeCycles).unwrap_err();
    assert!(matches!(err, Error::InvalidSequenceInput { .. }));
}

#[test]
fn cycling_scatter_reforms_and_scatters_again() {
    let mut system = formed_system(false, 4, 4);
    system.handle(Action::StartCycling).unwrap();
    assert_eq!(system.state().kind(), StateKind::Scattered);

    run_until(&mut system, 5.0, in_state(StateKind::Reforming));
    run_until(&mut system, 5.0, in_state(StateKind::Formed));
    match system.state() {
        PhotoSystemState::Formed(formed) => assert!(formed.will_rescatter()),
        other => panic!("expected formed, got {:?}", other.kind()),
    }
    run_until(&mut system, 5.0, in_state(StateKind::Scattered));
}

#[test]
fn plain_scatter_with_auto_reform_keeps_cycling() {
    // reformation.auto and reformation.cycle are on by default
    let mut system = formed_system(false, 4, 4);
    system.handle(Action::StartScatter).unwrap();
    assert_eq!(system.state().kind(), StateKind::Scattered);

    // no further input: record every state the controller passes through
    let mut seen = vec![StateKind::Scattered];
    let mut elapsed = 0.0;
    while seen.len() < 6 {
        assert!(elapsed < 10.0, "stalled after {seen:?}");
        system.tick(DT);
        elapsed += DT;
        let kind = system.state().kind();
        if seen.last() != Some(&kind) {
            seen.push(kind);
        }
        if kind == StateKind::Formed
            && let PhotoSystemState::Formed(formed) = system.state()
        {
            assert!(formed.will_rescatter());
        }
    }
    assert_eq!(
        seen,
        [
            StateKind::Scattered,
            StateKind::Reforming,
            StateKind::Formed,
            StateKind::Scattered,
            StateKind::Reforming,
            StateKind::Formed,
        ]
    );
}

#[test]
fn manual_scatter_with_auto_reform_off_floats_until_told() {
    let mut cfg = quick_config(false);
    cfg.effects.reformation.auto = false;
    let mut system = PhotoSystem::new(cfg, line_formation(3), Some(4));
    system.set_library(library(3));
    system.handle(Action::StartFormation).unwrap();
    run_until(&mut system, 10.0, in_state(StateKind::Formed));

    system.handle(Action::StartScatter).unwrap();
    for _ in 0..(60 * 3) {
        system.tick(DT);
    }
    assert_eq!(system.state().kind(), StateKind::Scattered);

    system.handle(Action::StopAll).unwrap();
    assert_eq!(system.state().kind(), StateKind::Scattered);
    assert!(!system.photos().iter().any(|p| p.showcased));

    system.handle(Action::Reset).unwrap();
    assert_eq!(system.state().kind(), StateKind::Formed);
    for p in system.photos() {
        assert_eq!(p.phase, PhotoPhase::InFormation);
        assert_eq!(p.alpha, 1.0);
    }
}

#[test]
fn at_most_one_photo_is_showcased() {
    let mut cfg = quick_config(false);
    cfg.effects.reformation.auto = false;
    let mut system = PhotoSystem::new(cfg, line_formation(6), Some(5));
    system.set_library(library(6));
    system.handle(Action::StartFormation).unwrap();
    run_until(&mut system, 10.0, in_state(StateKind::Formed));

    system.handle(Action::StartScatter).unwrap();
    let mut showcased_seen = false;
    for _ in 0..(60 * 4) {
        system.tick(DT);
        let showcased = system.photos().iter().filter(|p| p.showcased).count();
        assert!(showcased <= 1);
        showcased_seen |= showcased == 1;
    }
    assert!(showcased_seen);
}

#[test]
fn effects_need_placed_photos() {
    let mut system = PhotoSystem::new(quick_config(false), line_formation(3), Some(1));
    system.set_library(library(3));
    let err = system.handle(Action::StartScatter).unwrap_err();
    assert!(matches!(err, Error::ActionUnavailable { .. }));
}

#[test]
fn frame_reports_state_and_sequence() {
    let system = formed_system(true, 2, 2);
    let frame = system.frame();
    assert_eq!(frame.state, StateKind::Formed);
    assert_eq!(frame.photos.len(), 2);
    assert!(frame.sequence.enabled);
    assert_eq!(frame.sequence.next, Key::Two);
    let json = serde_json::to_value(&frame).unwrap();
    assert_eq!(json["state"], "formed");
}
