//! Playback controller integration tests
//!
//! Drives the controller with a recording engine and replays engine
//! callbacks the way a real engine would report them.

mod helpers;

use helpers::{fake_engine_factory, EngineCommand, EngineProbe};
use musecatch_client::playback::{
    EngineEvent, PlaybackController, Track, WaveformAnimator, DEFAULT_VOLUME,
};
use musecatch_common::events::{EventBus, Notice, PlaybackState};
use std::sync::Arc;
use std::time::Duration;

fn controller() -> (PlaybackController, EngineProbe) {
    let (factory, probe) = fake_engine_factory();
    (PlaybackController::new(factory), probe)
}

fn track(id: i64, title: &str) -> Track {
    Track {
        id,
        title: title.to_string(),
        artist: "周杰伦".to_string(),
        cover_url: None,
        duration_seconds: 0.0,
        stream_locator: format!("http://localhost:8889/api/v1/songs/{}/stream", id),
    }
}

/// Play `track` and let the engine report it as started with `duration`
fn start(controller: &PlaybackController, probe: &EngineProbe, track: Track, duration: f64) {
    controller.play(track).unwrap();
    probe.emit(EngineEvent::DurationKnown(duration));
    probe.emit(EngineEvent::Started);
}

#[test]
fn test_play_new_track_loads_and_starts() {
    let (controller, probe) = controller();
    controller.play(track(1, "晴天")).unwrap();

    let session = controller.session();
    assert_eq!(session.state, PlaybackState::Loading);
    assert!(session.loading);
    assert!(session.visible);
    assert_eq!(session.current_track.as_ref().map(|t| t.id), Some(1));
    assert_eq!(
        probe.commands(),
        vec![
            EngineCommand::SetVolume(DEFAULT_VOLUME),
            EngineCommand::Load("http://localhost:8889/api/v1/songs/1/stream".to_string()),
            EngineCommand::Play,
        ]
    );

    probe.emit(EngineEvent::DurationKnown(269.0));
    let session = controller.session();
    assert_eq!(session.state, PlaybackState::Playing);
    assert_eq!(session.duration_seconds, 269.0);
    assert!(!session.loading);
    assert!(controller.session().is_playing());
}

#[test]
fn test_play_same_track_resumes_without_reload() {
    let (controller, probe) = controller();
    start(&controller, &probe, track(1, "晴天"), 269.0);
    probe.emit(EngineEvent::TimeUpdate(100.0));
    controller.pause();
    assert_eq!(controller.session().state, PlaybackState::Paused);

    probe.clear_commands();
    controller.play(track(1, "晴天")).unwrap();

    let session = controller.session();
    assert_eq!(session.state, PlaybackState::Playing);
    assert_eq!(session.position_seconds, 100.0, "position kept on resume");
    assert_eq!(probe.commands(), vec![EngineCommand::Play]);

    // Already playing: nothing to do
    probe.clear_commands();
    controller.play(track(1, "晴天")).unwrap();
    assert!(probe.commands().is_empty());
}

#[test]
fn test_play_different_track_resets_position() {
    let (controller, probe) = controller();
    start(&controller, &probe, track(1, "晴天"), 269.0);
    probe.emit(EngineEvent::TimeUpdate(120.0));
    assert!(controller.session().progress > 0.0);

    probe.clear_commands();
    controller.play(track(2, "稻香")).unwrap();

    let session = controller.session();
    assert_eq!(session.current_track.as_ref().map(|t| t.id), Some(2));
    assert_eq!(session.state, PlaybackState::Loading);
    assert_eq!(session.position_seconds, 0.0);
    assert_eq!(session.progress, 0.0);
    assert_eq!(session.duration_seconds, 0.0);
    assert!(matches!(probe.commands().first(), Some(EngineCommand::Load(_))));

    // Position from the old source is ignored until new metadata arrives
    probe.emit(EngineEvent::TimeUpdate(121.0));
    assert_eq!(controller.session().position_seconds, 0.0);
}

#[test]
fn test_seek_percent_clamps_and_requires_duration() {
    let (controller, probe) = controller();

    controller.play(track(1, "晴天")).unwrap();
    controller.seek_percent(50.0);
    assert_eq!(controller.session().position_seconds, 0.0);
    assert!(!probe.commands().contains(&EngineCommand::Seek(0.0)));

    probe.emit(EngineEvent::DurationKnown(200.0));
    probe.clear_commands();

    controller.seek_percent(25.0);
    assert_eq!(controller.session().position_seconds, 50.0);
    assert_eq!(controller.session().progress, 25.0);

    controller.seek_percent(150.0);
    assert_eq!(controller.session().position_seconds, 200.0);

    controller.seek_percent(-10.0);
    assert_eq!(controller.session().position_seconds, 0.0);

    assert_eq!(
        probe.commands(),
        vec![
            EngineCommand::Seek(50.0),
            EngineCommand::Seek(200.0),
            EngineCommand::Seek(0.0),
        ]
    );
}

#[test]
fn test_toggle_play_never_loads() {
    let (controller, probe) = controller();

    // Nothing loaded: toggling does nothing
    controller.toggle_play().unwrap();
    assert_eq!(controller.session().state, PlaybackState::Idle);
    assert_eq!(probe.created(), 0);

    start(&controller, &probe, track(1, "晴天"), 180.0);
    controller.toggle_play().unwrap();
    assert_eq!(controller.session().state, PlaybackState::Paused);
    controller.toggle_play().unwrap();
    assert_eq!(controller.session().state, PlaybackState::Playing);

    let loads = probe
        .commands()
        .iter()
        .filter(|c| matches!(c, EngineCommand::Load(_)))
        .count();
    assert_eq!(loads, 1);
}

#[test]
fn test_ended_returns_to_idle() {
    let (controller, probe) = controller();
    start(&controller, &probe, track(1, "晴天"), 180.0);
    probe.emit(EngineEvent::TimeUpdate(179.5));

    probe.emit(EngineEvent::Ended);
    let session = controller.session();
    assert_eq!(session.state, PlaybackState::Idle);
    assert_eq!(session.position_seconds, 0.0);
    assert_eq!(session.progress, 0.0);
    assert!(session.current_track.is_some(), "track stays loaded for replay");

    // Replaying the same track resumes without reloading
    probe.clear_commands();
    controller.play(track(1, "晴天")).unwrap();
    assert_eq!(controller.session().state, PlaybackState::Playing);
    assert_eq!(probe.commands(), vec![EngineCommand::Play]);
}

#[test]
fn test_engine_error_reports_notice() {
    let (factory, probe) = fake_engine_factory();
    let bus = Arc::new(EventBus::new(16));
    let mut notices = bus.subscribe();
    let controller = PlaybackController::with_event_bus(factory, Arc::clone(&bus));

    start(&controller, &probe, track(1, "晴天"), 180.0);
    probe.emit(EngineEvent::Error("decode failed".to_string()));

    let session = controller.session();
    assert_eq!(session.state, PlaybackState::Error);
    assert_eq!(session.error.as_deref(), Some("decode failed"));
    assert!(!session.loading);

    match notices.try_recv().unwrap() {
        Notice::PlaybackFailed {
            track_id, message, ..
        } => {
            assert_eq!(track_id, 1);
            assert_eq!(message, "decode failed");
        }
        other => panic!("unexpected notice: {:?}", other),
    }

    // Same track after an error is reloaded
    probe.clear_commands();
    controller.play(track(1, "晴天")).unwrap();
    assert!(matches!(probe.commands().first(), Some(EngineCommand::Load(_))));
    assert_eq!(controller.session().state, PlaybackState::Loading);
    assert!(controller.session().error.is_none());
}

#[test]
fn test_load_failure_enters_error_state() {
    let (controller, probe) = controller();
    controller.play(track(1, "晴天")).unwrap();
    probe.fail_next_load("unsupported format");

    assert!(controller.play(track(2, "稻香")).is_err());
    let session = controller.session();
    assert_eq!(session.state, PlaybackState::Error);
    assert_eq!(session.current_track.as_ref().map(|t| t.id), Some(2));
}

#[test]
fn test_engine_created_once_across_handles() {
    let (controller, probe) = controller();
    let other = controller.clone();
    assert!(controller.same_as(&other));

    controller.play(track(1, "晴天")).unwrap();
    other.play(track(2, "稻香")).unwrap();
    other.pause();
    controller.set_volume(0.3);
    assert_eq!(probe.created(), 1);
    assert_eq!(other.session().volume, 0.3);
}

#[test]
fn test_close_unloads_and_hides() {
    let (controller, probe) = controller();
    controller.set_volume(0.4);
    start(&controller, &probe, track(1, "晴天"), 180.0);
    probe.emit(EngineEvent::TimeUpdate(30.0));

    controller.close();
    let session = controller.session();
    assert_eq!(session.state, PlaybackState::Idle);
    assert!(session.current_track.is_none());
    assert!(!session.visible);
    assert_eq!(session.position_seconds, 0.0);
    assert_eq!(session.volume, 0.4);
    assert_eq!(probe.commands().last(), Some(&EngineCommand::Stop));

    // Late callbacks from the stopped source change nothing
    probe.emit(EngineEvent::TimeUpdate(31.0));
    probe.emit(EngineEvent::Started);
    assert_eq!(controller.session().state, PlaybackState::Idle);
}

#[test]
fn test_buffering_flags() {
    let (controller, probe) = controller();
    start(&controller, &probe, track(1, "晴天"), 180.0);

    probe.emit(EngineEvent::Waiting);
    assert!(controller.session().loading);
    assert_eq!(controller.session().state, PlaybackState::Playing);
    probe.emit(EngineEvent::CanPlay);
    assert!(!controller.session().loading);

    probe.emit(EngineEvent::Paused);
    assert_eq!(controller.session().state, PlaybackState::Paused);
}

#[tokio::test]
async fn test_observers_see_session_changes() {
    let (controller, probe) = controller();
    let mut rx = controller.subscribe();

    start(&controller, &probe, track(1, "晴天"), 200.0);
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow_and_update().state, PlaybackState::Playing);

    probe.emit(EngineEvent::TimeUpdate(50.0));
    rx.changed().await.unwrap();
    assert_eq!(rx.borrow().progress, 25.0);
}

#[test]
fn test_waveform_follows_session() {
    let (controller, probe) = controller();
    let animator = WaveformAnimator::default();
    assert!(animator
        .frame_for(&controller.session(), Duration::from_millis(16))
        .is_none());

    start(&controller, &probe, track(1, "晴天"), 200.0);
    let bars = animator
        .frame_for(&controller.session(), Duration::from_millis(16))
        .unwrap();
    assert_eq!(bars.len(), animator.bar_count());

    controller.pause();
    assert!(animator
        .frame_for(&controller.session(), Duration::from_millis(32))
        .is_none());
}
