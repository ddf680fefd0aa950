//! Shared playback controller
//!
//! Owns the one audio engine of the process and the one [`PlaybackSession`]
//! every UI surface observes. Consumers clone the controller handle and
//! issue intents; they never write session state directly.
//!
//! **State machine** (intents and engine callbacks):
//!
//! | event            | effect                                                       |
//! |------------------|--------------------------------------------------------------|
//! | `play(new)`      | any → loading, position/progress 0, duration from track      |
//! | `play(same)`     | paused/idle → playing; loading/playing unchanged; error → reload |
//! | `pause`          | playing/loading → paused; otherwise no-op                    |
//! | `resume`         | paused/idle (with track) → playing; otherwise no-op          |
//! | `close`          | any → idle, track unloaded, position 0, hidden               |
//! | `DurationKnown`  | store duration, clear loading; loading → playing             |
//! | `TimeUpdate`     | position/progress, only once duration is known               |
//! | `Started`        | loading/paused/idle (with track) → playing                   |
//! | `Paused`         | playing/loading → paused                                     |
//! | `Waiting`        | loading flag set (track loaded, not idle/error)              |
//! | `CanPlay`        | loading flag cleared                                         |
//! | `Ended`          | any (with track) → idle, position/progress 0                 |
//! | `Error`          | any (with track) → error, loading cleared                    |
//!
//! Callbacks not listed for a state leave it unchanged.

use super::engine::{AudioEngine, EngineCallbacks, EngineEvent, EngineFactory};
use super::track::Track;
use crate::error::{Error, Result};
use chrono::Utc;
use musecatch_common::api::types::clamp_percent;
use musecatch_common::events::{EventBus, Notice, PlaybackState};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// Default output volume
pub const DEFAULT_VOLUME: f32 = 0.75;

/// Observable playback state shared by all consumers
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackSession {
    pub current_track: Option<Track>,
    pub state: PlaybackState,
    pub position_seconds: f64,
    /// 0 until known (declared by the track or reported by the engine)
    pub duration_seconds: f64,
    /// position / duration * 100, 0 while duration is unknown
    pub progress: f64,
    /// Buffering or waiting for metadata
    pub loading: bool,
    pub volume: f32,
    /// Mini-player shown
    pub visible: bool,
    pub error: Option<String>,
}

impl Default for PlaybackSession {
    fn default() -> Self {
        Self {
            current_track: None,
            state: PlaybackState::Idle,
            position_seconds: 0.0,
            duration_seconds: 0.0,
            progress: 0.0,
            loading: false,
            volume: DEFAULT_VOLUME,
            visible: false,
            error: None,
        }
    }
}

impl PlaybackSession {
    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    fn track_id(&self) -> Option<i64> {
        self.current_track.as_ref().map(|t| t.id)
    }

    fn reset_position(&mut self) {
        self.position_seconds = 0.0;
        self.progress = 0.0;
    }
}

struct SessionInner {
    session: PlaybackSession,
    /// Engine reported metadata for the current source
    metadata_loaded: bool,
}

/// State shared between controller handles and engine callbacks
///
/// Lock order: `engine` may be held while `session` is taken (engine
/// callbacks emitted synchronously), never the reverse.
pub(crate) struct Shared {
    factory: Mutex<Option<EngineFactory>>,
    engine: Mutex<Option<Box<dyn AudioEngine>>>,
    session: Mutex<SessionInner>,
    watch_tx: watch::Sender<PlaybackSession>,
    bus: Option<Arc<EventBus>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Handle to the shared playback controller; clones share one engine
#[derive(Clone)]
pub struct PlaybackController {
    shared: Arc<Shared>,
}

impl PlaybackController {
    /// Create a controller; the engine is built by `factory` on first use
    pub fn new(factory: EngineFactory) -> Self {
        Self::build(factory, None)
    }

    /// Create a controller that reports playback failures on `bus`
    pub fn with_event_bus(factory: EngineFactory, bus: Arc<EventBus>) -> Self {
        Self::build(factory, Some(bus))
    }

    fn build(factory: EngineFactory, bus: Option<Arc<EventBus>>) -> Self {
        let (watch_tx, _) = watch::channel(PlaybackSession::default());
        Self {
            shared: Arc::new(Shared {
                factory: Mutex::new(Some(factory)),
                engine: Mutex::new(None),
                session: Mutex::new(SessionInner {
                    session: PlaybackSession::default(),
                    metadata_loaded: false,
                }),
                watch_tx,
                bus,
            }),
        }
    }

    /// Current session snapshot
    pub fn session(&self) -> PlaybackSession {
        lock(&self.shared.session).session.clone()
    }

    /// Observe every session change
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSession> {
        self.shared.watch_tx.subscribe()
    }

    /// Whether the engine has been created
    pub fn engine_started(&self) -> bool {
        lock(&self.shared.engine).is_some()
    }

    /// Whether two handles refer to the same controller
    pub fn same_as(&self, other: &PlaybackController) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    // ========================================
    // Intents
    // ========================================

    /// Play `track`; resumes instead if it is already the loaded track
    pub fn play(&self, track: Track) -> Result<()> {
        enum Action {
            Nothing,
            Resume,
            Load,
        }

        let action = self.shared.update(|inner| {
            let session = &mut inner.session;
            session.visible = true;
            let same = session.track_id() == Some(track.id);

            if same && session.state != PlaybackState::Error {
                return match session.state {
                    PlaybackState::Paused | PlaybackState::Idle => {
                        session.state = PlaybackState::Playing;
                        Action::Resume
                    }
                    _ => Action::Nothing,
                };
            }

            session.current_track = Some(track.clone());
            session.state = PlaybackState::Loading;
            session.reset_position();
            session.duration_seconds = declared_duration(&track);
            session.loading = true;
            session.error = None;
            inner.metadata_loaded = false;
            Action::Load
        });

        match action {
            Action::Nothing => Ok(()),
            Action::Resume => {
                debug!(track_id = track.id, "Resuming loaded track");
                self.shared.with_engine(|engine| engine.play())
            }
            Action::Load => {
                info!(track_id = track.id, title = %track.title, "Loading track");
                self.shared.with_engine(|engine| {
                    engine.load(&track.stream_locator)?;
                    engine.play()
                })
            }
        }
    }

    /// Pause output
    pub fn pause(&self) {
        let changed = self.shared.update(|inner| {
            let session = &mut inner.session;
            match session.state {
                PlaybackState::Playing | PlaybackState::Loading => {
                    session.state = PlaybackState::Paused;
                    true
                }
                _ => false,
            }
        });
        if changed {
            let _ = self.shared.with_engine(|engine| {
                engine.pause();
                Ok(())
            });
        }
    }

    /// Resume the loaded track
    pub fn resume(&self) -> Result<()> {
        let changed = self.shared.update(|inner| {
            let session = &mut inner.session;
            match session.state {
                PlaybackState::Paused | PlaybackState::Idle if session.current_track.is_some() => {
                    session.state = PlaybackState::Playing;
                    true
                }
                _ => false,
            }
        });
        if changed {
            self.shared.with_engine(|engine| engine.play())
        } else {
            Ok(())
        }
    }

    /// Pause if playing, resume if paused; never loads a new track
    pub fn toggle_play(&self) -> Result<()> {
        match self.session().state {
            PlaybackState::Playing | PlaybackState::Loading => {
                self.pause();
                Ok(())
            }
            PlaybackState::Paused | PlaybackState::Idle => self.resume(),
            PlaybackState::Error => Ok(()),
        }
    }

    /// Seek to an absolute position; no-op until the duration is known
    pub fn seek(&self, seconds: f64) {
        let target = self.shared.update(|inner| {
            let session = &mut inner.session;
            let duration = session.duration_seconds;
            if duration <= 0.0 || session.current_track.is_none() {
                return None;
            }
            let target = if seconds.is_nan() {
                0.0
            } else {
                seconds.clamp(0.0, duration)
            };
            session.position_seconds = target;
            session.progress = target / duration * 100.0;
            Some(target)
        });

        if let Some(target) = target {
            debug!(seconds = target, "Seeking");
            let _ = self.shared.with_engine(|engine| {
                engine.seek(target);
                Ok(())
            });
        }
    }

    /// Seek to a percentage of the known duration (clamped to [0, 100])
    pub fn seek_percent(&self, percent: f64) {
        let duration = self.session().duration_seconds;
        if duration <= 0.0 {
            return;
        }
        self.seek(clamp_percent(percent) / 100.0 * duration);
    }

    /// Set output volume (clamped to [0, 1])
    pub fn set_volume(&self, volume: f32) {
        let volume = if volume.is_nan() {
            0.0
        } else {
            volume.clamp(0.0, 1.0)
        };
        self.shared.update(|inner| inner.session.volume = volume);
        if self.engine_started() {
            let _ = self.shared.with_engine(|engine| {
                engine.set_volume(volume);
                Ok(())
            });
        }
    }

    /// Stop output, unload the track and hide the player
    pub fn close(&self) {
        self.shared.update(|inner| {
            let volume = inner.session.volume;
            inner.session = PlaybackSession {
                volume,
                ..PlaybackSession::default()
            };
            inner.metadata_loaded = false;
        });
        if let Some(engine) = lock(&self.shared.engine).as_mut() {
            engine.stop();
        }
        debug!("Playback closed");
    }

    /// Apply an engine callback (normally called via [`EngineCallbacks`])
    pub fn handle_engine_event(&self, event: EngineEvent) {
        self.shared.apply_engine_event(event);
    }
}

impl std::fmt::Debug for PlaybackController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlaybackController")
            .field("session", &self.session())
            .finish()
    }
}

impl Shared {
    /// Mutate the session and publish the result
    fn update<R>(&self, f: impl FnOnce(&mut SessionInner) -> R) -> R {
        let mut inner = lock(&self.session);
        let result = f(&mut inner);
        self.watch_tx.send_replace(inner.session.clone());
        result
    }

    /// Run `f` against the engine, creating it on first use
    fn with_engine(
        self: &Arc<Self>,
        f: impl FnOnce(&mut Box<dyn AudioEngine>) -> Result<()>,
    ) -> Result<()> {
        let mut engine = lock(&self.engine);
        if engine.is_none() {
            let factory = lock(&self.factory)
                .take()
                .ok_or_else(|| Error::Playback("engine factory already consumed".to_string()))?;
            info!("Creating playback engine");
            let mut created = factory(EngineCallbacks::new(Arc::downgrade(self)));
            created.set_volume(lock(&self.session).session.volume);
            *engine = Some(created);
        }

        let Some(engine) = engine.as_mut() else {
            return Err(Error::Playback("engine unavailable".to_string()));
        };
        let result = f(engine);
        if let Err(e) = &result {
            // Command failures are engine errors for the current track
            self.apply_engine_event(EngineEvent::Error(e.to_string()));
        }
        result
    }

    pub(crate) fn apply_engine_event(&self, event: EngineEvent) {
        let failed = self.update(|inner| {
            let SessionInner {
                session,
                metadata_loaded,
            } = inner;
            if session.current_track.is_none() {
                debug!(?event, "Engine event with no track loaded");
                return None;
            }

            match event {
                EngineEvent::TimeUpdate(position) => {
                    let duration = session.duration_seconds;
                    let active = !matches!(session.state, PlaybackState::Idle | PlaybackState::Error);
                    if *metadata_loaded && active && duration > 0.0 && position.is_finite() {
                        session.position_seconds = position.clamp(0.0, duration);
                        session.progress = session.position_seconds / duration * 100.0;
                    }
                }
                EngineEvent::DurationKnown(duration) => {
                    if duration.is_finite() && duration > 0.0 {
                        session.duration_seconds = duration;
                        *metadata_loaded = true;
                    }
                    session.loading = false;
                    if session.state == PlaybackState::Loading {
                        session.state = PlaybackState::Playing;
                    }
                }
                EngineEvent::Started => {
                    if matches!(
                        session.state,
                        PlaybackState::Loading | PlaybackState::Paused | PlaybackState::Idle
                    ) {
                        session.state = PlaybackState::Playing;
                    }
                }
                EngineEvent::Paused => {
                    if matches!(session.state, PlaybackState::Playing | PlaybackState::Loading) {
                        session.state = PlaybackState::Paused;
                    }
                }
                EngineEvent::Waiting => {
                    if !matches!(session.state, PlaybackState::Idle | PlaybackState::Error) {
                        session.loading = true;
                    }
                }
                EngineEvent::CanPlay => session.loading = false,
                EngineEvent::Ended => {
                    session.state = PlaybackState::Idle;
                    session.loading = false;
                    session.reset_position();
                }
                EngineEvent::Error(message) => {
                    session.state = PlaybackState::Error;
                    session.loading = false;
                    session.error = Some(message.clone());
                    return session.track_id().map(|id| (id, message));
                }
            }
            None
        });

        if let Some((track_id, message)) = failed {
            warn!(track_id, error = %message, "Playback engine error");
            if let Some(bus) = &self.bus {
                bus.emit_lossy(Notice::PlaybackFailed {
                    track_id,
                    message,
                    timestamp: Utc::now(),
                });
            }
        }
    }
}

fn declared_duration(track: &Track) -> f64 {
    if track.duration_seconds.is_finite() && track.duration_seconds > 0.0 {
        track.duration_seconds
    } else {
        0.0
    }
}
