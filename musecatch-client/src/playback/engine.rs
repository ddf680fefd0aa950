//! Audio engine seam
//!
//! The controller drives exactly one [`AudioEngine`]; the engine reports
//! back through [`EngineCallbacks`]. Callbacks may be emitted synchronously
//! from inside an engine command or later from any thread.

use super::controller::Shared;
use crate::error::Result;
use std::sync::Weak;

/// Notification from the engine; the authoritative source of session state
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Playback position advanced (seconds)
    TimeUpdate(f64),
    /// Metadata loaded; total duration known (seconds)
    DurationKnown(f64),
    /// Output started
    Started,
    /// Output paused
    Paused,
    /// Stalled waiting for data
    Waiting,
    /// Enough data buffered to continue immediately
    CanPlay,
    /// Reached the end of the source
    Ended,
    /// Engine failure for the current source
    Error(String),
}

/// Playback engine operations
///
/// Implementations wrap whatever actually produces sound. Only
/// `PlaybackController` calls these.
pub trait AudioEngine: Send {
    /// Replace the current source; playback does not start until `play`
    fn load(&mut self, locator: &str) -> Result<()>;

    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    /// Seek to an absolute position (seconds)
    fn seek(&mut self, seconds: f64);

    /// Output gain in [0, 1]
    fn set_volume(&mut self, volume: f32);

    /// Stop output and release the audible stream
    fn stop(&mut self);
}

/// Builds the engine on first use; called at most once per controller
pub type EngineFactory = Box<dyn FnOnce(EngineCallbacks) -> Box<dyn AudioEngine> + Send>;

/// Handle the engine uses to report [`EngineEvent`]s
///
/// Holds only a weak reference, so an engine outliving its controller
/// reports into nothing.
#[derive(Clone)]
pub struct EngineCallbacks {
    shared: Weak<Shared>,
}

impl EngineCallbacks {
    pub(super) fn new(shared: Weak<Shared>) -> Self {
        Self { shared }
    }

    /// Report an engine event to the controller
    pub fn emit(&self, event: EngineEvent) {
        if let Some(shared) = self.shared.upgrade() {
            shared.apply_engine_event(event);
        }
    }
}

impl std::fmt::Debug for EngineCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineCallbacks")
            .field("attached", &(self.shared.strong_count() > 0))
            .finish()
    }
}
