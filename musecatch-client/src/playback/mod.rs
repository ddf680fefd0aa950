//! Playback: one engine, one session, many observers
//!
//! [`PlaybackController`] is cheap to clone; every UI surface holds a
//! handle to the same controller. A process-wide instance can be installed
//! once and fetched with [`global`].

mod controller;
mod engine;
mod track;
mod waveform;

pub use controller::{PlaybackController, PlaybackSession, DEFAULT_VOLUME};
pub use engine::{AudioEngine, EngineCallbacks, EngineEvent, EngineFactory};
pub use track::{artist_from_filename, Track, UNKNOWN_ARTIST};
pub use waveform::{Bar, WaveformAnimator, DEFAULT_BAR_COUNT, DEFAULT_BAR_GAP};

use crate::error::{Error, Result};
use once_cell::sync::OnceCell;

static GLOBAL: OnceCell<PlaybackController> = OnceCell::new();

/// Install the process-wide controller; fails if one is already installed
pub fn install(controller: PlaybackController) -> Result<PlaybackController> {
    GLOBAL
        .set(controller)
        .map_err(|_| Error::Playback("playback controller already installed".to_string()))?;
    global().ok_or_else(|| Error::Playback("playback controller missing".to_string()))
}

/// The process-wide controller, if installed
pub fn global() -> Option<PlaybackController> {
    GLOBAL.get().cloned()
}

/// The process-wide controller, installing one built from `factory` if absent
///
/// `factory` runs at most once across all callers.
pub fn global_or_init(factory: impl FnOnce() -> EngineFactory) -> PlaybackController {
    GLOBAL
        .get_or_init(|| PlaybackController::new(factory()))
        .clone()
}
