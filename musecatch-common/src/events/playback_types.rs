//! Playback-related type definitions

use serde::{Deserialize, Serialize};

/// Transport state of the shared playback session
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Nothing playing; position is 0
    #[default]
    Idle,
    /// Source requested, waiting for metadata
    Loading,
    Playing,
    Paused,
    /// Engine failed for the current track (terminal until the next `play`)
    Error,
}

impl PlaybackState {
    /// Whether the session is (or is about to be) audible
    pub fn is_playing(self) -> bool {
        matches!(self, PlaybackState::Playing)
    }
}

impl std::fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlaybackState::Idle => write!(f, "idle"),
            PlaybackState::Loading => write!(f, "loading"),
            PlaybackState::Playing => write!(f, "playing"),
            PlaybackState::Paused => write!(f, "paused"),
            PlaybackState::Error => write!(f, "error"),
        }
    }
}
