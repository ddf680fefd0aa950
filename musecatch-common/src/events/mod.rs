//! Notice types and the broadcast `EventBus`
//!
//! Notices are the only user-visible outcome of the sync and playback core:
//! transport hiccups are handled locally and surface here at most as a
//! transient notice, never as an error returned to rendering code.

mod playback_types;

pub use playback_types::PlaybackState;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// User-facing notification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Notice {
    /// A download task was accepted by the backend
    TaskStarted {
        task_id: String,
        song_name: String,
        timestamp: DateTime<Utc>,
    },

    /// `POST /tasks` was rejected or failed
    SubmitFailed {
        song_name: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Terminal event reported success
    TaskSucceeded {
        task_id: String,
        filename: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Terminal event reported failure (not retried automatically)
    TaskFailed {
        task_id: String,
        error: String,
        timestamp: DateTime<Utc>,
    },

    /// Push channel dropped; progress continues via polling
    StreamInterrupted {
        task_id: String,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// The snapshot poller observed the tracked queue item finish
    DownloadFinished {
        queue_id: Option<i64>,
        timestamp: DateTime<Utc>,
    },

    /// Batch add accepted
    QueueAdded {
        count: u64,
        timestamp: DateTime<Utc>,
    },

    /// Queue row deleted
    QueueItemDeleted {
        queue_id: i64,
        timestamp: DateTime<Utc>,
    },

    /// Queue row deletion rejected or failed
    DeleteFailed {
        queue_id: i64,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Request refused before reaching the backend (e.g. blank query)
    InputRejected {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Playback engine reported an error for the current track
    PlaybackFailed {
        track_id: i64,
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl Notice {
    /// Whether the notice reports a failure
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Notice::TaskFailed { .. }
                | Notice::SubmitFailed { .. }
                | Notice::DeleteFailed { .. }
                | Notice::InputRejected { .. }
                | Notice::PlaybackFailed { .. }
        )
    }

    /// Whether the notice is transient (informational, auto-dismissed)
    pub fn is_transient(&self) -> bool {
        matches!(self, Notice::StreamInterrupted { .. })
    }

    /// Human-readable text for toasts and terminal output
    pub fn message(&self) -> String {
        match self {
            Notice::TaskStarted { song_name, .. } => format!("Download started: {}", song_name),
            Notice::SubmitFailed { song_name, message, .. } => {
                format!("Could not start {}: {}", song_name, message)
            }
            Notice::TaskSucceeded { filename, .. } => match filename {
                Some(name) => format!("Download complete: {}", name),
                None => "Download complete".to_string(),
            },
            Notice::TaskFailed { error, .. } => format!("Download failed: {}", error),
            Notice::StreamInterrupted { .. } => {
                "Live progress lost, falling back to polling".to_string()
            }
            Notice::DownloadFinished { queue_id, .. } => match queue_id {
                Some(id) => format!("Queue item #{} finished", id),
                None => "Queue download finished".to_string(),
            },
            Notice::QueueAdded { count, .. } => format!("Added {} song(s) to the queue", count),
            Notice::QueueItemDeleted { queue_id, .. } => format!("Removed queue item #{}", queue_id),
            Notice::DeleteFailed { queue_id, message, .. } => {
                format!("Failed to remove #{}: {}", queue_id, message)
            }
            Notice::InputRejected { message, .. } => message.clone(),
            Notice::PlaybackFailed { message, .. } => format!("Playback failed: {}", message),
        }
    }
}

/// Broadcast channel for [`Notice`] values
///
/// Cloned receivers see every notice emitted after they subscribed; slow
/// receivers lose the oldest notices once `capacity` is exceeded.
pub struct EventBus {
    tx: broadcast::Sender<Notice>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with specified channel capacity
    ///
    /// # Examples
    ///
    /// ```
    /// use musecatch_common::events::EventBus;
    ///
    /// let bus = EventBus::new(64);
    /// assert_eq!(bus.capacity(), 64);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future notices
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    /// Emit a notice to all subscribers
    ///
    /// Returns `Ok(subscriber_count)` if at least one subscriber exists.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, notice: Notice) -> Result<usize, broadcast::error::SendError<Notice>> {
        self.tx.send(notice)
    }

    /// Emit a notice, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, notice: Notice) {
        let _ = self.tx.send(notice);
    }

    /// Get the current number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Get the configured channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}
