//! Progress synchronization
//!
//! Two independent producers report download progress:
//! - [`ProgressStream`]: server push for one task (preferred, low latency)
//! - [`SnapshotPoller`]: periodic `GET /queue/current` (fallback and reload
//!   recovery)
//!
//! [`QueueSyncCoordinator`] consumes both and applies the precedence rules.

pub mod coordinator;
pub mod progress_stream;
pub mod snapshot_poller;

pub use coordinator::{
    parse_song_lines, DownloadPointer, PointerOrigin, QueueSyncCoordinator, RowProgress, RowView,
    SyncMessage, Task,
};
pub use progress_stream::ProgressStream;
pub use snapshot_poller::SnapshotPoller;
