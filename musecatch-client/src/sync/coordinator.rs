//! Queue sync coordinator
//!
//! Merges the queue list, aggregate stats and the current-download signal
//! (push stream or snapshot poller) into one per-row view.
//!
//! **Ownership of displayed progress:**
//! - One download pointer is authoritative at any moment.
//! - While a progress stream is open for a task, its events drive the
//!   pointer. Snapshots during that window are only compared against it: if
//!   they name a different active queue id, the snapshot wins and the
//!   disagreement is logged (the stream is left to close itself).
//! - Without a stream, snapshots drive the pointer. A tracked download that
//!   the snapshot reports as idle is complete: the pointer is cleared, the
//!   poller stops and the list is refreshed once.
//! - A row shows progress only while its id equals the pointer's queue id.
//!
//! All mutation happens in `&mut self` handlers. Producers never touch
//! coordinator state; they forward [`SyncMessage`]s into a channel that the
//! owner drains with [`QueueSyncCoordinator::next_message`] +
//! [`QueueSyncCoordinator::handle`], one message at a time.

use super::progress_stream::ProgressStream;
use super::snapshot_poller::SnapshotPoller;
use crate::api::QueueBackend;
use crate::error::{Error, Result};
use chrono::Utc;
use musecatch_common::api::{
    AddToQueueRequest, AddToQueueResponse, CreateTaskRequest, CurrentDownloadSnapshot,
    ProgressEvent, QueueItem, QueueStats, QueueStatus, SourceType,
};
use musecatch_common::config::ClientConfig;
use musecatch_common::events::{EventBus, Notice};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Priority sent for "high priority" batch adds
pub const HIGH_PRIORITY: i32 = 10;

/// Priority sent for normal batch adds
pub const NORMAL_PRIORITY: i32 = 0;

/// Signal from a producer to the coordinator
#[derive(Debug, Clone)]
pub enum SyncMessage {
    /// Progress event from the stream for `task_id`
    StreamEvent { task_id: String, event: ProgressEvent },
    /// The stream for `task_id` failed and closed
    StreamError { task_id: String, error: String },
    /// Snapshot fetched by the poller started as `generation`
    Snapshot {
        generation: u64,
        snapshot: CurrentDownloadSnapshot,
    },
}

/// An in-flight download task created via `POST /tasks`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    pub subject_name: String,
    pub requested_source: Option<SourceType>,
}

/// Which producer last set the download pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerOrigin {
    Stream,
    Snapshot,
}

/// The coordinator's notion of "what is downloading right now"
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadPointer {
    /// Queue row being downloaded, if known
    pub queue_id: Option<i64>,
    /// Task whose stream owns the pointer (stream origin only)
    pub task_id: Option<String>,
    pub song_name: Option<String>,
    pub percent: f64,
    pub status_text: String,
    pub origin: PointerOrigin,
}

impl DownloadPointer {
    fn from_snapshot(snapshot: &CurrentDownloadSnapshot) -> Self {
        let event = ProgressEvent::from_snapshot(snapshot);
        Self {
            queue_id: snapshot.queue_id,
            task_id: None,
            song_name: snapshot.song_name.clone(),
            percent: event.percent,
            status_text: event.status_text,
            origin: PointerOrigin::Snapshot,
        }
    }

    fn for_task(task: &Task) -> Self {
        Self {
            queue_id: None,
            task_id: Some(task.id.clone()),
            song_name: Some(task.subject_name.clone()),
            percent: 0.0,
            status_text: String::new(),
            origin: PointerOrigin::Stream,
        }
    }

    fn is_owned_by(&self, task_id: &str) -> bool {
        self.origin == PointerOrigin::Stream && self.task_id.as_deref() == Some(task_id)
    }
}

/// Progress shown on a row
#[derive(Debug, Clone, PartialEq)]
pub struct RowProgress {
    pub percent: f64,
    pub status_text: String,
}

/// Render-ready view of one queue row
#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub id: i64,
    pub name: String,
    pub source: Option<SourceType>,
    pub status: QueueStatus,
    pub priority: i32,
    pub error_message: Option<String>,
    /// `None` for every row except the one the pointer names
    pub progress: Option<RowProgress>,
}

struct ActiveStream {
    task: Task,
    handle: ProgressStream,
}

struct ActivePoller {
    generation: u64,
    handle: SnapshotPoller,
}

/// Single owner of the merged queue view
pub struct QueueSyncCoordinator {
    backend: Arc<dyn QueueBackend>,
    config: ClientConfig,
    bus: Arc<EventBus>,
    tx: mpsc::UnboundedSender<SyncMessage>,
    rx: mpsc::UnboundedReceiver<SyncMessage>,
    items: Vec<QueueItem>,
    stats: QueueStats,
    pointer: Option<DownloadPointer>,
    query: String,
    stream: Option<ActiveStream>,
    poller: Option<ActivePoller>,
    next_generation: u64,
    idle_ticks: u32,
}

impl QueueSyncCoordinator {
    pub fn new(backend: Arc<dyn QueueBackend>, config: ClientConfig, bus: Arc<EventBus>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            backend,
            config,
            bus,
            tx,
            rx,
            items: Vec::new(),
            stats: QueueStats::default(),
            pointer: None,
            query: String::new(),
            stream: None,
            poller: None,
            next_generation: 0,
            idle_ticks: 0,
        }
    }

    // ========================================
    // Lifecycle
    // ========================================

    /// Reload recovery, then initial list load
    ///
    /// A live subscription never survives a reload, so the only way to pick
    /// up an in-progress download is one snapshot fetched before anything
    /// else. If it reports a download, that becomes the initial pointer and
    /// polling starts; otherwise no poller is started.
    pub async fn mount(&mut self) {
        match self.backend.current_download().await {
            Ok(snapshot) if snapshot.downloading => {
                info!(
                    queue_id = ?snapshot.queue_id,
                    percent = snapshot.percent,
                    "Recovered in-progress download"
                );
                self.pointer = Some(DownloadPointer::from_snapshot(&snapshot));
                self.ensure_polling();
            }
            Ok(_) => debug!("No download in progress at mount"),
            Err(e) => warn!(error = %e, "Recovery snapshot failed"),
        }

        if let Err(e) = self.refresh().await {
            warn!(error = %e, "Initial queue load failed");
        }
    }

    /// Close the stream and stop polling
    pub fn shutdown(&mut self) {
        if let Some(active) = self.stream.take() {
            active.handle.close();
        }
        self.stop_polling();
    }

    /// Whether a stream or poller may still produce messages
    pub fn is_busy(&self) -> bool {
        self.stream.is_some() || self.poller.is_some()
    }

    /// Wait for the next producer message
    pub async fn next_message(&mut self) -> Option<SyncMessage> {
        self.rx.recv().await
    }

    /// Drain messages until no stream or poller remains
    pub async fn run_until_idle(&mut self) {
        while self.is_busy() {
            match self.rx.recv().await {
                Some(message) => self.handle(message).await,
                None => break,
            }
        }
    }

    // ========================================
    // Intents
    // ========================================

    /// Replace the list and stats wholesale from the backend
    pub async fn refresh(&mut self) -> Result<()> {
        let limit = self.config.queue_limit;
        let (items, stats) = tokio::try_join!(
            self.backend.list_queue(limit),
            self.backend.queue_stats()
        )?;
        debug!(rows = items.len(), total = stats.total, "Queue refreshed");
        self.items = items;
        self.stats = stats;
        Ok(())
    }

    /// Start a download task and subscribe to its progress
    pub async fn submit(&mut self, query: &str, source: Option<SourceType>) -> Result<Task> {
        let song_name = query.trim();
        if song_name.is_empty() {
            self.bus.emit_lossy(Notice::InputRejected {
                message: "Enter a song name".to_string(),
                timestamp: Utc::now(),
            });
            return Err(Error::InvalidInput("song name is empty".to_string()));
        }
        self.query = query.to_string();

        let request = CreateTaskRequest {
            song_name: song_name.to_string(),
            source,
        };
        let created = match self.backend.create_task(&request).await {
            Ok(created) => created,
            Err(e) => {
                self.bus.emit_lossy(Notice::SubmitFailed {
                    song_name: song_name.to_string(),
                    message: e.user_message(),
                    timestamp: Utc::now(),
                });
                return Err(e);
            }
        };

        let task = Task {
            id: created.task_id,
            subject_name: created.song_name,
            requested_source: source,
        };
        info!(task_id = %task.id, song_name = %task.subject_name, "Task created");
        self.bus.emit_lossy(Notice::TaskStarted {
            task_id: task.id.clone(),
            song_name: task.subject_name.clone(),
            timestamp: Utc::now(),
        });

        self.open_stream(task.clone());
        Ok(task)
    }

    /// Add newline-separated songs to the queue
    pub async fn add_batch(
        &mut self,
        text: &str,
        source: Option<SourceType>,
        high_priority: bool,
    ) -> Result<AddToQueueResponse> {
        let songs = parse_song_lines(text);
        if songs.is_empty() {
            self.bus.emit_lossy(Notice::InputRejected {
                message: "Enter at least one song".to_string(),
                timestamp: Utc::now(),
            });
            return Err(Error::InvalidInput("no songs given".to_string()));
        }

        let request = AddToQueueRequest {
            songs,
            source,
            priority: Some(if high_priority {
                HIGH_PRIORITY
            } else {
                NORMAL_PRIORITY
            }),
        };
        let added = self.backend.add_to_queue(&request).await?;
        info!(count = added.count, "Songs added to queue");
        self.bus.emit_lossy(Notice::QueueAdded {
            count: added.count,
            timestamp: Utc::now(),
        });

        self.refresh_logged().await;
        // Queue work has no push channel; follow it by polling
        self.ensure_polling();
        Ok(added)
    }

    /// Delete a queue row, then reload the list from the backend
    ///
    /// No local patching: a racing progress update could otherwise leave the
    /// list diverged from the backend.
    pub async fn delete(&mut self, id: i64) -> Result<()> {
        let result = self.backend.delete_queue_item(id).await;
        match &result {
            Ok(()) => {
                info!(queue_id = id, "Queue item deleted");
                self.bus.emit_lossy(Notice::QueueItemDeleted {
                    queue_id: id,
                    timestamp: Utc::now(),
                });
            }
            Err(e) => {
                warn!(queue_id = id, error = %e, "Queue delete failed");
                self.bus.emit_lossy(Notice::DeleteFailed {
                    queue_id: id,
                    message: e.user_message(),
                    timestamp: Utc::now(),
                });
            }
        }
        self.refresh_logged().await;
        result
    }

    // ========================================
    // Producer messages
    // ========================================

    /// Apply one producer message
    pub async fn handle(&mut self, message: SyncMessage) {
        match message {
            SyncMessage::StreamEvent { task_id, event } => {
                self.on_stream_event(&task_id, event).await
            }
            SyncMessage::StreamError { task_id, error } => self.on_stream_error(&task_id, &error),
            SyncMessage::Snapshot {
                generation,
                snapshot,
            } => {
                let current = self.poller.as_ref().map(|p| p.generation);
                if current != Some(generation) {
                    debug!(generation, "Dropping snapshot from stopped poller");
                    return;
                }
                self.on_snapshot(snapshot).await;
            }
        }
    }

    async fn on_stream_event(&mut self, task_id: &str, event: ProgressEvent) {
        if !self.stream_is_for(task_id) {
            debug!(task_id = %task_id, "Ignoring event for inactive stream");
            return;
        }

        if let Some(pointer) = self.pointer.as_mut().filter(|p| p.is_owned_by(task_id)) {
            pointer.percent = event.percent;
            pointer.status_text = event.status_text.clone();
        }

        if !event.complete {
            return;
        }

        if let Some(active) = self.stream.take() {
            active.handle.close();
        }
        if self.pointer.as_ref().is_some_and(|p| p.is_owned_by(task_id)) {
            self.pointer = None;
        }

        if event.succeeded() {
            info!(task_id = %task_id, "Task completed");
            self.query.clear();
            self.bus.emit_lossy(Notice::TaskSucceeded {
                task_id: task_id.to_string(),
                filename: event.result.and_then(|r| r.filename),
                timestamp: Utc::now(),
            });
        } else {
            let error = event
                .result
                .and_then(|r| r.error)
                .unwrap_or_else(|| "unknown error".to_string());
            warn!(task_id = %task_id, error = %error, "Task failed");
            self.bus.emit_lossy(Notice::TaskFailed {
                task_id: task_id.to_string(),
                error,
                timestamp: Utc::now(),
            });
        }

        self.refresh_logged().await;
    }

    fn on_stream_error(&mut self, task_id: &str, error: &str) {
        if !self.stream_is_for(task_id) {
            debug!(task_id = %task_id, "Ignoring error for inactive stream");
            return;
        }
        self.stream = None;

        warn!(task_id = %task_id, error = %error, "Progress stream lost, falling back to polling");
        self.bus.emit_lossy(Notice::StreamInterrupted {
            task_id: task_id.to_string(),
            reason: error.to_string(),
            timestamp: Utc::now(),
        });

        // Keep the last known values; the poller reconciles from here
        if let Some(pointer) = self.pointer.as_mut().filter(|p| p.is_owned_by(task_id)) {
            pointer.origin = PointerOrigin::Snapshot;
            pointer.task_id = None;
        }
        self.ensure_polling();
    }

    async fn on_snapshot(&mut self, snapshot: CurrentDownloadSnapshot) {
        let stream_owns = self
            .stream
            .as_ref()
            .is_some_and(|active| {
                self.pointer
                    .as_ref()
                    .is_some_and(|p| p.is_owned_by(&active.task.id))
            });

        if snapshot.downloading {
            self.idle_ticks = 0;
            if stream_owns {
                self.compare_with_stream(&snapshot);
            } else {
                self.follow_snapshot(&snapshot).await;
            }
            return;
        }

        if stream_owns {
            debug!("Idle snapshot while stream is open; stream keeps precedence");
        } else if let Some(previous) = self.pointer.take() {
            info!(queue_id = ?previous.queue_id, "Tracked download finished");
            self.stop_polling();
            self.bus.emit_lossy(Notice::DownloadFinished {
                queue_id: previous.queue_id,
                timestamp: Utc::now(),
            });
            // An open stream takes the pointer back
            self.pointer = self
                .stream
                .as_ref()
                .map(|active| DownloadPointer::for_task(&active.task));
            self.refresh_logged().await;
        } else if self.stream.is_none() {
            self.idle_ticks += 1;
            if self.idle_ticks >= self.config.idle_poll_limit {
                debug!(idle_ticks = self.idle_ticks, "Nothing to track, stopping poller");
                self.stop_polling();
            }
        }
    }

    /// Whether an active snapshot describes the task whose stream is open
    fn snapshot_is_stream_task(&self, snapshot: &CurrentDownloadSnapshot) -> bool {
        match (self.stream.as_ref(), snapshot.song_name.as_deref()) {
            (Some(active), Some(name)) => name.trim() == active.task.subject_name.trim(),
            _ => false,
        }
    }

    /// Stream window: snapshots only detect a diverged active item
    fn compare_with_stream(&mut self, snapshot: &CurrentDownloadSnapshot) {
        let same_task = self.snapshot_is_stream_task(snapshot);
        let Some(pointer) = self.pointer.as_mut() else {
            return;
        };
        let diverged = match (pointer.queue_id, snapshot.queue_id) {
            (Some(tracked), Some(reported)) => tracked != reported,
            (None, Some(reported)) if same_task => {
                debug!(queue_id = reported, "Stream task matched to queue item");
                pointer.queue_id = Some(reported);
                false
            }
            (None, Some(_)) => true,
            (_, None) => false,
        };

        if diverged {
            warn!(
                tracked = ?pointer.queue_id,
                reported = ?snapshot.queue_id,
                reported_song = ?snapshot.song_name,
                task_id = ?pointer.task_id,
                "Snapshot disagrees with stream about the active item; snapshot wins"
            );
            *pointer = DownloadPointer::from_snapshot(snapshot);
        }
    }

    /// No stream owns the pointer: the snapshot is the pointer
    async fn follow_snapshot(&mut self, snapshot: &CurrentDownloadSnapshot) {
        let previous = self.pointer.as_ref().and_then(|p| p.queue_id);
        let mut pointer = DownloadPointer::from_snapshot(snapshot);
        // The stream's task became the active item; its events drive it again
        if self.snapshot_is_stream_task(snapshot) {
            if let Some(active) = self.stream.as_ref() {
                pointer.origin = PointerOrigin::Stream;
                pointer.task_id = Some(active.task.id.clone());
            }
        }
        self.pointer = Some(pointer);

        if let Some(previous) = previous.filter(|p| snapshot.queue_id != Some(*p)) {
            info!(
                previous,
                current = ?snapshot.queue_id,
                "Active queue item changed"
            );
            self.bus.emit_lossy(Notice::DownloadFinished {
                queue_id: Some(previous),
                timestamp: Utc::now(),
            });
            self.refresh_logged().await;
        }
    }

    // ========================================
    // Producers
    // ========================================

    fn open_stream(&mut self, task: Task) {
        if let Some(previous) = self.stream.take() {
            info!(task_id = %previous.task.id, "Closing superseded progress stream");
            previous.handle.close();
        }

        let event_tx = self.tx.clone();
        let error_tx = self.tx.clone();
        let event_task = task.id.clone();
        let error_task = task.id.clone();

        let handle = ProgressStream::open(
            Arc::clone(&self.backend),
            task.id.clone(),
            move |event| {
                let _ = event_tx.send(SyncMessage::StreamEvent {
                    task_id: event_task.clone(),
                    event,
                });
            },
            move |error| {
                let _ = error_tx.send(SyncMessage::StreamError {
                    task_id: error_task.clone(),
                    error: error.to_string(),
                });
            },
        );

        self.pointer = Some(DownloadPointer::for_task(&task));
        self.stream = Some(ActiveStream { task, handle });
    }

    fn ensure_polling(&mut self) {
        if self.poller.is_some() {
            return;
        }
        let generation = self.next_generation;
        self.next_generation += 1;
        self.idle_ticks = 0;

        let tx = self.tx.clone();
        let handle = SnapshotPoller::start(
            Arc::clone(&self.backend),
            self.config.poll_interval,
            move |snapshot| {
                let _ = tx.send(SyncMessage::Snapshot {
                    generation,
                    snapshot,
                });
            },
        );
        self.poller = Some(ActivePoller { generation, handle });
    }

    fn stop_polling(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.handle.stop();
        }
    }

    fn stream_is_for(&self, task_id: &str) -> bool {
        self.stream
            .as_ref()
            .is_some_and(|active| active.task.id == task_id)
    }

    async fn refresh_logged(&mut self) {
        if let Err(e) = self.refresh().await {
            warn!(error = %e, "Queue refresh failed");
        }
    }

    // ========================================
    // View
    // ========================================

    /// Subscribe to user-facing notices
    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.bus.subscribe()
    }

    pub fn items(&self) -> &[QueueItem] {
        &self.items
    }

    pub fn stats(&self) -> QueueStats {
        self.stats
    }

    pub fn pointer(&self) -> Option<&DownloadPointer> {
        self.pointer.as_ref()
    }

    /// Pointer not attached to any queue row yet (a fresh stream)
    pub fn unmatched_progress(&self) -> Option<&DownloadPointer> {
        self.pointer.as_ref().filter(|p| p.queue_id.is_none())
    }

    /// Task whose stream is currently open
    pub fn active_task(&self) -> Option<&Task> {
        self.stream.as_ref().map(|active| &active.task)
    }

    pub fn is_polling(&self) -> bool {
        self.poller.is_some()
    }

    /// Search field contents; cleared after a successful download
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// Progress to render for row `id`, if it is the active download
    pub fn row_progress(&self, id: i64) -> Option<RowProgress> {
        self.pointer
            .as_ref()
            .filter(|p| p.queue_id == Some(id))
            .map(|p| RowProgress {
                percent: p.percent,
                status_text: p.status_text.clone(),
            })
    }

    /// All cached rows with resolved progress
    pub fn rows(&self) -> Vec<RowView> {
        self.items
            .iter()
            .map(|item| RowView {
                id: item.id,
                name: item.song_name.clone(),
                source: item.source,
                status: item.status,
                priority: item.priority,
                error_message: item.error_message.clone(),
                progress: self.row_progress(item.id),
            })
            .collect()
    }
}

impl Drop for QueueSyncCoordinator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Split batch input into song names: one per line, trimmed, blanks dropped
pub fn parse_song_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
