//! Test helpers for musecatch-client integration tests
//!
//! - `MockBackend`: scripted `QueueBackend` with call counters
//! - `FakeEngine`: `AudioEngine` that records every command

#![allow(dead_code)]

use async_trait::async_trait;
use musecatch_client::api::{ByteStream, QueueBackend};
use musecatch_client::playback::{AudioEngine, EngineCallbacks, EngineEvent, EngineFactory};
use musecatch_client::{Error, Result};
use musecatch_common::api::{
    AddToQueueRequest, AddToQueueResponse, CreateTaskRequest, CreateTaskResponse,
    CurrentDownloadSnapshot, QueueItem, QueueStats, QueueStatus,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

// ========================================
// SSE payload builders
// ========================================

pub fn progress_frame(percent: f64, status: &str) -> Vec<u8> {
    format!(
        "event: progress\ndata: {{\"percent\":{},\"status\":\"{}\",\"complete\":false}}\n\n",
        percent, status
    )
    .into_bytes()
}

pub fn complete_frame(success: bool, filename: Option<&str>, error: Option<&str>) -> Vec<u8> {
    let result = serde_json::json!({
        "success": success,
        "filename": filename,
        "error": error,
    });
    let payload = serde_json::json!({
        "percent": 100,
        "status": if success { "done" } else { "failed" },
        "complete": true,
        "result": result,
    });
    format!("event: progress\ndata: {}\n\n", payload).into_bytes()
}

pub fn queue_item(id: i64, name: &str, status: QueueStatus) -> QueueItem {
    QueueItem {
        id,
        song_name: name.to_string(),
        source: None,
        status,
        priority: 0,
        error_message: None,
        created_at: "2026-01-01T00:00:00".to_string(),
    }
}

// ========================================
// MockBackend
// ========================================

/// Sender side of one scripted progress channel
#[derive(Clone)]
pub struct ProgressFeed {
    tx: mpsc::UnboundedSender<Result<Vec<u8>>>,
}

impl ProgressFeed {
    pub fn send(&self, bytes: impl Into<Vec<u8>>) {
        let _ = self.tx.send(Ok(bytes.into()));
    }

    pub fn fail(&self, message: &str) {
        let _ = self.tx.send(Err(Error::Transport(message.to_string())));
    }

    /// Whether the reader dropped its end
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Default)]
struct Calls {
    create_task: AtomicUsize,
    open_progress: AtomicUsize,
    list_queue: AtomicUsize,
    queue_stats: AtomicUsize,
    current_download: AtomicUsize,
    add_to_queue: AtomicUsize,
    delete: AtomicUsize,
}

#[derive(Default)]
struct MockState {
    items: Vec<QueueItem>,
    snapshot: CurrentDownloadSnapshot,
    snapshot_failures: usize,
    progress: HashMap<String, mpsc::UnboundedReceiver<Result<Vec<u8>>>>,
    progress_unavailable: bool,
    create_error: Option<(i64, String)>,
    delete_error: Option<(i64, String)>,
    next_task: usize,
    added: Vec<AddToQueueRequest>,
    deleted: Vec<i64>,
}

/// Scripted backend
#[derive(Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
    calls: Calls,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register the progress channel for `task_id`
    pub fn progress_feed(&self, task_id: &str) -> ProgressFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.state
            .lock()
            .unwrap()
            .progress
            .insert(task_id.to_string(), rx);
        ProgressFeed { tx }
    }

    /// Make `open_progress` fail for unregistered tasks
    pub fn set_progress_unavailable(&self) {
        self.state.lock().unwrap().progress_unavailable = true;
    }

    pub fn set_items(&self, items: Vec<QueueItem>) {
        self.state.lock().unwrap().items = items;
    }

    pub fn set_snapshot(&self, snapshot: CurrentDownloadSnapshot) {
        self.state.lock().unwrap().snapshot = snapshot;
    }

    /// Fail the next `count` snapshot fetches
    pub fn fail_snapshots(&self, count: usize) {
        self.state.lock().unwrap().snapshot_failures = count;
    }

    pub fn fail_create(&self, code: i64, message: &str) {
        self.state.lock().unwrap().create_error = Some((code, message.to_string()));
    }

    pub fn fail_delete(&self, code: i64, message: &str) {
        self.state.lock().unwrap().delete_error = Some((code, message.to_string()));
    }

    pub fn added(&self) -> Vec<AddToQueueRequest> {
        self.state.lock().unwrap().added.clone()
    }

    pub fn deleted(&self) -> Vec<i64> {
        self.state.lock().unwrap().deleted.clone()
    }

    pub fn create_calls(&self) -> usize {
        self.calls.create_task.load(Ordering::SeqCst)
    }

    pub fn open_progress_calls(&self) -> usize {
        self.calls.open_progress.load(Ordering::SeqCst)
    }

    pub fn list_calls(&self) -> usize {
        self.calls.list_queue.load(Ordering::SeqCst)
    }

    pub fn stats_calls(&self) -> usize {
        self.calls.queue_stats.load(Ordering::SeqCst)
    }

    pub fn snapshot_calls(&self) -> usize {
        self.calls.current_download.load(Ordering::SeqCst)
    }

    pub fn add_calls(&self) -> usize {
        self.calls.add_to_queue.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.calls.delete.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueueBackend for MockBackend {
    async fn create_task(&self, request: &CreateTaskRequest) -> Result<CreateTaskResponse> {
        self.calls.create_task.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if let Some((code, message)) = state.create_error.clone() {
            return Err(Error::Api { code, message });
        }
        state.next_task += 1;
        Ok(CreateTaskResponse {
            task_id: format!("task-{}", state.next_task),
            song_name: request.song_name.clone(),
        })
    }

    async fn open_progress(&self, task_id: &str) -> Result<ByteStream> {
        self.calls.open_progress.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        match state.progress.remove(task_id) {
            Some(rx) => Ok(Box::pin(UnboundedReceiverStream::new(rx))),
            None if state.progress_unavailable => {
                Err(Error::Transport("progress channel unavailable".to_string()))
            }
            // Never yields, never ends
            None => Ok(Box::pin(tokio_stream::pending::<Result<Vec<u8>>>())),
        }
    }

    async fn list_queue(&self, limit: u32) -> Result<Vec<QueueItem>> {
        self.calls.list_queue.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        Ok(state.items.iter().take(limit as usize).cloned().collect())
    }

    async fn queue_stats(&self) -> Result<QueueStats> {
        self.calls.queue_stats.fetch_add(1, Ordering::SeqCst);
        let state = self.state.lock().unwrap();
        let count = |status: QueueStatus| state.items.iter().filter(|i| i.status == status).count() as u64;
        Ok(QueueStats {
            pending: count(QueueStatus::Pending),
            downloading: count(QueueStatus::Downloading),
            completed: count(QueueStatus::Completed),
            failed: count(QueueStatus::Failed),
            total: state.items.len() as u64,
        })
    }

    async fn current_download(&self) -> Result<CurrentDownloadSnapshot> {
        self.calls.current_download.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if state.snapshot_failures > 0 {
            state.snapshot_failures -= 1;
            return Err(Error::Transport("connection refused".to_string()));
        }
        Ok(state.snapshot.clone())
    }

    async fn add_to_queue(&self, request: &AddToQueueRequest) -> Result<AddToQueueResponse> {
        self.calls.add_to_queue.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.added.push(request.clone());
        let next_id = state.items.iter().map(|i| i.id).max().unwrap_or(0) + 1;
        for (offset, song) in request.songs.iter().enumerate() {
            state
                .items
                .push(queue_item(next_id + offset as i64, song, QueueStatus::Pending));
        }
        Ok(AddToQueueResponse {
            count: request.songs.len() as u64,
            songs: request.songs.clone(),
        })
    }

    async fn delete_queue_item(&self, id: i64) -> Result<()> {
        self.calls.delete.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if let Some((code, message)) = state.delete_error.clone() {
            return Err(Error::Api { code, message });
        }
        state.deleted.push(id);
        state.items.retain(|i| i.id != id);
        Ok(())
    }
}

// ========================================
// FakeEngine
// ========================================

/// Command received by the fake engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    Load(String),
    Play,
    Pause,
    Seek(f64),
    SetVolume(f32),
    Stop,
}

/// Shared view of a fake engine created by [`fake_engine_factory`]
#[derive(Clone, Default)]
pub struct EngineProbe {
    commands: Arc<Mutex<Vec<EngineCommand>>>,
    callbacks: Arc<Mutex<Option<EngineCallbacks>>>,
    created: Arc<AtomicUsize>,
    fail_load: Arc<Mutex<Option<String>>>,
}

impl EngineProbe {
    pub fn commands(&self) -> Vec<EngineCommand> {
        self.commands.lock().unwrap().clone()
    }

    pub fn clear_commands(&self) {
        self.commands.lock().unwrap().clear();
    }

    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Make the next `load` fail with `message`
    pub fn fail_next_load(&self, message: &str) {
        *self.fail_load.lock().unwrap() = Some(message.to_string());
    }

    /// Report an engine event as the real engine would
    pub fn emit(&self, event: EngineEvent) {
        let callbacks = self.callbacks.lock().unwrap().clone();
        callbacks
            .expect("engine not created yet")
            .emit(event);
    }
}

struct FakeEngine {
    probe: EngineProbe,
}

impl FakeEngine {
    fn record(&self, command: EngineCommand) {
        self.probe.commands.lock().unwrap().push(command);
    }
}

impl AudioEngine for FakeEngine {
    fn load(&mut self, locator: &str) -> Result<()> {
        self.record(EngineCommand::Load(locator.to_string()));
        if let Some(message) = self.probe.fail_load.lock().unwrap().take() {
            return Err(Error::Playback(message));
        }
        Ok(())
    }

    fn play(&mut self) -> Result<()> {
        self.record(EngineCommand::Play);
        Ok(())
    }

    fn pause(&mut self) {
        self.record(EngineCommand::Pause);
    }

    fn seek(&mut self, seconds: f64) {
        self.record(EngineCommand::Seek(seconds));
    }

    fn set_volume(&mut self, volume: f32) {
        self.record(EngineCommand::SetVolume(volume));
    }

    fn stop(&mut self) {
        self.record(EngineCommand::Stop);
    }
}

/// Factory for a recording engine plus the probe observing it
pub fn fake_engine_factory() -> (EngineFactory, EngineProbe) {
    let probe = EngineProbe::default();
    let inner = probe.clone();
    let factory: EngineFactory = Box::new(move |callbacks: EngineCallbacks| {
        inner.created.fetch_add(1, Ordering::SeqCst);
        *inner.callbacks.lock().unwrap() = Some(callbacks);
        Box::new(FakeEngine { probe: inner }) as Box<dyn AudioEngine>
    });
    (factory, probe)
}
