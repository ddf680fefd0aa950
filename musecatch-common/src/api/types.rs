//! Shared API request/response types

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

// ========================================
// Envelope
// ========================================

/// Response envelope used by every JSON endpoint
///
/// `data` is `null` for endpoints without a payload (e.g. deletes) and may
/// be absent on error responses.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiResponse<T> {
    pub code: i64,
    #[serde(default)]
    pub message: String,
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    /// Success envelope (`code = 0`)
    pub fn ok(data: T) -> Self {
        Self {
            code: 0,
            message: "success".to_string(),
            data: Some(data),
        }
    }

    /// Whether the backend reported success
    pub fn is_success(&self) -> bool {
        self.code == 0
    }
}

/// `{ items: [...] }` list wrapper
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ItemList<T> {
    pub items: Vec<T>,
}

/// Paginated list; `count`/`total` are used interchangeably by the backend
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    #[serde(default)]
    pub count: Option<u64>,
    #[serde(default)]
    pub total: Option<u64>,
    #[serde(default)]
    pub skip: Option<u64>,
    #[serde(default)]
    pub limit: Option<u64>,
}

impl<T> Page<T> {
    /// Total matching rows, whichever field the backend filled in
    pub fn total_count(&self) -> u64 {
        self.total
            .or(self.count)
            .unwrap_or(self.items.len() as u64)
    }
}

// ========================================
// Sources
// ========================================

/// Upstream music source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Qq,
    Kugou,
    Kuwo,
    Netease,
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceType::Qq => write!(f, "qq"),
            SourceType::Kugou => write!(f, "kugou"),
            SourceType::Kuwo => write!(f, "kuwo"),
            SourceType::Netease => write!(f, "netease"),
        }
    }
}

impl FromStr for SourceType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "qq" => Ok(SourceType::Qq),
            "kugou" => Ok(SourceType::Kugou),
            "kuwo" => Ok(SourceType::Kuwo),
            "netease" => Ok(SourceType::Netease),
            other => Err(crate::Error::InvalidInput(format!("unknown source: {}", other))),
        }
    }
}

/// Source descriptor from `GET /files/sources`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Source {
    pub key: SourceType,
    pub name: String,
}

// ========================================
// Tasks
// ========================================

/// `POST /tasks` body
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CreateTaskRequest {
    pub song_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceType>,
}

/// `POST /tasks` payload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CreateTaskResponse {
    pub task_id: String,
    pub song_name: String,
}

/// Outcome carried by a terminal progress event
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct TaskResult {
    pub success: bool,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One progress update for a task
///
/// Each event fully replaces the previously displayed value for its task;
/// events are never merged.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProgressEvent {
    pub percent: f64,
    #[serde(rename = "status", default)]
    pub status_text: String,
    #[serde(default)]
    pub complete: bool,
    #[serde(default)]
    pub result: Option<TaskResult>,
}

impl ProgressEvent {
    /// Non-terminal update
    pub fn update(percent: f64, status_text: impl Into<String>) -> Self {
        Self {
            percent,
            status_text: status_text.into(),
            complete: false,
            result: None,
        }
    }

    /// Clamp `percent` into [0, 100] (NaN becomes 0)
    pub fn normalized(mut self) -> Self {
        self.percent = clamp_percent(self.percent);
        self
    }

    /// Progress update equivalent to an active snapshot
    pub fn from_snapshot(snapshot: &CurrentDownloadSnapshot) -> Self {
        Self::update(snapshot.percent, snapshot.status.clone()).normalized()
    }

    /// Whether this terminal event reports success
    ///
    /// A terminal event without a `result` counts as success.
    pub fn succeeded(&self) -> bool {
        self.complete && self.result.as_ref().map_or(true, |r| r.success)
    }
}

/// Clamp a percentage into [0, 100]
pub fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() {
        0.0
    } else {
        percent.clamp(0.0, 100.0)
    }
}

// ========================================
// Queue
// ========================================

/// Queue entry lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueStatus {
    Pending,
    Downloading,
    Completed,
    Failed,
}

impl std::fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueStatus::Pending => write!(f, "pending"),
            QueueStatus::Downloading => write!(f, "downloading"),
            QueueStatus::Completed => write!(f, "completed"),
            QueueStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One row of the download queue
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct QueueItem {
    pub id: i64,
    pub song_name: String,
    #[serde(default)]
    pub source: Option<SourceType>,
    pub status: QueueStatus,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

/// Aggregate counts from `GET /queue/stats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueueStats {
    #[serde(default)]
    pub pending: u64,
    #[serde(default)]
    pub downloading: u64,
    #[serde(default)]
    pub completed: u64,
    #[serde(default)]
    pub failed: u64,
    #[serde(default)]
    pub total: u64,
}

/// `GET /queue/current` payload
///
/// The single authoritative pointer to the queue item being downloaded right
/// now. An idle backend may send only `{"downloading": false}`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CurrentDownloadSnapshot {
    pub downloading: bool,
    pub queue_id: Option<i64>,
    pub song_name: Option<String>,
    pub source: Option<SourceType>,
    pub percent: f64,
    pub status: String,
    pub started_at: Option<String>,
}

impl CurrentDownloadSnapshot {
    /// Idle snapshot
    pub fn idle() -> Self {
        Self::default()
    }

    /// Active snapshot for `queue_id`
    pub fn active(queue_id: i64, song_name: &str, percent: f64, status: &str) -> Self {
        Self {
            downloading: true,
            queue_id: Some(queue_id),
            song_name: Some(song_name.to_string()),
            percent,
            status: status.to_string(),
            ..Default::default()
        }
    }
}

/// `POST /queue` body
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AddToQueueRequest {
    pub songs: Vec<String>,
    pub source: Option<SourceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<i32>,
}

/// `POST /queue` payload
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct AddToQueueResponse {
    pub count: u64,
    #[serde(default)]
    pub songs: Vec<String>,
}

// ========================================
// Library
// ========================================

/// Downloaded song record
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Song {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub artist_id: Option<i64>,
    pub source: SourceType,
    pub filename: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub file_ext: String,
    #[serde(default)]
    pub webdav_uploaded: bool,
    #[serde(default)]
    pub created_at: String,
}

/// `GET /songs/stats` payload
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SongStats {
    pub total: u64,
    pub uploaded: u64,
    #[serde(default)]
    pub by_source: HashMap<SourceType, u64>,
}

/// `GET /health` payload
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub telegram_connected: bool,
    #[serde(default)]
    pub webdav_enabled: bool,
    #[serde(default)]
    pub queue_worker_running: bool,
}
