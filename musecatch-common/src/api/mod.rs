//! Backend API wire types
//!
//! Request/response bodies for the MuseCatch backend REST API. Every JSON
//! endpoint wraps its payload in an [`ApiResponse`] envelope where
//! `code == 0` means success.

pub mod types;

pub use types::{
    AddToQueueRequest, AddToQueueResponse, ApiResponse, CreateTaskRequest, CreateTaskResponse,
    CurrentDownloadSnapshot, HealthStatus, ItemList, Page, ProgressEvent, QueueItem, QueueStats,
    QueueStatus, Song, SongStats, Source, SourceType, TaskResult,
};
