//! Backend access
//!
//! [`QueueBackend`] is the seam between the sync core and the network: the
//! progress stream, the snapshot poller and the coordinator only ever talk
//! to the backend through it. [`ApiClient`] is the HTTP implementation.

mod client;

pub use client::{ApiClient, SongQuery};

use crate::error::Result;
use async_trait::async_trait;
use futures::stream::Stream;
use musecatch_common::api::{
    AddToQueueRequest, AddToQueueResponse, CreateTaskRequest, CreateTaskResponse,
    CurrentDownloadSnapshot, QueueItem, QueueStats,
};
use std::pin::Pin;

/// Raw body of a server-push subscription, chunked at arbitrary boundaries
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>>> + Send>>;

/// Backend operations consumed by the sync core
#[async_trait]
pub trait QueueBackend: Send + Sync + 'static {
    /// `POST /tasks`
    async fn create_task(&self, request: &CreateTaskRequest) -> Result<CreateTaskResponse>;

    /// `GET /tasks/{task_id}/progress` (server-push channel)
    async fn open_progress(&self, task_id: &str) -> Result<ByteStream>;

    /// `GET /queue?limit=N`
    async fn list_queue(&self, limit: u32) -> Result<Vec<QueueItem>>;

    /// `GET /queue/stats`
    async fn queue_stats(&self) -> Result<QueueStats>;

    /// `GET /queue/current`
    async fn current_download(&self) -> Result<CurrentDownloadSnapshot>;

    /// `POST /queue`
    async fn add_to_queue(&self, request: &AddToQueueRequest) -> Result<AddToQueueResponse>;

    /// `DELETE /queue/{id}`
    async fn delete_queue_item(&self, id: i64) -> Result<()>;
}
