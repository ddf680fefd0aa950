//! HTTP implementation of the backend API
//!
//! Every JSON endpoint returns a `{code, message, data}` envelope; a non-zero
//! `code` becomes [`Error::Api`]. REST calls carry a per-request timeout,
//! the push channel does not (a stalled stream is detected by the poller,
//! not by a timer).

use super::{ByteStream, QueueBackend};
use crate::error::{Error, Result};
use async_trait::async_trait;
use futures::StreamExt;
use musecatch_common::api::{
    AddToQueueRequest, AddToQueueResponse, ApiResponse, CreateTaskRequest, CreateTaskResponse,
    CurrentDownloadSnapshot, HealthStatus, ItemList, Page, QueueItem, QueueStats, QueueStatus,
    Song, SongStats, Source, SourceType,
};
use musecatch_common::config::ClientConfig;
use reqwest::{header, Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

/// Suffix stripped from the API base to reach static download URLs
const API_PREFIX: &str = "/api/v1";

/// Filters for `GET /songs`
#[derive(Debug, Clone, Default)]
pub struct SongQuery {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub source: Option<SourceType>,
    pub search: Option<String>,
}

/// MuseCatch backend REST client
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: Client,
    base: Url,
    request_timeout: Duration,
}

impl ApiClient {
    /// Create a client for the configured API base URL
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base = Url::parse(&config.api_base_url).map_err(|e| {
            musecatch_common::Error::Config(format!(
                "invalid API base URL {}: {}",
                config.api_base_url, e
            ))
        })?;
        if base.cannot_be_a_base() {
            return Err(musecatch_common::Error::Config(format!(
                "API base URL cannot be a base: {}",
                config.api_base_url
            ))
            .into());
        }

        // No client-wide timeout: it would also cut long-lived push streams
        let http = Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            base,
            request_timeout: config.request_timeout,
        })
    }

    /// Configured API base URL
    pub fn base_url(&self) -> &str {
        self.base.as_str().trim_end_matches('/')
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn get(&self, segments: &[&str]) -> RequestBuilder {
        self.http
            .get(self.endpoint(segments))
            .timeout(self.request_timeout)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<Option<T>> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;

        match serde_json::from_slice::<ApiResponse<T>>(&body) {
            Ok(envelope) if envelope.is_success() => Ok(envelope.data),
            Ok(envelope) => Err(Error::Api {
                code: envelope.code,
                message: envelope.message,
            }),
            Err(_) if !status.is_success() => Err(Error::Api {
                code: i64::from(status.as_u16()),
                message: status
                    .canonical_reason()
                    .unwrap_or("request failed")
                    .to_string(),
            }),
            Err(e) => Err(Error::Decode(format!("unexpected response body: {}", e))),
        }
    }

    async fn send_required<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        what: &str,
    ) -> Result<T> {
        self.send(request)
            .await?
            .ok_or_else(|| Error::Decode(format!("{} response carried no data", what)))
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthStatus> {
        self.send_required(self.get(&["health"]), "health").await
    }

    /// `GET /files/sources`
    pub async fn sources(&self) -> Result<Vec<Source>> {
        let list: ItemList<Source> = self
            .send_required(self.get(&["files", "sources"]), "sources")
            .await?;
        Ok(list.items)
    }

    /// `GET /queue` with optional status filter
    pub async fn list_queue_filtered(
        &self,
        status: Option<QueueStatus>,
        limit: Option<u32>,
    ) -> Result<Vec<QueueItem>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(status) = status {
            query.push(("status", status.to_string()));
        }
        if let Some(limit) = limit.filter(|l| *l > 0) {
            query.push(("limit", limit.to_string()));
        }
        let list: ItemList<QueueItem> = self
            .send_required(self.get(&["queue"]).query(&query), "queue")
            .await?;
        Ok(list.items)
    }

    /// `GET /songs`
    pub async fn list_songs(&self, params: &SongQuery) -> Result<Page<Song>> {
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(skip) = params.skip {
            query.push(("skip", skip.to_string()));
        }
        if let Some(limit) = params.limit {
            query.push(("limit", limit.to_string()));
        }
        if let Some(source) = params.source {
            query.push(("source", source.to_string()));
        }
        if let Some(search) = params.search.as_deref().filter(|s| !s.is_empty()) {
            query.push(("search", search.to_string()));
        }
        self.send_required(self.get(&["songs"]).query(&query), "songs")
            .await
    }

    /// `GET /songs/stats`
    pub async fn song_stats(&self) -> Result<SongStats> {
        self.send_required(self.get(&["songs", "stats"]), "song stats")
            .await
    }

    /// `DELETE /files/{filename}`
    pub async fn delete_file(&self, filename: &str) -> Result<()> {
        let request = self
            .http
            .delete(self.endpoint(&["files", filename]))
            .timeout(self.request_timeout);
        self.send::<serde_json::Value>(request).await?;
        Ok(())
    }

    /// Range-addressable audio locator for a song
    pub fn stream_url(&self, song_id: i64) -> String {
        self.endpoint(&["stream", &song_id.to_string()]).to_string()
    }

    /// Static download URL for a library file (served outside `/api/v1`)
    pub fn download_url(&self, filename: &str) -> String {
        let mut url = self.base.clone();
        let root = url
            .path()
            .trim_end_matches('/')
            .strip_suffix(API_PREFIX)
            .unwrap_or(url.path().trim_end_matches('/'))
            .to_string();
        url.set_path(&root);
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(["downloads", filename]);
        }
        url.to_string()
    }
}

#[async_trait]
impl QueueBackend for ApiClient {
    async fn create_task(&self, request: &CreateTaskRequest) -> Result<CreateTaskResponse> {
        debug!(song_name = %request.song_name, "Creating download task");
        let builder = self
            .http
            .post(self.endpoint(&["tasks"]))
            .timeout(self.request_timeout)
            .json(request);
        self.send_required(builder, "create task").await
    }

    async fn open_progress(&self, task_id: &str) -> Result<ByteStream> {
        let response = self
            .http
            .get(self.endpoint(&["tasks", task_id, "progress"]))
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| Error::Transport(format!("push channel connect failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(Error::Transport(format!(
                "push channel rejected with HTTP {}",
                response.status()
            )));
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(Error::from));
        Ok(Box::pin(stream))
    }

    async fn list_queue(&self, limit: u32) -> Result<Vec<QueueItem>> {
        self.list_queue_filtered(None, Some(limit)).await
    }

    async fn queue_stats(&self) -> Result<QueueStats> {
        self.send_required(self.get(&["queue", "stats"]), "queue stats")
            .await
    }

    async fn current_download(&self) -> Result<CurrentDownloadSnapshot> {
        self.send_required(self.get(&["queue", "current"]), "current download")
            .await
    }

    async fn add_to_queue(&self, request: &AddToQueueRequest) -> Result<AddToQueueResponse> {
        let builder = self
            .http
            .post(self.endpoint(&["queue"]))
            .timeout(self.request_timeout)
            .json(request);
        self.send_required(builder, "add to queue").await
    }

    async fn delete_queue_item(&self, id: i64) -> Result<()> {
        let request = self
            .http
            .delete(self.endpoint(&["queue", &id.to_string()]))
            .timeout(self.request_timeout);
        self.send::<serde_json::Value>(request).await?;
        Ok(())
    }
}
