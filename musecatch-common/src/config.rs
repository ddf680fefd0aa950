//! Configuration loading and API endpoint resolution
//!
//! Resolution follows a fixed priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`MUSECATCH_API_URL`)
//! 3. TOML config file
//! 4. Compiled defaults (fallback)
//!
//! A missing or malformed config file is never fatal: it is logged and the
//! remaining sources are used.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};

/// Backend API base URL used when nothing else is configured
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:8889/api/v1";

/// Environment variable overriding the API base URL
pub const API_URL_ENV: &str = "MUSECATCH_API_URL";

/// Default current-download poll cadence
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 1000;

/// Default number of queue rows fetched per refresh
pub const DEFAULT_QUEUE_LIMIT: u32 = 50;

/// Default per-request timeout for REST calls
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 15;

/// Consecutive idle snapshots tolerated before an untracked poller stops
pub const DEFAULT_IDLE_POLL_LIMIT: u32 = 5;

/// On-disk TOML configuration (every key optional)
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct TomlConfig {
    pub api_base_url: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub queue_limit: Option<u32>,
    pub request_timeout_secs: Option<u64>,
    pub idle_poll_limit: Option<u32>,
}

/// Fully resolved client configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Base URL including the `/api/v1` prefix, without trailing slash
    pub api_base_url: String,
    /// Snapshot poll interval
    pub poll_interval: Duration,
    /// `limit` passed to `GET /queue`
    pub queue_limit: u32,
    /// Timeout for individual REST requests (not applied to the push channel)
    pub request_timeout: Duration,
    /// Idle snapshots an untracked poller tolerates before stopping
    pub idle_poll_limit: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            queue_limit: DEFAULT_QUEUE_LIMIT,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            idle_poll_limit: DEFAULT_IDLE_POLL_LIMIT,
        }
    }
}

impl ClientConfig {
    /// Apply the values present in a TOML config on top of `self`
    fn merge_toml(&mut self, toml: &TomlConfig) {
        if let Some(url) = toml.api_base_url.as_deref().and_then(normalize_base_url) {
            self.api_base_url = url;
        }
        match toml.poll_interval_ms {
            Some(0) => warn!("poll_interval_ms = 0 ignored, using {}ms", self.poll_interval.as_millis()),
            Some(ms) => self.poll_interval = Duration::from_millis(ms),
            None => {}
        }
        match toml.queue_limit {
            Some(0) => warn!("queue_limit = 0 ignored, using {}", self.queue_limit),
            Some(limit) => self.queue_limit = limit,
            None => {}
        }
        if let Some(secs) = toml.request_timeout_secs.filter(|s| *s > 0) {
            self.request_timeout = Duration::from_secs(secs);
        }
        if let Some(limit) = toml.idle_poll_limit.filter(|l| *l > 0) {
            self.idle_poll_limit = limit;
        }
    }
}

/// Resolves [`ClientConfig`] from CLI, environment, config file and defaults
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    cli_api_url: Option<String>,
    config_file: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// API URL given on the command line (priority 1)
    pub fn with_cli_api_url(mut self, url: Option<String>) -> Self {
        self.cli_api_url = url;
        self
    }

    /// Explicit config file path; replaces the platform default location
    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }

    /// Resolve the effective configuration
    ///
    /// Never fails: every source that cannot be read degrades to the next one.
    pub fn resolve(&self) -> ClientConfig {
        let mut config = ClientConfig::default();

        // Priority 3: TOML config file (applied first so higher priorities win)
        let path = self.config_file.clone().or_else(default_config_path);
        if let Some(path) = path {
            if path.exists() {
                match load_toml_config(&path) {
                    Ok(toml) => {
                        debug!("Loaded config file {}", path.display());
                        config.merge_toml(&toml);
                    }
                    Err(e) => warn!("Ignoring config file {}: {}", path.display(), e),
                }
            } else if self.config_file.is_some() {
                warn!("Config file not found: {}", path.display());
            }
        }

        // Priority 2: Environment variable
        if let Some(url) = std::env::var(API_URL_ENV)
            .ok()
            .as_deref()
            .and_then(normalize_base_url)
        {
            config.api_base_url = url;
        }

        // Priority 1: Command-line argument
        if let Some(url) = self.cli_api_url.as_deref().and_then(normalize_base_url) {
            config.api_base_url = url;
        }

        config
    }
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Platform config file location (`<config_dir>/musecatch/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("musecatch").join("config.toml"))
}

/// Trim whitespace and trailing slashes; empty URLs are rejected
fn normalize_base_url(url: &str) -> Option<String> {
    let trimmed = url.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}
