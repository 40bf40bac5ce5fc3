//! # Core Configuration Module
//!
//! Provides configuration management for the gacha sync engine.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance that holds every dependency and tunable the engine needs.
//! It enforces fail-fast validation so a misconfigured host never starts a
//! sync it cannot finish.
//!
//! ## Required Settings
//!
//! - `database_path` - SQLite file, or [`CoreConfigBuilder::in_memory_database`]
//!
//! ## Optional Dependencies (with platform defaults)
//!
//! - `HttpClient` - HTTP operations (desktop default: reqwest)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::CoreConfig;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/var/lib/gacha/records.db")
//!     .node_id(2)
//!     .max_workers(16)
//!     .build()?;
//! ```

use crate::error::{Error, Result};
use bridge_traits::http::{HttpClient, RetryPolicy};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Path value that selects a private in-memory database.
pub const IN_MEMORY_DATABASE: &str = ":memory:";

/// Highest node id the 3-bit id layout can carry.
pub const MAX_NODE_ID: u8 = 7;

/// Endpoints and request parameters of the remote record API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndfieldApiConfig {
    /// Character pull-record endpoint
    pub records_api_url: String,
    /// Service that exchanges an auth token for a player identity
    pub token_service_url: String,
    pub lang: String,
    pub server_id: String,
    /// Per-request transport timeout
    pub request_timeout: Duration,
}

impl Default for EndfieldApiConfig {
    fn default() -> Self {
        Self {
            records_api_url: "https://ef-webview.hypergryph.com/api/record/char".to_string(),
            token_service_url: "http://127.0.0.1:10086/token".to_string(),
            lang: "zh-cn".to_string(),
            server_id: "1".to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

impl EndfieldApiConfig {
    pub fn validate(&self) -> Result<()> {
        for (name, url) in [
            ("records_api_url", &self.records_api_url),
            ("token_service_url", &self.token_service_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!(
                    "{} must be an http(s) URL, got '{}'",
                    name, url
                )));
            }
        }

        if self.lang.trim().is_empty() {
            return Err(Error::Config("lang cannot be empty".to_string()));
        }

        if self.server_id.trim().is_empty() {
            return Err(Error::Config("server_id cannot be empty".to_string()));
        }

        if self.request_timeout.is_zero() {
            return Err(Error::Config(
                "request_timeout must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Tunables of the sync engine itself.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Distance between consecutive backward cursors
    pub page_size: u32,
    /// Records per batch insert
    pub batch_size: usize,
    /// Retry budget of a single page fetch
    pub fetch_retry: RetryPolicy,
    /// Fetches running at once
    pub max_workers: usize,
    /// Fetches admitted beyond `max_workers` before callers run them inline
    pub queue_capacity: usize,
    /// Claimed tasks the poller runs at once
    pub max_concurrent_syncs: usize,
    /// Idle sleep of the task poller
    pub poll_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: 5,
            batch_size: 200,
            fetch_retry: RetryPolicy::linear(3, Duration::from_millis(500)),
            max_workers: 8,
            queue_capacity: 256,
            max_concurrent_syncs: 4,
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl SyncSettings {
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::Config(
                "page_size must be greater than 0".to_string(),
            ));
        }

        if self.batch_size == 0 {
            return Err(Error::Config(
                "batch_size must be greater than 0".to_string(),
            ));
        }

        if self.fetch_retry.max_attempts == 0 {
            return Err(Error::Config(
                "fetch_retry.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.max_workers == 0 {
            return Err(Error::Config(
                "max_workers must be greater than 0".to_string(),
            ));
        }

        if self.max_concurrent_syncs == 0 {
            return Err(Error::Config(
                "max_concurrent_syncs must be greater than 0".to_string(),
            ));
        }

        if self.poll_interval.is_zero() {
            return Err(Error::Config(
                "poll_interval must be greater than zero".to_string(),
            ));
        }

        Ok(())
    }
}

/// Core configuration for the sync engine.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct CoreConfig {
    /// Path to the SQLite database file, or [`IN_MEMORY_DATABASE`]
    pub database_path: PathBuf,

    /// Node id embedded in every generated record id (0..=7)
    pub node_id: u8,

    pub api: EndfieldApiConfig,

    pub sync: SyncSettings,

    /// HTTP client shared by the record source and identity resolver
    pub http_client: Arc<dyn HttpClient>,
}

impl std::fmt::Debug for CoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreConfig")
            .field("database_path", &self.database_path)
            .field("node_id", &self.node_id)
            .field("api", &self.api)
            .field("sync", &self.sync)
            .field("http_client", &"HttpClient { ... }")
            .finish()
    }
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == IN_MEMORY_DATABASE
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path is not empty
    /// - Node id fits the id layout
    /// - API endpoints and sync tunables are usable
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.node_id > MAX_NODE_ID {
            return Err(Error::Config(format!(
                "node_id must be between 0 and {}, got {}",
                MAX_NODE_ID, self.node_id
            )));
        }

        self.api.validate()?;
        self.sync.validate()?;

        Ok(())
    }
}

#[cfg(feature = "desktop-shims")]
fn provide_default_http_client(timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    use bridge_desktop::ReqwestHttpClient;

    let client = ReqwestHttpClient::with_timeout(timeout)
        .map_err(|e| Error::Internal(format!("Failed to initialize default HttpClient: {}", e)))?;
    let client: Arc<dyn HttpClient> = Arc::new(client);
    Ok(client)
}

#[cfg(not(feature = "desktop-shims"))]
fn provide_default_http_client(_timeout: Duration) -> Result<Arc<dyn HttpClient>> {
    Err(Error::CapabilityMissing {
        capability: "HttpClient".to_string(),
        message: "No HTTP client implementation provided. \
                  Desktop: ensure the 'desktop-shims' feature is enabled to use the default ReqwestHttpClient. \
                  Otherwise inject an HttpClient with .http_client()."
            .to_string(),
    })
}

/// Builder for constructing [`CoreConfig`] instances.
///
/// Unset tunables fall back to [`SyncSettings::default`] and
/// [`EndfieldApiConfig::default`].
#[derive(Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    node_id: Option<u8>,
    api: EndfieldApiConfig,
    sync: SyncSettings,
    http_client: Option<Arc<dyn HttpClient>>,
}

impl CoreConfigBuilder {
    /// Sets the path to the SQLite database file.
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Uses a private in-memory database, mostly for tests and dry runs.
    pub fn in_memory_database(mut self) -> Self {
        self.database_path = Some(PathBuf::from(IN_MEMORY_DATABASE));
        self
    }

    pub fn node_id(mut self, node_id: u8) -> Self {
        self.node_id = Some(node_id);
        self
    }

    pub fn records_api_url(mut self, url: impl Into<String>) -> Self {
        self.api.records_api_url = url.into();
        self
    }

    pub fn token_service_url(mut self, url: impl Into<String>) -> Self {
        self.api.token_service_url = url.into();
        self
    }

    pub fn lang(mut self, lang: impl Into<String>) -> Self {
        self.api.lang = lang.into();
        self
    }

    pub fn server_id(mut self, server_id: impl Into<String>) -> Self {
        self.api.server_id = server_id.into();
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.api.request_timeout = timeout;
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.sync.page_size = page_size;
        self
    }

    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.sync.batch_size = batch_size;
        self
    }

    pub fn fetch_retry(mut self, policy: RetryPolicy) -> Self {
        self.sync.fetch_retry = policy;
        self
    }

    pub fn max_workers(mut self, max_workers: usize) -> Self {
        self.sync.max_workers = max_workers;
        self
    }

    pub fn queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.sync.queue_capacity = queue_capacity;
        self
    }

    /// Caps how many claimed tasks run at once; further tasks stay queued.
    pub fn max_concurrent_syncs(mut self, max_concurrent_syncs: usize) -> Self {
        self.sync.max_concurrent_syncs = max_concurrent_syncs;
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.sync.poll_interval = interval;
        self
    }

    /// Injects an HTTP client instead of the platform default.
    pub fn http_client(mut self, client: Arc<dyn HttpClient>) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the database path is missing or a value is out of range
    /// - [`Error::CapabilityMissing`] if no HTTP client is available
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let http_client = match self.http_client {
            Some(client) => client,
            None => provide_default_http_client(self.api.request_timeout)?,
        };

        let config = CoreConfig {
            database_path,
            node_id: self.node_id.unwrap_or(1),
            api: self.api,
            sync: self.sync,
            http_client,
        };

        config.validate()?;

        Ok(config)
    }
}
