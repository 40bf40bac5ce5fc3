//! # Host Bridge Traits
//!
//! Capability traits the sync engine requires from its surroundings.
//!
//! ## Overview
//!
//! This crate defines the contract between the sync core and the concrete
//! collaborators it talks to. Each trait represents a capability the core needs
//! but does not own: a transport, a record API, an identity service and a time
//! source.
//!
//! ## Traits
//!
//! ### Networking
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry policy and TLS
//!
//! ### Remote data
//! - [`RecordSource`](records::RecordSource) - One page of a player's pull history
//! - [`IdentityResolver`](identity::IdentityResolver) - Auth token to player identity
//!
//! ### Utilities
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core should fail fast with descriptive errors when a required capability is missing:
//!
//! ```ignore
//! let http_client = config.http_client
//!     .ok_or_else(|| Error::CapabilityMissing {
//!         capability: "HttpClient".to_string(),
//!         message: "No HTTP client implementation provided.".to_string(),
//!     })?;
//! ```
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds so a single instance can be
//! shared by every fetch running on the worker pool.

pub mod error;
pub mod http;
pub mod identity;
pub mod records;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{BackoffStrategy, HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use identity::{IdentityResolver, PlayerIdentity};
pub use records::{PoolType, RecordPage, RecordSource, RemotePullRecord};
pub use time::{Clock, LogEntry, LogLevel, LoggerSink, SystemClock};
