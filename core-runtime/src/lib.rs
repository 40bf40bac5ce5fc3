//! # Core Runtime Module
//!
//! Provides foundational runtime infrastructure for the sync engine:
//! - Logging and tracing infrastructure
//! - Configuration management
//!
//! ## Overview
//!
//! This crate contains the runtime utilities every other crate depends on.
//! It establishes the logging conventions and the validated configuration
//! that the service façade is bootstrapped from.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{CoreConfig, CoreConfigBuilder, EndfieldApiConfig, SyncSettings};
pub use error::{Error, Result};
