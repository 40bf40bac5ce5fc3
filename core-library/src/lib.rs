//! # Pull Record Library
//!
//! Owns the durable store of pull history and provides repository patterns
//! for data access.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite schema and migrations (pull records, sync tasks, player profiles)
//! - Connection pooling
//! - Repositories for pull records and player profiles
//!
//! Deduplication is enforced by the unique index over
//! `(role_id, pool_name, seq_id)`; repositories surface a violation as
//! [`LibraryError::DuplicateKey`].

pub mod db;
pub mod error;
pub mod models;
pub mod repositories;

pub use error::{LibraryError, Result};
