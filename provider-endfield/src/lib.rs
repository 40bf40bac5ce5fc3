//! # Endfield Record Provider
//!
//! Implements the `RecordSource` and `IdentityResolver` bridge traits against
//! the Endfield character gacha record API and its token service.
//!
//! ## Overview
//!
//! This module provides:
//! - Paged pull-history requests with a linear-backoff retry budget
//! - "No data" responses mapped to an end-of-history page instead of an error
//! - Capability tokens percent-encoded exactly once
//! - Auth token to player identity exchange

pub mod connector;
pub mod error;
pub mod identity;
pub mod token;
pub mod types;

pub use connector::EndfieldConnector;
pub use error::{EndfieldError, Result};
pub use identity::TokenServiceIdentityResolver;
pub use token::escape_token_once;
