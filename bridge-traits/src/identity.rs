//! Player Identity Resolution
//!
//! Exchanges the caller's auth token for the player's identity and the
//! capability token the record API accepts.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Resolved player identity.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerIdentity {
    /// Player identifier that owns every synced record
    pub role_id: String,
    pub uid: String,
    pub nick_name: String,
    /// Token passed to the record API
    #[serde(skip_serializing)]
    pub capability_token: String,
}

impl fmt::Debug for PlayerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlayerIdentity")
            .field("role_id", &self.role_id)
            .field("uid", &self.uid)
            .field("nick_name", &self.nick_name)
            .field("capability_token", &"[REDACTED]")
            .finish()
    }
}

/// Identity service trait
///
/// # Errors
///
/// Any failure (transport, rejected token, malformed response) is final for
/// the sync that asked; the engine does not retry identity resolution.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, auth_token: &str) -> Result<PlayerIdentity>;
}
