//! Remote Pull-Record Source
//!
//! The engine walks a player's pull history one page at a time through this
//! trait. Pages arrive newest-first; passing a cursor returns the page of
//! records strictly older than that sequence number.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Character gacha pool categories, in the order they are synchronized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PoolType {
    Special,
    Standard,
    Beginner,
}

impl PoolType {
    /// Every pool type, in sync order.
    pub const ALL: [PoolType; 3] = [PoolType::Special, PoolType::Standard, PoolType::Beginner];

    /// Identifier the record API expects in the `pool_type` parameter.
    pub fn wire_name(&self) -> &'static str {
        match self {
            PoolType::Special => "E_CharacterGachaPoolType_Special",
            PoolType::Standard => "E_CharacterGachaPoolType_Standard",
            PoolType::Beginner => "E_CharacterGachaPoolType_Beginner",
        }
    }

    pub fn from_wire_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|pool| pool.wire_name() == name)
    }
}

impl fmt::Display for PoolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

/// One pull as reported by the remote, before it is tied to a player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemotePullRecord {
    pub pool_id: String,
    pub pool_name: String,
    pub char_id: String,
    pub char_name: String,
    pub rarity: i32,
    pub is_free: bool,
    pub is_new: bool,
    /// Opaque timestamp string, stored as received
    pub gacha_ts: String,
    /// String-encoded integer, unique per pool per player
    pub seq_id: String,
}

/// A single page of pull history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordPage {
    pub pool_type: PoolType,
    /// Language the page was requested in
    pub lang: String,
    /// Server the page was requested from
    pub server_id: String,
    /// Newest first
    pub records: Vec<RemotePullRecord>,
    pub has_more: bool,
}

impl RecordPage {
    /// An empty page marking the end of a pool's history.
    pub fn end(pool_type: PoolType, lang: impl Into<String>, server_id: impl Into<String>) -> Self {
        Self {
            pool_type,
            lang: lang.into(),
            server_id: server_id.into(),
            records: Vec::new(),
            has_more: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Sequence id of the oldest record on the page, the cursor for the next page.
    pub fn oldest_seq_id(&self) -> Option<&str> {
        self.records.last().map(|record| record.seq_id.as_str())
    }
}

/// Remote pull-history source
///
/// Implementations own transport concerns (timeouts, retry budget, backoff)
/// so callers see either a page or a final error.
///
/// A response that parses but carries no data must be returned as
/// [`RecordPage::end`], not as an error.
#[async_trait]
pub trait RecordSource: Send + Sync {
    /// Fetch one page of `pool_type` history.
    ///
    /// `cursor == None` requests the newest page.
    async fn fetch_page(
        &self,
        capability_token: &str,
        pool_type: PoolType,
        cursor: Option<u64>,
    ) -> Result<RecordPage>;
}
