//! Domain models stored in the pull-record database.

use bridge_traits::records::{PoolType, RecordPage, RemotePullRecord};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// A pull that has been assigned a storage id.
///
/// Natural key: `(role_id, pool_name, seq_id)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PullRecord {
    /// Generated unique id, storage primary key
    pub id: i64,
    /// Owning player
    pub role_id: String,
    pub pool_id: String,
    pub pool_name: String,
    /// Wire name of the pool type
    pub pool_type: String,
    pub char_id: String,
    pub char_name: String,
    pub rarity: i32,
    pub is_free: bool,
    pub is_new: bool,
    pub gacha_ts: String,
    pub seq_id: String,
    pub lang: String,
    pub server_id: String,
    /// Epoch milliseconds
    pub created_at: i64,
}

impl PullRecord {
    pub fn pool_type(&self) -> Option<PoolType> {
        PoolType::from_wire_name(&self.pool_type)
    }

    /// Sequence number as an integer, if it is one.
    pub fn seq_number(&self) -> Option<u64> {
        self.seq_id.trim().parse().ok()
    }

    /// Validate record data before insertion
    pub fn validate(&self) -> Result<(), String> {
        if self.role_id.trim().is_empty() {
            return Err("role_id cannot be empty".to_string());
        }

        if self.pool_name.trim().is_empty() {
            return Err("pool_name cannot be empty".to_string());
        }

        if self.pool_type().is_none() {
            return Err(format!("unknown pool_type '{}'", self.pool_type));
        }

        if self.seq_number().is_none() {
            return Err(format!("seq_id '{}' is not a non-negative integer", self.seq_id));
        }

        Ok(())
    }
}

/// A pull parsed from a remote page, not yet given an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPullRecord {
    pub role_id: String,
    pub pool_id: String,
    pub pool_name: String,
    pub pool_type: PoolType,
    pub char_id: String,
    pub char_name: String,
    pub rarity: i32,
    pub is_free: bool,
    pub is_new: bool,
    pub gacha_ts: String,
    pub seq_id: String,
    pub lang: String,
    pub server_id: String,
}

impl NewPullRecord {
    /// Tie a remote record to its owner, tagging it with the page's pool type.
    pub fn from_remote(role_id: &str, page: &RecordPage, record: &RemotePullRecord) -> Self {
        Self {
            role_id: role_id.to_string(),
            pool_id: record.pool_id.clone(),
            pool_name: record.pool_name.clone(),
            pool_type: page.pool_type,
            char_id: record.char_id.clone(),
            char_name: record.char_name.clone(),
            rarity: record.rarity,
            is_free: record.is_free,
            is_new: record.is_new,
            gacha_ts: record.gacha_ts.clone(),
            seq_id: record.seq_id.clone(),
            lang: page.lang.clone(),
            server_id: page.server_id.clone(),
        }
    }

    /// Every record on `page`, newest first.
    pub fn from_page(role_id: &str, page: &RecordPage) -> Vec<Self> {
        page.records
            .iter()
            .map(|record| Self::from_remote(role_id, page, record))
            .collect()
    }

    pub fn with_id(&self, id: i64, created_at: i64) -> PullRecord {
        PullRecord {
            id,
            role_id: self.role_id.clone(),
            pool_id: self.pool_id.clone(),
            pool_name: self.pool_name.clone(),
            pool_type: self.pool_type.wire_name().to_string(),
            char_id: self.char_id.clone(),
            char_name: self.char_name.clone(),
            rarity: self.rarity,
            is_free: self.is_free,
            is_new: self.is_new,
            gacha_ts: self.gacha_ts.clone(),
            seq_id: self.seq_id.clone(),
            lang: self.lang.clone(),
            server_id: self.server_id.clone(),
            created_at,
        }
    }
}

/// Player seen by a completed sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct PlayerProfile {
    pub role_id: String,
    pub uid: String,
    pub nick_name: String,
    pub created_at: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> RecordPage {
        RecordPage {
            pool_type: PoolType::Standard,
            lang: "zh-cn".to_string(),
            server_id: "1".to_string(),
            records: vec![RemotePullRecord {
                pool_id: "standard".to_string(),
                pool_name: "Basic Headhunting".to_string(),
                char_id: "chr_0042".to_string(),
                char_name: "Perlica".to_string(),
                rarity: 5,
                is_free: true,
                is_new: false,
                gacha_ts: "1716000000000".to_string(),
                seq_id: "88".to_string(),
            }],
            has_more: false,
        }
    }

    #[test]
    fn test_from_page_tags_owner_and_pool() {
        let records = NewPullRecord::from_page("P1", &page());

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].role_id, "P1");
        assert_eq!(records[0].pool_type, PoolType::Standard);
        assert_eq!(records[0].lang, "zh-cn");
        assert_eq!(records[0].pool_name, "Basic Headhunting");
        assert_eq!(records[0].seq_id, "88");
    }

    #[test]
    fn test_with_id_round_trips_pool_type() {
        let new_record = NewPullRecord::from_page("P1", &page()).remove(0);
        let record = new_record.with_id(42, 1_700_000_000_000);

        assert_eq!(record.id, 42);
        assert_eq!(record.pool_type(), Some(PoolType::Standard));
        assert_eq!(record.seq_number(), Some(88));
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_numeric_seq() {
        let mut record = NewPullRecord::from_page("P1", &page()).remove(0).with_id(1, 0);
        record.seq_id = "abc".to_string();

        assert!(record.validate().unwrap_err().contains("seq_id"));
    }
}
