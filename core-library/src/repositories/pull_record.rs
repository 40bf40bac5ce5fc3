//! Pull record repository trait and implementation

use crate::error::{LibraryError, Result};
use crate::models::PullRecord;
use crate::repositories::map_insert_error;
use async_trait::async_trait;
use bridge_traits::records::PoolType;
use sqlx::{query, query_as, QueryBuilder, Sqlite, SqlitePool};

/// Pull record repository interface
#[async_trait]
pub trait PullRecordRepository: Send + Sync {
    /// Insert a single record
    ///
    /// # Errors
    /// - `DuplicateKey` if a record with the same natural key (or id) exists
    /// - `InvalidInput` if the record fails validation
    async fn insert(&self, record: &PullRecord) -> Result<()>;

    /// Insert all records atomically: either every row lands or none does
    ///
    /// # Errors
    /// Any single failing row fails the whole batch, duplicates included.
    async fn insert_batch(&self, records: &[PullRecord]) -> Result<()>;

    /// All records owned by a player, grouped by pool, newest first
    async fn find_by_role(&self, role_id: &str) -> Result<Vec<PullRecord>>;

    /// Highest stored sequence number for a player's pool type
    ///
    /// # Returns
    /// `Ok(None)` when nothing is stored yet
    async fn max_seq_id(&self, role_id: &str, pool_type: PoolType) -> Result<Option<u64>>;

    async fn count_by_role(&self, role_id: &str) -> Result<i64>;
}

/// SQLite implementation of PullRecordRepository
pub struct SqlitePullRecordRepository {
    pool: SqlitePool,
}

impl SqlitePullRecordRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn natural_key(record: &PullRecord) -> String {
        format!("{}/{}/{}", record.role_id, record.pool_name, record.seq_id)
    }

    fn validate(record: &PullRecord) -> Result<()> {
        record.validate().map_err(|e| LibraryError::InvalidInput {
            field: "PullRecord".to_string(),
            message: e,
        })
    }
}

#[async_trait]
impl PullRecordRepository for SqlitePullRecordRepository {
    async fn insert(&self, record: &PullRecord) -> Result<()> {
        Self::validate(record)?;

        query(
            r#"
            INSERT INTO pull_records (
                id, role_id, pool_id, pool_name, pool_type, char_id, char_name,
                rarity, is_free, is_new, gacha_ts, seq_id, lang, server_id, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(record.id)
        .bind(&record.role_id)
        .bind(&record.pool_id)
        .bind(&record.pool_name)
        .bind(&record.pool_type)
        .bind(&record.char_id)
        .bind(&record.char_name)
        .bind(record.rarity)
        .bind(record.is_free)
        .bind(record.is_new)
        .bind(&record.gacha_ts)
        .bind(&record.seq_id)
        .bind(&record.lang)
        .bind(&record.server_id)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| map_insert_error(e, "PullRecord", Self::natural_key(record)))?;

        Ok(())
    }

    async fn insert_batch(&self, records: &[PullRecord]) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        for record in records {
            Self::validate(record)?;
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO pull_records (\
             id, role_id, pool_id, pool_name, pool_type, char_id, char_name, \
             rarity, is_free, is_new, gacha_ts, seq_id, lang, server_id, created_at) ",
        );

        builder.push_values(records, |mut row, record| {
            row.push_bind(record.id)
                .push_bind(&record.role_id)
                .push_bind(&record.pool_id)
                .push_bind(&record.pool_name)
                .push_bind(&record.pool_type)
                .push_bind(&record.char_id)
                .push_bind(&record.char_name)
                .push_bind(record.rarity)
                .push_bind(record.is_free)
                .push_bind(record.is_new)
                .push_bind(&record.gacha_ts)
                .push_bind(&record.seq_id)
                .push_bind(&record.lang)
                .push_bind(&record.server_id)
                .push_bind(record.created_at);
        });

        let mut tx = self.pool.begin().await?;
        builder
            .build()
            .execute(&mut *tx)
            .await
            .map_err(|e| map_insert_error(e, "PullRecord batch", format!("{} rows", records.len())))?;
        tx.commit().await?;

        Ok(())
    }

    async fn find_by_role(&self, role_id: &str) -> Result<Vec<PullRecord>> {
        let records = query_as::<_, PullRecord>(
            r#"
            SELECT * FROM pull_records
            WHERE role_id = ?
            ORDER BY pool_type ASC, CAST(seq_id AS INTEGER) DESC
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn max_seq_id(&self, role_id: &str, pool_type: PoolType) -> Result<Option<u64>> {
        let row: (Option<i64>,) = query_as(
            "SELECT MAX(CAST(seq_id AS INTEGER)) FROM pull_records WHERE role_id = ? AND pool_type = ?",
        )
        .bind(role_id)
        .bind(pool_type.wire_name())
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0.and_then(|max| u64::try_from(max).ok()))
    }

    async fn count_by_role(&self, role_id: &str) -> Result<i64> {
        let row: (i64,) = query_as("SELECT COUNT(*) FROM pull_records WHERE role_id = ?")
            .bind(role_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.0)
    }
}
