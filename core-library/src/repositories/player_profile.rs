//! Player profile repository trait and implementation

use crate::error::Result;
use crate::models::PlayerProfile;
use async_trait::async_trait;
use sqlx::{query, query_as, SqlitePool};

#[async_trait]
pub trait PlayerProfileRepository: Send + Sync {
    /// Store a profile unless one already exists for the role id
    ///
    /// # Returns
    /// `Ok(true)` if the profile was inserted, `Ok(false)` if it already existed
    async fn insert_if_absent(&self, profile: &PlayerProfile) -> Result<bool>;

    async fn find_by_role(&self, role_id: &str) -> Result<Option<PlayerProfile>>;
}

/// SQLite implementation of PlayerProfileRepository
pub struct SqlitePlayerProfileRepository {
    pool: SqlitePool,
}

impl SqlitePlayerProfileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PlayerProfileRepository for SqlitePlayerProfileRepository {
    async fn insert_if_absent(&self, profile: &PlayerProfile) -> Result<bool> {
        let result = query(
            r#"
            INSERT OR IGNORE INTO player_profiles (role_id, uid, nick_name, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&profile.role_id)
        .bind(&profile.uid)
        .bind(&profile.nick_name)
        .bind(profile.created_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_by_role(&self, role_id: &str) -> Result<Option<PlayerProfile>> {
        let profile =
            query_as::<_, PlayerProfile>("SELECT * FROM player_profiles WHERE role_id = ?")
                .bind(role_id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_test_pool;

    fn profile(nick_name: &str) -> PlayerProfile {
        PlayerProfile {
            role_id: "P1".to_string(),
            uid: "10001".to_string(),
            nick_name: nick_name.to_string(),
            created_at: 1_716_000_000_000,
        }
    }

    #[tokio::test]
    async fn test_insert_if_absent_keeps_first_profile() {
        let repo = SqlitePlayerProfileRepository::new(create_test_pool().await.unwrap());

        assert!(repo.insert_if_absent(&profile("Endmin")).await.unwrap());
        assert!(!repo.insert_if_absent(&profile("Renamed")).await.unwrap());

        let found = repo.find_by_role("P1").await.unwrap().unwrap();
        assert_eq!(found.nick_name, "Endmin");
    }

    #[tokio::test]
    async fn test_find_missing_profile() {
        let repo = SqlitePlayerProfileRepository::new(create_test_pool().await.unwrap());

        assert!(repo.find_by_role("nobody").await.unwrap().is_none());
    }
}
