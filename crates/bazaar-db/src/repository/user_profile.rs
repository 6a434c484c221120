//! # User Profile Repository
//!
//! Local copy of user display data, used by the directory lookup when
//! decorating reports and orders.

use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use crate::error::DbResult;
use bazaar_core::UserProfile;

#[derive(Debug, sqlx::FromRow)]
struct UserProfileRecord {
    id: String,
    email: Option<String>,
    display_name: Option<String>,
    avatar_url: Option<String>,
}

impl From<UserProfileRecord> for UserProfile {
    fn from(r: UserProfileRecord) -> Self {
        UserProfile {
            id: r.id,
            email: r.email,
            display_name: r.display_name,
            avatar_url: r.avatar_url,
        }
    }
}

/// Repository for user profiles.
#[derive(Debug, Clone)]
pub struct UserProfileRepository {
    pool: SqlitePool,
}

impl UserProfileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        UserProfileRepository { pool }
    }

    pub async fn get(&self, id: &str) -> DbResult<Option<UserProfile>> {
        let record = sqlx::query_as::<_, UserProfileRecord>(
            "SELECT id, email, display_name, avatar_url FROM user_profiles WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record.map(UserProfile::from))
    }

    /// Inserts or refreshes a profile.
    pub async fn upsert(&self, profile: &UserProfile, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO user_profiles (id, email, display_name, avatar_url, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (id) DO UPDATE SET
                email = excluded.email,
                display_name = excluded.display_name,
                avatar_url = excluded.avatar_url
            "#,
        )
        .bind(&profile.id)
        .bind(&profile.email)
        .bind(&profile.display_name)
        .bind(&profile.avatar_url)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{db, t0};

    #[tokio::test]
    async fn test_upsert_and_get() {
        let db = db().await;
        let repo = db.user_profiles();
        let mut profile = UserProfile {
            id: "u1".to_string(),
            email: Some("a@example.com".to_string()),
            display_name: Some("Alice".to_string()),
            avatar_url: None,
        };

        repo.upsert(&profile, t0()).await.unwrap();
        profile.display_name = Some("Alice B".to_string());
        repo.upsert(&profile, t0()).await.unwrap();

        let loaded = repo.get("u1").await.unwrap().unwrap();
        assert_eq!(loaded.display_name.as_deref(), Some("Alice B"));
        assert!(repo.get("u2").await.unwrap().is_none());
    }
}
