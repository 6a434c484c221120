//! # Notification Repository
//!
//! One table serves as both the user's inbox and the delivery outbox.
//!
//! ```text
//!  workflow tx ──insert──► notifications (dispatched_at NULL)
//!                                │
//!        dispatcher ◄─fetch_undelivered (attempts < max)
//!            │
//!            ├── sink ok   → mark_dispatched
//!            └── sink err  → mark_failed (attempts + 1, last_error)
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use super::{from_json, to_json};
use crate::error::{DbError, DbResult};
use bazaar_core::{NewNotification, Notification, NotificationKind};

#[derive(Debug, sqlx::FromRow)]
struct NotificationRecord {
    id: String,
    user_id: String,
    kind: NotificationKind,
    title: String,
    message: String,
    action_url: Option<String>,
    metadata: String,
    is_read: bool,
    attempts: i64,
    last_error: Option<String>,
    dispatched_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRecord> for Notification {
    type Error = DbError;

    fn try_from(r: NotificationRecord) -> DbResult<Self> {
        Ok(Notification {
            id: r.id,
            user_id: r.user_id,
            kind: r.kind,
            title: r.title,
            message: r.message,
            action_url: r.action_url,
            metadata: from_json(&r.metadata)?,
            read: r.is_read,
            attempts: r.attempts,
            last_error: r.last_error,
            dispatched_at: r.dispatched_at,
            created_at: r.created_at,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT id, user_id, kind, title, message, action_url, metadata, is_read,
           attempts, last_error, dispatched_at, created_at
    FROM notifications
"#;

/// Repository for notifications.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: SqlitePool,
}

impl NotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        NotificationRepository { pool }
    }

    /// Queues a notification outside of any workflow transaction.
    pub async fn create(&self, new: &NewNotification, now: DateTime<Utc>) -> DbResult<Notification> {
        let mut conn = self.pool.acquire().await?;
        let id = Self::insert(&mut conn, new, now).await?;
        drop(conn);

        self.get_by_id(&id)
            .await?
            .ok_or_else(|| DbError::not_found("Notification", &id))
    }

    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Notification>> {
        let record = sqlx::query_as::<_, NotificationRecord>(&format!("{SELECT_COLUMNS} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        record.map(Notification::try_from).transpose()
    }

    /// A user's inbox, newest first.
    pub async fn list_for_user(&self, user_id: &str, unread_only: bool, limit: u32) -> DbResult<Vec<Notification>> {
        let records = sqlx::query_as::<_, NotificationRecord>(&format!(
            "{SELECT_COLUMNS} WHERE user_id = ?1 AND (?2 = 0 OR is_read = 0) \
             ORDER BY created_at DESC, rowid DESC LIMIT ?3"
        ))
        .bind(user_id)
        .bind(unread_only)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(Notification::try_from).collect()
    }

    pub async fn unread_count(&self, user_id: &str) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND is_read = 0")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }

    pub async fn mark_read(&self, id: &str, user_id: &str) -> DbResult<bool> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_all_read(&self, user_id: &str) -> DbResult<u64> {
        let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ?1 AND is_read = 0")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete(&self, id: &str, user_id: &str) -> DbResult<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = ?1 AND user_id = ?2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Outbox
    // =========================================================================

    /// Oldest rows not yet delivered and still under the attempt limit.
    pub async fn fetch_undelivered(&self, max_attempts: u32, limit: u32) -> DbResult<Vec<Notification>> {
        let records = sqlx::query_as::<_, NotificationRecord>(&format!(
            "{SELECT_COLUMNS} WHERE dispatched_at IS NULL AND attempts < ?1 \
             ORDER BY created_at, rowid LIMIT ?2"
        ))
        .bind(max_attempts as i64)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(Notification::try_from).collect()
    }

    pub async fn mark_dispatched(&self, id: &str, now: DateTime<Utc>) -> DbResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET dispatched_at = ?2, attempts = attempts + 1, last_error = NULL
            WHERE id = ?1 AND dispatched_at IS NULL
            "#,
        )
        .bind(id)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn mark_failed(&self, id: &str, error: &str) -> DbResult<()> {
        sqlx::query("UPDATE notifications SET attempts = attempts + 1, last_error = ?2 WHERE id = ?1")
            .bind(id)
            .bind(error)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // =========================================================================
    // Transaction functions
    // =========================================================================

    /// Queues a notification inside the caller's transaction. Returns its id.
    pub async fn insert(
        conn: &mut SqliteConnection,
        new: &NewNotification,
        now: DateTime<Utc>,
    ) -> DbResult<String> {
        let id = Uuid::new_v4().to_string();
        debug!(id = %id, user_id = %new.user_id, kind = %new.kind, "Queueing notification");

        sqlx::query(
            r#"
            INSERT INTO notifications (id, user_id, kind, title, message, action_url, metadata, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&id)
        .bind(&new.user_id)
        .bind(new.kind)
        .bind(&new.title)
        .bind(&new.message)
        .bind(&new.action_url)
        .bind(to_json(&new.metadata)?)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(id)
    }
}
