//! # Notification Inbox
//!
//! The user-facing side of the notifications table. Delivery to external
//! channels is the dispatcher's job.

use bazaar_core::{CoreError, Notification};
use bazaar_db::Database;

use crate::error::MarketResult;

/// Maximum notifications returned by [`NotificationService::list`].
pub const INBOX_LIMIT: u32 = 50;

#[derive(Debug, Clone)]
pub struct NotificationService {
    db: Database,
}

impl NotificationService {
    pub fn new(db: Database) -> Self {
        NotificationService { db }
    }

    /// Newest first.
    pub async fn list(&self, user_id: &str, unread_only: bool) -> MarketResult<Vec<Notification>> {
        Ok(self
            .db
            .notifications()
            .list_for_user(user_id, unread_only, INBOX_LIMIT)
            .await?)
    }

    pub async fn unread_count(&self, user_id: &str) -> MarketResult<i64> {
        Ok(self.db.notifications().unread_count(user_id).await?)
    }

    pub async fn mark_read(&self, id: &str, user_id: &str) -> MarketResult<()> {
        if !self.db.notifications().mark_read(id, user_id).await? {
            return Err(CoreError::NotificationNotFound(id.to_string()).into());
        }
        Ok(())
    }

    /// Returns how many were unread.
    pub async fn mark_all_read(&self, user_id: &str) -> MarketResult<u64> {
        Ok(self.db.notifications().mark_all_read(user_id).await?)
    }

    pub async fn delete(&self, id: &str, user_id: &str) -> MarketResult<()> {
        if !self.db.notifications().delete(id, user_id).await? {
            return Err(CoreError::NotificationNotFound(id.to_string()).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::testing::market;
    use crate::MarketError;
    use bazaar_core::{CoreError, NewNotification, NotificationKind};
    use serde_json::json;

    fn note(user: &str) -> NewNotification {
        NewNotification {
            user_id: user.to_string(),
            kind: NotificationKind::WithdrawalRejected,
            title: "Withdrawal rejected".to_string(),
            message: "Wrong account".to_string(),
            action_url: None,
            metadata: json!({}),
        }
    }

    #[tokio::test]
    async fn test_inbox_operations() {
        let (market, _clock) = market().await;
        market.notifier().send(vec![note("u1"), note("u1"), note("u2")]).await;
        let inbox = market.notifications();

        let all = inbox.list("u1", false).await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(inbox.unread_count("u1").await.unwrap(), 2);

        inbox.mark_read(&all[0].id, "u1").await.unwrap();
        assert_eq!(inbox.list("u1", true).await.unwrap().len(), 1);

        let err = inbox.mark_read(&all[0].id, "u2").await.unwrap_err();
        assert!(matches!(err, MarketError::Core(CoreError::NotificationNotFound(_))));

        assert_eq!(inbox.mark_all_read("u1").await.unwrap(), 1);
        assert_eq!(inbox.unread_count("u1").await.unwrap(), 0);

        inbox.delete(&all[1].id, "u1").await.unwrap();
        assert!(inbox.delete(&all[1].id, "u1").await.is_err());
        assert_eq!(inbox.list("u1", false).await.unwrap().len(), 1);
    }
}
