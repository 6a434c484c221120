//! # User Directory
//!
//! Display names for notification text. Lookups are best effort: a slow or
//! failing directory never blocks a workflow, the name just becomes
//! [`UNKNOWN_USER`].

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

use bazaar_core::UNKNOWN_USER;
use bazaar_db::{Database, DbResult};

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// The user's display name, `None` if the user has no profile.
    async fn display_name(&self, user_id: &str) -> DbResult<Option<String>>;
}

/// Directory backed by the local `user_profiles` table.
#[derive(Debug, Clone)]
pub struct ProfileDirectory {
    db: Database,
}

impl ProfileDirectory {
    pub fn new(db: Database) -> Self {
        ProfileDirectory { db }
    }
}

#[async_trait]
impl UserDirectory for ProfileDirectory {
    async fn display_name(&self, user_id: &str) -> DbResult<Option<String>> {
        let profile = self.db.user_profiles().get(user_id).await?;
        Ok(profile.and_then(|p| p.display_name.or(p.email)))
    }
}

/// Directory lookups bounded by a timeout.
#[derive(Clone)]
pub struct NameLookup {
    directory: Arc<dyn UserDirectory>,
    timeout: Duration,
}

impl NameLookup {
    pub fn new(directory: Arc<dyn UserDirectory>, timeout: Duration) -> Self {
        NameLookup { directory, timeout }
    }

    /// Display name or [`UNKNOWN_USER`].
    pub async fn name_of(&self, user_id: &str) -> String {
        match tokio::time::timeout(self.timeout, self.directory.display_name(user_id)).await {
            Ok(Ok(Some(name))) => name,
            Ok(Ok(None)) => UNKNOWN_USER.to_string(),
            Ok(Err(e)) => {
                warn!(user_id = %user_id, error = %e, "User directory lookup failed");
                UNKNOWN_USER.to_string()
            }
            Err(_) => {
                warn!(user_id = %user_id, timeout_ms = self.timeout.as_millis() as u64, "User directory lookup timed out");
                UNKNOWN_USER.to_string()
            }
        }
    }
}

impl fmt::Debug for NameLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NameLookup")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bazaar_core::UserProfile;
    use bazaar_db::DbConfig;
    use chrono::Utc;

    struct SlowDirectory;

    #[async_trait]
    impl UserDirectory for SlowDirectory {
        async fn display_name(&self, _user_id: &str) -> DbResult<Option<String>> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(Some("never".to_string()))
        }
    }

    #[tokio::test]
    async fn test_profile_lookup_and_fallback() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        db.user_profiles()
            .upsert(
                &UserProfile {
                    id: "u1".to_string(),
                    email: Some("u1@example.com".to_string()),
                    display_name: Some("Alice".to_string()),
                    avatar_url: None,
                },
                Utc::now(),
            )
            .await
            .unwrap();

        let lookup = NameLookup::new(Arc::new(ProfileDirectory::new(db)), Duration::from_secs(1));
        assert_eq!(lookup.name_of("u1").await, "Alice");
        assert_eq!(lookup.name_of("ghost").await, UNKNOWN_USER);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_falls_back() {
        let lookup = NameLookup::new(Arc::new(SlowDirectory), Duration::from_millis(50));
        assert_eq!(lookup.name_of("u1").await, UNKNOWN_USER);
    }
}
