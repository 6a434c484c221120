//! API server configuration.
//!
//! Loaded in three layers, later layers winning:
//!
//! ```text
//! built-in defaults ──► bazaar.toml (or $BAZAAR_CONFIG) ──► BAZAAR__* env vars
//! ```
//!
//! Environment keys use `__` between section and field, e.g.
//! `BAZAAR__SERVER__PORT=9000` or `BAZAAR__AUTH__JWT_SECRET=...`.

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use bazaar_db::DbConfig;
use bazaar_market::{DispatcherConfig, SchedulerConfig};

/// Environment variable naming the config file.
pub const CONFIG_PATH_ENV: &str = "BAZAAR_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "bazaar.toml";
const DEV_JWT_SECRET: &str = "bazaar-dev-secret-change-in-production";
const DEV_WEBHOOK_SECRET: &str = "bazaar-dev-webhook-secret";

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
    pub auth: AuthSettings,
    pub scheduler: SchedulerSettings,
    pub notifications: NotificationSettings,
    pub directory: DirectorySettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// SQLite file, created on first start.
    pub path: PathBuf,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AuthSettings {
    /// HS256 signing secret.
    pub jwt_secret: String,
    pub access_token_lifetime_secs: i64,
    /// Expected `X-Webhook-Secret` on gateway callbacks.
    pub webhook_secret: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerSettings {
    pub interval_secs: u64,
    pub batch_size: u32,
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    pub poll_interval_secs: u64,
    pub batch_size: u32,
    pub delivery_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DirectorySettings {
    pub lookup_timeout_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        ServerSettings {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: PathBuf::from("bazaar.db"),
            max_connections: 5,
        }
    }
}

impl Default for AuthSettings {
    fn default() -> Self {
        AuthSettings {
            jwt_secret: DEV_JWT_SECRET.to_string(),
            access_token_lifetime_secs: 3600, // 1 hour
            webhook_secret: DEV_WEBHOOK_SECRET.to_string(),
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        let defaults = SchedulerConfig::default();
        SchedulerSettings {
            interval_secs: defaults.interval.as_secs(),
            batch_size: defaults.batch_size,
            enabled: defaults.enabled,
        }
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        let defaults = DispatcherConfig::default();
        NotificationSettings {
            poll_interval_secs: defaults.poll_interval.as_secs(),
            batch_size: defaults.batch_size,
            delivery_timeout_ms: defaults.delivery_timeout.as_millis() as u64,
        }
    }
}

impl Default for DirectorySettings {
    fn default() -> Self {
        DirectorySettings {
            lookup_timeout_ms: bazaar_market::DEFAULT_LOOKUP_TIMEOUT.as_millis() as u64,
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

impl ApiConfig {
    /// Loads from `$BAZAAR_CONFIG` (default `bazaar.toml`, optional) and
    /// `BAZAAR__*` environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        let config = config::Config::builder()
            .add_source(config::File::with_name(&path).required(false))
            .add_source(
                config::Environment::with_prefix("BAZAAR")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize::<ApiConfig>()?;

        config.validate()?;
        Ok(config)
    }

    /// Loads one TOML file without consulting the environment.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path))
            .build()?
            .try_deserialize::<ApiConfig>()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.auth.jwt_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("auth.jwt_secret".to_string()));
        }
        if self.auth.webhook_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("auth.webhook_secret".to_string()));
        }
        if self.auth.access_token_lifetime_secs <= 0 {
            return Err(ConfigError::InvalidValue("auth.access_token_lifetime_secs".to_string()));
        }
        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::InvalidValue("scheduler.interval_secs".to_string()));
        }
        if self.notifications.poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue("notifications.poll_interval_secs".to_string()));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::InvalidValue("database.max_connections".to_string()));
        }
        Ok(())
    }

    /// Whether either secret is still the built-in development value.
    pub fn uses_dev_secrets(&self) -> bool {
        self.auth.jwt_secret == DEV_JWT_SECRET || self.auth.webhook_secret == DEV_WEBHOOK_SECRET
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(self.database.path.clone()).max_connections(self.database.max_connections)
    }

    pub fn scheduler_config(&self) -> SchedulerConfig {
        SchedulerConfig {
            interval: Duration::from_secs(self.scheduler.interval_secs),
            batch_size: self.scheduler.batch_size,
            enabled: self.scheduler.enabled,
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            poll_interval: Duration::from_secs(self.notifications.poll_interval_secs),
            batch_size: self.notifications.batch_size,
            delivery_timeout: Duration::from_millis(self.notifications.delivery_timeout_ms),
        }
    }

    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.directory.lookup_timeout_ms)
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_config(name: &str, body: &str) -> PathBuf {
        let path = std::env::temp_dir().join(format!("bazaar-{}-{name}.toml", std::process::id()));
        fs::write(&path, body).unwrap();
        path
    }

    #[test]
    fn test_defaults_match_workflow_defaults() {
        let config = ApiConfig::default();
        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.scheduler_config().interval, Duration::from_secs(3600));
        assert_eq!(config.dispatcher_config().delivery_timeout, Duration::from_millis(3000));
        assert!(config.uses_dev_secrets());
    }

    #[test]
    fn test_file_overrides_some_fields() {
        let path = write_config(
            "partial",
            r#"
            [server]
            port = 9100

            [auth]
            jwt_secret = "prod-secret"
            webhook_secret = "gateway-secret"

            [scheduler]
            interval_secs = 60
            enabled = false
            "#,
        );

        let config = ApiConfig::from_file(&path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(!config.uses_dev_secrets());
        let scheduler = config.scheduler_config();
        assert_eq!(scheduler.interval, Duration::from_secs(60));
        assert!(!scheduler.enabled);
        assert_eq!(scheduler.batch_size, 500);
    }

    #[test]
    fn test_rejects_empty_secret() {
        let path = write_config(
            "empty-secret",
            r#"
            [auth]
            jwt_secret = ""
            "#,
        );

        let err = ApiConfig::from_file(&path).unwrap_err();
        fs::remove_file(&path).ok();
        assert!(matches!(err, ConfigError::MissingRequired(field) if field == "auth.jwt_secret"));
    }
}
