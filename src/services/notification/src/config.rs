//! Configuration module for the notification dispatcher
//!
//! Layering: built-in defaults, then an optional config file
//! (`NOTIFIER_CONFIG_FILE`), then `NOTIFIER__SECTION__KEY` environment
//! variables. CLI overrides are applied by the binary afterwards.

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use society_shared::types::{ADMIN_TOPIC, ALL_USERS_TOPIC};
use std::time::Duration;

/// Main configuration structure for the notification dispatcher
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Trigger ingress server
    pub server: ServerConfig,

    /// Push delivery
    pub push: PushConfig,

    /// Document store used for member lookups and bill scans
    pub store: StoreConfig,

    /// Broadcast topic names
    pub topics: TopicConfig,

    /// Daily jobs
    pub scheduler: SchedulerConfig,

    /// Rendering of dates inside notification bodies
    pub display: DisplayConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushProvider {
    /// Firebase Cloud Messaging HTTP v1
    Fcm,
    /// Log and record messages without delivering them
    Log,
}

/// Push delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    pub provider: PushProvider,
    pub fcm: FcmConfig,
    pub timeout_seconds: u64,
    /// Most recent messages kept in memory by the log provider
    pub log_retention: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FcmConfig {
    /// Firebase project id; taken from the service account when empty
    pub project_id: String,
    /// Path to a service-account JSON key
    pub credentials_path: Option<String>,
    /// Pre-issued OAuth access token, used instead of a service account
    pub access_token: Option<String>,
    /// Base URL of the messaging API
    pub endpoint: String,
    /// Overrides the token URI found in the service account
    pub token_uri: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Mongo,
    Memory,
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub mongo: MongoStoreConfig,
    /// JSON fixture loaded by the memory backend
    pub fixture_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoStoreConfig {
    pub url: String,
    pub database: String,
    pub members_collection: String,
    pub bills_collection: String,
    pub connect_timeout_seconds: u64,
}

/// Topic names
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicConfig {
    pub all_users: String,
    pub admins: String,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub enabled: bool,
    /// Six-field cron expression (seconds first)
    pub billing_reminder_cron: String,
    pub overdue_alert_cron: String,
    /// Fixed offset of the society's timezone, in minutes east of UTC
    pub utc_offset_minutes: i32,
    pub reminder_window_hours: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    /// `chrono` format string for due dates
    pub date_format: String,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    pub enabled: bool,
    pub namespace: String,
    pub histogram_buckets: Vec<f64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8087,
            timeout_seconds: 30,
        }
    }
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            provider: PushProvider::Log,
            fcm: FcmConfig::default(),
            timeout_seconds: 30,
            log_retention: crate::channels::log::DEFAULT_RETENTION,
        }
    }
}

impl Default for FcmConfig {
    fn default() -> Self {
        Self {
            project_id: std::env::var("FCM_PROJECT_ID").unwrap_or_default(),
            credentials_path: std::env::var("GOOGLE_APPLICATION_CREDENTIALS").ok(),
            access_token: None,
            endpoint: "https://fcm.googleapis.com".to_string(),
            token_uri: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            mongo: MongoStoreConfig::default(),
            fixture_path: None,
        }
    }
}

impl Default for MongoStoreConfig {
    fn default() -> Self {
        Self {
            url: std::env::var("MONGO_URL")
                .unwrap_or_else(|_| "mongodb://localhost:27017".to_string()),
            database: "society".to_string(),
            members_collection: society_shared::types::MEMBERS.to_string(),
            bills_collection: society_shared::types::UTILITY_BILLS.to_string(),
            connect_timeout_seconds: 10,
        }
    }
}

impl Default for TopicConfig {
    fn default() -> Self {
        Self {
            all_users: ALL_USERS_TOPIC.to_string(),
            admins: ADMIN_TOPIC.to_string(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            billing_reminder_cron: "0 0 9 * * *".to_string(),
            overdue_alert_cron: "0 0 10 * * *".to_string(),
            utc_offset_minutes: 330, // Asia/Kolkata
            reminder_window_hours: 48,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            date_format: "%-m/%-d/%Y".to_string(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            namespace: "society_notifier".to_string(),
            histogram_buckets: vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0],
        }
    }
}

impl NotifierConfig {
    /// Load configuration from environment variables and config file
    pub fn from_env() -> Result<Self, config::ConfigError> {
        let mut cfg = config::Config::builder();

        // Start with default configuration
        cfg = cfg.add_source(config::Config::try_from(&NotifierConfig::default())?);

        // Add config file if it exists
        if let Ok(config_file) = std::env::var("NOTIFIER_CONFIG_FILE") {
            cfg = cfg.add_source(config::File::with_name(&config_file).required(false));
        }

        // Environment variables win over the file
        cfg = cfg.add_source(
            config::Environment::with_prefix("NOTIFIER")
                .separator("__")
                .try_parsing(true),
        );

        cfg.build()?.try_deserialize()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }

        if self.push.provider == PushProvider::Fcm {
            let fcm = &self.push.fcm;
            if fcm.credentials_path.is_none() && fcm.access_token.is_none() {
                return Err(
                    "FCM requires either a service-account credentials path or an access token"
                        .to_string(),
                );
            }
            if fcm.credentials_path.is_none() && fcm.project_id.is_empty() {
                return Err("FCM project id is required when using an access token".to_string());
            }
            if fcm.endpoint.is_empty() {
                return Err("FCM endpoint must not be empty".to_string());
            }
        }

        if self.store.backend == StoreBackend::Mongo {
            if self.store.mongo.url.is_empty() {
                return Err("MongoDB URL is required for the mongo store".to_string());
            }
            if self.store.mongo.database.is_empty() {
                return Err("MongoDB database name is required for the mongo store".to_string());
            }
        }

        if self.topics.all_users.is_empty() || self.topics.admins.is_empty() {
            return Err("Topic names must not be empty".to_string());
        }

        if self.scheduler.enabled {
            for (name, expression) in [
                ("billing_reminder_cron", &self.scheduler.billing_reminder_cron),
                ("overdue_alert_cron", &self.scheduler.overdue_alert_cron),
            ] {
                let fields = expression.split_whitespace().count();
                if !(6..=7).contains(&fields) {
                    return Err(format!(
                        "{} must have 6 or 7 fields (seconds first), got '{}'",
                        name, expression
                    ));
                }
            }
        }

        if self.utc_offset().is_none() {
            return Err(format!(
                "UTC offset of {} minutes is out of range",
                self.scheduler.utc_offset_minutes
            ));
        }

        if self.scheduler.reminder_window_hours <= 0 {
            return Err("Reminder window must be greater than 0 hours".to_string());
        }

        Ok(())
    }

    /// Fixed offset of the society's timezone
    pub fn utc_offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.scheduler.utc_offset_minutes.checked_mul(60)?)
    }

    /// How far ahead the billing reminder looks
    pub fn reminder_window(&self) -> chrono::Duration {
        chrono::Duration::hours(self.scheduler.reminder_window_hours)
    }

    /// Get timeout duration for the specified operation
    pub fn get_timeout(&self, operation: &str) -> Duration {
        let seconds = match operation {
            "push" => self.push.timeout_seconds,
            "store" => self.store.mongo.connect_timeout_seconds,
            "server" => self.server.timeout_seconds,
            _ => 30,
        };
        Duration::from_secs(seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = NotifierConfig::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8087);
        assert_eq!(config.push.provider, PushProvider::Log);
        assert_eq!(config.push.log_retention, 100);
        assert_eq!(config.store.backend, StoreBackend::Memory);
        assert_eq!(config.topics.all_users, "all_users");
        assert_eq!(config.topics.admins, "maintenance_admins");
        assert_eq!(config.scheduler.utc_offset_minutes, 330);
    }

    #[test]
    fn test_config_validation() {
        let config = NotifierConfig::default();
        assert!(config.validate().is_ok());

        let mut invalid_config = config.clone();
        invalid_config.server.port = 0;
        assert!(invalid_config.validate().is_err());

        let mut bad_cron = config.clone();
        bad_cron.scheduler.billing_reminder_cron = "0 9 * * *".to_string();
        assert!(bad_cron.validate().is_err());

        let mut bad_offset = config;
        bad_offset.scheduler.utc_offset_minutes = 24 * 60;
        assert!(bad_offset.validate().is_err());
    }

    #[test]
    fn test_fcm_requires_credentials() {
        let mut config = NotifierConfig::default();
        config.push.provider = PushProvider::Fcm;
        config.push.fcm.credentials_path = None;
        config.push.fcm.access_token = None;
        assert!(config.validate().is_err());

        config.push.fcm.access_token = Some("ya29.token".to_string());
        config.push.fcm.project_id = "society-app".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_offset_and_window() {
        let config = NotifierConfig::default();
        assert_eq!(config.utc_offset().unwrap().local_minus_utc(), 330 * 60);
        assert_eq!(config.reminder_window(), chrono::Duration::days(2));
    }

    #[test]
    fn test_timeout_getter() {
        let config = NotifierConfig::default();
        assert_eq!(config.get_timeout("push"), Duration::from_secs(30));
        assert_eq!(config.get_timeout("unknown"), Duration::from_secs(30));
    }
}
