//! Configuration
//!
//! All settings come from environment variables, but nothing in the library
//! reads the process environment directly: [`Config::from_lookup`] takes the
//! lookup as a function and [`Config::from_env`] is a thin wrapper around it.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Local};

use crate::credentials::ApiCredentials;
use crate::store::ExportFormat;

pub const ENV_API_ID: &str = "TG_API_ID";
pub const ENV_API_HASH: &str = "TG_API_HASH";
pub const ENV_SESSION_NAME_PREFIX: &str = "SESSION_NAME_PREFIX";
pub const ENV_BACKUP_DIR: &str = "SESSION_BACKUP_DIR";
pub const ENV_EXPORT_DIR: &str = "SESSION_EXPORT_DIR";
pub const ENV_EXPORT_FORMAT: &str = "SESSION_EXPORT_FORMAT";
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
pub const ENV_CREATE_BACKUPS: &str = "CREATE_BACKUPS";
pub const ENV_SEND_TO_SAVED_MESSAGES: &str = "SEND_TO_SAVED_MESSAGES";
pub const ENV_VALIDATE_TIMEOUT_SECS: &str = "VALIDATE_TIMEOUT_SECS";
pub const ENV_BATCH_CONCURRENCY: &str = "BATCH_CONCURRENCY";
pub const ENV_BATCH_DELAY_MS: &str = "BATCH_DELAY_MS";

const DEFAULT_SESSION_NAME_PREFIX: &str = "tg_session";
const DEFAULT_BACKUP_DIR: &str = "./backups";
const DEFAULT_EXPORT_DIR: &str = "./exports";
const DEFAULT_LOG_LEVEL: &str = "warn";
const DEFAULT_VALIDATE_TIMEOUT_SECS: u64 = 30;
const DEFAULT_BATCH_DELAY_MS: u64 = 1000;

/// Settings for [`SessionInspector`](crate::SessionInspector)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InspectorConfig {
    /// Upper bound for one validation, `None` waits forever
    pub timeout: Option<Duration>,
    /// How many tokens of a batch are validated at once
    pub batch_concurrency: usize,
    /// Pause between tokens when a batch runs sequentially
    pub batch_delay: Duration,
}

impl Default for InspectorConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(DEFAULT_VALIDATE_TIMEOUT_SECS)),
            batch_concurrency: 1,
            batch_delay: Duration::from_millis(DEFAULT_BATCH_DELAY_MS),
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Default API credentials, prompted for when absent
    pub api: Option<ApiCredentials>,
    pub session_name_prefix: String,
    pub backup_dir: PathBuf,
    pub export_dir: PathBuf,
    pub export_format: ExportFormat,
    pub log_level: String,
    pub create_backups: bool,
    pub send_to_saved_messages: bool,
    pub inspector: InspectorConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl Config {
    /// Load configuration from the process environment
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from a variable lookup
    ///
    /// Unparseable values are logged and replaced by their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api = match (get(ENV_API_ID), get(ENV_API_HASH)) {
            (Some(id), Some(hash)) => ApiCredentials::parse(&id, &hash)
                .inspect_err(|error| {
                    tracing::warn!(%error, "ignoring API credentials from environment");
                })
                .ok(),
            (None, None) => None,
            _ => {
                tracing::warn!(
                    "only one of {} and {} is set, ignoring both",
                    ENV_API_ID,
                    ENV_API_HASH
                );
                None
            }
        };

        let timeout_secs: u64 = parse_or(
            ENV_VALIDATE_TIMEOUT_SECS,
            get(ENV_VALIDATE_TIMEOUT_SECS),
            DEFAULT_VALIDATE_TIMEOUT_SECS,
        );
        let batch_concurrency: usize =
            parse_or(ENV_BATCH_CONCURRENCY, get(ENV_BATCH_CONCURRENCY), 1);
        let batch_delay_ms: u64 =
            parse_or(ENV_BATCH_DELAY_MS, get(ENV_BATCH_DELAY_MS), DEFAULT_BATCH_DELAY_MS);

        Self {
            api,
            session_name_prefix: get(ENV_SESSION_NAME_PREFIX)
                .unwrap_or_else(|| DEFAULT_SESSION_NAME_PREFIX.to_string()),
            backup_dir: get(ENV_BACKUP_DIR)
                .map(|p| expand_home(&p))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_BACKUP_DIR)),
            export_dir: get(ENV_EXPORT_DIR)
                .map(|p| expand_home(&p))
                .unwrap_or_else(|| PathBuf::from(DEFAULT_EXPORT_DIR)),
            export_format: parse_or(ENV_EXPORT_FORMAT, get(ENV_EXPORT_FORMAT), ExportFormat::Txt),
            log_level: get(ENV_LOG_LEVEL).unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            create_backups: flag_or(ENV_CREATE_BACKUPS, get(ENV_CREATE_BACKUPS), true),
            send_to_saved_messages: flag_or(
                ENV_SEND_TO_SAVED_MESSAGES,
                get(ENV_SEND_TO_SAVED_MESSAGES),
                true,
            ),
            inspector: InspectorConfig {
                timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
                batch_concurrency: batch_concurrency.max(1),
                batch_delay: Duration::from_millis(batch_delay_ms),
            },
        }
    }

    /// Default name for a new session: `<prefix>_<YYYYmmdd_HHMMSS>`
    pub fn default_session_name(&self, at: DateTime<Local>) -> String {
        format!("{}_{}", self.session_name_prefix, at.format("%Y%m%d_%H%M%S"))
    }
}

fn parse_or<T: FromStr>(var: &str, value: Option<String>, default: T) -> T {
    match value {
        Some(value) => value.parse().unwrap_or_else(|_| {
            tracing::warn!(%var, %value, "invalid value, using default");
            default
        }),
        None => default,
    }
}

fn flag_or(var: &str, value: Option<String>, default: bool) -> bool {
    match value.as_deref().map(str::to_ascii_lowercase).as_deref() {
        Some("true" | "1" | "yes" | "on") => true,
        Some("false" | "0" | "no" | "off") => false,
        Some(other) => {
            tracing::warn!(%var, value = %other, "invalid flag, using default");
            default
        }
        None => default,
    }
}

/// Expand a leading `~/` to the home directory
fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_with(&[]);
        assert!(config.api.is_none());
        assert_eq!(config.session_name_prefix, "tg_session");
        assert_eq!(config.backup_dir, PathBuf::from("./backups"));
        assert_eq!(config.export_dir, PathBuf::from("./exports"));
        assert_eq!(config.export_format, ExportFormat::Txt);
        assert_eq!(config.log_level, "warn");
        assert!(config.create_backups);
        assert!(config.send_to_saved_messages);
        assert_eq!(config.inspector, InspectorConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = config_with(&[
            (ENV_API_ID, "12345"),
            (ENV_API_HASH, "0123456789abcdef0123456789abcdef"),
            (ENV_SESSION_NAME_PREFIX, "work"),
            (ENV_BACKUP_DIR, "/tmp/b"),
            (ENV_EXPORT_FORMAT, "json"),
            (ENV_CREATE_BACKUPS, "FALSE"),
            (ENV_SEND_TO_SAVED_MESSAGES, "no"),
            (ENV_VALIDATE_TIMEOUT_SECS, "0"),
            (ENV_BATCH_CONCURRENCY, "4"),
            (ENV_BATCH_DELAY_MS, "250"),
        ]);

        assert_eq!(config.api.as_ref().map(|a| a.api_id), Some(12345));
        assert_eq!(config.session_name_prefix, "work");
        assert_eq!(config.backup_dir, PathBuf::from("/tmp/b"));
        assert_eq!(config.export_format, ExportFormat::Json);
        assert!(!config.create_backups);
        assert!(!config.send_to_saved_messages);
        assert_eq!(config.inspector.timeout, None);
        assert_eq!(config.inspector.batch_concurrency, 4);
        assert_eq!(config.inspector.batch_delay, Duration::from_millis(250));
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = config_with(&[
            (ENV_API_ID, "not-a-number"),
            (ENV_API_HASH, "0123456789abcdef0123456789abcdef"),
            (ENV_EXPORT_FORMAT, "yaml"),
            (ENV_CREATE_BACKUPS, "maybe"),
            (ENV_BATCH_CONCURRENCY, "0"),
            (ENV_BATCH_DELAY_MS, "-1"),
        ]);

        assert!(config.api.is_none());
        assert_eq!(config.export_format, ExportFormat::Txt);
        assert!(config.create_backups);
        assert_eq!(config.inspector.batch_concurrency, 1);
        assert_eq!(config.inspector.batch_delay, Duration::from_millis(1000));
    }

    #[test]
    fn test_half_configured_api_is_ignored() {
        let config = config_with(&[(ENV_API_ID, "12345")]);
        assert!(config.api.is_none());
    }

    #[test]
    fn test_default_session_name() {
        let config = config_with(&[(ENV_SESSION_NAME_PREFIX, "bot")]);
        let at = Local.with_ymd_and_hms(2024, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(config.default_session_name(at), "bot_20240309_070501");
    }
}
