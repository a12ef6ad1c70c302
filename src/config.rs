//! Client configuration.
//!
//! Compile-time defaults live as constants; a user file at
//! `$XDG_CONFIG_HOME/parentshield/config.toml` may override them. Every field has a
//! serde default so a partial or missing file is fine.

use crate::error::ClientError;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Application directory name under the XDG roots
pub const APP_DIR_NAME: &str = "parentshield";

/// Web platform API (alerts, installation registration)
pub const DEFAULT_API_URL: &str = "http://localhost:8000";

/// HTTP timeout for platform calls
pub const HTTP_TIMEOUT_SECS: u64 = 30;

/// Enforcement check period while protection is active
pub const ENFORCEMENT_INTERVAL_SECS: u64 = 5;

/// Installation heartbeat period
pub const HEARTBEAT_INTERVAL_SECS: u64 = 5 * 60;

/// Local activity log capacity
pub const ACTIVITY_CAPACITY: usize = 100;

/// Size of the recently-blocked process list
pub const RECENTLY_BLOCKED_CAPACITY: usize = 20;

/// Minimum length for any local credential
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// API endpoints, relative to the configured base URL
pub mod endpoints {
    fn join(base: &str, path: &str) -> String {
        format!("{}{}", base.trim_end_matches('/'), path)
    }

    pub fn alerts(base: &str) -> String {
        join(base, "/parental-controls/alerts")
    }

    pub fn alert_read(base: &str, alert_id: &str) -> String {
        join(
            base,
            &format!("/parental-controls/alerts/{}/read", urlencoding::encode(alert_id)),
        )
    }

    pub fn alerts_read_all(base: &str) -> String {
        join(base, "/parental-controls/alerts/read-all")
    }

    pub fn login(base: &str) -> String {
        join(base, "/auth/login")
    }

    pub fn refresh(base: &str) -> String {
        join(base, "/auth/refresh")
    }

    pub fn installation_register(base: &str) -> String {
        join(base, "/device/installation/register")
    }

    pub fn installation_heartbeat(base: &str) -> String {
        join(base, "/device/installation/heartbeat")
    }
}

/// Get current platform string
pub fn get_platform() -> &'static str {
    #[cfg(target_os = "windows")]
    return "windows";

    #[cfg(target_os = "macos")]
    return "macos";

    #[cfg(target_os = "linux")]
    return "linux";

    #[cfg(not(any(target_os = "windows", target_os = "macos", target_os = "linux")))]
    return "unknown";
}

/// Get the current app version from Cargo.toml
pub fn get_app_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME/parentshield or the platform config dir
pub fn config_dir() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(dirs::config_dir)
        .unwrap_or_else(|| home_dir().join(".config"))
        .join(APP_DIR_NAME)
}

/// Returns XDG_DATA_HOME/parentshield or the platform data dir
pub fn data_dir() -> PathBuf {
    std::env::var_os("XDG_DATA_HOME")
        .map(PathBuf::from)
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| home_dir().join(".local/share"))
        .join(APP_DIR_NAME)
}

/// Returns XDG_STATE_HOME/parentshield (log files)
pub fn state_dir() -> PathBuf {
    std::env::var_os("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(dirs::state_dir)
        .unwrap_or_else(|| home_dir().join(".local/state"))
        .join(APP_DIR_NAME)
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default, Clone)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiConfig,

    #[serde(default)]
    pub enforcement: EnforcementConfig,

    #[serde(default)]
    pub platform: PlatformConfig,

    #[serde(default)]
    pub activity: ActivityConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default = "default_api_url")]
    pub base_url: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_api_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct EnforcementConfig {
    /// Seconds between enforcement checks
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

impl Default for EnforcementConfig {
    fn default() -> Self {
        Self {
            check_interval_secs: default_check_interval(),
        }
    }
}

impl EnforcementConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlatformConfig {
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Optional download token forwarded on installation registration
    #[serde(default)]
    pub download_token: Option<String>,
}

impl Default for PlatformConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
            download_token: None,
        }
    }
}

impl PlatformConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ActivityConfig {
    #[serde(default = "default_activity_capacity")]
    pub capacity: usize,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self {
            capacity: default_activity_capacity(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    HTTP_TIMEOUT_SECS
}

fn default_check_interval() -> u64 {
    ENFORCEMENT_INTERVAL_SECS
}

fn default_heartbeat_interval() -> u64 {
    HEARTBEAT_INTERVAL_SECS
}

fn default_activity_capacity() -> usize {
    ACTIVITY_CAPACITY
}

fn default_log_level() -> String {
    "info".to_string()
}

impl AppConfig {
    /// Path of the user config file
    pub fn config_path() -> PathBuf {
        config_dir().join("config.toml")
    }

    /// Load from the default location, falling back to defaults when absent
    pub fn load() -> Result<Self, ClientError> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self, ClientError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = std::fs::read_to_string(path).map_err(|e| {
            ClientError::Validation(format!("Failed to read {}: {}", path.display(), e))
        })?;

        Self::parse(&contents)
    }

    pub fn parse(contents: &str) -> Result<Self, ClientError> {
        toml::from_str(contents)
            .map_err(|e| ClientError::Validation(format!("Invalid configuration: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.api.base_url, DEFAULT_API_URL);
        assert_eq!(config.enforcement.check_interval(), Duration::from_secs(5));
        assert_eq!(config.platform.heartbeat_interval(), Duration::from_secs(300));
        assert_eq!(config.activity.capacity, 100);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_partial_file() {
        let config = AppConfig::parse(
            r#"
            [api]
            base_url = "https://parentshield.app/api/v1"

            [enforcement]
            check_interval_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.api.base_url, "https://parentshield.app/api/v1");
        assert_eq!(config.api.timeout_secs, HTTP_TIMEOUT_SECS);
        assert_eq!(config.enforcement.check_interval_secs, 10);
        assert_eq!(config.activity.capacity, ACTIVITY_CAPACITY);
    }

    #[test]
    fn test_invalid_file_is_validation_error() {
        let err = AppConfig::parse("[api\nbase_url = 1").unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config.enforcement.check_interval_secs, ENFORCEMENT_INTERVAL_SECS);
    }

    #[test]
    fn test_endpoints_join_and_encode() {
        assert_eq!(
            endpoints::alerts("http://localhost:8000/"),
            "http://localhost:8000/parental-controls/alerts"
        );
        assert_eq!(
            endpoints::alert_read("http://h", "a b/c"),
            "http://h/parental-controls/alerts/a%20b%2Fc/read"
        );
    }
}
