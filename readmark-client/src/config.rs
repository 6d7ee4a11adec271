//! Configuration loading for readmark.
//!
//! Configuration is loaded from a TOML file (default: `readmark.toml`).
//! Every section and field is optional.

use readmark_core::Backoff;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Homeserver connection.
    pub homeserver: HomeserverConfig,
    /// Local store.
    pub storage: StorageConfig,
    /// Remote notification retry policy.
    pub notify: NotifyConfig,
}

/// Homeserver connection configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HomeserverConfig {
    /// Base URL of the homeserver (default: http://localhost:8008).
    pub base_url: String,
    /// Access token sent as a bearer token.
    pub access_token: String,
    /// The acting user; read receipts are written for this user.
    pub user_id: String,
    /// Per-request timeout in seconds (default: 30).
    pub request_timeout_secs: u64,
}

/// Local store configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to SQLite database file.
    pub database: PathBuf,
}

/// Retry policy for the read-markers request.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotifyConfig {
    /// Total attempts including the first (default: 3).
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds (default: 500).
    pub initial_backoff_ms: u64,
    /// Cap on the exponential delay in milliseconds (default: 30000).
    pub max_backoff_ms: u64,
}

impl NotifyConfig {
    /// The backoff schedule described by this config.
    pub fn backoff(&self) -> Backoff {
        Backoff::new(
            Duration::from_millis(self.initial_backoff_ms),
            Duration::from_millis(self.max_backoff_ms),
        )
    }
}

impl Default for HomeserverConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8008".to_string(),
            access_token: String::new(),
            user_id: "@readmark:localhost".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database: PathBuf::from("readmark.db"),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 500,
            max_backoff_ms: 30_000,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.homeserver.base_url, "http://localhost:8008");
        assert_eq!(config.storage.database, PathBuf::from("readmark.db"));
        assert_eq!(config.notify.max_attempts, 3);
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[homeserver]
base_url = "https://matrix.example.org"
access_token = "syt_secret"
user_id = "@alice:example.org"

[storage]
database = "/data/readmark.db"

[notify]
max_attempts = 5
initial_backoff_ms = 250
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.homeserver.base_url, "https://matrix.example.org");
        assert_eq!(config.homeserver.user_id, "@alice:example.org");
        assert_eq!(config.storage.database, PathBuf::from("/data/readmark.db"));
        assert_eq!(config.notify.max_attempts, 5);
        assert_eq!(config.notify.initial_backoff_ms, 250);
        assert_eq!(config.notify.max_backoff_ms, 30_000);
    }

    #[test]
    fn missing_sections_use_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.homeserver.request_timeout_secs, 30);
        assert_eq!(config.notify.initial_backoff_ms, 500);
    }

    #[test]
    fn backoff_follows_notify_config() {
        let notify = NotifyConfig {
            max_attempts: 2,
            initial_backoff_ms: 100,
            max_backoff_ms: 1000,
        };
        let backoff = notify.backoff();
        assert_eq!(backoff.initial, Duration::from_millis(100));
        assert_eq!(backoff.max, Duration::from_secs(1));
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[storage]\ndatabase = \"markers.db\"").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.storage.database, PathBuf::from("markers.db"));
    }

    #[test]
    fn from_file_reports_missing_file() {
        let result = Config::from_file(std::path::Path::new("/nonexistent/readmark.toml"));
        assert!(matches!(result, Err(ConfigError::ReadError { .. })));
    }

    #[test]
    fn from_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[notify]\nmax_attempts = \"many\"").unwrap();

        let result = Config::from_file(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError { .. })));
    }
}
