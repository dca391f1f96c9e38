//! Configuration loading for signal-relay.
//!
//! Configuration is loaded from a TOML file (default: `relay.toml`). Every
//! field has a default, so an empty file yields a working relay.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Root configuration for signal-relay.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Connection and message limits.
    #[serde(default)]
    pub limits: LimitsConfig,
    /// Token passthrough configuration.
    #[serde(default)]
    pub token: TokenConfig,
    /// HTTP endpoints configuration.
    #[serde(default)]
    pub http: HttpConfig,
    /// Cleanup task configuration.
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Bind address for HTTP and WebSocket (default: 0.0.0.0:8080).
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    /// Maximum WebSocket frame/message size in bytes (default: 8MB).
    ///
    /// Captured images travel as data URLs inside `payload`.
    #[serde(default = "default_max_frame_size")]
    pub max_frame_size: usize,
    /// Interval between server pings (default: 30).
    #[serde(default = "default_ping_interval_secs")]
    pub ping_interval_secs: u64,
    /// Close the connection if no pong arrives within this many seconds (default: 10).
    #[serde(default = "default_pong_timeout_secs")]
    pub pong_timeout_secs: u64,
    /// Log output format (default: pretty).
    #[serde(default)]
    pub log_format: LogFormat,
}

/// Connection and message limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Maximum concurrent WebSocket connections (default: 1000).
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Maximum frames per connection per minute (default: 600).
    #[serde(default = "default_messages_per_minute")]
    pub messages_per_minute: u32,
    /// Maximum participant name length in chars (default: 128).
    #[serde(default = "default_max_name_len")]
    pub max_name_len: usize,
}

/// Token passthrough configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenConfig {
    /// URL of the external identity service. `/token` fails with 500 when unset.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Upstream request timeout in seconds (default: 10).
    #[serde(default = "default_token_timeout_secs")]
    pub timeout_secs: u64,
}

/// HTTP endpoints configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Enable metrics endpoint (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

/// Cleanup task configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Cleanup interval in seconds (default: 300).
    #[serde(default = "default_cleanup_interval")]
    pub interval_secs: u64,
    /// Enable cleanup task (default: true).
    #[serde(default = "default_cleanup_enabled")]
    pub enabled: bool,
}

// Default value functions
fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_max_frame_size() -> usize {
    8 * 1024 * 1024 // 8MB
}

fn default_ping_interval_secs() -> u64 {
    30
}

fn default_pong_timeout_secs() -> u64 {
    10
}

fn default_max_connections() -> usize {
    1000
}

fn default_messages_per_minute() -> u32 {
    600
}

fn default_max_name_len() -> usize {
    128
}

fn default_token_timeout_secs() -> u64 {
    10
}

fn default_metrics_enabled() -> bool {
    true
}

fn default_cleanup_interval() -> u64 {
    300 // 5 minutes
}

fn default_cleanup_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            max_frame_size: default_max_frame_size(),
            ping_interval_secs: default_ping_interval_secs(),
            pong_timeout_secs: default_pong_timeout_secs(),
            log_format: LogFormat::default(),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            messages_per_minute: default_messages_per_minute(),
            max_name_len: default_max_name_len(),
        }
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_secs: default_token_timeout_secs(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_cleanup_interval(),
            enabled: default_cleanup_enabled(),
        }
    }
}

impl ServerConfig {
    /// Ping interval as a Duration.
    pub fn ping_interval(&self) -> Duration {
        Duration::from_secs(self.ping_interval_secs)
    }

    /// Pong timeout as a Duration.
    pub fn pong_timeout(&self) -> Duration {
        Duration::from_secs(self.pong_timeout_secs)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if a value
    /// is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Reject values the relay cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let checks = [
            ("limits.messages_per_minute", self.limits.messages_per_minute == 0),
            ("limits.max_connections", self.limits.max_connections == 0),
            ("limits.max_name_len", self.limits.max_name_len == 0),
            ("server.max_frame_size", self.server.max_frame_size == 0),
            ("server.ping_interval_secs", self.server.ping_interval_secs == 0),
            ("server.pong_timeout_secs", self.server.pong_timeout_secs == 0),
            ("cleanup.interval_secs", self.cleanup.interval_secs == 0),
        ];
        match checks.iter().find(|(_, zero)| *zero) {
            Some((field, _)) => Err(ConfigError::Invalid {
                field: field.to_string(),
                reason: "must be greater than zero".to_string(),
            }),
            None => Ok(()),
        }
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
    /// A value is out of range.
    #[error("invalid config value {field}: {reason}")]
    Invalid {
        /// Dotted key of the offending field.
        field: String,
        /// What is wrong with it.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.server.max_frame_size, 8 * 1024 * 1024);
        assert_eq!(config.server.log_format, LogFormat::Pretty);
        assert_eq!(config.limits.max_connections, 1000);
        assert_eq!(config.limits.messages_per_minute, 600);
        assert!(config.token.endpoint.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[server]
bind_address = "127.0.0.1:9000"
max_frame_size = 1048576
log_format = "json"

[limits]
max_connections = 50
max_name_len = 32

[token]
endpoint = "http://identity.internal/token"
timeout_secs = 3

[http]
metrics_enabled = false

[cleanup]
interval_secs = 60
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:9000");
        assert_eq!(config.server.max_frame_size, 1048576);
        assert_eq!(config.server.log_format, LogFormat::Json);
        assert_eq!(config.limits.max_connections, 50);
        assert_eq!(config.limits.max_name_len, 32);
        assert_eq!(
            config.token.endpoint.as_deref(),
            Some("http://identity.internal/token")
        );
        assert_eq!(config.token.timeout_secs, 3);
        assert!(!config.http.metrics_enabled);
        assert_eq!(config.cleanup.interval_secs, 60);
    }

    #[test]
    fn empty_file_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.ping_interval_secs, 30);
        assert_eq!(config.server.pong_timeout_secs, 10);
        assert_eq!(config.limits.max_name_len, 128);
        assert!(config.cleanup.enabled);
    }

    #[test]
    fn missing_fields_in_section_use_defaults() {
        let toml = r#"
[server]
ping_interval_secs = 5
[limits]
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.ping_interval_secs, 5);
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.limits.messages_per_minute, 600);
    }

    #[test]
    fn zero_rate_is_rejected() {
        let mut config = Config::default();
        config.limits.messages_per_minute = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("limits.messages_per_minute"));
    }

    #[test]
    fn from_file_reads_and_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[limits]\nmax_connections = 0").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn from_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[server\nbind_address = ").unwrap();

        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(&dir.path().join("relay.toml")).unwrap();
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
    }
}
