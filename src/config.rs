//! Configuration module for feedwatch.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{FeedwatchError, Result};

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
}

fn default_db_path() -> String {
    "data/feedwatch.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file, appended to across restarts. Empty logs to stdout only.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/feedwatch.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Feed synchronization configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Whether the periodic sweep runs.
    #[serde(default = "default_sync_enabled")]
    pub enabled: bool,
    /// Interval between sweeps in seconds.
    #[serde(default = "default_sync_interval")]
    pub interval_secs: u64,
    /// A feed stops syncing once its consecutive failures exceed this value.
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: i32,
    /// Skip entries whose URL is already stored.
    #[serde(default = "default_prevent_duplication")]
    pub prevent_duplication: bool,
    /// Upper bound for one fetch, in seconds.
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Maximum feed document size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Allow fetching from loopback and private network addresses.
    #[serde(default)]
    pub allow_private_hosts: bool,
}

fn default_sync_enabled() -> bool {
    true
}

fn default_sync_interval() -> u64 {
    3600 // 1 hour
}

fn default_failure_threshold() -> i32 {
    3
}

fn default_prevent_duplication() -> bool {
    true
}

fn default_fetch_timeout() -> u64 {
    30
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_max_redirects() -> usize {
    5
}

impl SyncConfig {
    /// Sweep interval as a Duration.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Fetch timeout as a Duration.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: default_sync_enabled(),
            interval_secs: default_sync_interval(),
            failure_threshold: default_failure_threshold(),
            prevent_duplication: default_prevent_duplication(),
            fetch_timeout_secs: default_fetch_timeout(),
            connect_timeout_secs: default_connect_timeout(),
            max_feed_size_bytes: default_max_feed_size(),
            max_redirects: default_max_redirects(),
            allow_private_hosts: false,
        }
    }
}

/// Web API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct WebConfig {
    /// Host address to bind.
    #[serde(default = "default_web_host")]
    pub host: String,
    /// Port number for the Web API.
    #[serde(default = "default_web_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// JWT secret key.
    #[serde(default)]
    pub jwt_secret: String,
    /// Access token expiry in seconds.
    #[serde(default = "default_jwt_access_expiry")]
    pub jwt_access_token_expiry_secs: u64,
}

fn default_web_host() -> String {
    "0.0.0.0".to_string()
}

fn default_web_port() -> u16 {
    8080
}

fn default_jwt_access_expiry() -> u64 {
    86400 // 1 day
}

impl Default for WebConfig {
    fn default() -> Self {
        Self {
            host: default_web_host(),
            port: default_web_port(),
            cors_origins: vec![],
            jwt_secret: String::new(),
            jwt_access_token_expiry_secs: default_jwt_access_expiry(),
        }
    }
}

/// Users created at startup when missing.
#[derive(Debug, Clone, Deserialize)]
pub struct BootstrapConfig {
    /// Email addresses of the bootstrap users.
    #[serde(default = "default_bootstrap_users")]
    pub users: Vec<String>,
}

fn default_bootstrap_users() -> Vec<String> {
    vec![
        "user1@example.com".to_string(),
        "user2@example.com".to_string(),
    ]
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            users: default_bootstrap_users(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Feed sync configuration.
    #[serde(default)]
    pub sync: SyncConfig,
    /// Web API configuration.
    #[serde(default)]
    pub web: WebConfig,
    /// Bootstrap users.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(FeedwatchError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| FeedwatchError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides.
    ///
    /// Supported environment variables:
    /// - `FEEDWATCH_JWT_SECRET`: Override the JWT secret key
    pub fn apply_env_overrides(&mut self) {
        if let Ok(jwt_secret) = std::env::var("FEEDWATCH_JWT_SECRET") {
            if !jwt_secret.is_empty() {
                self.web.jwt_secret = jwt_secret;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.web.jwt_secret.is_empty() {
            return Err(FeedwatchError::Config(
                "jwt_secret is not set. \
                 Set it in config.toml or via FEEDWATCH_JWT_SECRET environment variable."
                    .to_string(),
            ));
        }
        if self.sync.interval_secs == 0 {
            return Err(FeedwatchError::Config(
                "sync.interval_secs must be greater than zero".to_string(),
            ));
        }
        if self.sync.failure_threshold < 1 {
            return Err(FeedwatchError::Config(
                "sync.failure_threshold must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
