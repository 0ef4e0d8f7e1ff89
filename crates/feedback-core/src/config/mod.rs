//! Configuration loading and validation.
//!
//! JSON5 format, camelCase keys.
//! Config location: `~/.feedback/feedback.json`

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::service::DEFAULT_RECENT_LIMIT;

/// Environment variable overriding the store location.
pub const ENV_STORE_PATH: &str = "FEEDBACK_STORE_PATH";
/// Environment variable overriding the listen port.
pub const ENV_PORT: &str = "FEEDBACK_PORT";
/// Environment variable overriding the bind address.
pub const ENV_BIND: &str = "FEEDBACK_BIND";
/// Environment variable overriding the state directory.
pub const ENV_STATE_DIR: &str = "FEEDBACK_STATE_DIR";

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// IO error reading config file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON5 parsing error.
    #[error("Parse error: {0}")]
    Parse(#[from] json5::Error),

    /// Config validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing required field.
    #[error("Missing required field: {0}")]
    MissingField(String),
}

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Feedback store configuration.
    #[serde(default)]
    pub store: StoreConfig,

    /// Per-client rate limits.
    #[serde(default)]
    pub limits: LimitsConfig,

    /// Maximum number of records returned by `GET /feedback`, at most 20.
    #[serde(default = "default_recent_limit")]
    pub recent_limit: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            limits: LimitsConfig::default(),
            recent_limit: default_recent_limit(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    ///
    /// # Errors
    ///
    /// Returns error if config cannot be loaded or parsed.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific path.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json5(&content)
    }

    /// Parse configuration from a JSON5 string.
    ///
    /// # Errors
    ///
    /// Returns error if the content cannot be parsed or is invalid.
    pub fn from_json5(content: &str) -> Result<Self, ConfigError> {
        let config: Self = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path.
    #[must_use]
    pub fn default_path() -> PathBuf {
        Self::state_dir().join("feedback.json")
    }

    /// Get the state directory.
    ///
    /// Uses `FEEDBACK_STATE_DIR` env var if set, otherwise `~/.feedback`.
    #[must_use]
    pub fn state_dir() -> PathBuf {
        if let Ok(dir) = std::env::var(ENV_STATE_DIR) {
            PathBuf::from(dir)
        } else if let Some(home) = dirs::home_dir() {
            home.join(".feedback")
        } else {
            PathBuf::from(".feedback")
        }
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns error if an override has an invalid value.
    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns error if an override has an invalid value.
    pub fn with_overrides_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_STORE_PATH).filter(|p| !p.trim().is_empty()) {
            self.store.path = Some(PathBuf::from(path));
        }

        if let Some(port) = lookup(ENV_PORT) {
            self.server.port = port.trim().parse().map_err(|e| {
                ConfigError::Validation(format!("{ENV_PORT} is not a valid port ({port}): {e}"))
            })?;
        }

        if let Some(bind) = lookup(ENV_BIND).filter(|b| !b.trim().is_empty()) {
            self.server.bind_address = bind;
        }

        self.validate()?;
        Ok(self)
    }

    /// Get the configured store location.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingField` if no store path is configured.
    pub fn require_store_path(&self) -> Result<&Path, ConfigError> {
        self.store
            .path
            .as_deref()
            .ok_or_else(|| ConfigError::MissingField("store.path".to_string()))
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Validation` describing the first invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation(
                "Server port cannot be 0".to_string(),
            ));
        }

        if self.recent_limit == 0 || self.recent_limit > DEFAULT_RECENT_LIMIT {
            return Err(ConfigError::Validation(format!(
                "recentLimit must be between 1 and {DEFAULT_RECENT_LIMIT}"
            )));
        }

        for (name, limit) in [("write", &self.limits.write), ("read", &self.limits.read)] {
            if limit.max_requests == 0 {
                return Err(ConfigError::Validation(format!(
                    "limits.{name}.maxRequests must be at least 1"
                )));
            }
            if limit.window_secs == 0 {
                return Err(ConfigError::Validation(format!(
                    "limits.{name}.windowSecs must be at least 1"
                )));
            }
        }

        Ok(())
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bind address.
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Allow cross-origin requests from any origin.
    #[serde(default = "default_true")]
    pub cors: bool,

    /// Use the first `X-Forwarded-For` address as the client key.
    ///
    /// Only enable behind a proxy that sets this header.
    #[serde(default)]
    pub trust_forwarded_for: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind_address: default_bind_address(),
            cors: true,
            trust_forwarded_for: false,
        }
    }
}

/// Feedback store configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreConfig {
    /// Directory of the sled database. Required to serve.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Rate limits for the write and read paths.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LimitsConfig {
    /// Budget for `POST /feedback`.
    #[serde(default = "RateLimitConfig::default_write")]
    pub write: RateLimitConfig,

    /// Budget for `GET /feedback`.
    #[serde(default = "RateLimitConfig::default_read")]
    pub read: RateLimitConfig,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            write: RateLimitConfig::default_write(),
            read: RateLimitConfig::default_read(),
        }
    }
}

/// One fixed-window budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitConfig {
    /// Requests admitted per window.
    pub max_requests: u32,

    /// Window length in seconds.
    pub window_secs: u64,

    /// Message returned to throttled clients.
    pub message: String,
}

impl RateLimitConfig {
    /// 5 requests per 15 minutes.
    #[must_use]
    pub fn default_write() -> Self {
        Self {
            max_requests: 5,
            window_secs: 15 * 60,
            message: "Terlalu banyak permintaan POST dari IP ini, coba lagi nanti.".to_string(),
        }
    }

    /// 10 requests per 5 minutes.
    #[must_use]
    pub fn default_read() -> Self {
        Self {
            max_requests: 10,
            window_secs: 5 * 60,
            message: "Terlalu banyak permintaan GET dari IP ini, coba lagi nanti.".to_string(),
        }
    }

    /// Window length as a `Duration`.
    #[must_use]
    pub const fn window(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }
}

const fn default_port() -> u16 {
    3000
}

fn default_bind_address() -> String {
    "127.0.0.1".to_string()
}

const fn default_true() -> bool {
    true
}

const fn default_recent_limit() -> usize {
    DEFAULT_RECENT_LIMIT
}
