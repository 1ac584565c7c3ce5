//! Configuration management for Roundtable
//!
//! Environment-based configuration with defaults, optional TOML file
//! loading and validation. Environment variables override defaults;
//! an explicit config file replaces them wholesale.

use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP server configuration
    pub server: ServerConfig,

    /// Store configuration
    pub store: StoreConfig,

    /// Message timeline configuration
    pub timeline: TimelineConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server bind address
    pub bind_address: SocketAddr,

    /// Graceful shutdown timeout
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
}

/// Store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path (":memory:" for an in-memory store)
    pub db_path: PathBuf,

    /// Maximum connections in the pool
    pub max_pool_size: u32,

    /// Enable WAL journaling
    pub enable_wal: bool,
}

/// Message timeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineConfig {
    /// Maximum tolerated distance between a client's sentAt and
    /// server time
    #[serde(with = "humantime_serde")]
    pub max_skew: Duration,

    /// Page size for message listing (also the hard cap)
    pub page_limit: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include timestamps
    pub with_timestamp: bool,

    /// Include target module
    pub with_target: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            store: StoreConfig::default(),
            timeline: TimelineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".parse().unwrap(),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("./data/roundtable.db"),
            max_pool_size: 8,
            enable_wal: true,
        }
    }
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            max_skew: Duration::from_secs(5 * 60),
            page_limit: 100,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_timestamp: true,
            with_target: true,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: ROUNDTABLE_<SECTION>_<KEY>
    /// Example: ROUNDTABLE_SERVER_BIND_ADDRESS=0.0.0.0:8080
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // Server config
        if let Ok(addr) = env::var("ROUNDTABLE_SERVER_BIND_ADDRESS") {
            config.server.bind_address = addr
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid bind address: {}", e)))?;
        }

        // Store config
        if let Ok(db_path) = env::var("ROUNDTABLE_STORE_DB_PATH") {
            config.store.db_path = PathBuf::from(db_path);
        }
        if let Ok(pool_size) = env::var("ROUNDTABLE_STORE_MAX_POOL_SIZE") {
            config.store.max_pool_size = pool_size
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid pool size: {}", e)))?;
        }
        if let Ok(enable_wal) = env::var("ROUNDTABLE_STORE_ENABLE_WAL") {
            config.store.enable_wal = enable_wal
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid WAL flag: {}", e)))?;
        }

        // Timeline config
        if let Ok(page_limit) = env::var("ROUNDTABLE_TIMELINE_PAGE_LIMIT") {
            config.timeline.page_limit = page_limit
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid page limit: {}", e)))?;
        }

        // Logging config
        if let Ok(level) = env::var("ROUNDTABLE_LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(json) = env::var("ROUNDTABLE_LOG_JSON") {
            config.logging.json_format = json
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid JSON flag: {}", e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError(e.to_string()))?;

        let config: Self =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.store.max_pool_size == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_pool_size must be greater than 0".to_string(),
            ));
        }

        if self.timeline.page_limit == 0 {
            return Err(ConfigError::ValidationFailed(
                "page_limit must be greater than 0".to_string(),
            ));
        }
        if self.timeline.page_limit > 100 {
            return Err(ConfigError::ValidationFailed(
                "page_limit must not exceed 100".to_string(),
            ));
        }
        if self.timeline.max_skew.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "max_skew must be greater than zero".to_string(),
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file(&self, path: impl AsRef<std::path::Path>) -> Result<(), ConfigError> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))?;

        std::fs::write(path, contents).map_err(|e| ConfigError::FileWriteError(e.to_string()))?;

        Ok(())
    }
}
