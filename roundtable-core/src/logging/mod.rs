//! Logging subsystem for Roundtable
//!
//! Thin setup layer over the `tracing` crate. The `RUST_LOG`
//! environment variable, when set, takes precedence over the
//! configured level.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod error;
mod level;

pub use error::LoggingError;
pub use level::LogLevel;

/// Configuration for the logging subsystem
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// The minimum log level to display
    pub level: LogLevel,
    /// Whether to include timestamps
    pub with_timestamp: bool,
    /// Whether to include target module information
    pub with_target: bool,
    /// Whether to use JSON formatting
    pub json_format: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            with_timestamp: true,
            with_target: true,
            json_format: false,
        }
    }
}

impl LogConfig {
    pub fn new(level: LogLevel) -> Self {
        Self {
            level,
            ..Default::default()
        }
    }

    pub fn with_timestamp(mut self, enabled: bool) -> Self {
        self.with_timestamp = enabled;
        self
    }

    pub fn with_target(mut self, enabled: bool) -> Self {
        self.with_target = enabled;
        self
    }

    pub fn json_format(mut self, enabled: bool) -> Self {
        self.json_format = enabled;
        self
    }
}

/// Initialize logging with the default configuration
pub fn init_logging() -> Result<(), LoggingError> {
    init_logging_with_config(LogConfig::default())
}

/// Initialize logging with a custom configuration. Fails if a global
/// subscriber is already installed.
pub fn init_logging_with_config(config: LogConfig) -> Result<(), LoggingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if config.json_format {
        let layer = fmt::layer().with_target(config.with_target).json();
        if config.with_timestamp {
            registry.with(layer).try_init()
        } else {
            registry.with(layer.without_time()).try_init()
        }
    } else {
        let layer = fmt::layer().with_target(config.with_target);
        if config.with_timestamp {
            registry.with(layer).try_init()
        } else {
            registry.with(layer.without_time()).try_init()
        }
    };

    result.map_err(|e| LoggingError::InitializationFailed(e.to_string()))
}
