//! Error types for the logging subsystem

use std::fmt;

/// Errors that can occur while setting up logging
#[derive(Debug, Clone)]
pub enum LoggingError {
    /// The global subscriber could not be installed
    InitializationFailed(String),
}

impl fmt::Display for LoggingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoggingError::InitializationFailed(msg) => {
                write!(f, "Failed to initialize logging: {}", msg)
            }
        }
    }
}

impl std::error::Error for LoggingError {}
