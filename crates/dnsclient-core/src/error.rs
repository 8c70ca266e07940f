//! Error types for the DNS client sync daemon
//!
//! This module defines all error types used throughout the crate.

use thiserror::Error;

/// Result type alias for DNS client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for the DNS client sync daemon
#[derive(Error, Debug)]
pub enum Error {
    /// Resolver configuration file could not be read or written
    #[error("Resolver file error: {0}")]
    ResolverFile(String),

    /// Configuration store errors (snapshot unavailable, watch broken)
    #[error("Config store error: {0}")]
    ConfigStore(String),

    /// Daemon configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Administrative control channel errors
    #[error("Control channel error: {0}")]
    Control(String),

    /// Raw I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a resolver file error
    pub fn resolver_file(msg: impl Into<String>) -> Self {
        Self::ResolverFile(msg.into())
    }

    /// Create a config store error
    pub fn config_store(msg: impl Into<String>) -> Self {
        Self::ConfigStore(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a control channel error
    pub fn control(msg: impl Into<String>) -> Self {
        Self::Control(msg.into())
    }
}

/// Helper for converting anyhow::Error to our Error type
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Other(err.to_string())
    }
}
