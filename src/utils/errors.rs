// src/utils/errors.rs
//! Error types shared across the redirector

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, RedirectorError>;

/// Reasons an endpoint is rejected before a session can activate
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("missing host for {role} endpoint")]
    MissingHost { role: &'static str },

    #[error("invalid port {value:?} for {role} endpoint (expected 1-65535)")]
    InvalidPort { role: &'static str, value: String },

    #[error("Hostname/IP \"{host}\" appears to be invalid")]
    UnresolvableHost { host: String },
}

/// Redirector errors
#[derive(Debug, Error)]
pub enum RedirectorError {
    #[error("invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to patch hostname resolution: {0}")]
    ConfigPatch(String),

    #[error("failed to restore hostname resolution: {0}")]
    ConfigRestore(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("interception failed: {0}")]
    InterceptionFailed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<config::ConfigError> for RedirectorError {
    fn from(err: config::ConfigError) -> Self {
        RedirectorError::ConfigError(err.to_string())
    }
}
