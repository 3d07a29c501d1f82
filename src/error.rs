//! Error types for the Metis learning memory
//!
//! This module provides structured error definitions using thiserror; ad-hoc
//! failures raised at the CLI edge are built with anyhow and fold into
//! [`MetisError::Other`] through the `From` impl below. Most learning paths
//! fail open and never construct these; see the store and event modules for
//! which failures degrade to defaults instead of propagating.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Metis operations
#[derive(Error, Debug)]
pub enum MetisError {
    /// Lock acquisition gave up after the configured timeout.
    ///
    /// This is the one failure that must surface loudly: proceeding without
    /// the lock risks corrupting the shared stores.
    #[error("Lock timeout: could not acquire {} within {waited_ms}ms (held by pid {owner:?})", path.display())]
    LockTimeout {
        path: PathBuf,
        waited_ms: u64,
        owner: Option<u32>,
    },

    /// A record id or derived path tried to leave the store root
    #[error("Path escapes store root: {0}")]
    PathEscape(String),

    /// Record failed schema validation
    #[error("Invalid record: {}", violations.join("; "))]
    InvalidRecord { violations: Vec<String> },

    /// Referenced delta does not exist in the playbook
    #[error("Delta not found: {0}")]
    DeltaNotFound(String),

    /// Invalid delta ID format
    #[error("Invalid delta ID: {0}")]
    InvalidDeltaId(#[from] uuid::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML serialization error (corpus records)
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

/// Result type alias for Metis operations
pub type Result<T> = std::result::Result<T, MetisError>;

impl From<anyhow::Error> for MetisError {
    fn from(err: anyhow::Error) -> Self {
        MetisError::Other(err.to_string())
    }
}

impl From<crate::config::ConfigError> for MetisError {
    fn from(err: crate::config::ConfigError) -> Self {
        MetisError::Config(err.to_string())
    }
}
