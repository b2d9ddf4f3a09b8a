//! Error types for the script inventory.
//!
//! Local storage failures are fatal to the calling operation. Remote failures are
//! recoverable: the synchronizer turns them into typed status values instead of
//! propagating them.

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the on-disk state (mapping file, identifier file, script cache).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize mapping: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Failed to replace {path}: {reason}")]
    AtomicReplace { path: PathBuf, reason: String },
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Failures reaching or decoding the remote blob service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    #[error("remote unavailable: {0}")]
    Unavailable(String),

    #[error("remote content is corrupt: {0}")]
    Corrupt(String),

    #[error("remote rejected credentials: {0}")]
    Unauthorized(String),

    #[error("remote blob not found: {0}")]
    NotFound(String),

    #[error("no remote mirror is linked to this inventory")]
    NotLinked,

    #[error("remote storage is not configured (no token)")]
    NotConfigured,
}

impl RemoteError {
    /// Corrupt content is reported separately from transport trouble.
    pub fn is_corrupt(&self) -> bool {
        matches!(self, RemoteError::Corrupt(_))
    }
}

/// Top-level error returned by registry, synchronizer and command surfaces.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Script '{0}' not found")]
    ScriptNotFound(String),

    #[error("Script '{0}' already exists (use --force to replace it)")]
    ScriptExists(String),

    #[error("Provider error: {0}")]
    ProviderError(String),

    #[error("Script header error: {0}")]
    HeaderError(#[from] crate::header::HeaderError),

    #[error("Interrupted: {0}")]
    Interrupted(String),

    #[error("Command failed: {0}")]
    CommandFailed(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl ApiError {
    /// Process exit status for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ApiError::Interrupted(_) => 130,
            _ => 1,
        }
    }
}
