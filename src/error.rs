//! Error types for the store.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Hard failures surfaced by store operations.
///
/// Soft conditions never appear here: a lookup miss is `None`, a contended
/// lock is [`crate::LockOutcome::Held`], and corrupt metadata is read as an
/// empty variant list.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O failure during a store operation.
    #[error("{operation} failed for {}: {source}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
        operation: &'static str,
    },

    /// Read-back verification found the temp file differing from what was
    /// written.
    #[error("write verification failed for {}", path.display())]
    VerifyFailed { path: PathBuf },

    /// Metadata could not be serialized.
    #[error("metadata serialization failed: {source}")]
    Serialization {
        #[source]
        source: serde_json::Error,
    },

    /// Invalid store configuration.
    #[error("store configuration error: {message}")]
    Configuration { message: String },

    /// A string or path does not name a well-formed cache key.
    #[error("invalid cache key: {value}")]
    InvalidKey { value: String },
}

impl StoreError {
    pub(crate) fn io(
        source: std::io::Error,
        path: impl AsRef<Path>,
        operation: &'static str,
    ) -> Self {
        Self::Io {
            source,
            path: path.as_ref().to_path_buf(),
            operation,
        }
    }

    pub(crate) fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn invalid_key(value: impl Into<String>) -> Self {
        Self::InvalidKey {
            value: value.into(),
        }
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
