//! Error types for stashkv
//!
//! Provides a unified error type for all fallible engine operations.
//! Absence of a key is never an error: lookups return `None` instead.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using StoreError
pub type Result<T> = std::result::Result<T, StoreError>;

/// Unified error type for stashkv operations
#[derive(Debug, Error)]
pub enum StoreError {
    // -------------------------------------------------------------------------
    // Counter Errors
    // -------------------------------------------------------------------------
    #[error("value at key '{key}' is {found}, not an integer")]
    TypeMismatch { key: String, found: &'static str },

    #[error("increment of key '{key}' would overflow")]
    Overflow { key: String },

    // -------------------------------------------------------------------------
    // Persistence Errors
    // -------------------------------------------------------------------------
    #[error("snapshot I/O failed at {}: {source}", path.display())]
    Persistence {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot not found: {}", .0.display())]
    SnapshotNotFound(PathBuf),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),
}

impl StoreError {
    /// Attach a path to an I/O error
    pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Persistence {
            path: path.into(),
            source,
        }
    }
}
