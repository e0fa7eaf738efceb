//! Core error types for pomozen-core.
//!
//! This module defines the error hierarchy using thiserror. Storage write
//! failures are deliberately absent from most signatures: the persistence
//! layer swallows them (see `storage::safe`), so state-machine operations
//! only surface timing-source and import failures.

use thiserror::Error;

/// Core error type for pomozen-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Storage-related errors
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Pulse worker errors
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// Backup import/validation errors
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic errors with context
    #[error("{0}")]
    Custom(String),
}

/// Storage-specific errors.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The backend ran out of room for the write.
    #[error("Storage quota exceeded")]
    QuotaExceeded,

    /// The durable store could not be opened at all.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// Any other backend failure.
    #[error("Storage backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DiskFull {
                    StorageError::QuotaExceeded
                } else {
                    StorageError::Backend(err.to_string())
                }
            }
            _ => StorageError::Backend(err.to_string()),
        }
    }
}

/// Pulse worker errors.
///
/// These mean the timing source is gone; the engine reverts to not-running
/// when it sees one.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// No tokio runtime to spawn the worker task on.
    #[error("No async runtime available for the pulse worker")]
    NoRuntime,

    /// The worker task died and could not be respawned.
    #[error("Pulse worker channel closed")]
    ChannelClosed,
}

/// Backup import errors.
///
/// Validation runs to completion before any store is touched, so an import
/// error always means zero mutation happened.
#[derive(Error, Debug)]
pub enum ImportError {
    /// The document is not valid JSON or not the expected shape.
    #[error("Malformed backup document: {0}")]
    Malformed(#[from] serde_json::Error),

    /// The document version is not one this build can restore.
    #[error("Unsupported backup version {0}")]
    UnsupportedVersion(u32),

    /// A field failed a range or shape check.
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
