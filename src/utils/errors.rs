// src/utils/errors.rs
//! Error types for the engine
//!
//! Two families of errors exist:
//!
//! - **EngineError**: an operation failed as a whole (a chunk could not be
//!   written, a session does not exist, configuration is invalid).
//! - **LoadError**: a single persisted artifact could not be read. Batch
//!   readers turn these into logged skips instead of propagating them.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine-level errors
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Storage operation failed: {0}")]
    StorageFailed(String),

    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    #[error("Serialization failed: {0}")]
    SerializationFailed(String),

    #[error("Export failed: {0}")]
    ExportFailed(String),

    #[error("Configuration error: {0}")]
    ConfigFailed(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Background task failed: {0}")]
    TaskFailed(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        EngineError::SerializationFailed(err.to_string())
    }
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::ConfigFailed(err.to_string())
    }
}

impl From<LoadError> for EngineError {
    fn from(err: LoadError) -> Self {
        EngineError::StorageFailed(err.to_string())
    }
}

impl EngineError {
    /// Whether this error means the requested session or entity is absent
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            EngineError::SessionNotFound { .. } | EngineError::EntityNotFound(_)
        )
    }
}

/// Failure to read one persisted file
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} looks truncated ({size} bytes)", .path.display())]
    Truncated { path: PathBuf, size: u64 },

    #[error("failed to decompress {}: {reason}", .path.display())]
    Decompress { path: PathBuf, reason: String },

    #[error("failed to decode {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("{} has an unexpected shape: {reason}", .path.display())]
    UnexpectedShape { path: PathBuf, reason: String },
}

impl LoadError {
    /// Path of the file that failed to load
    pub fn path(&self) -> &Path {
        match self {
            LoadError::Io { path, .. }
            | LoadError::Truncated { path, .. }
            | LoadError::Decompress { path, .. }
            | LoadError::Decode { path, .. }
            | LoadError::UnexpectedShape { path, .. } => path,
        }
    }

    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn decode(path: &Path, err: impl std::fmt::Display) -> Self {
        LoadError::Decode {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    }
}
