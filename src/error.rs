//! Error types for sandbox and time-travel operations.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for snaplab operations.
#[derive(Error, Debug)]
pub enum Error {
    /// A dataset, snapshot, or sandbox identifier (or a request field)
    /// failed validation before any engine or filesystem access.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A dataset, snapshot, or file does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The restore destination already exists and overwrite was not set.
    #[error("destination already exists: {path} (set overwrite to replace)")]
    Conflict { path: PathBuf },

    /// A resolved path escaped its boundary root.
    #[error("path '{candidate}' escapes boundary {root}")]
    Containment { root: PathBuf, candidate: String },

    /// A ZFS primitive returned an error or timed out.
    #[error("zfs {command} failed: {reason}")]
    Primitive { command: String, reason: String },

    /// IO error during browse or restore.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for snaplab operations.
pub type Result<T> = std::result::Result<T, Error>;
