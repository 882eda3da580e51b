//! Archive Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An archive error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for archive operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Failed to initialize an encoder/decoder for the requested format.
    Encoder,
    /// Archive is corrupt, truncated or not in the expected format. Don't
    /// retry with the same input.
    #[display("invalid or corrupted archive")]
    InvalidData,
    /// The requested format is not supported.
    #[display("unsupported format: {_0}")]
    UnsupportedFormat(#[error(not(source))] String),
    /// The requested format is supported but not enabled.
    #[display("disabled format: {_0}")]
    DisabledFormat(#[error(not(source))] String),
    /// The tree to archive is missing or not a directory.
    #[display("not a directory: {}", _0.display())]
    NotADirectory(#[error(not(source))] PathBuf),
    /// An I/O operation failed (permission denied, disk full, ...).
    #[display("I/O error")]
    Io,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::Io)
    }
}
