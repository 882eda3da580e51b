//! Capture Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. None of these come from the wrapped
//! command itself: its exit status is passed through, never turned into an
//! error.

use derive_more::{Display, Error};

/// A capture error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for capture operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Invalid arguments; the command was not started.
    #[display("invalid usage: {_0}")]
    Usage(#[error(not(source))] String),
    /// Rotating, creating or writing the log files failed.
    #[display("log file I/O error")]
    Io,
    /// The command could not be found.
    #[display("command not found: {_0}")]
    NotFound(#[error(not(source))] String),
    /// The command exists but could not be executed (permissions, bad binary).
    #[display("cannot execute: {_0}")]
    CannotExecute(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io)
    }

    /// Process exit status, following the shell conventions for commands
    /// that never ran.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Usage(_) | Self::Io => 125,
            Self::CannotExecute(_) => 126,
            Self::NotFound(_) => 127,
        }
    }
}
