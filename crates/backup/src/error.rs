//! Backup Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction. Every kind is fatal to the run and
//! maps onto a distinct process exit status.

use derive_more::{Display, Error};

/// A backup error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for backup operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// Fix the configuration or arguments and run again.
    #[display("configuration error: {_0}")]
    Config(#[error(not(source))] String),
    /// Local filesystem problem (unreadable source tree, full disk, ...).
    #[display("I/O error")]
    Io,
    /// Packing or unpacking the archive failed.
    #[display("archive error")]
    Archive,
    /// The object store could not be reached, refused the request, or the
    /// transfer did not complete.
    #[display("transfer error")]
    Transfer,
    /// A broken invariant; nothing the user can fix.
    #[display("internal error: {_0}")]
    Internal(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Io | Self::Transfer)
    }

    /// Process exit status for this kind of failure (`sysexits.h` values).
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 78,
            Self::Io => 74,
            Self::Archive => 73,
            Self::Transfer => 69,
            Self::Internal(_) => 70,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::Config("no bucket".to_string()).to_string(), "configuration error: no bucket");
        assert_eq!(ErrorKind::Transfer.to_string(), "transfer error");
    }

    #[rstest]
    #[case(ErrorKind::Config(String::new()), 78)]
    #[case(ErrorKind::Io, 74)]
    #[case(ErrorKind::Archive, 73)]
    #[case(ErrorKind::Transfer, 69)]
    #[case(ErrorKind::Internal(String::new()), 70)]
    fn error_kind_exit_code(#[case] kind: ErrorKind, #[case] expected: u8) {
        assert_eq!(kind.exit_code(), expected);
    }

    #[test]
    fn error_kind_retryable() {
        assert!(ErrorKind::Transfer.is_retryable());
        assert!(!ErrorKind::Config(String::new()).is_retryable());
        assert!(!ErrorKind::Internal(String::new()).is_retryable());
    }
}
