//! Config Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// A configuration source could not be read or parsed.
    #[display("cannot load configuration")]
    Load,
    /// The configuration file has an extension we can't parse.
    #[display("unsupported configuration format: {}", _0.display())]
    UnsupportedFormat(#[error(not(source))] PathBuf),
    /// A required setting is missing.
    #[display("missing setting: {_0}")]
    Missing(#[error(not(source))] &'static str),
    /// A setting has an invalid value.
    #[display("invalid setting: {_0}")]
    Invalid(#[error(not(source))] String),
    /// The storage backend could not be set up from the settings given.
    #[display("cannot set up storage backend")]
    Backend,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
