//! Run a command with its output captured into rotating log files.
//!
//! [`Capture`] wraps any command (typically `cairn backup` from a scheduler)
//! and appends its output to a primary log, optionally splitting stderr into
//! a separate error log. Logs are rotated to `<path>.old` before a run once
//! their combined size reaches a threshold (10 MiB by default), so at most
//! two generations are ever kept on disk.
//!
//! The wrapped command's exit status is always passed through.

pub mod error;
mod rotate;
mod runner;

pub use crate::rotate::{DEFAULT_THRESHOLD, old_path, rotate_if_needed};
pub use crate::runner::Capture;
