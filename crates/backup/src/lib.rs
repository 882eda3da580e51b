//! Change-aware backups of a directory tree to object storage.
//!
//! A run fingerprints the source tree ([`Fingerprinter`]), lists the archives
//! already stored under the target prefix (the ledger), and only when no
//! stored name carries the fingerprint does it pack the tree and upload it
//! under a name of the form `<prefix><timestamp>-<fingerprint><ext>`.
//!
//! The remote names are the whole history: there is no local index, so
//! sequential runs over unchanged content never upload twice.

pub mod error;
mod fingerprint;
pub mod ledger;
mod naming;
mod plan;
mod restore;
mod run;
mod upload;

pub use crate::fingerprint::{Blake3Fingerprinter, FINGERPRINT_LEN, Fingerprint, Fingerprinter};
pub use crate::naming::{ArchiveName, archive_name};
pub use crate::plan::{BackupPlan, Location, default_prefix};
pub use crate::restore::{Restored, Selector, select};
pub use crate::run::{Backup, Outcome, Stage};
pub use crate::upload::upload;
