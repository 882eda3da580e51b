//! The backup ledger: archive names already present in remote storage.
//!
//! There is no local index. Every run lists the remote prefix afresh and the
//! names themselves are the record of what has been backed up.

use crate::error::{ErrorKind, Result};
use crate::fingerprint::Fingerprint;
use crate::plan::Location;
use cairn_storage::{ObjectInfo, StorageBackend};
use exn::ResultExt;
use tracing::instrument;

/// List every object under a location's key prefix, ascending by key.
///
/// Matching is a plain string prefix, so `backups/home-` also matches keys
/// that aren't archives. A prefix that doesn't exist yet lists as empty.
#[instrument(skip_all, fields(backend = backend.name(), prefix = %location.key_prefix(), found))]
pub async fn find_existing(backend: &dyn StorageBackend, location: &Location) -> Result<Vec<ObjectInfo>> {
    let mut objects = backend.list(&location.key_prefix()).await.or_raise(|| ErrorKind::Transfer)?;
    objects.sort_unstable_by(|a, b| a.key.cmp(&b.key));
    tracing::Span::current().record("found", objects.len());
    Ok(objects)
}

/// The first listed object whose name embeds `fingerprint`, if any.
///
/// A match anywhere in the name counts; the ledger never parses names.
pub fn find_fingerprint<'a>(objects: &'a [ObjectInfo], fingerprint: &Fingerprint) -> Option<&'a ObjectInfo> {
    objects.iter().find(|info| info.name().contains(fingerprint.as_str()))
}
