//! Storage models.

use time::OffsetDateTime;

/// Object metadata returned by storage backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    /// Key relative to the bucket root
    pub key: String,
    /// Object size in bytes
    pub size: u64,
    /// Last modified timestamp
    pub modified: OffsetDateTime,
}
impl ObjectInfo {
    pub fn new(key: impl Into<String>, size: u64, modified: impl Into<OffsetDateTime>) -> Self {
        Self {
            key: key.into(),
            size,
            modified: modified.into(),
        }
    }

    /// The final `/`-separated component of the key.
    pub fn name(&self) -> &str {
        self.key.rsplit('/').next().unwrap_or(&self.key)
    }
}
