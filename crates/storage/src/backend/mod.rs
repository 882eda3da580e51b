//! Storage backend trait and implementations.
//!
//! This module defines the `StorageBackend` trait, which provides a unified
//! interface for object storage operations across different backends (a local
//! directory used as a bucket, S3-compatible services, etc.).

mod dry;
mod local;
#[cfg(feature = "mock")]
mod mock;
#[cfg(feature = "s3")]
mod s3;

pub use self::dry::DryRunBackend;
pub use self::local::LocalBackend;
#[cfg(feature = "mock")]
pub use self::mock::MockBackend;
#[cfg(feature = "s3")]
pub use self::s3::S3Backend;
use crate::ObjectInfo;
use crate::error::Result;
use async_trait::async_trait;
use futures::{Stream, TryStreamExt};
use std::path::Path;
use std::pin::Pin;

pub(crate) type ObjectInfoStream<'a> = Pin<Box<dyn Stream<Item = Result<ObjectInfo>> + Send + 'a>>;

/// Unified interface for object storage backends.
///
/// Objects are whole files addressed by `/`-separated string keys, relative
/// to the bucket (or root directory) the backend was configured with. Every
/// key is validated with [`validate_key`](crate::validate_key) before use.
///
/// # Examples
///
/// ```
/// use cairn_storage::{backend::StorageBackend, error::Result};
///
/// async fn newest_archive(backend: &dyn StorageBackend) -> Result<Option<String>> {
///     let mut objects = backend.list("backups/home-").await?;
///     objects.sort_by(|a, b| a.key.cmp(&b.key));
///     Ok(objects.pop().map(|info| info.key))
/// }
/// ```
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Name of the configured backend (used for logging only).
    fn name(&self) -> &str;

    /// List all objects whose key starts with `prefix`.
    ///
    /// Default implementation of this method is to collect all the results
    /// from [`list_stream()`](Self::list_stream) into a [`Vec`] before
    /// returning.
    async fn list(&self, prefix: &str) -> Result<Vec<ObjectInfo>> {
        self.list_stream(prefix).try_collect().await
    }

    /// Stream object metadata for keys starting with `prefix`.
    ///
    /// Matching is a plain string comparison: `backups/home-` matches
    /// `backups/home-2024.tar.gz` but not `backups/homework.tar.gz`. An empty
    /// prefix lists the whole bucket.
    ///
    /// A prefix that doesn't exist yet yields an empty stream, never an
    /// error. Order of results is unspecified.
    fn list_stream<'a>(&'a self, prefix: &'a str) -> ObjectInfoStream<'a>;

    /// Upload a local file as a complete object.
    ///
    /// # Notes
    /// - There is no partial-success state: on error the object either does
    ///   not exist or still holds its previous contents.
    /// - An existing object with the same key is overwritten.
    async fn upload(&self, key: &str, source: &Path) -> Result<()>;

    /// Download an object into a local file, creating or truncating it.
    ///
    /// Returns [`NotFound`](crate::error::ErrorKind::NotFound) if the object
    /// does not exist.
    async fn download(&self, key: &str, target: &Path) -> Result<()>;
}
