//! In-memory storage backend for testing.

use super::ObjectInfoStream;
use crate::error::{ErrorKind, Result};
use crate::{ObjectInfo, StorageBackend, validate_key, validate_prefix};
use async_stream::stream;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use time::UtcDateTime;
use tokio::sync::RwLock;

/// In-memory storage backend for testing.
///
/// Objects are stored in a map behind a [`RwLock`], so all trait methods can
/// operate on `&self` without external synchronisation. Listing and uploads
/// can be made to fail on demand, and successful uploads are counted.
///
/// # Examples
///
/// ```
/// use cairn_storage::backend::{MockBackend, StorageBackend};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = MockBackend::with_objects([
///     ("backups/home-2024.tar.gz", b"archive".to_vec()),
/// ]);
/// let objects = backend.list("backups/home-").await?;
/// assert_eq!(objects[0].size, 7);
/// # Ok(())
/// # }
/// ```
pub struct MockBackend {
    name: String,
    storage: RwLock<BTreeMap<String, (UtcDateTime, Vec<u8>)>>,
    fail_list: AtomicBool,
    fail_upload: AtomicBool,
    uploads: AtomicUsize,
}

impl MockBackend {
    /// Create a mock backend pre-populated with objects.
    ///
    /// Panics if any key fails validation (e.g. key traversal). If test
    /// setup is wrong, then test should not pass.
    pub fn with_objects(objects: impl IntoIterator<Item = (impl Into<String>, impl Into<Vec<u8>>)>) -> Self {
        let mut map = BTreeMap::new();
        let now = UtcDateTime::now();
        for (key, data) in objects {
            let key = key.into();
            let Ok(validated) = validate_key(&key) else {
                // The panic here is DELIBERATE. MockBackend is intended to be
                // used in tests; panics are expected. There is no error result.
                panic!("MockBackend::with_objects: invalid key {key:?}");
            };
            map.insert(validated, (now, data.into()));
        }
        Self {
            name: "mock".to_string(),
            storage: RwLock::new(map),
            fail_list: AtomicBool::new(false),
            fail_upload: AtomicBool::new(false),
            uploads: AtomicUsize::new(0),
        }
    }

    /// Make every subsequent listing fail with a network error.
    pub fn fail_listing(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    /// Make every subsequent upload fail with a network error.
    pub fn fail_uploads(&self, fail: bool) {
        self.fail_upload.store(fail, Ordering::SeqCst);
    }

    /// Number of uploads that completed successfully.
    pub fn upload_count(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }

    /// All stored keys in ascending order.
    pub async fn keys(&self) -> Vec<String> {
        self.storage.read().await.keys().cloned().collect()
    }

    /// Contents of a stored object, if present.
    pub async fn contents(&self, key: &str) -> Option<Vec<u8>> {
        self.storage.read().await.get(key).map(|(_, data)| data.clone())
    }
}
impl Default for MockBackend {
    fn default() -> Self {
        let objects: [(&str, Vec<u8>); 0] = [];
        Self::with_objects(objects)
    }
}

#[async_trait]
impl StorageBackend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: &'a str) -> ObjectInfoStream<'a> {
        if self.fail_list.load(Ordering::SeqCst) {
            let err = exn::Exn::from(ErrorKind::Network("injected listing failure".to_string()));
            return Box::pin(futures::stream::once(async { Err(err) }));
        }
        let prefix = match validate_prefix(prefix) {
            Ok(prefix) => prefix,
            Err(e) => return Box::pin(futures::stream::once(async { Err(e) })),
        };

        Box::pin(stream! {
            // Snapshot matching entries under the read lock, then drop it
            // before yielding to avoid holding the lock across yield points.
            let entries: Vec<ObjectInfo> = {
                let guard = self.storage.read().await;
                guard
                    .iter()
                    .filter(|(key, _)| key.starts_with(&prefix))
                    .map(|(key, (inserted, data))| ObjectInfo::new(key.clone(), data.len() as u64, *inserted))
                    .collect()
            };
            for info in entries {
                yield Ok(info);
            }
        })
    }

    async fn upload(&self, key: &str, source: &Path) -> Result<()> {
        let key = validate_key(key)?;
        if self.fail_upload.load(Ordering::SeqCst) {
            exn::bail!(ErrorKind::Network("injected upload failure".to_string()));
        }
        let data = tokio::fs::read(source).await.map_err(ErrorKind::Io)?;
        self.storage.write().await.insert(key, (UtcDateTime::now(), data));
        self.uploads.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn download(&self, key: &str, target: &Path) -> Result<()> {
        let data = self.contents(&validate_key(key)?).await.ok_or_else(|| exn::Exn::from(ErrorKind::NotFound(key.to_string())))?;
        Ok(tokio::fs::write(target, data).await.map_err(ErrorKind::Io)?)
    }
}
