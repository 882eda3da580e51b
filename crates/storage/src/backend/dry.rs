//! Dry-run storage backend.
//!
//! Wraps another backend: reads go through to the real storage, writes are
//! logged and dropped while still indicating success.

use async_trait::async_trait;
use std::path::Path;

use crate::backend::ObjectInfoStream;
use crate::{BackendHandle, StorageBackend, error::Result};

/// Dry-run storage backend.
///
/// Listing sees the real bucket so change detection behaves exactly as it
/// would for a live run; uploads emit an
/// [`info event`](tracing::Event) instead of touching storage.
#[derive(Clone)]
pub struct DryRunBackend {
    inner: BackendHandle,
}
impl DryRunBackend {
    pub fn new(inner: BackendHandle) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl StorageBackend for DryRunBackend {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn list_stream<'a>(&'a self, prefix: &'a str) -> ObjectInfoStream<'a> {
        self.inner.list_stream(prefix)
    }

    async fn upload(&self, key: &str, source: &Path) -> Result<()> {
        let bytes = tokio::fs::metadata(source).await.map(|m| m.len()).unwrap_or_default();
        tracing::info!(backend = self.inner.name(), key, bytes, "Skipping upload during dry run");
        Ok(())
    }

    async fn download(&self, key: &str, target: &Path) -> Result<()> {
        self.inner.download(key, target).await
    }
}
