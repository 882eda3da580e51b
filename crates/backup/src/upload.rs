use crate::error::{ErrorKind, Result};
use cairn_storage::StorageBackend;
use exn::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};
use tracing::instrument;

/// Transfer a finished archive to `key`.
///
/// Backends never leave a partial object behind: afterwards the object
/// either exists complete or this returns a [`Transfer`](ErrorKind::Transfer)
/// error. Nothing is retried.
#[instrument(skip(backend, archive), fields(backend = backend.name()))]
pub async fn upload(backend: &dyn StorageBackend, archive: &Path, key: &str) -> Result<()> {
    backend.upload(key, archive).await.or_raise(|| ErrorKind::Transfer)?;
    tracing::info!(key, "Archive uploaded");
    Ok(())
}

/// Move an archive that failed to upload out of the working directory.
///
/// Falls back to copying when `dir` is on a different filesystem.
pub(crate) async fn keep_failed(archive: &Path, dir: &Path) -> Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await.or_raise(|| ErrorKind::Io)?;
    let name = archive.file_name().ok_or_raise(|| ErrorKind::Internal("archive path has no file name".to_string()))?;
    let kept = dir.join(name);
    if tokio::fs::rename(archive, &kept).await.is_err() {
        tokio::fs::copy(archive, &kept).await.or_raise(|| ErrorKind::Io)?;
    }
    tracing::warn!(path = %kept.display(), "Kept archive that failed to upload");
    Ok(kept)
}
