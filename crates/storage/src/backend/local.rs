//! Local filesystem storage backend.
//!
//! This module provides a storage backend that treats a directory (a NAS
//! share, an external drive, a mounted volume) as a bucket. Keys map onto
//! relative paths below the root and are accessed via `tokio::fs`.

use crate::backend::ObjectInfoStream;
use crate::error::{ErrorKind, Result};
use crate::{ObjectInfo, StorageBackend, validate_key, validate_prefix};
use async_stream::stream;
use async_trait::async_trait;
use exn::ResultExt;
use std::fs::{Metadata, create_dir_all as sync_create_dir};
use std::path::{Component, Path, PathBuf};
use tokio::fs::{self, DirEntry};

/// Uploads are copied under this name first and renamed into place, so a
/// reader never observes a half-written object.
const PARTIAL_PREFIX: &str = ".cairn-partial-";

enum WalkEntry {
    Object(ObjectInfo),
    Descend(PathBuf),
    Skip,
}

/// Local filesystem storage backend.
///
/// # Examples
///
/// ```no_run
/// use cairn_storage::backend::LocalBackend;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = LocalBackend::new("nas", "/mnt/nas/backups")?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct LocalBackend {
    name: String,
    /// Directory acting as the bucket root
    root: PathBuf,
}
impl LocalBackend {
    /// Create a new local filesystem backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or exists and is not a
    /// directory.
    pub fn new(name: impl Into<String>, root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
        }
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidKey(root.display().to_string()));
            }
        } else {
            // Use non-async here; it'll only happen once on startup and it's
            // not worth the hassle of making the constructor async.
            sync_create_dir(&root).map_err(|e| Self::map_io_error(e, &root.display().to_string()))?;
        }
        Ok(Self { name: name.into(), root })
    }

    /// Get the absolute path for an object key.
    fn absolute_path(&self, key: &str) -> Result<PathBuf> {
        let validated = validate_key(key)?;
        Ok(self.root.join(validated))
    }

    /// Convert an absolute path back into an object key.
    fn relative_key(&self, absolute: &Path) -> Result<String> {
        let relative = absolute.strip_prefix(&self.root).or_raise(|| {
            ErrorKind::BackendError(format!("path `{}` is not within root `{}`", absolute.display(), self.root.display()))
        })?;
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => match part.to_str() {
                    Some(part) => parts.push(part),
                    None => exn::bail!(ErrorKind::InvalidKey(relative.display().to_string())),
                },
                _ => exn::bail!(ErrorKind::InvalidKey(relative.display().to_string())),
            }
        }
        Ok(parts.join("/"))
    }

    fn metadata(key: String, metadata: &Metadata) -> Result<ObjectInfo> {
        let modified = metadata.modified().map_err(ErrorKind::Io)?;
        Ok(ObjectInfo::new(key, metadata.len(), modified))
    }

    fn map_io_error(e: std::io::Error, key: &str) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound(key.to_string()),
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(key.to_string()),
            _ => ErrorKind::Io(e),
        }
    }

    /// A directory is worth descending into if anything below it could
    /// still match the prefix.
    fn could_match(dir_key: &str, prefix: &str) -> bool {
        let dir = format!("{dir_key}/");
        dir.starts_with(prefix) || prefix.starts_with(&dir)
    }

    async fn process_entry(&self, entry: DirEntry, prefix: &str) -> Result<WalkEntry> {
        let path = entry.path();
        if entry.file_name().to_string_lossy().starts_with(PARTIAL_PREFIX) {
            return Ok(WalkEntry::Skip);
        }
        let key = self.relative_key(&path)?;
        let metadata = entry.metadata().await.map_err(|e| Self::map_io_error(e, &key))?;
        if metadata.is_dir() {
            return Ok(match Self::could_match(&key, prefix) {
                true => WalkEntry::Descend(path),
                false => WalkEntry::Skip,
            });
        }
        if metadata.is_file() && key.starts_with(prefix) {
            return Ok(WalkEntry::Object(Self::metadata(key, &metadata)?));
        }
        // Note: silently drop non-matching files and what is most likely a
        // broken symlink.
        Ok(WalkEntry::Skip)
    }
}

#[async_trait]
impl StorageBackend for LocalBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn list_stream<'a>(&'a self, prefix: &'a str) -> ObjectInfoStream<'a> {
        let prefix = match validate_prefix(prefix) {
            Ok(prefix) => prefix,
            Err(e) => return Box::pin(futures::stream::once(async { Result::Err(e) })),
        };
        // Walk from the directory part of the prefix: "backups/home-" starts
        // at "backups" and matches anything below it beginning with "home-".
        let start_dir = match prefix.rfind('/') {
            Some(idx) => self.root.join(&prefix[..idx]),
            None => self.root.clone(),
        };
        let mut stack = vec![start_dir];

        Box::pin(stream! {
            'dirs: while let Some(current) = stack.pop() {
                let mut entries = match fs::read_dir(&current).await {
                    Ok(entries) => entries,
                    // To stay consistent with the behaviour of S3-compatible
                    // backends, asking for the contents of a directory that
                    // doesn't exist results in an empty list not an error.
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => continue 'dirs,
                    Err(err) => {
                        yield Err(exn::Exn::from(Self::map_io_error(err, &current.display().to_string())));
                        continue 'dirs;
                    }
                };

                'entries: loop {
                    let entry = match entries.next_entry().await {
                        Ok(Some(entry)) => entry,
                        Ok(None) => break 'entries,
                        Err(e) => {
                            yield Err(exn::Exn::from(Self::map_io_error(e, &current.display().to_string())));
                            continue 'entries;
                        },
                    };
                    match self.process_entry(entry, &prefix).await {
                        Ok(WalkEntry::Object(info)) => yield Ok(info),
                        Ok(WalkEntry::Descend(dir)) => stack.push(dir),
                        Ok(WalkEntry::Skip) => {},
                        Err(e) => yield Err(e),
                    };
                }
            }
        })
    }

    async fn upload(&self, key: &str, source: &Path) -> Result<()> {
        let abs_path = self.absolute_path(key)?;
        let (Some(parent), Some(file_name)) = (abs_path.parent(), abs_path.file_name()) else {
            exn::bail!(ErrorKind::InvalidKey(key.to_string()));
        };
        // Create parent directories if needed, to keep behaviour
        // consistent with S3-compatible storage.
        fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, key))?;
        let partial = parent.join(format!("{PARTIAL_PREFIX}{}", file_name.to_string_lossy()));
        if let Err(e) = fs::copy(source, &partial).await {
            let _ = fs::remove_file(&partial).await;
            exn::bail!(Self::map_io_error(e, &source.display().to_string()));
        }
        if let Err(e) = fs::rename(&partial, &abs_path).await {
            let _ = fs::remove_file(&partial).await;
            exn::bail!(Self::map_io_error(e, key));
        }
        tracing::debug!(backend = %self.name, key, "Object written");
        Ok(())
    }

    async fn download(&self, key: &str, target: &Path) -> Result<()> {
        let abs_path = self.absolute_path(key)?;
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).await.map_err(|e| Self::map_io_error(e, &parent.display().to_string()))?;
        }
        fs::copy(&abs_path, target).await.map_err(|e| Self::map_io_error(e, key))?;
        Ok(())
    }
}
