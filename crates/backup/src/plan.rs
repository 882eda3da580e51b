//! Validated, immutable descriptions of what to back up and where.

use crate::error::{ErrorKind, Result};
use cairn_archive::Codec;
use cairn_storage::{join_key, validate_prefix};
use exn::{OptionExt, ResultExt};
use std::path::{Path, PathBuf};

/// Where a series of archives lives inside a bucket.
///
/// Archives are stored at `<path>/<prefix><timestamp>-<fingerprint><ext>`;
/// the ledger is every key starting with `<path>/<prefix>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    path: String,
    prefix: String,
}
impl Location {
    /// An empty `path` means the bucket root.
    pub fn new(path: impl AsRef<str>, prefix: impl Into<String>) -> Result<Self> {
        let path = path.as_ref();
        let path = validate_prefix(path)
            .or_raise(|| ErrorKind::Config(format!("invalid remote path {path:?}")))?
            .trim_end_matches('/')
            .to_string();
        let prefix = prefix.into();
        // `.` and `..` would be normalised away, widening the ledger past `path`.
        if prefix.contains('/') || prefix.contains('\0') || prefix == "." || prefix == ".." {
            exn::bail!(ErrorKind::Config(format!("archive name prefix {prefix:?} must be a plain name")));
        }
        Ok(Self { path, prefix })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Key prefix shared by every archive at this location.
    pub fn key_prefix(&self) -> String {
        join_key(&self.path, &self.prefix)
    }

    /// Full object key for an archive name.
    pub fn key(&self, name: &str) -> String {
        join_key(&self.path, name)
    }
}

/// Default archive name prefix: the source directory's name plus `-`.
///
/// Relative sources such as `.` are resolved first so they still have a name.
pub fn default_prefix(source: &Path) -> Option<String> {
    let resolved = source.canonicalize().ok();
    let name = resolved.as_deref().unwrap_or(source).file_name()?;
    Some(format!("{}-", name.to_string_lossy()))
}

/// Everything a single backup run needs to know, validated up front.
///
/// # Examples
///
/// ```no_run
/// use cairn_archive::Codec;
/// use cairn_backup::BackupPlan;
///
/// let plan = BackupPlan::new("/home/me", "backups", None, Codec::TarGz).unwrap();
/// assert_eq!(plan.location().key_prefix(), "backups/me-");
/// ```
#[derive(Debug, Clone)]
pub struct BackupPlan {
    source: PathBuf,
    location: Location,
    codec: Codec,
    keep_failed: Option<PathBuf>,
}
impl BackupPlan {
    /// Validate a plan.
    ///
    /// The source must be an existing directory. Without an explicit name
    /// prefix the source directory's name (plus `-`) is used.
    pub fn new(source: impl Into<PathBuf>, path: &str, prefix: Option<String>, codec: Codec) -> Result<Self> {
        let source = source.into();
        check_source(&source)?;
        let prefix = match prefix {
            Some(prefix) => prefix,
            None => default_prefix(&source).ok_or_raise(|| {
                ErrorKind::Config(format!("cannot derive a name prefix from {}; set one explicitly", source.display()))
            })?,
        };
        let location = Location::new(path, prefix)?;
        Ok(Self { source, location, codec, keep_failed: None })
    }

    /// Move archives that fail to upload into `dir` instead of discarding
    /// them with the working directory.
    pub fn with_keep_failed(mut self, dir: impl Into<PathBuf>) -> Self {
        self.keep_failed = Some(dir.into());
        self
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    pub fn keep_failed(&self) -> Option<&Path> {
        self.keep_failed.as_deref()
    }
}

pub(crate) fn check_source(source: &Path) -> Result<()> {
    if !source.is_dir() {
        exn::bail!(ErrorKind::Config(format!("source {} is not a directory", source.display())));
    }
    Ok(())
}
