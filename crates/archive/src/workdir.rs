//! Private scratch directories for building archives.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const WORKDIR_PREFIX: &str = "cairn-";

/// A private, initially empty directory that is deleted (with everything in
/// it) when the value is dropped.
///
/// Dropping covers every exit path, including `?` propagation and panics
/// unwinding through the owner. Call [`close()`](Self::close) instead to
/// find out whether removal succeeded.
///
/// # Examples
///
/// ```
/// use cairn_archive::WorkDir;
///
/// let workdir = WorkDir::new().unwrap();
/// let scratch = workdir.join("archive.tar.gz");
/// std::fs::write(&scratch, b"...").unwrap();
/// let root = workdir.path().to_path_buf();
/// drop(workdir);
/// assert!(!root.exists());
/// ```
#[derive(Debug)]
pub struct WorkDir {
    dir: TempDir,
}
impl WorkDir {
    /// Create a uniquely-named working directory in the system temp dir.
    pub fn new() -> Result<Self> {
        Self::new_in(std::env::temp_dir())
    }

    /// Create a uniquely-named working directory inside `parent`.
    pub fn new_in(parent: impl AsRef<Path>) -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix(WORKDIR_PREFIX)
            .tempdir_in(parent.as_ref())
            .or_raise(|| ErrorKind::Io)?;
        tracing::debug!(path = %dir.path().display(), "Working directory created");
        Ok(Self { dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of an entry inside the working directory.
    pub fn join(&self, name: impl AsRef<Path>) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Remove the working directory now, reporting failure.
    pub fn close(self) -> Result<()> {
        let path = self.dir.path().to_path_buf();
        self.dir.close().or_raise(|| ErrorKind::Io)?;
        tracing::debug!(path = %path.display(), "Working directory removed");
        Ok(())
    }
}
