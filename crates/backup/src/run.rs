//! The backup orchestrator.

use crate::error::{ErrorKind, Result};
use crate::fingerprint::{Blake3Fingerprinter, Fingerprint, Fingerprinter};
use crate::ledger::{find_existing, find_fingerprint};
use crate::naming::archive_name;
use crate::plan::{BackupPlan, check_source};
use crate::upload::{keep_failed, upload};
use cairn_archive::WorkDir;
use cairn_storage::BackendHandle;
use derive_more::Display;
use exn::ResultExt;
use std::fmt::{Display as FmtDisplay, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::instrument;

/// Steps of a backup run, in order.
#[derive(Debug, Display, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    #[display("start")]
    Start,
    #[display("fingerprinting")]
    Fingerprinting,
    #[display("checking ledger")]
    CheckingLedger,
    #[display("archiving")]
    Archiving,
    #[display("uploading")]
    Uploading,
}

/// How a successful run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// An archive with this fingerprint already exists; nothing was written.
    Unchanged { fingerprint: Fingerprint, existing: String },
    /// A new archive was uploaded to `key`.
    Uploaded { fingerprint: Fingerprint, key: String, size: u64 },
}
impl Outcome {
    pub fn fingerprint(&self) -> &Fingerprint {
        match self {
            Self::Unchanged { fingerprint, .. } | Self::Uploaded { fingerprint, .. } => fingerprint,
        }
    }
}
impl FmtDisplay for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Unchanged { existing, .. } => write!(f, "unchanged: already backed up as {existing}"),
            Self::Uploaded { key, size, .. } => write!(f, "uploaded {key} ({size} bytes)"),
        }
    }
}

/// Runs [`BackupPlan`]s against one storage backend.
///
/// Each run moves through [`Stage`]s strictly in sequence: fingerprint the
/// source, list the ledger, and only when the fingerprint is new, archive and
/// upload. Nothing is written remotely before the ledger has been checked.
/// Blocking work (hashing, compression) runs on tokio's blocking pool and is
/// awaited straight away.
///
/// # Examples
///
/// ```no_run
/// use cairn_archive::Codec;
/// use cairn_backup::{Backup, BackupPlan};
/// use cairn_storage::backend::LocalBackend;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let backend = Arc::new(LocalBackend::new("nas", "/mnt/nas/backups")?);
/// let plan = BackupPlan::new("/home/me", "laptop", None, Codec::TarGz)?;
/// let outcome = Backup::new(backend).run(&plan).await?;
/// println!("{outcome}");
/// # Ok(())
/// # }
/// ```
pub struct Backup {
    pub(crate) backend: BackendHandle,
    fingerprinter: Arc<dyn Fingerprinter>,
    workdir_parent: Option<PathBuf>,
}
impl Backup {
    pub fn new(backend: BackendHandle) -> Self {
        Self {
            backend,
            fingerprinter: Arc::new(Blake3Fingerprinter),
            workdir_parent: None,
        }
    }

    /// Replace the default BLAKE3 fingerprinter.
    pub fn with_fingerprinter(mut self, fingerprinter: impl Fingerprinter + 'static) -> Self {
        self.fingerprinter = Arc::new(fingerprinter);
        self
    }

    /// Create working directories inside `dir` instead of the system temp
    /// directory.
    pub fn with_workdir_parent(mut self, dir: impl Into<PathBuf>) -> Self {
        self.workdir_parent = Some(dir.into());
        self
    }

    pub async fn run(&self, plan: &BackupPlan) -> Result<Outcome> {
        self.run_at(plan, OffsetDateTime::now_utc()).await
    }

    /// Run with a fixed timestamp for the archive name.
    #[instrument(skip_all, fields(backend = self.backend.name(), source = %plan.source().display()))]
    pub async fn run_at(&self, plan: &BackupPlan, at: OffsetDateTime) -> Result<Outcome> {
        tracing::debug!(stage = %Stage::Start, "Validating plan");
        check_source(plan.source())?;

        tracing::debug!(stage = %Stage::Fingerprinting, "Fingerprinting source tree");
        let fingerprint = self.fingerprint(plan.source()).await?;
        tracing::info!(fingerprint = %fingerprint, "Source fingerprinted");

        tracing::debug!(stage = %Stage::CheckingLedger, "Listing existing archives");
        let existing = find_existing(self.backend.as_ref(), plan.location()).await?;
        if let Some(found) = find_fingerprint(&existing, &fingerprint) {
            tracing::info!(existing = %found.key, size = found.size, "No changes since the last backup");
            return Ok(Outcome::Unchanged { fingerprint, existing: found.key.clone() });
        }

        tracing::debug!(stage = %Stage::Archiving, "Archiving source tree");
        let workdir = self.workdir()?;
        let name = archive_name(plan.location().prefix(), at, &fingerprint, plan.codec())?;
        let archive = workdir.join(&name);
        let size = create_archive(plan, &archive).await?;

        tracing::debug!(stage = %Stage::Uploading, size, "Uploading archive");
        let key = plan.location().key(&name);
        if let Err(err) = upload(self.backend.as_ref(), &archive, &key).await {
            if let Some(dir) = plan.keep_failed()
                && let Err(keep_err) = keep_failed(&archive, dir).await
            {
                tracing::error!(error = ?keep_err, "Could not keep the failed archive");
            }
            return Err(err);
        }

        if let Err(err) = workdir.close() {
            tracing::warn!(error = ?err, "Could not remove the working directory");
        }
        Ok(Outcome::Uploaded { fingerprint, key, size })
    }

    pub(crate) fn workdir(&self) -> Result<WorkDir> {
        match &self.workdir_parent {
            Some(parent) => WorkDir::new_in(parent),
            None => WorkDir::new(),
        }
        .or_raise(|| ErrorKind::Io)
    }

    pub(crate) async fn fingerprint(&self, source: &Path) -> Result<Fingerprint> {
        let fingerprinter = Arc::clone(&self.fingerprinter);
        let source = source.to_path_buf();
        tokio::task::spawn_blocking(move || fingerprinter.fingerprint(&source))
            .await
            .or_raise(|| ErrorKind::Internal("fingerprinting task failed".to_string()))?
    }
}

async fn create_archive(plan: &BackupPlan, archive: &Path) -> Result<u64> {
    let codec = plan.codec();
    let source = plan.source().to_path_buf();
    let archive = archive.to_path_buf();
    tokio::task::spawn_blocking(move || codec.create(&source, &archive))
        .await
        .or_raise(|| ErrorKind::Internal("archiving task failed".to_string()))?
        .or_raise(|| ErrorKind::Archive)
}
