//! Where archives are stored.

use crate::S3Settings;
use crate::error::{Error, ErrorKind, Result};
use cairn_storage::BackendHandle;
use cairn_storage::backend::LocalBackend;
use exn::ResultExt;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

/// A storage bucket, parsed from the `bucket` setting.
///
/// - `s3://name` or a bare `name` is an S3 bucket;
/// - `file:///abs/dir` or an absolute path is a local directory used as a
///   bucket (a NAS mount, an external drive).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Local(PathBuf),
    S3 { bucket: String },
}

impl FromStr for Target {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(bucket) = s.strip_prefix("s3://") {
            return s3_bucket(bucket.trim_end_matches('/'));
        }
        if let Some(path) = s.strip_prefix("file://") {
            return local_dir(path);
        }
        if s.starts_with('/') || PathBuf::from(s).is_absolute() {
            return local_dir(s);
        }
        s3_bucket(s)
    }
}

fn s3_bucket(bucket: &str) -> Result<Target> {
    if bucket.is_empty() || bucket.contains('/') || bucket.contains(char::is_whitespace) {
        exn::bail!(ErrorKind::Invalid(format!("bucket {bucket:?} is not a valid bucket name")));
    }
    Ok(Target::S3 { bucket: bucket.to_string() })
}

fn local_dir(path: &str) -> Result<Target> {
    let path = PathBuf::from(path);
    if !path.is_absolute() {
        exn::bail!(ErrorKind::Invalid(format!("local bucket {} must be an absolute path", path.display())));
    }
    Ok(Target::Local(path))
}

impl Display for Target {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::Local(path) => write!(f, "file://{}", path.display()),
            Self::S3 { bucket } => write!(f, "s3://{bucket}"),
        }
    }
}

impl Target {
    /// Create the storage backend for this target.
    pub async fn connect(&self, s3: &S3Settings) -> Result<BackendHandle> {
        let backend: BackendHandle = match self {
            Self::Local(root) => Arc::new(LocalBackend::new(self.to_string(), root).or_raise(|| ErrorKind::Backend)?),
            Self::S3 { bucket } => connect_s3(self, bucket, s3).await?,
        };
        tracing::debug!(bucket = %self, "Storage backend ready");
        Ok(backend)
    }
}

#[cfg(feature = "s3")]
async fn connect_s3(target: &Target, bucket: &str, s3: &S3Settings) -> Result<BackendHandle> {
    use cairn_storage::backend::S3Backend;
    use exn::OptionExt;

    let key_id = s3.key_id.as_deref().ok_or_raise(|| ErrorKind::Missing("s3.key_id"))?;
    let key_secret = s3.key_secret.as_deref().ok_or_raise(|| ErrorKind::Missing("s3.key_secret"))?;
    let backend = S3Backend::new(target.to_string(), bucket, &s3.region, s3.endpoint.as_deref(), key_id, key_secret)
        .await
        .or_raise(|| ErrorKind::Backend)?;
    Ok(Arc::new(backend))
}

#[cfg(not(feature = "s3"))]
async fn connect_s3(target: &Target, _bucket: &str, _s3: &S3Settings) -> Result<BackendHandle> {
    exn::bail!(ErrorKind::Invalid(format!("{target} needs S3 support, which this build doesn't include")))
}
