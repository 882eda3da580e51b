//! Layered configuration for cairn.
//!
//! Settings are merged, later layers winning:
//!
//! 1. built-in defaults;
//! 2. a configuration file: the one given explicitly, otherwise `cairn.toml`
//!    in the platform configuration directory if it exists (TOML, YAML or
//!    JSON, chosen by extension);
//! 3. environment variables prefixed `CAIRN_`, with `__` between section
//!    and key (`CAIRN_BACKUP__BUCKET`, `CAIRN_S3__KEY_SECRET`);
//! 4. command-line flags, applied by the binary on the loaded [`Config`].
//!
//! ```toml
//! [backup]
//! source = "/home/me"
//! bucket = "s3://backups"
//! path = "laptop"
//! codec = "tar.zst"
//!
//! [s3]
//! region = "eu-central-003"
//! endpoint = "https://s3.eu-central-003.backblazeb2.com"
//! ```

pub mod error;
mod target;

pub use crate::target::Target;
use crate::error::{ErrorKind, Result};
use cairn_archive::Codec;
use cairn_backup::{BackupPlan, Location, default_prefix};
use directories::ProjectDirs;
use exn::{OptionExt, ResultExt};
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Prefix of environment variables read as configuration.
pub const ENV_PREFIX: &str = "CAIRN_";
/// Name of the configuration file looked for in the platform config dir.
pub const DEFAULT_FILE_NAME: &str = "cairn.toml";
const DEFAULT_REGION: &str = "us-east-1";

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub backup: BackupSettings,
    pub s3: S3Settings,
    pub capture: CaptureSettings,
}

/// What to back up, and where to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct BackupSettings {
    /// Directory to back up.
    pub source: Option<PathBuf>,
    /// Bucket to store archives in; see [`Target`].
    pub bucket: Option<String>,
    /// Directory-like path inside the bucket.
    pub path: String,
    /// Archive name prefix; defaults to the source directory's name plus `-`.
    pub prefix: Option<String>,
    /// Archive format name (`tar`, `tar.gz`, `tar.bz2`, `tar.xz`, `tar.zst`).
    pub codec: Option<String>,
    /// Where to move archives that fail to upload.
    pub keep_failed: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct S3Settings {
    pub region: String,
    /// Custom endpoint for S3-compatible services.
    pub endpoint: Option<String>,
    pub key_id: Option<String>,
    pub key_secret: Option<String>,
}
impl Default for S3Settings {
    fn default() -> Self {
        Self {
            region: DEFAULT_REGION.to_string(),
            endpoint: None,
            key_id: None,
            key_secret: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Combined log size in bytes that triggers rotation.
    pub threshold: u64,
}
impl Default for CaptureSettings {
    fn default() -> Self {
        Self { threshold: cairn_capture::DEFAULT_THRESHOLD }
    }
}

impl Config {
    /// Location of the default configuration file, whether or not it exists.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "cairn").map(|dirs| dirs.config_dir().join(DEFAULT_FILE_NAME))
    }

    /// Build the layered figment without extracting it.
    ///
    /// An explicitly given file must exist; the default file is optional.
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        match file {
            Some(path) => {
                if !path.is_file() {
                    exn::bail!(ErrorKind::Invalid(format!("configuration file {} does not exist", path.display())));
                }
                figment = merge_file(figment, path)?;
            },
            None => {
                if let Some(path) = Self::default_path().filter(|path| path.is_file()) {
                    figment = merge_file(figment, &path)?;
                }
            },
        }
        Ok(figment.merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    pub fn load(file: Option<&Path>) -> Result<Self> {
        let config: Self = Self::figment(file)?.extract().or_raise(|| ErrorKind::Load)?;
        tracing::debug!(backup = ?config.backup, "Configuration loaded");
        Ok(config)
    }

    pub fn target(&self) -> Result<Target> {
        self.backup.bucket.as_deref().ok_or_raise(|| ErrorKind::Missing("backup.bucket"))?.parse()
    }

    pub fn codec(&self) -> Result<Codec> {
        match &self.backup.codec {
            Some(name) => name.parse::<Codec>().or_raise(|| ErrorKind::Invalid(format!("backup.codec {name:?}"))),
            None => Ok(Codec::default()),
        }
    }

    /// Where archives are kept, for listing and restoring.
    ///
    /// Without an explicit prefix the source directory's name is used, so
    /// either `backup.prefix` or `backup.source` must be set.
    pub fn location(&self) -> Result<Location> {
        let prefix = match (&self.backup.prefix, &self.backup.source) {
            (Some(prefix), _) => prefix.clone(),
            (None, Some(source)) => default_prefix(source).ok_or_raise(|| ErrorKind::Missing("backup.prefix"))?,
            (None, None) => exn::bail!(ErrorKind::Missing("backup.prefix")),
        };
        Location::new(&self.backup.path, prefix).or_raise(|| ErrorKind::Invalid("backup.path or backup.prefix".to_string()))
    }

    /// Validate the backup settings into a plan.
    pub fn backup_plan(&self) -> Result<BackupPlan> {
        let source = self.backup.source.as_ref().ok_or_raise(|| ErrorKind::Missing("backup.source"))?;
        let plan = BackupPlan::new(source, &self.backup.path, self.backup.prefix.clone(), self.codec()?)
            .or_raise(|| ErrorKind::Invalid("backup settings".to_string()))?;
        Ok(match &self.backup.keep_failed {
            Some(dir) => plan.with_keep_failed(dir),
            None => plan,
        })
    }
}

fn merge_file(figment: Figment, path: &Path) -> Result<Figment> {
    let extension = path.extension().and_then(|ext| ext.to_str()).map(str::to_ascii_lowercase);
    tracing::debug!(path = %path.display(), "Reading configuration file");
    Ok(match extension.as_deref() {
        Some("toml") => figment.merge(Toml::file_exact(path)),
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path)),
        Some("json") => figment.merge(Json::file_exact(path)),
        _ => exn::bail!(ErrorKind::UnsupportedFormat(path.to_path_buf())),
    })
}
