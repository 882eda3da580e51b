use cairn_config::Config;
use clap::{ArgAction, Args, Parser, Subcommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Change-aware directory archiving to object storage.
#[derive(Debug, Parser)]
#[command(name = "cairn", version, about)]
pub(crate) struct Cli {
    /// Configuration file (TOML, YAML or JSON).
    #[arg(long, global = true, env = "CAIRN_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// More log output (repeatable).
    #[arg(short, long, global = true, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Less log output (repeatable).
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub quiet: u8,

    #[command(subcommand)]
    pub command: Command,
}
impl Cli {
    pub fn verbosity(&self) -> i8 {
        let verbose = i8::try_from(self.verbose).unwrap_or(i8::MAX);
        let quiet = i8::try_from(self.quiet).unwrap_or(i8::MAX);
        verbose.saturating_sub(quiet)
    }
}

#[derive(Debug, Subcommand)]
pub(crate) enum Command {
    /// Back up a directory if its contents changed since the last backup.
    Backup(BackupArgs),
    /// Run a command with its output captured into rotating log files.
    Capture(CaptureArgs),
    /// List the archives stored for a backup target.
    List(ListArgs),
    /// Download an archive and unpack it.
    Restore(RestoreArgs),
}

/// Where archives live; each flag overrides the matching `[backup]` setting.
#[derive(Debug, Args)]
pub(crate) struct TargetArgs {
    /// Bucket: `s3://name`, a bare S3 bucket name, `file:///dir` or an
    /// absolute directory path.
    #[arg(long, value_name = "BUCKET")]
    pub bucket: Option<String>,

    /// Path inside the bucket.
    #[arg(long, value_name = "SUB_PATH")]
    pub path: Option<String>,

    /// Archive name prefix (default: source directory name followed by `-`).
    #[arg(long, value_name = "NAME_PREFIX")]
    pub prefix: Option<String>,
}
impl TargetArgs {
    pub fn apply(&self, config: &mut Config) {
        if let Some(bucket) = &self.bucket {
            config.backup.bucket = Some(bucket.clone());
        }
        if let Some(path) = &self.path {
            config.backup.path = path.clone();
        }
        if let Some(prefix) = &self.prefix {
            config.backup.prefix = Some(prefix.clone());
        }
    }
}

#[derive(Debug, Args)]
pub(crate) struct BackupArgs {
    /// Directory to back up.
    pub source: Option<PathBuf>,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Archive format: tar, tar.gz, tar.bz2, tar.xz or tar.zst.
    #[arg(long, value_name = "FORMAT")]
    pub codec: Option<String>,

    /// Check for changes and build the archive, but don't upload it.
    #[arg(long)]
    pub dry_run: bool,

    /// Move the archive here if its upload fails.
    #[arg(long, value_name = "DIR")]
    pub keep_failed: Option<PathBuf>,
}
impl BackupArgs {
    pub fn apply(&self, config: &mut Config) {
        self.target.apply(config);
        if let Some(source) = &self.source {
            config.backup.source = Some(source.clone());
        }
        if let Some(codec) = &self.codec {
            config.backup.codec = Some(codec.clone());
        }
        if let Some(dir) = &self.keep_failed {
            config.backup.keep_failed = Some(dir.clone());
        }
    }
}

#[derive(Debug, Args)]
pub(crate) struct CaptureArgs {
    /// Primary log file; also receives stderr unless --error-log is given.
    #[arg(long, value_name = "PRIMARY")]
    pub log: PathBuf,

    /// Separate log file for stderr.
    #[arg(long, value_name = "ERR")]
    pub error_log: Option<PathBuf>,

    /// Combined log size in bytes that triggers rotation.
    #[arg(long, value_name = "BYTES")]
    pub threshold: Option<u64>,

    /// Command to run, and its arguments.
    #[arg(last = true, required = true, value_name = "COMMAND")]
    pub command: Vec<OsString>,
}

#[derive(Debug, Args)]
pub(crate) struct ListArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Source directory, used to derive the name prefix.
    #[arg(long, value_name = "DIR")]
    pub source: Option<PathBuf>,

    /// Also show each archive's size in bytes and modification time.
    #[arg(short, long)]
    pub long: bool,
}

#[derive(Debug, Args)]
pub(crate) struct RestoreArgs {
    /// Directory to unpack into; created if missing, must be empty otherwise.
    pub dest: PathBuf,

    #[command(flatten)]
    pub target: TargetArgs,

    /// Source directory, used to derive the name prefix.
    #[arg(long, value_name = "DIR")]
    pub source: Option<PathBuf>,

    /// Restore the archive with this fingerprint (or leading part of one)
    /// instead of the newest.
    #[arg(long, value_name = "HEX")]
    pub fingerprint: Option<String>,

    /// Fingerprint the restored tree and fail if it doesn't match.
    #[arg(long)]
    pub verify: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_backup_overrides_config() {
        let cli = Cli::parse_from(["cairn", "backup", "/home/me", "--bucket", "s3://b", "--path", "p", "--codec", "tar"]);
        let Command::Backup(args) = cli.command else {
            panic!("expected backup");
        };
        let mut config = Config::default();
        config.backup.path = "from-config".to_string();
        config.backup.prefix = Some("kept-".to_string());
        args.apply(&mut config);
        assert_eq!(config.backup.source, Some(PathBuf::from("/home/me")));
        assert_eq!(config.backup.bucket.as_deref(), Some("s3://b"));
        assert_eq!(config.backup.path, "p");
        assert_eq!(config.backup.prefix.as_deref(), Some("kept-"));
        assert_eq!(config.backup.codec.as_deref(), Some("tar"));
    }

    #[test]
    fn test_capture_command_after_separator() {
        let cli = Cli::parse_from(["cairn", "capture", "--log", "run.log", "--", "sh", "-c", "exit 3"]);
        let Command::Capture(args) = cli.command else {
            panic!("expected capture");
        };
        assert_eq!(args.command, ["sh", "-c", "exit 3"].map(OsString::from));
    }

    #[test]
    fn test_capture_requires_command() {
        assert!(Cli::try_parse_from(["cairn", "capture", "--log", "run.log"]).is_err());
    }

    #[test]
    fn test_verbosity() {
        assert_eq!(Cli::parse_from(["cairn", "-vv", "list"]).verbosity(), 2);
        assert_eq!(Cli::parse_from(["cairn", "list", "-q"]).verbosity(), -1);
    }
}
