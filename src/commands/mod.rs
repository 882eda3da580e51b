pub(crate) mod backup;
pub(crate) mod capture;
pub(crate) mod list;
pub(crate) mod restore;

use cairn_backup::error::{ErrorKind, Result};
use cairn_config::Config;
use cairn_config::error::ErrorKind as ConfigErrorKind;
use cairn_storage::BackendHandle;
use exn::ResultExt;
use std::process::ExitCode;

/// Errors that decide the process exit status.
pub(crate) trait ExitStatus {
    fn exit_code(&self) -> u8;
}
impl ExitStatus for ErrorKind {
    fn exit_code(&self) -> u8 {
        ErrorKind::exit_code(self)
    }
}
impl ExitStatus for cairn_capture::error::ErrorKind {
    fn exit_code(&self) -> u8 {
        cairn_capture::error::ErrorKind::exit_code(self)
    }
}
impl ExitStatus for ConfigErrorKind {
    fn exit_code(&self) -> u8 {
        78
    }
}

/// Print the top-level message and turn the error into an exit status.
///
/// The full error tree (with source locations) is logged at debug level.
pub(crate) fn report<E>(err: exn::Exn<E>) -> ExitCode
where
    E: ExitStatus + std::error::Error + Send + Sync + 'static,
{
    tracing::debug!("{err:?}");
    let kind: &E = &err;
    eprintln!("error: {kind}");
    ExitCode::from(kind.exit_code())
}

/// Open the configured bucket.
///
/// Credential and naming problems are configuration errors; a backend that
/// can't be reached is a transfer error.
pub(crate) async fn connect(config: &Config) -> Result<BackendHandle> {
    let target = config.target().or_raise(|| ErrorKind::Config("backup.bucket is missing or invalid".to_string()))?;
    match target.connect(&config.s3).await {
        Ok(backend) => Ok(backend),
        Err(err) => {
            let kind = match &*err {
                ConfigErrorKind::Backend => ErrorKind::Transfer,
                other => ErrorKind::Config(other.to_string()),
            };
            Err(err.raise(kind))
        },
    }
}

/// The archive location for listing and restoring.
pub(crate) fn location(config: &Config) -> Result<cairn_backup::Location> {
    config
        .location()
        .or_raise(|| ErrorKind::Config("set backup.prefix, or backup.source to derive it from".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(ConfigErrorKind::Load)]
    #[case(ConfigErrorKind::Missing("backup.bucket"))]
    #[case(ConfigErrorKind::Backend)]
    fn test_config_errors_exit_78(#[case] kind: ConfigErrorKind) {
        assert_eq!(ExitStatus::exit_code(&kind), 78);
    }

    #[rstest]
    #[case(ErrorKind::Transfer.exit_code(), 69)]
    #[case(ExitStatus::exit_code(&cairn_capture::error::ErrorKind::NotFound("x".to_string())), 127)]
    fn test_exit_codes_pass_through(#[case] code: u8, #[case] expected: u8) {
        assert_eq!(code, expected);
    }

    #[tokio::test]
    async fn test_connect_without_bucket() {
        let err = connect(&Config::default()).await.err().unwrap();
        assert!(matches!(&*err, ErrorKind::Config(_)));
    }

    #[tokio::test]
    async fn test_connect_local_bucket() {
        let temp = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.backup.bucket = Some(temp.path().display().to_string());
        let backend = connect(&config).await.unwrap();
        assert!(backend.list("").await.unwrap().is_empty());
    }
}
