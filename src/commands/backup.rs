use crate::cli::BackupArgs;
use crate::commands::{connect, report};
use cairn_backup::error::{ErrorKind, Result};
use cairn_backup::{Backup, Outcome};
use cairn_config::Config;
use cairn_storage::BackendHandle;
use cairn_storage::backend::DryRunBackend;
use exn::ResultExt;
use std::process::ExitCode;
use std::sync::Arc;

pub(crate) async fn execute(args: BackupArgs, mut config: Config) -> ExitCode {
    args.apply(&mut config);
    match run(&config, args.dry_run).await {
        Ok(outcome) => {
            println!("{}", summary(&outcome, args.dry_run));
            ExitCode::SUCCESS
        },
        Err(err) => report(err),
    }
}

async fn run(config: &Config, dry_run: bool) -> Result<Outcome> {
    let plan = config.backup_plan().or_raise(|| ErrorKind::Config("invalid backup settings".to_string()))?;
    let mut backend: BackendHandle = connect(config).await?;
    if dry_run {
        backend = Arc::new(DryRunBackend::new(backend));
    }
    Backup::new(backend).run(&plan).await
}

fn summary(outcome: &Outcome, dry_run: bool) -> String {
    match outcome {
        Outcome::Uploaded { key, size, .. } if dry_run => format!("dry run: would upload {key} ({size} bytes)"),
        outcome => outcome.to_string(),
    }
}
