use crate::cli::RestoreArgs;
use crate::commands::{connect, location, report};
use cairn_backup::error::Result;
use cairn_backup::{Backup, Restored, Selector};
use cairn_config::Config;
use std::process::ExitCode;

pub(crate) async fn execute(args: RestoreArgs, mut config: Config) -> ExitCode {
    args.target.apply(&mut config);
    if let Some(source) = &args.source {
        config.backup.source = Some(source.clone());
    }
    match run(&args, &config).await {
        Ok(restored) => {
            println!("{}", summary(&restored, &args));
            ExitCode::SUCCESS
        },
        Err(err) => report(err),
    }
}

async fn run(args: &RestoreArgs, config: &Config) -> Result<Restored> {
    let selector = match &args.fingerprint {
        Some(hex) => Selector::fingerprint(hex)?,
        None => Selector::Newest,
    };
    let location = location(config)?;
    let backend = connect(config).await?;
    Backup::new(backend).restore(&location, &selector, &args.dest, args.verify).await
}

fn summary(restored: &Restored, args: &RestoreArgs) -> String {
    let verified = if restored.verified { ", verified" } else { "" };
    format!("restored {} into {} ({} entries{verified})", restored.key, args.dest.display(), restored.entries)
}
