use crate::cli::ListArgs;
use crate::commands::{connect, location, report};
use cairn_backup::error::Result;
use cairn_backup::ledger::find_existing;
use cairn_config::Config;
use cairn_storage::ObjectInfo;
use std::process::ExitCode;
use time::format_description::well_known::Rfc3339;

pub(crate) async fn execute(args: ListArgs, mut config: Config) -> ExitCode {
    args.target.apply(&mut config);
    if let Some(source) = args.source {
        config.backup.source = Some(source);
    }
    match archives(&config).await {
        Ok(objects) => {
            for info in &objects {
                println!("{}", line(info, args.long));
            }
            ExitCode::SUCCESS
        },
        Err(err) => report(err),
    }
}

async fn archives(config: &Config) -> Result<Vec<ObjectInfo>> {
    let location = location(config)?;
    let backend = connect(config).await?;
    find_existing(backend.as_ref(), &location).await
}

/// The key alone, or `<key>\t<size>\t<modified>` in the long format.
fn line(info: &ObjectInfo, long: bool) -> String {
    if !long {
        return info.key.clone();
    }
    let modified = info.modified.format(&Rfc3339).unwrap_or_else(|_| "-".to_string());
    format!("{}\t{}\t{modified}", info.key, info.size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_line() {
        let info = ObjectInfo::new("laptop/home-x.tar.gz", 1024, datetime!(2024-03-01 12:30:00 UTC));
        assert_eq!(line(&info, false), "laptop/home-x.tar.gz");
        assert_eq!(line(&info, true), "laptop/home-x.tar.gz\t1024\t2024-03-01T12:30:00Z");
    }
}
