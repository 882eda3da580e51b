//! `cairn`: back up directories to object storage when they change, and run
//! commands with their output captured into rotating logs.

mod cli;
mod commands;
mod logging;

use crate::cli::{Cli, Command};
use crate::commands::report;
use cairn_config::Config;
use clap::Parser;
use std::ffi::OsString;
use std::future::Future;
use std::process::ExitCode;

/// Exit status for `capture` when its own arguments are unusable.
const CAPTURE_USAGE: u8 = 125;
/// Exit status when the async runtime can't be started (`EX_SOFTWARE`).
const RUNTIME_FAILURE: u8 = 70;

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => return parse_failure(&err, std::env::args_os().skip(1)),
    };
    logging::init(cli.verbosity());

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) if matches!(cli.command, Command::Capture(_)) => {
            return report(err.raise(cairn_capture::error::ErrorKind::Usage("unusable configuration".to_string())));
        },
        Err(err) => return report(err),
    };

    match cli.command {
        Command::Capture(args) => commands::capture::execute(args, &config),
        Command::Backup(args) => block_on(commands::backup::execute(args, config)),
        Command::List(args) => block_on(commands::list::execute(args, config)),
        Command::Restore(args) => block_on(commands::restore::execute(args, config)),
    }
}

fn block_on(future: impl Future<Output = ExitCode>) -> ExitCode {
    match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime.block_on(future),
        Err(err) => {
            eprintln!("error: cannot start the async runtime: {err}");
            ExitCode::from(RUNTIME_FAILURE)
        },
    }
}

/// Help and version requests succeed; other parse errors use clap's status,
/// except under `capture`, where a bad invocation reports 125 so it can't be
/// mistaken for the wrapped command's own status.
fn parse_failure(err: &clap::Error, args: impl Iterator<Item = OsString>) -> ExitCode {
    let _ = err.print();
    if !err.use_stderr() {
        return ExitCode::SUCCESS;
    }
    if is_capture(args) {
        return ExitCode::from(CAPTURE_USAGE);
    }
    ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(2))
}

fn is_capture(args: impl Iterator<Item = OsString>) -> bool {
    args.take_while(|arg| arg != "--").any(|arg| arg == "capture")
}
