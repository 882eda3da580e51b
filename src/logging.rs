use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Environment variable holding a `tracing` filter directive.
pub(crate) const LOG_ENV: &str = "CAIRN_LOG";

/// Default level for a `-v`/`-q` balance: positive is more verbose.
fn default_level(verbosity: i8) -> &'static str {
    match verbosity {
        i8::MIN..=-2 => "error",
        -1 => "warn",
        0 => "info",
        1 => "debug",
        2..=i8::MAX => "trace",
    }
}

/// Install the global subscriber: human-readable events on stderr, filtered
/// by `CAIRN_LOG`, then `RUST_LOG`, then the verbosity flags.
///
/// Stdout stays free for command output.
pub(crate) fn init(verbosity: i8) {
    let filter = EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level(verbosity)));
    // A second initialisation (only possible in tests) keeps the first.
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(filter)
        .try_init();
}
