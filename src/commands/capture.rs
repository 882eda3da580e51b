use crate::cli::CaptureArgs;
use crate::commands::report;
use cairn_capture::Capture;
use cairn_config::Config;
use std::process::ExitCode;

/// Runs synchronously: the wrapped command owns the process until it exits.
pub(crate) fn execute(args: CaptureArgs, config: &Config) -> ExitCode {
    let Some((program, rest)) = args.command.split_first() else {
        return report(exn::Exn::from(cairn_capture::error::ErrorKind::Usage("no command given".to_string())));
    };
    let mut capture = Capture::new(&args.log).with_threshold(args.threshold.unwrap_or(config.capture.threshold));
    if let Some(error_log) = &args.error_log {
        capture = capture.with_error_log(error_log);
    }
    match capture.run(program, rest) {
        Ok(code) => ExitCode::from(status_byte(code)),
        Err(err) => report(err),
    }
}

/// Exit statuses are a byte wide; wider codes wrap the way the OS reports them.
fn status_byte(code: i32) -> u8 {
    (code & 0xff) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(0, 0)]
    #[case(3, 3)]
    #[case(143, 143)]
    #[case(256, 0)]
    #[case(-1, 255)]
    fn test_status_byte(#[case] code: i32, #[case] expected: u8) {
        assert_eq!(status_byte(code), expected);
    }
}
