use crate::error::{ErrorKind, Result};
use crate::rotate::{DEFAULT_THRESHOLD, rotate_if_needed};
use exn::ResultExt;
use std::ffi::{OsStr, OsString};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind as IoErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Runs a command with its output appended to log files.
///
/// Before the command starts, the logs are rotated if they have grown past
/// the threshold. A timestamped header goes in front of the command's output
/// and a footer with its exit status after it.
///
/// With only a primary log, stdout and stderr are interleaved into it. With
/// a separate error log, stdout goes to the primary log, stderr to the error
/// log, and the header and footer are written to both and echoed to this
/// process's stderr.
///
/// # Examples
///
/// ```no_run
/// use cairn_capture::Capture;
///
/// let code = Capture::new("/var/log/cairn/backup.log")
///     .with_error_log("/var/log/cairn/backup.err")
///     .run("cairn", ["backup", "/home/me", "--bucket", "s3://backups"])
///     .unwrap();
/// std::process::exit(code);
/// ```
#[derive(Debug, Clone)]
pub struct Capture {
    log: PathBuf,
    error_log: Option<PathBuf>,
    threshold: u64,
}
impl Capture {
    pub fn new(log: impl Into<PathBuf>) -> Self {
        Self {
            log: log.into(),
            error_log: None,
            threshold: DEFAULT_THRESHOLD,
        }
    }

    pub fn with_error_log(mut self, path: impl Into<PathBuf>) -> Self {
        self.error_log = Some(path.into());
        self
    }

    /// Combined log size (in bytes) that triggers rotation.
    pub fn with_threshold(mut self, bytes: u64) -> Self {
        self.threshold = bytes;
        self
    }

    /// Run `program` to completion and return its exit code.
    ///
    /// A command killed by a signal reports `128 + signal`, as shells do.
    /// Errors are only returned when the command never ran; see
    /// [`ErrorKind::exit_code()`](crate::error::ErrorKind::exit_code).
    #[tracing::instrument(skip_all, fields(log = %self.log.display(), program = ?program.as_ref()))]
    pub fn run<I, S>(&self, program: impl AsRef<OsStr>, args: I) -> Result<i32>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let program = program.as_ref();
        if program.is_empty() {
            exn::bail!(ErrorKind::Usage("no command given".to_string()));
        }
        let args: Vec<OsString> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
        let resolved = resolve(program)?;

        rotate_if_needed(&self.log, self.error_log.as_deref(), self.threshold)?;
        let mut log = open_log(&self.log)?;
        let mut error_log = self.error_log.as_deref().map(open_log).transpose()?;

        let description = describe(program, &args);
        announce(&mut log, error_log.as_mut(), &format!("started: {description}"))?;

        let stdout = log.try_clone().or_raise(|| ErrorKind::Io)?;
        let stderr = match &error_log {
            Some(file) => file.try_clone(),
            None => log.try_clone(),
        }
        .or_raise(|| ErrorKind::Io)?;
        let status = Command::new(&resolved)
            .args(&args)
            .stdin(Stdio::inherit())
            .stdout(stdout)
            .stderr(stderr)
            .status()
            .map_err(|err| match err.kind() {
                IoErrorKind::NotFound => ErrorKind::NotFound(program.to_string_lossy().into_owned()),
                _ => ErrorKind::CannotExecute(format!("{}: {err}", resolved.display())),
            })?;

        let code = exit_code(status);
        tracing::debug!(code, "Command finished");
        Ok(finish(&mut log, error_log.as_mut(), &description, code))
    }
}

/// Write the footer and hand back `code`. The command has already run, so a
/// log that can no longer be written to is logged rather than reported in
/// place of the command's own status.
fn finish(log: &mut File, error_log: Option<&mut File>, description: &str, code: i32) -> i32 {
    if let Err(err) = announce(log, error_log, &format!("finished: {description} (exit status {code})")) {
        tracing::error!(error = ?err, "Could not write the log footer");
    }
    code
}

/// Find the executable the same way a shell would: paths containing a
/// separator are used as given, bare names are searched for on `PATH`.
fn resolve(program: &OsStr) -> Result<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 {
        if !path.exists() {
            exn::bail!(ErrorKind::NotFound(path.display().to_string()));
        }
        return Ok(path.to_path_buf());
    }
    match which::which(program) {
        Ok(found) => Ok(found),
        // `which` skips matches that aren't executable; report those as such.
        Err(_) if path.exists() && !path.is_dir() => exn::bail!(ErrorKind::CannotExecute(path.display().to_string())),
        Err(_) => exn::bail!(ErrorKind::NotFound(program.to_string_lossy().into_owned())),
    }
}

/// Write a timestamped marker line to the primary log, and to the error log
/// and the terminal when there is a separate error log.
fn announce(log: &mut File, error_log: Option<&mut File>, message: &str) -> Result<()> {
    let line = format!("[{}] {message}\n", timestamp());
    log.write_all(line.as_bytes()).or_raise(|| ErrorKind::Io)?;
    if let Some(error_log) = error_log {
        error_log.write_all(line.as_bytes()).or_raise(|| ErrorKind::Io)?;
        eprint!("{line}");
    }
    Ok(())
}

fn open_log(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).or_raise(|| ErrorKind::Io)?;
    }
    OpenOptions::new().create(true).append(true).open(path).or_raise(|| ErrorKind::Io)
}

fn describe(program: &OsStr, args: &[OsString]) -> String {
    std::iter::once(program)
        .chain(args.iter().map(OsString::as_os_str))
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}

fn timestamp() -> String {
    OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_else(|_| "unknown time".to_string())
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status.code().or_else(|| status.signal().map(|signal| 128 + signal)).unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
