//! Size-triggered rotation of a log file pair.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::ffi::OsString;
use std::fs;
use std::io::ErrorKind as IoErrorKind;
use std::path::{Path, PathBuf};

/// Combined size at which logs are rotated (10 MiB).
pub const DEFAULT_THRESHOLD: u64 = 10 * 1024 * 1024;

/// The rotation sibling of a log file: `<path>.old`.
///
/// ```
/// use cairn_capture::old_path;
/// use std::path::Path;
/// assert_eq!(old_path(Path::new("/var/log/backup.log")), Path::new("/var/log/backup.log.old"));
/// ```
pub fn old_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".old");
    PathBuf::from(name)
}

fn size(path: &Path) -> Result<u64> {
    match fs::metadata(path) {
        Ok(meta) => Ok(meta.len()),
        Err(err) if err.kind() == IoErrorKind::NotFound => Ok(0),
        Err(err) => Err(err).or_raise(|| ErrorKind::Io),
    }
}

/// Rotate `primary` (and `error`, if given) when their combined size has
/// reached `threshold`.
///
/// Each file is renamed to its [`old_path()`], replacing any earlier `.old`
/// file; the primary log goes first. The pair always rotates together so the
/// current and `.old` generations cover the same runs. Nothing happens while
/// the primary log doesn't exist. Returns whether rotation happened.
pub fn rotate_if_needed(primary: &Path, error: Option<&Path>, threshold: u64) -> Result<bool> {
    if !primary.exists() {
        return Ok(false);
    }
    let mut total = size(primary)?;
    if let Some(error) = error {
        total += size(error)?;
    }
    if total < threshold {
        tracing::trace!(total, threshold, "Logs below rotation threshold");
        return Ok(false);
    }
    for path in std::iter::once(primary).chain(error) {
        match fs::rename(path, old_path(path)) {
            Ok(()) => {},
            // An error log that was never written has nothing to rotate.
            Err(err) if err.kind() == IoErrorKind::NotFound => continue,
            Err(err) => return Err(err).or_raise(|| ErrorKind::Io),
        }
    }
    tracing::info!(total, threshold, log = %primary.display(), "Rotated logs");
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::below(99, false)]
    #[case::at(100, true)]
    #[case::above(101, true)]
    fn test_threshold(#[case] bytes: usize, #[case] rotated: bool) {
        let temp = tempfile::tempdir().unwrap();
        let log = temp.path().join("run.log");
        fs::write(&log, vec![b'x'; bytes]).unwrap();
        assert_eq!(rotate_if_needed(&log, None, 100).unwrap(), rotated);
        assert_eq!(log.exists(), !rotated);
        assert_eq!(old_path(&log).exists(), rotated);
    }

    #[test]
    fn test_combined_size_rotates_both() {
        let temp = tempfile::tempdir().unwrap();
        let log = temp.path().join("run.log");
        let err = temp.path().join("run.err");
        fs::write(&log, vec![b'o'; 60]).unwrap();
        fs::write(&err, vec![b'e'; 40]).unwrap();
        assert!(rotate_if_needed(&log, Some(&err), 100).unwrap());
        assert!(!log.exists() && !err.exists());
        assert_eq!(fs::read(old_path(&log)).unwrap().len(), 60);
        assert_eq!(fs::read(old_path(&err)).unwrap().len(), 40);
    }

    #[test]
    fn test_overwrites_previous_old() {
        let temp = tempfile::tempdir().unwrap();
        let log = temp.path().join("run.log");
        fs::write(old_path(&log), "ancient").unwrap();
        fs::write(&log, "recent").unwrap();
        assert!(rotate_if_needed(&log, None, 1).unwrap());
        assert_eq!(fs::read_to_string(old_path(&log)).unwrap(), "recent");
    }

    #[test]
    fn test_missing_primary() {
        let temp = tempfile::tempdir().unwrap();
        let err = temp.path().join("run.err");
        fs::write(&err, vec![b'e'; 500]).unwrap();
        assert!(!rotate_if_needed(&temp.path().join("run.log"), Some(&err), 100).unwrap());
        assert!(err.exists());
    }

    #[test]
    fn test_missing_error_log() {
        let temp = tempfile::tempdir().unwrap();
        let log = temp.path().join("run.log");
        let err = temp.path().join("run.err");
        fs::write(&log, vec![b'o'; 500]).unwrap();
        assert!(rotate_if_needed(&log, Some(&err), 100).unwrap());
        assert!(old_path(&log).exists());
        assert!(!old_path(&err).exists());
    }
}
