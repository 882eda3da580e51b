//! Content fingerprints of directory trees.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::fs::File;
use std::path::{Component, Path};
use tracing::instrument;
use walkdir::WalkDir;

/// Length of a fingerprint in hexadecimal characters (256 bits).
pub const FINGERPRINT_LEN: usize = 64;

/// Lowercase hex digest identifying the contents of a directory tree.
///
/// Only constructible through [`from_hex()`](Self::from_hex), so a value in
/// hand is always exactly [`FINGERPRINT_LEN`] lowercase hex characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);
impl Fingerprint {
    /// Validate a hex digest.
    ///
    /// Anything other than 64 lowercase hex characters is an
    /// [`Internal`](ErrorKind::Internal) error: fingerprints only ever come
    /// from a hash function, so a bad one means the hasher is broken.
    pub fn from_hex(hex: impl Into<String>) -> Result<Self> {
        let hex = hex.into();
        if hex.len() != FINGERPRINT_LEN || !hex.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            exn::bail!(ErrorKind::Internal(format!("malformed fingerprint {hex:?}")));
        }
        Ok(Self(hex))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}
impl AsRef<str> for Fingerprint {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Computes the [`Fingerprint`] of a directory tree.
///
/// Implementations are blocking; async callers should run them on the
/// blocking thread pool.
pub trait Fingerprinter: Send + Sync {
    fn fingerprint(&self, root: &Path) -> Result<Fingerprint>;
}

/// BLAKE3 fingerprints over relative paths and file contents.
///
/// Each regular file is hashed on its own, with its `/`-separated relative
/// path and a NUL byte ahead of the contents. The per-file digests are sorted
/// and the concatenation is hashed again. The result depends only on the set
/// of (path, content) pairs: not on traversal order, timestamps, permissions
/// or ownership. Renaming a file changes it.
///
/// Symlinks are not followed and, like empty directories, contribute
/// nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct Blake3Fingerprinter;

impl Fingerprinter for Blake3Fingerprinter {
    #[instrument(skip_all, fields(root = %root.display(), files))]
    fn fingerprint(&self, root: &Path) -> Result<Fingerprint> {
        let mut digests = Vec::new();
        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.or_raise(|| ErrorKind::Io)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry.path().strip_prefix(root).or_raise(|| ErrorKind::Internal("walked outside of the root".to_string()))?;
            digests.push(hash_file(entry.path(), &normalise(relative))?);
        }
        digests.sort_unstable();
        tracing::Span::current().record("files", digests.len());

        let mut hasher = blake3::Hasher::new();
        for digest in &digests {
            hasher.update(digest.as_bytes());
        }
        Fingerprint::from_hex(hasher.finalize().to_hex().as_str())
    }
}

/// Relative path with `/` separators regardless of platform.
///
/// Raw name bytes are kept, so names that aren't valid UTF-8 stay distinct.
fn normalise(relative: &Path) -> Vec<u8> {
    let parts: Vec<&[u8]> = relative
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.as_encoded_bytes()),
            _ => None,
        })
        .collect();
    parts.join(&b'/')
}

fn hash_file(path: &Path, relative: &[u8]) -> Result<String> {
    let mut file = File::open(path).or_raise(|| ErrorKind::Io)?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(relative);
    hasher.update(&[0]);
    hasher.update_reader(&mut file).or_raise(|| ErrorKind::Io)?;
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::fs;

    fn tree(root: &Path, files: &[(&str, &str)]) {
        for (path, content) in files {
            let path = root.join(path);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
    }

    fn fingerprint(files: &[(&str, &str)]) -> Fingerprint {
        let temp = tempfile::tempdir().unwrap();
        tree(temp.path(), files);
        Blake3Fingerprinter.fingerprint(temp.path()).unwrap()
    }

    #[test]
    fn test_deterministic() {
        let temp = tempfile::tempdir().unwrap();
        tree(temp.path(), &[("a.txt", "x"), ("b.txt", "y"), ("nested/c.txt", "z")]);
        let first = Blake3Fingerprinter.fingerprint(temp.path()).unwrap();
        let second = Blake3Fingerprinter.fingerprint(temp.path()).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.as_str().len(), FINGERPRINT_LEN);
    }

    #[test]
    fn test_independent_of_creation_order() {
        let forwards = fingerprint(&[("a.txt", "x"), ("b.txt", "y"), ("z/z.txt", "z")]);
        let backwards = fingerprint(&[("z/z.txt", "z"), ("b.txt", "y"), ("a.txt", "x")]);
        assert_eq!(forwards, backwards);
    }

    #[test]
    fn test_independent_of_location() {
        // Only relative paths are hashed, so the same tree elsewhere matches.
        let temp = tempfile::tempdir().unwrap();
        tree(&temp.path().join("one"), &[("a.txt", "x")]);
        tree(&temp.path().join("deeper/two"), &[("a.txt", "x")]);
        assert_eq!(
            Blake3Fingerprinter.fingerprint(&temp.path().join("one")).unwrap(),
            Blake3Fingerprinter.fingerprint(&temp.path().join("deeper/two")).unwrap(),
        );
    }

    #[rstest]
    #[case::content(&[("a.txt", "z"), ("b.txt", "y")])]
    #[case::rename(&[("c.txt", "x"), ("b.txt", "y")])]
    #[case::move_into_directory(&[("dir/a.txt", "x"), ("b.txt", "y")])]
    #[case::added(&[("a.txt", "x"), ("b.txt", "y"), ("c.txt", "")])]
    #[case::removed(&[("a.txt", "x")])]
    #[case::swapped_contents(&[("a.txt", "y"), ("b.txt", "x")])]
    fn test_sensitive_to_changes(#[case] changed: &[(&str, &str)]) {
        let original = fingerprint(&[("a.txt", "x"), ("b.txt", "y")]);
        assert_ne!(original, fingerprint(changed));
    }

    #[test]
    fn test_empty_directories_do_not_contribute() {
        let temp = tempfile::tempdir().unwrap();
        tree(temp.path(), &[("a.txt", "x")]);
        let before = Blake3Fingerprinter.fingerprint(temp.path()).unwrap();
        fs::create_dir_all(temp.path().join("empty/deeper")).unwrap();
        assert_eq!(before, Blake3Fingerprinter.fingerprint(temp.path()).unwrap());
    }

    #[test]
    fn test_empty_tree() {
        let empty = fingerprint(&[]);
        assert_eq!(empty.as_str(), blake3::hash(b"").to_hex().as_str());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_are_ignored() {
        let temp = tempfile::tempdir().unwrap();
        tree(temp.path(), &[("a.txt", "x")]);
        let before = Blake3Fingerprinter.fingerprint(temp.path()).unwrap();
        std::os::unix::fs::symlink(temp.path().join("a.txt"), temp.path().join("link")).unwrap();
        assert_eq!(before, Blake3Fingerprinter.fingerprint(temp.path()).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_rename_between_non_utf8_names() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let temp = tempfile::tempdir().unwrap();
        let first = temp.path().join(OsStr::from_bytes(b"\xff.txt"));
        fs::write(&first, "x").unwrap();
        let before = Blake3Fingerprinter.fingerprint(temp.path()).unwrap();
        fs::rename(&first, temp.path().join(OsStr::from_bytes(b"\xfe.txt"))).unwrap();
        assert_ne!(before, Blake3Fingerprinter.fingerprint(temp.path()).unwrap());
    }

    #[test]
    fn test_normalise_joins_with_slash() {
        assert_eq!(normalise(&Path::new("nested").join("deeper").join("c.txt")), b"nested/deeper/c.txt");
    }

    #[test]
    fn test_missing_root() {
        let temp = tempfile::tempdir().unwrap();
        let err = Blake3Fingerprinter.fingerprint(&temp.path().join("missing")).unwrap_err();
        assert_eq!(*err, ErrorKind::Io);
    }

    #[rstest]
    #[case("")]
    #[case("abc")]
    #[case(&"A".repeat(64))]
    #[case(&"g".repeat(64))]
    #[case(&"a".repeat(65))]
    fn test_from_hex_rejects_malformed(#[case] hex: &str) {
        let err = Fingerprint::from_hex(hex).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Internal(_)));
    }

    #[test]
    fn test_from_hex_accepts_digest() {
        let hex = "0123456789abcdef".repeat(4);
        assert_eq!(Fingerprint::from_hex(hex.clone()).unwrap().to_string(), hex);
    }
}
