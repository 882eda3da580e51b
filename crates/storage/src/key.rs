//! Object key validation.
//!
//! Keys are `/`-separated strings relative to the bucket root. They are
//! compared as plain strings (S3 semantics), so a prefix like `backups/home-`
//! matches `backups/home-2024-...` even though it stops mid-component.

use crate::error::{ErrorKind, Result};

/// Normalise key components, refusing anything that would leave the root.
fn components(raw: &str) -> Result<Vec<&str>> {
    let mut components = Vec::new();
    for component in raw.split('/') {
        match component {
            "" | "." => {},
            ".." => {
                if components.pop().is_none() {
                    exn::bail!(ErrorKind::InvalidKey(raw.to_string()));
                }
            },
            // Null bytes truncate paths in C-based syscalls on the local backend.
            c if c.contains('\0') => exn::bail!(ErrorKind::InvalidKey(raw.to_string())),
            c => components.push(c),
        }
    }
    Ok(components)
}

/// Validates an object key, returning its normalised form.
///
/// # Examples
///
/// ```
/// use cairn_storage::validate_key;
/// assert_eq!(validate_key("backups//./home.tar.gz").unwrap(), "backups/home.tar.gz");
/// assert_eq!(validate_key("a/b/../c").unwrap(), "a/c");
/// assert!(validate_key("../etc/passwd").is_err());
/// assert!(validate_key("").is_err());
/// assert!(validate_key("a\0b").is_err());
/// ```
pub fn validate(key: impl AsRef<str>) -> Result<String> {
    let key = key.as_ref();
    let components = components(key)?;
    if components.is_empty() {
        exn::bail!(ErrorKind::InvalidKey(key.to_string()));
    }
    Ok(components.join("/"))
}

/// Validates a listing prefix.
///
/// Unlike [`validate`], an empty prefix is allowed (list everything), and a
/// trailing `/` is preserved because it changes which keys match.
///
/// ```
/// use cairn_storage::validate_prefix;
/// assert_eq!(validate_prefix("").unwrap(), "");
/// assert_eq!(validate_prefix("backups/").unwrap(), "backups/");
/// assert_eq!(validate_prefix("backups/home-").unwrap(), "backups/home-");
/// assert!(validate_prefix("../").is_err());
/// ```
pub fn validate_prefix(prefix: impl AsRef<str>) -> Result<String> {
    let prefix = prefix.as_ref();
    let mut normalised = components(prefix)?.join("/");
    if prefix.ends_with('/') && !normalised.is_empty() {
        normalised.push('/');
    }
    Ok(normalised)
}

/// Join a (possibly empty) directory-like prefix with a name.
///
/// ```
/// use cairn_storage::join_key;
/// assert_eq!(join_key("", "a.tar.gz"), "a.tar.gz");
/// assert_eq!(join_key("backups", "a.tar.gz"), "backups/a.tar.gz");
/// assert_eq!(join_key("backups/", "a.tar.gz"), "backups/a.tar.gz");
/// ```
pub fn join(base: &str, name: &str) -> String {
    let base = base.trim_end_matches('/');
    match base.is_empty() {
        true => name.to_string(),
        false => format!("{base}/{name}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("home.tar.gz", "home.tar.gz")]
    #[case("backups/home.tar.gz", "backups/home.tar.gz")]
    #[case("/backups/home.tar.gz", "backups/home.tar.gz")]
    #[case("a//b//c", "a/b/c")]
    #[case("a/./b/./c", "a/b/c")]
    #[case("a/b/..", "a")]
    #[case("backups/", "backups")]
    fn test_valid_keys(#[case] key: &str, #[case] expected: &str) {
        assert_eq!(validate(key).unwrap(), expected);
    }

    #[rstest]
    #[case("")]
    #[case(".")]
    #[case("//")]
    #[case("..")]
    #[case("../etc/passwd")]
    #[case("a/../../b")]
    #[case("a\0b")]
    fn test_invalid_keys(#[case] key: &str) {
        assert!(validate(key).is_err());
    }

    #[rstest]
    #[case("", "")]
    #[case("/", "")]
    #[case("backups", "backups")]
    #[case("backups/", "backups/")]
    #[case("backups//", "backups/")]
    #[case("backups/home-", "backups/home-")]
    #[case("./backups/./home-", "backups/home-")]
    fn test_prefixes(#[case] prefix: &str, #[case] expected: &str) {
        assert_eq!(validate_prefix(prefix).unwrap(), expected);
    }

    #[test]
    fn test_prefix_traversal() {
        assert!(validate_prefix("..").is_err());
        assert!(validate_prefix("a/../../").is_err());
    }
}
