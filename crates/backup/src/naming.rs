//! Archive names: `<prefix><timestamp>-<fingerprint><ext>`.
//!
//! The timestamp is RFC 3339 in UTC at whole-second precision with an
//! explicit `+00:00` offset, so names under one prefix sort chronologically.

use crate::error::{ErrorKind, Result};
use crate::fingerprint::{FINGERPRINT_LEN, Fingerprint};
use cairn_archive::Codec;
use exn::ResultExt;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]+00:00");
/// `2024-01-01T00:00:00+00:00`
const TIMESTAMP_LEN: usize = 25;

/// Build the name of a new archive.
///
/// # Examples
///
/// ```
/// use cairn_archive::Codec;
/// use cairn_backup::{Fingerprint, archive_name};
/// use time::macros::datetime;
///
/// let fingerprint = Fingerprint::from_hex("ab".repeat(32)).unwrap();
/// let name = archive_name("home-", datetime!(2024-01-01 00:00:00 UTC), &fingerprint, Codec::TarGz).unwrap();
/// assert_eq!(name, format!("home-2024-01-01T00:00:00+00:00-{fingerprint}.tar.gz"));
/// ```
pub fn archive_name(prefix: &str, at: OffsetDateTime, fingerprint: &Fingerprint, codec: Codec) -> Result<String> {
    let timestamp = at
        .to_offset(UtcOffset::UTC)
        .format(TIMESTAMP_FORMAT)
        .or_raise(|| ErrorKind::Internal("cannot format archive timestamp".to_string()))?;
    Ok(format!("{prefix}{timestamp}-{fingerprint}{}", codec.extension()))
}

/// The parts of an archive name produced by [`archive_name()`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveName {
    pub created: OffsetDateTime,
    pub fingerprint: Fingerprint,
    pub codec: Codec,
}
impl ArchiveName {
    /// Parse the final component of an object key, given the name prefix it
    /// was listed under.
    ///
    /// Returns `None` for anything that isn't an archive name: foreign
    /// objects sharing the prefix are ignored rather than treated as errors.
    pub fn parse(name: &str, prefix: &str) -> Option<Self> {
        let codec = Codec::from_name(name)?;
        let stem = name.strip_prefix(prefix)?;
        let stem = stem.get(..stem.len().checked_sub(codec.extension().len())?)?;
        if stem.len() != TIMESTAMP_LEN + 1 + FINGERPRINT_LEN {
            return None;
        }
        let (timestamp, rest) = stem.split_at(TIMESTAMP_LEN);
        let fingerprint = rest.strip_prefix('-')?;
        Some(Self {
            created: PrimitiveDateTime::parse(timestamp, TIMESTAMP_FORMAT).ok()?.assume_utc(),
            fingerprint: Fingerprint::from_hex(fingerprint).ok()?,
            codec,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use time::macros::datetime;

    fn fingerprint() -> Fingerprint {
        Fingerprint::from_hex("0123456789abcdef".repeat(4)).unwrap()
    }

    #[test]
    fn test_archive_name() {
        let name = archive_name("prefix-", datetime!(2024-01-01 00:00:00 UTC), &fingerprint(), Codec::TarGz).unwrap();
        assert_eq!(name, format!("prefix-2024-01-01T00:00:00+00:00-{}.tar.gz", fingerprint()));
    }

    #[test]
    fn test_archive_name_normalises_to_utc() {
        let at = datetime!(2024-06-30 23:30:15.999 -02:00);
        let name = archive_name("", at, &fingerprint(), Codec::Tar).unwrap();
        assert!(name.starts_with("2024-07-01T01:30:15+00:00-"), "{name}");
    }

    #[test]
    fn test_names_sort_chronologically() {
        let older = archive_name("h-", datetime!(2024-01-02 09:00:00 UTC), &fingerprint(), Codec::TarGz).unwrap();
        let newer = archive_name("h-", datetime!(2024-01-10 08:00:00 UTC), &fingerprint(), Codec::TarGz).unwrap();
        assert!(older < newer);
    }

    #[test]
    fn test_parse() {
        let name = archive_name("home-", datetime!(2024-01-01 12:34:56 UTC), &fingerprint(), Codec::TarBz2).unwrap();
        let parsed = ArchiveName::parse(&name, "home-").unwrap();
        assert_eq!(parsed.created, datetime!(2024-01-01 12:34:56 UTC));
        assert_eq!(parsed.fingerprint, fingerprint());
        assert_eq!(parsed.codec, Codec::TarBz2);
    }

    #[rstest]
    #[case::other_prefix("work-2024-01-01T00:00:00+00:00-{fp}.tar.gz")]
    #[case::unknown_extension("home-2024-01-01T00:00:00+00:00-{fp}.zip")]
    #[case::short_fingerprint("home-2024-01-01T00:00:00+00:00-abc.tar.gz")]
    #[case::bad_timestamp("home-2024-13-01T00:00:00+00:00-{fp}.tar.gz")]
    #[case::missing_separator("home-2024-01-01T00:00:00+00:00_{fp}.tar.gz")]
    #[case::unrelated("home-notes.txt")]
    fn test_parse_rejects(#[case] template: &str) {
        let name = template.replace("{fp}", fingerprint().as_str());
        assert_eq!(ArchiveName::parse(&name, "home-"), None);
    }
}
