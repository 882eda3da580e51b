//! Restoring archives from the ledger.

use crate::Backup;
use crate::error::{ErrorKind, Result};
use crate::fingerprint::{FINGERPRINT_LEN, Fingerprint};
use crate::ledger::find_existing;
use crate::naming::ArchiveName;
use crate::plan::Location;
use cairn_storage::ObjectInfo;
use exn::{OptionExt, ResultExt};
use std::path::Path;
use tracing::instrument;

/// Which archive to restore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Selector {
    /// The archive with the latest timestamp.
    #[default]
    Newest,
    /// The newest archive whose fingerprint starts with these hex digits.
    Fingerprint(String),
}
impl Selector {
    /// Select by a full fingerprint or an unambiguous leading part of one.
    pub fn fingerprint(hex: &str) -> Result<Self> {
        let hex = hex.to_ascii_lowercase();
        if hex.is_empty() || hex.len() > FINGERPRINT_LEN || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            exn::bail!(ErrorKind::Config(format!("{hex:?} is not a fingerprint")));
        }
        Ok(Self::Fingerprint(hex))
    }
}

/// What [`Backup::restore()`] unpacked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Restored {
    pub key: String,
    pub fingerprint: Fingerprint,
    /// Size of the downloaded archive in bytes.
    pub size: u64,
    pub entries: u64,
    /// Whether the restored tree was re-fingerprinted and matched.
    pub verified: bool,
}

/// Pick an archive out of a ledger listing.
///
/// Objects whose names don't parse as archive names are ignored.
pub fn select(objects: &[ObjectInfo], location: &Location, selector: &Selector) -> Result<(ObjectInfo, ArchiveName)> {
    let mut archives: Vec<(&ObjectInfo, ArchiveName)> = objects
        .iter()
        .filter_map(|info| ArchiveName::parse(info.name(), location.prefix()).map(|parsed| (info, parsed)))
        .collect();
    if let Selector::Fingerprint(hex) = selector {
        archives.retain(|(_, parsed)| parsed.fingerprint.as_str().starts_with(hex.as_str()));
        let first = archives.first().map(|(_, parsed)| parsed.fingerprint.clone());
        if archives.iter().any(|(_, parsed)| Some(&parsed.fingerprint) != first.as_ref()) {
            exn::bail!(ErrorKind::Config(format!("fingerprint {hex:?} matches more than one backup")));
        }
    }
    // Names share a prefix and a fixed-width timestamp, so the greatest key is
    // the newest archive.
    archives
        .into_iter()
        .max_by(|a, b| a.0.key.cmp(&b.0.key))
        .map(|(info, parsed)| (info.clone(), parsed))
        .ok_or_raise(|| ErrorKind::Config(format!("no matching archive under {:?}", location.key_prefix())))
}

impl Backup {
    /// Download an archive from `location` and unpack it into `dest`.
    ///
    /// `dest` must be empty if it exists. A missing `dest` is only created
    /// once the archive has been downloaded, and removed again if unpacking
    /// fails. With `verify`, the restored tree is fingerprinted again and must
    /// match the fingerprint in the archive's name.
    #[instrument(skip_all, fields(backend = self.backend.name(), prefix = %location.key_prefix(), dest = %dest.display()))]
    pub async fn restore(&self, location: &Location, selector: &Selector, dest: &Path, verify: bool) -> Result<Restored> {
        let objects = find_existing(self.backend.as_ref(), location).await?;
        let (object, archive) = select(&objects, location, selector)?;
        tracing::info!(key = %object.key, size = object.size, "Restoring archive");
        let create = check_destination(dest).await?;

        let workdir = self.workdir()?;
        let local = workdir.join(object.name());
        self.backend.download(&object.key, &local).await.or_raise(|| ErrorKind::Transfer)?;

        if create {
            tokio::fs::create_dir_all(dest).await.or_raise(|| ErrorKind::Io)?;
        }
        let codec = archive.codec;
        let target = dest.to_path_buf();
        let extracted = tokio::task::spawn_blocking(move || codec.extract(&local, &target))
            .await
            .or_raise(|| ErrorKind::Internal("extraction task failed".to_string()))
            .and_then(|result| result.or_raise(|| ErrorKind::Archive));
        let entries = match extracted {
            Ok(entries) => entries,
            Err(err) => {
                if create && let Err(cleanup) = tokio::fs::remove_dir_all(dest).await {
                    tracing::warn!(error = %cleanup, "Could not remove the partially restored directory");
                }
                return Err(err);
            },
        };
        if let Err(err) = workdir.close() {
            tracing::warn!(error = ?err, "Could not remove the working directory");
        }

        if verify {
            let actual = self.fingerprint(dest).await?;
            if actual != archive.fingerprint {
                exn::bail!(ErrorKind::Internal(format!(
                    "restored tree fingerprints as {actual}, archive name says {}",
                    archive.fingerprint
                )));
            }
            tracing::info!(fingerprint = %actual, "Restored tree verified");
        }
        Ok(Restored {
            key: object.key,
            fingerprint: archive.fingerprint,
            size: object.size,
            entries,
            verified: verify,
        })
    }
}

/// Check that `dest` is usable, returning whether it still has to be created.
async fn check_destination(dest: &Path) -> Result<bool> {
    match tokio::fs::metadata(dest).await {
        Ok(meta) if meta.is_dir() => {
            let mut entries = tokio::fs::read_dir(dest).await.or_raise(|| ErrorKind::Io)?;
            if entries.next_entry().await.or_raise(|| ErrorKind::Io)?.is_some() {
                exn::bail!(ErrorKind::Config(format!("restore destination {} is not empty", dest.display())));
            }
            Ok(false)
        },
        Ok(_) => exn::bail!(ErrorKind::Config(format!("restore destination {} is not a directory", dest.display()))),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(true),
        Err(err) => Err(err).or_raise(|| ErrorKind::Io),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BackupPlan, Outcome};
    use cairn_archive::Codec;
    use cairn_storage::StorageBackend;
    use cairn_storage::backend::MockBackend;
    use rstest::rstest;
    use std::fs;
    use std::sync::Arc;
    use time::macros::datetime;

    fn location() -> Location {
        Location::new("backups", "home-").unwrap()
    }

    fn key(day: u8, fingerprint: &str) -> String {
        format!("backups/home-2024-01-{day:02}T00:00:00+00:00-{fingerprint}.tar.gz")
    }

    fn objects(keys: &[String]) -> Vec<ObjectInfo> {
        keys.iter().map(|key| ObjectInfo::new(key.clone(), 1, time::OffsetDateTime::UNIX_EPOCH)).collect()
    }

    #[rstest]
    #[case("ABC", "abc")]
    #[case("0", "0")]
    fn test_selector_fingerprint(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(Selector::fingerprint(input).unwrap(), Selector::Fingerprint(expected.to_string()));
    }

    #[rstest]
    #[case("")]
    #[case("xyz")]
    #[case(&"a".repeat(65))]
    fn test_selector_fingerprint_invalid(#[case] input: &str) {
        let err = Selector::fingerprint(input).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Config(_)));
    }

    #[test]
    fn test_select_newest_ignores_foreign_objects() {
        let a = "a".repeat(64);
        let b = "b".repeat(64);
        let keys = objects(&[key(1, &a), key(3, &b), "backups/home-notes.txt".to_string()]);
        let (selected, parsed) = select(&keys, &location(), &Selector::Newest).unwrap();
        assert_eq!(selected.key, key(3, &b));
        assert_eq!(parsed.fingerprint.as_str(), b);
    }

    #[test]
    fn test_select_by_fingerprint_prefix() {
        let a = "a".repeat(64);
        let b = "b".repeat(64);
        let keys = objects(&[key(1, &a), key(2, &b), key(3, &a)]);
        let (selected, _) = select(&keys, &location(), &Selector::fingerprint("bbb").unwrap()).unwrap();
        assert_eq!(selected.key, key(2, &b));
        // Duplicates of one fingerprint resolve to the newest copy.
        let (selected, _) = select(&keys, &location(), &Selector::fingerprint(&a).unwrap()).unwrap();
        assert_eq!(selected.key, key(3, &a));
    }

    #[test]
    fn test_select_ambiguous_prefix() {
        let one = format!("a{}", "1".repeat(63));
        let two = format!("a{}", "2".repeat(63));
        let keys = objects(&[key(1, &one), key(2, &two)]);
        let err = select(&keys, &location(), &Selector::fingerprint("a").unwrap()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Config(_)));
    }

    #[rstest]
    #[case::empty(vec![])]
    #[case::no_match(vec![key(1, &"a".repeat(64))])]
    fn test_select_nothing(#[case] keys: Vec<String>) {
        let err = select(&objects(&keys), &location(), &Selector::fingerprint("b").unwrap()).unwrap_err();
        assert!(matches!(&*err, ErrorKind::Config(_)));
    }

    struct Fixture {
        temp: tempfile::TempDir,
        mock: Arc<MockBackend>,
    }
    impl Fixture {
        async fn with_backups(versions: &[&str]) -> Self {
            let temp = tempfile::tempdir().unwrap();
            let mock = Arc::new(MockBackend::default());
            let source = temp.path().join("home");
            fs::create_dir_all(source.join("nested")).unwrap();
            for (day, content) in versions.iter().enumerate() {
                fs::write(source.join("nested/a.txt"), content).unwrap();
                let plan = BackupPlan::new(&source, "backups", None, Codec::TarGz).unwrap();
                let at = datetime!(2024-01-01 00:00:00 UTC) + time::Duration::days(day as i64);
                let outcome = Backup::new(mock.clone()).run_at(&plan, at).await.unwrap();
                assert!(matches!(outcome, Outcome::Uploaded { .. }));
            }
            Self { temp, mock }
        }

        fn backup(&self) -> Backup {
            Backup::new(self.mock.clone())
        }
    }

    #[tokio::test]
    async fn test_restore_newest() {
        let fixture = Fixture::with_backups(&["first", "second"]).await;
        let dest = fixture.temp.path().join("restored");
        let restored = fixture.backup().restore(&location(), &Selector::Newest, &dest, true).await.unwrap();
        assert!(restored.verified);
        assert!(restored.key.starts_with("backups/home-2024-01-02"));
        assert!(restored.size > 0);
        assert_eq!(fs::read_to_string(dest.join("nested/a.txt")).unwrap(), "second");
    }

    #[tokio::test]
    async fn test_restore_by_fingerprint() {
        let fixture = Fixture::with_backups(&["first", "second"]).await;
        let keys = fixture.mock.keys().await;
        let oldest = ArchiveName::parse(keys[0].rsplit('/').next().unwrap(), "home-").unwrap();
        let selector = Selector::fingerprint(&oldest.fingerprint.as_str()[..12]).unwrap();
        let dest = fixture.temp.path().join("restored");
        let restored = fixture.backup().restore(&location(), &selector, &dest, false).await.unwrap();
        assert_eq!(restored.fingerprint, oldest.fingerprint);
        assert!(!restored.verified);
        assert_eq!(fs::read_to_string(dest.join("nested/a.txt")).unwrap(), "first");
    }

    #[tokio::test]
    async fn test_restore_into_non_empty_directory() {
        let fixture = Fixture::with_backups(&["first"]).await;
        let dest = fixture.temp.path().join("restored");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("existing"), "keep me").unwrap();
        let err = fixture.backup().restore(&location(), &Selector::Newest, &dest, false).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Config(_)));
        assert_eq!(fs::read_to_string(dest.join("existing")).unwrap(), "keep me");
    }

    #[tokio::test]
    async fn test_restore_verify_detects_mismatch() {
        let fixture = Fixture::with_backups(&["first"]).await;
        let key = fixture.mock.keys().await.remove(0);
        // Same archive contents, filed under someone else's fingerprint.
        let forged = key.replace(&key[key.len() - 71..key.len() - 7], &"c".repeat(64));
        let copy = fixture.temp.path().join("copy.tar.gz");
        fs::write(&copy, fixture.mock.contents(&key).await.unwrap()).unwrap();
        let forged_only = MockBackend::default();
        forged_only.upload(&forged, &copy).await.unwrap();

        let dest = fixture.temp.path().join("restored");
        let err = Backup::new(Arc::new(forged_only)).restore(&location(), &Selector::Newest, &dest, true).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Internal(_)));
    }

    #[tokio::test]
    async fn test_restore_corrupt_archive_removes_destination() {
        let fixture = Fixture::with_backups(&["first"]).await;
        let key = fixture.mock.keys().await.remove(0);
        let corrupt = MockBackend::with_objects([(key, b"not an archive".to_vec())]);
        let dest = fixture.temp.path().join("restored");
        let err = Backup::new(Arc::new(corrupt)).restore(&location(), &Selector::Newest, &dest, false).await.unwrap_err();
        assert_eq!(*err, ErrorKind::Archive);
        assert!(!dest.exists());
    }
}
