//! Archive Operations

use crate::Codec;
use crate::error::{ErrorKind, Result};
use bzip2::{Compression as BzCompression, read::BzDecoder, write::BzEncoder};
use exn::ResultExt;
use flate2::{Compression as GzCompression, read::GzDecoder, write::GzEncoder};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::instrument;
#[cfg(feature = "xz")]
use xz2::{read::XzDecoder, write::XzEncoder};
#[cfg(feature = "zstd")]
use zstd::stream::{read::Decoder as ZstdDecoder, write::Encoder as ZstdEncoder};

// Backups are written once and kept for a long time, so favour size. Zstd
// stops short of its `--ultra` levels, which need far more memory to decode.
const BZIP2_LEVEL: BzCompression = BzCompression::best();
const GZIP_LEVEL: GzCompression = GzCompression::best();
#[cfg(feature = "xz")]
const XZ_LEVEL: u32 = 9;
#[cfg(feature = "zstd")]
const ZSTD_LEVEL: i32 = 19;
/// Enough of the file to recognise every supported format.
const SNIFF_LENGTH: u64 = 512;

/// Stream `source` into a tar archive written to `writer`, handing the writer
/// back so compressed formats can be finished.
fn write_tar<W: Write>(source: &Path, writer: W) -> Result<W> {
    let mut builder = tar::Builder::new(writer);
    // Store symlinks as links; following them could pull in data from
    // outside the tree (or loop forever).
    builder.follow_symlinks(false);
    builder.append_dir_all(".", source).or_raise(|| ErrorKind::Io)?;
    builder.into_inner().or_raise(|| ErrorKind::Io)
}

impl Codec {
    /// Pack the directory tree at `source` into a new archive at `dest`.
    ///
    /// Entry paths are relative to `source`. An existing file at `dest` is
    /// truncated. Returns the size of the finished archive in bytes.
    ///
    /// # Examples
    ///
    /// ```
    /// use cairn_archive::Codec;
    ///
    /// let tree = tempfile::tempdir().unwrap();
    /// std::fs::write(tree.path().join("a.txt"), "x").unwrap();
    /// let out = tempfile::tempdir().unwrap();
    /// let dest = out.path().join(format!("tree{}", Codec::TarGz.extension()));
    /// let size = Codec::TarGz.create(tree.path(), &dest).unwrap();
    /// assert_eq!(size, std::fs::metadata(&dest).unwrap().len());
    /// ```
    #[instrument(skip_all, fields(codec = %self, source = %source.display(), size))]
    pub fn create(&self, source: &Path, dest: &Path) -> Result<u64> {
        if !source.is_dir() {
            exn::bail!(ErrorKind::NotADirectory(source.to_path_buf()));
        }
        let file = File::create(dest).or_raise(|| ErrorKind::Io)?;
        let file = match self {
            Codec::Tar => write_tar(source, file)?,
            Codec::TarGz => write_tar(source, GzEncoder::new(file, GZIP_LEVEL))?.finish().or_raise(|| ErrorKind::Io)?,
            Codec::TarBz2 => write_tar(source, BzEncoder::new(file, BZIP2_LEVEL))?.finish().or_raise(|| ErrorKind::Io)?,
            #[cfg(feature = "xz")]
            Codec::TarXz => write_tar(source, XzEncoder::new(file, XZ_LEVEL))?.finish().or_raise(|| ErrorKind::Io)?,
            #[cfg(feature = "zstd")]
            Codec::TarZstd => {
                let encoder = ZstdEncoder::new(file, ZSTD_LEVEL).or_raise(|| ErrorKind::Encoder)?;
                write_tar(source, encoder)?.finish().or_raise(|| ErrorKind::Io)?
            },
        };
        file.sync_all().or_raise(|| ErrorKind::Io)?;
        let size = file.metadata().or_raise(|| ErrorKind::Io)?.len();
        tracing::Span::current().record("size", size);
        Ok(size)
    }

    /// Unpack the archive at `archive` into the directory `dest`.
    ///
    /// Entries that would be written outside `dest` (absolute paths, `..`)
    /// are skipped. Returns the number of entries unpacked.
    #[instrument(skip_all, fields(codec = %self, archive = %archive.display(), entries))]
    pub fn extract(&self, archive: &Path, dest: &Path) -> Result<u64> {
        let mut file = File::open(archive).or_raise(|| ErrorKind::Io)?;
        let mut head = Vec::with_capacity(SNIFF_LENGTH as usize);
        Read::by_ref(&mut file).take(SNIFF_LENGTH).read_to_end(&mut head).or_raise(|| ErrorKind::Io)?;
        if !self.check_magic_bytes(&head) {
            exn::bail!(ErrorKind::InvalidData);
        }
        file.seek(SeekFrom::Start(0)).or_raise(|| ErrorKind::Io)?;

        let mut unpacker = tar::Archive::new(self.wrap_reader(file)?);
        unpacker.set_preserve_mtime(true);
        let mut count = 0;
        for entry in unpacker.entries().or_raise(|| ErrorKind::InvalidData)? {
            let mut entry = entry.or_raise(|| ErrorKind::InvalidData)?;
            if entry.unpack_in(dest).or_raise(|| ErrorKind::Io)? {
                count += 1;
            } else {
                let path = entry.path().map(|p| p.display().to_string()).unwrap_or_default();
                tracing::warn!(path = %path, "Skipped archive entry outside of the destination");
            }
        }
        tracing::Span::current().record("entries", count);
        Ok(count)
    }

    /// Wrap a reader with the appropriate decompression layer.
    fn wrap_reader<'a, R: Read + 'a>(&self, reader: R) -> Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Codec::Tar => Box::new(reader),
            Codec::TarGz => Box::new(GzDecoder::new(reader)),
            Codec::TarBz2 => Box::new(BzDecoder::new(reader)),
            #[cfg(feature = "xz")]
            Codec::TarXz => Box::new(XzDecoder::new(reader)),
            #[cfg(feature = "zstd")]
            Codec::TarZstd => Box::new(ZstdDecoder::new(reader).or_raise(|| ErrorKind::Encoder)?),
        })
    }
}
