use crate::Codec;
use crate::error::{Error, ErrorKind};
use std::str::FromStr;

const BZIP2_MAGIC: [u8; 3] = [0x42, 0x5A, 0x68];
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
#[cfg(feature = "xz")]
const XZ_MAGIC: [u8; 6] = [0xFD, 0x37, 0x7A, 0x58, 0x5A, 0x00];
#[cfg(feature = "zstd")]
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];
/// POSIX tar headers carry `ustar` at byte 257 of the first block.
const TAR_MAGIC: &[u8; 5] = b"ustar";
const TAR_MAGIC_OFFSET: usize = 257;

impl FromStr for Codec {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_lowercase().as_str() {
            "tar" => Ok(Codec::Tar),
            "tar.gz" | "tgz" | "gz" | "gzip" => Ok(Codec::TarGz),
            "tar.bz2" | "tbz2" | "bz2" | "bzip2" => Ok(Codec::TarBz2),
            #[cfg(feature = "xz")]
            "tar.xz" | "txz" | "xz" | "lzma" => Ok(Codec::TarXz),
            #[cfg(not(feature = "xz"))]
            "tar.xz" | "txz" | "xz" | "lzma" => exn::bail!(ErrorKind::DisabledFormat(s.to_string())),
            #[cfg(feature = "zstd")]
            "tar.zst" | "tzst" | "zst" | "zstd" => Ok(Codec::TarZstd),
            #[cfg(not(feature = "zstd"))]
            "tar.zst" | "tzst" | "zst" | "zstd" => exn::bail!(ErrorKind::DisabledFormat(s.to_string())),
            _ => exn::bail!(ErrorKind::UnsupportedFormat(s.to_string())),
        }
    }
}

impl Codec {
    /// Every codec compiled into this build.
    pub const ALL: &'static [Codec] = &[
        Codec::Tar,
        Codec::TarGz,
        Codec::TarBz2,
        #[cfg(feature = "xz")]
        Codec::TarXz,
        #[cfg(feature = "zstd")]
        Codec::TarZstd,
    ];

    /// Detect the codec from an archive name's extension.
    ///
    /// Returns `None` when the name doesn't end in a known archive extension.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_lowercase();
        Self::ALL
            .iter()
            // `.tar` is a suffix of nothing else, but check compressed
            // extensions first anyway so `.tar.gz` never reads as `.tar`.
            .rev()
            .find(|codec| {
                let ext = codec.extension();
                lower.len() > ext.len() && lower.ends_with(ext)
            })
            .copied()
    }

    /// Detect the codec from the first bytes of an archive.
    ///
    /// Tar detection needs at least the first 262 bytes.
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&BZIP2_MAGIC) {
            return Some(Codec::TarBz2);
        }
        if bytes.starts_with(&GZIP_MAGIC) {
            return Some(Codec::TarGz);
        }
        #[cfg(feature = "xz")]
        if bytes.starts_with(&XZ_MAGIC) {
            return Some(Codec::TarXz);
        }
        #[cfg(feature = "zstd")]
        if bytes.starts_with(&ZSTD_MAGIC) {
            return Some(Codec::TarZstd);
        }
        if bytes.get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + TAR_MAGIC.len()) == Some(TAR_MAGIC.as_slice()) {
            return Some(Codec::Tar);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use crate::Codec;
    use rstest::rstest;

    #[rstest]
    #[case("tar", Codec::Tar)]
    #[case("tar.gz", Codec::TarGz)]
    #[case(".tar.gz", Codec::TarGz)]
    #[case("tgz", Codec::TarGz)]
    #[case("GZIP", Codec::TarGz)]
    #[case("tar.bz2", Codec::TarBz2)]
    #[case("bzip2", Codec::TarBz2)]
    #[cfg_attr(feature = "xz", case("tar.xz", Codec::TarXz))]
    #[cfg_attr(feature = "zstd", case("zstd", Codec::TarZstd))]
    fn test_from_str(#[case] test: &str, #[case] expected: Codec) {
        assert_eq!(test.parse::<Codec>().unwrap(), expected);
    }

    #[rstest]
    #[case("zip")]
    #[case("rar")]
    #[case("")]
    #[case(" ")]
    fn test_from_str_invalid(#[case] test: &str) {
        assert!(test.parse::<Codec>().is_err());
    }

    #[rstest]
    #[case("home-2024-01-01T00:00:00+00:00-abc.tar", Some(Codec::Tar))]
    #[case("home-2024-01-01T00:00:00+00:00-abc.tar.gz", Some(Codec::TarGz))]
    #[case("home-2024-01-01T00:00:00+00:00-abc.TAR.BZ2", Some(Codec::TarBz2))]
    #[cfg_attr(feature = "zstd", case("home-abc.tar.zst", Some(Codec::TarZstd)))]
    #[case("home-abc.zip", None)]
    #[case("home-abc.gz", None)]
    // A bare extension is a dotfile, not an archive.
    #[case(".tar.gz", None)]
    fn test_from_name(#[case] name: &str, #[case] expected: Option<Codec>) {
        assert_eq!(Codec::from_name(name), expected);
    }

    #[rstest]
    #[case(&[0x42, 0x5A, 0x68, 0x39], Some(Codec::TarBz2))]
    #[case(&[0x1F, 0x8B, 0x08, 0x00], Some(Codec::TarGz))]
    #[case(b"not an archive", None)]
    #[case(&[], None)]
    fn test_from_magic_bytes(#[case] bytes: &[u8], #[case] expected: Option<Codec>) {
        assert_eq!(Codec::from_magic_bytes(bytes), expected);
    }

    #[test]
    fn test_from_magic_bytes_tar() {
        let mut block = vec![0u8; 512];
        block[257..262].copy_from_slice(b"ustar");
        assert_eq!(Codec::from_magic_bytes(&block), Some(Codec::Tar));
    }
}
