use crate::Codec;
use std::fmt::{Display, Formatter, Result as FmtResult};

impl Display for Codec {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl AsRef<str> for Codec {
    fn as_ref(&self) -> &'static str {
        self.as_str()
    }
}

impl Codec {
    /// Returns the file extension for this archive format, leading dot
    /// included.
    #[inline]
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Codec::Tar => ".tar",
            Codec::TarGz => ".tar.gz",
            Codec::TarBz2 => ".tar.bz2",
            #[cfg(feature = "xz")]
            Codec::TarXz => ".tar.xz",
            #[cfg(feature = "zstd")]
            Codec::TarZstd => ".tar.zst",
        }
    }

    /// Returns the short name for configuration (for displaying to user)
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Codec::Tar => "tar",
            Codec::TarGz => "tar.gz",
            Codec::TarBz2 => "tar.bz2",
            #[cfg(feature = "xz")]
            Codec::TarXz => "tar.xz",
            #[cfg(feature = "zstd")]
            Codec::TarZstd => "tar.zst",
        }
    }

    /// Verify that `bytes` start with the expected magic bytes for this format.
    ///
    /// Useful for cross-checking a codec detected from an archive name
    /// against the file's actual contents before unpacking it.
    #[must_use]
    pub fn check_magic_bytes(&self, bytes: &[u8]) -> bool {
        Self::from_magic_bytes(bytes) == Some(*self)
    }
}
