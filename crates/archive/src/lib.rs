//! Directory archiving with a fixed, per-target codec.
//!
//! A [`Codec`] packs a whole directory tree into a single tar stream,
//! optionally compressed, and unpacks it again:
//!
//! - **Format selection** from configuration ([`str::parse`]) or archive
//!   names ([`Codec::from_name`]), with a cross-check against magic bytes
//!   ([`Codec::check_magic_bytes`])
//! - **Creation** via [`Codec::create`], preserving paths relative to the
//!   tree root
//! - **Extraction** via [`Codec::extract`], refusing entries that would land
//!   outside the destination
//!
//! [`WorkDir`] is the private scratch area archives are built in; it is
//! removed when dropped, whichever way the caller leaves.
//!
//! Gzip and Bzip2 are always available. XZ and Zstd are behind feature flags.

mod construct;
pub mod error;
mod ops;
mod util;
mod workdir;

pub use crate::workdir::WorkDir;

/// A supported archive format.
///
/// Variants gated behind feature flags (`xz`, `zstd`) are only available
/// when the corresponding feature is enabled. Defaults to
/// [`TarGz`](Self::TarGz).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Codec {
    /// Uncompressed tar (.tar)
    Tar,
    /// Gzip-compressed tar (.tar.gz)
    #[default]
    TarGz,
    /// Bzip2-compressed tar (.tar.bz2)
    TarBz2,
    /// XZ/LZMA-compressed tar (.tar.xz)
    #[cfg(feature = "xz")]
    TarXz,
    /// Zstd-compressed tar (.tar.zst)
    #[cfg(feature = "zstd")]
    TarZstd,
}
