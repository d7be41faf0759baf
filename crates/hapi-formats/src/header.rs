//! HAPI header validation
//!
//! The header is 20 bytes of plain little-endian words at offset 0:
//!
//! | Offset | Field |
//! |---|---|
//! | 0 | signature `"HAPI"` |
//! | 4 | version / bank subtype |
//! | 8 | directory size |
//! | 12 | key word |
//! | 16 | root directory offset |
//!
//! Everything after it may be scrambled with the key derived from the key
//! word.

use hapi_crypto::HapiKey;
use tracing::debug;

use crate::error::{HapiError, HapiResult, VersionMismatchKind};
use crate::source::ByteSource;

/// `"HAPI"` read as a little-endian word
pub const HAPI_MAGIC: u32 = 0x4950_4148;
/// Version word of supported archives
pub const HAPI_VERSION: u32 = 0x0001_0000;
/// `"BANK"`: version word of saved games
pub const BANK_MAGIC: u32 = 0x4B4E_4142;
/// Version word of HAPI v2 archives
pub const HAPI2_VERSION: u32 = 0x0002_0000;
/// Size of the fixed header in bytes
pub const HEADER_SIZE: u64 = 20;

/// Validated archive header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HapiHeader {
    /// Version word (always [`HAPI_VERSION`] once validated)
    pub version: u32,
    /// Size of the directory block; informational only
    pub directory_size: u32,
    /// Raw key word
    pub key_word: u32,
    /// Offset of the root directory table
    pub directory_offset: u32,
}

impl HapiHeader {
    /// Read and check the header at offset 0.
    ///
    /// Stops reading at the first word that fails a check.
    pub fn read<S: ByteSource>(source: &mut S) -> HapiResult<Self> {
        source.seek_to(0)?;

        let signature = source.read_u32_le()?;
        if signature != HAPI_MAGIC {
            return Err(HapiError::InvalidSignature(signature));
        }

        let version = source.read_u32_le()?;
        if version != HAPI_VERSION {
            return Err(HapiError::VersionMismatch {
                found: version,
                kind: classify_version(version),
            });
        }

        let directory_size = source.read_u32_le()?;
        let key_word = source.read_u32_le()?;
        let directory_offset = source.read_u32_le()?;

        Ok(Self {
            version,
            directory_size,
            key_word,
            directory_offset,
        })
    }

    /// Read the header and install the derived key on `source`, so that all
    /// later reads are decoded.
    pub fn validate<S: ByteSource>(source: &mut S) -> HapiResult<Self> {
        let header = Self::read(source)?;
        source.set_key(header.key());

        debug!(
            "HAPI header: root directory at {:#x}, directory size {}, scrambled: {}",
            header.directory_offset,
            header.directory_size,
            header.is_scrambled()
        );

        Ok(header)
    }

    /// Derived scrambling key, `None` for unscrambled archives.
    pub const fn key(&self) -> Option<HapiKey> {
        HapiKey::from_header(self.key_word)
    }

    /// Whether the archive body is scrambled.
    pub const fn is_scrambled(&self) -> bool {
        self.key_word != 0
    }
}

/// Name the known format a mismatching version word belongs to.
pub const fn classify_version(version: u32) -> VersionMismatchKind {
    match version {
        BANK_MAGIC => VersionMismatchKind::SavedGame,
        HAPI2_VERSION => VersionMismatchKind::Hapi2,
        _ => VersionMismatchKind::Unknown,
    }
}
