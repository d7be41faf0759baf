//! HAPI archive error types

use std::fmt;
use thiserror::Error;

use crate::catalog::ArchiveId;
use crate::sqsh::SqshError;

/// Which known format a mismatching version word resembles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionMismatchKind {
    /// `"BANK"`: a saved game rather than a content archive
    SavedGame,
    /// HAPI version 2, which is not supported
    Hapi2,
    /// Nothing recognisable
    Unknown,
}

impl fmt::Display for VersionMismatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SavedGame => "bank subtype signature looks like a saved game",
            Self::Hapi2 => "HAPI v2 archives are not supported",
            Self::Unknown => "invalid bank subtype signature",
        })
    }
}

/// HAPI archive error type
#[derive(Debug, Error)]
pub enum HapiError {
    /// Header signature is not `"HAPI"`
    #[error("invalid HAPI signature: 0x{0:08x}")]
    InvalidSignature(u32),

    /// Header version word is not the supported archive version
    #[error("{kind}: 0x{found:08x}")]
    VersionMismatch {
        /// Raw version word
        found: u32,
        /// Known format the word resembles
        kind: VersionMismatchKind,
    },

    /// Directory record with a type tag other than file (0) or directory (1)
    #[error("unknown entry type {kind} in directory record at offset {offset:#x}")]
    UnknownEntryKind {
        /// Raw type tag
        kind: u8,
        /// Offset of the directory table holding the record
        offset: u32,
    },

    /// Directory nesting exceeded the configured depth limit
    #[error("directory nesting deeper than {limit} at offset {offset:#x}")]
    DirectoryTooDeep {
        /// Configured limit
        limit: usize,
        /// Offset of the directory table that would exceed it
        offset: u32,
    },

    /// Directory tree holds more entries than the configured budget
    #[error("catalog exceeds {limit} entries")]
    TooManyEntries {
        /// Configured budget
        limit: usize,
    },

    /// Entry belongs to another archive
    #[error("entry belongs to archive {entry}, not archive {archive}")]
    ForeignEntry {
        /// Archive the entry was built by
        entry: ArchiveId,
        /// Archive asked to extract it
        archive: ArchiveId,
    },

    /// Entry is a directory, not a file
    #[error("entry is a directory, not a file: {0}")]
    NotAFile(String),

    /// No entry with the given path
    #[error("path not found: {0}")]
    PathNotFound(String),

    /// A chunk failed to decode
    #[error("chunk {index} is invalid: {source}")]
    InvalidChunk {
        /// Zero-based chunk index within the file
        index: usize,
        /// Codec failure
        #[source]
        source: SqshError,
    },

    /// Decoded output length differs from the recorded size
    #[error("size mismatch: recorded {expected} bytes, decoded {actual}")]
    SizeMismatch {
        /// Size recorded in the file entry
        expected: u32,
        /// Bytes produced by the chunks
        actual: usize,
    },

    /// Invalid archive options
    #[error("invalid options: {0}")]
    InvalidOptions(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

impl HapiError {
    /// Whether this error makes the archive unusable, as opposed to failing a
    /// single extraction.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidSignature(_)
                | Self::VersionMismatch { .. }
                | Self::UnknownEntryKind { .. }
                | Self::DirectoryTooDeep { .. }
                | Self::TooManyEntries { .. }
        )
    }
}

/// Result type for HAPI archive operations
pub type HapiResult<T> = Result<T, HapiError>;
