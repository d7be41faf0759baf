//! SQSH chunk error types

use thiserror::Error;

/// SQSH chunk decoding error
#[derive(Debug, Error)]
pub enum SqshError {
    /// Chunk does not start with `"SQSH"`
    #[error("invalid SQSH magic: expected [53 51 53 48], got {0:02X?}")]
    InvalidMagic([u8; 4]),

    /// Unknown compression byte
    #[error("unknown compression mode: 0x{0:02X}")]
    UnknownCompression(u8),

    /// Declared decompressed size is larger than a chunk can be
    #[error("declared chunk size {0} exceeds the 65536 byte chunk limit")]
    ChunkTooLarge(u32),

    /// Payload shorter than the declared compressed size
    #[error("truncated payload: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Declared compressed size
        expected: u32,
        /// Bytes available
        actual: usize,
    },

    /// Payload byte sum does not match the header
    #[error("checksum mismatch: expected {expected:#010x}, got {actual:#010x}")]
    ChecksumMismatch {
        /// Checksum from the header
        expected: u32,
        /// Checksum of the payload
        actual: u32,
    },

    /// LZ77 stream ended before its end marker
    #[error("LZ77 stream truncated at input offset {0}")]
    Lz77Truncated(usize),

    /// LZ77 stream produced more than the declared size
    #[error("LZ77 output exceeds declared size of {0} bytes")]
    Lz77Overflow(usize),

    /// zlib stream failed to inflate
    #[error("zlib decompression failed: {0}")]
    Zlib(String),

    /// Decoded length differs from the declared size
    #[error("decompressed size mismatch: expected {expected}, got {actual}")]
    SizeMismatch {
        /// Declared decompressed size
        expected: u32,
        /// Bytes produced
        actual: usize,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

/// Result type for SQSH operations
pub type SqshResult<T> = Result<T, SqshError>;
