//! SQSH chunk codec
//!
//! Files inside a HAPI archive are split into chunks of at most 64 KiB of
//! uncompressed data. Each chunk is stored as a self-describing SQSH block:
//!
//! | Offset | Size | Field |
//! |---|---|---|
//! | 0 | 4 | magic `"SQSH"` |
//! | 4 | 1 | marker (usually 2) |
//! | 5 | 1 | compression: 0 stored, 1 LZ77, 2 zlib |
//! | 6 | 1 | payload cipher flag |
//! | 7 | 4 | compressed size |
//! | 11 | 4 | decompressed size |
//! | 15 | 4 | checksum: wrapping byte sum of the stored payload |
//! | 19 | n | payload |
//!
//! Decoding never fails outright: [`SqshChunk::read`] always returns a chunk
//! and records whether it is valid, so callers can decide how to react.

mod error;
pub mod lz77;

pub use error::{SqshError, SqshResult};

use binrw::BinRead;
use binrw::io::{Read, Seek};
use flate2::read::ZlibDecoder;
use tracing::trace;

/// SQSH magic bytes
pub const SQSH_MAGIC: [u8; 4] = *b"SQSH";

/// Maximum uncompressed size of one chunk
pub const CHUNK_SIZE: u32 = 65536;

/// Size of the chunk header in bytes
pub const SQSH_HEADER_SIZE: usize = 19;

/// Chunk compression mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CompressionMode {
    /// Payload is stored as-is
    Stored = 0,
    /// LZ77 with a 4 KiB window
    Lz77 = 1,
    /// zlib stream
    Zlib = 2,
}

impl CompressionMode {
    /// Parse from byte value
    pub const fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Self::Stored),
            1 => Some(Self::Lz77),
            2 => Some(Self::Zlib),
            _ => None,
        }
    }

    /// Byte value of this mode
    pub const fn as_byte(self) -> u8 {
        self as u8
    }
}

/// SQSH chunk header
#[derive(Debug, Clone, Copy, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct SqshHeader {
    /// Magic bytes, `"SQSH"` for a well-formed chunk
    pub magic: [u8; 4],
    /// Marker byte, not interpreted
    pub marker: u8,
    /// Raw compression byte
    pub compression: u8,
    /// Payload cipher flag
    #[br(map = |flag: u8| flag != 0)]
    pub ciphered: bool,
    /// Size of the stored payload
    pub compressed_size: u32,
    /// Size after decompression
    pub decompressed_size: u32,
    /// Wrapping byte sum of the stored payload
    pub checksum: u32,
}

impl SqshHeader {
    /// Read a header and check the fields that do not depend on the payload.
    pub fn parse<R: Read + Seek>(reader: &mut R) -> SqshResult<Self> {
        let header = Self::read(reader)?;

        if header.magic != SQSH_MAGIC {
            return Err(SqshError::InvalidMagic(header.magic));
        }
        if header.decompressed_size > CHUNK_SIZE {
            return Err(SqshError::ChunkTooLarge(header.decompressed_size));
        }

        Ok(header)
    }

    /// Compression mode, if the byte is a known one
    pub const fn mode(&self) -> Option<CompressionMode> {
        CompressionMode::from_byte(self.compression)
    }
}

/// Checksum over a stored chunk payload
pub fn payload_checksum(payload: &[u8]) -> u32 {
    payload
        .iter()
        .fold(0u32, |sum, &byte| sum.wrapping_add(u32::from(byte)))
}

/// One decoded SQSH chunk
#[derive(Debug)]
pub struct SqshChunk {
    header: Option<SqshHeader>,
    data: SqshResult<Vec<u8>>,
}

impl SqshChunk {
    /// Read and decode a chunk from `reader`, usually a window of exactly the
    /// chunk's stored size.
    pub fn read<R: Read + Seek>(mut reader: R) -> Self {
        let header = match SqshHeader::parse(&mut reader) {
            Ok(header) => header,
            Err(err) => {
                return Self {
                    header: None,
                    data: Err(err),
                };
            }
        };

        let data = decode_payload(&header, &mut reader);
        Self {
            header: Some(header),
            data,
        }
    }

    /// Whether the chunk decoded successfully
    pub const fn is_valid(&self) -> bool {
        self.data.is_ok()
    }

    /// Why the chunk is invalid, if it is
    pub fn error(&self) -> Option<&SqshError> {
        self.data.as_ref().err()
    }

    /// Parsed header, if it could be read
    pub const fn header(&self) -> Option<&SqshHeader> {
        self.header.as_ref()
    }

    /// Append the decoded bytes to `out` and return how many were appended.
    ///
    /// An invalid chunk appends nothing.
    pub fn read_all(&self, out: &mut Vec<u8>) -> usize {
        match &self.data {
            Ok(data) => {
                out.extend_from_slice(data);
                data.len()
            }
            Err(_) => 0,
        }
    }

    /// Take the decoded bytes or the decoding error
    pub fn into_data(self) -> SqshResult<Vec<u8>> {
        self.data
    }
}

fn decode_payload<R: Read>(header: &SqshHeader, reader: &mut R) -> SqshResult<Vec<u8>> {
    let mode = header
        .mode()
        .ok_or(SqshError::UnknownCompression(header.compression))?;

    let mut payload = Vec::new();
    reader
        .by_ref()
        .take(u64::from(header.compressed_size))
        .read_to_end(&mut payload)?;
    if payload.len() != header.compressed_size as usize {
        return Err(SqshError::Truncated {
            expected: header.compressed_size,
            actual: payload.len(),
        });
    }

    let checksum = payload_checksum(&payload);
    if checksum != header.checksum {
        return Err(SqshError::ChecksumMismatch {
            expected: header.checksum,
            actual: checksum,
        });
    }

    if header.ciphered {
        hapi_crypto::decrypt_chunk(&mut payload);
    }

    let expected = header.decompressed_size as usize;
    trace!(
        "SQSH chunk: {:?}, {} -> {} bytes, ciphered: {}",
        mode, header.compressed_size, header.decompressed_size, header.ciphered
    );

    let decoded = match mode {
        CompressionMode::Stored => payload,
        CompressionMode::Lz77 => lz77::decompress(&payload, expected)?,
        CompressionMode::Zlib => inflate(&payload, expected)?,
    };

    if decoded.len() != expected {
        return Err(SqshError::SizeMismatch {
            expected: header.decompressed_size,
            actual: decoded.len(),
        });
    }

    Ok(decoded)
}

fn inflate(payload: &[u8], expected: usize) -> SqshResult<Vec<u8>> {
    let mut decoded = Vec::with_capacity(expected);
    // One byte of slack so oversized streams show up as a size mismatch
    ZlibDecoder::new(payload)
        .take(expected as u64 + 1)
        .read_to_end(&mut decoded)
        .map_err(|e| SqshError::Zlib(e.to_string()))?;
    Ok(decoded)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use hapi_test_utils::sqsh::{ChunkEncoding, encode_chunk};
    use std::io::Cursor;

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 7) as u8 + b'a').collect()
    }

    fn decode(bytes: Vec<u8>) -> SqshChunk {
        SqshChunk::read(Cursor::new(bytes))
    }

    #[test]
    fn test_header_layout() {
        let chunk = encode_chunk(b"abc", ChunkEncoding::stored());
        assert_eq!(&chunk[..4], b"SQSH");
        assert_eq!(chunk.len(), SQSH_HEADER_SIZE + 3);

        let header = SqshHeader::parse(&mut Cursor::new(&chunk)).unwrap();
        assert_eq!(header.mode(), Some(CompressionMode::Stored));
        assert_eq!(header.compressed_size, 3);
        assert_eq!(header.decompressed_size, 3);
        assert_eq!(header.checksum, u32::from(b'a') + u32::from(b'b') + u32::from(b'c'));
    }

    #[test]
    fn test_decode_each_mode() {
        let data = sample(5000);
        for encoding in [
            ChunkEncoding::stored(),
            ChunkEncoding::lz77(),
            ChunkEncoding::zlib(),
            ChunkEncoding::lz77().ciphered(),
            ChunkEncoding::zlib().ciphered(),
        ] {
            let chunk = decode(encode_chunk(&data, encoding));
            assert!(chunk.is_valid(), "{encoding:?}: {:?}", chunk.error());

            let mut out = vec![0xFF];
            assert_eq!(chunk.read_all(&mut out), data.len());
            assert_eq!(out[0], 0xFF);
            assert_eq!(&out[1..], &data[..]);
        }
    }

    #[test]
    fn test_bad_magic_is_invalid() {
        let mut bytes = encode_chunk(b"abc", ChunkEncoding::stored());
        bytes[0] = b'X';
        let chunk = decode(bytes);

        assert!(!chunk.is_valid());
        assert!(chunk.header().is_none());
        assert!(matches!(chunk.error(), Some(SqshError::InvalidMagic(_))));

        let mut out = Vec::new();
        assert_eq!(chunk.read_all(&mut out), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_checksum_mismatch_is_invalid() {
        let mut bytes = encode_chunk(&sample(64), ChunkEncoding::zlib());
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;

        let chunk = decode(bytes);
        assert!(matches!(
            chunk.error(),
            Some(SqshError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_compression_is_invalid() {
        let mut bytes = encode_chunk(b"abc", ChunkEncoding::stored());
        bytes[5] = 7;
        assert!(matches!(
            decode(bytes).error(),
            Some(SqshError::UnknownCompression(7))
        ));
    }

    #[test]
    fn test_truncated_payload_is_invalid() {
        let mut bytes = encode_chunk(&sample(100), ChunkEncoding::stored());
        bytes.truncate(SQSH_HEADER_SIZE + 50);
        assert!(matches!(
            decode(bytes).error(),
            Some(SqshError::Truncated {
                expected: 100,
                actual: 50
            })
        ));
    }

    #[test]
    fn test_declared_size_mismatch_is_invalid() {
        let mut bytes = encode_chunk(&sample(100), ChunkEncoding::zlib());
        bytes[11..15].copy_from_slice(&99u32.to_le_bytes());
        assert!(matches!(
            decode(bytes).error(),
            Some(SqshError::SizeMismatch {
                expected: 99,
                actual: 100
            })
        ));
    }

    #[test]
    fn test_oversized_chunk_is_invalid() {
        let mut bytes = encode_chunk(b"abc", ChunkEncoding::stored());
        bytes[11..15].copy_from_slice(&(CHUNK_SIZE + 1).to_le_bytes());
        assert!(matches!(
            decode(bytes).error(),
            Some(SqshError::ChunkTooLarge(65537))
        ));
    }

    #[test]
    fn test_full_size_chunk() {
        let data = sample(CHUNK_SIZE as usize);
        let chunk = decode(encode_chunk(&data, ChunkEncoding::lz77()));
        assert_eq!(chunk.into_data().unwrap(), data);
    }
}
