//! SQSH chunk encoder

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;

use crate::lz77;

/// Compression mode of an encoded chunk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkMode {
    /// Payload stored as-is
    Stored,
    /// LZ77 payload
    Lz77,
    /// zlib payload
    Zlib,
}

impl ChunkMode {
    /// Byte written to the chunk header
    pub const fn as_byte(self) -> u8 {
        match self {
            Self::Stored => 0,
            Self::Lz77 => 1,
            Self::Zlib => 2,
        }
    }
}

/// How a chunk is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkEncoding {
    /// Compression mode
    pub mode: ChunkMode,
    /// Whether the payload cipher is applied
    pub ciphered: bool,
}

impl ChunkEncoding {
    /// Stored, unciphered
    pub const fn stored() -> Self {
        Self {
            mode: ChunkMode::Stored,
            ciphered: false,
        }
    }

    /// LZ77, unciphered
    pub const fn lz77() -> Self {
        Self {
            mode: ChunkMode::Lz77,
            ciphered: false,
        }
    }

    /// zlib, unciphered
    pub const fn zlib() -> Self {
        Self {
            mode: ChunkMode::Zlib,
            ciphered: false,
        }
    }

    /// Same mode with the payload cipher applied
    pub const fn ciphered(mut self) -> Self {
        self.ciphered = true;
        self
    }
}

impl Default for ChunkEncoding {
    fn default() -> Self {
        Self::zlib()
    }
}

/// Encode `data` (at most one chunk's worth) as a complete SQSH block.
pub fn encode_chunk(data: &[u8], encoding: ChunkEncoding) -> Vec<u8> {
    let mut payload = match encoding.mode {
        ChunkMode::Stored => data.to_vec(),
        ChunkMode::Lz77 => lz77::compress(data),
        ChunkMode::Zlib => {
            let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(data).expect("write to Vec");
            encoder.finish().expect("finish zlib stream")
        }
    };

    if encoding.ciphered {
        hapi_crypto::encrypt_chunk(&mut payload);
    }

    let checksum = payload
        .iter()
        .fold(0u32, |sum, &b| sum.wrapping_add(u32::from(b)));

    let mut chunk = Vec::with_capacity(19 + payload.len());
    chunk.extend_from_slice(b"SQSH");
    chunk.push(0x02);
    chunk.push(encoding.mode.as_byte());
    chunk.push(u8::from(encoding.ciphered));
    chunk.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    chunk.extend_from_slice(&(data.len() as u32).to_le_bytes());
    chunk.extend_from_slice(&checksum.to_le_bytes());
    chunk.extend_from_slice(&payload);
    chunk
}
