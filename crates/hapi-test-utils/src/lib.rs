//! Test utilities for hapi-rs
//!
//! Writes small HAPI archives and SQSH chunks in memory so the reader can be
//! tested without shipping binary fixtures. Only what tests need is
//! supported; this is not a general archive writer.

#![allow(clippy::expect_used, clippy::panic)]

pub mod fixture;
pub mod lz77;
pub mod sqsh;

pub use fixture::{ChunkPlacement, Fixture, FixtureBuilder, FileLayout, Node};
pub use sqsh::{ChunkEncoding, ChunkMode, encode_chunk};

/// `"HAPI"` as a little-endian word
pub const HAPI_MAGIC: u32 = 0x4950_4148;
/// Supported archive version word
pub const HAPI_VERSION: u32 = 0x0001_0000;
/// Saved-game version word (`"BANK"`)
pub const BANK_MAGIC: u32 = 0x4B4E_4142;
/// HAPI v2 version word
pub const HAPI2_VERSION: u32 = 0x0002_0000;
/// Uncompressed bytes per chunk
pub const CHUNK_SIZE: usize = 65536;
