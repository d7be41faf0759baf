//! In-memory HAPI archive writer
//!
//! ```
//! use hapi_test_utils::{FixtureBuilder, Node};
//!
//! let fixture = FixtureBuilder::new()
//!     .key(0x7D)
//!     .add(Node::dir("units", vec![Node::file("armcom.fbi", b"[UNITINFO]".to_vec())]))
//!     .build();
//! assert!(fixture.files.contains_key("units/armcom.fbi"));
//! ```

use std::collections::BTreeMap;
use std::ops::Range;

use hapi_crypto::HapiKey;

use crate::sqsh::{ChunkEncoding, encode_chunk};
use crate::{CHUNK_SIZE, HAPI_MAGIC, HAPI_VERSION};

const HEADER_SIZE: usize = 20;
const RECORD_SIZE: usize = 9;

/// One node of the directory tree to write
#[derive(Debug, Clone)]
pub enum Node {
    /// File with its contents
    File {
        /// Entry name
        name: String,
        /// Uncompressed contents
        data: Vec<u8>,
        /// Overrides the builder's encoding
        encoding: Option<ChunkEncoding>,
    },
    /// Directory with its children, in record order
    Directory {
        /// Entry name
        name: String,
        /// Children in record order
        children: Vec<Node>,
    },
    /// Record with an arbitrary type tag, pointing at its own name
    Raw {
        /// Entry name
        name: String,
        /// Type tag written to the record
        kind: u8,
    },
}

impl Node {
    /// File node
    pub fn file(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self::File {
            name: name.into(),
            data,
            encoding: None,
        }
    }

    /// Directory node
    pub fn dir(name: impl Into<String>, children: Vec<Self>) -> Self {
        Self::Directory {
            name: name.into(),
            children,
        }
    }

    /// Record with an unsupported type tag
    pub fn raw(name: impl Into<String>, kind: u8) -> Self {
        Self::Raw {
            name: name.into(),
            kind,
        }
    }

    /// Encode this file's chunks with `encoding`
    pub fn with_encoding(mut self, new: ChunkEncoding) -> Self {
        if let Self::File { encoding, .. } = &mut self {
            *encoding = Some(new);
        }
        self
    }

    fn name(&self) -> &str {
        match self {
            Self::File { name, .. } | Self::Directory { name, .. } | Self::Raw { name, .. } => {
                name
            }
        }
    }
}

/// Where chunk data is placed relative to the chunk table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChunkPlacement {
    /// Chunk `i` starts `i * 65536` bytes after the table, matching readers
    /// that advance by decompressed output. Chunks must compress to at most
    /// 65536 bytes.
    #[default]
    OutputCursor,
    /// Chunks follow each other back to back
    Packed,
}

/// Where a file's pieces ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileLayout {
    /// Offset of the file's info record
    pub info_offset: u32,
    /// Offset of the chunk size table
    pub table_offset: u32,
    /// Uncompressed size
    pub size: u32,
    /// Byte range of each encoded chunk
    pub chunks: Vec<Range<usize>>,
}

/// A written archive
#[derive(Debug, Clone)]
pub struct Fixture {
    /// Archive bytes, scrambled if a key was set
    pub bytes: Vec<u8>,
    /// Root directory table offset
    pub root_offset: u32,
    /// Layout of every file, keyed by `/`-joined path
    pub files: BTreeMap<String, FileLayout>,
    /// Layout of every directory table, keyed by `/`-joined path (root is "")
    pub directories: BTreeMap<String, u32>,
}

impl Fixture {
    /// Flip one bit in the payload of chunk `index` of `path`, breaking its
    /// checksum.
    pub fn corrupt_chunk(&mut self, path: &str, index: usize) {
        let range = self.files[path].chunks[index].clone();
        self.bytes[range.end - 1] ^= 0x01;
    }

    /// Overwrite a little-endian word at `offset`, keeping the archive's
    /// scrambling consistent.
    pub fn patch_u32(&mut self, offset: usize, value: u32, key_word: u32) {
        let mut bytes = value.to_le_bytes();
        if offset >= HEADER_SIZE
            && let Some(key) = HapiKey::from_header(key_word)
        {
            key.encrypt_in_place(offset as u64, &mut bytes);
        }
        self.bytes[offset..offset + 4].copy_from_slice(&bytes);
    }
}

/// Builder for [`Fixture`]
#[derive(Debug, Clone)]
pub struct FixtureBuilder {
    signature: u32,
    version: u32,
    key_word: u32,
    placement: ChunkPlacement,
    encoding: ChunkEncoding,
    root: Vec<Node>,
}

impl Default for FixtureBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FixtureBuilder {
    /// Unscrambled archive, zlib chunks, output-cursor placement
    pub fn new() -> Self {
        Self {
            signature: HAPI_MAGIC,
            version: HAPI_VERSION,
            key_word: 0,
            placement: ChunkPlacement::default(),
            encoding: ChunkEncoding::default(),
            root: Vec::new(),
        }
    }

    /// Header key word; non-zero scrambles everything after the header
    pub fn key(mut self, key_word: u32) -> Self {
        self.key_word = key_word;
        self
    }

    /// Header signature word
    pub fn signature(mut self, signature: u32) -> Self {
        self.signature = signature;
        self
    }

    /// Header version word
    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Chunk placement
    pub fn placement(mut self, placement: ChunkPlacement) -> Self {
        self.placement = placement;
        self
    }

    /// Default chunk encoding
    pub fn encoding(mut self, encoding: ChunkEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Add a root-level node
    pub fn add(mut self, node: Node) -> Self {
        self.root.push(node);
        self
    }

    /// Write the archive
    pub fn build(&self) -> Fixture {
        let mut writer = Writer {
            buf: vec![0; HEADER_SIZE],
            placement: self.placement,
            encoding: self.encoding,
            files: BTreeMap::new(),
            directories: BTreeMap::new(),
        };

        let root_offset = writer.directory("", &self.root);
        let directory_size = (writer.buf.len() - HEADER_SIZE) as u32;

        let mut bytes = writer.buf;
        for (i, word) in [
            self.signature,
            self.version,
            directory_size,
            self.key_word,
            root_offset,
        ]
        .into_iter()
        .enumerate()
        {
            bytes[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }

        if let Some(key) = HapiKey::from_header(self.key_word) {
            key.encrypt_in_place(HEADER_SIZE as u64, &mut bytes[HEADER_SIZE..]);
        }

        Fixture {
            bytes,
            root_offset,
            files: writer.files,
            directories: writer.directories,
        }
    }
}

struct Writer {
    buf: Vec<u8>,
    placement: ChunkPlacement,
    encoding: ChunkEncoding,
    files: BTreeMap<String, FileLayout>,
    directories: BTreeMap<String, u32>,
}

fn join(parent: &str, name: &str) -> String {
    if parent.is_empty() {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}

impl Writer {
    fn put_u32(&mut self, offset: usize, value: u32) {
        self.buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn directory(&mut self, path: &str, children: &[Node]) -> u32 {
        let table = self.buf.len();
        self.directories.insert(path.to_string(), table as u32);
        self.buf.resize(table + 8 + RECORD_SIZE * children.len(), 0);
        self.put_u32(table, children.len() as u32);

        for (i, child) in children.iter().enumerate() {
            let name_offset = self.buf.len() as u32;
            self.buf.extend_from_slice(child.name().as_bytes());
            self.buf.push(0);

            let child_path = join(path, child.name());
            let (info_offset, kind) = match child {
                Node::File { data, encoding, .. } => {
                    let encoding = encoding.unwrap_or(self.encoding);
                    (self.file(child_path, data, encoding), 0)
                }
                Node::Directory { children, .. } => (self.directory(&child_path, children), 1),
                Node::Raw { kind, .. } => (name_offset, *kind),
            };

            let record = table + 8 + RECORD_SIZE * i;
            self.put_u32(record, name_offset);
            self.put_u32(record + 4, info_offset);
            self.buf[record + 8] = kind;
        }

        table as u32
    }

    fn file(&mut self, path: String, data: &[u8], encoding: ChunkEncoding) -> u32 {
        let info = self.buf.len();
        self.buf.resize(info + 9, 0);

        let chunks: Vec<Vec<u8>> = data
            .chunks(CHUNK_SIZE)
            .map(|chunk| encode_chunk(chunk, encoding))
            .collect();

        let table = self.buf.len();
        for chunk in &chunks {
            self.buf.extend_from_slice(&(chunk.len() as u32).to_le_bytes());
        }

        let base = self.buf.len();
        let mut ranges = Vec::with_capacity(chunks.len());
        for (i, chunk) in chunks.iter().enumerate() {
            let start = match self.placement {
                ChunkPlacement::OutputCursor => base + i * CHUNK_SIZE,
                ChunkPlacement::Packed => self.buf.len(),
            };
            assert!(
                start >= self.buf.len(),
                "chunk {i} of {path} overlaps the previous chunk; use a compressing encoding"
            );
            self.buf.resize(start, 0);
            self.buf.extend_from_slice(chunk);
            ranges.push(start..self.buf.len());
        }

        self.put_u32(info, table as u32);
        self.put_u32(info + 4, data.len() as u32);
        self.buf[info + 8] = encoding.mode.as_byte();

        self.files.insert(
            path,
            FileLayout {
                info_offset: info as u32,
                table_offset: table as u32,
                size: data.len() as u32,
                chunks: ranges,
            },
        );

        info as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_words() {
        let fixture = FixtureBuilder::new().build();
        assert_eq!(&fixture.bytes[..4], b"HAPI");
        assert_eq!(fixture.root_offset, 20);
        // Empty root: count + reserved
        assert_eq!(fixture.bytes.len(), 28);
    }

    #[test]
    fn test_output_cursor_placement_spaces_chunks() {
        let data = vec![7u8; CHUNK_SIZE * 2 + 10];
        let fixture = FixtureBuilder::new().add(Node::file("big", data)).build();

        let layout = &fixture.files["big"];
        let base = layout.table_offset as usize + 12;
        assert_eq!(layout.chunks[0].start, base);
        assert_eq!(layout.chunks[1].start, base + CHUNK_SIZE);
        assert_eq!(layout.chunks[2].start, base + 2 * CHUNK_SIZE);
    }

    #[test]
    fn test_packed_placement() {
        let data = vec![7u8; CHUNK_SIZE + 1];
        let fixture = FixtureBuilder::new()
            .placement(ChunkPlacement::Packed)
            .add(Node::file("big", data))
            .build();

        let layout = &fixture.files["big"];
        assert_eq!(layout.chunks[0].end, layout.chunks[1].start);
    }
}
