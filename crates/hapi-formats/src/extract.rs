//! File extraction
//!
//! A file's data offset points at a table of `u32` stored chunk sizes, one per
//! 64 KiB of uncompressed data. The SQSH chunks follow the table.

use tracing::{trace, warn};

use crate::catalog::{ArchiveId, Entry};
use crate::config::{ArchiveOptions, ChunkLayout, SizeCheck};
use crate::error::{HapiError, HapiResult};
use crate::source::{ByteSource, SubStream};
use crate::sqsh::{CHUNK_SIZE, SqshChunk};

/// Largest output buffer reserved from the recorded size alone
const MAX_PREALLOC: usize = 16 * 1024 * 1024;

/// Number of chunks a file of `size` bytes is split into
pub const fn chunk_count(size: u32) -> usize {
    size.div_ceil(CHUNK_SIZE) as usize
}

/// Decodes file entries of one archive
pub struct FileExtractor<'a, S> {
    source: &'a mut S,
    archive: ArchiveId,
    options: &'a ArchiveOptions,
}

impl<'a, S: ByteSource> FileExtractor<'a, S> {
    /// Create an extractor for entries of `archive`
    pub fn new(source: &'a mut S, archive: ArchiveId, options: &'a ArchiveOptions) -> Self {
        Self {
            source,
            archive,
            options,
        }
    }

    /// Decode every chunk of `entry` and return the concatenated output.
    ///
    /// The first invalid chunk aborts the extraction.
    pub fn extract(&mut self, entry: &Entry) -> HapiResult<Vec<u8>> {
        if entry.archive() != self.archive {
            return Err(HapiError::ForeignEntry {
                entry: entry.archive(),
                archive: self.archive,
            });
        }
        if !entry.is_file() {
            return Err(HapiError::NotAFile(entry.path()));
        }

        let count = chunk_count(entry.size());
        if count == 0 {
            return Ok(Vec::new());
        }

        let table = self.read_chunk_table(entry.offset(), count)?;
        let base = u64::from(entry.offset()) + 4 * count as u64;
        trace!(
            "Extracting {:?}: {} bytes in {} chunks, data at {:#x}",
            entry.path(),
            entry.size(),
            count,
            base
        );

        let mut output = Vec::with_capacity((entry.size() as usize).min(MAX_PREALLOC));
        let mut packed = 0u64;
        for (index, &stored) in table.iter().enumerate() {
            let start = base
                + match self.options.chunk_layout {
                    ChunkLayout::OutputCursor => output.len() as u64,
                    ChunkLayout::Packed => packed,
                };
            packed += u64::from(stored);

            let window = SubStream::new(&mut *self.source, start, u64::from(stored));
            let chunk = SqshChunk::read(window);
            let data = chunk
                .into_data()
                .map_err(|source| HapiError::InvalidChunk { index, source })?;
            trace!("Chunk {index} at {start:#x}: {stored} -> {} bytes", data.len());
            output.extend_from_slice(&data);
        }

        self.check_size(entry, output.len())?;
        Ok(output)
    }

    fn read_chunk_table(&mut self, offset: u32, count: usize) -> HapiResult<Vec<u32>> {
        self.source.seek_to(u64::from(offset))?;
        let mut table = Vec::with_capacity(count);
        for _ in 0..count {
            table.push(self.source.read_u32_le()?);
        }
        Ok(table)
    }

    fn check_size(&self, entry: &Entry, actual: usize) -> HapiResult<()> {
        if actual == entry.size() as usize {
            return Ok(());
        }

        match self.options.size_check {
            SizeCheck::Ignore => Ok(()),
            SizeCheck::Warn => {
                warn!(
                    "{:?} decoded to {} bytes, recorded size is {}",
                    entry.path(),
                    actual,
                    entry.size()
                );
                Ok(())
            }
            SizeCheck::Strict => Err(HapiError::SizeMismatch {
                expected: entry.size(),
                actual,
            }),
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::catalog::{Catalog, CatalogBuilder};
    use crate::header::HapiHeader;
    use crate::source::ScrambledReader;
    use crate::sqsh::SqshError;
    use hapi_test_utils::{ChunkEncoding, ChunkPlacement, Fixture, FixtureBuilder, Node};
    use std::io::Cursor;

    type Source = ScrambledReader<Cursor<Vec<u8>>>;

    struct Opened {
        source: Source,
        archive: ArchiveId,
        catalog: Catalog,
    }

    fn open(fixture: &Fixture) -> Opened {
        let mut source = ScrambledReader::new(Cursor::new(fixture.bytes.clone())).unwrap();
        let header = HapiHeader::validate(&mut source).unwrap();
        let archive = ArchiveId::next();
        let catalog = CatalogBuilder::new(&mut source, archive, 64)
            .build(header.directory_offset)
            .unwrap();
        Opened {
            source,
            archive,
            catalog,
        }
    }

    fn extract(opened: &mut Opened, path: &str, options: &ArchiveOptions) -> HapiResult<Vec<u8>> {
        let entry = opened.catalog.find(path).unwrap().clone();
        FileExtractor::new(&mut opened.source, opened.archive, options).extract(&entry)
    }

    fn sample(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 31 % 251) as u8).collect()
    }

    #[test]
    fn test_chunk_count() {
        assert_eq!(chunk_count(0), 0);
        assert_eq!(chunk_count(1), 1);
        assert_eq!(chunk_count(65536), 1);
        assert_eq!(chunk_count(65537), 2);
        assert_eq!(chunk_count(u32::MAX), 65536);
    }

    #[test]
    fn test_empty_file_reads_nothing() {
        let mut fixture = FixtureBuilder::new()
            .add(Node::file("empty", Vec::new()))
            .build();
        // Point the chunk table past the end; it must not be touched
        let info = fixture.files["empty"].info_offset as usize;
        fixture.patch_u32(info, 0xFFFF_0000, 0);

        let mut opened = open(&fixture);
        let data = extract(&mut opened, "empty", &ArchiveOptions::default()).unwrap();
        assert!(data.is_empty());
    }

    #[test]
    fn test_multi_chunk_file() {
        let data = sample(65537);
        let fixture = FixtureBuilder::new()
            .add(Node::file("big", data.clone()))
            .build();
        assert_eq!(fixture.files["big"].chunks.len(), 2);

        let mut opened = open(&fixture);
        assert_eq!(
            extract(&mut opened, "big", &ArchiveOptions::default()).unwrap(),
            data
        );
    }

    #[test]
    fn test_packed_layout() {
        let data = sample(3 * 65536);
        let fixture = FixtureBuilder::new()
            .placement(ChunkPlacement::Packed)
            .encoding(ChunkEncoding::lz77().ciphered())
            .add(Node::file("packed", data.clone()))
            .build();

        let mut opened = open(&fixture);
        let options = ArchiveOptions::new().with_chunk_layout(ChunkLayout::Packed);
        assert_eq!(extract(&mut opened, "packed", &options).unwrap(), data);

        // The output-cursor layout looks for the second chunk in the wrong place
        let err = extract(&mut opened, "packed", &ArchiveOptions::default()).unwrap_err();
        assert!(matches!(err, HapiError::InvalidChunk { index: 1, .. }));
    }

    #[test]
    fn test_invalid_chunk_reports_index() {
        let mut fixture = FixtureBuilder::new()
            .add(Node::file("big", sample(2 * 65536)))
            .build();
        fixture.corrupt_chunk("big", 1);

        let mut opened = open(&fixture);
        match extract(&mut opened, "big", &ArchiveOptions::default()).unwrap_err() {
            HapiError::InvalidChunk { index, source } => {
                assert_eq!(index, 1);
                assert!(matches!(source, SqshError::ChecksumMismatch { .. }));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_directory_is_not_a_file() {
        let fixture = FixtureBuilder::new().add(Node::dir("maps", vec![])).build();
        let mut opened = open(&fixture);

        assert!(matches!(
            extract(&mut opened, "maps", &ArchiveOptions::default()),
            Err(HapiError::NotAFile(path)) if path == "maps"
        ));
    }

    #[test]
    fn test_foreign_entry_rejected() {
        let fixture = FixtureBuilder::new()
            .add(Node::file("f", b"data".to_vec()))
            .build();
        let first = open(&fixture);
        let mut second = open(&fixture);

        let entry = first.catalog.find("f").unwrap();
        let options = ArchiveOptions::default();
        let err = FileExtractor::new(&mut second.source, second.archive, &options)
            .extract(entry)
            .unwrap_err();
        assert!(matches!(err, HapiError::ForeignEntry { .. }));
    }

    fn short_file() -> Fixture {
        let mut fixture = FixtureBuilder::new()
            .add(Node::file("short", b"12345".to_vec()))
            .build();
        let info = fixture.files["short"].info_offset as usize;
        fixture.patch_u32(info + 4, 10, 0);
        fixture
    }

    #[test]
    fn test_size_mismatch_ignored_by_default() {
        let mut opened = open(&short_file());
        let data = extract(&mut opened, "short", &ArchiveOptions::default()).unwrap();
        assert_eq!(data, b"12345");

        let options = ArchiveOptions::new().with_size_check(SizeCheck::Warn);
        assert_eq!(extract(&mut opened, "short", &options).unwrap(), b"12345");
    }

    #[test]
    fn test_size_mismatch_strict() {
        let mut opened = open(&short_file());
        let options = ArchiveOptions::new().with_size_check(SizeCheck::Strict);

        assert!(matches!(
            extract(&mut opened, "short", &options),
            Err(HapiError::SizeMismatch {
                expected: 10,
                actual: 5
            })
        ));
    }
}
