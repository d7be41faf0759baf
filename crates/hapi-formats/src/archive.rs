//! Opened HAPI archive
//!
//! Opening validates the header, installs the key and walks the whole
//! directory tree once. Extraction goes back to the source on demand.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::catalog::{ArchiveId, Catalog, CatalogBuilder, Entry, EntryId};
use crate::config::ArchiveOptions;
use crate::error::{HapiError, HapiResult};
use crate::extract::FileExtractor;
use crate::header::HapiHeader;
use crate::source::ScrambledReader;

/// A validated archive and its catalog
#[derive(Debug)]
pub struct Archive<R = BufReader<File>> {
    id: ArchiveId,
    header: HapiHeader,
    options: ArchiveOptions,
    catalog: Catalog,
    source: Mutex<ScrambledReader<R>>,
}

impl Archive<BufReader<File>> {
    /// Open the archive file at `path` with default options
    pub fn open_path(path: impl AsRef<Path>) -> HapiResult<Self> {
        Self::open_path_with_options(path, ArchiveOptions::default())
    }

    /// Open the archive file at `path`
    pub fn open_path_with_options(
        path: impl AsRef<Path>,
        options: ArchiveOptions,
    ) -> HapiResult<Self> {
        let path = path.as_ref();
        debug!("Opening archive {}", path.display());
        let file = File::open(path)?;
        Self::open_with_options(BufReader::new(file), options)
    }
}

impl<R: Read + Seek> Archive<R> {
    /// Open an archive with default options
    pub fn open(reader: R) -> HapiResult<Self> {
        Self::open_with_options(reader, ArchiveOptions::default())
    }

    /// Open an archive: validate the header, then catalog every entry.
    ///
    /// Any format error fails the whole open.
    pub fn open_with_options(reader: R, options: ArchiveOptions) -> HapiResult<Self> {
        options.validate()?;

        let mut source = ScrambledReader::new(reader)?;
        let header = HapiHeader::validate(&mut source)?;

        let id = ArchiveId::next();
        let catalog = CatalogBuilder::new(&mut source, id, options.max_depth)
            .with_max_entries(options.max_entries)
            .build(header.directory_offset)?;

        debug!(
            "Opened archive {}: {} files, {} entries",
            id,
            catalog.files().count(),
            catalog.len()
        );

        Ok(Self {
            id,
            header,
            options,
            catalog,
            source: Mutex::new(source),
        })
    }

    /// Identity checked against [`Entry::archive`] before extraction
    pub const fn id(&self) -> ArchiveId {
        self.id
    }

    /// Validated header
    pub const fn header(&self) -> &HapiHeader {
        &self.header
    }

    /// Options the archive was opened with
    pub const fn options(&self) -> &ArchiveOptions {
        &self.options
    }

    /// Every entry, in post-order
    pub const fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Root directory
    pub fn root(&self) -> &Entry {
        self.catalog.root()
    }

    /// Look up an entry by handle
    pub fn entry(&self, id: EntryId) -> Option<&Entry> {
        self.catalog.get(id)
    }

    /// Children of a directory entry
    pub fn children<'a>(&'a self, entry: &'a Entry) -> impl Iterator<Item = &'a Entry> + 'a {
        self.catalog.children(entry)
    }

    /// Find an entry by path, see [`Catalog::find`]
    pub fn find(&self, path: &str) -> Option<&Entry> {
        self.catalog.find(path)
    }

    /// File entries, in post-order
    pub fn files(&self) -> impl Iterator<Item = &Entry> {
        self.catalog.files()
    }

    /// Decode a file entry of this archive.
    pub fn try_extract(&self, entry: &Entry) -> HapiResult<Vec<u8>> {
        let mut source = self.source.lock();
        FileExtractor::new(&mut *source, self.id, &self.options).extract(entry)
    }

    /// Decode a file entry and append it to `output`.
    ///
    /// Returns the number of bytes appended. Any failure, including a
    /// directory or another archive's entry, appends nothing and returns 0.
    pub fn extract(&self, entry: &Entry, output: &mut Vec<u8>) -> usize {
        match self.try_extract(entry) {
            Ok(data) => {
                output.extend_from_slice(&data);
                data.len()
            }
            Err(err) => {
                warn!("Failed to extract {:?}: {}", entry.path(), err);
                0
            }
        }
    }

    /// Decode the file at `path`
    pub fn read_file(&self, path: &str) -> HapiResult<Vec<u8>> {
        let entry = self
            .find(path)
            .ok_or_else(|| HapiError::PathNotFound(path.to_string()))?;
        self.try_extract(entry)
    }

    /// Unwrap the underlying reader
    pub fn into_inner(self) -> R {
        self.source.into_inner().into_inner()
    }
}
