//! Directory walk and the flat entry catalog
//!
//! A directory table is a `u32` record count and a reserved `u32`, followed by
//! 9-byte records:
//!
//! | Offset | Size | Field |
//! |---|---|---|
//! | 0 | 4 | name offset (null-terminated string) |
//! | 4 | 4 | info offset |
//! | 8 | 1 | type: 0 file, 1 directory |
//!
//! A directory record's info offset is the offset of its own table. A file
//! record's info offset points at the file's data offset and size.
//!
//! The catalog stores entries in post-order: every child precedes its
//! directory and the root comes last.
//!
//! Offsets are untrusted. Nesting is capped by a depth limit and the whole
//! walk by an entry budget, since records in different tables may point at
//! the same subdirectory.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use binrw::BinRead;
use tracing::{debug, trace};

use crate::config::DEFAULT_MAX_ENTRIES;
use crate::error::{HapiError, HapiResult};
use crate::source::ByteSource;

static NEXT_ARCHIVE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one opened archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArchiveId(u64);

impl ArchiveId {
    /// Allocate an id no other archive in this process has
    pub fn next() -> Self {
        Self(NEXT_ARCHIVE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ArchiveId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Index of an entry within its catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(usize);

impl EntryId {
    /// Position in post-order
    pub const fn index(self) -> usize {
        self.0
    }
}

/// File or directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory with its children in record order
    Directory {
        /// Child entries
        children: Vec<EntryId>,
    },
}

/// One catalog entry
#[derive(Debug, Clone)]
pub struct Entry {
    archive: ArchiveId,
    parent_path: Vec<String>,
    name: String,
    kind: EntryKind,
    offset: u32,
    size: u32,
}

// Archive identity is left out so reopening the same bytes compares equal.
impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.parent_path == other.parent_path
            && self.name == other.name
            && self.kind == other.kind
            && self.offset == other.offset
            && self.size == other.size
    }
}

impl Eq for Entry {}

impl Entry {
    /// Archive that produced this entry
    pub const fn archive(&self) -> ArchiveId {
        self.archive
    }

    /// Names of the directories above this entry, outermost first. Empty for
    /// the root and for root-level entries.
    pub fn parent_path(&self) -> &[String] {
        &self.parent_path
    }

    /// Own name, empty for the root
    pub fn name(&self) -> &str {
        &self.name
    }

    /// File or directory
    pub const fn kind(&self) -> &EntryKind {
        &self.kind
    }

    /// Whether this is a directory
    pub const fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory { .. })
    }

    /// Whether this is a file
    pub const fn is_file(&self) -> bool {
        matches!(self.kind, EntryKind::File)
    }

    /// Directory: offset of its record table. File: offset of its chunk size
    /// table.
    pub const fn offset(&self) -> u32 {
        self.offset
    }

    /// Uncompressed size of a file, 0 for directories
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Children of a directory; empty for files
    pub fn children(&self) -> &[EntryId] {
        match &self.kind {
            EntryKind::Directory { children } => children,
            EntryKind::File => &[],
        }
    }

    /// Full path with `/` separators, empty for the root
    pub fn path(&self) -> String {
        let mut path = self.parent_path.join("/");
        if !path.is_empty() {
            path.push('/');
        }
        path.push_str(&self.name);
        path
    }
}

/// Every entry of an archive, in post-order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    entries: Vec<Entry>,
    root: EntryId,
}

impl Catalog {
    /// Root directory
    pub fn root(&self) -> &Entry {
        &self.entries[self.root.0]
    }

    /// Root directory handle
    pub const fn root_id(&self) -> EntryId {
        self.root
    }

    /// Look up an entry by handle
    pub fn get(&self, id: EntryId) -> Option<&Entry> {
        self.entries.get(id.0)
    }

    /// Number of entries, root included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false: a catalog holds at least the root
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in post-order
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Entries in post-order
    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    /// File entries in post-order
    pub fn files(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter().filter(|e| e.is_file())
    }

    /// Children of `entry`, in record order. Empty for an entry of another
    /// catalog.
    pub fn children<'a>(&'a self, entry: &'a Entry) -> impl Iterator<Item = &'a Entry> + 'a {
        let ids: &[EntryId] = if entry.archive == self.root().archive {
            entry.children()
        } else {
            &[]
        };
        ids.iter().filter_map(|&id| self.get(id))
    }

    /// Find an entry by path. Segments are separated by `/` or `\` and
    /// compared ASCII case-insensitively; an empty path is the root.
    pub fn find(&self, path: &str) -> Option<&Entry> {
        path.split(['/', '\\'])
            .filter(|segment| !segment.is_empty())
            .try_fold(self.root(), |dir, segment| {
                self.children(dir)
                    .find(|child| child.name.eq_ignore_ascii_case(segment))
            })
    }
}

impl<'a> IntoIterator for &'a Catalog {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[derive(Debug, BinRead)]
#[br(little)]
struct DirectoryRecord {
    name_offset: u32,
    info_offset: u32,
    kind: u8,
}

#[derive(Debug, BinRead)]
#[br(little)]
struct FileInfo {
    data_offset: u32,
    size: u32,
}

/// Upper bound on records reserved up front; the count is untrusted
const MAX_RECORD_PREALLOC: usize = 1024;

/// Walks the directory tree of an archive whose key is already installed
pub struct CatalogBuilder<'a, S> {
    source: &'a mut S,
    archive: ArchiveId,
    max_depth: usize,
    max_entries: usize,
    depth: usize,
    entries: Vec<Entry>,
}

impl<'a, S: ByteSource> CatalogBuilder<'a, S> {
    /// Create a builder tagging entries with `archive`
    pub fn new(source: &'a mut S, archive: ArchiveId, max_depth: usize) -> Self {
        Self {
            source,
            archive,
            max_depth,
            max_entries: DEFAULT_MAX_ENTRIES,
            depth: 0,
            entries: Vec::new(),
        }
    }

    /// Cap the number of entries, root included
    #[must_use]
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Walk the tree from the root table at `root_offset`
    pub fn build(mut self, root_offset: u32) -> HapiResult<Catalog> {
        let root = self.build_directory(&[], "", root_offset)?;
        debug!(
            "Catalog of archive {}: {} entries",
            self.archive,
            self.entries.len()
        );

        Ok(Catalog {
            entries: self.entries,
            root,
        })
    }

    /// Read the directory table at `offset` and everything below it. The
    /// children are appended before the directory itself.
    pub fn build_directory(
        &mut self,
        parent_path: &[String],
        name: &str,
        offset: u32,
    ) -> HapiResult<EntryId> {
        if self.depth > self.max_depth {
            return Err(HapiError::DirectoryTooDeep {
                limit: self.max_depth,
                offset,
            });
        }

        self.source.seek_to(u64::from(offset))?;
        let count = self.source.read_u32_le()?;
        let _reserved = self.source.read_u32_le()?;

        let mut records = Vec::with_capacity((count as usize).min(MAX_RECORD_PREALLOC));
        for _ in 0..count {
            records.push(DirectoryRecord::read(&mut *self.source)?);
        }
        debug!("Directory {name:?} at {offset:#x}: {count} records");

        // The root's empty name is not a path segment
        let mut child_path = parent_path.to_vec();
        if self.depth > 0 {
            child_path.push(name.to_string());
        }

        self.depth += 1;
        let children = self.build_children(&child_path, &records, offset);
        self.depth -= 1;
        let children = children?;

        self.push(Entry {
            archive: self.archive,
            parent_path: parent_path.to_vec(),
            name: name.to_string(),
            kind: EntryKind::Directory { children },
            offset,
            size: 0,
        })
    }

    fn build_children(
        &mut self,
        child_path: &[String],
        records: &[DirectoryRecord],
        offset: u32,
    ) -> HapiResult<Vec<EntryId>> {
        let mut children = Vec::with_capacity(records.len());
        for record in records {
            self.source.seek_to(u64::from(record.name_offset))?;
            let name = self.source.read_cstring()?;
            trace!(
                "Record {name:?}: type {}, info at {:#x}",
                record.kind, record.info_offset
            );

            let id = match record.kind {
                0 => self.build_file(child_path, &name, record.info_offset)?,
                1 => self.build_directory(child_path, &name, record.info_offset)?,
                kind => return Err(HapiError::UnknownEntryKind { kind, offset }),
            };
            children.push(id);
        }
        Ok(children)
    }

    /// Read the file info at `offset` and append the file entry.
    pub fn build_file(
        &mut self,
        parent_path: &[String],
        name: &str,
        offset: u32,
    ) -> HapiResult<EntryId> {
        self.source.seek_to(u64::from(offset))?;
        let info = FileInfo::read(&mut *self.source)?;

        self.push(Entry {
            archive: self.archive,
            parent_path: parent_path.to_vec(),
            name: name.to_string(),
            kind: EntryKind::File,
            offset: info.data_offset,
            size: info.size,
        })
    }

    fn push(&mut self, entry: Entry) -> HapiResult<EntryId> {
        if self.entries.len() >= self.max_entries {
            return Err(HapiError::TooManyEntries {
                limit: self.max_entries,
            });
        }
        let id = EntryId(self.entries.len());
        self.entries.push(entry);
        Ok(id)
    }
}
