//! Archive reader options
//!
//! The defaults match how the games read archives: recorded file sizes are
//! not checked and chunks are located by the running output length.

use serde::{Deserialize, Serialize};

use crate::error::{HapiError, HapiResult};

/// What to do when a file decodes to a different length than recorded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeCheck {
    /// Return whatever the chunks produced
    #[default]
    Ignore,
    /// Return the data but log a warning
    Warn,
    /// Fail the extraction
    Strict,
}

/// How chunk start offsets are derived from the chunk table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChunkLayout {
    /// Chunk `i` starts at the table end plus the bytes decoded so far
    #[default]
    OutputCursor,
    /// Chunk `i` starts at the table end plus the sizes of chunks `0..i`
    Packed,
}

/// Options applied when opening an archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArchiveOptions {
    /// Recorded size policy
    pub size_check: SizeCheck,
    /// Chunk placement
    pub chunk_layout: ChunkLayout,
    /// Maximum directory nesting below the root
    pub max_depth: usize,
    /// Maximum number of catalog entries, root included
    pub max_entries: usize,
}

/// Default catalog entry budget
pub const DEFAULT_MAX_ENTRIES: usize = 1 << 17;

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            size_check: SizeCheck::Ignore,
            chunk_layout: ChunkLayout::OutputCursor,
            max_depth: 64,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

impl ArchiveOptions {
    /// Create options with the defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the recorded size policy
    pub fn with_size_check(mut self, size_check: SizeCheck) -> Self {
        self.size_check = size_check;
        self
    }

    /// Set the chunk layout
    pub fn with_chunk_layout(mut self, chunk_layout: ChunkLayout) -> Self {
        self.chunk_layout = chunk_layout;
        self
    }

    /// Set the directory depth limit
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the catalog entry budget
    pub fn with_max_entries(mut self, max_entries: usize) -> Self {
        self.max_entries = max_entries;
        self
    }

    /// Validate the options
    pub fn validate(&self) -> HapiResult<()> {
        if self.max_depth == 0 {
            return Err(HapiError::InvalidOptions(
                "max_depth must be greater than 0".to_string(),
            ));
        }
        if self.max_entries == 0 {
            return Err(HapiError::InvalidOptions(
                "max_entries must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
