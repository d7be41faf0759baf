//! Command-line front end for HAPI archives
//!
//! The `hpi` binary lists and extracts archive contents. Argument types live
//! here so the commands can be driven from tests.

use std::path::PathBuf;

use clap::{Args, ValueEnum};
use hapi_formats::{ArchiveOptions, ChunkLayout, SizeCheck};

pub mod commands;
pub mod output;

/// Output format for listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table
    Text,
    /// JSON array
    Json,
    /// Pretty-printed JSON array
    JsonPretty,
}

/// Reader options shared by all commands
#[derive(Debug, Clone, Copy, Default, Args)]
pub struct ReaderArgs {
    /// Fail files whose decoded size differs from the recorded size
    #[arg(long, global = true)]
    pub strict_size: bool,

    /// Locate chunks by summing stored sizes instead of decoded sizes
    #[arg(long, global = true)]
    pub packed_chunks: bool,
}

impl ReaderArgs {
    /// Archive options selected by the flags
    pub fn options(self) -> ArchiveOptions {
        let mut options = ArchiveOptions::new();
        if self.strict_size {
            options = options.with_size_check(SizeCheck::Strict);
        }
        if self.packed_chunks {
            options = options.with_chunk_layout(ChunkLayout::Packed);
        }
        options
    }
}

/// `hpi list`
#[derive(Debug, Clone, Args)]
pub struct ListArgs {
    /// Archive to read
    pub archive: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    /// Only list files
    #[arg(long)]
    pub files_only: bool,
}

/// `hpi extract`
#[derive(Debug, Clone, Args)]
pub struct ExtractArgs {
    /// Archive to read
    pub archive: PathBuf,

    /// File or directory inside the archive (default: everything)
    pub path: Option<String>,

    /// Directory to write into
    #[arg(short, long, default_value = ".")]
    pub output: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reader_args_map_to_options() {
        assert_eq!(ReaderArgs::default().options(), ArchiveOptions::default());

        let options = ReaderArgs {
            strict_size: true,
            packed_chunks: true,
        }
        .options();
        assert_eq!(options.size_check, SizeCheck::Strict);
        assert_eq!(options.chunk_layout, ChunkLayout::Packed);
    }
}
