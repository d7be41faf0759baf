//! Reader for HAPI archives
//!
//! HAPI is the package format of Total Annihilation and of Spring content
//! (`.hpi`, `.ufo`, `.ccx`, `.gp3`). An archive is a fixed header, a directory
//! tree of named entries and, for every file, a sequence of independently
//! compressed SQSH chunks.
//!
//! # Reading an archive
//!
//! ```no_run
//! use hapi_formats::Archive;
//!
//! let archive = Archive::open_path("totala1.hpi")?;
//! for entry in archive.files() {
//!     println!("{} ({} bytes)", entry.path(), entry.size());
//! }
//!
//! let mut data = Vec::new();
//! if let Some(entry) = archive.find("gamedata/sidedata.tdf") {
//!     let written = archive.extract(entry, &mut data);
//!     println!("extracted {written} bytes");
//! }
//! # Ok::<(), hapi_formats::HapiError>(())
//! ```
//!
//! # Layers
//!
//! - [`source`]: key-aware reader and bounded windows
//! - [`header`]: signature and version checks, key derivation
//! - [`catalog`]: directory walk into a flat post-order catalog
//! - [`sqsh`]: chunk decoding (stored, LZ77, zlib)
//! - [`extract`]: chunk table handling for one file
//! - [`archive`]: the facade tying them together

#![warn(missing_docs)]
#![allow(clippy::cast_possible_truncation)] // Offsets and sizes are u32 on disk
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::return_self_not_must_use)] // Builder patterns

pub mod archive;
pub mod catalog;
pub mod config;
pub mod error;
pub mod extract;
pub mod header;
pub mod source;
pub mod sqsh;

pub use archive::Archive;
pub use catalog::{ArchiveId, Catalog, CatalogBuilder, Entry, EntryId, EntryKind};
pub use config::{ArchiveOptions, ChunkLayout, DEFAULT_MAX_ENTRIES, SizeCheck};
pub use error::{HapiError, HapiResult, VersionMismatchKind};
pub use extract::{FileExtractor, chunk_count};
pub use header::HapiHeader;
pub use source::{ByteSource, ScrambledReader, SubStream};
pub use sqsh::{SqshChunk, SqshError, SqshResult};
