//! Output formatting for the CLI

use comfy_table::{Cell, CellAlignment, Table, presets};
use hapi_formats::Entry;
use serde::Serialize;

/// One listed entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryRecord {
    /// Full path, empty for the root
    pub path: String,
    /// `"file"` or `"directory"`
    pub kind: &'static str,
    /// Uncompressed size, 0 for directories
    pub size: u32,
    /// Record table offset for directories, chunk table offset for files
    pub offset: u32,
}

impl From<&Entry> for EntryRecord {
    fn from(entry: &Entry) -> Self {
        Self {
            path: entry.path(),
            kind: if entry.is_directory() {
                "directory"
            } else {
                "file"
            },
            size: entry.size(),
            offset: entry.offset(),
        }
    }
}

/// Render records as a borderless table
pub fn entry_table(records: &[EntryRecord]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(presets::NOTHING)
        .set_header(vec!["Kind", "Size", "Offset", "Path"]);

    for record in records {
        table.add_row(vec![
            Cell::new(record.kind),
            Cell::new(record.size).set_alignment(CellAlignment::Right),
            Cell::new(format!("{:#010x}", record.offset)),
            Cell::new(if record.path.is_empty() {
                "/"
            } else {
                record.path.as_str()
            }),
        ]);
    }

    table
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_rendered_as_slash() {
        let records = vec![EntryRecord {
            path: String::new(),
            kind: "directory",
            size: 0,
            offset: 20,
        }];
        let rendered = entry_table(&records).to_string();
        assert!(rendered.contains("directory"));
        assert!(rendered.contains('/'));
        assert!(rendered.contains("0x00000014"));
    }
}
