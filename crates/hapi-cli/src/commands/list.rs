//! `hpi list`

use std::io::Write;

use anyhow::{Context, Result};
use hapi_formats::Archive;

use crate::output::{EntryRecord, entry_table};
use crate::{ListArgs, OutputFormat, ReaderArgs};

/// Print the catalog of an archive to stdout
pub fn handle(args: &ListArgs, reader: ReaderArgs) -> Result<()> {
    let stdout = std::io::stdout();
    write_listing(args, reader, &mut stdout.lock())
}

/// Write the catalog of an archive, in post-order, to `out`
pub fn write_listing<W: Write>(args: &ListArgs, reader: ReaderArgs, out: &mut W) -> Result<()> {
    let archive = Archive::open_path_with_options(&args.archive, reader.options())
        .with_context(|| format!("failed to open {}", args.archive.display()))?;

    let records: Vec<EntryRecord> = archive
        .catalog()
        .iter()
        .filter(|entry| !args.files_only || entry.is_file())
        .map(EntryRecord::from)
        .collect();

    match args.format {
        OutputFormat::Text => writeln!(out, "{}", entry_table(&records))?,
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string(&records)?)?,
        OutputFormat::JsonPretty => {
            writeln!(out, "{}", serde_json::to_string_pretty(&records)?)?;
        }
    }

    Ok(())
}
