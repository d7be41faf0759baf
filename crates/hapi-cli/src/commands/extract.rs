//! `hpi extract`

use std::fs;
use std::io::{Read, Seek};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use hapi_formats::{Archive, Entry};
use tracing::{debug, info};

use crate::{ExtractArgs, ReaderArgs};

/// Extract one file, one directory or the whole archive below `args.output`.
///
/// Returns the number of files written.
pub fn handle(args: &ExtractArgs, reader: ReaderArgs) -> Result<usize> {
    let archive = Archive::open_path_with_options(&args.archive, reader.options())
        .with_context(|| format!("failed to open {}", args.archive.display()))?;

    let start = match &args.path {
        Some(path) => archive
            .find(path)
            .with_context(|| format!("{path} not found in {}", args.archive.display()))?,
        None => archive.root(),
    };

    let mut files = Vec::new();
    collect_files(&archive, start, &mut files);

    for entry in &files {
        let target = output_path(&args.output, entry)?;
        let data = archive
            .try_extract(entry)
            .with_context(|| format!("failed to extract {}", entry.path()))?;

        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        fs::write(&target, &data)
            .with_context(|| format!("failed to write {}", target.display()))?;
        debug!("{} -> {} ({} bytes)", entry.path(), target.display(), data.len());
    }

    info!("Extracted {} files to {}", files.len(), args.output.display());
    Ok(files.len())
}

fn collect_files<'a, R: Read + Seek>(
    archive: &'a Archive<R>,
    entry: &'a Entry,
    files: &mut Vec<&'a Entry>,
) {
    if entry.is_file() {
        files.push(entry);
        return;
    }
    for child in archive.children(entry) {
        collect_files(archive, child, files);
    }
}

/// Map an entry onto the output directory, refusing names that would escape
/// it.
fn output_path(root: &Path, entry: &Entry) -> Result<PathBuf> {
    let mut path = root.to_path_buf();
    for segment in entry.parent_path().iter().map(String::as_str).chain([entry.name()]) {
        if segment.is_empty()
            || segment == "."
            || segment == ".."
            || segment.contains(['/', '\\', ':'])
        {
            bail!("refusing to extract {:?}: unsafe path segment {segment:?}", entry.path());
        }
        path.push(segment);
    }
    Ok(path)
}
