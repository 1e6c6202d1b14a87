//! Archive packaging for finished batches
//!
//! Every artifact is stored under its base filename at the archive root, in input
//! order, deflate-compressed.

use crate::error::{Error, Result};
use crate::types::Artifact;
use std::collections::HashSet;
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use tracing::debug;
use zip::CompressionMethod;
use zip::write::FileOptions;

/// Pack artifacts into an in-memory zip archive
///
/// # Errors
///
/// Returns an error if an artifact cannot be read, has no filename, or shares its
/// filename with an earlier artifact.
pub fn pack(artifacts: &[Artifact]) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    write_archive(artifacts, &mut buffer)?;
    Ok(buffer.into_inner())
}

/// Pack artifacts into a zip archive on disk
pub fn pack_to_file(artifacts: &[Artifact], path: &Path) -> Result<()> {
    let file = std::fs::File::create(path)?;
    write_archive(artifacts, file)?;
    debug!(?path, entries = artifacts.len(), "wrote archive");
    Ok(())
}

fn write_archive<W: Write + Seek>(artifacts: &[Artifact], sink: W) -> Result<()> {
    let mut seen = HashSet::with_capacity(artifacts.len());
    let mut writer = zip::ZipWriter::new(sink);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for artifact in artifacts {
        let name = artifact.file_name();
        if name.is_empty() {
            return Err(Error::Archive(format!(
                "artifact {} has no filename",
                artifact.path.display()
            )));
        }
        if !seen.insert(name.clone()) {
            return Err(Error::Archive(format!("duplicate entry name {name:?}")));
        }

        let data = std::fs::read(&artifact.path)?;
        writer.start_file(name, options)?;
        writer.write_all(&data)?;
    }

    writer.finish()?;
    Ok(())
}
