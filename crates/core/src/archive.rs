//! Reading the uploaded ZIP and writing the `PDFs.zip` package.

use crate::error::{Error, Result};
use std::fs::{self, File};
use std::io::{self, Cursor};
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::{CompressionMethod, DateTime, ZipArchive, ZipWriter};

/// Conventional name of the output package.
pub const PACKAGE_NAME: &str = "PDFs.zip";

/// Unpack the archive at `archive_path` into `dest`.
///
/// Entries whose names would escape `dest` make the whole archive invalid.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<()> {
    let file = File::open(archive_path).map_err(|e| {
        Error::ArchiveExtraction(format!("cannot open {}: {}", archive_path.display(), e))
    })?;

    let mut archive = ZipArchive::new(file)
        .map_err(|e| Error::ArchiveExtraction(format!("{}: {}", archive_path.display(), e)))?;

    fs::create_dir_all(dest)?;
    archive
        .extract(dest)
        .map_err(|e| Error::ArchiveExtraction(format!("{}: {}", archive_path.display(), e)))?;

    log::debug!(
        "Extracted {} entries from {} into {}",
        archive.len(),
        archive_path.display(),
        dest.display()
    );

    Ok(())
}

/// List the `.pdf` files directly inside `dir`, sorted by filename.
pub fn collect_pdfs(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut pdfs = Vec::new();

    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        let is_pdf = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("pdf"))
            .unwrap_or(false);

        if is_pdf && path.is_file() {
            pdfs.push(path);
        }
    }

    pdfs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(pdfs)
}

/// Build a compressed ZIP holding each of `pdfs` under its bare filename.
///
/// Entries are ordered by filename and carry a fixed timestamp, so the same
/// inputs always yield the same archive. No inputs yields a valid empty ZIP.
pub fn pack_pdfs<P: AsRef<Path>>(pdfs: &[P]) -> Result<Vec<u8>> {
    let mut sorted: Vec<&Path> = pdfs.iter().map(|p| p.as_ref()).collect();
    sorted.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(DateTime::default());

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));

    for path in sorted {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::ZipError(format!("not a file path: {}", path.display())))?;

        writer.start_file(name.as_str(), options)?;
        let mut source = File::open(path)?;
        io::copy(&mut source, &mut writer)?;
        log::debug!("Packed {}", name);
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}
