//! Packing backend snapshots into a knowledge archive and back.
//!
//! An archive is a zip file with exactly two root entries: the index
//! snapshot (`.db`) and the vector snapshot (`.gob`).

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tempfile::TempDir;
use tracing::debug;
use walkdir::WalkDir;
use zip::result::{ZipError, ZipResult};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{DatastoreError, Result};

/// Prefix of export scratch directories and synthesized archive names.
pub const EXPORT_PREFIX: &str = "knowledge-export-";

/// Prefix of import scratch directories.
pub const IMPORT_PREFIX: &str = "knowledge-import-";

const ENTRY_COUNT: usize = 2;
const INDEX_EXTENSION: &str = "db";
const VECTOR_EXTENSION: &str = "gob";
const DEFAULT_FILE_MODE: u32 = 0o644;

/// Snapshot files extracted from an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnpackedArchive {
    pub index_snapshot: PathBuf,
    pub vector_snapshot: PathBuf,
}

/// Create a scratch directory under `parent`, or the system temp directory.
///
/// The directory is removed when the returned value is dropped.
pub(crate) fn scratch_dir(parent: Option<&Path>, prefix: &str) -> io::Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(prefix);
    let dir = match parent {
        Some(parent) => {
            fs::create_dir_all(parent)?;
            builder.tempdir_in(parent)?
        }
        None => builder.tempdir()?,
    };

    debug!(path = %dir.path().display(), "Created scratch directory");
    Ok(dir)
}

/// Name of an archive exported into a directory at `now`.
pub fn export_file_name(now: DateTime<Local>) -> String {
    format!("{EXPORT_PREFIX}{}.zip", now.format("%Y-%m-%d-%H-%M-%S"))
}

/// Where an export to `destination` is written.
///
/// An existing directory gets a timestamped archive inside it; a missing
/// path gets its parent directories created.
pub(crate) fn resolve_destination(destination: &Path, now: DateTime<Local>) -> io::Result<PathBuf> {
    match fs::metadata(destination) {
        Ok(metadata) if metadata.is_dir() => Ok(destination.join(export_file_name(now))),
        Ok(_) => Ok(destination.to_path_buf()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            if let Some(parent) = destination.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            Ok(destination.to_path_buf())
        }
        Err(e) => Err(e),
    }
}

/// Zip every file under `src` into `dst`, flattened to base names.
///
/// The archive is assembled in a temporary file next to `dst` and only
/// moved into place once complete.
pub(crate) fn zip_dir(src: &Path, dst: &Path) -> ZipResult<()> {
    let parent = match dst.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut staging = tempfile::Builder::new()
        .prefix(".knowledge-export-")
        .suffix(".zip.tmp")
        .tempfile_in(parent)?;

    let mut writer = ZipWriter::new(staging.as_file_mut());
    for entry in WalkDir::new(src).sort_by_file_name() {
        let entry = entry.map_err(io::Error::from)?;
        if !entry.file_type().is_file() {
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        let metadata = entry.metadata().map_err(io::Error::from)?;
        let options = FileOptions::default()
            .compression_method(CompressionMethod::Deflated)
            .unix_permissions(file_mode(&metadata));

        writer.start_file(name.as_str(), options)?;
        let mut file = File::open(entry.path())?;
        io::copy(&mut file, &mut writer)?;
        debug!(entry = %name, size = metadata.len(), "Added archive entry");
    }
    writer.finish()?;
    drop(writer);

    staging.persist(dst).map_err(|e| e.error)?;
    Ok(())
}

/// Extract the two snapshots of the archive at `source` into `dest`.
///
/// Nothing outside `dest` is written; entries are stored under their base
/// names only.
pub(crate) fn unpack_archive(source: &Path, dest: &Path) -> Result<UnpackedArchive> {
    let open_error = |source_err: ZipError| DatastoreError::ArchiveOpen {
        path: source.to_path_buf(),
        source: source_err,
    };
    let file = File::open(source).map_err(|e| open_error(ZipError::Io(e)))?;
    let mut archive = ZipArchive::new(file).map_err(open_error)?;

    if archive.len() != ENTRY_COUNT {
        return Err(DatastoreError::ArchiveStructure(format!(
            "knowledge archive must contain exactly two files, found {}",
            archive.len()
        )));
    }

    let mut index_snapshot = None;
    let mut vector_snapshot = None;
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(open_error)?;
        if entry.is_dir() {
            continue;
        }

        let name = Path::new(entry.name())
            .file_name()
            .map(ToOwned::to_owned)
            .ok_or_else(|| {
                DatastoreError::ArchiveStructure(format!("invalid entry name {:?}", entry.name()))
            })?;
        let target = dest.join(&name);

        // Damaged entry data surfaces as a read error, including checksum mismatches.
        let mut contents = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or_default());
        entry
            .read_to_end(&mut contents)
            .map_err(|e| open_error(ZipError::Io(e)))?;

        let mut out = create_with_mode(&target, entry.unix_mode().unwrap_or(DEFAULT_FILE_MODE))
            .map_err(DatastoreError::archive_io)?;
        out.write_all(&contents).map_err(DatastoreError::archive_io)?;
        debug!(entry = %target.display(), "Extracted archive entry");

        match target.extension().and_then(|ext| ext.to_str()) {
            Some(INDEX_EXTENSION) => index_snapshot = Some(target),
            Some(VECTOR_EXTENSION) => vector_snapshot = Some(target),
            _ => {}
        }
    }

    match (index_snapshot, vector_snapshot) {
        (Some(index_snapshot), Some(vector_snapshot)) => Ok(UnpackedArchive {
            index_snapshot,
            vector_snapshot,
        }),
        _ => Err(DatastoreError::ArchiveStructure(
            "knowledge archive must contain exactly one .db and one .gob file".to_string(),
        )),
    }
}

#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode()
}

#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> u32 {
    DEFAULT_FILE_MODE
}

#[cfg(unix)]
fn create_with_mode(path: &Path, mode: u32) -> io::Result<File> {
    use std::os::unix::fs::OpenOptionsExt;
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(mode & 0o777)
        .open(path)
}

#[cfg(not(unix))]
fn create_with_mode(path: &Path, _mode: u32) -> io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}
