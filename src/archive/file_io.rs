//! File I/O utilities with atomic writes
//!
//! Provides safe file operations that won't corrupt data on failure:
//! atomic JSON writes, streaming gzip in both directions, and whole-file
//! replacement through a staged temp file.

use std::fs::{self, File, FileTimes, OpenOptions};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::Path;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{de::DeserializeOwned, Serialize};
use tempfile::NamedTempFile;

use crate::error::{BackupError, BackupResult};

/// Read JSON from a file, returning an error if file doesn't exist
pub fn read_json_required<T, P>(path: P) -> BackupResult<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    let file = File::open(path)
        .map_err(|e| BackupError::Io(format!("Failed to open {}: {}", path.display(), e)))?;

    let reader = BufReader::new(file);
    serde_json::from_reader(reader)
        .map_err(|e| BackupError::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write JSON to a file atomically (write to temp, then rename)
///
/// The file is either completely written or not modified at all.
pub fn write_json_atomic<T, P>(path: P, data: &T) -> BackupResult<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            BackupError::Io(format!(
                "Failed to create directory {}: {}",
                parent.display(),
                e
            ))
        })?;
    }

    // Temp file must live in the same directory for the rename to be atomic
    let temp_path = path.with_extension("json.tmp");

    let file = File::create(&temp_path)
        .map_err(|e| BackupError::Io(format!("Failed to create temp file: {}", e)))?;

    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, data)
        .map_err(|e| BackupError::Config(format!("Failed to serialize data: {}", e)))?;

    writer
        .flush()
        .map_err(|e| BackupError::Io(format!("Failed to flush data: {}", e)))?;

    writer
        .get_ref()
        .sync_all()
        .map_err(|e| BackupError::Io(format!("Failed to sync data: {}", e)))?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        BackupError::Io(format!("Failed to rename temp file: {}", e))
    })?;

    Ok(())
}

/// Gzip `src` into a new file at `dst`
///
/// Fails if `dst` already exists.
pub fn compress_file(src: &Path, dst: &Path) -> io::Result<()> {
    let mut input = BufReader::new(File::open(src)?);
    let output = OpenOptions::new().write(true).create_new(true).open(dst)?;

    let mut encoder = GzEncoder::new(BufWriter::new(output), Compression::default());
    io::copy(&mut input, &mut encoder)?;

    let writer = encoder.finish()?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()
}

/// Decompress a gzip file into a temp file inside `dir`
///
/// The returned file is deleted when dropped, so callers hold it only for
/// as long as they need the decompressed bytes.
pub fn decompress_to_temp(src: &Path, dir: &Path, prefix: &str) -> io::Result<NamedTempFile> {
    let mut decoder = GzDecoder::new(BufReader::new(File::open(src)?));

    let mut temp = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".tmp")
        .tempfile_in(dir)?;

    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        io::copy(&mut decoder, &mut writer)?;
        writer.flush()?;
    }
    temp.as_file().sync_all()?;

    Ok(temp)
}

/// Stage a copy of `src` next to `dst`, keeping `src`'s permissions and times
///
/// Nothing at `dst` changes until the returned file is persisted over it;
/// dropping it instead removes the staged copy.
pub fn stage_copy(src: &Path, dst: &Path) -> io::Result<NamedTempFile> {
    let parent = match dst.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let source_meta = fs::metadata(src)?;

    let mut staged = tempfile::Builder::new()
        .prefix(".restore-")
        .suffix(".tmp")
        .tempfile_in(parent)?;

    {
        let mut input = BufReader::new(File::open(src)?);
        let mut writer = BufWriter::new(staged.as_file_mut());
        io::copy(&mut input, &mut writer)?;
        writer.flush()?;
    }

    let file = staged.as_file();
    file.set_permissions(source_meta.permissions())?;
    let mut times = FileTimes::new().set_modified(source_meta.modified()?);
    if let Ok(accessed) = source_meta.accessed() {
        times = times.set_accessed(accessed);
    }
    file.set_times(times)?;
    file.sync_all()?;

    Ok(staged)
}

/// Creation time of a file as the filesystem reports it
///
/// On Unix this is the inode change time (ctime); elsewhere the birth time,
/// or the modification time where no birth time is recorded.
pub fn creation_time(metadata: &fs::Metadata) -> io::Result<SystemTime> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;

        let secs = metadata.ctime();
        let nanos = metadata.ctime_nsec().clamp(0, 999_999_999) as u32;
        if secs >= 0 {
            Ok(UNIX_EPOCH + Duration::new(secs as u64, nanos))
        } else {
            Ok(UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()) + Duration::from_nanos(nanos.into()))
        }
    }

    #[cfg(not(unix))]
    {
        metadata.created().or_else(|_| metadata.modified())
    }
}
