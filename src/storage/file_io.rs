//! File I/O utilities with atomic, durable writes
//!
//! A write either lands completely and is flushed to disk before the call
//! returns, or leaves the previous file contents untouched. Once the rename
//! (or unlink) has happened the call reports success, even if the directory
//! flush that follows fails.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};

use crate::error::{LedgerError, LedgerResult};

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Flush directory metadata so a completed rename survives a crash
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

type SyncDir = fn(&Path) -> io::Result<()>;

/// Flush the parent of a path whose rename or unlink already happened
fn flush_parent(path: &Path, sync: SyncDir) {
    let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return;
    };
    if let Err(err) = sync(parent) {
        tracing::warn!(dir = %parent.display(), error = %err, "directory sync failed after commit");
    }
}

fn create_temp(path: &Path, private: bool) -> io::Result<File> {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    if private {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    #[cfg(not(unix))]
    let _ = private;
    options.open(path)
}

/// Write bytes atomically: temp file, fsync, rename, directory fsync.
///
/// With `private` set the file is created readable by the owner only (Unix).
pub fn write_bytes_atomic(path: &Path, bytes: &[u8], private: bool) -> io::Result<()> {
    write_bytes_atomic_with(path, bytes, private, sync_dir)
}

fn write_bytes_atomic_with(path: &Path, bytes: &[u8], private: bool, sync: SyncDir) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let temp_path = temp_path_for(path);
    let result = (|| {
        let mut file = create_temp(&temp_path, private)?;
        file.write_all(bytes)?;
        file.flush()?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();

    if let Err(err) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(err);
    }

    flush_parent(path, sync);
    Ok(())
}

/// Read a whole file, `None` if it does not exist
pub fn read_bytes(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err),
    }
}

/// Remove a file, returning whether it existed
pub fn remove_file(path: &Path) -> io::Result<bool> {
    remove_file_with(path, sync_dir)
}

fn remove_file_with(path: &Path, sync: SyncDir) -> io::Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => {
            flush_parent(path, sync);
            Ok(true)
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err),
    }
}

/// Read JSON from a file, returning a default value if file doesn't exist
pub fn read_json<T, P>(path: P) -> LedgerResult<T>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    let path = path.as_ref();

    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(T::default()),
        Err(err) => {
            return Err(LedgerError::StorageUnavailable(format!(
                "Failed to open {}: {}",
                path.display(),
                err
            )))
        }
    };

    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| LedgerError::Config(format!("Failed to parse {}: {}", path.display(), e)))
}

/// Write pretty JSON to a file atomically
pub fn write_json_atomic<T, P>(path: P, data: &T) -> LedgerResult<()>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let bytes = serde_json::to_vec_pretty(data)?;
    write_bytes_atomic(path, &bytes, false).map_err(|e| {
        LedgerError::StorageUnavailable(format!("Failed to write {}: {}", path.display(), e))
    })
}
