//! File system backend using the OS file APIs.

use crate::error::{StorageError, StorageResult};
use crate::fs::{DirEntry, FileSystem};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

/// A [`FileSystem`] backed by real files.
///
/// # Durability
///
/// - `create_file` reserves the file's blocks with `fallocate`-style
///   pre-allocation so later writes never fail for lack of space
/// - `sync_file` calls `File::sync_all()`
/// - `sync_dir` fsyncs the directory on Unix and is a no-op elsewhere
///
/// # Example
///
/// ```no_run
/// use lstore_storage::{FileSystem, OsFileSystem};
/// use std::path::Path;
///
/// let fs = OsFileSystem::new();
/// fs.create_dir_all(Path::new("/var/lib/lstore/p001/efp/2048k")).unwrap();
/// ```
#[derive(Debug, Default, Clone, Copy)]
pub struct OsFileSystem;

impl OsFileSystem {
    /// Creates a new OS file system handle.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl FileSystem for OsFileSystem {
    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        fs::create_dir_all(path).map_err(|e| StorageError::from_io(path, e))
    }

    fn read_dir(&self, path: &Path) -> StorageResult<Vec<DirEntry>> {
        if path.exists() && !path.is_dir() {
            return Err(StorageError::NotADirectory {
                path: path.to_path_buf(),
            });
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(path).map_err(|e| StorageError::from_io(path, e))? {
            let entry = entry?;
            let metadata = entry.metadata()?;
            // Non UTF-8 names can never match a pool or journal name
            let Ok(name) = entry.file_name().into_string() else {
                continue;
            };
            entries.push(DirEntry {
                name,
                is_dir: metadata.is_dir(),
                len: if metadata.is_dir() { 0 } else { metadata.len() },
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn create_file(&self, path: &Path, len: u64) -> StorageResult<()> {
        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(path)
            .map_err(|e| StorageError::from_io(path, e))?;

        if len > 0 {
            file.allocate(len)?;
        }
        // allocate() may round up on some file systems
        file.set_len(len)?;
        Ok(())
    }

    fn file_len(&self, path: &Path) -> StorageResult<u64> {
        let metadata = fs::metadata(path).map_err(|e| StorageError::from_io(path, e))?;
        Ok(metadata.len())
    }

    fn read_at(&self, path: &Path, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let mut file = File::open(path).map_err(|e| StorageError::from_io(path, e))?;
        let size = file.metadata()?.len();
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        if len == 0 {
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(offset))?;
        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)?;
        Ok(buffer)
    }

    fn write_at(&self, path: &Path, offset: u64, data: &[u8]) -> StorageResult<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| StorageError::from_io(path, e))?;
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(data)?;
        file.flush()?;
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        fs::rename(from, to).map_err(|e| StorageError::from_io(from, e))
    }

    fn remove_file(&self, path: &Path) -> StorageResult<()> {
        fs::remove_file(path).map_err(|e| StorageError::from_io(path, e))
    }

    fn sync_file(&self, path: &Path) -> StorageResult<()> {
        let file = OpenOptions::new()
            .write(true)
            .open(path)
            .map_err(|e| StorageError::from_io(path, e))?;
        file.sync_all()?;
        Ok(())
    }

    #[cfg(unix)]
    fn sync_dir(&self, path: &Path) -> StorageResult<()> {
        let dir = File::open(path).map_err(|e| StorageError::from_io(path, e))?;
        dir.sync_all()?;
        Ok(())
    }

    #[cfg(not(unix))]
    fn sync_dir(&self, _path: &Path) -> StorageResult<()> {
        // NTFS journals metadata; directories cannot be fsynced on Windows
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_file_is_zero_filled() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.jrnl");
        let fs = OsFileSystem::new();

        fs.create_file(&path, 8192).unwrap();
        assert_eq!(fs.file_len(&path).unwrap(), 8192);
        assert!(fs.read_at(&path, 4096, 16).unwrap().iter().all(|&b| b == 0));
    }

    #[test]
    fn create_file_refuses_overwrite() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.jrnl");
        let fs = OsFileSystem::new();

        fs.create_file(&path, 16).unwrap();
        let result = fs.create_file(&path, 16);
        assert!(matches!(result, Err(StorageError::AlreadyExists { .. })));
    }

    #[test]
    fn write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.jrnl");
        let fs = OsFileSystem::new();

        fs.create_file(&path, 64).unwrap();
        fs.write_at(&path, 10, b"hello").unwrap();
        assert_eq!(fs.read_at(&path, 10, 5).unwrap(), b"hello");
        assert_eq!(fs.file_len(&path).unwrap(), 64);
    }

    #[test]
    fn read_past_end_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.jrnl");
        let fs = OsFileSystem::new();

        fs.create_file(&path, 8).unwrap();
        let result = fs.read_at(&path, 4, 8);
        assert!(matches!(result, Err(StorageError::ReadPastEnd { .. })));
    }

    #[test]
    fn read_dir_is_sorted_and_typed() {
        let dir = tempdir().unwrap();
        let fs = OsFileSystem::new();

        fs.create_dir_all(&dir.path().join("b")).unwrap();
        fs.create_file(&dir.path().join("a"), 3).unwrap();

        let entries = fs.read_dir(dir.path()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a");
        assert!(!entries[0].is_dir);
        assert_eq!(entries[0].len, 3);
        assert_eq!(entries[1].name, "b");
        assert!(entries[1].is_dir);
    }

    #[test]
    fn read_dir_missing_is_not_found() {
        let dir = tempdir().unwrap();
        let fs = OsFileSystem::new();

        let result = fs.read_dir(&dir.path().join("missing"));
        assert!(matches!(result, Err(StorageError::NotFound { .. })));
    }

    #[test]
    fn rename_moves_file() {
        let dir = tempdir().unwrap();
        let fs = OsFileSystem::new();
        let from = dir.path().join("from");
        let to = dir.path().join("to");

        fs.create_file(&from, 4).unwrap();
        fs.rename(&from, &to).unwrap();
        assert!(!fs.exists(&from));
        assert_eq!(fs.file_len(&to).unwrap(), 4);
        fs.sync_dir(dir.path()).unwrap();
    }
}
