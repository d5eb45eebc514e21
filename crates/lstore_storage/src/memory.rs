//! In-memory file system for testing.

use crate::error::{StorageError, StorageResult};
use crate::fs::{DirEntry, FileSystem};
use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

#[derive(Debug)]
struct Tree {
    dirs: BTreeSet<PathBuf>,
    files: BTreeMap<PathBuf, Vec<u8>>,
}

impl Default for Tree {
    fn default() -> Self {
        // The root always exists
        Self {
            dirs: BTreeSet::from([PathBuf::from("/")]),
            files: BTreeMap::new(),
        }
    }
}

impl Tree {
    fn parent_exists(&self, path: &Path) -> bool {
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => self.dirs.contains(parent),
            _ => true,
        }
    }
}

/// A [`FileSystem`] that keeps every directory and file in memory.
///
/// Suitable for unit tests of pool and partition logic that should not
/// touch the disk. Sync operations are no-ops.
///
/// # Example
///
/// ```rust
/// use lstore_storage::{FileSystem, InMemoryFileSystem};
/// use std::path::Path;
///
/// let fs = InMemoryFileSystem::new();
/// fs.create_dir_all(Path::new("/p001")).unwrap();
/// assert!(fs.is_dir(Path::new("/p001")));
/// ```
#[derive(Debug, Default)]
pub struct InMemoryFileSystem {
    tree: RwLock<Tree>,
}

impl InMemoryFileSystem {
    /// Creates a new empty in-memory file system.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of a file's content.
    ///
    /// Useful for asserting on what a component wrote.
    #[must_use]
    pub fn contents(&self, path: &Path) -> Option<Vec<u8>> {
        self.tree.read().files.get(path).cloned()
    }

    /// Replaces a file's content wholesale, creating it if needed.
    ///
    /// Useful for staging corrupted or truncated files.
    pub fn put_contents(&self, path: &Path, data: Vec<u8>) {
        self.tree.write().files.insert(path.to_path_buf(), data);
    }
}

impl FileSystem for InMemoryFileSystem {
    fn exists(&self, path: &Path) -> bool {
        let tree = self.tree.read();
        tree.dirs.contains(path) || tree.files.contains_key(path)
    }

    fn is_dir(&self, path: &Path) -> bool {
        self.tree.read().dirs.contains(path)
    }

    fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
        let mut tree = self.tree.write();
        for ancestor in path.ancestors() {
            if ancestor.as_os_str().is_empty() {
                continue;
            }
            if tree.files.contains_key(ancestor) {
                return Err(StorageError::NotADirectory {
                    path: ancestor.to_path_buf(),
                });
            }
            tree.dirs.insert(ancestor.to_path_buf());
        }
        Ok(())
    }

    fn read_dir(&self, path: &Path) -> StorageResult<Vec<DirEntry>> {
        let tree = self.tree.read();
        if tree.files.contains_key(path) {
            return Err(StorageError::NotADirectory {
                path: path.to_path_buf(),
            });
        }
        if !tree.dirs.contains(path) {
            return Err(StorageError::not_found(path));
        }

        let child_name = |child: &Path| -> Option<String> {
            (child.parent() == Some(path))
                .then(|| child.file_name()?.to_str().map(str::to_owned))
                .flatten()
        };

        let mut entries: Vec<DirEntry> = tree
            .dirs
            .iter()
            .filter_map(|d| {
                child_name(d).map(|name| DirEntry {
                    name,
                    is_dir: true,
                    len: 0,
                })
            })
            .chain(tree.files.iter().filter_map(|(f, data)| {
                child_name(f).map(|name| DirEntry {
                    name,
                    is_dir: false,
                    len: data.len() as u64,
                })
            }))
            .collect();
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    fn create_file(&self, path: &Path, len: u64) -> StorageResult<()> {
        let mut tree = self.tree.write();
        if tree.files.contains_key(path) || tree.dirs.contains(path) {
            return Err(StorageError::AlreadyExists {
                path: path.to_path_buf(),
            });
        }
        if !tree.parent_exists(path) {
            return Err(StorageError::not_found(path));
        }
        let len = usize::try_from(len).map_err(|_| {
            StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "file too large for memory backend",
            ))
        })?;
        tree.files.insert(path.to_path_buf(), vec![0u8; len]);
        Ok(())
    }

    fn file_len(&self, path: &Path) -> StorageResult<u64> {
        self.tree
            .read()
            .files
            .get(path)
            .map(|data| data.len() as u64)
            .ok_or_else(|| StorageError::not_found(path))
    }

    fn read_at(&self, path: &Path, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
        let tree = self.tree.read();
        let data = tree
            .files
            .get(path)
            .ok_or_else(|| StorageError::not_found(path))?;
        let size = data.len() as u64;
        let end = offset.saturating_add(len as u64);

        if offset > size || end > size {
            return Err(StorageError::ReadPastEnd { offset, len, size });
        }

        Ok(data[offset as usize..end as usize].to_vec())
    }

    fn write_at(&self, path: &Path, offset: u64, bytes: &[u8]) -> StorageResult<()> {
        let mut tree = self.tree.write();
        let data = tree
            .files
            .get_mut(path)
            .ok_or_else(|| StorageError::not_found(path))?;
        let start = offset as usize;
        let end = start + bytes.len();
        if end > data.len() {
            data.resize(end, 0);
        }
        data[start..end].copy_from_slice(bytes);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
        let mut tree = self.tree.write();
        if !tree.parent_exists(to) {
            return Err(StorageError::not_found(to));
        }
        let data = tree
            .files
            .remove(from)
            .ok_or_else(|| StorageError::not_found(from))?;
        tree.files.insert(to.to_path_buf(), data);
        Ok(())
    }

    fn remove_file(&self, path: &Path) -> StorageResult<()> {
        self.tree
            .write()
            .files
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(path))
    }

    fn sync_file(&self, path: &Path) -> StorageResult<()> {
        if self.tree.read().files.contains_key(path) {
            Ok(())
        } else {
            Err(StorageError::not_found(path))
        }
    }

    fn sync_dir(&self, path: &Path) -> StorageResult<()> {
        if self.tree.read().dirs.contains(path) {
            Ok(())
        } else {
            Err(StorageError::not_found(path))
        }
    }
}
