//! Directory and file API trait definition.

use crate::error::StorageResult;
use std::fmt;
use std::path::Path;

/// A single entry returned by [`FileSystem::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// File name of the entry (last path component).
    pub name: String,
    /// Whether the entry is a directory.
    pub is_dir: bool,
    /// Length in bytes (zero for directories).
    pub len: u64,
}

/// The directory and file primitives the journal relies on.
///
/// Backends are **opaque byte movers**. They do not understand file headers,
/// pool directories or record framing; that interpretation belongs to
/// `lstore_core`.
///
/// # Invariants
///
/// - `create_file` never overwrites an existing file
/// - `create_file` returns a zero-filled file of exactly the requested length
/// - `write_at` past the current end extends the file
/// - `read_at` returns exactly the requested bytes or fails with `ReadPastEnd`
/// - `read_dir` returns entries sorted by name
///
/// # Implementors
///
/// - [`super::OsFileSystem`] - For persistent storage
/// - [`super::InMemoryFileSystem`] - For testing
pub trait FileSystem: Send + Sync + fmt::Debug {
    /// Returns true if `path` exists (file or directory).
    fn exists(&self, path: &Path) -> bool;

    /// Returns true if `path` exists and is a directory.
    fn is_dir(&self, path: &Path) -> bool;

    /// Creates `path` and all missing parents.
    ///
    /// # Errors
    ///
    /// Returns an error if a component exists and is a file, or on I/O failure.
    fn create_dir_all(&self, path: &Path) -> StorageResult<()>;

    /// Lists the direct children of a directory, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the directory is missing and `NotADirectory` if
    /// `path` is a file.
    fn read_dir(&self, path: &Path) -> StorageResult<Vec<DirEntry>>;

    /// Creates a new zero-filled file of `len` bytes, with its space reserved.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the file is present, `NotFound` if the parent
    /// directory is missing.
    fn create_file(&self, path: &Path, len: u64) -> StorageResult<()>;

    /// Returns the length of a file in bytes.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file does not exist.
    fn file_len(&self, path: &Path) -> StorageResult<u64>;

    /// Reads `len` bytes from `path` starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `ReadPastEnd` if the range extends past the end of the file.
    fn read_at(&self, path: &Path, offset: u64, len: usize) -> StorageResult<Vec<u8>>;

    /// Writes `data` into `path` at `offset`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file does not exist.
    fn write_at(&self, path: &Path, offset: u64, data: &[u8]) -> StorageResult<()>;

    /// Moves a file, replacing `to` if it exists.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if `from` does not exist or the parent of `to` is
    /// missing.
    fn rename(&self, from: &Path, to: &Path) -> StorageResult<()>;

    /// Deletes a file.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the file does not exist.
    fn remove_file(&self, path: &Path) -> StorageResult<()>;

    /// Syncs file data and metadata to durable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync_file(&self, path: &Path) -> StorageResult<()>;

    /// Syncs a directory so that entry creation, rename and removal are durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync_dir(&self, path: &Path) -> StorageResult<()>;
}
