//! A pool of pre-allocated files of one size class.

use super::parse_pool_dir_name;
use crate::context::JournalContext;
use crate::error::{CoreError, CoreResult};
use crate::record::{FileHeader, SBLK_SIZE};
use crate::types::{FileSizeKib, PartitionNumber};
use parking_lot::Mutex;
use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Handle to one empty file owned by a pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyFile {
    id: u64,
    path: PathBuf,
}

impl EmptyFile {
    /// Returns the pool-local id of the file.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Returns the path of the file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Files ready to hand out and the paths of those handed out.
#[derive(Debug, Default)]
struct PoolFiles {
    available: VecDeque<EmptyFile>,
    outstanding: BTreeSet<PathBuf>,
}

/// A pool of reusable files of one size class.
///
/// # Thread Safety
///
/// The file lists have their own mutex, so acquiring a file on
/// the write path never waits for partition discovery or maintenance sweeps.
/// Every operation fails fast; an exhausted pool returns `PoolExhausted`
/// rather than blocking.
#[derive(Debug)]
pub struct EmptyFilePool {
    ctx: Arc<JournalContext>,
    partition: PartitionNumber,
    data_size_kib: FileSizeKib,
    directory: PathBuf,
    files: Mutex<PoolFiles>,
    next_id: AtomicU64,
}

impl EmptyFilePool {
    /// Opens the pool rooted at `directory` and loads the files it holds.
    ///
    /// The size class is taken from the directory name (`2048k`). When
    /// `verify_pool_files` is set, files of the wrong length or without a
    /// reset file header are skipped with a warning.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPartitionDirectory` if the directory name is not a
    /// size class, or a storage error if it cannot be listed.
    pub fn open(
        ctx: &Arc<JournalContext>,
        partition: PartitionNumber,
        directory: impl Into<PathBuf>,
    ) -> CoreResult<Self> {
        let directory = directory.into();
        let data_size_kib = directory
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(parse_pool_dir_name)
            .ok_or_else(|| {
                CoreError::invalid_partition_dir(&directory, "not an empty file pool directory")
            })?;

        let pool = Self {
            ctx: Arc::clone(ctx),
            partition,
            data_size_kib,
            directory,
            files: Mutex::new(PoolFiles::default()),
            next_id: AtomicU64::new(0),
        };
        pool.load()?;
        debug!(
            partition = %partition,
            size = %data_size_kib,
            files = pool.available(),
            "opened empty file pool"
        );
        Ok(pool)
    }

    fn load(&self) -> CoreResult<()> {
        let fs = self.ctx.fs();
        let expected_len = self.file_size_bytes();
        let mut files = Vec::new();

        for entry in fs.read_dir(&self.directory)? {
            if entry.is_dir || !self.ctx.is_journal_file_name(&entry.name) {
                continue;
            }
            let path = self.directory.join(&entry.name);
            if self.ctx.config().verify_pool_files {
                if entry.len != expected_len {
                    warn!(
                        path = %path.display(),
                        len = entry.len,
                        expected = expected_len,
                        "skipping pool file of wrong size"
                    );
                    continue;
                }
                if let Err(e) = self.check_reset_header(&path) {
                    warn!(path = %path.display(), error = %e, "skipping pool file");
                    continue;
                }
            }
            files.push(self.new_handle(path));
        }

        self.files.lock().available.extend(files);
        Ok(())
    }

    fn check_reset_header(&self, path: &Path) -> CoreResult<()> {
        let bytes = self.ctx.fs().read_at(path, 0, SBLK_SIZE)?;
        let header = FileHeader::decode(&bytes)
            .map_err(|e| CoreError::invalid_file_header(path, e.to_string()))?;
        if !header.is_empty() {
            return Err(CoreError::invalid_file_header(path, "file still holds records"));
        }
        if header.data_size_kib != self.data_size_kib {
            return Err(CoreError::invalid_file_header(
                path,
                format!("data size {} in a {} pool", header.data_size_kib, self.data_size_kib),
            ));
        }
        Ok(())
    }

    fn new_handle(&self, path: PathBuf) -> EmptyFile {
        EmptyFile {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            path,
        }
    }

    /// Removes a file from the pool and hands it to the caller.
    ///
    /// # Errors
    ///
    /// Returns `PoolExhausted` if no file is available.
    pub fn acquire(&self) -> CoreResult<EmptyFile> {
        let mut files = self.files.lock();
        let file = files.available.pop_front().ok_or(CoreError::PoolExhausted {
            partition: self.partition,
            size_kib: self.data_size_kib,
        })?;
        files.outstanding.insert(file.path.clone());
        Ok(file)
    }

    /// Puts a file back into the pool.
    ///
    /// The caller must have reset the file's content; the handle's path must
    /// still lie inside the pool directory. A handle this pool did not hand
    /// out is adopted as a new available file and leaves the count of
    /// acquired files untouched.
    pub fn release(&self, file: EmptyFile) {
        let mut files = self.files.lock();
        if !files.outstanding.remove(&file.path) {
            debug!(path = %file.path.display(), "adopting file the pool did not hand out");
        }
        files.available.push_back(file);
    }

    /// Puts a handle back at the head of the queue after a failed move.
    fn restore(&self, file: EmptyFile) {
        let mut files = self.files.lock();
        files.outstanding.remove(&file.path);
        files.available.push_front(file);
    }

    /// Acquires a file and moves it into `dest_dir`, returning its new path.
    ///
    /// # Errors
    ///
    /// Returns `PoolExhausted` if the pool is empty, or a storage error if the
    /// move or the directory sync after it fails. On a failed sync the file
    /// is moved back; either way the file stays in the pool. If moving it
    /// back fails too, the file stays in `dest_dir` and its path is returned.
    pub fn take_file(&self, dest_dir: &Path) -> CoreResult<PathBuf> {
        let file = self.acquire()?;
        let Some(name) = file.path.file_name().map(|n| n.to_os_string()) else {
            self.restore(file);
            return Err(CoreError::invalid_partition_dir(
                &self.directory,
                "pool file has no name",
            ));
        };
        let dest = dest_dir.join(name);
        let fs = self.ctx.fs();

        if let Err(e) = fs.rename(&file.path, &dest) {
            self.restore(file);
            return Err(e.into());
        }
        let synced = self
            .ctx
            .sync_dir(&self.directory)
            .and_then(|()| self.ctx.sync_dir(dest_dir));
        if let Err(e) = synced {
            warn!(path = %dest.display(), error = %e, "directory sync failed after take");
            if let Err(back) = fs.rename(&dest, &file.path) {
                warn!(path = %dest.display(), error = %back, "file left outside the pool");
                self.moved(&file.path, &dest);
                return Ok(dest);
            }
            self.restore(file);
            return Err(e);
        }

        self.moved(&file.path, &dest);
        debug!(from = %file.path.display(), to = %dest.display(), "took empty file");
        Ok(dest)
    }

    /// Follows a handed out file to its new path.
    fn moved(&self, from: &Path, to: &Path) {
        let mut files = self.files.lock();
        files.outstanding.remove(from);
        files.outstanding.insert(to.to_path_buf());
    }

    /// Resets a file's header and moves it from a journal back into the pool.
    ///
    /// # Errors
    ///
    /// - `InvalidFileHeader` if the file length does not match this pool
    /// - storage errors from the reset or the move
    pub fn return_file(&self, path: &Path) -> CoreResult<EmptyFile> {
        let fs = self.ctx.fs();
        let len = fs.file_len(path)?;
        if len != self.file_size_bytes() {
            return Err(CoreError::invalid_file_header(
                path,
                format!("length {len} does not match {} pool", self.data_size_kib),
            ));
        }

        let header = FileHeader::empty(self.partition, self.data_size_kib);
        fs.write_at(path, 0, &header.encode())?;
        if self.ctx.config().sync_on_move {
            fs.sync_file(path)?;
        }

        let mut dest = match path.file_name() {
            Some(name) => self.directory.join(name),
            None => self.unique_path(),
        };
        if fs.exists(&dest) {
            dest = self.unique_path();
        }
        fs.rename(path, &dest)?;
        if let Some(parent) = path.parent() {
            self.ctx.sync_dir(parent)?;
        }
        self.ctx.sync_dir(&self.directory)?;

        let file = self.new_handle(dest);
        {
            let mut files = self.files.lock();
            files.outstanding.remove(path);
            files.available.push_back(file.clone());
        }
        debug!(path = %file.path.display(), "returned file to pool");
        Ok(file)
    }

    fn unique_path(&self) -> PathBuf {
        self.directory.join(format!(
            "{}.{}",
            Uuid::new_v4(),
            self.ctx.config().file_extension
        ))
    }

    /// Creates `count` new pre-allocated files in the pool.
    ///
    /// Returns the number of files created.
    ///
    /// # Errors
    ///
    /// Returns a storage error if a file cannot be created; files created
    /// before the failure stay in the pool.
    pub fn grow(&self, count: usize) -> CoreResult<usize> {
        let fs = self.ctx.fs();
        let header = FileHeader::empty(self.partition, self.data_size_kib).encode();

        for created in 0..count {
            let path = self.unique_path();
            let result = fs
                .create_file(&path, self.file_size_bytes())
                .and_then(|()| fs.write_at(&path, 0, &header))
                .and_then(|()| {
                    if self.ctx.config().sync_on_move {
                        fs.sync_file(&path)
                    } else {
                        Ok(())
                    }
                });
            if let Err(e) = result {
                warn!(path = %path.display(), error = %e, created, "pool growth failed");
                return Err(e.into());
            }
            let file = self.new_handle(path);
            self.files.lock().available.push_back(file);
        }
        self.ctx.sync_dir(&self.directory)?;

        info!(
            partition = %self.partition,
            size = %self.data_size_kib,
            count,
            "grew empty file pool"
        );
        Ok(count)
    }

    /// Returns the data size of each file in KiB.
    #[must_use]
    pub fn data_size_kib(&self) -> FileSizeKib {
        self.data_size_kib
    }

    /// Returns the on-disk length of each file, header included.
    #[must_use]
    pub fn file_size_bytes(&self) -> u64 {
        FileHeader::file_len(self.data_size_kib)
    }

    /// Returns the number of files ready to be acquired.
    #[must_use]
    pub fn available(&self) -> usize {
        self.files.lock().available.len()
    }

    /// Returns the number of files owned by the pool, acquired ones included.
    #[must_use]
    pub fn capacity(&self) -> usize {
        let files = self.files.lock();
        files.available.len() + files.outstanding.len()
    }

    /// Returns the number of files handed out and not yet returned.
    #[must_use]
    pub fn in_use(&self) -> usize {
        self.files.lock().outstanding.len()
    }

    /// Returns the partition owning the pool.
    #[must_use]
    pub fn partition_number(&self) -> PartitionNumber {
        self.partition
    }

    /// Returns the pool directory.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use lstore_storage::{DirEntry, FileSystem, InMemoryFileSystem, StorageError, StorageResult};
    use std::sync::atomic::AtomicBool;

    /// In-memory file system whose directory syncs can be made to fail.
    #[derive(Debug, Default)]
    struct FlakySync {
        inner: InMemoryFileSystem,
        fail_dir_sync: AtomicBool,
    }

    impl FileSystem for FlakySync {
        fn exists(&self, path: &Path) -> bool {
            self.inner.exists(path)
        }
        fn is_dir(&self, path: &Path) -> bool {
            self.inner.is_dir(path)
        }
        fn create_dir_all(&self, path: &Path) -> StorageResult<()> {
            self.inner.create_dir_all(path)
        }
        fn read_dir(&self, path: &Path) -> StorageResult<Vec<DirEntry>> {
            self.inner.read_dir(path)
        }
        fn create_file(&self, path: &Path, len: u64) -> StorageResult<()> {
            self.inner.create_file(path, len)
        }
        fn file_len(&self, path: &Path) -> StorageResult<u64> {
            self.inner.file_len(path)
        }
        fn read_at(&self, path: &Path, offset: u64, len: usize) -> StorageResult<Vec<u8>> {
            self.inner.read_at(path, offset, len)
        }
        fn write_at(&self, path: &Path, offset: u64, bytes: &[u8]) -> StorageResult<()> {
            self.inner.write_at(path, offset, bytes)
        }
        fn rename(&self, from: &Path, to: &Path) -> StorageResult<()> {
            self.inner.rename(from, to)
        }
        fn remove_file(&self, path: &Path) -> StorageResult<()> {
            self.inner.remove_file(path)
        }
        fn sync_file(&self, path: &Path) -> StorageResult<()> {
            self.inner.sync_file(path)
        }
        fn sync_dir(&self, path: &Path) -> StorageResult<()> {
            if self.fail_dir_sync.load(Ordering::Relaxed) {
                return Err(StorageError::Io(std::io::Error::other("sync refused")));
            }
            self.inner.sync_dir(path)
        }
    }

    fn setup(files: usize) -> (Arc<JournalContext>, EmptyFilePool) {
        let ctx = JournalContext::in_memory(Config::default());
        let dir = Path::new("/store/p001/efp/4k");
        ctx.fs().create_dir_all(dir).unwrap();
        let pool = EmptyFilePool::open(&ctx, PartitionNumber::new(1), dir).unwrap();
        pool.grow(files).unwrap();
        (ctx, pool)
    }

    #[test]
    fn open_requires_size_class_name() {
        let ctx = JournalContext::in_memory(Config::default());
        ctx.fs().create_dir_all(Path::new("/store/p001/efp/big")).unwrap();
        let result = EmptyFilePool::open(&ctx, PartitionNumber::new(1), "/store/p001/efp/big");
        assert!(matches!(
            result,
            Err(CoreError::InvalidPartitionDirectory { .. })
        ));
    }

    #[test]
    fn grow_creates_sized_files() {
        let (ctx, pool) = setup(3);
        assert_eq!(pool.available(), 3);
        assert_eq!(pool.capacity(), 3);
        assert_eq!(pool.file_size_bytes(), 4096 + 4 * 1024);

        let entries = ctx.fs().read_dir(pool.directory()).unwrap();
        assert_eq!(entries.len(), 3);
        assert!(entries.iter().all(|e| e.len == pool.file_size_bytes()));
    }

    #[test]
    fn acquire_until_exhausted() {
        let (_ctx, pool) = setup(2);
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert_ne!(a.id(), b.id());
        assert_eq!(pool.available(), 0);
        assert_eq!(pool.capacity(), 2);

        let result = pool.acquire();
        assert!(matches!(result, Err(CoreError::PoolExhausted { .. })));

        pool.release(a);
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.capacity(), 2);
    }

    #[test]
    fn reopen_finds_existing_files() {
        let (ctx, pool) = setup(4);
        let reopened = EmptyFilePool::open(&ctx, PartitionNumber::new(1), pool.directory()).unwrap();
        assert_eq!(reopened.available(), 4);
        assert_eq!(reopened.data_size_kib(), FileSizeKib::new(4));
    }

    #[test]
    fn wrong_sized_and_foreign_files_skipped() {
        let (ctx, pool) = setup(1);
        let dir = pool.directory().to_path_buf();
        ctx.fs().create_file(&dir.join("short.jrnl"), 100).unwrap();
        ctx.fs().create_file(&dir.join("notes.txt"), 100).unwrap();
        // Right size, but never given a file header
        ctx.fs()
            .create_file(&dir.join("blank.jrnl"), pool.file_size_bytes())
            .unwrap();

        let reopened = EmptyFilePool::open(&ctx, PartitionNumber::new(1), &dir).unwrap();
        assert_eq!(reopened.available(), 1);
    }

    #[test]
    fn take_and_return_moves_file() {
        let (ctx, pool) = setup(1);
        let journal_dir = Path::new("/store/jrnl/orders");
        ctx.fs().create_dir_all(journal_dir).unwrap();

        let taken = pool.take_file(journal_dir).unwrap();
        assert!(taken.starts_with(journal_dir));
        assert!(ctx.fs().exists(&taken));
        assert_eq!(pool.available(), 0);

        // Simulate the journal stamping the file
        let header = FileHeader::for_journal(
            PartitionNumber::new(1),
            FileSizeKib::new(4),
            7,
            1,
            "orders",
        )
        .unwrap();
        ctx.fs().write_at(&taken, 0, &header.encode()).unwrap();

        let returned = pool.return_file(&taken).unwrap();
        assert!(!ctx.fs().exists(&taken));
        assert!(returned.path().starts_with(pool.directory()));
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.capacity(), 1);

        let bytes = ctx.fs().read_at(returned.path(), 0, SBLK_SIZE).unwrap();
        assert!(FileHeader::decode(&bytes).unwrap().is_empty());
    }

    #[test]
    fn take_into_missing_dir_keeps_file() {
        let (_ctx, pool) = setup(1);
        let result = pool.take_file(Path::new("/nowhere"));
        assert!(result.is_err());
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.capacity(), 1);
    }

    #[test]
    fn return_rejects_wrong_size() {
        let (ctx, pool) = setup(0);
        ctx.fs().create_dir_all(Path::new("/other")).unwrap();
        ctx.fs().create_file(Path::new("/other/x.jrnl"), 10).unwrap();

        let result = pool.return_file(Path::new("/other/x.jrnl"));
        assert!(matches!(result, Err(CoreError::InvalidFileHeader { .. })));
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn failed_sync_after_take_keeps_file_in_pool() {
        let fs = Arc::new(FlakySync::default());
        let ctx = JournalContext::new(Config::default(), Arc::clone(&fs) as Arc<dyn FileSystem>);
        let dir = Path::new("/store/p001/efp/4k");
        let journal_dir = Path::new("/store/jrnl/orders");
        fs.create_dir_all(dir).unwrap();
        fs.create_dir_all(journal_dir).unwrap();
        let pool = EmptyFilePool::open(&ctx, PartitionNumber::new(1), dir).unwrap();
        pool.grow(1).unwrap();

        fs.fail_dir_sync.store(true, Ordering::Relaxed);
        let result = pool.take_file(journal_dir);
        assert!(matches!(result, Err(CoreError::Storage(_))));
        assert_eq!(pool.available(), 1);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.capacity(), 1);
        assert_eq!(fs.read_dir(dir).unwrap().len(), 1);
        assert!(fs.read_dir(journal_dir).unwrap().is_empty());

        fs.fail_dir_sync.store(false, Ordering::Relaxed);
        let taken = pool.take_file(journal_dir).unwrap();
        assert!(fs.exists(&taken));
        assert_eq!(pool.in_use(), 1);
    }

    #[test]
    fn release_of_foreign_handle_keeps_count() {
        let (ctx, pool) = setup(1);
        let held = pool.acquire().unwrap();
        assert_eq!(pool.in_use(), 1);

        let stray = pool.directory().join("stray.jrnl");
        ctx.fs().create_file(&stray, pool.file_size_bytes()).unwrap();
        pool.release(EmptyFile { id: 99, path: stray });
        assert_eq!(pool.in_use(), 1);
        assert_eq!(pool.capacity(), 2);

        pool.release(held);
        assert_eq!(pool.in_use(), 0);
        assert_eq!(pool.capacity(), 2);
    }
}
