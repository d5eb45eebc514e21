//! Test fixtures and store helpers.
//!
//! Provides convenience functions for laying out a store root with
//! partitions and pools, and for stamping journal files taken from them.

use lstore_core::efp::{partition_dir_name, pool_dir_name, EFP_TOP_LEVEL_DIR};
use lstore_core::record::FileHeader;
use lstore_core::{
    Config, EmptyFilePool, EmptyFilePoolManager, FileSizeKib, JournalContext, JournalWriter,
    PartitionNumber, Rid,
};
use lstore_storage::{FileSystem, InMemoryFileSystem, OsFileSystem};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Once};
use tempfile::TempDir;

/// Name of the directory holding journal directories under a test store root.
pub const JOURNAL_DIR: &str = "jrnl";

/// A store root with automatic cleanup.
pub struct TestStore {
    /// The context every component of the store shares.
    pub ctx: Arc<JournalContext>,
    root: PathBuf,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: Option<TempDir>,
}

impl TestStore {
    /// Creates a store on the in-memory file system.
    pub fn memory() -> Self {
        Self::memory_with_config(Config::default())
    }

    /// Creates a store on the in-memory file system with `config`.
    pub fn memory_with_config(config: Config) -> Self {
        let ctx = JournalContext::new(config, Arc::new(InMemoryFileSystem::new()));
        let root = PathBuf::from("/store");
        ctx.fs()
            .create_dir_all(&root)
            .expect("Failed to create store root");
        Self {
            ctx,
            root,
            _temp_dir: None,
        }
    }

    /// Creates a store in a temporary directory.
    pub fn on_disk() -> Self {
        Self::on_disk_with_config(Config::default())
    }

    /// Creates a store in a temporary directory with `config`.
    pub fn on_disk_with_config(config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path().to_path_buf();
        Self {
            ctx: JournalContext::new(config, Arc::new(OsFileSystem::new())),
            root,
            _temp_dir: Some(temp_dir),
        }
    }

    /// Returns the store root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory of partition `partition`.
    pub fn partition_dir(&self, partition: u16) -> PathBuf {
        self.root.join(partition_dir_name(PartitionNumber::new(partition)))
    }

    /// Returns the directory of the `size_kib` pool in `partition`.
    pub fn pool_dir(&self, partition: u16, size_kib: u32) -> PathBuf {
        self.partition_dir(partition)
            .join(EFP_TOP_LEVEL_DIR)
            .join(pool_dir_name(FileSizeKib::new(size_kib)))
    }

    /// Creates a pool directory holding `files` empty files and opens it.
    pub fn add_pool(&self, partition: u16, size_kib: u32, files: usize) -> Arc<EmptyFilePool> {
        let dir = self.pool_dir(partition, size_kib);
        self.ctx
            .fs()
            .create_dir_all(&dir)
            .expect("Failed to create pool directory");
        let pool = EmptyFilePool::open(&self.ctx, PartitionNumber::new(partition), dir)
            .expect("Failed to open pool");
        pool.grow(files).expect("Failed to grow pool");
        Arc::new(pool)
    }

    /// Returns a manager over the store root with partitions discovered.
    pub fn manager(&self) -> EmptyFilePoolManager {
        let manager =
            EmptyFilePoolManager::new(&self.ctx, &self.root).expect("Failed to open manager");
        manager
            .discover_partitions()
            .expect("Failed to discover partitions");
        manager
    }

    /// Returns the journal directory of `queue`, creating it.
    pub fn journal_dir(&self, queue: &str) -> PathBuf {
        let dir = self.root.join(JOURNAL_DIR).join(queue);
        self.ctx
            .fs()
            .create_dir_all(&dir)
            .expect("Failed to create journal directory");
        dir
    }

    /// Takes a file from `pool` into the journal of `queue` and stamps it.
    ///
    /// Record ids start at 1.
    pub fn new_journal(&self, pool: &EmptyFilePool, queue: &str, serial: u64) -> JournalWriter {
        self.new_journal_from(pool, queue, serial, 0, Rid::new(1))
    }

    /// Like [`Self::new_journal`] with an explicit file number and first rid.
    pub fn new_journal_from(
        &self,
        pool: &EmptyFilePool,
        queue: &str,
        serial: u64,
        file_number: u64,
        first_rid: Rid,
    ) -> JournalWriter {
        let path = pool
            .take_file(&self.journal_dir(queue))
            .expect("Failed to take file from pool");
        let header = FileHeader::for_journal(
            pool.partition_number(),
            pool.data_size_kib(),
            serial,
            file_number,
            queue,
        )
        .expect("Failed to build file header");
        JournalWriter::create(&self.ctx, path, header, first_rid)
            .expect("Failed to create journal writer")
    }

    /// Inverts the byte at `offset` of the file at `path`.
    pub fn flip_byte(&self, path: &Path, offset: u64) {
        let fs = self.ctx.fs();
        let byte = fs.read_at(path, offset, 1).expect("Failed to read byte")[0];
        fs.write_at(path, offset, &[!byte])
            .expect("Failed to write byte");
    }
}

static TRACING: Once = Once::new();

/// Installs a test-friendly tracing subscriber, filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs it.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
