//! Empty file pool partition: one storage location, one pool per size class.

use super::{parse_pool_dir_name, pool_dir_name, EmptyFilePool};
use crate::context::JournalContext;
use crate::error::{CoreError, CoreResult};
use crate::types::{FileSizeKib, PartitionNumber};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Name of the directory holding the pools inside a partition.
pub const EFP_TOP_LEVEL_DIR: &str = "efp";

/// A physical storage location hosting empty file pools grouped by size class.
///
/// # Thread Safety
///
/// The size-class map has its own mutex. [`Self::discover_pools`] holds it
/// for the whole rescan, so concurrent discoveries are serialized; lookups
/// take it only long enough to clone an `Arc`. Pools handed out keep working
/// while a rescan runs.
///
/// # Example
///
/// ```rust
/// use lstore_core::{Config, EmptyFilePoolPartition, FileSizeKib, JournalContext, PartitionNumber};
/// use std::path::Path;
///
/// let ctx = JournalContext::in_memory(Config::default());
/// ctx.fs().create_dir_all(Path::new("/store/p001/efp/2048k")).unwrap();
///
/// let partition = EmptyFilePoolPartition::new(&ctx, PartitionNumber::new(1), "/store/p001").unwrap();
/// partition.discover_pools().unwrap();
/// assert_eq!(partition.list_pool_sizes(), vec![FileSizeKib::new(2048)]);
/// ```
#[derive(Debug)]
pub struct EmptyFilePoolPartition {
    ctx: Arc<JournalContext>,
    number: PartitionNumber,
    dir: PathBuf,
    pools: Mutex<BTreeMap<FileSizeKib, Arc<EmptyFilePool>>>,
}

impl EmptyFilePoolPartition {
    /// Creates a partition over `dir` without discovering its pools.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPartitionDirectory` if `dir` does not exist, is not a
    /// directory or cannot be listed.
    pub fn new(
        ctx: &Arc<JournalContext>,
        number: PartitionNumber,
        dir: impl Into<PathBuf>,
    ) -> CoreResult<Self> {
        let dir = dir.into();
        Self::validate_partition_dir(ctx, &dir)?;
        Ok(Self {
            ctx: Arc::clone(ctx),
            number,
            dir,
            pools: Mutex::new(BTreeMap::new()),
        })
    }

    fn validate_partition_dir(ctx: &JournalContext, dir: &Path) -> CoreResult<()> {
        let fs = ctx.fs();
        if !fs.exists(dir) {
            return Err(CoreError::invalid_partition_dir(dir, "does not exist"));
        }
        if !fs.is_dir(dir) {
            return Err(CoreError::invalid_partition_dir(dir, "not a directory"));
        }
        fs.read_dir(dir)
            .map_err(|e| CoreError::invalid_partition_dir(dir, e.to_string()))?;
        Ok(())
    }

    /// Returns the directory holding this partition's pools.
    #[must_use]
    pub fn efp_dir(&self) -> PathBuf {
        self.dir.join(EFP_TOP_LEVEL_DIR)
    }

    /// Scans the partition for size-class directories and updates the pool map.
    ///
    /// Newly found size classes get a pool; pools already known are kept as
    /// they are, so files they have handed out stay accounted for; pools
    /// whose directory has vanished are dropped. Calling this again without
    /// changes on disk leaves the map unchanged.
    ///
    /// Returns the number of pools known after the scan.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the `efp` directory cannot be created or
    /// listed. A pool directory that fails to open is skipped with a warning.
    pub fn discover_pools(&self) -> CoreResult<usize> {
        let fs = self.ctx.fs();
        let efp_dir = self.efp_dir();
        let mut pools = self.pools.lock();

        if !fs.is_dir(&efp_dir) {
            if !self.ctx.config().create_efp_dir {
                warn!(partition = %self.number, dir = %efp_dir.display(), "no efp directory");
                pools.clear();
                return Ok(0);
            }
            fs.create_dir_all(&efp_dir)?;
            debug!(dir = %efp_dir.display(), "created efp directory");
        }

        let mut found = BTreeSet::new();
        for entry in fs.read_dir(&efp_dir)? {
            if !entry.is_dir {
                continue;
            }
            let Some(size) = parse_pool_dir_name(&entry.name) else {
                debug!(name = %entry.name, "ignoring non-pool directory");
                continue;
            };
            found.insert(size);
            if pools.contains_key(&size) {
                continue;
            }
            match EmptyFilePool::open(&self.ctx, self.number, efp_dir.join(&entry.name)) {
                Ok(pool) => {
                    pools.insert(size, Arc::new(pool));
                }
                Err(e) => {
                    warn!(partition = %self.number, size = %size, error = %e, "cannot open pool");
                    found.remove(&size);
                }
            }
        }

        pools.retain(|size, _| {
            let keep = found.contains(size);
            if !keep {
                warn!(partition = %self.number, size = %size, "pool directory vanished");
            }
            keep
        });

        info!(
            partition = %self.number,
            pools = pools.len(),
            "discovered empty file pools"
        );
        Ok(pools.len())
    }

    /// Returns the pool of `size_kib` files.
    ///
    /// # Errors
    ///
    /// Returns `PoolNotFound` if no such pool has been discovered.
    pub fn get_pool(&self, size_kib: FileSizeKib) -> CoreResult<Arc<EmptyFilePool>> {
        self.pools
            .lock()
            .get(&size_kib)
            .cloned()
            .ok_or(CoreError::PoolNotFound {
                partition: self.number,
                size_kib,
            })
    }

    /// Returns the known size classes in ascending order.
    #[must_use]
    pub fn list_pool_sizes(&self) -> Vec<FileSizeKib> {
        self.pools.lock().keys().copied().collect()
    }

    /// Returns a snapshot of all pools, smallest size class first.
    #[must_use]
    pub fn list_pools(&self) -> Vec<Arc<EmptyFilePool>> {
        self.pools.lock().values().cloned().collect()
    }

    /// Creates a pool directory for `size_kib` and fills it with `initial_files`.
    ///
    /// If the pool already exists it is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the directory or files cannot be created.
    pub fn create_pool(
        &self,
        size_kib: FileSizeKib,
        initial_files: usize,
    ) -> CoreResult<Arc<EmptyFilePool>> {
        let mut pools = self.pools.lock();
        if let Some(pool) = pools.get(&size_kib) {
            return Ok(Arc::clone(pool));
        }

        let dir = self.efp_dir().join(pool_dir_name(size_kib));
        self.ctx.fs().create_dir_all(&dir)?;
        let pool = Arc::new(EmptyFilePool::open(&self.ctx, self.number, dir)?);
        pool.grow(initial_files)?;
        pools.insert(size_kib, Arc::clone(&pool));
        Ok(pool)
    }

    /// Returns the partition number.
    #[must_use]
    pub fn partition_number(&self) -> PartitionNumber {
        self.number
    }

    /// Returns the partition directory.
    #[must_use]
    pub fn partition_dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use lstore_storage::FileSystem;
    use std::thread;

    fn ctx() -> Arc<JournalContext> {
        JournalContext::in_memory(Config::default())
    }

    #[test]
    fn missing_directory_rejected() {
        let ctx = ctx();
        let result = EmptyFilePoolPartition::new(&ctx, PartitionNumber::new(1), "/missing");
        assert!(matches!(
            result,
            Err(CoreError::InvalidPartitionDirectory { .. })
        ));
    }

    #[test]
    fn file_instead_of_directory_rejected() {
        let ctx = ctx();
        ctx.fs().create_dir_all(Path::new("/store")).unwrap();
        ctx.fs().create_file(Path::new("/store/p001"), 0).unwrap();
        let result = EmptyFilePoolPartition::new(&ctx, PartitionNumber::new(1), "/store/p001");
        assert!(matches!(
            result,
            Err(CoreError::InvalidPartitionDirectory { .. })
        ));
    }

    #[test]
    fn discovery_finds_size_classes() {
        let ctx = ctx();
        for dir in ["/p/efp/2048k", "/p/efp/512k", "/p/efp/scratch"] {
            ctx.fs().create_dir_all(Path::new(dir)).unwrap();
        }
        let partition = EmptyFilePoolPartition::new(&ctx, PartitionNumber::new(1), "/p").unwrap();
        assert!(partition.list_pool_sizes().is_empty());

        assert_eq!(partition.discover_pools().unwrap(), 2);
        assert_eq!(
            partition.list_pool_sizes(),
            vec![FileSizeKib::new(512), FileSizeKib::new(2048)]
        );
        assert_eq!(partition.list_pools().len(), 2);
        assert!(partition.get_pool(FileSizeKib::new(512)).is_ok());
    }

    #[test]
    fn unknown_size_is_pool_not_found() {
        let ctx = ctx();
        ctx.fs().create_dir_all(Path::new("/p")).unwrap();
        let partition = EmptyFilePoolPartition::new(&ctx, PartitionNumber::new(1), "/p").unwrap();
        partition.discover_pools().unwrap();

        let result = partition.get_pool(FileSizeKib::new(2048));
        assert!(matches!(result, Err(CoreError::PoolNotFound { .. })));
        assert!(ctx.fs().is_dir(&partition.efp_dir()));
    }

    #[test]
    fn missing_efp_dir_without_create() {
        let ctx = JournalContext::in_memory(Config::default().create_efp_dir(false));
        ctx.fs().create_dir_all(Path::new("/p")).unwrap();
        let partition = EmptyFilePoolPartition::new(&ctx, PartitionNumber::new(1), "/p").unwrap();

        assert_eq!(partition.discover_pools().unwrap(), 0);
        assert!(!ctx.fs().exists(&partition.efp_dir()));
    }

    #[test]
    fn rediscovery_keeps_existing_pools() {
        let ctx = ctx();
        ctx.fs().create_dir_all(Path::new("/p/efp/4k")).unwrap();
        let partition = EmptyFilePoolPartition::new(&ctx, PartitionNumber::new(1), "/p").unwrap();
        partition.discover_pools().unwrap();

        let pool = partition.get_pool(FileSizeKib::new(4)).unwrap();
        pool.grow(2).unwrap();
        let _held = pool.acquire().unwrap();

        ctx.fs().create_dir_all(Path::new("/p/efp/8k")).unwrap();
        assert_eq!(partition.discover_pools().unwrap(), 2);

        let again = partition.get_pool(FileSizeKib::new(4)).unwrap();
        assert!(Arc::ptr_eq(&pool, &again));
        assert_eq!(again.available(), 1);
        assert_eq!(again.capacity(), 2);
    }

    #[test]
    fn create_pool_is_discoverable() {
        let ctx = ctx();
        ctx.fs().create_dir_all(Path::new("/p")).unwrap();
        let partition = EmptyFilePoolPartition::new(&ctx, PartitionNumber::new(3), "/p").unwrap();

        let pool = partition.create_pool(FileSizeKib::new(16), 2).unwrap();
        assert_eq!(pool.available(), 2);
        assert_eq!(pool.partition_number(), PartitionNumber::new(3));

        let same = partition.create_pool(FileSizeKib::new(16), 5).unwrap();
        assert!(Arc::ptr_eq(&pool, &same));

        let fresh = EmptyFilePoolPartition::new(&ctx, PartitionNumber::new(3), "/p").unwrap();
        fresh.discover_pools().unwrap();
        assert_eq!(
            fresh.get_pool(FileSizeKib::new(16)).unwrap().available(),
            2
        );
    }

    #[test]
    fn concurrent_discovery_and_lookup() {
        let ctx = ctx();
        ctx.fs().create_dir_all(Path::new("/p/efp/4k")).unwrap();
        let partition = Arc::new(
            EmptyFilePoolPartition::new(&ctx, PartitionNumber::new(1), "/p").unwrap(),
        );
        partition.discover_pools().unwrap();

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let partition = Arc::clone(&partition);
                thread::spawn(move || {
                    for _ in 0..50 {
                        if i % 2 == 0 {
                            partition.discover_pools().unwrap();
                        } else {
                            partition.get_pool(FileSizeKib::new(4)).unwrap();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(partition.list_pool_sizes(), vec![FileSizeKib::new(4)]);
    }
}
