//! Store-wide registry of empty file pool partitions.

use super::{parse_partition_dir_name, partition_dir_name, EmptyFilePool, EmptyFilePoolPartition};
use crate::context::JournalContext;
use crate::error::{CoreError, CoreResult};
use crate::types::{FileSizeKib, PartitionNumber};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// Finds the partitions under a store root and resolves pools across them.
#[derive(Debug)]
pub struct EmptyFilePoolManager {
    ctx: Arc<JournalContext>,
    root: PathBuf,
    partitions: RwLock<BTreeMap<PartitionNumber, Arc<EmptyFilePoolPartition>>>,
}

impl EmptyFilePoolManager {
    /// Creates a manager over the store root `root`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidPartitionDirectory` if `root` is not a directory.
    pub fn new(ctx: &Arc<JournalContext>, root: impl Into<PathBuf>) -> CoreResult<Self> {
        let root = root.into();
        if !ctx.fs().is_dir(&root) {
            return Err(CoreError::invalid_partition_dir(&root, "store root is not a directory"));
        }
        Ok(Self {
            ctx: Arc::clone(ctx),
            root,
            partitions: RwLock::new(BTreeMap::new()),
        })
    }

    /// Scans the root for `pNNN` directories and discovers their pools.
    ///
    /// Known partitions are rescanned in place; partitions whose directory
    /// has vanished are dropped. A new partition that fails to load is
    /// skipped with a warning; a known one whose rescan fails is kept as it
    /// was. Returns the number of partitions known after the scan.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the root cannot be listed.
    pub fn discover_partitions(&self) -> CoreResult<usize> {
        let entries = self.ctx.fs().read_dir(&self.root)?;
        let mut partitions = self.partitions.write();
        let mut found = BTreeMap::new();

        for entry in entries.into_iter().filter(|e| e.is_dir) {
            let Some(number) = parse_partition_dir_name(&entry.name) else {
                continue;
            };
            let known = partitions.get(&number).cloned();
            let is_known = known.is_some();
            let partition = match known {
                Some(existing) => existing,
                None => match EmptyFilePoolPartition::new(
                    &self.ctx,
                    number,
                    self.root.join(&entry.name),
                ) {
                    Ok(p) => Arc::new(p),
                    Err(e) => {
                        warn!(partition = %number, error = %e, "skipping partition");
                        continue;
                    }
                },
            };
            if let Err(e) = partition.discover_pools() {
                warn!(partition = %number, error = %e, "pool discovery failed");
                // A known partition keeps the pools it already had
                if !is_known {
                    continue;
                }
            }
            found.insert(number, partition);
        }

        *partitions = found;
        info!(
            root = %self.root.display(),
            partitions = partitions.len(),
            "discovered partitions"
        );
        Ok(partitions.len())
    }

    /// Returns partition `number`.
    ///
    /// # Errors
    ///
    /// Returns `PartitionNotFound` if it has not been discovered.
    pub fn partition(&self, number: PartitionNumber) -> CoreResult<Arc<EmptyFilePoolPartition>> {
        self.partitions
            .read()
            .get(&number)
            .cloned()
            .ok_or(CoreError::PartitionNotFound { partition: number })
    }

    /// Returns the known partition numbers in ascending order.
    #[must_use]
    pub fn partition_numbers(&self) -> Vec<PartitionNumber> {
        self.partitions.read().keys().copied().collect()
    }

    /// Returns the pool of `size_kib` files in `partition`.
    ///
    /// # Errors
    ///
    /// Returns `PartitionNotFound` or `PoolNotFound`.
    pub fn get_pool(
        &self,
        partition: PartitionNumber,
        size_kib: FileSizeKib,
    ) -> CoreResult<Arc<EmptyFilePool>> {
        self.partition(partition)?.get_pool(size_kib)
    }

    /// Returns the pool named by the configured default partition and size.
    ///
    /// # Errors
    ///
    /// Returns `PartitionNotFound` or `PoolNotFound`.
    pub fn default_pool(&self) -> CoreResult<Arc<EmptyFilePool>> {
        let config = self.ctx.config();
        self.get_pool(config.default_partition, config.default_file_size_kib)
    }

    /// Creates the directory of partition `number` and registers it.
    ///
    /// An already known partition is returned unchanged.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the directories cannot be created.
    pub fn create_partition(
        &self,
        number: PartitionNumber,
    ) -> CoreResult<Arc<EmptyFilePoolPartition>> {
        let mut partitions = self.partitions.write();
        if let Some(existing) = partitions.get(&number) {
            return Ok(Arc::clone(existing));
        }

        let dir = self.root.join(partition_dir_name(number));
        self.ctx.fs().create_dir_all(&dir)?;
        let partition = Arc::new(EmptyFilePoolPartition::new(&self.ctx, number, dir)?);
        partition.discover_pools()?;
        partitions.insert(number, Arc::clone(&partition));
        Ok(partition)
    }

    /// Returns the store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}
