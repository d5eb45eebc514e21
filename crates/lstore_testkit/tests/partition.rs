//! Partition and pool behaviour on a real directory tree.

use lstore_core::{
    Config, CoreError, EmptyFilePoolPartition, FileSizeKib, PartitionNumber,
};
use lstore_testkit::prelude::*;
use std::fs;
use std::sync::Arc;

#[test]
fn nonexistent_directory_then_discovery() {
    init_tracing();
    let store = TestStore::on_disk();
    let dir = store.partition_dir(1);

    let result = EmptyFilePoolPartition::new(&store.ctx, PartitionNumber::new(1), &dir);
    assert!(matches!(
        result,
        Err(CoreError::InvalidPartitionDirectory { .. })
    ));

    fs::create_dir_all(dir.join("efp/2048k")).unwrap();
    fs::create_dir_all(dir.join("efp/64k")).unwrap();
    let partition =
        EmptyFilePoolPartition::new(&store.ctx, PartitionNumber::new(1), &dir).unwrap();
    partition.discover_pools().unwrap();

    assert_eq!(
        partition.list_pool_sizes(),
        vec![FileSizeKib::new(64), FileSizeKib::new(2048)]
    );
}

#[test]
fn discovery_creates_efp_dir() {
    let store = TestStore::on_disk();
    let dir = store.partition_dir(2);
    fs::create_dir_all(&dir).unwrap();

    let partition =
        EmptyFilePoolPartition::new(&store.ctx, PartitionNumber::new(2), &dir).unwrap();
    assert_eq!(partition.discover_pools().unwrap(), 0);
    assert!(dir.join("efp").is_dir());
}

#[test]
fn discovery_drops_removed_pool() {
    let store = TestStore::on_disk();
    let dir = store.partition_dir(1);
    fs::create_dir_all(dir.join("efp/4k")).unwrap();
    fs::create_dir_all(dir.join("efp/8k")).unwrap();
    let partition =
        EmptyFilePoolPartition::new(&store.ctx, PartitionNumber::new(1), &dir).unwrap();
    assert_eq!(partition.discover_pools().unwrap(), 2);

    fs::remove_dir(dir.join("efp/8k")).unwrap();
    assert_eq!(partition.discover_pools().unwrap(), 1);
    assert!(matches!(
        partition.get_pool(FileSizeKib::new(8)),
        Err(CoreError::PoolNotFound { .. })
    ));
}

#[test]
fn pool_files_are_preallocated_on_disk() {
    let store = TestStore::on_disk();
    let pool = store.add_pool(1, 16, 3);

    let files: Vec<_> = fs::read_dir(pool.directory())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert_eq!(files.len(), 3);
    for path in files {
        assert_eq!(path.extension().unwrap(), "jrnl");
        assert_eq!(fs::metadata(&path).unwrap().len(), pool.file_size_bytes());
    }
}

#[test]
fn take_and_return_on_disk() {
    let store = TestStore::on_disk();
    let pool = store.add_pool(1, 4, 2);
    let writer = store.new_journal(&pool, "orders", 1);
    let journal_path = writer.path().to_path_buf();
    assert!(journal_path.is_file());
    drop(writer);

    pool.return_file(&journal_path).unwrap();
    assert!(!journal_path.exists());
    assert_eq!(pool.available(), 2);

    // The reset file passes verification when the pool is reloaded
    let partition = EmptyFilePoolPartition::new(
        &store.ctx,
        PartitionNumber::new(1),
        store.partition_dir(1),
    )
    .unwrap();
    partition.discover_pools().unwrap();
    assert_eq!(partition.get_pool(FileSizeKib::new(4)).unwrap().available(), 2);
}

#[test]
fn unverified_pool_loads_foreign_files() {
    let store = TestStore::on_disk_with_config(Config::default().verify_pool_files(false));
    let dir = store.pool_dir(1, 4);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("odd.jrnl"), b"not a pool file").unwrap();

    let partition = EmptyFilePoolPartition::new(
        &store.ctx,
        PartitionNumber::new(1),
        store.partition_dir(1),
    )
    .unwrap();
    partition.discover_pools().unwrap();
    assert_eq!(partition.get_pool(FileSizeKib::new(4)).unwrap().available(), 1);
}

#[test]
fn concurrent_acquire_hands_out_each_file_once() {
    let store = TestStore::memory();
    let pool = store.add_pool(1, 4, 32);

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let pool = Arc::clone(&pool);
            std::thread::spawn(move || {
                let mut ids = Vec::new();
                while let Ok(file) = pool.acquire() {
                    ids.push(file.id());
                }
                ids
            })
        })
        .collect();

    let mut ids: Vec<u64> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 32);
    assert_eq!(pool.available(), 0);
    assert_eq!(pool.capacity(), 32);
}
