//! Empty file pools.
//!
//! The journal never creates files on its write path. It takes pre-allocated,
//! fixed-size files from an empty file pool and returns them once every
//! record they hold has been dequeued.
//!
//! ## Directory Layout
//!
//! ```text
//! <store_root>/
//! ├─ p001/                       # partition 1
//! │  └─ efp/                     # EFP_TOP_LEVEL_DIR
//! │     ├─ 2048k/                # pool of 2 MiB files
//! │     │  ├─ 3f1c…e9.jrnl
//! │     │  └─ 8a02…41.jrnl
//! │     └─ 512k/
//! └─ p002/
//!    └─ efp/
//! ```
//!
//! Each pool file is one superblock of reset file header followed by the
//! data area, zero-filled. File names are random UUIDs; only the extension
//! is significant.

mod manager;
mod partition;
mod pool;

pub use manager::EmptyFilePoolManager;
pub use partition::{EmptyFilePoolPartition, EFP_TOP_LEVEL_DIR};
pub use pool::{EmptyFile, EmptyFilePool};

use crate::types::{FileSizeKib, PartitionNumber};

/// Returns the directory name of a pool of `size` files, e.g. `2048k`.
#[must_use]
pub fn pool_dir_name(size: FileSizeKib) -> String {
    size.to_string()
}

/// Parses a pool directory name such as `2048k`.
#[must_use]
pub fn parse_pool_dir_name(name: &str) -> Option<FileSizeKib> {
    let digits = name.strip_suffix('k')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits
        .parse::<u32>()
        .ok()
        .filter(|&kib| kib > 0)
        .map(FileSizeKib::new)
}

/// Returns the directory name of a partition, e.g. `p001`.
#[must_use]
pub fn partition_dir_name(partition: PartitionNumber) -> String {
    partition.to_string()
}

/// Parses a partition directory name such as `p001`.
#[must_use]
pub fn parse_partition_dir_name(name: &str) -> Option<PartitionNumber> {
    let digits = name.strip_prefix('p')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u16>().ok().map(PartitionNumber::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_dir_names() {
        assert_eq!(pool_dir_name(FileSizeKib::new(2048)), "2048k");
        assert_eq!(parse_pool_dir_name("2048k"), Some(FileSizeKib::new(2048)));
        assert_eq!(parse_pool_dir_name("0k"), None);
        assert_eq!(parse_pool_dir_name("k"), None);
        assert_eq!(parse_pool_dir_name("+4k"), None);
        assert_eq!(parse_pool_dir_name("2048"), None);
        assert_eq!(parse_pool_dir_name("2048M"), None);
    }

    #[test]
    fn partition_dir_names() {
        assert_eq!(partition_dir_name(PartitionNumber::new(3)), "p003");
        assert_eq!(parse_partition_dir_name("p003"), Some(PartitionNumber::new(3)));
        assert_eq!(parse_partition_dir_name("p"), None);
        assert_eq!(parse_partition_dir_name("q001"), None);
        assert_eq!(parse_partition_dir_name("p99999"), None);
    }
}
