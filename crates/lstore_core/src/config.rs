//! Journal store configuration.

use crate::types::{FileSizeKib, PartitionNumber};

/// Configuration shared by pools, partitions and the journal reader/writer.
#[derive(Debug, Clone)]
pub struct Config {
    /// Partition used when the caller does not name one.
    pub default_partition: PartitionNumber,

    /// Size class used when the caller does not name one.
    pub default_file_size_kib: FileSizeKib,

    /// Extension of journal and empty files, without the dot.
    pub file_extension: String,

    /// Whether partition discovery creates a missing `efp` directory.
    pub create_efp_dir: bool,

    /// Whether pools check the length and header of every file they load.
    pub verify_pool_files: bool,

    /// Whether to fsync files and directories after moving or resetting files.
    pub sync_on_move: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_partition: PartitionNumber::new(1),
            default_file_size_kib: FileSizeKib::new(2048), // 2 MiB
            file_extension: "jrnl".to_string(),
            create_efp_dir: true,
            verify_pool_files: true,
            sync_on_move: true,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the default partition.
    #[must_use]
    pub const fn default_partition(mut self, partition: PartitionNumber) -> Self {
        self.default_partition = partition;
        self
    }

    /// Sets the default size class.
    #[must_use]
    pub const fn default_file_size_kib(mut self, size: FileSizeKib) -> Self {
        self.default_file_size_kib = size;
        self
    }

    /// Sets the journal file extension.
    #[must_use]
    pub fn file_extension(mut self, ext: impl Into<String>) -> Self {
        self.file_extension = ext.into();
        self
    }

    /// Sets whether discovery creates a missing `efp` directory.
    #[must_use]
    pub const fn create_efp_dir(mut self, value: bool) -> Self {
        self.create_efp_dir = value;
        self
    }

    /// Sets whether pools verify the files they load.
    #[must_use]
    pub const fn verify_pool_files(mut self, value: bool) -> Self {
        self.verify_pool_files = value;
        self
    }

    /// Sets whether file moves and resets are fsynced.
    #[must_use]
    pub const fn sync_on_move(mut self, value: bool) -> Self {
        self.sync_on_move = value;
        self
    }
}
