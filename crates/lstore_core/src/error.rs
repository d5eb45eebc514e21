//! Error types for the journal core.

use crate::types::{FileSizeKib, PartitionNumber, Pfid, Rid};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur in journal core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Storage backend error.
    #[error("storage error: {0}")]
    Storage(#[from] lstore_storage::StorageError),

    /// The record id is already present in the enqueue map.
    #[error("duplicate record id {rid}")]
    DuplicateRecordId {
        /// The duplicated record id.
        rid: Rid,
    },

    /// The record id is not present in the enqueue map.
    #[error("record {rid} not found")]
    RecordNotFound {
        /// The missing record id.
        rid: Rid,
    },

    /// A transactional dequeue is pending against the record.
    #[error("record {rid} is locked by a pending transaction")]
    RecordLocked {
        /// The locked record id.
        rid: Rid,
    },

    /// The physical file id lies outside the counter space of the map.
    #[error("{pfid} out of range: map tracks {file_count} files")]
    PfidOutOfRange {
        /// The offending file id.
        pfid: Pfid,
        /// Number of files the map is sized for.
        file_count: usize,
    },

    /// The partition directory is missing or unusable.
    #[error("invalid partition directory {}: {reason}", path.display())]
    InvalidPartitionDirectory {
        /// The partition directory.
        path: PathBuf,
        /// Why it was rejected.
        reason: String,
    },

    /// No partition with that number has been discovered.
    #[error("partition {partition} not found")]
    PartitionNotFound {
        /// The requested partition.
        partition: PartitionNumber,
    },

    /// No pool of that size class has been discovered in the partition.
    #[error("no {size_kib} empty file pool in partition {partition}")]
    PoolNotFound {
        /// The partition searched.
        partition: PartitionNumber,
        /// The requested size class.
        size_kib: FileSizeKib,
    },

    /// The pool has no file available.
    #[error("{size_kib} empty file pool in partition {partition} is exhausted")]
    PoolExhausted {
        /// The partition owning the pool.
        partition: PartitionNumber,
        /// The pool's size class.
        size_kib: FileSizeKib,
    },

    /// The stored checksum disagrees with the recomputed one.
    #[error("checksum mismatch on {rid}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Record whose content was checked.
        rid: Rid,
        /// Checksum stored in the tail.
        expected: u32,
        /// Checksum recomputed from the content.
        actual: u32,
    },

    /// The tail magic is not the inverse of the header magic.
    #[error("magic mismatch on {rid}: expected {expected:08x}, got {actual:08x}")]
    MagicMismatch {
        /// Record whose tail was checked.
        rid: Rid,
        /// The inverted header magic.
        expected: u32,
        /// The magic found in the tail.
        actual: u32,
    },

    /// The tail record id differs from the header record id.
    #[error("record id mismatch: header {header_rid}, tail {tail_rid}")]
    RidMismatch {
        /// Record id stored in the header.
        header_rid: Rid,
        /// Record id stored in the tail.
        tail_rid: Rid,
    },

    /// A buffer was too short to hold the structure being decoded.
    #[error("truncated input: need {needed} bytes, have {available}")]
    Truncated {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        available: usize,
    },

    /// A journal or empty file does not start with a valid file header.
    #[error("invalid file header in {}: {message}", path.display())]
    InvalidFileHeader {
        /// The file that was read.
        path: PathBuf,
        /// Description of the problem.
        message: String,
    },

    /// The record does not fit in the remaining data area of the file.
    #[error("journal file {} is full: record needs {needed} bytes, {remaining} remain", path.display())]
    JournalFileFull {
        /// The journal file.
        path: PathBuf,
        /// Padded length of the record.
        needed: u64,
        /// Bytes left in the data area.
        remaining: u64,
    },

    /// A record header is not recognisable.
    #[error("invalid record at offset {offset}: {message}")]
    InvalidRecord {
        /// File offset of the record.
        offset: u64,
        /// Description of the problem.
        message: String,
    },
}

impl CoreError {
    /// Creates an invalid partition directory error.
    pub fn invalid_partition_dir(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPartitionDirectory {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates an invalid file header error.
    pub fn invalid_file_header(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::InvalidFileHeader {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid record error.
    pub fn invalid_record(offset: u64, message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            offset,
            message: message.into(),
        }
    }

    /// Returns true for errors that mark the end of valid journal content.
    ///
    /// Recovery treats these as a crash mid-write: replay stops and the rest
    /// of the file is ignored instead of failing the whole recovery.
    #[must_use]
    pub fn is_corruption(&self) -> bool {
        matches!(
            self,
            Self::ChecksumMismatch { .. }
                | Self::MagicMismatch { .. }
                | Self::RidMismatch { .. }
                | Self::Truncated { .. }
                | Self::InvalidRecord { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corruption_classification() {
        let checksum = CoreError::ChecksumMismatch {
            rid: Rid::new(1),
            expected: 1,
            actual: 2,
        };
        assert!(checksum.is_corruption());

        let locked = CoreError::RecordLocked { rid: Rid::new(1) };
        assert!(!locked.is_corruption());
    }

    #[test]
    fn messages_name_the_record() {
        let err = CoreError::DuplicateRecordId { rid: Rid::new(7) };
        assert_eq!(err.to_string(), "duplicate record id rid:7");
    }
}
