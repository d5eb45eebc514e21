//! Core type definitions for the journal.

use std::fmt;

/// Record id.
///
/// Assigned monotonically by the writer and unique while the record is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Rid(pub u64);

impl Rid {
    /// Creates a new record id.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the next record id.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for Rid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rid:{}", self.0)
    }
}

/// Physical file id: which journal file a record was written into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Pfid(pub u16);

impl Pfid {
    /// Creates a new physical file id.
    #[must_use]
    pub const fn new(id: u16) -> Self {
        Self(id)
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }

    /// Returns the id as an index into per-file tables.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Pfid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pfid:{}", self.0)
    }
}

/// Number of an empty file pool partition.
///
/// Partition directories are named `p001`, `p002`, ...
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartitionNumber(pub u16);

impl PartitionNumber {
    /// Creates a new partition number.
    #[must_use]
    pub const fn new(n: u16) -> Self {
        Self(n)
    }

    /// Returns the raw number.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self.0
    }
}

impl fmt::Display for PartitionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "p{:03}", self.0)
    }
}

/// Size class of an empty file pool: data size of each file in KiB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FileSizeKib(pub u32);

impl FileSizeKib {
    /// Creates a new size class.
    #[must_use]
    pub const fn new(kib: u32) -> Self {
        Self(kib)
    }

    /// Returns the size in KiB.
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Returns the size in bytes.
    #[must_use]
    pub const fn bytes(self) -> u64 {
        self.0 as u64 * 1024
    }
}

impl fmt::Display for FileSizeKib {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}k", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rid_ordering_and_next() {
        let r1 = Rid::new(1);
        assert!(r1 < r1.next());
        assert_eq!(Rid::new(u64::MAX).next(), Rid::new(0));
    }

    #[test]
    fn partition_display_is_directory_name() {
        assert_eq!(PartitionNumber::new(1).to_string(), "p001");
        assert_eq!(PartitionNumber::new(42).to_string(), "p042");
    }

    #[test]
    fn size_class_bytes() {
        let size = FileSizeKib::new(2048);
        assert_eq!(size.bytes(), 2 * 1024 * 1024);
        assert_eq!(size.to_string(), "2048k");
    }
}
