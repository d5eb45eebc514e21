//! Fixed headers of enqueue, dequeue and transaction records.

use super::{dblk_align, ensure_len, read_u64, RecordHeader, RecordTail};
use crate::error::CoreResult;
use crate::types::Rid;

/// Header of an enqueue record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueHeader {
    /// Common record header.
    pub header: RecordHeader,
    /// Length of the transaction id, zero if not transactional.
    pub xid_size: u64,
    /// Length of the message data.
    pub data_size: u64,
}

impl EnqueueHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = RecordHeader::SIZE + 16;

    /// Returns true if the record ends with a tail.
    #[must_use]
    pub const fn has_tail(&self) -> bool {
        self.xid_size + self.data_size > 0
    }

    /// Returns true if the enqueue belongs to a transaction.
    #[must_use]
    pub const fn is_transactional(&self) -> bool {
        self.xid_size > 0
    }

    /// Returns the unpadded length of the whole record.
    #[must_use]
    pub const fn record_len(&self) -> u64 {
        let tail = if self.has_tail() { RecordTail::SIZE as u64 } else { 0 };
        Self::SIZE as u64 + self.xid_size + self.data_size + tail
    }

    /// Returns the on-disk footprint, padded to a data block.
    #[must_use]
    pub const fn padded_len(&self) -> u64 {
        dblk_align(self.record_len())
    }

    /// Encodes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[..RecordHeader::SIZE].copy_from_slice(&self.header.encode());
        buf[24..32].copy_from_slice(&self.xid_size.to_le_bytes());
        buf[32..40].copy_from_slice(&self.data_size.to_le_bytes());
        buf
    }

    /// Decodes the header from the start of `buf`.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if `buf` is too short.
    pub fn decode(buf: &[u8]) -> CoreResult<Self> {
        ensure_len(buf, Self::SIZE)?;
        Ok(Self {
            header: RecordHeader::decode(buf)?,
            xid_size: read_u64(buf, 24),
            data_size: read_u64(buf, 32),
        })
    }
}

/// Header of a dequeue record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DequeueHeader {
    /// Common record header.
    pub header: RecordHeader,
    /// Record id of the enqueue being dequeued.
    pub deq_rid: Rid,
    /// Length of the transaction id, zero if not transactional.
    pub xid_size: u64,
}

impl DequeueHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = RecordHeader::SIZE + 16;

    /// Returns true if the dequeue belongs to a transaction (and has a tail).
    #[must_use]
    pub const fn is_transactional(&self) -> bool {
        self.xid_size > 0
    }

    /// Returns the unpadded length of the whole record.
    #[must_use]
    pub const fn record_len(&self) -> u64 {
        let tail = if self.is_transactional() { RecordTail::SIZE as u64 } else { 0 };
        Self::SIZE as u64 + self.xid_size + tail
    }

    /// Returns the on-disk footprint, padded to a data block.
    #[must_use]
    pub const fn padded_len(&self) -> u64 {
        dblk_align(self.record_len())
    }

    /// Encodes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[..RecordHeader::SIZE].copy_from_slice(&self.header.encode());
        buf[24..32].copy_from_slice(&self.deq_rid.as_u64().to_le_bytes());
        buf[32..40].copy_from_slice(&self.xid_size.to_le_bytes());
        buf
    }

    /// Decodes the header from the start of `buf`.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if `buf` is too short.
    pub fn decode(buf: &[u8]) -> CoreResult<Self> {
        ensure_len(buf, Self::SIZE)?;
        Ok(Self {
            header: RecordHeader::decode(buf)?,
            deq_rid: Rid::new(read_u64(buf, 24)),
            xid_size: read_u64(buf, 32),
        })
    }
}

/// Header of a transaction commit or abort record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxnHeader {
    /// Common record header; the magic tells commit from abort.
    pub header: RecordHeader,
    /// Length of the transaction id.
    pub xid_size: u64,
}

impl TxnHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = RecordHeader::SIZE + 8;

    /// Returns the unpadded length of the whole record.
    #[must_use]
    pub const fn record_len(&self) -> u64 {
        Self::SIZE as u64 + self.xid_size + RecordTail::SIZE as u64
    }

    /// Returns the on-disk footprint, padded to a data block.
    #[must_use]
    pub const fn padded_len(&self) -> u64 {
        dblk_align(self.record_len())
    }

    /// Encodes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[..RecordHeader::SIZE].copy_from_slice(&self.header.encode());
        buf[24..32].copy_from_slice(&self.xid_size.to_le_bytes());
        buf
    }

    /// Decodes the header from the start of `buf`.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if `buf` is too short.
    pub fn decode(buf: &[u8]) -> CoreResult<Self> {
        ensure_len(buf, Self::SIZE)?;
        Ok(Self {
            header: RecordHeader::decode(buf)?,
            xid_size: read_u64(buf, 24),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{RecordFlags, DEQUEUE_MAGIC, ENQUEUE_MAGIC};

    #[test]
    fn enqueue_sizes() {
        let mut enq = EnqueueHeader {
            header: RecordHeader::new(ENQUEUE_MAGIC, RecordFlags::NONE, 1, Rid::new(1)),
            xid_size: 0,
            data_size: 0,
        };
        assert!(!enq.has_tail());
        assert_eq!(enq.record_len(), 40);
        assert_eq!(enq.padded_len(), 128);

        enq.data_size = 100;
        assert!(enq.has_tail());
        assert_eq!(enq.record_len(), 156);
        assert_eq!(enq.padded_len(), 256);

        let decoded = EnqueueHeader::decode(&enq.encode()).unwrap();
        assert_eq!(decoded, enq);
    }

    #[test]
    fn non_transactional_dequeue_has_no_tail() {
        let deq = DequeueHeader {
            header: RecordHeader::new(DEQUEUE_MAGIC, RecordFlags::NONE, 1, Rid::new(2)),
            deq_rid: Rid::new(1),
            xid_size: 0,
        };
        assert!(!deq.is_transactional());
        assert_eq!(deq.record_len(), 40);

        let decoded = DequeueHeader::decode(&deq.encode()).unwrap();
        assert_eq!(decoded.deq_rid, Rid::new(1));
    }
}
