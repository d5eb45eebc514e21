//! Binary framing of journal records.
//!
//! Every record starts with a 24-byte [`RecordHeader`]. Records carrying
//! variable-length content (a transaction id, message data, or both) end with
//! a 16-byte [`RecordTail`] whose magic is the one's complement of the header
//! magic and whose checksum covers only the content between them.
//!
//! ## Record Layouts
//!
//! ```text
//! enqueue:  | header (24) | xid_size (8) | data_size (8) | xid | data | tail (16) |
//! dequeue:  | header (24) | deq_rid (8)  | xid_size (8)  | xid | tail (16)        |
//! commit:   | header (24) | xid_size (8) | xid | tail (16)                        |
//! abort:    | header (24) | xid_size (8) | xid | tail (16)                        |
//! tail:     | ~magic (4)  | checksum (4) | rid (8)                                |
//! ```
//!
//! The dequeue tail is present only for transactional dequeues. The enqueue
//! tail is omitted when both xid and data are empty. Each record is padded
//! with zeros to a [`DBLK_SIZE`] boundary, so a zero magic marks the end of
//! written content.
//!
//! All multi-byte integers are little-endian.
//!
//! ## Validation
//!
//! A record is valid iff `tail.xmagic == !header.magic`,
//! `tail.rid == header.rid` and the checksum recomputed over xid and data
//! equals `tail.checksum`. See [`RecordTail::validate`].

mod file_header;
mod header;
mod kinds;
mod tail;

pub use file_header::FileHeader;
pub use header::{RecordFlags, RecordHeader};
pub use kinds::{DequeueHeader, EnqueueHeader, TxnHeader};
pub use tail::RecordTail;

use crate::error::{CoreError, CoreResult};

/// Data block size: every record is padded to a multiple of this.
pub const DBLK_SIZE: usize = 128;

/// Superblock size: file headers occupy a whole number of superblocks.
pub const SBLK_SIZE: usize = 4096;

/// Current on-disk format version.
pub const FORMAT_VERSION: u16 = 2;

/// Magic of a file header (`QLSf`).
pub const FILE_MAGIC: u32 = u32::from_le_bytes(*b"QLSf");
/// Magic of an enqueue record (`QLSe`).
pub const ENQUEUE_MAGIC: u32 = u32::from_le_bytes(*b"QLSe");
/// Magic of a dequeue record (`QLSd`).
pub const DEQUEUE_MAGIC: u32 = u32::from_le_bytes(*b"QLSd");
/// Magic of a transaction abort record (`QLSa`).
pub const ABORT_MAGIC: u32 = u32::from_le_bytes(*b"QLSa");
/// Magic of a transaction commit record (`QLSc`).
pub const COMMIT_MAGIC: u32 = u32::from_le_bytes(*b"QLSc");

/// Computes the tail checksum over the xid and data portions of a record.
///
/// The header and tail are never part of the checksum.
#[must_use]
pub fn compute_checksum(xid: &[u8], data: &[u8]) -> u32 {
    let mut hasher = crc32fast::Hasher::new();
    hasher.update(xid);
    hasher.update(data);
    hasher.finalize()
}

/// Rounds `len` up to the next data block boundary.
#[must_use]
pub const fn dblk_align(len: u64) -> u64 {
    let dblk = DBLK_SIZE as u64;
    len.div_ceil(dblk) * dblk
}

pub(crate) fn ensure_len(buf: &[u8], needed: usize) -> CoreResult<()> {
    if buf.len() < needed {
        return Err(CoreError::Truncated {
            needed,
            available: buf.len(),
        });
    }
    Ok(())
}

// Callers check lengths with `ensure_len` first.
pub(crate) fn read_u16(buf: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([buf[at], buf[at + 1]])
}

pub(crate) fn read_u32(buf: &[u8], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(bytes)
}

pub(crate) fn read_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magics_spell_their_names() {
        assert_eq!(&FILE_MAGIC.to_le_bytes(), b"QLSf");
        assert_eq!(&ENQUEUE_MAGIC.to_le_bytes(), b"QLSe");
        assert_eq!(&DEQUEUE_MAGIC.to_le_bytes(), b"QLSd");
        assert_eq!(&ABORT_MAGIC.to_le_bytes(), b"QLSa");
        assert_eq!(&COMMIT_MAGIC.to_le_bytes(), b"QLSc");
    }

    #[test]
    fn inverted_magic_is_never_a_header_magic() {
        let magics = [FILE_MAGIC, ENQUEUE_MAGIC, DEQUEUE_MAGIC, ABORT_MAGIC, COMMIT_MAGIC];
        for m in magics {
            assert!(!magics.contains(&!m));
        }
    }

    #[test]
    fn checksum_covers_xid_then_data() {
        // Known test vector: "123456789" should give 0xCBF43926
        assert_eq!(compute_checksum(b"1234", b"56789"), 0xCBF4_3926);
        assert_eq!(compute_checksum(b"", b""), 0);
    }

    #[test]
    fn dblk_alignment() {
        assert_eq!(dblk_align(0), 0);
        assert_eq!(dblk_align(1), 128);
        assert_eq!(dblk_align(128), 128);
        assert_eq!(dblk_align(129), 256);
    }
}
