//! Record tail and the header/tail cross-check.

use super::{compute_checksum, ensure_len, read_u32, read_u64, RecordHeader};
use crate::error::{CoreError, CoreResult};
use crate::types::Rid;

/// Tail of every record that carries an xid or data.
///
/// ```text
///   0                           7
/// +---+---+---+---+---+---+---+---+
/// |   ~(magic)    |   checksum    |
/// +---+---+---+---+---+---+---+---+
/// |              rid              |
/// +---+---+---+---+---+---+---+---+
/// ```
///
/// The inverted magic keeps a tail from ever being mistaken for a header
/// while scanning a file in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordTail {
    /// One's complement of the header magic.
    pub xmagic: u32,
    /// Checksum of the xid and data.
    pub checksum: u32,
    /// Record id, duplicated from the header.
    pub rid: Rid,
}

impl RecordTail {
    /// Encoded size in bytes.
    pub const SIZE: usize = 16;

    /// Creates a tail from its fields.
    ///
    /// `xmagic` must already be inverted.
    #[must_use]
    pub const fn new(xmagic: u32, checksum: u32, rid: Rid) -> Self {
        Self {
            xmagic,
            checksum,
            rid,
        }
    }

    /// Creates the tail matching `header`, inverting its magic and copying its rid.
    #[must_use]
    pub const fn from_header(header: &RecordHeader, checksum: u32) -> Self {
        Self::new(!header.magic, checksum, header.rid)
    }

    /// Encodes the tail.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.xmagic.to_le_bytes());
        buf[4..8].copy_from_slice(&self.checksum.to_le_bytes());
        buf[8..16].copy_from_slice(&self.rid.as_u64().to_le_bytes());
        buf
    }

    /// Decodes a tail from the start of `buf`.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if `buf` is shorter than [`Self::SIZE`].
    pub fn decode(buf: &[u8]) -> CoreResult<Self> {
        ensure_len(buf, Self::SIZE)?;
        Ok(Self {
            xmagic: read_u32(buf, 0),
            checksum: read_u32(buf, 4),
            rid: Rid::new(read_u64(buf, 8)),
        })
    }

    /// Cross-checks this tail against its header and an already computed checksum.
    ///
    /// # Errors
    ///
    /// - `MagicMismatch` if the tail magic is not the inverse of the header magic
    /// - `RidMismatch` if the record ids differ
    /// - `ChecksumMismatch` if `checksum` differs from the stored checksum
    pub fn check(&self, header: &RecordHeader, checksum: u32) -> CoreResult<()> {
        if self.xmagic != !header.magic {
            return Err(CoreError::MagicMismatch {
                rid: header.rid,
                expected: !header.magic,
                actual: self.xmagic,
            });
        }
        if self.rid != header.rid {
            return Err(CoreError::RidMismatch {
                header_rid: header.rid,
                tail_rid: self.rid,
            });
        }
        if self.checksum != checksum {
            return Err(CoreError::ChecksumMismatch {
                rid: header.rid,
                expected: self.checksum,
                actual: checksum,
            });
        }
        Ok(())
    }

    /// Recomputes the checksum over `xid` and `data` and cross-checks the tail.
    ///
    /// # Errors
    ///
    /// See [`Self::check`].
    pub fn validate(&self, header: &RecordHeader, xid: &[u8], data: &[u8]) -> CoreResult<()> {
        self.check(header, compute_checksum(xid, data))
    }
}
