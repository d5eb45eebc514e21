//! Common record header.

use super::{ensure_len, read_u16, read_u32, read_u64, FORMAT_VERSION};
use crate::error::CoreResult;
use crate::types::Rid;

/// User flags carried in the record header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecordFlags(u16);

impl RecordFlags {
    /// No flags set.
    pub const NONE: Self = Self(0);
    /// Message is transient: not recovered on restart.
    pub const TRANSIENT: Self = Self(0x0001);
    /// Message content is stored outside the journal.
    pub const EXTERNAL: Self = Self(0x0002);

    /// Creates flags from their raw value.
    #[must_use]
    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    /// Returns the raw value.
    #[must_use]
    pub const fn bits(self) -> u16 {
        self.0
    }

    /// Checks if the transient flag is set.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        self.0 & Self::TRANSIENT.0 != 0
    }

    /// Checks if the external flag is set.
    #[must_use]
    pub const fn is_external(self) -> bool {
        self.0 & Self::EXTERNAL.0 != 0
    }

    /// Returns these flags with `other` also set.
    #[must_use]
    pub const fn with(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }
}

/// Header common to every record and to the file header.
///
/// ```text
/// | magic (4) | version (2) | uflag (2) | serial (8) | rid (8) |
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHeader {
    /// Record type magic.
    pub magic: u32,
    /// Format version.
    pub version: u16,
    /// User flags.
    pub flags: RecordFlags,
    /// Serial number of the file the record was written into.
    pub serial: u64,
    /// Record id.
    pub rid: Rid,
}

impl RecordHeader {
    /// Encoded size in bytes.
    pub const SIZE: usize = 24;

    /// Creates a header at the current format version.
    #[must_use]
    pub const fn new(magic: u32, flags: RecordFlags, serial: u64, rid: Rid) -> Self {
        Self {
            magic,
            version: FORMAT_VERSION,
            flags,
            serial,
            rid,
        }
    }

    /// Encodes the header.
    #[must_use]
    pub fn encode(&self) -> [u8; Self::SIZE] {
        let mut buf = [0u8; Self::SIZE];
        buf[0..4].copy_from_slice(&self.magic.to_le_bytes());
        buf[4..6].copy_from_slice(&self.version.to_le_bytes());
        buf[6..8].copy_from_slice(&self.flags.bits().to_le_bytes());
        buf[8..16].copy_from_slice(&self.serial.to_le_bytes());
        buf[16..24].copy_from_slice(&self.rid.as_u64().to_le_bytes());
        buf
    }

    /// Decodes a header from the start of `buf`.
    ///
    /// # Errors
    ///
    /// Returns `Truncated` if `buf` is shorter than [`Self::SIZE`].
    pub fn decode(buf: &[u8]) -> CoreResult<Self> {
        ensure_len(buf, Self::SIZE)?;
        Ok(Self {
            magic: read_u32(buf, 0),
            version: read_u16(buf, 4),
            flags: RecordFlags::from_bits(read_u16(buf, 6)),
            serial: read_u64(buf, 8),
            rid: Rid::new(read_u64(buf, 16)),
        })
    }
}
