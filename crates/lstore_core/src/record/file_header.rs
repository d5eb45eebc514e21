//! File header written at the start of every journal and empty file.

use super::{ensure_len, read_u16, read_u64, RecordFlags, RecordHeader, FILE_MAGIC, SBLK_SIZE};
use crate::error::{CoreError, CoreResult};
use crate::types::{FileSizeKib, PartitionNumber, Rid};

/// File header.
///
/// ```text
/// | record header (24) | fhdr_size_sblks (2) | efp_partition (2) | reserved (2) |
/// | data_size_kib (8)  | first_record_offset (8) | file_number (8) |
/// | queue_name_len (2) | queue_name (N) | zero padding to fhdr_size_sblks * SBLK |
/// ```
///
/// A file sitting in an empty file pool carries a reset header: serial,
/// rid, first record offset and file number are zero and the queue name is
/// empty. A first record offset of zero therefore means "no records".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHeader {
    /// Common record header with magic `QLSf`.
    pub header: RecordHeader,
    /// Size of the file header in superblocks.
    pub fhdr_size_sblks: u16,
    /// Partition of the pool this file belongs to.
    pub efp_partition: PartitionNumber,
    /// Size of the data area in KiB.
    pub data_size_kib: FileSizeKib,
    /// Offset of the first record, zero if the file holds none.
    pub first_record_offset: u64,
    /// Sequence number of the file within its journal.
    pub file_number: u64,
    /// Name of the queue owning the journal.
    pub queue_name: String,
}

impl FileHeader {
    /// Size of the fixed part in bytes.
    pub const FIXED_SIZE: usize = RecordHeader::SIZE + 32;

    /// Longest queue name that fits in a one-superblock header.
    pub const MAX_QUEUE_NAME_LEN: usize = SBLK_SIZE - Self::FIXED_SIZE;

    /// Creates the reset header of a file sitting in a pool.
    #[must_use]
    pub fn empty(partition: PartitionNumber, data_size_kib: FileSizeKib) -> Self {
        Self {
            header: RecordHeader::new(FILE_MAGIC, RecordFlags::NONE, 0, Rid::new(0)),
            fhdr_size_sblks: 1,
            efp_partition: partition,
            data_size_kib,
            first_record_offset: 0,
            file_number: 0,
            queue_name: String::new(),
        }
    }

    /// Creates the header of a file taken into use by a journal.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRecord` if the queue name does not fit in the header.
    pub fn for_journal(
        partition: PartitionNumber,
        data_size_kib: FileSizeKib,
        serial: u64,
        file_number: u64,
        queue_name: &str,
    ) -> CoreResult<Self> {
        if queue_name.len() > Self::MAX_QUEUE_NAME_LEN {
            return Err(CoreError::invalid_record(
                0,
                format!(
                    "queue name of {} bytes exceeds maximum of {}",
                    queue_name.len(),
                    Self::MAX_QUEUE_NAME_LEN
                ),
            ));
        }
        let mut header = Self::empty(partition, data_size_kib);
        header.header.serial = serial;
        header.first_record_offset = header.size() as u64;
        header.file_number = file_number;
        header.queue_name = queue_name.to_string();
        Ok(header)
    }

    /// Returns true if the file holds no records.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.first_record_offset == 0
    }

    /// Returns the size of the header area in bytes.
    #[must_use]
    pub const fn size(&self) -> usize {
        self.fhdr_size_sblks as usize * SBLK_SIZE
    }

    /// Returns the on-disk length of a file with a `data_size_kib` data area.
    #[must_use]
    pub const fn file_len(data_size_kib: FileSizeKib) -> u64 {
        SBLK_SIZE as u64 + data_size_kib.bytes()
    }

    /// Encodes the header, zero-padded to its superblock size.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let name = self.queue_name.as_bytes();
        let mut buf = Vec::with_capacity(self.size());
        buf.extend_from_slice(&self.header.encode());
        buf.extend_from_slice(&self.fhdr_size_sblks.to_le_bytes());
        buf.extend_from_slice(&self.efp_partition.as_u16().to_le_bytes());
        buf.extend_from_slice(&0u16.to_le_bytes());
        buf.extend_from_slice(&u64::from(self.data_size_kib.as_u32()).to_le_bytes());
        buf.extend_from_slice(&self.first_record_offset.to_le_bytes());
        buf.extend_from_slice(&self.file_number.to_le_bytes());
        // Constructors bound the name length
        buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
        buf.extend_from_slice(name);
        buf.resize(self.size().max(buf.len()), 0);
        buf
    }

    /// Decodes a header from the start of `buf`.
    ///
    /// # Errors
    ///
    /// - `Truncated` if `buf` is too short
    /// - `InvalidRecord` if the magic is wrong or a field is out of range
    pub fn decode(buf: &[u8]) -> CoreResult<Self> {
        ensure_len(buf, Self::FIXED_SIZE)?;
        let header = RecordHeader::decode(buf)?;
        if header.magic != FILE_MAGIC {
            return Err(CoreError::invalid_record(
                0,
                format!("file magic {:08x} is not {FILE_MAGIC:08x}", header.magic),
            ));
        }

        let data_size_kib = u32::try_from(read_u64(buf, 30))
            .map_err(|_| CoreError::invalid_record(0, "data size out of range"))?;
        let name_len = read_u16(buf, 54) as usize;
        ensure_len(buf, Self::FIXED_SIZE + name_len)?;
        let queue_name =
            String::from_utf8(buf[Self::FIXED_SIZE..Self::FIXED_SIZE + name_len].to_vec())
                .map_err(|_| CoreError::invalid_record(0, "queue name is not UTF-8"))?;

        Ok(Self {
            header,
            fhdr_size_sblks: read_u16(buf, 24),
            efp_partition: PartitionNumber::new(read_u16(buf, 26)),
            data_size_kib: FileSizeKib::new(data_size_kib),
            first_record_offset: read_u64(buf, 38),
            file_number: read_u64(buf, 46),
            queue_name,
        })
    }
}
