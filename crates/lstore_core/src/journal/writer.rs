//! Appends framed records to a journal file.

use crate::context::JournalContext;
use crate::error::{CoreError, CoreResult};
use crate::record::{
    compute_checksum, DequeueHeader, EnqueueHeader, FileHeader, RecordFlags, RecordHeader,
    RecordTail, TxnHeader, ABORT_MAGIC, COMMIT_MAGIC, DEQUEUE_MAGIC, ENQUEUE_MAGIC,
};
use crate::types::Rid;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Write position and record id counter.
#[derive(Debug)]
struct WriterState {
    offset: u64,
    next_rid: Rid,
}

/// Appends enqueue, dequeue and transaction records to one journal file.
///
/// Each append returns the record id it assigned and the file offset the
/// record starts at. Records are written in one positional write each; the
/// writer never extends the file past its pool size.
///
/// # Example
///
/// ```rust
/// use lstore_core::record::{FileHeader, RecordFlags};
/// use lstore_core::{Config, FileSizeKib, JournalContext, JournalWriter, PartitionNumber, Rid};
/// use std::path::Path;
///
/// let ctx = JournalContext::in_memory(Config::default());
/// let path = Path::new("/orders.jrnl");
/// let size = FileSizeKib::new(4);
/// ctx.fs().create_file(path, FileHeader::file_len(size)).unwrap();
///
/// let header = FileHeader::for_journal(PartitionNumber::new(1), size, 1, 0, "orders").unwrap();
/// let writer = JournalWriter::create(&ctx, path, header, Rid::new(1)).unwrap();
/// let (rid, _offset) = writer.enqueue(b"", b"hello", RecordFlags::NONE).unwrap();
/// assert_eq!(rid, Rid::new(1));
/// ```
#[derive(Debug)]
pub struct JournalWriter {
    ctx: Arc<JournalContext>,
    path: PathBuf,
    header: FileHeader,
    file_len: u64,
    state: Mutex<WriterState>,
}

impl JournalWriter {
    /// Stamps `header` onto the file at `path` and positions after it.
    ///
    /// The file must already exist with the length of its size class,
    /// normally because it was taken from a pool.
    ///
    /// # Errors
    ///
    /// - `InvalidFileHeader` if the file length does not match the header's
    ///   size class, the header holds no record offset, or the header and
    ///   first record offset do not fit inside the file
    /// - storage errors from the write
    pub fn create(
        ctx: &Arc<JournalContext>,
        path: impl Into<PathBuf>,
        header: FileHeader,
        first_rid: Rid,
    ) -> CoreResult<Self> {
        let path = path.into();
        let fs = ctx.fs();
        let file_len = fs.file_len(&path)?;
        let expected = FileHeader::file_len(header.data_size_kib);
        if file_len != expected {
            return Err(CoreError::invalid_file_header(
                &path,
                format!("length {file_len} does not match {} file", header.data_size_kib),
            ));
        }
        if header.is_empty() {
            return Err(CoreError::invalid_file_header(
                &path,
                "journal header has no first record offset",
            ));
        }
        if header.size() as u64 > file_len
            || header.first_record_offset < header.size() as u64
            || header.first_record_offset > file_len
        {
            return Err(CoreError::invalid_file_header(
                &path,
                format!(
                    "header of {} bytes with first record at {} does not fit a {file_len} byte file",
                    header.size(),
                    header.first_record_offset
                ),
            ));
        }

        fs.write_at(&path, 0, &header.encode())?;
        if ctx.config().sync_on_move {
            fs.sync_file(&path)?;
        }
        debug!(
            path = %path.display(),
            queue = %header.queue_name,
            serial = header.header.serial,
            "created journal file"
        );

        Ok(Self {
            ctx: Arc::clone(ctx),
            state: Mutex::new(WriterState {
                offset: header.first_record_offset,
                next_rid: first_rid,
            }),
            path,
            header,
            file_len,
        })
    }

    /// Appends an enqueue record. A non-empty `xid` makes it transactional.
    ///
    /// # Errors
    ///
    /// Returns `JournalFileFull` if the record does not fit, or a storage error.
    pub fn enqueue(&self, xid: &[u8], data: &[u8], flags: RecordFlags) -> CoreResult<(Rid, u64)> {
        self.append(|serial, rid| {
            let record = EnqueueHeader {
                header: RecordHeader::new(ENQUEUE_MAGIC, flags, serial, rid),
                xid_size: xid.len() as u64,
                data_size: data.len() as u64,
            };
            let mut buf = Vec::with_capacity(record.padded_len() as usize);
            buf.extend_from_slice(&record.encode());
            buf.extend_from_slice(xid);
            buf.extend_from_slice(data);
            if record.has_tail() {
                let tail = RecordTail::from_header(&record.header, compute_checksum(xid, data));
                buf.extend_from_slice(&tail.encode());
            }
            (buf, record.padded_len())
        })
    }

    /// Appends a dequeue of `deq_rid`. A non-empty `xid` makes it transactional.
    ///
    /// # Errors
    ///
    /// Returns `JournalFileFull` if the record does not fit, or a storage error.
    pub fn dequeue(&self, deq_rid: Rid, xid: &[u8]) -> CoreResult<(Rid, u64)> {
        self.append(|serial, rid| {
            let record = DequeueHeader {
                header: RecordHeader::new(DEQUEUE_MAGIC, RecordFlags::NONE, serial, rid),
                deq_rid,
                xid_size: xid.len() as u64,
            };
            let mut buf = Vec::with_capacity(record.padded_len() as usize);
            buf.extend_from_slice(&record.encode());
            buf.extend_from_slice(xid);
            if record.is_transactional() {
                let tail = RecordTail::from_header(&record.header, compute_checksum(xid, &[]));
                buf.extend_from_slice(&tail.encode());
            }
            (buf, record.padded_len())
        })
    }

    /// Appends a commit record for `xid`.
    ///
    /// # Errors
    ///
    /// Returns `JournalFileFull` if the record does not fit, or a storage error.
    pub fn commit(&self, xid: &[u8]) -> CoreResult<(Rid, u64)> {
        self.append_txn(COMMIT_MAGIC, xid)
    }

    /// Appends an abort record for `xid`.
    ///
    /// # Errors
    ///
    /// Returns `JournalFileFull` if the record does not fit, or a storage error.
    pub fn abort(&self, xid: &[u8]) -> CoreResult<(Rid, u64)> {
        self.append_txn(ABORT_MAGIC, xid)
    }

    fn append_txn(&self, magic: u32, xid: &[u8]) -> CoreResult<(Rid, u64)> {
        self.append(|serial, rid| {
            let record = TxnHeader {
                header: RecordHeader::new(magic, RecordFlags::NONE, serial, rid),
                xid_size: xid.len() as u64,
            };
            let tail = RecordTail::from_header(&record.header, compute_checksum(xid, &[]));
            let mut buf = Vec::with_capacity(record.padded_len() as usize);
            buf.extend_from_slice(&record.encode());
            buf.extend_from_slice(xid);
            buf.extend_from_slice(&tail.encode());
            (buf, record.padded_len())
        })
    }

    fn append<F>(&self, build: F) -> CoreResult<(Rid, u64)>
    where
        F: FnOnce(u64, Rid) -> (Vec<u8>, u64),
    {
        let mut state = self.state.lock();
        let rid = state.next_rid;
        let (mut buf, padded_len) = build(self.header.header.serial, rid);

        let remaining = self.file_len.saturating_sub(state.offset);
        if padded_len > remaining {
            return Err(CoreError::JournalFileFull {
                path: self.path.clone(),
                needed: padded_len,
                remaining,
            });
        }
        // Zero padding overwrites whatever a previous use of the file left
        buf.resize(padded_len as usize, 0);

        let offset = state.offset;
        self.ctx.fs().write_at(&self.path, offset, &buf)?;
        state.offset += padded_len;
        state.next_rid = rid.next();
        Ok((rid, offset))
    }

    /// Flushes the file to durable storage.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the sync fails.
    pub fn sync(&self) -> CoreResult<()> {
        self.ctx.fs().sync_file(&self.path)?;
        Ok(())
    }

    /// Returns the offset the next record will be written at.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.state.lock().offset
    }

    /// Returns the record id the next record will get.
    #[must_use]
    pub fn next_rid(&self) -> Rid {
        self.state.lock().next_rid
    }

    /// Returns the bytes left in the data area.
    #[must_use]
    pub fn remaining(&self) -> u64 {
        self.file_len.saturating_sub(self.state.lock().offset)
    }

    /// Returns the file header written at creation.
    #[must_use]
    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// Returns the path of the journal file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::record::{DBLK_SIZE, SBLK_SIZE};
    use crate::types::{FileSizeKib, PartitionNumber};
    use lstore_storage::FileSystem;

    fn writer(size_kib: u32) -> (Arc<JournalContext>, JournalWriter) {
        let ctx = JournalContext::in_memory(Config::default());
        let path = Path::new("/q.jrnl");
        let size = FileSizeKib::new(size_kib);
        ctx.fs().create_file(path, FileHeader::file_len(size)).unwrap();
        let header =
            FileHeader::for_journal(PartitionNumber::new(1), size, 5, 0, "queue").unwrap();
        let writer = JournalWriter::create(&ctx, path, header, Rid::new(10)).unwrap();
        (ctx, writer)
    }

    #[test]
    fn records_are_dblk_aligned() {
        let (_ctx, writer) = writer(4);
        assert_eq!(writer.offset(), SBLK_SIZE as u64);

        let (rid, offset) = writer.enqueue(b"", &[7u8; 100], RecordFlags::NONE).unwrap();
        assert_eq!(rid, Rid::new(10));
        assert_eq!(offset, SBLK_SIZE as u64);
        // 40 + 100 + 16 rounds up to two blocks
        assert_eq!(writer.offset(), (SBLK_SIZE + 2 * DBLK_SIZE) as u64);

        let (rid, _) = writer.dequeue(Rid::new(10), b"").unwrap();
        assert_eq!(rid, Rid::new(11));
        assert_eq!(writer.next_rid(), Rid::new(12));
    }

    #[test]
    fn enqueue_bytes_carry_tail() {
        let (ctx, writer) = writer(4);
        let (rid, offset) = writer.enqueue(b"tx", b"data", RecordFlags::NONE).unwrap();

        let bytes = ctx.fs().read_at(writer.path(), offset, DBLK_SIZE).unwrap();
        let record = EnqueueHeader::decode(&bytes).unwrap();
        assert_eq!(record.header.rid, rid);
        assert_eq!(record.header.serial, 5);
        assert!(record.is_transactional());

        let tail_at = EnqueueHeader::SIZE + 6;
        let tail = RecordTail::decode(&bytes[tail_at..]).unwrap();
        tail.validate(&record.header, b"tx", b"data").unwrap();
    }

    #[test]
    fn full_file_rejects_record() {
        let (_ctx, writer) = writer(1);
        // 1 KiB holds eight empty enqueues
        for _ in 0..8 {
            writer.enqueue(b"", b"", RecordFlags::NONE).unwrap();
        }
        assert_eq!(writer.remaining(), 0);

        let result = writer.enqueue(b"", b"", RecordFlags::NONE);
        assert!(matches!(result, Err(CoreError::JournalFileFull { .. })));
        assert_eq!(writer.next_rid(), Rid::new(18));
    }

    #[test]
    fn wrong_length_file_rejected() {
        let ctx = JournalContext::in_memory(Config::default());
        let path = Path::new("/short.jrnl");
        ctx.fs().create_file(path, 100).unwrap();
        let header =
            FileHeader::for_journal(PartitionNumber::new(1), FileSizeKib::new(4), 1, 0, "q")
                .unwrap();
        let result = JournalWriter::create(&ctx, path, header, Rid::new(1));
        assert!(matches!(result, Err(CoreError::InvalidFileHeader { .. })));
    }

    #[test]
    fn oversized_header_rejected() {
        let ctx = JournalContext::in_memory(Config::default());
        let path = Path::new("/big-header.jrnl");
        let size = FileSizeKib::new(1);
        ctx.fs().create_file(path, FileHeader::file_len(size)).unwrap();

        let mut header =
            FileHeader::for_journal(PartitionNumber::new(1), size, 1, 0, "q").unwrap();
        header.fhdr_size_sblks = 2;
        header.first_record_offset = header.size() as u64;

        let result = JournalWriter::create(&ctx, path, header, Rid::new(1));
        assert!(matches!(result, Err(CoreError::InvalidFileHeader { .. })));
        // Nothing was stamped and the file kept its pool size
        assert_eq!(ctx.fs().file_len(path).unwrap(), FileHeader::file_len(size));
    }

    #[test]
    fn first_record_offset_must_follow_header() {
        let ctx = JournalContext::in_memory(Config::default());
        let path = Path::new("/offset.jrnl");
        let size = FileSizeKib::new(1);
        let file_len = FileHeader::file_len(size);
        ctx.fs().create_file(path, file_len).unwrap();

        let mut inside_header =
            FileHeader::for_journal(PartitionNumber::new(1), size, 1, 0, "q").unwrap();
        inside_header.first_record_offset = DBLK_SIZE as u64;
        let result = JournalWriter::create(&ctx, path, inside_header, Rid::new(1));
        assert!(matches!(result, Err(CoreError::InvalidFileHeader { .. })));

        let mut past_end =
            FileHeader::for_journal(PartitionNumber::new(1), size, 1, 0, "q").unwrap();
        past_end.first_record_offset = file_len + DBLK_SIZE as u64;
        let result = JournalWriter::create(&ctx, path, past_end, Rid::new(1));
        assert!(matches!(result, Err(CoreError::InvalidFileHeader { .. })));

        // An offset at the very end leaves an empty data area
        let mut at_end =
            FileHeader::for_journal(PartitionNumber::new(1), size, 1, 0, "q").unwrap();
        at_end.first_record_offset = file_len;
        let writer = JournalWriter::create(&ctx, path, at_end, Rid::new(1)).unwrap();
        assert_eq!(writer.remaining(), 0);
        let result = writer.enqueue(b"", b"", RecordFlags::NONE);
        assert!(matches!(result, Err(CoreError::JournalFileFull { .. })));
    }
}
