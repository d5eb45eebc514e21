//! Replays journal files into an enqueue map.

use crate::context::JournalContext;
use crate::enq_map::{EnqueueMap, TxnOutcome};
use crate::error::{CoreError, CoreResult};
use crate::record::{
    compute_checksum, DequeueHeader, EnqueueHeader, FileHeader, RecordHeader, RecordTail,
    TxnHeader, ABORT_MAGIC, COMMIT_MAGIC, DEQUEUE_MAGIC, ENQUEUE_MAGIC, FORMAT_VERSION,
    SBLK_SIZE,
};
use crate::types::{Pfid, Rid};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Why replay of a file stopped.
#[derive(Debug)]
pub enum StopReason {
    /// The data area was read to its end.
    EndOfFile,
    /// A zeroed data block was reached, or the file holds no records.
    EmptyRegion,
    /// A record with a different serial was reached: left over from an
    /// earlier use of the file.
    StaleSerial {
        /// Serial found in the record.
        found: u64,
    },
    /// A record failed the framing checks.
    Corrupt(CoreError),
}

impl StopReason {
    /// Returns true if replay stopped on a damaged record.
    #[must_use]
    pub fn is_corrupt(&self) -> bool {
        matches!(self, Self::Corrupt(_))
    }
}

/// Outcome of replaying one journal file.
#[derive(Debug)]
pub struct RecoveryReport {
    /// File id the records were bound to.
    pub pfid: Pfid,
    /// The file's header.
    pub file_header: FileHeader,
    /// Number of valid records replayed.
    pub records: usize,
    /// Offset just past the last valid record.
    pub end_offset: u64,
    /// Highest record id seen, if any.
    pub highest_rid: Option<Rid>,
    /// Why replay stopped.
    pub stop: StopReason,
}

/// A transaction with no commit or abort record found yet.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingTxn {
    /// Transaction id.
    pub xid: Vec<u8>,
    /// Buffered enqueues, not yet in the map.
    pub enqueues: Vec<(Rid, Pfid)>,
    /// Dequeue targets, locked in the map.
    pub dequeues: Vec<Rid>,
}

/// Rebuilds an enqueue map from journal files.
///
/// Files must be replayed oldest first. Transactions may span files, so
/// their state is kept across calls until [`Self::finish`].
///
/// # Example
///
/// ```rust,ignore
/// let map = EnqueueMap::new(files.len());
/// let mut recovery = Recovery::new(&ctx, &map);
/// for (pfid, path) in files {
///     let report = recovery.recover_file(path, pfid)?;
///     if report.stop.is_corrupt() {
///         break;
///     }
/// }
/// let in_doubt = recovery.finish();
/// ```
#[derive(Debug)]
pub struct Recovery<'a> {
    ctx: &'a Arc<JournalContext>,
    map: &'a EnqueueMap,
    txns: BTreeMap<Vec<u8>, PendingTxn>,
}

/// A decoded record, ready to apply.
enum Record {
    Enqueue { xid: Vec<u8> },
    Dequeue { deq_rid: Rid, xid: Vec<u8> },
    Txn { outcome: TxnOutcome, xid: Vec<u8> },
}

impl<'a> Recovery<'a> {
    /// Creates a recovery pass filling `map`.
    #[must_use]
    pub fn new(ctx: &'a Arc<JournalContext>, map: &'a EnqueueMap) -> Self {
        Self {
            ctx,
            map,
            txns: BTreeMap::new(),
        }
    }

    /// Replays the journal file at `path`, binding its records to `pfid`.
    ///
    /// The map is grown to cover `pfid` if needed.
    ///
    /// # Errors
    ///
    /// - `InvalidFileHeader` if the file does not start with a file header
    /// - storage errors while reading
    ///
    /// Damaged records are not errors; they end replay of the file and are
    /// reported through [`RecoveryReport::stop`].
    pub fn recover_file(&mut self, path: &Path, pfid: Pfid) -> CoreResult<RecoveryReport> {
        let ctx = self.ctx;
        let fs = ctx.fs();
        let file_len = fs.file_len(path)?;
        if file_len < SBLK_SIZE as u64 {
            return Err(CoreError::invalid_file_header(path, "shorter than a file header"));
        }
        let file_header = FileHeader::decode(&fs.read_at(path, 0, SBLK_SIZE)?)
            .map_err(|e| CoreError::invalid_file_header(path, e.to_string()))?;

        if pfid.index() >= self.map.file_count() {
            self.map.set_file_count(pfid.index() + 1);
        }

        let mut report = RecoveryReport {
            pfid,
            end_offset: file_header.first_record_offset,
            file_header,
            records: 0,
            highest_rid: None,
            stop: StopReason::EmptyRegion,
        };
        if report.file_header.is_empty() {
            debug!(path = %path.display(), "journal file holds no records");
            report.end_offset = report.file_header.size() as u64;
            return Ok(report);
        }

        let serial = report.file_header.header.serial;
        let mut offset = report.file_header.first_record_offset;
        report.stop = loop {
            if offset.saturating_add(RecordHeader::SIZE as u64) > file_len {
                break StopReason::EndOfFile;
            }
            let header = RecordHeader::decode(&fs.read_at(path, offset, RecordHeader::SIZE)?)?;
            if header.magic == 0 {
                break StopReason::EmptyRegion;
            }
            if header.serial != serial {
                break StopReason::StaleSerial {
                    found: header.serial,
                };
            }

            match self.read_record(path, offset, file_len, &header) {
                Ok((record, len)) => {
                    self.apply(record, header.rid, pfid);
                    report.records += 1;
                    report.highest_rid = report.highest_rid.max(Some(header.rid));
                    offset += len;
                }
                Err(e) if e.is_corruption() => {
                    warn!(path = %path.display(), offset, error = %e, "stopping at damaged record");
                    break StopReason::Corrupt(e);
                }
                Err(e) => return Err(e),
            }
        };
        report.end_offset = offset;

        info!(
            path = %path.display(),
            pfid = %pfid,
            records = report.records,
            end_offset = report.end_offset,
            stop = ?report.stop,
            "replayed journal file"
        );
        Ok(report)
    }

    /// Reads and validates the record at `offset`, returning it with its padded length.
    fn read_record(
        &self,
        path: &Path,
        offset: u64,
        file_len: u64,
        header: &RecordHeader,
    ) -> CoreResult<(Record, u64)> {
        if header.version != FORMAT_VERSION {
            return Err(CoreError::invalid_record(
                offset,
                format!("unsupported version {}", header.version),
            ));
        }
        let available = file_len - offset;

        match header.magic {
            ENQUEUE_MAGIC => {
                let fixed = self.read_fixed(path, offset, available, EnqueueHeader::SIZE)?;
                let record = EnqueueHeader::decode(&fixed)?;
                check_sizes(available, &[record.xid_size, record.data_size])?;
                let buf = self.read_body(path, offset, available, record.padded_len())?;
                let body = EnqueueHeader::SIZE;
                let xid = &buf[body..body + record.xid_size as usize];
                let data_end = body + (record.xid_size + record.data_size) as usize;
                if record.has_tail() {
                    let tail = RecordTail::decode(&buf[data_end..])?;
                    tail.validate(header, xid, &buf[body + xid.len()..data_end])?;
                }
                Ok((
                    Record::Enqueue { xid: xid.to_vec() },
                    record.padded_len(),
                ))
            }
            DEQUEUE_MAGIC => {
                let fixed = self.read_fixed(path, offset, available, DequeueHeader::SIZE)?;
                let record = DequeueHeader::decode(&fixed)?;
                check_sizes(available, &[record.xid_size])?;
                let buf = self.read_body(path, offset, available, record.padded_len())?;
                let body = DequeueHeader::SIZE;
                let xid = &buf[body..body + record.xid_size as usize];
                if record.is_transactional() {
                    let tail = RecordTail::decode(&buf[body + xid.len()..])?;
                    tail.check(header, compute_checksum(xid, &[]))?;
                }
                Ok((
                    Record::Dequeue {
                        deq_rid: record.deq_rid,
                        xid: xid.to_vec(),
                    },
                    record.padded_len(),
                ))
            }
            COMMIT_MAGIC | ABORT_MAGIC => {
                let fixed = self.read_fixed(path, offset, available, TxnHeader::SIZE)?;
                let record = TxnHeader::decode(&fixed)?;
                check_sizes(available, &[record.xid_size])?;
                let buf = self.read_body(path, offset, available, record.padded_len())?;
                let body = TxnHeader::SIZE;
                let xid = &buf[body..body + record.xid_size as usize];
                let tail = RecordTail::decode(&buf[body + xid.len()..])?;
                tail.check(header, compute_checksum(xid, &[]))?;
                let outcome = if header.magic == COMMIT_MAGIC {
                    TxnOutcome::Commit
                } else {
                    TxnOutcome::Abort
                };
                Ok((
                    Record::Txn {
                        outcome,
                        xid: xid.to_vec(),
                    },
                    record.padded_len(),
                ))
            }
            magic => Err(CoreError::invalid_record(
                offset,
                format!("unknown record magic {magic:08x}"),
            )),
        }
    }

    fn read_fixed(&self, path: &Path, offset: u64, available: u64, size: usize) -> CoreResult<Vec<u8>> {
        if (size as u64) > available {
            return Err(truncated(size as u64, available));
        }
        Ok(self.ctx.fs().read_at(path, offset, size)?)
    }

    fn read_body(&self, path: &Path, offset: u64, available: u64, len: u64) -> CoreResult<Vec<u8>> {
        if len > available {
            return Err(truncated(len, available));
        }
        Ok(self.ctx.fs().read_at(path, offset, len as usize)?)
    }

    fn apply(&mut self, record: Record, rid: Rid, pfid: Pfid) {
        match record {
            Record::Enqueue { xid } if xid.is_empty() => {
                if let Err(e) = self.map.insert(rid, pfid) {
                    warn!(rid = %rid, error = %e, "ignoring enqueue");
                }
            }
            Record::Enqueue { xid } => {
                self.txn(xid).enqueues.push((rid, pfid));
            }
            Record::Dequeue { deq_rid, xid } if xid.is_empty() => {
                if let Err(e) = self.map.get_and_remove(deq_rid, false) {
                    warn!(rid = %rid, deq_rid = %deq_rid, error = %e, "ignoring dequeue");
                }
            }
            Record::Dequeue { deq_rid, xid } => {
                let txn = self.txn(xid);
                // Enqueued and dequeued within the same transaction
                if let Some(pos) = txn.enqueues.iter().position(|(r, _)| *r == deq_rid) {
                    txn.enqueues.remove(pos);
                    return;
                }
                txn.dequeues.push(deq_rid);
                if let Err(e) = self.map.lock(deq_rid) {
                    warn!(rid = %rid, deq_rid = %deq_rid, error = %e, "transactional dequeue of unknown record");
                }
            }
            Record::Txn { outcome, xid } => self.resolve(&xid, outcome),
        }
    }

    fn txn(&mut self, xid: Vec<u8>) -> &mut PendingTxn {
        self.txns.entry(xid).or_insert_with_key(|xid| PendingTxn {
            xid: xid.clone(),
            ..PendingTxn::default()
        })
    }

    fn resolve(&mut self, xid: &[u8], outcome: TxnOutcome) {
        let Some(txn) = self.txns.remove(xid) else {
            debug!(xid = ?xid, ?outcome, "no records for resolved transaction");
            return;
        };
        if outcome == TxnOutcome::Commit {
            for (rid, pfid) in &txn.enqueues {
                if let Err(e) = self.map.insert(*rid, *pfid) {
                    warn!(rid = %rid, error = %e, "ignoring committed enqueue");
                }
            }
        }
        for rid in &txn.dequeues {
            // The target may have been unknown when the dequeue was read
            if self.map.is_enqueued(*rid, true) {
                if let Err(e) = self.map.resolve(*rid, outcome) {
                    warn!(rid = %rid, error = %e, "cannot resolve dequeue");
                }
            }
        }
        debug!(
            xid = ?txn.xid,
            ?outcome,
            enqueues = txn.enqueues.len(),
            dequeues = txn.dequeues.len(),
            "resolved transaction"
        );
    }

    /// Ends the pass and returns the transactions left unresolved.
    ///
    /// Their dequeue targets stay locked in the map; their enqueues were never
    /// inserted. Resolving them is up to the transaction coordinator.
    #[must_use]
    pub fn finish(self) -> Vec<PendingTxn> {
        if !self.txns.is_empty() {
            info!(pending = self.txns.len(), "recovery left transactions in doubt");
        }
        self.txns.into_values().collect()
    }
}

fn truncated(needed: u64, available: u64) -> CoreError {
    CoreError::Truncated {
        needed: usize::try_from(needed).unwrap_or(usize::MAX),
        available: usize::try_from(available).unwrap_or(usize::MAX),
    }
}

/// Rejects size fields that cannot fit in the rest of the file.
fn check_sizes(available: u64, sizes: &[u64]) -> CoreResult<()> {
    let total = sizes
        .iter()
        .try_fold(0u64, |acc, &s| acc.checked_add(s))
        .unwrap_or(u64::MAX);
    if total > available {
        return Err(truncated(total, available));
    }
    Ok(())
}
