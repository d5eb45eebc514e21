//! Property-based test generators using proptest.
//!
//! Provides strategies for record ids, payloads and sequences of journal
//! operations, plus a model that applies an operation sequence to a
//! [`JournalWriter`] and predicts which records stay live.

use lstore_core::record::RecordFlags;
use lstore_core::{CoreResult, JournalWriter, Pfid, Rid};
use proptest::prelude::*;

/// Largest payload generated by [`payload_strategy`].
pub const MAX_PAYLOAD: usize = 256;

/// Strategy for generating record ids.
pub fn rid_strategy() -> impl Strategy<Value = Rid> {
    any::<u64>().prop_map(Rid::new)
}

/// Strategy for generating file ids below `file_count`.
pub fn pfid_strategy(file_count: u16) -> impl Strategy<Value = Pfid> {
    (0..file_count.max(1)).prop_map(Pfid::new)
}

/// Strategy for generating message payloads.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..MAX_PAYLOAD)
}

/// One step of a generated journal workload.
///
/// Dequeue selectors pick a live record by index modulo the number of live
/// records; they are skipped when nothing is live. Transactional steps are
/// each their own transaction, resolved immediately.
#[derive(Debug, Clone)]
pub enum JournalOp {
    /// Non-transactional enqueue.
    Enqueue(Vec<u8>),
    /// Non-transactional dequeue of a live record.
    Dequeue(usize),
    /// Transactional enqueue followed by commit or abort.
    TxnEnqueue {
        /// Message payload.
        data: Vec<u8>,
        /// Whether the transaction commits.
        commit: bool,
    },
    /// Transactional dequeue of a live record followed by commit or abort.
    TxnDequeue {
        /// Live record selector.
        selector: usize,
        /// Whether the transaction commits.
        commit: bool,
    },
}

/// Strategy for generating a single journal operation.
pub fn journal_op_strategy() -> impl Strategy<Value = JournalOp> {
    prop_oneof![
        3 => payload_strategy().prop_map(JournalOp::Enqueue),
        2 => any::<usize>().prop_map(JournalOp::Dequeue),
        1 => (payload_strategy(), any::<bool>())
            .prop_map(|(data, commit)| JournalOp::TxnEnqueue { data, commit }),
        1 => (any::<usize>(), any::<bool>())
            .prop_map(|(selector, commit)| JournalOp::TxnDequeue { selector, commit }),
    ]
}

/// Strategy for generating up to `max_len` journal operations.
///
/// Each operation writes at most two records of at most three data blocks,
/// so a 64 KiB file holds 40 operations comfortably.
pub fn journal_ops_strategy(max_len: usize) -> impl Strategy<Value = Vec<JournalOp>> {
    prop::collection::vec(journal_op_strategy(), 0..=max_len)
}

/// Writes `ops` through `writer` and returns the record ids a replay
/// should find live, in ascending order.
///
/// # Errors
///
/// Returns the first error the writer reports.
pub fn apply_ops(writer: &JournalWriter, ops: &[JournalOp]) -> CoreResult<Vec<Rid>> {
    let mut live: Vec<Rid> = Vec::new();

    for (n, op) in ops.iter().enumerate() {
        let xid = format!("tx-{n}").into_bytes();
        match op {
            JournalOp::Enqueue(data) => {
                let (rid, _) = writer.enqueue(b"", data, RecordFlags::NONE)?;
                live.push(rid);
            }
            JournalOp::Dequeue(selector) => {
                if live.is_empty() {
                    continue;
                }
                let rid = live.remove(selector % live.len());
                writer.dequeue(rid, b"")?;
            }
            JournalOp::TxnEnqueue { data, commit } => {
                let (rid, _) = writer.enqueue(&xid, data, RecordFlags::NONE)?;
                if *commit {
                    writer.commit(&xid)?;
                    live.push(rid);
                } else {
                    writer.abort(&xid)?;
                }
            }
            JournalOp::TxnDequeue { selector, commit } => {
                if live.is_empty() {
                    continue;
                }
                let idx = selector % live.len();
                writer.dequeue(live[idx], &xid)?;
                if *commit {
                    writer.commit(&xid)?;
                    live.remove(idx);
                } else {
                    writer.abort(&xid)?;
                }
            }
        }
    }

    live.sort();
    Ok(live)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::TestStore;

    #[test]
    fn model_tracks_dequeues() {
        let store = TestStore::memory();
        let pool = store.add_pool(1, 4, 1);
        let writer = store.new_journal(&pool, "q", 1);

        let ops = vec![
            JournalOp::Enqueue(b"a".to_vec()),
            JournalOp::Enqueue(b"b".to_vec()),
            JournalOp::Dequeue(0),
            JournalOp::TxnDequeue {
                selector: 0,
                commit: false,
            },
            JournalOp::TxnEnqueue {
                data: b"c".to_vec(),
                commit: true,
            },
        ];
        let live = apply_ops(&writer, &ops).unwrap();
        // rid 1 dequeued; rid 2 survives the aborted dequeue; rid 6 committed
        assert_eq!(live, vec![Rid::new(2), Rid::new(6)]);
    }

    #[test]
    fn dequeue_with_nothing_live_is_skipped() {
        let store = TestStore::memory();
        let pool = store.add_pool(1, 4, 1);
        let writer = store.new_journal(&pool, "q", 1);

        let live = apply_ops(&writer, &[JournalOp::Dequeue(3)]).unwrap();
        assert!(live.is_empty());
        assert_eq!(writer.next_rid(), Rid::new(1));
    }
}
