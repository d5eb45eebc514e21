//! Journal files: appending framed records and replaying them.
//!
//! A journal file is a file taken from an empty file pool and stamped with a
//! [`FileHeader`](crate::record::FileHeader) carrying the queue name and a
//! serial number. Records follow the header, each padded to a data block.
//!
//! ## Replay
//!
//! [`Recovery`] walks one file at a time and rebuilds an
//! [`EnqueueMap`](crate::EnqueueMap):
//!
//! - non-transactional enqueues are inserted immediately
//! - transactional enqueues are buffered under their xid until a commit
//! - non-transactional dequeues remove their target
//! - transactional dequeues lock their target; commit removes it, abort
//!   unlocks it
//!
//! Replay of a file stops at the first zeroed data block, the first record
//! whose serial differs from the file header (left over from an earlier use
//! of the file) or the first record failing the framing checks. Everything
//! before that point is applied.

mod recovery;
mod writer;

pub use recovery::{PendingTxn, Recovery, RecoveryReport, StopReason};
pub use writer::JournalWriter;
