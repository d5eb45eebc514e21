//! # lstore Core
//!
//! Journal core of the lstore message store.
//!
//! This crate provides:
//! - Record framing: header, tail and the checksum/magic cross-check
//! - The enqueue map: which record ids are live, in which file, and whether a
//!   pending transaction blocks their removal
//! - Empty file pools, partitions and the pool manager
//! - A journal file writer and the recovery scanner that rebuilds the
//!   enqueue map from disk
//!
//! ## Example
//!
//! ```rust
//! use lstore_core::{EnqueueMap, Pfid, Rid};
//!
//! let map = EnqueueMap::new(4);
//! map.insert(Rid::new(1), Pfid::new(0)).unwrap();
//! assert_eq!(map.get(Rid::new(1)).unwrap(), Pfid::new(0));
//! assert_eq!(map.live_count(Pfid::new(0)).unwrap(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod enq_map;
mod error;
mod types;

pub mod efp;
pub mod journal;
pub mod record;

pub use config::Config;
pub use context::JournalContext;
pub use efp::{EmptyFile, EmptyFilePool, EmptyFilePoolManager, EmptyFilePoolPartition};
pub use enq_map::{EnqueueMap, TxnOutcome};
pub use error::{CoreError, CoreResult};
pub use journal::{JournalWriter, PendingTxn, Recovery, RecoveryReport, StopReason};
pub use record::{RecordHeader, RecordTail};
pub use types::{FileSizeKib, PartitionNumber, Pfid, Rid};
