//! Index of enqueued records.
//!
//! Maps every live record id to the physical file it was written into and a
//! transaction lock flag:
//!
//! ```text
//!   key      data
//!
//!   rid1 --- [ pfid, txn_lock ]
//!   rid2 --- [ pfid, txn_lock ]
//!   rid3 --- [ pfid, txn_lock ]
//!   ...
//! ```
//!
//! Records are added as they are enqueued and removed as they are dequeued.
//! An entry is locked while a transactional dequeue against it is neither
//! committed nor aborted: a competing dequeue must be rejected, yet the file
//! slot must not be freed because the transaction may still abort.
//!
//! A live count per pfid is maintained alongside the map. A file whose count
//! is zero holds no enqueued record and may be returned to its pool; locked
//! entries are still counted.
//!
//! ## Thread Safety
//!
//! Every operation takes the same mutex, so once `insert` returns for a rid
//! every later call from any thread observes the entry. No I/O is performed
//! under the lock.

use crate::error::{CoreError, CoreResult};
use crate::types::{Pfid, Rid};
use parking_lot::Mutex;
use std::collections::BTreeMap;

/// How a pending transaction was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnOutcome {
    /// The transaction committed: its dequeues take effect.
    Commit,
    /// The transaction aborted: its dequeues are undone.
    Abort,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    pfid: Pfid,
    locked: bool,
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<Rid, Entry>,
    live_counts: Vec<u32>,
}

impl Inner {
    fn check_pfid(&self, pfid: Pfid) -> CoreResult<()> {
        if pfid.index() >= self.live_counts.len() {
            return Err(CoreError::PfidOutOfRange {
                pfid,
                file_count: self.live_counts.len(),
            });
        }
        Ok(())
    }

    fn entry_mut(&mut self, rid: Rid) -> CoreResult<&mut Entry> {
        self.entries
            .get_mut(&rid)
            .ok_or(CoreError::RecordNotFound { rid })
    }

    fn remove(&mut self, rid: Rid) -> Option<Pfid> {
        let entry = self.entries.remove(&rid)?;
        // Entries are only inserted with in-range pfids
        if let Some(count) = self.live_counts.get_mut(entry.pfid.index()) {
            *count = count.saturating_sub(1);
        }
        Some(entry.pfid)
    }
}

/// The enqueue map.
///
/// # Example
///
/// ```rust
/// use lstore_core::{CoreError, EnqueueMap, Pfid, Rid};
///
/// let map = EnqueueMap::new(8);
/// map.insert(Rid::new(1), Pfid::new(0)).unwrap();
/// map.lock(Rid::new(1)).unwrap();
///
/// // An ordinary dequeue must wait for the pending transaction
/// let result = map.get_and_remove(Rid::new(1), false);
/// assert!(matches!(result, Err(CoreError::RecordLocked { .. })));
///
/// // The transaction resolution path may remove it
/// assert_eq!(map.get_and_remove(Rid::new(1), true).unwrap(), Pfid::new(0));
/// assert!(map.is_empty());
/// ```
#[derive(Debug, Default)]
pub struct EnqueueMap {
    inner: Mutex<Inner>,
}

impl EnqueueMap {
    /// Creates an empty map tracking live counts for `file_count` files.
    #[must_use]
    pub fn new(file_count: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: BTreeMap::new(),
                live_counts: vec![0; file_count],
            }),
        }
    }

    /// Resizes the live counter space to `file_count` files.
    ///
    /// The space never shrinks below the highest pfid still referenced.
    pub fn set_file_count(&self, file_count: usize) {
        let mut inner = self.inner.lock();
        let in_use = inner
            .live_counts
            .iter()
            .rposition(|&count| count > 0)
            .map_or(0, |i| i + 1);
        inner.live_counts.resize(file_count.max(in_use), 0);
    }

    /// Returns the number of files the live counters cover.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.inner.lock().live_counts.len()
    }

    /// Adds an unlocked entry for `rid` in file `pfid`.
    ///
    /// # Errors
    ///
    /// - `DuplicateRecordId` if `rid` is already present
    /// - `PfidOutOfRange` if `pfid` is outside the counter space
    pub fn insert(&self, rid: Rid, pfid: Pfid) -> CoreResult<()> {
        self.insert_locked(rid, pfid, false)
    }

    /// Adds an entry for `rid` in file `pfid` with the given lock state.
    ///
    /// # Errors
    ///
    /// See [`Self::insert`].
    pub fn insert_locked(&self, rid: Rid, pfid: Pfid, locked: bool) -> CoreResult<()> {
        let mut inner = self.inner.lock();
        if inner.entries.contains_key(&rid) {
            return Err(CoreError::DuplicateRecordId { rid });
        }
        inner.check_pfid(pfid)?;
        inner.entries.insert(rid, Entry { pfid, locked });
        inner.live_counts[pfid.index()] += 1;
        Ok(())
    }

    /// Returns the file holding `rid`.
    ///
    /// # Errors
    ///
    /// - `RecordNotFound` if `rid` is absent
    /// - `RecordLocked` if a transactional dequeue is pending on `rid`
    pub fn get(&self, rid: Rid) -> CoreResult<Pfid> {
        let inner = self.inner.lock();
        let entry = inner
            .entries
            .get(&rid)
            .ok_or(CoreError::RecordNotFound { rid })?;
        if entry.locked {
            return Err(CoreError::RecordLocked { rid });
        }
        Ok(entry.pfid)
    }

    /// Returns the file holding `rid`, whatever its lock state.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` if `rid` is absent.
    pub fn get_ignoring_lock(&self, rid: Rid) -> CoreResult<Pfid> {
        self.inner
            .lock()
            .entries
            .get(&rid)
            .map(|entry| entry.pfid)
            .ok_or(CoreError::RecordNotFound { rid })
    }

    /// Removes `rid` and returns the file that held it.
    ///
    /// `resolving_transaction` is set only by the transaction resolution path,
    /// which may remove an entry its own dequeue locked.
    ///
    /// # Errors
    ///
    /// - `RecordNotFound` if `rid` is absent
    /// - `RecordLocked` if the entry is locked and `resolving_transaction` is false;
    ///   the entry stays in the map
    pub fn get_and_remove(&self, rid: Rid, resolving_transaction: bool) -> CoreResult<Pfid> {
        let mut inner = self.inner.lock();
        let entry = *inner
            .entries
            .get(&rid)
            .ok_or(CoreError::RecordNotFound { rid })?;
        if entry.locked && !resolving_transaction {
            return Err(CoreError::RecordLocked { rid });
        }
        inner.remove(rid).ok_or(CoreError::RecordNotFound { rid })
    }

    /// Resolves a transactional dequeue of `rid`.
    ///
    /// On commit the entry is removed and its file returned. On abort the
    /// entry is unlocked and stays enqueued; `None` is returned.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` if `rid` is absent.
    pub fn resolve(&self, rid: Rid, outcome: TxnOutcome) -> CoreResult<Option<Pfid>> {
        match outcome {
            TxnOutcome::Commit => self.get_and_remove(rid, true).map(Some),
            TxnOutcome::Abort => self.unlock(rid).map(|()| None),
        }
    }

    /// Returns true if `rid` is present and, unless `ignore_lock`, unlocked.
    #[must_use]
    pub fn is_enqueued(&self, rid: Rid, ignore_lock: bool) -> bool {
        self.inner
            .lock()
            .entries
            .get(&rid)
            .is_some_and(|entry| ignore_lock || !entry.locked)
    }

    /// Marks `rid` as held by a pending transactional dequeue.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` if `rid` is absent.
    pub fn lock(&self, rid: Rid) -> CoreResult<()> {
        self.inner.lock().entry_mut(rid)?.locked = true;
        Ok(())
    }

    /// Clears the transaction lock on `rid`.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` if `rid` is absent.
    pub fn unlock(&self, rid: Rid) -> CoreResult<()> {
        self.inner.lock().entry_mut(rid)?.locked = false;
        Ok(())
    }

    /// Returns whether `rid` is locked.
    ///
    /// # Errors
    ///
    /// Returns `RecordNotFound` if `rid` is absent.
    pub fn is_locked(&self, rid: Rid) -> CoreResult<bool> {
        self.inner
            .lock()
            .entries
            .get(&rid)
            .map(|entry| entry.locked)
            .ok_or(CoreError::RecordNotFound { rid })
    }

    /// Returns the number of entries referencing `pfid`.
    ///
    /// # Errors
    ///
    /// Returns `PfidOutOfRange` if `pfid` is outside the counter space.
    pub fn live_count(&self, pfid: Pfid) -> CoreResult<u32> {
        let inner = self.inner.lock();
        inner.check_pfid(pfid)?;
        Ok(inner.live_counts[pfid.index()])
    }

    /// Returns true if no entry, locked or not, references `pfid`.
    ///
    /// # Errors
    ///
    /// Returns `PfidOutOfRange` if `pfid` is outside the counter space.
    pub fn is_reclaimable(&self, pfid: Pfid) -> CoreResult<bool> {
        self.live_count(pfid).map(|count| count == 0)
    }

    /// Returns the lowest pfid still holding a live record.
    ///
    /// Files are numbered in write order, so this is the oldest file that
    /// cannot yet be reclaimed.
    #[must_use]
    pub fn low_water_mark(&self) -> Option<Pfid> {
        self.inner
            .lock()
            .live_counts
            .iter()
            .position(|&count| count > 0)
            .and_then(|i| u16::try_from(i).ok())
            .map(Pfid::new)
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn size(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Returns true if the map holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Removes every entry and zeroes every live count.
    ///
    /// Used by recovery before rebuilding the map.
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.live_counts.iter_mut().for_each(|count| *count = 0);
    }

    /// Returns a snapshot of all record ids, in ascending order.
    #[must_use]
    pub fn rids(&self) -> Vec<Rid> {
        self.inner.lock().entries.keys().copied().collect()
    }

    /// Returns a snapshot of the pfid of every entry, in rid order.
    #[must_use]
    pub fn pfids(&self) -> Vec<Pfid> {
        self.inner
            .lock()
            .entries
            .values()
            .map(|entry| entry.pfid)
            .collect()
    }
}
