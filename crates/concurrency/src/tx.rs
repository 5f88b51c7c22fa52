//! The per-queue transaction record and the panic helper used throughout
//! this crate for invariant violations.

use crate::counter::Counter;
use std::cmp::Ordering;
use txlock_core::Tid;

/// Whether a queued transaction holds (or is waiting for) a read or a
/// write lock on the key/range it occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxKind {
    /// Shared; compatible with other readers.
    Reader,
    /// Exclusive; compatible with nothing.
    Writer,
}

/// One transaction's slot in a [`crate::key_lock::KeyLock`] queue or a
/// [`crate::range_lock::RangeLock`] overlap window.
///
/// Ordered by `(timestamp, tid)` so a [`crate::deque::SortableDeque`] of
/// `Tx` sorts into admission order with ties broken deterministically.
#[derive(Debug, Clone)]
pub struct Tx {
    /// The owning transaction.
    pub tid: Tid,
    /// Logical admission timestamp; non-decreasing across `update` calls
    /// for the same transaction.
    pub timestamp: i64,
    /// Reader or writer.
    pub kind: TxKind,
    /// Set when this slot was forced behind a conflicting lock that was
    /// already queued when it arrived, rather than by ordinary timestamp
    /// ordering. Distinguishes queue position caused by arrival order from
    /// position caused by an explicit conflict, which matters when
    /// deciding whether a later `update` can re-admit the transaction.
    pub queue_conflict: bool,
    /// The shared conflict counter for this transaction, incremented once
    /// per lock this record is blocked behind and decremented on each
    /// resolution.
    pub counter: Counter,
}

impl Tx {
    /// Construct a new queue record for `tid`.
    pub fn new(tid: Tid, timestamp: i64, kind: TxKind, counter: Counter) -> Self {
        Tx {
            tid,
            timestamp,
            kind,
            queue_conflict: false,
            counter,
        }
    }

    /// `true` once this record's counter has reached zero and it carries
    /// no outstanding queue conflict — the transaction may now execute.
    pub fn is_executable(&self) -> bool {
        !self.queue_conflict && self.counter.is_free()
    }
}

impl PartialEq for Tx {
    fn eq(&self, other: &Self) -> bool {
        self.tid == other.tid
    }
}
impl Eq for Tx {}

impl PartialOrd for Tx {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tx {
    fn cmp(&self, other: &Self) -> Ordering {
        self.timestamp
            .cmp(&other.timestamp)
            .then_with(|| self.tid.cmp(&other.tid))
    }
}

/// Log and panic on a violated invariant of the lock manager's own state
/// (a bug in this crate, not a caller mistake).
#[track_caller]
pub fn bug(message: &str) -> ! {
    tracing::error!(%message, "lock manager invariant violated");
    panic!("lock manager invariant violated: {message}");
}
