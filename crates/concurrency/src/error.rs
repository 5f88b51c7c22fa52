//! User-recoverable errors from the lock manager.
//!
//! Invariant violations (counter underflow, `update`/`unlock` against an
//! empty queue, a misaligned iterator, a committing writer not at the head
//! of its queue) are *not* represented here — they indicate corruption of
//! the lock manager's own state and are raised as panics (see
//! [`crate::tx::bug`]) rather than recovered locally.

use thiserror::Error;
use txlock_core::{KeyError, Tid};

/// Errors a caller of [`crate::locker::TransactionalLocker`] can recover
/// from.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LockError {
    /// A point or range lock API was given a key sentinel it does not
    /// accept.
    #[error(transparent)]
    InvalidKey(#[from] KeyError),

    /// `update`/`unlock` named a TID with no pending transaction.
    #[error("transaction {0} is not pending")]
    NotPending(Tid),

    /// `update` was called with a timestamp older than the one already
    /// recorded for this transaction. Per-transaction timestamps must be
    /// non-decreasing.
    #[error("timestamp for {tid} must be non-decreasing: current {current}, got {requested}")]
    NonMonotoneTimestamp {
        /// The transaction being updated.
        tid: Tid,
        /// The timestamp already on record.
        current: i64,
        /// The (rejected) timestamp the caller requested.
        requested: i64,
    },
}

impl LockError {
    /// `true` for every variant here — all of them are user errors by
    /// construction; this mirrors the teacher's `is_*` classification
    /// helpers on `StrataError` even though there is currently only one
    /// class to report.
    pub fn is_user_error(&self) -> bool {
        true
    }
}
