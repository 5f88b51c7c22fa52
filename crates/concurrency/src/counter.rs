//! The shared per-transaction conflict counter.
//!
//! Every [`crate::tx::Tx`] record belonging to the same transaction shares
//! one `Counter`. It is incremented once for every lock the transaction is
//! currently blocked behind and decremented as each of those locks
//! resolves; the transaction becomes executable only once the counter
//! reaches zero (edge-triggered — see [`Counter::release`]).

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::tx::bug;

/// A shared, non-negative conflict counter.
///
/// Locking in this crate is single-threaded by design, but the counter is
/// stored atomically so that it can be read from outside the lock
/// manager's call stack (for example, by a caller polling whether a
/// transaction has become executable) without a separate mutex.
#[derive(Debug, Clone)]
pub struct Counter(Arc<AtomicI64>);

impl Default for Counter {
    fn default() -> Self {
        Self::new()
    }
}

impl Counter {
    /// A fresh counter at zero.
    pub fn new() -> Self {
        Counter(Arc::new(AtomicI64::new(0)))
    }

    /// Current value.
    pub fn value(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }

    /// `true` iff the counter is at zero.
    pub fn is_free(&self) -> bool {
        self.value() == 0
    }

    /// Increment the counter by one.
    pub fn acquire(&self) {
        self.acquire_n(1);
    }

    /// Increment the counter by `n`. `n` must be non-negative.
    pub fn acquire_n(&self, n: i64) {
        if n < 0 {
            bug("counter acquire with a negative amount");
        }
        self.0.fetch_add(n, Ordering::SeqCst);
    }

    /// Decrement the counter by one.
    ///
    /// Returns `true` if this decrement is the edge that took the counter
    /// from one down to zero (the transaction may now be executable, if it
    /// also carries no queue conflict).
    ///
    /// # Panics
    /// Panics if the counter was already at zero or below — releasing more
    /// than was acquired is a bug in the caller, not a recoverable error.
    pub fn release(&self) -> bool {
        let previous = self.0.fetch_sub(1, Ordering::SeqCst);
        if previous <= 0 {
            bug("counter released past zero");
        }
        previous == 1
    }
}
