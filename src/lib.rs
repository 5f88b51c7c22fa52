//! Transactional lock manager for a deterministic, single-partition
//! key-value store.
//!
//! This crate is a thin facade over [`txlock_core`] (the shared key/TID
//! data model) and [`txlock_concurrency`] (the lock manager itself). Most
//! callers only need [`TransactionalLocker`].

#![warn(missing_docs)]
#![warn(clippy::all)]

pub use txlock_core::{Key, KeyError, Tid, Value};

pub use txlock_concurrency::{
    Counter, IntervalTreeMap, KeyLock, LockError, LockerConfig, RangeLock, SortableDeque,
    TransactionalLocker, Tx, TxKind,
};
