//! The transactional lock manager.
//!
//! Four collaborating pieces, leaves first:
//! - [`counter`] — the shared per-transaction conflict counter.
//! - [`deque`] — the sortable ring-buffer deque backing per-key queues and
//!   per-range overlap windows.
//! - [`interval_tree`] — the augmented red-black tree behind [`range_lock`].
//! - [`tx`] — the transaction record shared between queues and the tree.
//! - [`key_lock`] — per-key reader/writer queues.
//! - [`range_lock`] — the range-lock index.
//! - [`locker`] — [`locker::TransactionalLocker`], the facade routing point
//!   and range locks to the two structures above.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod counter;
pub mod deque;
pub mod error;
pub mod interval_tree;
pub mod key_lock;
pub mod locker;
pub mod range_lock;
pub mod tx;

pub use counter::Counter;
pub use deque::SortableDeque;
pub use error::LockError;
pub use interval_tree::IntervalTreeMap;
pub use key_lock::KeyLock;
pub use locker::{LockerConfig, TransactionalLocker};
pub use range_lock::RangeLock;
pub use tx::{Tx, TxKind};
