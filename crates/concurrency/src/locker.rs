//! The facade: routes point locks to per-key queues, range locks to the
//! range index, and tracks what each live transaction currently holds so
//! `update`/`unlock` know where to fan out.

use std::collections::{HashMap, HashSet};

use txlock_core::key::{validate_point_key, validate_range_endpoints};
use txlock_core::{Key, Tid};

use tracing::{debug, trace};

use crate::counter::Counter;
use crate::error::LockError;
use crate::key_lock::KeyLock;
use crate::range_lock::RangeLock;
use crate::tx::bug;

/// Tuning knobs for a [`TransactionalLocker`].
#[derive(Debug, Clone, Copy)]
pub struct LockerConfig {
    /// Initial ring capacity for each per-key [`KeyLock`] queue this
    /// locker creates, rounded up to a power of two by
    /// [`crate::deque::SortableDeque::with_capacity`]. Raise this for
    /// workloads with many transactions typically queued on the same
    /// key, to avoid the first few re-allocations.
    pub key_queue_capacity: usize,
}

impl Default for LockerConfig {
    /// Matches [`crate::deque::SortableDeque::new`]'s own default — the
    /// smallest useful power of two.
    fn default() -> Self {
        LockerConfig {
            key_queue_capacity: 4,
        }
    }
}

#[derive(Debug, Default)]
struct Pending {
    counter: Counter,
    keys: HashSet<Key>,
    ranges: HashSet<(Key, Key)>,
}

/// The per-transaction working context established by `start` and cleared
/// by `end`.
#[derive(Debug, Clone, Copy)]
struct Context {
    timestamp: i64,
}

/// Routes point locks to per-key queues and range locks to a single
/// range index, tracking what each pending transaction holds so `update`
/// and `unlock` can fan out to every lock it occupies.
#[derive(Debug)]
pub struct TransactionalLocker {
    key_locks: HashMap<Key, KeyLock>,
    range_lock: RangeLock,
    pending: HashMap<Tid, Pending>,
    context: Option<(Tid, Context)>,
    config: LockerConfig,
}

impl Default for TransactionalLocker {
    fn default() -> Self {
        TransactionalLocker::new(LockerConfig::default())
    }
}

impl TransactionalLocker {
    /// A fresh locker with no pending transactions.
    pub fn new(config: LockerConfig) -> Self {
        TransactionalLocker {
            key_locks: HashMap::new(),
            range_lock: RangeLock::new(),
            pending: HashMap::new(),
            context: None,
            config,
        }
    }

    /// Number of transactions with at least one held lock.
    pub fn size(&self) -> usize {
        self.pending.len()
    }

    /// Drop every held lock and pending transaction. Intended for tests
    /// and for recovering a fresh manager between runs — the lock state
    /// is not persisted, so this is also effectively the boot state.
    pub fn reset(&mut self) {
        self.key_locks.clear();
        self.range_lock = RangeLock::new();
        self.pending.clear();
        self.context = None;
    }

    /// Establish the working context for `tid`'s subsequent point/range
    /// lock calls. A transaction may re-enter `start`/`end` any number of
    /// times across its lifetime (e.g. a reader upgrading to a writer in a
    /// later call): the existing pending record and its locks survive,
    /// only the working timestamp and counter are refreshed.
    pub fn start(&mut self, tid: Tid, ts: i64, counter: Counter) -> Result<(), LockError> {
        match self.pending.get_mut(&tid) {
            Some(pending) => pending.counter = counter,
            None => {
                self.pending.insert(
                    tid.clone(),
                    Pending {
                        counter,
                        keys: HashSet::new(),
                        ranges: HashSet::new(),
                    },
                );
            }
        }
        self.context = Some((tid, Context { timestamp: ts }));
        Ok(())
    }

    /// Clear the working context. Held locks survive until `unlock`.
    pub fn end(&mut self) {
        self.context = None;
    }

    fn current(&self) -> (&Tid, i64, Counter) {
        let Some((tid, ctx)) = &self.context else {
            bug("lock call outside of a start/end context");
        };
        let Some(pending) = self.pending.get(tid) else {
            bug("current context's tid has no pending entry");
        };
        (tid, ctx.timestamp, pending.counter.clone())
    }

    /// Acquire a shared lock on a single concrete key.
    ///
    /// The key is also registered with the range index as a degenerate
    /// `[k, k]` entry, so a range lock spanning `k` (including
    /// `writeAllLock`) conflicts with it; point-vs-point conflicts at the
    /// same key stay [`KeyLock`]'s job alone.
    pub fn read_lock(&mut self, key: Key) -> Result<(), LockError> {
        validate_point_key(&key)?;
        let (tid, ts, counter) = self.current();
        let tid = tid.clone();
        trace!(tid = %tid, key = %key, "read_lock");
        let capacity = self.config.key_queue_capacity;
        self.key_locks
            .entry(key.clone())
            .or_insert_with(|| KeyLock::with_capacity(capacity))
            .read_lock(tid.clone(), ts, counter.clone());
        self.range_lock
            .read_lock(key.clone(), key.clone(), tid.clone(), ts, counter);
        self.pending.get_mut(&tid).unwrap().keys.insert(key);
        Ok(())
    }

    /// Acquire an exclusive lock on a single concrete key, or promote an
    /// existing read lock. See [`Self::read_lock`] for the degenerate
    /// range-index entry this also maintains.
    pub fn write_lock(&mut self, key: Key) -> Result<(), LockError> {
        validate_point_key(&key)?;
        let (tid, ts, counter) = self.current();
        let tid = tid.clone();
        trace!(tid = %tid, key = %key, "write_lock");
        let capacity = self.config.key_queue_capacity;
        self.key_locks
            .entry(key.clone())
            .or_insert_with(|| KeyLock::with_capacity(capacity))
            .write_lock(tid.clone(), ts, counter.clone());
        self.range_lock
            .write_lock(key.clone(), key.clone(), tid.clone(), ts, counter);
        self.pending.get_mut(&tid).unwrap().keys.insert(key);
        Ok(())
    }

    /// Acquire a shared lock on `[start, end]`.
    pub fn read_range_lock(&mut self, start: Key, end: Key) -> Result<(), LockError> {
        validate_range_endpoints(&start, &end)?;
        let (tid, ts, counter) = self.current();
        let tid = tid.clone();
        trace!(tid = %tid, start = %start, end = %end, "read_range_lock");
        self.range_lock
            .read_lock(start.clone(), end.clone(), tid.clone(), ts, counter);
        self.pending
            .get_mut(&tid)
            .unwrap()
            .ranges
            .insert((start, end));
        Ok(())
    }

    /// Acquire an exclusive lock on `[start, end]`, or promote an
    /// existing range read lock.
    pub fn write_range_lock(&mut self, start: Key, end: Key) -> Result<(), LockError> {
        validate_range_endpoints(&start, &end)?;
        let (tid, ts, counter) = self.current();
        let tid = tid.clone();
        trace!(tid = %tid, start = %start, end = %end, "write_range_lock");
        self.range_lock
            .write_lock(start.clone(), end.clone(), tid.clone(), ts, counter);
        self.pending
            .get_mut(&tid)
            .unwrap()
            .ranges
            .insert((start, end));
        Ok(())
    }

    /// Acquire an exclusive lock over the entire key space
    /// (`[FIRST, LAST]`) — conflicts with every point and range lock any
    /// other transaction holds.
    pub fn write_all_lock(&mut self) -> Result<(), LockError> {
        self.write_range_lock(Key::First, Key::Last)
    }

    /// Re-order `tid` to a new, non-decreasing timestamp across every
    /// lock it holds, fanning executables from whichever locks this
    /// unblocks into `exec`.
    pub fn update(
        &mut self,
        tid: &Tid,
        new_ts: i64,
        exec: &mut HashSet<Tid>,
    ) -> Result<(), LockError> {
        let Some(pending) = self.pending.get(tid) else {
            return Err(LockError::NotPending(tid.clone()));
        };
        debug!(tid = %tid, new_ts, "update");
        let keys: Vec<Key> = pending.keys.iter().cloned().collect();
        let ranges: Vec<(Key, Key)> = pending.ranges.iter().cloned().collect();
        let before = exec.len();

        for key in &keys {
            let Some(lock) = self.key_locks.get_mut(key) else {
                bug("held key has no key-lock entry");
            };
            lock.update(tid, new_ts, exec)?;
            self.range_lock.update(key, key, tid, new_ts, exec)?;
        }
        for (start, end) in &ranges {
            self.range_lock.update(start, end, tid, new_ts, exec)?;
        }
        exec.remove(tid);
        if exec.len() > before {
            debug!(tid = %tid, newly_unblocked = exec.len() - before, "update admitted successors");
        }
        Ok(())
    }

    /// Release every lock `tid` holds, fanning executables this
    /// unblocks into `exec`, and forget the transaction.
    pub fn unlock(
        &mut self,
        tid: &Tid,
        commit: bool,
        exec: &mut HashSet<Tid>,
    ) -> Result<(), LockError> {
        let Some(pending) = self.pending.remove(tid) else {
            return Err(LockError::NotPending(tid.clone()));
        };
        debug!(tid = %tid, commit, "unlock");

        for key in &pending.keys {
            let Some(lock) = self.key_locks.get_mut(key) else {
                bug("held key has no key-lock entry");
            };
            lock.unlock(tid, commit, exec);
            if lock.is_empty() {
                self.key_locks.remove(key);
            }
            self.range_lock.unlock(key, key, tid, exec);
        }
        for (start, end) in &pending.ranges {
            self.range_lock.unlock(start, end, tid, exec);
        }
        exec.remove(tid);
        if self.context.as_ref().is_some_and(|(t, _)| t == tid) {
            self.context = None;
        }
        Ok(())
    }
}
