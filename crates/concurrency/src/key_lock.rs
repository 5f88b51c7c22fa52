//! Per-key FIFO lock queue with reader/writer semantics, upgrade, and
//! timestamp re-ordering.

use std::collections::HashSet;

use tracing::trace;
use txlock_core::Tid;

use crate::counter::Counter;
use crate::deque::{Cursor, SortableDeque};
use crate::error::LockError;
use crate::tx::{bug, Tx, TxKind};

/// The lock queue for a single concrete key.
///
/// Holds at most one leading group of mutually compatible readers
/// (`queue_conflict == false`), followed by alternating writer/reader
/// blocks each carrying `queue_conflict == true` until something ahead of
/// them resolves.
#[derive(Debug, Clone, Default)]
pub struct KeyLock {
    queue: SortableDeque<Tx>,
}

impl KeyLock {
    /// An empty queue at the deque's default starting capacity.
    pub fn new() -> Self {
        KeyLock {
            queue: SortableDeque::new(),
        }
    }

    /// An empty queue pre-sized for `capacity` concurrent holders, per
    /// [`crate::locker::LockerConfig::key_queue_capacity`].
    pub fn with_capacity(capacity: usize) -> Self {
        KeyLock {
            queue: SortableDeque::with_capacity(capacity),
        }
    }

    /// `true` once every transaction holding this key has unlocked; a
    /// facade may drop the `KeyLock` entirely at that point.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Current backing ring capacity of this queue's deque.
    pub fn queue_capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Acquire (or re-acquire, as a no-op) a shared lock for `tid`.
    pub fn read_lock(&mut self, tid: Tid, ts: i64, counter: Counter) {
        if self.queue.peek_last().is_some_and(|last| last.tid == tid) {
            return;
        }
        let blocked = self
            .queue
            .peek_last()
            .is_some_and(|last| last.kind == TxKind::Writer || last.queue_conflict);
        let mut tx = Tx::new(tid.clone(), ts, TxKind::Reader, counter.clone());
        if blocked {
            tx.queue_conflict = true;
            counter.acquire();
        }
        trace!(tid = %tid, blocked, "key read_lock queued");
        self.queue.push_last(tx);
    }

    /// Acquire an exclusive lock for `tid`, or promote an existing reader
    /// held by `tid` at the tail of this queue.
    pub fn write_lock(&mut self, tid: Tid, ts: i64, counter: Counter) {
        if self.queue.peek_last().is_some_and(|last| last.tid == tid) {
            if self.queue.peek_last().unwrap().kind == TxKind::Reader {
                let others_precede = self.queue.len() > 1;
                let mut tx = self.queue.pop_last().unwrap();
                tx.kind = TxKind::Writer;
                if others_precede && !tx.queue_conflict {
                    tx.queue_conflict = true;
                    tx.counter.acquire();
                }
                trace!(tid = %tid, others_precede, "key write_lock upgraded a reader");
                self.queue.push_last(tx);
            }
            return;
        }
        let blocked = !self.queue.is_empty();
        let tid_for_log = tid.clone();
        let mut tx = Tx::new(tid, ts, TxKind::Writer, counter.clone());
        if blocked {
            tx.queue_conflict = true;
            counter.acquire();
        }
        trace!(tid = %tid_for_log, blocked, "key write_lock queued");
        self.queue.push_last(tx);
    }

    /// Admit whichever successors this resolution unblocks, up to
    /// `cutoff` (inclusive). Shared between `update` and `unlock` — the
    /// latter passes `i64::MAX` for an unbounded pass.
    ///
    /// A resolved reader can only ever free its single immediate
    /// successor (other leading readers behind it are already clear;
    /// a writer further back is still correctly blocked by readers in
    /// between). A resolved writer frees a run of readers immediately
    /// behind it, plus the writer that ends the run, then stops — one
    /// writer at a time holds the exclusive slot.
    fn admit_successors(
        cur: &mut Cursor<'_, Tx>,
        kind: TxKind,
        cutoff: i64,
        exec: &mut HashSet<Tid>,
    ) {
        match kind {
            TxKind::Reader => {
                let Some(next) = cur.peek_next() else { return };
                if next.timestamp > cutoff || next.kind != TxKind::Writer {
                    return;
                }
                let succ = cur.next_mut().unwrap();
                Self::release_one(succ, exec);
            }
            TxKind::Writer => {
                while let Some(next) = cur.peek_next() {
                    if next.timestamp > cutoff {
                        break;
                    }
                    let succ_kind = next.kind;
                    let succ = cur.next_mut().unwrap();
                    Self::release_one(succ, exec);
                    if succ_kind == TxKind::Writer {
                        break;
                    }
                }
            }
        }
    }

    fn release_one(succ: &mut Tx, exec: &mut HashSet<Tid>) {
        if succ.queue_conflict {
            succ.queue_conflict = false;
            if succ.counter.release() && !succ.queue_conflict {
                trace!(tid = %succ.tid, "key queue conflict resolved, now executable");
                exec.insert(succ.tid.clone());
            }
        }
    }

    /// Re-order `tid` to a new, non-decreasing timestamp, admitting any
    /// successors this unblocks and emitting their TIDs into `exec` on a
    /// `1 -> 0` counter transition.
    pub fn update(
        &mut self,
        tid: &Tid,
        new_ts: i64,
        exec: &mut HashSet<Tid>,
    ) -> Result<(), LockError> {
        let (kind, was_executable, leading_or_clear);
        {
            let mut cur = self.queue.iter_from(tid, |t| t.tid.clone());
            let leading = cur.current().is_none();
            let predecessor_clear = cur.current().map(|p| !p.queue_conflict).unwrap_or(true);
            let Some(target) = cur.next_mut() else {
                bug("update against a key queue with no matching tid");
            };
            if new_ts < target.timestamp {
                return Err(LockError::NonMonotoneTimestamp {
                    tid: tid.clone(),
                    current: target.timestamp,
                    requested: new_ts,
                });
            }
            kind = target.kind;
            was_executable = target.is_executable();
            leading_or_clear = match kind {
                TxKind::Reader => leading,
                TxKind::Writer => leading || predecessor_clear,
            };
            if leading_or_clear {
                Self::admit_successors(&mut cur, kind, new_ts, exec);
            }
            // Safe to rewrite the timestamp now; nothing above reads it.
            let mut cur = self.queue.iter_from(tid, |t| t.tid.clone());
            cur.next_mut().unwrap().timestamp = new_ts;
        }

        self.queue.sort();
        self.finish_reposition(tid, kind, was_executable, exec);
        Ok(())
    }

    /// Remove `tid` from this queue (its transaction has ended), admitting
    /// whatever this unblocks. `commit` with the record not at the head of
    /// the queue is a bug (a committing writer must be the sole head).
    pub fn unlock(&mut self, tid: &Tid, commit: bool, exec: &mut HashSet<Tid>) {
        trace!(tid = %tid, commit, "key unlock");
        let mut cur = self.queue.iter_from(tid, |t| t.tid.clone());
        let leading = cur.current().is_none();
        let predecessor_clear = cur.current().map(|p| !p.queue_conflict).unwrap_or(true);
        let Some(target) = cur.next() else {
            bug("unlock against a key queue with no matching tid");
        };
        let kind = target.kind;
        if commit && kind == TxKind::Writer && !leading {
            bug("committing writer is not at the head of its key queue");
        }

        let leading_or_clear = match kind {
            TxKind::Reader => leading,
            TxKind::Writer => leading || predecessor_clear,
        };
        if leading_or_clear {
            Self::admit_successors(&mut cur, kind, i64::MAX, exec);
        }
        // `admit_successors` may have advanced `cur` past `tid`'s own slot
        // (releasing a successor moves the cursor); re-find it fresh so
        // `remove()` deletes the transaction that actually unlocked, not
        // whatever the cursor was last left pointing at.
        let mut cur = self.queue.iter_from(tid, |t| t.tid.clone());
        cur.next();
        cur.remove();
    }

    /// After re-sorting, either emit `tid` (if it newly became the
    /// executable head) or charge it a fresh conflict for having moved
    /// behind something else.
    fn finish_reposition(
        &mut self,
        tid: &Tid,
        kind: TxKind,
        was_executable: bool,
        exec: &mut HashSet<Tid>,
    ) {
        let mut cur = self.queue.iter_from(tid, |t| t.tid.clone());
        let now_leading = cur.current().is_none();
        let predecessor_conflict = cur.current().map(|p| p.queue_conflict).unwrap_or(false);
        let target = cur
            .next_mut()
            .expect("tid must still be in the queue after sort");

        if now_leading {
            if !was_executable && target.is_executable() {
                exec.insert(tid.clone());
            }
            return;
        }

        match kind {
            TxKind::Writer => {
                target.queue_conflict = true;
                target.counter.acquire();
            }
            TxKind::Reader => {
                if target.queue_conflict && !predecessor_conflict {
                    bug("reader blocked behind a clear predecessor");
                }
                if !target.queue_conflict && predecessor_conflict {
                    target.queue_conflict = true;
                    target.counter.acquire();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tid(n: u8) -> Tid {
        Tid::from_bytes(vec![0, 0, 0, n]).unwrap()
    }

    #[test]
    fn s1_fifo_readers_then_writer() {
        let mut kl = KeyLock::new();
        let (c1, c2, c3) = (Counter::new(), Counter::new(), Counter::new());
        kl.read_lock(tid(1), 10, c1.clone());
        kl.read_lock(tid(2), 20, c2.clone());
        kl.write_lock(tid(3), 30, c3.clone());
        assert!(c1.is_free());
        assert!(c2.is_free());
        assert_eq!(c3.value(), 1);

        let mut exec = HashSet::new();
        kl.unlock(&tid(1), true, &mut exec);
        assert!(exec.is_empty());

        let mut exec = HashSet::new();
        kl.unlock(&tid(2), true, &mut exec);
        assert_eq!(exec, HashSet::from([tid(3)]));
    }

    #[test]
    fn s2_upgrade_then_block_a_later_reader() {
        let mut kl = KeyLock::new();
        let (c1, c2) = (Counter::new(), Counter::new());
        kl.read_lock(tid(1), 10, c1.clone());
        assert!(c1.is_free());

        kl.write_lock(tid(1), 10, c1.clone());
        assert!(c1.is_free()); // alone: upgrade is a no-op

        kl.read_lock(tid(2), 20, c2.clone());
        assert_eq!(c2.value(), 1);

        let mut exec = HashSet::new();
        kl.unlock(&tid(1), true, &mut exec);
        assert_eq!(exec, HashSet::from([tid(2)]));
    }

    #[test]
    fn s3_timestamp_reorder_demotes_the_updated_writer() {
        let mut kl = KeyLock::new();
        let (c1, c2) = (Counter::new(), Counter::new());
        kl.write_lock(tid(1), 30, c1.clone());
        assert!(c1.is_free());
        kl.read_lock(tid(2), 20, c2.clone());
        assert_eq!(c2.value(), 1);

        let mut exec = HashSet::new();
        kl.update(&tid(1), 40, &mut exec).unwrap();
        assert_eq!(exec, HashSet::from([tid(2)]));
        assert!(c2.is_free());
        assert_eq!(c1.value(), 1); // T1 demoted behind T2
    }

    #[test]
    fn update_rejects_non_monotone_timestamps() {
        let mut kl = KeyLock::new();
        let c1 = Counter::new();
        kl.write_lock(tid(1), 30, c1);
        let mut exec = HashSet::new();
        let err = kl.update(&tid(1), 10, &mut exec).unwrap_err();
        assert!(matches!(err, LockError::NonMonotoneTimestamp { .. }));
    }

    #[test]
    fn write_lock_alone_is_never_blocked() {
        let mut kl = KeyLock::new();
        let c1 = Counter::new();
        kl.write_lock(tid(1), 0, c1.clone());
        assert!(c1.is_free());
    }

    #[test]
    #[should_panic(expected = "lock manager invariant violated")]
    fn unlock_unknown_tid_is_a_bug() {
        let mut kl = KeyLock::new();
        let mut exec = HashSet::new();
        kl.unlock(&tid(9), true, &mut exec);
    }
}
