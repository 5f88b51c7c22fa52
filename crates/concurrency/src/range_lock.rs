//! Range-lock index built atop [`IntervalTreeMap`]: per-range
//! reader/writer semantics with overlap-driven conflict counting.
//!
//! A point lock is represented here too, as a degenerate `[k, k]` entry,
//! so that a range spanning `k` and a point lock on `k` conflict through
//! the same overlap machinery. Two degenerate entries can only overlap
//! at the exact same key, which is [`crate::key_lock::KeyLock`]'s job —
//! every admission pass here skips pairs where both sides are points.

use std::collections::HashSet;

use tracing::trace;
use txlock_core::{Key, Tid};

use crate::counter::Counter;
use crate::error::LockError;
use crate::interval_tree::IntervalTreeMap;
use crate::tx::{bug, Tx, TxKind};

fn is_point(start: &Key, end: &Key) -> bool {
    start == end
}

type Entry = (Key, Key, Tx);

/// The range-lock index, shared across every `[start, end]` range (or
/// degenerate `[k, k]` point) any transaction has locked.
///
/// Unlike [`crate::key_lock::KeyLock`], admission here is not
/// adjacency-sensitive: a record's conflict count is a plain tally of
/// earlier overlapping records, so resolving one earlier conflict always
/// removes exactly one unit from each later overlapping record,
/// independent of queue position.
#[derive(Debug, Clone, Default)]
pub struct RangeLock {
    tree: IntervalTreeMap<Key, Tx>,
}

impl RangeLock {
    /// An empty range index.
    pub fn new() -> Self {
        RangeLock {
            tree: IntervalTreeMap::new(),
        }
    }

    /// Number of range-lock records currently held.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// `true` iff no range locks are held.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    fn overlap_window(&self, start: &Key, end: &Key) -> Vec<Entry> {
        let mut window: Vec<Entry> = self
            .tree
            .get_all(start, end)
            .into_iter()
            .map(|(s, e, v)| (s.clone(), e.clone(), v.clone()))
            .collect();
        window.sort_by(|a, b| a.2.cmp(&b.2));
        window
    }

    fn existing(&self, start: &Key, end: &Key, tid: &Tid) -> Option<Tx> {
        self.tree
            .get_all(start, end)
            .into_iter()
            .find(|(s, e, v)| *s == start && *e == end && v.tid == *tid)
            .map(|(_, _, v)| v.clone())
    }

    /// Whether `entry` should count as a conflict against a new or
    /// resolving record at `(start, end)` — same-key point pairs are
    /// excluded, since [`crate::key_lock::KeyLock`] already accounts for
    /// those.
    fn counts_as_conflict(start: &Key, end: &Key, entry: &Entry) -> bool {
        !(is_point(start, end) && is_point(&entry.0, &entry.1))
    }

    /// Acquire (or re-acquire, as a no-op) a shared lock on `[start,
    /// end]`.
    pub fn read_lock(&mut self, start: Key, end: Key, tid: Tid, ts: i64, counter: Counter) {
        if self.existing(&start, &end, &tid).is_some() {
            return;
        }
        let window = self.overlap_window(&start, &end);
        let writer_count = window
            .iter()
            .filter(|e| e.2.kind == TxKind::Writer && Self::counts_as_conflict(&start, &end, e))
            .count() as i64;
        trace!(tid = %tid, start = %start, end = %end, writer_count, "range read_lock");
        let tx = Tx::new(tid, ts, TxKind::Reader, counter.clone());
        if writer_count > 0 {
            counter.acquire_n(writer_count);
        }
        self.tree.put(start, end, tx);
    }

    /// Acquire an exclusive lock on `[start, end]`, or promote an
    /// existing reader held by `tid` on the same range.
    pub fn write_lock(&mut self, start: Key, end: Key, tid: Tid, ts: i64, counter: Counter) {
        if let Some(existing) = self.existing(&start, &end, &tid) {
            if existing.kind == TxKind::Writer {
                return;
            }
            self.tree.remove(&start, &end, &existing);
            let remaining = self.overlap_window(&start, &end);
            let reader_count = remaining
                .iter()
                .filter(|e| e.2.kind == TxKind::Reader && Self::counts_as_conflict(&start, &end, e))
                .count() as i64;
            let mut tx = existing;
            tx.kind = TxKind::Writer;
            if reader_count > 0 {
                tx.counter.acquire_n(reader_count);
            }
            trace!(tid = %tx.tid, start = %start, end = %end, reader_count, "range write_lock upgraded a reader");
            self.tree.put(start, end, tx);
            return;
        }
        let window = self.overlap_window(&start, &end);
        let conflicts = window
            .iter()
            .filter(|e| Self::counts_as_conflict(&start, &end, e))
            .count() as i64;
        trace!(tid = %tid, start = %start, end = %end, conflicts, "range write_lock");
        let tx = Tx::new(tid, ts, TxKind::Writer, counter.clone());
        if conflicts > 0 {
            counter.acquire_n(conflicts);
        }
        self.tree.put(start, end, tx);
    }

    fn release_one(t: &Tx, exec: &mut HashSet<Tid>) {
        if t.counter.release() {
            trace!(tid = %t.tid, "range tree conflict resolved, now executable");
            exec.insert(t.tid.clone());
        }
    }

    /// Re-order the `tid` holding `[start, end]` to a new, non-decreasing
    /// timestamp, decrementing whichever later-ordered overlapping
    /// records this unblocks.
    pub fn update(
        &mut self,
        start: &Key,
        end: &Key,
        tid: &Tid,
        new_ts: i64,
        exec: &mut HashSet<Tid>,
    ) -> Result<(), LockError> {
        let window = self.overlap_window(start, end);
        let Some(pos) = window.iter().position(|e| e.2.tid == *tid) else {
            bug("update against a range with no matching tid");
        };
        let target = window[pos].clone();
        if new_ts < target.2.timestamp {
            return Err(LockError::NonMonotoneTimestamp {
                tid: tid.clone(),
                current: target.2.timestamp,
                requested: new_ts,
            });
        }

        for later in &window[pos + 1..] {
            if later.2.timestamp > new_ts {
                break;
            }
            if !Self::counts_as_conflict(start, end, later) {
                continue;
            }
            match target.2.kind {
                TxKind::Reader => {
                    if later.2.kind == TxKind::Writer {
                        Self::release_one(&later.2, exec);
                    }
                }
                TxKind::Writer => Self::release_one(&later.2, exec),
            }
        }

        self.tree.remove(start, end, &target.2);
        let mut updated = target.2;
        updated.timestamp = new_ts;
        self.tree.put(start.clone(), end.clone(), updated);
        Ok(())
    }

    /// Release the range lock `tid` holds on `[start, end]`, admitting
    /// whatever this unblocks.
    pub fn unlock(&mut self, start: &Key, end: &Key, tid: &Tid, exec: &mut HashSet<Tid>) {
        trace!(tid = %tid, start = %start, end = %end, "range unlock");
        let window = self.overlap_window(start, end);
        let Some(pos) = window.iter().position(|e| e.2.tid == *tid) else {
            bug("unlock against a range with no matching tid");
        };
        let target = &window[pos];
        let target_kind = target.2.kind;

        for later in &window[pos + 1..] {
            if !Self::counts_as_conflict(start, end, later) {
                continue;
            }
            match target_kind {
                TxKind::Reader => {
                    if later.2.kind == TxKind::Writer {
                        Self::release_one(&later.2, exec);
                    }
                }
                TxKind::Writer => Self::release_one(&later.2, exec),
            }
        }

        self.tree.remove(start, end, &window[pos].2);
    }
}
