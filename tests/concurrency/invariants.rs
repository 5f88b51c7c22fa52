use std::collections::HashSet;

use proptest::prelude::*;
use rand::Rng;

use txlock::{
    Counter, IntervalTreeMap, Key, LockerConfig, SortableDeque, Tid, TransactionalLocker,
};

fn tid(n: u8) -> Tid {
    Tid::from_bytes(vec![0, 0, 0, n]).unwrap()
}
fn key(n: u8) -> Key {
    Key::concrete(vec![n])
}

fn overlaps(a: (u8, u8), b: (u8, u8)) -> bool {
    a.0 <= b.1 && a.1 >= b.0
}

fn collect(dq: &mut SortableDeque<i64>) -> Vec<i64> {
    let mut cursor = dq.iter();
    let mut out = Vec::new();
    while let Some(v) = cursor.next() {
        out.push(*v);
    }
    out
}

proptest! {
    /// Invariant 1 (counter never negative) and invariant 2 (edge-triggered
    /// emission): a batch of point writers queued on one key, released in
    /// arbitrary order, never drives any counter below zero, and each TID
    /// shows up in an execSet at most once.
    #[test]
    fn counter_never_negative_under_arbitrary_release_order(
        order in prop::collection::vec(0u8..8, 0..16)
    ) {
        let mut tl = TransactionalLocker::new(LockerConfig::default());
        let counters: Vec<Counter> = (0..8).map(|_| Counter::new()).collect();
        for i in 0..8u8 {
            tl.start(tid(i), i as i64, counters[i as usize].clone()).unwrap();
            tl.write_lock(key(0)).unwrap();
            tl.end();
        }
        for c in &counters {
            prop_assert!(c.value() >= 0);
        }

        let mut seen = std::collections::HashSet::new();
        for &i in &order {
            let mut exec = std::collections::HashSet::new();
            // Abort (commit=false) rather than commit: a committing writer
            // not at the head of its queue is an invariant violation by
            // design, and this release order is deliberately arbitrary.
            if tl.unlock(&tid(i), false, &mut exec).is_err() {
                continue;
            }
            for t in &exec {
                prop_assert!(seen.insert(t.clone()), "tid emitted twice across unlocks");
            }
            for c in &counters {
                prop_assert!(c.value() >= 0);
            }
        }
    }

    /// Invariant 4: `get_all` returns every stored triple overlapping the
    /// query window and no others.
    #[test]
    fn interval_tree_overlap_completeness(
        ranges in prop::collection::vec((0u8..20, 0u8..20), 1..30),
        query in (0u8..20, 0u8..20)
    ) {
        let mut tree = IntervalTreeMap::new();
        let mut stored = Vec::new();
        for (i, &(a, b)) in ranges.iter().enumerate() {
            let (s, e) = (a.min(b), a.max(b));
            tree.put(s, e, i as u32);
            stored.push((s, e, i as u32));
        }
        let (qa, qb) = query;
        let (qs, qe) = (qa.min(qb), qa.max(qb));

        let got: std::collections::HashSet<(u8, u8, u32)> = tree
            .get_all(&qs, &qe)
            .into_iter()
            .map(|(s, e, v)| (*s, *e, *v))
            .collect();
        let expected: std::collections::HashSet<(u8, u8, u32)> = stored
            .into_iter()
            .filter(|&(s, e, _)| overlaps((s, e), (qs, qe)))
            .collect();
        prop_assert_eq!(got, expected);
    }

    /// Invariant 7 & 8: ring-deque size tracking and sort idempotence.
    #[test]
    fn deque_size_and_sort_idempotence(values in prop::collection::vec(0i64..1000, 0..50)) {
        let mut dq = SortableDeque::new();
        for v in &values {
            dq.push_last(*v);
        }
        prop_assert_eq!(dq.len(), values.len());
        prop_assert_eq!(dq.is_empty(), values.is_empty());

        dq.sort();
        let once = collect(&mut dq);
        dq.sort();
        let twice = collect(&mut dq);
        prop_assert_eq!(once, twice);
    }

    /// Invariant 3: timestamps `update` observes for a single transaction
    /// are non-decreasing, so a strictly-decreasing update is always
    /// rejected.
    #[test]
    fn update_rejects_non_monotone_timestamps(first in 0i64..1000, second in 0i64..1000) {
        let mut tl = TransactionalLocker::new(LockerConfig::default());
        let c1 = Counter::new();
        tl.start(tid(1), first, c1).unwrap();
        tl.write_lock(key(1)).unwrap();
        tl.end();

        let mut exec = std::collections::HashSet::new();
        let result = tl.update(&tid(1), second, &mut exec);
        if second < first {
            prop_assert!(result.is_err());
        } else {
            prop_assert!(result.is_ok());
        }
    }
}

/// Invariant 9 (round-trip): after a transaction takes a mix of point and
/// range locks and unlocks, nothing in the locker still references it, and
/// every other transaction whose counter reaches zero is reported exactly
/// once.
#[test]
fn round_trip_forgets_the_transaction_entirely() {
    let mut tl = TransactionalLocker::new(LockerConfig::default());
    let (c1, c2) = (Counter::new(), Counter::new());

    tl.start(tid(1), 0, c1.clone()).unwrap();
    tl.write_lock(key(1)).unwrap();
    tl.write_range_lock(key(10), key(20)).unwrap();
    tl.end();

    tl.start(tid(2), 1, c2.clone()).unwrap();
    tl.read_lock(key(1)).unwrap();
    tl.read_range_lock(key(15), key(16)).unwrap();
    tl.end();
    assert_eq!(c2.value(), 2);

    let mut exec = std::collections::HashSet::new();
    tl.unlock(&tid(1), true, &mut exec).unwrap();
    assert_eq!(exec, std::collections::HashSet::from([tid(2)]));
    assert_eq!(c2.value(), 0);
    assert_eq!(tl.size(), 1);

    // T1 is gone: re-starting it is legal again, and unlocking it a
    // second time is rejected as unknown.
    let mut exec2 = std::collections::HashSet::new();
    assert!(tl.unlock(&tid(1), true, &mut exec2).is_err());
    tl.start(tid(1), 5, Counter::new()).unwrap();
    tl.end();
}

/// Invariant 1 and invariant 9, driven by genuinely random operation
/// sequences rather than proptest's shrinking search — a handful of
/// transactions take a random mix of point and range locks against a small
/// key space, release in timestamp order, and every counter must land back
/// at zero with no tid ever emitted twice.
#[test]
fn random_mixed_workload_drains_to_zero() {
    let mut rng = rand::thread_rng();
    let mut tl = TransactionalLocker::new(LockerConfig::default());
    let n = 12u8;
    let counters: Vec<Counter> = (0..n).map(|_| Counter::new()).collect();

    for i in 0..n {
        tl.start(tid(i), i as i64, counters[i as usize].clone())
            .unwrap();
        let k = key(rng.gen_range(0..4));
        match rng.gen_range(0..4) {
            0 => tl.read_lock(k).unwrap(),
            1 => tl.write_lock(k).unwrap(),
            2 => {
                let a = rng.gen_range(0..4);
                let b = rng.gen_range(0..4);
                tl.read_range_lock(key(a.min(b)), key(a.max(b))).unwrap();
            }
            _ => {
                let a = rng.gen_range(0..4);
                let b = rng.gen_range(0..4);
                tl.write_range_lock(key(a.min(b)), key(a.max(b))).unwrap();
            }
        }
        tl.end();
    }
    for c in &counters {
        assert!(c.value() >= 0);
    }

    let mut seen = HashSet::new();
    for i in 0..n {
        let mut exec = HashSet::new();
        tl.unlock(&tid(i), true, &mut exec).unwrap();
        for t in &exec {
            assert!(seen.insert(t.clone()), "tid emitted twice across unlocks");
        }
        for c in &counters {
            assert!(c.value() >= 0);
        }
    }
    assert_eq!(tl.size(), 0);
}
