use std::collections::HashSet;
use std::sync::Once;

use txlock::{Counter, Key, LockerConfig, Tid, TransactionalLocker};

static INIT_LOGGING: Once = Once::new();

/// Installs a `tracing` subscriber once per test binary, so `cargo test --
/// --nocapture` (or `RUST_LOG=trace`) surfaces the lock/unlock trace events
/// these scenarios exercise.
fn init_logging() {
    INIT_LOGGING.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("off"));
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .init();
    });
}

fn tid(n: u8) -> Tid {
    Tid::from_bytes(vec![0, 0, 0, n]).unwrap()
}

fn key(n: u8) -> Key {
    Key::concrete(vec![n])
}

fn locked(
    locker: &mut TransactionalLocker,
    t: Tid,
    ts: i64,
    counter: Counter,
    f: impl FnOnce(&mut TransactionalLocker),
) {
    locker.start(t, ts, counter).unwrap();
    f(locker);
    locker.end();
}

#[test]
fn s1_fifo_readers_then_writer() {
    init_logging();
    let mut tl = TransactionalLocker::new(LockerConfig::default());
    let (c1, c2, c3) = (Counter::new(), Counter::new(), Counter::new());

    locked(&mut tl, tid(1), 10, c1.clone(), |l| {
        l.read_lock(key(1)).unwrap()
    });
    locked(&mut tl, tid(2), 20, c2.clone(), |l| {
        l.read_lock(key(1)).unwrap()
    });
    locked(&mut tl, tid(3), 30, c3.clone(), |l| {
        l.write_lock(key(1)).unwrap()
    });

    assert!(c1.is_free());
    assert!(c2.is_free());
    assert_eq!(c3.value(), 1);

    let mut exec = HashSet::new();
    tl.unlock(&tid(1), true, &mut exec).unwrap();
    assert!(exec.is_empty());

    let mut exec = HashSet::new();
    tl.unlock(&tid(2), true, &mut exec).unwrap();
    assert_eq!(exec, HashSet::from([tid(3)]));
}

#[test]
fn s2_upgrade_then_block_a_later_reader() {
    let mut tl = TransactionalLocker::new(LockerConfig::default());
    let (c1, c2) = (Counter::new(), Counter::new());

    locked(&mut tl, tid(1), 10, c1.clone(), |l| {
        l.read_lock(key(2)).unwrap()
    });
    locked(&mut tl, tid(1), 10, c1.clone(), |l| {
        l.write_lock(key(2)).unwrap()
    });
    assert!(c1.is_free());

    locked(&mut tl, tid(2), 20, c2.clone(), |l| {
        l.read_lock(key(2)).unwrap()
    });
    assert_eq!(c2.value(), 1);

    let mut exec = HashSet::new();
    tl.unlock(&tid(1), true, &mut exec).unwrap();
    assert_eq!(exec, HashSet::from([tid(2)]));
}

#[test]
fn s3_timestamp_reorder_demotes_the_updated_writer() {
    let mut tl = TransactionalLocker::new(LockerConfig::default());
    let (c1, c2) = (Counter::new(), Counter::new());

    locked(&mut tl, tid(1), 30, c1.clone(), |l| {
        l.write_lock(key(3)).unwrap()
    });
    assert!(c1.is_free());
    locked(&mut tl, tid(2), 20, c2.clone(), |l| {
        l.read_lock(key(3)).unwrap()
    });
    assert_eq!(c2.value(), 1);

    let mut exec = HashSet::new();
    tl.update(&tid(1), 40, &mut exec).unwrap();
    assert_eq!(exec, HashSet::from([tid(2)]));
    assert!(c2.is_free());
    assert_eq!(c1.value(), 1);
}

#[test]
fn s4_range_overlap() {
    let mut tl = TransactionalLocker::new(LockerConfig::default());
    let (c1, c2) = (Counter::new(), Counter::new());

    locked(&mut tl, tid(1), 0, c1.clone(), |l| {
        l.write_range_lock(key(10), key(20)).unwrap()
    });
    assert!(c1.is_free());

    locked(&mut tl, tid(2), 1, c2.clone(), |l| {
        l.read_range_lock(key(15), key(25)).unwrap()
    });
    assert_eq!(c2.value(), 1);

    let mut exec = HashSet::new();
    tl.unlock(&tid(1), true, &mut exec).unwrap();
    assert_eq!(exec, HashSet::from([tid(2)]));
}

#[test]
fn s5_write_all_blocks_a_later_range_lock() {
    let mut tl = TransactionalLocker::new(LockerConfig::default());
    let (c1, c2) = (Counter::new(), Counter::new());

    locked(&mut tl, tid(1), 0, c1.clone(), |l| {
        l.write_all_lock().unwrap()
    });
    assert!(c1.is_free());

    locked(&mut tl, tid(2), 1, c2.clone(), |l| {
        l.read_range_lock(key(200), key(200)).unwrap()
    });
    assert_eq!(c2.value(), 1);

    let mut exec = HashSet::new();
    tl.unlock(&tid(1), true, &mut exec).unwrap();
    assert_eq!(exec, HashSet::from([tid(2)]));
}

#[test]
fn s5_write_all_blocks_a_later_point_lock() {
    let mut tl = TransactionalLocker::new(LockerConfig::default());
    let (c1, c2) = (Counter::new(), Counter::new());

    locked(&mut tl, tid(1), 0, c1.clone(), |l| {
        l.write_all_lock().unwrap()
    });
    assert!(c1.is_free());

    locked(&mut tl, tid(2), 1, c2.clone(), |l| {
        l.read_lock(key(5)).unwrap()
    });
    assert_eq!(c2.value(), 1);

    let mut exec = HashSet::new();
    tl.unlock(&tid(1), true, &mut exec).unwrap();
    assert_eq!(exec, HashSet::from([tid(2)]));
}

#[test]
fn s6_many_overlapping_ranges_serialize_in_timestamp_order() {
    let mut tl = TransactionalLocker::new(LockerConfig::default());
    let n = 50u8;
    let counters: Vec<Counter> = (0..n).map(|_| Counter::new()).collect();

    for i in 0..n {
        let c = counters[i as usize].clone();
        locked(&mut tl, tid(i), i as i64, c, |l| {
            l.write_range_lock(key(0), key(255)).unwrap()
        });
    }

    for (i, c) in counters.iter().enumerate() {
        assert_eq!(
            c.value(),
            i as i64,
            "T{i} should owe one conflict per earlier writer"
        );
    }

    for i in 0..n {
        let mut exec = HashSet::new();
        tl.unlock(&tid(i), true, &mut exec).unwrap();
        if i + 1 < n {
            assert_eq!(exec, HashSet::from([tid(i + 1)]), "unlocking T{i}");
        } else {
            assert!(exec.is_empty());
        }
    }
    assert_eq!(tl.size(), 0);
}
