//! The key domain: concrete byte-array keys plus four sentinels.
//!
//! A totally ordered key domain with two designated "infinity" endpoints
//! (`FIRST`, `LAST`), a `NULL` sentinel that is strictly least, and an
//! `ANY` sentinel that compares equal to every non-null key. `ANY` and
//! `NULL` are never stored — they only appear in predicates and as
//! API-boundary rejections.
//!
//! The compare table is implemented once here as a tagged enum rather
//! than a subclass hierarchy.

use crate::error::KeyError;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// A key in the lock manager's domain: either a concrete byte sequence or
/// one of the four sentinels.
///
/// `ANY`'s equality with every non-null key makes the [`Ord`] impl below a
/// deliberate quasi-order, not a strict total order (`ANY == FIRST` and
/// `ANY == LAST` but `FIRST != LAST`). Callers that need a real total order
/// — the per-key lock table, the range tree — only ever compare keys that
/// have already been validated as [`Key::Bytes`], [`Key::First`], or
/// [`Key::Last`] (see [`validate_point_key`] and [`validate_range_endpoint`]).
#[derive(Debug, Clone, Eq)]
pub enum Key {
    /// Strictly least; never stored.
    Null,
    /// Compares equal to every non-null key; never stored.
    Any,
    /// The least concrete-comparable bound, `-infinity`.
    First,
    /// The greatest concrete-comparable bound, `+infinity`.
    Last,
    /// A concrete key, ordered by unsigned lexicographic byte comparison.
    Bytes(Vec<u8>),
}

impl Key {
    /// Construct a concrete key from raw bytes.
    pub fn concrete(bytes: impl Into<Vec<u8>>) -> Self {
        Key::Bytes(bytes.into())
    }

    /// `true` for `NULL` or `ANY` — the two sentinels no API ever stores.
    pub fn is_meta_only(&self) -> bool {
        matches!(self, Key::Null | Key::Any)
    }

    /// `true` for any of the four sentinels.
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, Key::Bytes(_))
    }

    fn rank(&self) -> u8 {
        match self {
            Key::Null => 0,
            Key::First => 1,
            Key::Bytes(_) => 2,
            Key::Last => 3,
            Key::Any => 4,
        }
    }
}

impl PartialEq for Key {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl PartialOrd for Key {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Key {
    fn cmp(&self, other: &Self) -> Ordering {
        use Key::*;
        match (self, other) {
            // ANY compares equal to every non-null key, including itself.
            (Any, Null) => Ordering::Greater,
            (Any, _) => Ordering::Equal,
            (Null, Any) => Ordering::Less,
            (_, Any) => Ordering::Equal,

            (Null, Null) => Ordering::Equal,
            (Null, _) => Ordering::Less,
            (_, Null) => Ordering::Greater,

            (Bytes(a), Bytes(b)) => a.cmp(b),
            (a, b) => a.rank().cmp(&b.rank()),
        }
    }
}

/// Consistent with equality for `NULL`, `FIRST`, `LAST`, and `BYTES`; not
/// meaningful for `ANY`, which compares equal to keys that do not hash
/// equal. `ANY` is never stored as a map key, only used in predicates.
impl Hash for Key {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Key::Bytes(b) => b.hash(state),
            other => other.rank().hash(state),
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Null => write!(f, "NULL"),
            Key::Any => write!(f, "ANY"),
            Key::First => write!(f, "FIRST"),
            Key::Last => write!(f, "LAST"),
            Key::Bytes(b) => {
                for byte in b {
                    write!(f, "{:02X}", byte)?;
                }
                Ok(())
            }
        }
    }
}

/// `[a, b]` and `[c, d]` overlap iff `a <= d && b >= c` (closed intervals
/// on both sides).
pub fn overlaps(a_start: &Key, a_end: &Key, b_start: &Key, b_end: &Key) -> bool {
    a_start <= b_end && a_end >= b_start
}

/// Reject `NULL`/`ANY`/`FIRST`/`LAST` for point-lock APIs (`readLock`,
/// `writeLock`): only concrete keys may be locked individually.
pub fn validate_point_key(key: &Key) -> Result<(), KeyError> {
    match key {
        Key::Bytes(_) => Ok(()),
        _ => Err(KeyError::SentinelNotAllowedAsPointKey(key.clone())),
    }
}

/// Reject `NULL`/`ANY` as range endpoints; `FIRST`/`LAST` are permitted.
/// Also rejects a range whose start does not precede its end.
pub fn validate_range_endpoints(start: &Key, end: &Key) -> Result<(), KeyError> {
    for k in [start, end] {
        if k.is_meta_only() {
            return Err(KeyError::SentinelNotAllowedAsRangeEndpoint(k.clone()));
        }
    }
    if start > end {
        return Err(KeyError::InvertedRange {
            start: start.clone(),
            end: end.clone(),
        });
    }
    Ok(())
}
