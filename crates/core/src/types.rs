//! Entry, range and mutation types shared by the client and the store
//!
//! All keys at this layer are raw byte strings. The store orders them
//! byte-lexicographically; typed ordering is the codec's responsibility.

use std::cmp::Ordering;
use std::ops::Bound;

/// Monotonic write-order marker assigned by the store.
///
/// Timestamps order writes; they are not wall-clock guarantees.
pub type Timestamp = u64;

/// One stored (key, value, timestamp) triple as returned by a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// Encoded key bytes
    pub key: Vec<u8>,
    /// Encoded value bytes
    pub value: Vec<u8>,
    /// Store-assigned write-order marker
    pub timestamp: Timestamp,
}

impl Entry {
    /// Create a new entry
    pub fn new(key: Vec<u8>, value: Vec<u8>, timestamp: Timestamp) -> Self {
        Self {
            key,
            value,
            timestamp,
        }
    }
}

/// A single write in a batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Write a new version of `key`
    Put {
        /// Encoded key
        key: Vec<u8>,
        /// Encoded value
        value: Vec<u8>,
    },
    /// Tombstone: removes every retained version of `key`
    Delete {
        /// Encoded key
        key: Vec<u8>,
    },
}

impl Mutation {
    /// Key the mutation applies to
    pub fn key(&self) -> &[u8] {
        match self {
            Mutation::Put { key, .. } | Mutation::Delete { key } => key,
        }
    }

    /// Approximate payload size in bytes
    pub fn size(&self) -> usize {
        match self {
            Mutation::Put { key, value } => key.len() + value.len(),
            Mutation::Delete { key } => key.len(),
        }
    }
}

/// How many versions per key a scan returns
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanMode {
    /// At most one (the newest) version per key
    #[default]
    Latest,
    /// Every retained version, newest first within a key
    AllVersions,
}

// ============================================================================
// KeyRange
// ============================================================================

/// A contiguous range of byte keys
///
/// Either end may be unbounded, inclusive or exclusive. Ranges are compared
/// and intersected on raw bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyRange {
    start: Bound<Vec<u8>>,
    end: Bound<Vec<u8>>,
}

impl Default for KeyRange {
    fn default() -> Self {
        Self::full()
    }
}

impl KeyRange {
    /// The whole keyspace
    pub fn full() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
        }
    }

    /// Build a range from explicit bounds
    pub fn new(start: Bound<Vec<u8>>, end: Bound<Vec<u8>>) -> Self {
        Self { start, end }
    }

    /// `[start, end)`, the usual sub-map convention
    pub fn half_open(start: Option<Vec<u8>>, end: Option<Vec<u8>>) -> Self {
        Self {
            start: start.map_or(Bound::Unbounded, Bound::Included),
            end: end.map_or(Bound::Unbounded, Bound::Excluded),
        }
    }

    /// The single-key range `[key, key]`
    pub fn exact(key: &[u8]) -> Self {
        Self {
            start: Bound::Included(key.to_vec()),
            end: Bound::Included(key.to_vec()),
        }
    }

    /// Lower bound
    pub fn start(&self) -> &Bound<Vec<u8>> {
        &self.start
    }

    /// Upper bound
    pub fn end(&self) -> &Bound<Vec<u8>> {
        &self.end
    }

    /// True when no key can satisfy both bounds
    pub fn is_empty(&self) -> bool {
        match (&self.start, &self.end) {
            (Bound::Included(s), Bound::Included(e)) => s > e,
            (Bound::Included(s), Bound::Excluded(e))
            | (Bound::Excluded(s), Bound::Included(e))
            | (Bound::Excluded(s), Bound::Excluded(e)) => s >= e,
            _ => false,
        }
    }

    /// Check whether `key` lies inside the range
    pub fn contains(&self, key: &[u8]) -> bool {
        let above = match &self.start {
            Bound::Unbounded => true,
            Bound::Included(s) => key >= s.as_slice(),
            Bound::Excluded(s) => key > s.as_slice(),
        };
        let below = match &self.end {
            Bound::Unbounded => true,
            Bound::Included(e) => key <= e.as_slice(),
            Bound::Excluded(e) => key < e.as_slice(),
        };
        above && below
    }

    /// Intersect two ranges; `None` when they are disjoint
    pub fn intersect(&self, other: &KeyRange) -> Option<KeyRange> {
        let start = tighter_start(&self.start, &other.start);
        let end = tighter_end(&self.end, &other.end);
        let clipped = KeyRange { start, end };
        if clipped.is_empty() {
            None
        } else {
            Some(clipped)
        }
    }

    /// True when the range overlaps the half-open partition span `[lo, hi)`,
    /// where `None` means unbounded
    pub fn overlaps_span(&self, lo: Option<&[u8]>, hi: Option<&[u8]>) -> bool {
        let span = KeyRange {
            start: lo.map_or(Bound::Unbounded, |k| Bound::Included(k.to_vec())),
            end: hi.map_or(Bound::Unbounded, |k| Bound::Excluded(k.to_vec())),
        };
        self.intersect(&span).is_some()
    }
}

fn tighter_start(a: &Bound<Vec<u8>>, b: &Bound<Vec<u8>>) -> Bound<Vec<u8>> {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other.clone(),
        (Bound::Included(x), Bound::Included(y)) => Bound::Included(x.max(y).clone()),
        (Bound::Excluded(x), Bound::Excluded(y)) => Bound::Excluded(x.max(y).clone()),
        (Bound::Included(i), Bound::Excluded(e)) | (Bound::Excluded(e), Bound::Included(i)) => {
            match i.cmp(e) {
                Ordering::Greater => Bound::Included(i.clone()),
                _ => Bound::Excluded(e.clone()),
            }
        }
    }
}

fn tighter_end(a: &Bound<Vec<u8>>, b: &Bound<Vec<u8>>) -> Bound<Vec<u8>> {
    match (a, b) {
        (Bound::Unbounded, other) | (other, Bound::Unbounded) => other.clone(),
        (Bound::Included(x), Bound::Included(y)) => Bound::Included(x.min(y).clone()),
        (Bound::Excluded(x), Bound::Excluded(y)) => Bound::Excluded(x.min(y).clone()),
        (Bound::Included(i), Bound::Excluded(e)) | (Bound::Excluded(e), Bound::Included(i)) => {
            match i.cmp(e) {
                Ordering::Less => Bound::Included(i.clone()),
                _ => Bound::Excluded(e.clone()),
            }
        }
    }
}
