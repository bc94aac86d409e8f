//! The store boundary
//!
//! Everything the client layer needs from a range-partitioned sorted store:
//!
//! - `scan(scanner)`: entries in ascending key order within a range, after
//!   the scanner's installed operators ran on each partition
//! - `install_operator`: registers a named operator at a priority on a scan
//!   handle before it is opened
//! - `write_batch(mutations)`: applies a batch of puts and tombstones, or
//!   rejects the whole batch
//! - `partition_bounds()`: the split layout, so a client can reproduce
//!   per-partition work locally

use std::fmt;

use keyspan_core::{Entry, KeyRange, Mutation, ScanMode};
use keyspan_operators::{OperatorConfig, OperatorSetting};

use crate::error::{Result, StoreError};

/// Pull-based stream of scan results.
///
/// Errors are yielded in place; a stream that returned an error should be
/// dropped.
pub type ScanStream = Box<dyn Iterator<Item = Result<Entry>> + Send>;

/// Inclusive lower and exclusive upper key of a partition
pub type PartitionBounds = (Option<Vec<u8>>, Option<Vec<u8>>);

/// Per-scan read options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadOptions {
    /// Newest version only, or every retained version
    pub mode: ScanMode,
}

impl ReadOptions {
    /// Options for a scan in `mode`
    pub fn new(mode: ScanMode) -> Self {
        Self { mode }
    }
}

// ============================================================================
// Scanner
// ============================================================================

/// A scan handle: range, read options and the installed operator stack
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scanner {
    range: KeyRange,
    options: ReadOptions,
    /// Sorted by ascending priority
    operators: Vec<OperatorSetting>,
}

impl Scanner {
    /// Create a handle with no operators installed
    pub fn new(range: KeyRange, options: ReadOptions) -> Self {
        Self {
            range,
            options,
            operators: Vec::new(),
        }
    }

    /// Range to scan
    pub fn range(&self) -> &KeyRange {
        &self.range
    }

    /// Replace the scanned range
    pub fn set_range(&mut self, range: KeyRange) {
        self.range = range;
    }

    /// Read options
    pub fn options(&self) -> ReadOptions {
        self.options
    }

    /// Installed operators in execution order
    pub fn operators(&self) -> &[OperatorSetting] {
        &self.operators
    }

    /// Install an operator at `priority`.
    ///
    /// Fails if another operator already holds that priority.
    pub fn install_operator(
        &mut self,
        id: impl Into<String>,
        priority: u32,
        config: OperatorConfig,
    ) -> Result<()> {
        self.install(OperatorSetting::new(id, priority, config))
    }

    /// Install a prepared operator setting
    pub fn install(&mut self, setting: OperatorSetting) -> Result<()> {
        match self
            .operators
            .binary_search_by_key(&setting.priority, |s| s.priority)
        {
            Ok(pos) => Err(StoreError::DuplicatePriority {
                priority: setting.priority,
                existing: self.operators[pos].id.clone(),
                operator: setting.id,
            }),
            Err(pos) => {
                self.operators.insert(pos, setting);
                Ok(())
            }
        }
    }
}

// ============================================================================
// Store
// ============================================================================

/// A range-partitioned sorted key-value store.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; views built over a store are read
/// from many threads at once.
pub trait Store: Send + Sync + fmt::Debug {
    /// Open a scan. Entries come back in ascending key order, partition by
    /// partition, with the scanner's operators applied per partition.
    fn scan(&self, scanner: &Scanner) -> Result<ScanStream>;

    /// Apply a batch of mutations atomically, or reject all of it
    fn write_batch(&self, mutations: Vec<Mutation>) -> Result<()>;

    /// Set how many versions per key are retained; `None` keeps all
    fn set_max_versions(&self, max_versions: Option<usize>) -> Result<()>;

    /// `[lo, hi)` bounds of every partition in key order; `None` is open
    fn partition_bounds(&self) -> Vec<PartitionBounds>;

    /// Number of partitions
    fn partition_count(&self) -> usize {
        self.partition_bounds().len()
    }
}
