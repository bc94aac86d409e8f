//! In-memory range-partitioned store
//!
//! The keyspace is cut into partitions at fixed split points. Each partition
//! owns a `BTreeMap` from key bytes to a [`VersionChain`] behind a
//! `parking_lot::RwLock`, plus the set of operator ids it can execute.
//! Timestamps come from one `AtomicU64` shared by all partitions.
//!
//! # Scan execution
//!
//! A scan visits partitions in key order. A partition is read only when the
//! stream is pulled past the previous one: its entries in range are copied
//! out under the read lock, then run through the scanner's operators in
//! ascending priority. A partition missing one of those operators fails the
//! scan with [`StoreError::MissingCapability`].

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashSet;
use tracing::{debug, info, warn};

use keyspan_core::{Entry, KeyRange, Limits, Mutation, ScanMode, Timestamp};
use keyspan_operators::OperatorRegistry;

use crate::chain::{Version, VersionChain};
use crate::error::{Result, StoreError};
use crate::store::{PartitionBounds, ScanStream, Scanner, Store};

/// Configuration of a [`MemoryStore`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Partition split points; partition `i` covers `[splits[i-1], splits[i])`
    pub splits: Vec<Vec<u8>>,
    /// Write size limits
    pub limits: Limits,
    /// Versions retained per key; `None` keeps all
    pub max_versions: Option<usize>,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            splits: Vec::new(),
            limits: Limits::default(),
            max_versions: Some(1),
        }
    }
}

impl StoreConfig {
    /// Set partition split points
    pub fn with_splits<I, K>(mut self, splits: I) -> Self
    where
        I: IntoIterator<Item = K>,
        K: Into<Vec<u8>>,
    {
        self.splits = splits.into_iter().map(Into::into).collect();
        self
    }

    /// Set write limits
    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    /// Set version retention
    pub fn with_max_versions(mut self, max_versions: Option<usize>) -> Self {
        self.max_versions = max_versions;
        self
    }
}

// ============================================================================
// Partition
// ============================================================================

#[derive(Debug)]
struct Partition {
    /// Inclusive lower bound; `None` is the start of the keyspace
    lo: Option<Vec<u8>>,
    /// Exclusive upper bound; `None` is the end of the keyspace
    hi: Option<Vec<u8>>,
    data: RwLock<BTreeMap<Vec<u8>, VersionChain>>,
    installed: RwLock<FxHashSet<String>>,
}

impl Partition {
    fn read(&self, range: &KeyRange, mode: ScanMode) -> Vec<Entry> {
        let data = self.data.read();
        let mut out = Vec::new();
        for (key, chain) in data.range((range.start().clone(), range.end().clone())) {
            match mode {
                ScanMode::Latest => {
                    if let Some(v) = chain.latest() {
                        out.push(Entry::new(key.clone(), v.value.clone(), v.timestamp));
                    }
                }
                ScanMode::AllVersions => {
                    out.extend(
                        chain
                            .iter()
                            .map(|v| Entry::new(key.clone(), v.value.clone(), v.timestamp)),
                    );
                }
            }
        }
        out
    }
}

#[derive(Debug)]
struct Inner {
    partitions: Vec<Partition>,
    registry: Arc<OperatorRegistry>,
    limits: Limits,
    max_versions: RwLock<Option<usize>>,
    clock: AtomicU64,
}

impl Inner {
    fn partition_for(&self, key: &[u8]) -> usize {
        self.partitions
            .iter()
            .position(|p| p.hi.as_deref().map_or(true, |hi| key < hi))
            .unwrap_or(self.partitions.len() - 1)
    }

    fn next_timestamp(&self) -> Timestamp {
        self.clock.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn scan_partition(&self, index: usize, scanner: &Scanner) -> Result<Vec<Entry>> {
        let partition = &self.partitions[index];
        {
            let installed = partition.installed.read();
            if let Some(missing) = scanner
                .operators()
                .iter()
                .find(|s| !installed.contains(&s.id))
            {
                warn!(operator = %missing.id, partition = index, "operator not installed");
                return Err(StoreError::MissingCapability {
                    operator: missing.id.clone(),
                    partition: index,
                });
            }
        }

        let mut entries = partition.read(scanner.range(), scanner.options().mode);
        for setting in scanner.operators() {
            let mut op = self.registry.build(setting)?;
            entries = op.process(entries)?;
        }
        Ok(entries)
    }
}

// ============================================================================
// MemoryStore
// ============================================================================

/// Reference in-memory implementation of [`Store`]
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Inner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

impl MemoryStore {
    /// Create a store running the built-in operators
    pub fn new(config: StoreConfig) -> Self {
        Self::with_registry(config, Arc::new(OperatorRegistry::with_builtins()))
    }

    /// Create a store running the operators of `registry`.
    ///
    /// Every partition starts with all registered operators installed.
    pub fn with_registry(config: StoreConfig, registry: Arc<OperatorRegistry>) -> Self {
        let mut splits = config.splits;
        splits.sort();
        splits.dedup();

        let ids: FxHashSet<String> = registry.ids().into_iter().collect();
        let mut bounds: Vec<Option<Vec<u8>>> = Vec::with_capacity(splits.len() + 2);
        bounds.push(None);
        bounds.extend(splits.into_iter().map(Some));
        bounds.push(None);
        let partitions = bounds
            .windows(2)
            .map(|w| Partition {
                lo: w[0].clone(),
                hi: w[1].clone(),
                data: RwLock::new(BTreeMap::new()),
                installed: RwLock::new(ids.clone()),
            })
            .collect();

        Self {
            inner: Arc::new(Inner {
                partitions,
                registry,
                limits: config.limits,
                max_versions: RwLock::new(config.max_versions),
                clock: AtomicU64::new(0),
            }),
        }
    }

    /// Operator registry the store executes with
    pub fn registry(&self) -> &Arc<OperatorRegistry> {
        &self.inner.registry
    }

    /// Remove an operator from one partition
    pub fn uninstall_operator(&self, partition: usize, id: &str) {
        if let Some(p) = self.inner.partitions.get(partition) {
            p.installed.write().remove(id);
        }
    }

    /// Make a registered operator available on one partition again
    pub fn reinstall_operator(&self, partition: usize, id: &str) {
        if let Some(p) = self.inner.partitions.get(partition) {
            p.installed.write().insert(id.to_string());
        }
    }

    /// Number of keys stored in one partition
    pub fn partition_len(&self, partition: usize) -> usize {
        self.inner
            .partitions
            .get(partition)
            .map_or(0, |p| p.data.read().len())
    }

    /// Timestamp of the latest write
    pub fn current_timestamp(&self) -> Timestamp {
        self.inner.clock.load(Ordering::SeqCst)
    }
}

impl Store for MemoryStore {
    fn scan(&self, scanner: &Scanner) -> Result<ScanStream> {
        debug!(
            range = ?scanner.range(),
            mode = ?scanner.options().mode,
            operators = scanner.operators().len(),
            "opening scan"
        );
        let pending: VecDeque<usize> = if scanner.range().is_empty() {
            VecDeque::new()
        } else {
            self.inner
                .partitions
                .iter()
                .enumerate()
                .filter(|(_, p)| scanner.range().overlaps_span(p.lo.as_deref(), p.hi.as_deref()))
                .map(|(i, _)| i)
                .collect()
        };
        Ok(Box::new(PartitionStream {
            inner: Arc::clone(&self.inner),
            scanner: scanner.clone(),
            pending,
            buffer: VecDeque::new(),
            failed: false,
        }))
    }

    fn write_batch(&self, mutations: Vec<Mutation>) -> Result<()> {
        if let Err(e) = self.inner.limits.validate_batch(&mutations) {
            warn!(error = %e, mutations = mutations.len(), "rejecting write batch");
            return Err(e.into());
        }
        let max_versions = *self.inner.max_versions.read();
        let count = mutations.len();
        for mutation in mutations {
            let partition = &self.inner.partitions[self.inner.partition_for(mutation.key())];
            let mut data = partition.data.write();
            match mutation {
                Mutation::Put { key, value } => {
                    let version = Version {
                        value,
                        timestamp: self.inner.next_timestamp(),
                    };
                    match data.get_mut(&key) {
                        Some(chain) => chain.push(version, max_versions),
                        None => {
                            data.insert(key, VersionChain::new(version));
                        }
                    }
                }
                Mutation::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        debug!(mutations = count, "applied write batch");
        Ok(())
    }

    fn set_max_versions(&self, max_versions: Option<usize>) -> Result<()> {
        *self.inner.max_versions.write() = max_versions;
        for partition in &self.inner.partitions {
            for chain in partition.data.write().values_mut() {
                chain.retain(max_versions);
            }
        }
        info!(?max_versions, "set version retention");
        Ok(())
    }

    fn partition_bounds(&self) -> Vec<PartitionBounds> {
        self.inner
            .partitions
            .iter()
            .map(|p| (p.lo.clone(), p.hi.clone()))
            .collect()
    }

    fn partition_count(&self) -> usize {
        self.inner.partitions.len()
    }
}

// ============================================================================
// Lazy scan stream
// ============================================================================

struct PartitionStream {
    inner: Arc<Inner>,
    scanner: Scanner,
    pending: VecDeque<usize>,
    buffer: VecDeque<Entry>,
    failed: bool,
}

impl Iterator for PartitionStream {
    type Item = Result<Entry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        loop {
            if let Some(entry) = self.buffer.pop_front() {
                return Some(Ok(entry));
            }
            let index = self.pending.pop_front()?;
            match self.inner.scan_partition(index, &self.scanner) {
                Ok(entries) => self.buffer = entries.into(),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}
