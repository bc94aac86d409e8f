//! The base container
//!
//! [`SortedMap`] owns the shared state of one map (store handle, operator
//! registry, codecs, configuration and the batch slot) and dereferences to
//! its base [`View`]. Reads work the same on the base and on any derived
//! view; writes only work on the base and fail with [`Error::ReadOnly`]
//! everywhere else, before the store is contacted.

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use keyspan_codec::ValueCodec;
use keyspan_core::{ScanMode, Value};
use keyspan_operators::{ChecksumAccumulator, OperatorRegistry};
use keyspan_storage::{MemoryStore, Store};
use tracing::debug;

use crate::batch::BatchWriter;
use crate::builder::SortedMapBuilder;
use crate::config::MapConfig;
use crate::error::{Error, Result};
use crate::view::View;

/// A key/value transform applied by [`View::import_all`] before writing
pub type Transformer<'a> = &'a dyn Fn(Value, Value) -> (Value, Value);

/// State shared by a container and every view derived from it
pub(crate) struct MapCore {
    pub(crate) store: Arc<dyn Store>,
    pub(crate) registry: Arc<OperatorRegistry>,
    pub(crate) key_codec: Arc<dyn ValueCodec>,
    pub(crate) value_codec: Arc<dyn ValueCodec>,
    pub(crate) config: MapConfig,
    pub(crate) batch_open: AtomicBool,
}

/// A sorted map over a range-partitioned store
#[derive(Clone)]
pub struct SortedMap {
    base: View,
}

impl fmt::Debug for SortedMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SortedMap")
            .field("config", &self.base.core().config)
            .field("store", &self.base.core().store)
            .finish()
    }
}

impl SortedMap {
    /// Start configuring a map over `store`
    pub fn builder(store: Arc<dyn Store>) -> SortedMapBuilder {
        SortedMapBuilder::new(store)
    }

    /// A single-partition in-memory map with default settings
    pub fn in_memory() -> Result<Self> {
        SortedMapBuilder::new(Arc::new(MemoryStore::default())).build()
    }

    /// Open a map over `store` configured from `config`
    pub fn open(store: Arc<dyn Store>, config: MapConfig) -> Result<Self> {
        SortedMapBuilder::new(store).config(config).build()
    }

    pub(crate) fn from_core(core: MapCore) -> Self {
        Self {
            base: View::base(Arc::new(core)),
        }
    }

    /// The base view
    pub fn view(&self) -> &View {
        &self.base
    }

    /// Active configuration
    pub fn config(&self) -> &MapConfig {
        &self.base.core().config
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<dyn Store> {
        &self.base.core().store
    }

    /// Operator registry used to type-check stacks
    pub fn registry(&self) -> &Arc<OperatorRegistry> {
        &self.base.core().registry
    }

    /// True if more than one value per key is retained
    pub fn is_multi_valued(&self) -> bool {
        self.config().is_multi_valued()
    }
}

impl Deref for SortedMap {
    type Target = View;

    fn deref(&self) -> &View {
        &self.base
    }
}

// ============================================================================
// Writes
// ============================================================================

impl View {
    fn ensure_writable(&self, operation: &'static str) -> Result<()> {
        if self.is_read_only() {
            return Err(Error::ReadOnly { operation });
        }
        Ok(())
    }

    /// Open the container's write batch
    pub fn batch_writer(&self) -> Result<BatchWriter> {
        self.ensure_writable("open a write batch")?;
        BatchWriter::open(Arc::clone(self.core()))
    }

    /// Write `value` under `key`, returning the previous newest value
    pub fn put(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<Option<Value>> {
        self.ensure_writable("put")?;
        let key = key.into();
        let previous = self.get(key.clone())?;
        self.put_without_get(key, value)?;
        Ok(previous)
    }

    /// Write `value` under `key` without reading the previous value
    pub fn put_without_get(&self, key: impl Into<Value>, value: impl Into<Value>) -> Result<()> {
        self.ensure_writable("put")?;
        let mut batch = self.batch_writer()?;
        batch.put(key, value)?;
        batch.submit()
    }

    /// Delete every value of `key`, returning the previous newest value
    pub fn remove(&self, key: impl Into<Value>) -> Result<Option<Value>> {
        self.ensure_writable("remove")?;
        let key = key.into();
        let previous = self.get(key.clone())?;
        if previous.is_some() {
            let mut batch = self.batch_writer()?;
            batch.remove(key)?;
            batch.submit()?;
        }
        Ok(previous)
    }

    /// Write every pair in one batch
    pub fn put_all<I, K, V>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        self.import_all(entries, None).map(|_| ())
    }

    /// Bulk import in one batch, optionally transforming each pair first.
    ///
    /// Returns the packed key and value hash sums of the pairs as given, in
    /// the same layout as [`View::checksum`].
    pub fn import_all<I, K, V>(&self, entries: I, transformer: Option<Transformer<'_>>) -> Result<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<Value>,
        V: Into<Value>,
    {
        self.ensure_writable("import")?;
        let mut batch = self.batch_writer()?;
        let mut checksum = ChecksumAccumulator::new();
        for (key, value) in entries {
            let (key, value) = (key.into(), value.into());
            checksum.add(&key, &value);
            match transformer {
                Some(transform) => {
                    let (key, value) = transform(key, value);
                    batch.put(key, value)?;
                }
                None => batch.put(key, value)?,
            }
        }
        let count = batch.len();
        batch.submit()?;
        debug!(entries = count, "imported entries");
        Ok(checksum.packed())
    }

    /// Delete every key
    pub fn clear(&self) -> Result<()> {
        self.ensure_writable("clear")?;
        let mut batch = self.batch_writer()?;
        for entry in self.scan_raw(None, ScanMode::Latest)? {
            batch.delete_encoded(entry?.key);
        }
        batch.submit()
    }
}
