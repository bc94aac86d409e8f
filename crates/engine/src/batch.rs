//! Batched writes
//!
//! A [`BatchWriter`] is the only path to the store's `write_batch`. At most
//! one is open per container; opening a second fails with
//! [`Error::BatchInProgress`] until the first is submitted, discarded or
//! dropped.
//!
//! A rejected batch is consumed by [`BatchWriter::submit`]. Nothing is
//! retried: the caller opens a fresh batch and decides what to resend.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use keyspan_core::{Mutation, Value};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::map::MapCore;

/// An open write batch on a base container
pub struct BatchWriter {
    core: Arc<MapCore>,
    mutations: Vec<Mutation>,
}

impl std::fmt::Debug for BatchWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchWriter")
            .field("mutations", &self.mutations.len())
            .finish()
    }
}

impl BatchWriter {
    pub(crate) fn open(core: Arc<MapCore>) -> Result<Self> {
        if core
            .batch_open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::BatchInProgress);
        }
        Ok(Self {
            core,
            mutations: Vec::new(),
        })
    }

    /// Queue a put
    pub fn put(&mut self, key: impl Into<Value>, value: impl Into<Value>) -> Result<()> {
        let key = self.core.key_codec.encode(&key.into())?;
        let value = self.core.value_codec.encode(&value.into())?;
        self.mutations.push(Mutation::Put { key, value });
        Ok(())
    }

    /// Queue a tombstone
    pub fn remove(&mut self, key: impl Into<Value>) -> Result<()> {
        let key = self.core.key_codec.encode(&key.into())?;
        self.mutations.push(Mutation::Delete { key });
        Ok(())
    }

    pub(crate) fn delete_encoded(&mut self, key: Vec<u8>) {
        self.mutations.push(Mutation::Delete { key });
    }

    /// Number of queued mutations
    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    /// True if nothing is queued
    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Send every queued mutation as one batch.
    ///
    /// # Errors
    ///
    /// [`Error::WriteRejected`] if the store refused the batch. Nothing was
    /// applied and the batch is gone.
    pub fn submit(mut self) -> Result<()> {
        let mutations = std::mem::take(&mut self.mutations);
        if mutations.is_empty() {
            return Ok(());
        }
        let count = mutations.len();
        match self.core.store.write_batch(mutations) {
            Ok(()) => {
                debug!(mutations = count, "submitted write batch");
                Ok(())
            }
            Err(e) => {
                let err = Error::from(e);
                warn!(error = %err, mutations = count, "write batch rejected");
                Err(err)
            }
        }
    }

    /// Drop every queued mutation and release the batch
    pub fn discard(self) {}
}

impl Drop for BatchWriter {
    fn drop(&mut self) {
        self.core.batch_open.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use crate::error::Error;
    use crate::map::SortedMap;
    use keyspan_core::{Limits, Value};
    use keyspan_storage::{MemoryStore, StoreConfig};
    use std::sync::Arc;

    #[test]
    fn test_one_batch_per_container() {
        let map = SortedMap::in_memory().unwrap();
        let first = map.batch_writer().unwrap();
        assert!(matches!(map.batch_writer(), Err(Error::BatchInProgress)));
        drop(first);
        assert!(map.batch_writer().is_ok());
    }

    #[test]
    fn test_submit_applies_all() {
        let map = SortedMap::in_memory().unwrap();
        let mut batch = map.batch_writer().unwrap();
        batch.put("a", 1i64).unwrap();
        batch.put("b", 2i64).unwrap();
        batch.remove("a").unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(map.size().unwrap(), 0);
        batch.submit().unwrap();
        assert_eq!(map.get("a").unwrap(), None);
        assert_eq!(map.get("b").unwrap(), Some(Value::Int(2)));
    }

    #[test]
    fn test_discard_writes_nothing() {
        let map = SortedMap::in_memory().unwrap();
        let mut batch = map.batch_writer().unwrap();
        batch.put("a", 1i64).unwrap();
        batch.discard();
        assert!(map.is_empty().unwrap());
    }

    #[test]
    fn test_empty_submit_is_ok() {
        let map = SortedMap::in_memory().unwrap();
        let batch = map.batch_writer().unwrap();
        assert!(batch.is_empty());
        batch.submit().unwrap();
    }

    #[test]
    fn test_rejection_consumes_batch() {
        let limits = Limits {
            max_key_bytes: 8,
            ..Limits::default()
        };
        let store = Arc::new(MemoryStore::new(StoreConfig::default().with_limits(limits)));
        let map = SortedMap::builder(store).build().unwrap();
        let mut batch = map.batch_writer().unwrap();
        batch.put("a key that is too long", 1i64).unwrap();
        let err = batch.submit().unwrap_err();
        assert!(matches!(err, Error::WriteRejected { .. }));
        let mut retry = map.batch_writer().unwrap();
        retry.put("ok", 1i64).unwrap();
        retry.submit().unwrap();
        assert_eq!(map.size().unwrap(), 1);
    }
}
