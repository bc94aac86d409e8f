//! Fluent construction of a [`SortedMap`]
//!
//! ```
//! use std::sync::Arc;
//! use keyspan_engine::SortedMap;
//! use keyspan_storage::{MemoryStore, StoreConfig};
//!
//! let store = Arc::new(MemoryStore::new(StoreConfig::default().with_splits(["m"])));
//! let map = SortedMap::builder(store)
//!     .value_codec("long")
//!     .max_values_per_key(3)
//!     .build()
//!     .unwrap();
//! assert!(map.is_multi_valued());
//! ```

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use keyspan_codec::get_codec;
use keyspan_operators::OperatorRegistry;
use keyspan_storage::Store;
use tracing::info;

use crate::config::MapConfig;
use crate::error::{Error, Result};
use crate::map::{MapCore, SortedMap};

// ============================================================================
// SortedMap Builder
// ============================================================================

/// Builder for a [`SortedMap`]
///
/// Starts from [`MapConfig::default`]: order-preserving codecs for keys and
/// values and one value per key. Use [`SortedMapBuilder::config`] to start
/// from a loaded `keyspan.toml` instead.
#[derive(Debug, Clone)]
pub struct SortedMapBuilder {
    store: Arc<dyn Store>,
    registry: Option<Arc<OperatorRegistry>>,
    config: MapConfig,
}

impl SortedMapBuilder {
    /// Create a builder over `store`
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            registry: None,
            config: MapConfig::default(),
        }
    }

    /// Replace every setting with `config`
    pub fn config(mut self, config: MapConfig) -> Self {
        self.config = config;
        self
    }

    /// Operator registry used to type-check stacks.
    ///
    /// Defaults to the built-in operators. It should describe the same
    /// operators the store runs.
    pub fn registry(mut self, registry: Arc<OperatorRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Codec id for keys
    pub fn key_codec(mut self, codec_id: impl Into<String>) -> Self {
        self.config.key_codec = codec_id.into();
        self
    }

    /// Codec id for values
    pub fn value_codec(mut self, codec_id: impl Into<String>) -> Self {
        self.config.value_codec = codec_id.into();
        self
    }

    /// Retain up to `n` values per key; `0` retains every value
    pub fn max_values_per_key(mut self, n: usize) -> Self {
        self.config.max_values_per_key = Some(n);
        self
    }

    /// Retain only the newest value per key
    pub fn single_valued(mut self) -> Self {
        self.config.max_values_per_key = None;
        self
    }

    /// Default poll interval for `wait_for`
    pub fn wait_increment_ms(mut self, ms: u64) -> Self {
        self.config.wait_increment_ms = ms;
        self
    }

    /// Validate the settings, apply retention to the store and build.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] for unknown codec ids, or the
    /// store's error if retention cannot be applied.
    pub fn build(self) -> Result<SortedMap> {
        self.config.validate()?;
        let key_codec =
            get_codec(&self.config.key_codec).map_err(|e| Error::Configuration(e.to_string()))?;
        let value_codec =
            get_codec(&self.config.value_codec).map_err(|e| Error::Configuration(e.to_string()))?;
        let retention = self.config.retention();
        self.store.set_max_versions(retention)?;
        info!(
            key_codec = %self.config.key_codec,
            value_codec = %self.config.value_codec,
            max_versions = ?retention,
            "opened sorted map"
        );

        Ok(SortedMap::from_core(MapCore {
            store: self.store,
            registry: self
                .registry
                .unwrap_or_else(|| Arc::new(OperatorRegistry::with_builtins())),
            key_codec,
            value_codec,
            config: self.config,
            batch_open: AtomicBool::new(false),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyspan_core::Value;
    use keyspan_storage::MemoryStore;

    fn store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::default())
    }

    #[test]
    fn test_builder_defaults() {
        let map = SortedMapBuilder::new(store()).build().unwrap();
        assert_eq!(map.config(), &MapConfig::default());
        assert!(!map.is_multi_valued());
    }

    #[test]
    fn test_builder_chaining() {
        let map = SortedMapBuilder::new(store())
            .key_codec("long")
            .value_codec("opaque")
            .max_values_per_key(0)
            .wait_increment_ms(10)
            .build()
            .unwrap();
        assert_eq!(map.config().key_codec, "long");
        assert_eq!(map.config().value_codec, "opaque");
        assert!(map.is_multi_valued());
        assert_eq!(map.config().retention(), None);
    }

    #[test]
    fn test_single_valued_resets_retention() {
        let map = SortedMapBuilder::new(store())
            .max_values_per_key(4)
            .single_valued()
            .build()
            .unwrap();
        assert!(!map.is_multi_valued());
    }

    #[test]
    fn test_unknown_codec_rejected() {
        let err = SortedMapBuilder::new(store())
            .value_codec("json")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_retention_applied_to_store() {
        let store = store();
        let map = SortedMapBuilder::new(store.clone())
            .max_values_per_key(2)
            .build()
            .unwrap();
        for v in 0..5i64 {
            map.put_without_get("k", v).unwrap();
        }
        assert_eq!(map.get_all("k").unwrap(), vec![Value::Int(4), Value::Int(3)]);
    }
}
