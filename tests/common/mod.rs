//! Shared test utilities for the integration suites.
//!
//! Import via `mod common;` from any test file.

#![allow(dead_code)]

use std::sync::Arc;

use keyspan::{FixedPointCodec, MemoryStore, SortedMap, StoreConfig, Value, ValueCodec};

/// Route log output to the test harness; safe to call from every test
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Encoded key for a split point
pub fn encoded(k: i64) -> Vec<u8> {
    FixedPointCodec.encode(&Value::Int(k)).unwrap()
}

/// A store with partitions split at the given integer keys
pub fn split_store(splits: &[i64]) -> Arc<MemoryStore> {
    let splits: Vec<Vec<u8>> = splits.iter().map(|&k| encoded(k)).collect();
    Arc::new(MemoryStore::new(StoreConfig::default().with_splits(splits)))
}

/// A map over `store` holding keys `0..n` with values `2 * key`
pub fn doubled_map(store: Arc<MemoryStore>, n: i64) -> SortedMap {
    let map = SortedMap::builder(store).build().unwrap();
    map.put_all((0..n).map(|k| (k, 2 * k))).unwrap();
    map
}

/// The standard fixture: keys `0..1000` over four partitions
pub fn thousand() -> (Arc<MemoryStore>, SortedMap) {
    let store = split_store(&[250, 500, 750]);
    let map = doubled_map(store.clone(), 1000);
    (store, map)
}

/// Collect decoded keys
pub fn keys(view: &keyspan::View) -> Vec<Value> {
    view.keys().unwrap().map(|k| k.unwrap()).collect()
}
