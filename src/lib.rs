//! Keyspan - ordered map views over a range-partitioned sorted store
//!
//! Keyspan presents a range-partitioned key-value store as a sorted map and
//! lets callers derive read-only views from it by stacking operators that
//! run next to the data: range restrictions, seeded hash-range samples,
//! filters, transforms and partition-local aggregates.
//!
//! # Quick Start
//!
//! ```
//! use keyspan::{SampleDescriptor, SortedMap, Value};
//!
//! let map = SortedMap::in_memory().unwrap();
//! map.put_all((0..1000i64).map(|k| (k, 2 * k))).unwrap();
//!
//! assert_eq!(map.size().unwrap(), 1000);
//! assert_eq!(map.get(21i64).unwrap(), Some(Value::Int(42)));
//!
//! // The same seed and fractions always select the same keys
//! let sample = SampleDescriptor::new("abc", 0.0, 0.4).unwrap();
//! let a = map.sample(&sample).unwrap().size().unwrap();
//! let b = map.sample(&sample).unwrap().size().unwrap();
//! assert_eq!(a, b);
//! ```
//!
//! # Architecture
//!
//! - [`keyspan_core`]: values, entries, key ranges, limits
//! - [`keyspan_codec`]: order-preserving value codecs
//! - [`keyspan_operators`]: pushdown operators and their registry
//! - [`keyspan_storage`]: the store boundary and an in-memory store
//! - [`keyspan_engine`]: maps, views, batches and aggregates

pub use keyspan_codec::{get_codec, CodecError, FixedPointCodec, LongCodec, OpaqueCodec, ValueCodec};
pub use keyspan_core::{Entry, KeyRange, Limits, Mutation, ScanMode, SummaryStatistics, Timestamp, Value};
pub use keyspan_engine::{
    aggregate, aggregate_with_fallback, AggregateOp, BatchWriter, Checksum, Count, DerivedMapper,
    Entries, Error, MapConfig, MapEntry, CONFIG_FILE_NAME, NumericSummary, OperatorMapper, Result, SortedMap,
    SortedMapBuilder, View, ViewKind,
};
pub use keyspan_operators::{OperatorConfig, OperatorRegistry, SampleDescriptor, ValueType};
pub use keyspan_storage::{MemoryStore, Store, StoreConfig};

