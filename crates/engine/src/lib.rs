//! Map views for Keyspan
//!
//! This crate is the client layer over a range-partitioned store:
//! - SortedMap: the base container, the only writable view
//! - View: immutable derived views built by stacking pushdown operators
//! - BatchWriter: the single owned write batch of a container
//! - Aggregates: pushdown count, checksum and numeric summary, folded on
//!   the client
//! - MapConfig: `keyspan.toml` configuration
//!
//! ## Usage
//!
//! ```
//! use keyspan_engine::SortedMap;
//!
//! let map = SortedMap::in_memory().unwrap();
//! map.put_all((0..10i64).map(|k| (k, 2 * k))).unwrap();
//!
//! let upper = map.tail_map(5i64).unwrap();
//! assert_eq!(upper.size().unwrap(), 5);
//! assert!(upper.put(1i64, 1i64).is_err());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod batch;
pub mod builder;
pub mod config;
pub mod error;
pub mod map;
pub mod mapper;
pub mod view;

pub use aggregate::{aggregate, aggregate_with_fallback, AggregateOp, Checksum, Count, NumericSummary};
pub use batch::BatchWriter;
pub use builder::SortedMapBuilder;
pub use config::{MapConfig, CONFIG_FILE_NAME};
pub use error::{Error, Result};
pub use map::{SortedMap, Transformer};
pub use mapper::{DerivedMapper, OperatorMapper};
pub use view::{summary_value, Entries, MapEntry, View, ViewKind, FIRST_OPERATOR_PRIORITY};
