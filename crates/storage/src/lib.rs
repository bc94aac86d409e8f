//! Store boundary for Keyspan
//!
//! This crate defines what the client layer needs from a range-partitioned
//! sorted key-value store, and ships one implementation of it:
//!
//! - `Store`: scan with installed operators, batched writes, retention
//! - `Scanner`: scan handle carrying a range, read options and an operator
//!   stack ordered by priority
//! - `MemoryStore`: in-memory store with `BTreeMap` partitions, per-key
//!   version chains and per-partition operator execution

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chain;
pub mod error;
pub mod memory;
pub mod store;

pub use chain::{Version, VersionChain};
pub use error::{Result, StoreError};
pub use memory::{MemoryStore, StoreConfig};
pub use store::{PartitionBounds, ReadOptions, ScanStream, Scanner, Store};
