//! Core types for Keyspan
//!
//! This crate defines the foundational types used throughout the system:
//! - Value: Unified typed value, with a codec-independent hash code
//! - Entry: One (key, value, timestamp) triple returned by a scan
//! - KeyRange: Byte-key range with intersection
//! - Mutation: A put or tombstone inside a write batch
//! - ScanMode: Deduplicating versus all-versions scans
//! - Limits: Write size limits enforced by the store
//! - SummaryStatistics: Mergeable numeric summary

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod limits;
pub mod stats;
pub mod types;
pub mod value;

pub use limits::{LimitError, Limits};
pub use stats::SummaryStatistics;
pub use types::{Entry, KeyRange, Mutation, ScanMode, Timestamp};
pub use value::Value;
