//! Pushdown operators for Keyspan
//!
//! Operators are the units of computation a store runs next to the data
//! during a scan. This crate holds:
//!
//! - The operator model: descriptors, settings and option keys
//! - Deterministic hash-range sampling
//! - A regex filter and value transforms
//! - Partition aggregators (count, checksum, numeric summary) and the
//!   encodings of their partial results
//! - A registry resolving operator ids to factories

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod aggregate;
pub mod error;
pub mod filters;
pub mod operator;
pub mod registry;
pub mod sampling;
pub mod transforms;

pub use aggregate::{
    checksum_keys, checksum_values, decode_count, decode_summary, encode_count, encode_summary,
    ChecksumAccumulator, ChecksumAggregator, CountAggregator, StatsAggregator, CHECKSUM_ID,
    COUNT_ID, STATS_ID,
};
pub use error::{OperatorError, Result};
pub use filters::{RegexFilter, OPT_KEY_REGEX, OPT_VALUE_REGEX, REGEX_FILTER_ID};
pub use operator::{
    OperatorConfig, OperatorDescriptor, OperatorKind, OperatorSetting, PushdownOperator,
    ValueType, OPT_KEY_CODEC, OPT_VALUE_INPUT_CODEC, OPT_VALUE_OUTPUT_CODEC,
};
pub use registry::{operator_factory, OperatorFactory, OperatorRegistry};
pub use sampling::{hash_point, SampleDescriptor, SamplingFilter, SAMPLING_ID};
pub use transforms::{KeyToKey, RowStats, KEY_TO_KEY_ID, ROW_STATS_ID};
