//! Partition-wide aggregators and their partial-result encodings
//!
//! Each aggregator consumes every entry of a partition and emits exactly one
//! entry keyed by the last key it saw, or nothing for an empty partition.
//! The client folds these partials:
//!
//! | Operator | Partial value | Client fold |
//! |----------|---------------|-------------|
//! | `count` | 8-byte big-endian count | sum |
//! | `checksum` | `(key_hash_sum << 32) \| (value_hash_sum & 0xffffffff)` | XOR |
//! | `stats` | MessagePack [`SummaryStatistics`] | parallel merge |

use std::sync::Arc;

use keyspan_codec::{CodecError, LongCodec, ValueCodec};
use keyspan_core::{Entry, SummaryStatistics, Value};

use crate::error::Result;
use crate::operator::{codec_option, OperatorConfig, PushdownOperator, OPT_KEY_CODEC, OPT_VALUE_INPUT_CODEC};

/// Registered id of the count aggregator
pub const COUNT_ID: &str = "count";
/// Registered id of the checksum aggregator
pub const CHECKSUM_ID: &str = "checksum";
/// Registered id of the numeric summary aggregator
pub const STATS_ID: &str = "stats";

// ============================================================================
// Partial encodings
// ============================================================================

/// Encode a partial count
pub fn encode_count(count: u64) -> Vec<u8> {
    LongCodec::encode_i64(count as i64)
}

/// Decode a partial count
pub fn decode_count(data: &[u8]) -> Result<u64> {
    Ok(LongCodec::decode_i64(data)? as u64)
}

/// Encode a summary partial
pub fn encode_summary(stats: &SummaryStatistics) -> Result<Vec<u8>> {
    rmp_serde::to_vec(stats).map_err(|e| CodecError::Opaque(e.to_string()).into())
}

/// Decode a summary partial
pub fn decode_summary(data: &[u8]) -> Result<SummaryStatistics> {
    rmp_serde::from_slice(data).map_err(|e| CodecError::Opaque(e.to_string()).into())
}

/// Two 32-bit rolling sums of decoded key and value hash codes.
///
/// Sums commute, so the packed word does not depend on the order entries
/// are added in, and hash codes come from decoded values, so it does not
/// depend on the codec either.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChecksumAccumulator {
    key_sum: i32,
    value_sum: i32,
}

impl ChecksumAccumulator {
    /// Empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one decoded entry
    pub fn add(&mut self, key: &Value, value: &Value) {
        self.key_sum = self.key_sum.wrapping_add(key.hash_code());
        self.value_sum = self.value_sum.wrapping_add(value.hash_code());
    }

    /// `(key_sum << 32) | (value_sum & 0xffffffff)`
    pub fn packed(&self) -> u64 {
        ((self.key_sum as u32 as u64) << 32) | (self.value_sum as u32 as u64)
    }
}

/// High word of a packed checksum
pub fn checksum_keys(packed: u64) -> u32 {
    (packed >> 32) as u32
}

/// Low word of a packed checksum
pub fn checksum_values(packed: u64) -> u32 {
    packed as u32
}

fn last_entry_key(entries: &[Entry]) -> Option<(Vec<u8>, u64)> {
    entries.last().map(|e| (e.key.clone(), e.timestamp))
}

// ============================================================================
// Aggregators
// ============================================================================

/// Counts entries
#[derive(Debug, Default)]
pub struct CountAggregator;

impl PushdownOperator for CountAggregator {
    fn process(&mut self, entries: Vec<Entry>) -> Result<Vec<Entry>> {
        Ok(match last_entry_key(&entries) {
            Some((key, ts)) => vec![Entry::new(key, encode_count(entries.len() as u64), ts)],
            None => Vec::new(),
        })
    }
}

/// Sums decoded key and value hash codes
#[derive(Debug)]
pub struct ChecksumAggregator {
    key_codec: Arc<dyn ValueCodec>,
    value_codec: Arc<dyn ValueCodec>,
}

impl ChecksumAggregator {
    /// Build the aggregator from operator options
    pub fn from_config(config: &OperatorConfig) -> Result<Self> {
        Ok(Self {
            key_codec: codec_option(config, OPT_KEY_CODEC)?,
            value_codec: codec_option(config, OPT_VALUE_INPUT_CODEC)?,
        })
    }
}

impl PushdownOperator for ChecksumAggregator {
    fn process(&mut self, entries: Vec<Entry>) -> Result<Vec<Entry>> {
        let Some((key, ts)) = last_entry_key(&entries) else {
            return Ok(Vec::new());
        };
        let mut acc = ChecksumAccumulator::new();
        for entry in &entries {
            let k = self.key_codec.decode(&entry.key)?;
            let v = self.value_codec.decode(&entry.value)?;
            acc.add(&k, &v);
        }
        Ok(vec![Entry::new(key, LongCodec::encode_i64(acc.packed() as i64), ts)])
    }
}

/// Builds a numeric summary; non-numeric values are skipped
#[derive(Debug)]
pub struct StatsAggregator {
    value_codec: Arc<dyn ValueCodec>,
}

impl StatsAggregator {
    /// Build the aggregator from operator options
    pub fn from_config(config: &OperatorConfig) -> Result<Self> {
        Ok(Self {
            value_codec: codec_option(config, OPT_VALUE_INPUT_CODEC)?,
        })
    }
}

impl PushdownOperator for StatsAggregator {
    fn process(&mut self, entries: Vec<Entry>) -> Result<Vec<Entry>> {
        let Some((key, ts)) = last_entry_key(&entries) else {
            return Ok(Vec::new());
        };
        let mut stats = SummaryStatistics::new();
        for entry in &entries {
            if let Some(x) = self.value_codec.decode(&entry.value)?.as_f64() {
                stats.add_value(x);
            }
        }
        Ok(vec![Entry::new(key, encode_summary(&stats)?, ts)])
    }
}
