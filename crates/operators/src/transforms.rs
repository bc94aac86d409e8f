//! Value transforms
//!
//! `key_to_key` replaces every value with its own key, re-encoded with the
//! output codec. `row_stats` folds all retained versions of a key into one
//! numeric summary.

use std::sync::Arc;

use keyspan_codec::ValueCodec;
use keyspan_core::{Entry, SummaryStatistics};

use crate::aggregate::encode_summary;
use crate::error::Result;
use crate::operator::{
    codec_option, rows, OperatorConfig, PushdownOperator, OPT_KEY_CODEC, OPT_VALUE_INPUT_CODEC,
    OPT_VALUE_OUTPUT_CODEC,
};

/// Registered id of the key-to-key transform
pub const KEY_TO_KEY_ID: &str = "key_to_key";
/// Registered id of the per-row statistics transform
pub const ROW_STATS_ID: &str = "row_stats";

/// Maps `key -> value` to `key -> key`
#[derive(Debug)]
pub struct KeyToKey {
    key_codec: Arc<dyn ValueCodec>,
    output_codec: Arc<dyn ValueCodec>,
}

impl KeyToKey {
    /// Build the transform from operator options.
    ///
    /// The output codec defaults to the key codec.
    pub fn from_config(config: &OperatorConfig) -> Result<Self> {
        let key_codec = codec_option(config, OPT_KEY_CODEC)?;
        let output_codec = if config.contains_key(OPT_VALUE_OUTPUT_CODEC) {
            codec_option(config, OPT_VALUE_OUTPUT_CODEC)?
        } else {
            Arc::clone(&key_codec)
        };
        Ok(Self {
            key_codec,
            output_codec,
        })
    }
}

impl PushdownOperator for KeyToKey {
    fn process(&mut self, entries: Vec<Entry>) -> Result<Vec<Entry>> {
        entries
            .into_iter()
            .map(|mut entry| -> Result<Entry> {
                let key = self.key_codec.decode(&entry.key)?;
                entry.value = self.output_codec.encode(&key)?;
                Ok(entry)
            })
            .collect()
    }
}

/// Emits one summary per key over all of its versions.
///
/// Non-numeric values are skipped. The output entry carries the newest
/// version's timestamp.
#[derive(Debug)]
pub struct RowStats {
    value_codec: Arc<dyn ValueCodec>,
}

impl RowStats {
    /// Build the transform from operator options
    pub fn from_config(config: &OperatorConfig) -> Result<Self> {
        Ok(Self {
            value_codec: codec_option(config, OPT_VALUE_INPUT_CODEC)?,
        })
    }
}

impl PushdownOperator for RowStats {
    fn process(&mut self, entries: Vec<Entry>) -> Result<Vec<Entry>> {
        let mut out = Vec::new();
        for row in rows(entries) {
            let mut stats = SummaryStatistics::new();
            for entry in &row {
                if let Some(x) = self.value_codec.decode(&entry.value)?.as_f64() {
                    stats.add_value(x);
                }
            }
            let newest = &row[0];
            out.push(Entry::new(
                newest.key.clone(),
                encode_summary(&stats)?,
                newest.timestamp,
            ));
        }
        Ok(out)
    }
}
