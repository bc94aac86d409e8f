//! Regex filter over decoded entries
//!
//! Keys and values are decoded with the codecs named in the options and
//! matched against their display form. An absent pattern matches anything.

use std::sync::Arc;

use regex::Regex;

use keyspan_codec::ValueCodec;
use keyspan_core::Entry;

use crate::error::{OperatorError, Result};
use crate::operator::{codec_option, OperatorConfig, PushdownOperator, OPT_KEY_CODEC, OPT_VALUE_INPUT_CODEC};

/// Registered id of the regex filter
pub const REGEX_FILTER_ID: &str = "regex_filter";

/// Pattern searched in the key's display form
pub const OPT_KEY_REGEX: &str = "key_regex";
/// Pattern searched in the value's display form
pub const OPT_VALUE_REGEX: &str = "value_regex";

/// Admits entries whose decoded key and value contain a regex match
#[derive(Debug)]
pub struct RegexFilter {
    key_codec: Arc<dyn ValueCodec>,
    value_codec: Arc<dyn ValueCodec>,
    key_regex: Option<Regex>,
    value_regex: Option<Regex>,
}

impl RegexFilter {
    /// Build the filter from operator options
    pub fn from_config(config: &OperatorConfig) -> Result<Self> {
        Ok(Self {
            key_codec: codec_option(config, OPT_KEY_CODEC)?,
            value_codec: codec_option(config, OPT_VALUE_INPUT_CODEC)?,
            key_regex: compile(config, OPT_KEY_REGEX)?,
            value_regex: compile(config, OPT_VALUE_REGEX)?,
        })
    }

    fn accept(&self, entry: &Entry) -> Result<bool> {
        if let Some(re) = &self.key_regex {
            let key = self.key_codec.decode(&entry.key)?;
            if !re.is_match(&key.to_string()) {
                return Ok(false);
            }
        }
        if let Some(re) = &self.value_regex {
            let value = self.value_codec.decode(&entry.value)?;
            if !re.is_match(&value.to_string()) {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn compile(config: &OperatorConfig, option: &str) -> Result<Option<Regex>> {
    config
        .get(option)
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| OperatorError::InvalidOption {
                option: option.to_string(),
                value: pattern.clone(),
                reason: e.to_string(),
            })
        })
        .transpose()
}

impl PushdownOperator for RegexFilter {
    fn process(&mut self, entries: Vec<Entry>) -> Result<Vec<Entry>> {
        let mut out = Vec::with_capacity(entries.len());
        for entry in entries {
            if self.accept(&entry)? {
                out.push(entry);
            }
        }
        Ok(out)
    }
}
