//! Operator model shared by the client and the store
//!
//! An operator travels over the store boundary as an [`OperatorSetting`]:
//! a registered id, a priority and a flat string map of options. Numeric
//! options are decimal strings and codecs are named by their id, so the
//! store can rebuild the operator with nothing but the registry.
//!
//! The client never ships code. It only checks, at stack-build time, that
//! each operator's [`OperatorDescriptor`] accepts the [`ValueType`] produced
//! by the operators below it.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use keyspan_codec::{get_codec, ValueCodec, DEFAULT_CODEC_ID};
use keyspan_core::Entry;

use crate::error::{OperatorError, Result};

/// Flat operator configuration
pub type OperatorConfig = BTreeMap<String, String>;

// ============================================================================
// Option keys
// ============================================================================

/// Codec id for entry keys
pub const OPT_KEY_CODEC: &str = "key_codec";
/// Codec id for the values an operator reads
pub const OPT_VALUE_INPUT_CODEC: &str = "value_input_codec";
/// Codec id for the values an operator writes
pub const OPT_VALUE_OUTPUT_CODEC: &str = "value_output_codec";

// ============================================================================
// Descriptors
// ============================================================================

/// Form of the value bytes flowing between operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Values written by the container's value codec
    Typed,
    /// 8-byte big-endian integers (counts, checksums)
    Long,
    /// MessagePack-encoded [`keyspan_core::SummaryStatistics`]
    Summary,
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Typed => "typed",
            ValueType::Long => "long",
            ValueType::Summary => "summary",
        };
        f.write_str(name)
    }
}

/// Execution granularity of an operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    /// Admits or drops individual entries
    Filter,
    /// Rewrites individual entries
    Transform,
    /// Folds all versions of one key into one entry
    RowTransform,
    /// Folds a whole partition into one entry
    Aggregate,
}

/// What an operator consumes and produces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorDescriptor {
    /// Registered id
    pub id: String,
    /// Execution granularity
    pub kind: OperatorKind,
    /// Accepted input value types; empty accepts anything
    pub accepts: Vec<ValueType>,
    /// Output value type; `None` passes the input type through
    pub output: Option<ValueType>,
}

impl OperatorDescriptor {
    /// Create a descriptor
    pub fn new(
        id: impl Into<String>,
        kind: OperatorKind,
        accepts: &[ValueType],
        output: Option<ValueType>,
    ) -> Self {
        Self {
            id: id.into(),
            kind,
            accepts: accepts.to_vec(),
            output,
        }
    }

    /// Check that this operator can be stacked over `input`
    pub fn check_input(&self, input: ValueType) -> Result<()> {
        if self.accepts.is_empty() || self.accepts.contains(&input) {
            Ok(())
        } else {
            Err(OperatorError::IncompatibleInput {
                operator: self.id.clone(),
                input,
            })
        }
    }

    /// Value type produced when stacked over `input`
    pub fn output_type(&self, input: ValueType) -> ValueType {
        self.output.unwrap_or(input)
    }

    /// True for operators that fold a whole partition
    pub fn is_aggregate(&self) -> bool {
        self.kind == OperatorKind::Aggregate
    }
}

/// An operator as installed on a scan
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperatorSetting {
    /// Registered operator id
    pub id: String,
    /// Position in the stack; lower runs first
    pub priority: u32,
    /// Options passed to the operator factory
    pub config: OperatorConfig,
}

impl OperatorSetting {
    /// Create a setting
    pub fn new(id: impl Into<String>, priority: u32, config: OperatorConfig) -> Self {
        Self {
            id: id.into(),
            priority,
            config,
        }
    }
}

// ============================================================================
// Execution
// ============================================================================

/// A unit of pushdown computation.
///
/// The store builds one instance per partition per scan and feeds it that
/// partition's entries in key order (newest version first within a key).
/// Operators of a stack run in ascending priority, each consuming the
/// previous one's output.
pub trait PushdownOperator: Send {
    /// Process one partition's entries
    fn process(&mut self, entries: Vec<Entry>) -> Result<Vec<Entry>>;
}

// ============================================================================
// Option helpers
// ============================================================================

/// Look up a required option
pub fn required_option<'a>(
    config: &'a OperatorConfig,
    operator: &str,
    option: &'static str,
) -> Result<&'a str> {
    config
        .get(option)
        .map(String::as_str)
        .ok_or_else(|| OperatorError::MissingOption {
            operator: operator.to_string(),
            option,
        })
}

/// Parse a decimal-string option, if present
pub fn parse_option<T>(config: &OperatorConfig, option: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match config.get(option) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| OperatorError::InvalidOption {
                option: option.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
    }
}

/// Resolve a codec option, falling back to the default codec
pub fn codec_option(config: &OperatorConfig, option: &str) -> Result<Arc<dyn ValueCodec>> {
    let id = config
        .get(option)
        .map(String::as_str)
        .unwrap_or(DEFAULT_CODEC_ID);
    Ok(get_codec(id)?)
}

/// Group consecutive entries sharing a key
pub(crate) fn rows(entries: Vec<Entry>) -> Vec<Vec<Entry>> {
    let mut rows: Vec<Vec<Entry>> = Vec::new();
    for entry in entries {
        match rows.last_mut() {
            Some(row) if row[0].key == entry.key => row.push(entry),
            _ => rows.push(vec![entry]),
        }
    }
    rows
}
