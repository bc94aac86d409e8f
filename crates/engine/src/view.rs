//! Views and the composition engine
//!
//! A [`View`] is an immutable node in a tree rooted at a base container.
//! Each node holds its parent, its own operator setting (or range
//! restriction) and the properties reads need: the effective key range, the
//! scan mode it requests, and how to decode the values it produces.
//!
//! ## Stacking
//!
//! ```text
//! base ──submap──▶ Submap ──sample──▶ Sampled(p=100) ──regex──▶ Filtered(p=101)
//! ```
//!
//! - A range restriction intersects the parent's range and does not consume
//!   a priority. Disjoint ranges yield an [`ViewKind::Empty`] view.
//! - Every other derivation appends one operator at the parent's next
//!   priority, so priorities strictly increase from root to leaf.
//! - Operator input types are checked against the registry when the view is
//!   built, not when it is scanned.
//!
//! Opening a scan walks the chain from the leaf: the base creates the
//! [`Scanner`], a submap narrows its range, and every stacked node installs
//! its operator. Building a view never touches the store.

use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use keyspan_codec::{get_codec, LongCodec, ValueCodec};
use keyspan_core::{Entry, KeyRange, ScanMode, SummaryStatistics, Timestamp, Value};
use keyspan_operators::{
    checksum_keys, checksum_values, decode_summary, OperatorConfig, OperatorKind,
    OperatorSetting, SampleDescriptor, ValueType, KEY_TO_KEY_ID, OPT_KEY_CODEC,
    OPT_VALUE_INPUT_CODEC, OPT_VALUE_OUTPUT_CODEC, REGEX_FILTER_ID, ROW_STATS_ID, SAMPLING_ID,
};
use keyspan_operators::{OPT_KEY_REGEX, OPT_VALUE_REGEX};
use keyspan_storage::{ReadOptions, ScanStream, Scanner};
use tracing::debug;

use crate::aggregate::{aggregate, Checksum, Count, NumericSummary};
use crate::error::{Error, Result};
use crate::map::MapCore;
use crate::mapper::DerivedMapper;

/// Priority given to the first operator stacked on a base container
pub const FIRST_OPERATOR_PRIORITY: u32 = 100;

/// Which derivation produced a view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    /// The container itself; the only writable kind
    Base,
    /// A range restriction
    Submap,
    /// A hash-range sample or time window
    Sampled,
    /// A per-entry filter
    Filtered,
    /// A per-entry or per-row transform
    Transformed,
    /// One partial aggregate per partition
    Aggregated,
    /// A restriction that matched nothing; every read is empty
    Empty,
}

// ============================================================================
// Value formats
// ============================================================================

/// How a view's value bytes turn back into values
#[derive(Clone)]
pub(crate) enum ValueFormat {
    Codec(Arc<dyn ValueCodec>),
    Summary,
}

impl ValueFormat {
    fn decode(&self, data: &[u8]) -> Result<Value> {
        match self {
            ValueFormat::Codec(codec) => Ok(codec.decode(data)?),
            ValueFormat::Summary => Ok(summary_value(&decode_summary(data)?)),
        }
    }

    fn codec_id(&self) -> Option<&str> {
        match self {
            ValueFormat::Codec(codec) => Some(codec.codec_id()),
            ValueFormat::Summary => None,
        }
    }
}

/// A summary as an object value with `n`, `mean`, `variance`, `min`, `max`
/// and `sum` fields
pub fn summary_value(stats: &SummaryStatistics) -> Value {
    let mut fields = HashMap::new();
    fields.insert("n".to_string(), Value::Int(stats.n() as i64));
    fields.insert("mean".to_string(), Value::Float(stats.mean()));
    fields.insert("variance".to_string(), Value::Float(stats.variance()));
    fields.insert("min".to_string(), Value::Float(stats.min()));
    fields.insert("max".to_string(), Value::Float(stats.max()));
    fields.insert("sum".to_string(), Value::Float(stats.sum()));
    Value::Object(fields)
}

// ============================================================================
// View
// ============================================================================

struct ViewNode {
    kind: ViewKind,
    parent: Option<View>,
    operator: Option<OperatorSetting>,
    core: Arc<MapCore>,
    range: KeyRange,
    mode: ScanMode,
    value_type: ValueType,
    format: ValueFormat,
    next_priority: u32,
}

/// A read view over a sorted map.
///
/// Cloning is cheap; clones share the same node. Views are immutable and
/// may be read from many threads at once.
#[derive(Clone)]
pub struct View {
    node: Arc<ViewNode>,
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("kind", &self.node.kind)
            .field("operator", &self.node.operator.as_ref().map(|s| &s.id))
            .field("priority", &self.priority())
            .field("range", &self.node.range)
            .field("mode", &self.node.mode)
            .field("value_type", &self.node.value_type)
            .finish()
    }
}

/// One decoded entry
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    /// Decoded key
    pub key: Value,
    /// Decoded value
    pub value: Value,
    /// Store-assigned write-order marker
    pub timestamp: Timestamp,
}

/// Lazily decoded scan results
pub struct Entries {
    stream: ScanStream,
    key_codec: Arc<dyn ValueCodec>,
    format: ValueFormat,
}

impl Iterator for Entries {
    type Item = Result<MapEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        let entry = self.stream.next()?;
        Some(entry.map_err(Error::from).and_then(|e| {
            Ok(MapEntry {
                key: self.key_codec.decode(&e.key)?,
                value: self.format.decode(&e.value)?,
                timestamp: e.timestamp,
            })
        }))
    }
}

impl View {
    pub(crate) fn base(core: Arc<MapCore>) -> View {
        let format = ValueFormat::Codec(Arc::clone(&core.value_codec));
        View {
            node: Arc::new(ViewNode {
                kind: ViewKind::Base,
                parent: None,
                operator: None,
                core,
                range: KeyRange::full(),
                mode: ScanMode::Latest,
                value_type: ValueType::Typed,
                format,
                next_priority: FIRST_OPERATOR_PRIORITY,
            }),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn child(
        &self,
        kind: ViewKind,
        operator: Option<OperatorSetting>,
        range: KeyRange,
        mode: ScanMode,
        value_type: ValueType,
        format: ValueFormat,
        next_priority: u32,
    ) -> View {
        // Anything derived from an empty view is empty too
        let kind = if self.node.kind == ViewKind::Empty {
            ViewKind::Empty
        } else {
            kind
        };
        View {
            node: Arc::new(ViewNode {
                kind,
                parent: Some(self.clone()),
                operator,
                core: Arc::clone(&self.node.core),
                range,
                mode,
                value_type,
                format,
                next_priority,
            }),
        }
    }

    pub(crate) fn core(&self) -> &Arc<MapCore> {
        &self.node.core
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    /// Derivation that produced this view
    pub fn kind(&self) -> ViewKind {
        self.node.kind
    }

    /// True for every view except the base container
    pub fn is_read_only(&self) -> bool {
        self.node.kind != ViewKind::Base
    }

    /// True for the sentinel produced by a disjoint range restriction
    pub fn is_empty_view(&self) -> bool {
        self.node.kind == ViewKind::Empty
    }

    /// Parent view, `None` for the base
    pub fn parent(&self) -> Option<&View> {
        self.node.parent.as_ref()
    }

    /// Operator this view installs, if any
    pub fn operator(&self) -> Option<&OperatorSetting> {
        self.node.operator.as_ref()
    }

    /// Priority of this view's own operator
    pub fn priority(&self) -> Option<u32> {
        self.node.operator.as_ref().map(|s| s.priority)
    }

    /// Priority the next stacked operator will get
    pub fn next_priority(&self) -> u32 {
        self.node.next_priority
    }

    /// Priorities of every operator from the base to this view
    pub fn priorities(&self) -> Vec<u32> {
        let mut out = Vec::new();
        let mut current = Some(self);
        while let Some(view) = current {
            if let Some(p) = view.priority() {
                out.push(p);
            }
            current = view.parent();
        }
        out.reverse();
        out
    }

    /// Effective key range
    pub fn range(&self) -> &KeyRange {
        &self.node.range
    }

    /// Scan mode this view requests from its parent
    pub fn mode(&self) -> ScanMode {
        self.node.mode
    }

    /// Type of the values this view produces
    pub fn value_type(&self) -> ValueType {
        self.node.value_type
    }

    /// Codec used for keys
    pub fn key_codec(&self) -> &Arc<dyn ValueCodec> {
        &self.node.core.key_codec
    }

    // ========================================================================
    // Derivations
    // ========================================================================

    /// Restrict to an encoded key range.
    ///
    /// Returns an empty view when `range` does not meet the current range.
    pub fn restrict(&self, range: &KeyRange) -> View {
        let node = &self.node;
        let (kind, range) = match node.range.intersect(range) {
            Some(clipped) => (ViewKind::Submap, clipped),
            None => {
                debug!(kind = ?node.kind, "range restriction is disjoint");
                (ViewKind::Empty, node.range.clone())
            }
        };
        self.child(
            kind,
            None,
            range,
            node.mode,
            node.value_type,
            node.format.clone(),
            node.next_priority,
        )
    }

    /// Keys in `[from, to)`
    pub fn sub_map(&self, from: impl Into<Value>, to: impl Into<Value>) -> Result<View> {
        let from = self.encode_key(&from.into())?;
        let to = self.encode_key(&to.into())?;
        Ok(self.restrict(&KeyRange::half_open(Some(from), Some(to))))
    }

    /// Keys below `to`
    pub fn head_map(&self, to: impl Into<Value>) -> Result<View> {
        let to = self.encode_key(&to.into())?;
        Ok(self.restrict(&KeyRange::half_open(None, Some(to))))
    }

    /// Keys at or above `from`
    pub fn tail_map(&self, from: impl Into<Value>) -> Result<View> {
        let from = self.encode_key(&from.into())?;
        Ok(self.restrict(&KeyRange::half_open(Some(from), None)))
    }

    /// Admit the keys whose seeded digest falls in the descriptor's range
    pub fn sample(&self, descriptor: &SampleDescriptor) -> Result<View> {
        self.stack(SAMPLING_ID, descriptor.to_config(), None, self.node.mode)
    }

    /// Sample `[0, fraction)` of the keys with a random seed
    pub fn sample_fraction(&self, fraction: f64) -> Result<View> {
        self.sample(&SampleDescriptor::with_fraction(fraction)?)
    }

    /// Admit entries written within `[min_ts, max_ts]`
    pub fn time_filter(&self, min_ts: Option<Timestamp>, max_ts: Option<Timestamp>) -> Result<View> {
        self.sample(&SampleDescriptor::full_range().with_time_range(min_ts, max_ts))
    }

    /// Admit entries whose decoded key and value contain a match of the
    /// given patterns; `None` matches anything
    pub fn regex_filter(&self, key_regex: Option<&str>, value_regex: Option<&str>) -> Result<View> {
        let mut config = OperatorConfig::new();
        if let Some(re) = key_regex {
            config.insert(OPT_KEY_REGEX.to_string(), re.to_string());
        }
        if let Some(re) = value_regex {
            config.insert(OPT_VALUE_REGEX.to_string(), re.to_string());
        }
        self.stack(REGEX_FILTER_ID, config, None, self.node.mode)
    }

    /// Filter on the key only
    pub fn regex_key_filter(&self, key_regex: &str) -> Result<View> {
        self.regex_filter(Some(key_regex), None)
    }

    /// Filter on the value only
    pub fn regex_value_filter(&self, value_regex: &str) -> Result<View> {
        self.regex_filter(None, Some(value_regex))
    }

    /// Replace every value with its key
    pub fn key_to_key(&self) -> Result<View> {
        let key_codec = Arc::clone(&self.node.core.key_codec);
        self.stack(KEY_TO_KEY_ID, OperatorConfig::new(), Some(key_codec), self.node.mode)
    }

    /// Stack a mapper's operator
    pub fn derive(&self, mapper: &dyn DerivedMapper) -> Result<View> {
        self.stack(
            mapper.operator_id(),
            mapper.options(),
            mapper.output_codec(),
            self.node.mode,
        )
    }

    /// Stack a mapper's operator over every retained version
    pub fn derive_multi(&self, mapper: &dyn DerivedMapper) -> Result<View> {
        self.stack(
            mapper.operator_id(),
            mapper.options(),
            mapper.output_codec(),
            ScanMode::AllVersions,
        )
    }

    /// One numeric summary per key over every retained value
    pub fn row_stats(&self) -> Result<View> {
        self.stack(ROW_STATS_ID, OperatorConfig::new(), None, ScanMode::AllVersions)
    }

    /// View of the per-partition partials of an aggregate operator
    pub fn aggregate_view(&self, operator_id: &str, options: OperatorConfig) -> Result<View> {
        let view = self.stack(operator_id, options, None, self.node.mode)?;
        if view.kind() != ViewKind::Aggregated && view.kind() != ViewKind::Empty {
            return Err(Error::Configuration(format!(
                "{} is not an aggregate operator",
                operator_id
            )));
        }
        Ok(view)
    }

    fn stack(
        &self,
        id: &str,
        mut config: OperatorConfig,
        output_codec: Option<Arc<dyn ValueCodec>>,
        mode: ScanMode,
    ) -> Result<View> {
        let node = &self.node;
        let descriptor = node.core.registry.descriptor(id)?;
        descriptor.check_input(node.value_type)?;

        config
            .entry(OPT_KEY_CODEC.to_string())
            .or_insert_with(|| node.core.key_codec.codec_id().to_string());
        if let Some(input) = node.format.codec_id() {
            config
                .entry(OPT_VALUE_INPUT_CODEC.to_string())
                .or_insert_with(|| input.to_string());
        }

        let format = match descriptor.output {
            None => node.format.clone(),
            Some(ValueType::Long) => ValueFormat::Codec(Arc::new(LongCodec)),
            Some(ValueType::Summary) => ValueFormat::Summary,
            Some(ValueType::Typed) => {
                let codec = match config.get(OPT_VALUE_OUTPUT_CODEC) {
                    Some(codec_id) => get_codec(codec_id)
                        .map_err(|e| Error::Configuration(e.to_string()))?,
                    None => output_codec.unwrap_or_else(|| Arc::clone(&node.core.value_codec)),
                };
                config.insert(
                    OPT_VALUE_OUTPUT_CODEC.to_string(),
                    codec.codec_id().to_string(),
                );
                ValueFormat::Codec(codec)
            }
        };
        let kind = match descriptor.kind {
            _ if id == SAMPLING_ID => ViewKind::Sampled,
            OperatorKind::Filter => ViewKind::Filtered,
            OperatorKind::Transform | OperatorKind::RowTransform => ViewKind::Transformed,
            OperatorKind::Aggregate => ViewKind::Aggregated,
        };
        let value_type = descriptor.output_type(node.value_type);
        let priority = node.next_priority;
        let setting = OperatorSetting::new(id, priority, config);
        node.core
            .registry
            .build(&setting)
            .map_err(|e| Error::Configuration(e.to_string()))?;

        // An empty view installs nothing and keeps its priority slot free
        if node.kind == ViewKind::Empty {
            return Ok(self.child(
                kind,
                None,
                node.range.clone(),
                mode,
                value_type,
                format,
                priority,
            ));
        }
        debug!(operator = id, priority, ?kind, "stacking operator");

        Ok(self.child(
            kind,
            Some(setting),
            node.range.clone(),
            mode,
            value_type,
            format,
            priority + 1,
        ))
    }

    // ========================================================================
    // Scanning
    // ========================================================================

    /// Build the scan handle for this view in `mode`; `None` for empty views
    fn open_scan(&self, mode: ScanMode) -> Result<Option<Scanner>> {
        let node = &self.node;
        match node.kind {
            ViewKind::Empty => Ok(None),
            ViewKind::Base => Ok(Some(Scanner::new(
                node.range.clone(),
                ReadOptions::new(mode),
            ))),
            ViewKind::Submap => {
                let Some(mut scanner) = self.parent_scan(mode)? else {
                    return Ok(None);
                };
                scanner.set_range(node.range.clone());
                Ok(Some(scanner))
            }
            ViewKind::Sampled
            | ViewKind::Filtered
            | ViewKind::Transformed
            | ViewKind::Aggregated => {
                let Some(mut scanner) = self.parent_scan(mode)? else {
                    return Ok(None);
                };
                if let Some(setting) = &node.operator {
                    scanner.install(setting.clone())?;
                }
                Ok(Some(scanner))
            }
        }
    }

    fn parent_scan(&self, mode: ScanMode) -> Result<Option<Scanner>> {
        match &self.node.parent {
            Some(parent) => parent.open_scan(mode),
            None => Ok(None),
        }
    }

    /// Raw entries in `mode`, optionally narrowed to `range`
    pub(crate) fn scan_raw(&self, range: Option<&KeyRange>, mode: ScanMode) -> Result<ScanStream> {
        let Some(mut scanner) = self.open_scan(mode)? else {
            return Ok(Box::new(std::iter::empty()));
        };
        if let Some(range) = range {
            match scanner.range().intersect(range) {
                Some(clipped) => scanner.set_range(clipped),
                None => return Ok(Box::new(std::iter::empty())),
            }
        }
        debug!(
            kind = ?self.node.kind,
            operators = scanner.operators().len(),
            ?mode,
            "opening scan"
        );
        Ok(self.node.core.store.scan(&scanner)?)
    }

    fn decoded(&self, stream: ScanStream) -> Entries {
        Entries {
            stream,
            key_codec: Arc::clone(&self.node.core.key_codec),
            format: self.node.format.clone(),
        }
    }

    pub(crate) fn encode_key(&self, key: &Value) -> Result<Vec<u8>> {
        Ok(self.node.core.key_codec.encode(key)?)
    }

    /// Decode the value bytes this view produces
    pub fn decode_value(&self, data: &[u8]) -> Result<Value> {
        self.node.format.decode(data)
    }

    fn lookup(&self, key: &Value, mode: ScanMode) -> Result<Option<Entry>> {
        let encoded = self.encode_key(key)?;
        let mut stream = self.scan_raw(Some(&KeyRange::exact(&encoded)), mode)?;
        Ok(stream.next().transpose()?)
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Newest value of `key` as this view sees it
    pub fn get(&self, key: impl Into<Value>) -> Result<Option<Value>> {
        match self.lookup(&key.into(), self.node.mode)? {
            Some(entry) => Ok(Some(self.decode_value(&entry.value)?)),
            None => Ok(None),
        }
    }

    /// Timestamp of the newest value of `key`
    pub fn get_timestamp(&self, key: impl Into<Value>) -> Result<Option<Timestamp>> {
        Ok(self
            .lookup(&key.into(), self.node.mode)?
            .map(|entry| entry.timestamp))
    }

    /// Every retained value of `key`, newest first
    pub fn get_all(&self, key: impl Into<Value>) -> Result<Vec<Value>> {
        let encoded = self.encode_key(&key.into())?;
        self.scan_raw(Some(&KeyRange::exact(&encoded)), ScanMode::AllVersions)?
            .map(|entry| self.decode_value(&entry?.value))
            .collect()
    }

    /// Check whether `key` is present
    pub fn contains_key(&self, key: impl Into<Value>) -> Result<bool> {
        Ok(self.lookup(&key.into(), self.node.mode)?.is_some())
    }

    /// Smallest key
    pub fn first_key(&self) -> Result<Option<Value>> {
        match self.scan_raw(None, self.node.mode)?.next() {
            Some(entry) => Ok(Some(self.node.core.key_codec.decode(&entry?.key)?)),
            None => Ok(None),
        }
    }

    /// Largest key
    pub fn last_key(&self) -> Result<Option<Value>> {
        let mut last = None;
        for entry in self.scan_raw(None, self.node.mode)? {
            last = Some(entry?.key);
        }
        match last {
            Some(key) => Ok(Some(self.node.core.key_codec.decode(&key)?)),
            None => Ok(None),
        }
    }

    /// Decoded entries in key order
    pub fn entries(&self) -> Result<Entries> {
        Ok(self.decoded(self.scan_raw(None, self.node.mode)?))
    }

    /// Decoded entries including every retained version, newest first
    /// within a key
    pub fn multi_entries(&self) -> Result<Entries> {
        Ok(self.decoded(self.scan_raw(None, ScanMode::AllVersions)?))
    }

    /// Decoded keys in order
    pub fn keys(&self) -> Result<impl Iterator<Item = Result<Value>>> {
        Ok(self.entries()?.map(|e| e.map(|e| e.key)))
    }

    /// Decoded values in key order
    pub fn values(&self) -> Result<impl Iterator<Item = Result<Value>>> {
        Ok(self.entries()?.map(|e| e.map(|e| e.value)))
    }

    /// Copy every entry into memory
    pub fn local_copy(&self) -> Result<Vec<(Value, Value)>> {
        self.entries()?
            .map(|e| e.map(|e| (e.key, e.value)))
            .collect()
    }

    /// Number of entries, computed by a pushdown count
    pub fn size(&self) -> Result<u64> {
        aggregate(self, &Count)
    }

    /// True when the view yields no entries
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.scan_raw(None, self.node.mode)?.next().transpose()?.is_none())
    }

    /// Scan for a value. Runs client side.
    pub fn contains_value(&self, value: &Value) -> Result<bool> {
        for v in self.values()? {
            if v? == *value {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Packed key and value hash sums, computed by a pushdown aggregate
    pub fn checksum(&self) -> Result<u64> {
        aggregate(self, &Checksum)
    }

    /// Key half of [`View::checksum`]
    pub fn checksum_keys(&self) -> Result<u32> {
        Ok(checksum_keys(self.checksum()?))
    }

    /// Value half of [`View::checksum`]
    pub fn checksum_values(&self) -> Result<u32> {
        Ok(checksum_values(self.checksum()?))
    }

    /// Numeric summary of the values
    pub fn stats(&self) -> Result<SummaryStatistics> {
        aggregate(self, &NumericSummary)
    }

    /// Write `k = key : v = value` lines, for debugging.
    ///
    /// A multi-valued container writes every retained version.
    pub fn dump<W: io::Write>(&self, out: &mut W) -> Result<()> {
        if self.node.core.config.is_multi_valued() {
            return self.dump_multi(out, None);
        }
        for entry in self.entries()? {
            let entry = entry?;
            writeln!(out, "k = {} : v = {}", entry.key, entry.value)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Write every retained version, newest first, at most
    /// `max_values_per_key` per key when given
    pub fn dump_multi<W: io::Write>(
        &self,
        out: &mut W,
        max_values_per_key: Option<usize>,
    ) -> Result<()> {
        let mut current: Option<Value> = None;
        let mut written = 0usize;
        for entry in self.multi_entries()? {
            let entry = entry?;
            if current.as_ref() != Some(&entry.key) {
                current = Some(entry.key.clone());
                written = 0;
            }
            if max_values_per_key.map_or(true, |max| written < max) {
                writeln!(out, "k = {} : v = {}", entry.key, entry.value)?;
                written += 1;
            }
        }
        out.flush()?;
        Ok(())
    }

    /// Poll until `key` appears or `max` has elapsed.
    ///
    /// `increment` defaults to the container's configured poll interval.
    pub fn wait_for(
        &self,
        key: impl Into<Value>,
        max: Duration,
        increment: Option<Duration>,
    ) -> Result<Option<Value>> {
        let key = key.into();
        let increment = increment.unwrap_or_else(|| self.node.core.config.wait_increment());
        let mut waited = Duration::ZERO;
        loop {
            if let Some(value) = self.get(key.clone())? {
                return Ok(Some(value));
            }
            if waited >= max || increment.is_zero() {
                return Ok(None);
            }
            let step = increment.min(max - waited);
            debug!(waited_ms = waited.as_millis() as u64, step_ms = step.as_millis() as u64, "waiting for key");
            thread::sleep(step);
            waited += step;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::map::SortedMap;
    use crate::mapper::OperatorMapper;
    use keyspan_storage::{MemoryStore, StoreConfig};

    fn filled_map(n: i64) -> SortedMap {
        let map = SortedMap::in_memory().unwrap();
        map.put_all((0..n).map(|k| (k, 2 * k))).unwrap();
        map
    }

    fn encoded(k: i64) -> Vec<u8> {
        keyspan_codec::FixedPointCodec.encode(&Value::Int(k)).unwrap()
    }

    fn keys_of(view: &View) -> Vec<Value> {
        view.keys().unwrap().map(|k| k.unwrap()).collect()
    }

    #[test]
    fn test_base_view_properties() {
        let map = SortedMap::in_memory().unwrap();
        assert_eq!(map.kind(), ViewKind::Base);
        assert!(!map.is_read_only());
        assert_eq!(map.priority(), None);
        assert_eq!(map.next_priority(), FIRST_OPERATOR_PRIORITY);
        assert_eq!(map.value_type(), ValueType::Typed);
    }

    #[test]
    fn test_get_and_contains() {
        let map = filled_map(10);
        assert_eq!(map.get(3i64).unwrap(), Some(Value::Int(6)));
        assert_eq!(map.get(30i64).unwrap(), None);
        assert!(map.contains_key(9i64).unwrap());
        assert!(!map.contains_key(-1i64).unwrap());
        assert!(map.get_timestamp(3i64).unwrap().is_some());
    }

    #[test]
    fn test_first_and_last_key() {
        let map = filled_map(10);
        assert_eq!(map.first_key().unwrap(), Some(Value::Int(0)));
        assert_eq!(map.last_key().unwrap(), Some(Value::Int(9)));
        let empty = SortedMap::in_memory().unwrap();
        assert_eq!(empty.first_key().unwrap(), None);
        assert_eq!(empty.last_key().unwrap(), None);
        assert!(empty.is_empty().unwrap());
    }

    #[test]
    fn test_submap_bounds() {
        let map = filled_map(20);
        let sub = map.sub_map(5i64, 8i64).unwrap();
        assert_eq!(sub.kind(), ViewKind::Submap);
        assert_eq!(keys_of(&sub), vec![Value::Int(5), Value::Int(6), Value::Int(7)]);
        assert_eq!(sub.size().unwrap(), 3);
        assert_eq!(sub.get(10i64).unwrap(), None);
        assert_eq!(map.head_map(2i64).unwrap().size().unwrap(), 2);
        assert_eq!(map.tail_map(18i64).unwrap().size().unwrap(), 2);
    }

    #[test]
    fn test_nested_submaps_intersect() {
        let map = filled_map(20);
        let sub = map.sub_map(5i64, 15i64).unwrap().sub_map(10i64, 30i64).unwrap();
        assert_eq!(sub.first_key().unwrap(), Some(Value::Int(10)));
        assert_eq!(sub.last_key().unwrap(), Some(Value::Int(14)));
    }

    #[test]
    fn test_disjoint_submap_is_empty_view() {
        let map = filled_map(20);
        let empty = map.sub_map(0i64, 5i64).unwrap().sub_map(10i64, 15i64).unwrap();
        assert!(empty.is_empty_view());
        assert!(empty.is_empty().unwrap());
        assert_eq!(empty.size().unwrap(), 0);
        assert_eq!(empty.checksum().unwrap(), 0);
        assert_eq!(empty.get(1i64).unwrap(), None);
        assert_eq!(empty.first_key().unwrap(), None);
        assert!(empty.local_copy().unwrap().is_empty());
        let sampled = empty.sample_fraction(0.5).unwrap();
        assert!(sampled.is_empty_view());
        assert_eq!(sampled.size().unwrap(), 0);
    }

    #[test]
    fn test_empty_view_derivations_take_no_priority() {
        let map = filled_map(20);
        let empty = map.sub_map(0i64, 5i64).unwrap().sub_map(10i64, 15i64).unwrap();
        assert_eq!(empty.next_priority(), FIRST_OPERATOR_PRIORITY);
        let sampled = empty.sample_fraction(0.5).unwrap();
        assert_eq!(sampled.priority(), None);
        assert!(sampled.operator().is_none());
        assert_eq!(sampled.next_priority(), FIRST_OPERATOR_PRIORITY);
        let filtered = sampled.regex_key_filter("1").unwrap();
        assert!(filtered.is_empty_view());
        assert_eq!(filtered.next_priority(), FIRST_OPERATOR_PRIORITY);
        assert!(filtered.priorities().is_empty());
    }

    #[test]
    fn test_priorities_strictly_increase() {
        let map = filled_map(10);
        let a = map.sample_fraction(0.9).unwrap();
        let b = a.sub_map(0i64, 8i64).unwrap();
        let c = b.regex_key_filter(".*").unwrap();
        let d = c.key_to_key().unwrap();
        assert_eq!(a.priority(), Some(100));
        assert_eq!(b.priority(), None);
        assert_eq!(b.next_priority(), 101);
        assert_eq!(c.priority(), Some(101));
        assert_eq!(d.priority(), Some(102));
        assert_eq!(d.priorities(), vec![100, 101, 102]);
    }

    #[test]
    fn test_parent_unchanged_by_derivation() {
        let map = filled_map(50);
        let before = map.local_copy().unwrap();
        let filtered = map.regex_key_filter("^1").unwrap();
        let sampled = map.sample_fraction(0.2).unwrap();
        assert!(filtered.size().unwrap() < 50);
        let _ = sampled.size().unwrap();
        assert_eq!(map.local_copy().unwrap(), before);
        assert_eq!(map.next_priority(), FIRST_OPERATOR_PRIORITY);
        assert_eq!(filtered.priority(), sampled.priority());
    }

    #[test]
    fn test_regex_filters() {
        let map = filled_map(30);
        let ones = map.regex_key_filter("^1").unwrap();
        assert_eq!(ones.size().unwrap(), 11);
        let values = map.regex_value_filter("^4").unwrap();
        // 4, 40..=48 even values
        assert_eq!(keys_of(&values), vec![2, 20, 21, 22, 23, 24].into_iter().map(Value::Int).collect::<Vec<_>>());
        let both = map.regex_filter(Some("^2"), Some("^4")).unwrap();
        assert_eq!(both.size().unwrap(), 6);
    }

    #[test]
    fn test_invalid_regex_is_configuration_error() {
        let map = filled_map(3);
        assert!(matches!(map.regex_key_filter("("), Err(Error::Configuration(_))));
        assert!(matches!(
            map.regex_filter(Some(".*"), Some("[z-a]")),
            Err(Error::Configuration(_))
        ));
        let mapper = OperatorMapper::new(REGEX_FILTER_ID).with_option(OPT_KEY_REGEX, "(");
        assert!(matches!(map.derive(&mapper), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_key_to_key() {
        let map = SortedMap::in_memory().unwrap();
        map.put("a", 1i64).unwrap();
        map.put("b", 2i64).unwrap();
        let view = map.key_to_key().unwrap();
        assert_eq!(view.kind(), ViewKind::Transformed);
        assert_eq!(view.get("a").unwrap(), Some(Value::from("a")));
        assert!(view.contains_value(&Value::from("b")).unwrap());
        assert!(!map.contains_value(&Value::from("b")).unwrap());
    }

    #[test]
    fn test_derive_with_mapper() {
        let map = filled_map(10);
        let mapper = OperatorMapper::new(REGEX_FILTER_ID).with_option(OPT_KEY_REGEX, "^[0-4]$");
        let view = map.derive(&mapper).unwrap();
        assert_eq!(view.kind(), ViewKind::Filtered);
        assert_eq!(view.size().unwrap(), 5);
        let config = &view.operator().unwrap().config;
        assert_eq!(config.get(OPT_KEY_CODEC).map(String::as_str), Some("fixed_point"));
        assert_eq!(config.get(OPT_VALUE_INPUT_CODEC).map(String::as_str), Some("fixed_point"));
    }

    #[test]
    fn test_unknown_operator_rejected_at_build() {
        let map = filled_map(3);
        let err = map.derive(&OperatorMapper::new("median")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_incompatible_stack_rejected_at_build() {
        let map = filled_map(3);
        let rows = map.row_stats().unwrap();
        assert_eq!(rows.value_type(), ValueType::Summary);
        assert!(matches!(rows.regex_value_filter("x"), Err(Error::Configuration(_))));
        assert!(matches!(rows.stats(), Err(Error::Configuration(_))));
        // count accepts anything
        assert_eq!(rows.size().unwrap(), 3);
    }

    #[test]
    fn test_non_aggregate_view_rejected() {
        let map = filled_map(3);
        assert!(matches!(
            map.aggregate_view(REGEX_FILTER_ID, OperatorConfig::new()),
            Err(Error::Configuration(_))
        ));
    }

    #[test]
    fn test_aggregate_view_exposes_partials() {
        let store = Arc::new(MemoryStore::new(
            StoreConfig::default().with_splits([encoded(50)]),
        ));
        let map = SortedMap::builder(store).build().unwrap();
        map.put_all((0..100i64).map(|k| (k, k))).unwrap();
        let partials = map
            .aggregate_view(keyspan_operators::COUNT_ID, OperatorConfig::new())
            .unwrap();
        assert_eq!(partials.value_type(), ValueType::Long);
        let entries: Vec<MapEntry> = partials.entries().unwrap().map(|e| e.unwrap()).collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, Value::Int(49));
        assert_eq!(entries[0].value, Value::Int(50));
        assert_eq!(entries[1].key, Value::Int(99));
    }

    #[test]
    fn test_multi_valued_reads() {
        let map = SortedMap::builder(Arc::new(MemoryStore::default()))
            .max_values_per_key(0)
            .build()
            .unwrap();
        for v in [1i64, 2, 3] {
            map.put_without_get("a", v).unwrap();
        }
        map.put_without_get("b", 10i64).unwrap();
        assert_eq!(map.get("a").unwrap(), Some(Value::Int(3)));
        assert_eq!(
            map.get_all("a").unwrap(),
            vec![Value::Int(3), Value::Int(2), Value::Int(1)]
        );
        assert_eq!(map.size().unwrap(), 2);
        assert_eq!(map.multi_entries().unwrap().count(), 4);

        let mut out = Vec::new();
        map.dump(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "k = a : v = 3\nk = a : v = 2\nk = a : v = 1\nk = b : v = 10\n"
        );
        let mut capped = Vec::new();
        map.dump_multi(&mut capped, Some(2)).unwrap();
        assert_eq!(
            String::from_utf8(capped).unwrap(),
            "k = a : v = 3\nk = a : v = 2\nk = b : v = 10\n"
        );
    }

    #[test]
    fn test_row_stats_summarizes_versions() {
        let map = SortedMap::builder(Arc::new(MemoryStore::default()))
            .max_values_per_key(0)
            .build()
            .unwrap();
        for v in [1i64, 2, 3, 6] {
            map.put_without_get("a", v).unwrap();
        }
        let rows = map.row_stats().unwrap();
        assert_eq!(rows.mode(), ScanMode::AllVersions);
        let Some(Value::Object(summary)) = rows.get("a").unwrap() else {
            panic!("expected a summary object");
        };
        assert_eq!(summary.get("n"), Some(&Value::Int(4)));
        assert_eq!(summary.get("mean"), Some(&Value::Float(3.0)));
        assert_eq!(summary.get("max"), Some(&Value::Float(6.0)));
    }

    #[test]
    fn test_derive_multi_sees_every_version() {
        let map = SortedMap::builder(Arc::new(MemoryStore::default()))
            .max_values_per_key(0)
            .build()
            .unwrap();
        for v in [1i64, 2, 3] {
            map.put_without_get("a", v).unwrap();
        }
        let mapper = OperatorMapper::new(REGEX_FILTER_ID).with_option(OPT_VALUE_REGEX, "^[12]$");
        let multi = map.derive_multi(&mapper).unwrap();
        assert_eq!(multi.size().unwrap(), 2);
        let single = map.derive(&mapper).unwrap();
        assert_eq!(single.size().unwrap(), 0);
    }

    #[test]
    fn test_time_filter() {
        let map = SortedMap::in_memory().unwrap();
        map.put("a", 1i64).unwrap();
        let ts = map.get_timestamp("a").unwrap().unwrap();
        map.put("b", 2i64).unwrap();
        map.put("c", 3i64).unwrap();
        let early = map.time_filter(None, Some(ts)).unwrap();
        assert_eq!(early.kind(), ViewKind::Sampled);
        assert_eq!(keys_of(&early), vec![Value::from("a")]);
        let late = map.time_filter(Some(ts + 1), None).unwrap();
        assert_eq!(late.size().unwrap(), 2);
    }

    #[test]
    fn test_dump_format() {
        let map = filled_map(2);
        let mut out = Vec::new();
        map.dump(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "k = 0 : v = 0\nk = 1 : v = 2\n"
        );
    }

    #[test]
    fn test_wait_for() {
        let map = filled_map(3);
        assert_eq!(
            map.wait_for(2i64, Duration::from_millis(10), None).unwrap(),
            Some(Value::Int(4))
        );
        assert_eq!(
            map.wait_for(7i64, Duration::from_millis(20), Some(Duration::from_millis(5)))
                .unwrap(),
            None
        );
    }

    #[test]
    fn test_views_are_shareable_across_threads() {
        let map = filled_map(100);
        let view = map.sample_fraction(0.5).unwrap();
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let view = view.clone();
                thread::spawn(move || view.size().unwrap())
            })
            .collect();
        let sizes: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(sizes.windows(2).all(|w| w[0] == w[1]));
    }
}
