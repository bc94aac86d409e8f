//! Operator registry
//!
//! Maps operator ids to a descriptor and a factory. The store resolves
//! installed [`OperatorSetting`]s through a registry; the client consults
//! the same descriptors to type-check a stack before any scan is opened.
//!
//! ## Usage
//!
//! ```
//! use keyspan_operators::{OperatorConfig, OperatorRegistry, OperatorSetting, COUNT_ID};
//!
//! let registry = OperatorRegistry::with_builtins();
//! let setting = OperatorSetting::new(COUNT_ID, 100, OperatorConfig::new());
//! let mut op = registry.build(&setting).unwrap();
//! assert!(op.process(Vec::new()).unwrap().is_empty());
//! ```

use std::fmt;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tracing::trace;

use crate::aggregate::{ChecksumAggregator, CountAggregator, StatsAggregator, CHECKSUM_ID, COUNT_ID, STATS_ID};
use crate::error::{OperatorError, Result};
use crate::filters::{RegexFilter, REGEX_FILTER_ID};
use crate::operator::{
    OperatorConfig, OperatorDescriptor, OperatorKind, OperatorSetting, PushdownOperator, ValueType,
};
use crate::sampling::{SamplingFilter, SAMPLING_ID};
use crate::transforms::{KeyToKey, RowStats, KEY_TO_KEY_ID, ROW_STATS_ID};

/// Builds an operator instance from its options
pub type OperatorFactory =
    Arc<dyn Fn(&OperatorConfig) -> Result<Box<dyn PushdownOperator>> + Send + Sync>;

/// Wrap a typed constructor as an [`OperatorFactory`]
pub fn operator_factory<F, O>(build: F) -> OperatorFactory
where
    F: Fn(&OperatorConfig) -> Result<O> + Send + Sync + 'static,
    O: PushdownOperator + 'static,
{
    Arc::new(
        move |config: &OperatorConfig| -> Result<Box<dyn PushdownOperator>> {
            Ok(Box::new(build(config)?))
        },
    )
}

struct RegisteredOperator {
    descriptor: OperatorDescriptor,
    factory: OperatorFactory,
}

/// Registry of pushdown operators by id
#[derive(Default)]
pub struct OperatorRegistry {
    operators: FxHashMap<String, RegisteredOperator>,
}

impl fmt::Debug for OperatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorRegistry")
            .field("ids", &self.ids())
            .finish()
    }
}

impl OperatorRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every built-in operator
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let decodable = [ValueType::Typed, ValueType::Long];

        registry.register(
            OperatorDescriptor::new(SAMPLING_ID, OperatorKind::Filter, &[], None),
            operator_factory(SamplingFilter::from_config),
        );
        registry.register(
            OperatorDescriptor::new(REGEX_FILTER_ID, OperatorKind::Filter, &decodable, None),
            operator_factory(RegexFilter::from_config),
        );
        registry.register(
            OperatorDescriptor::new(
                KEY_TO_KEY_ID,
                OperatorKind::Transform,
                &[],
                Some(ValueType::Typed),
            ),
            operator_factory(KeyToKey::from_config),
        );
        registry.register(
            OperatorDescriptor::new(
                ROW_STATS_ID,
                OperatorKind::RowTransform,
                &decodable,
                Some(ValueType::Summary),
            ),
            operator_factory(RowStats::from_config),
        );
        registry.register(
            OperatorDescriptor::new(COUNT_ID, OperatorKind::Aggregate, &[], Some(ValueType::Long)),
            operator_factory(|_| Ok(CountAggregator)),
        );
        registry.register(
            OperatorDescriptor::new(
                CHECKSUM_ID,
                OperatorKind::Aggregate,
                &decodable,
                Some(ValueType::Long),
            ),
            operator_factory(ChecksumAggregator::from_config),
        );
        registry.register(
            OperatorDescriptor::new(
                STATS_ID,
                OperatorKind::Aggregate,
                &decodable,
                Some(ValueType::Summary),
            ),
            operator_factory(StatsAggregator::from_config),
        );
        registry
    }

    /// Register an operator, replacing any previous one with the same id
    pub fn register(&mut self, descriptor: OperatorDescriptor, factory: OperatorFactory) {
        self.operators.insert(
            descriptor.id.clone(),
            RegisteredOperator {
                descriptor,
                factory,
            },
        );
    }

    /// Descriptor of a registered operator
    pub fn descriptor(&self, id: &str) -> Result<&OperatorDescriptor> {
        self.operators
            .get(id)
            .map(|r| &r.descriptor)
            .ok_or_else(|| OperatorError::UnknownOperator(id.to_string()))
    }

    /// Instantiate an installed operator
    pub fn build(&self, setting: &OperatorSetting) -> Result<Box<dyn PushdownOperator>> {
        let registered = self
            .operators
            .get(&setting.id)
            .ok_or_else(|| OperatorError::UnknownOperator(setting.id.clone()))?;
        trace!(operator = %setting.id, priority = setting.priority, "building operator");
        (registered.factory)(&setting.config)
    }

    /// Check if an id is registered
    pub fn contains(&self, id: &str) -> bool {
        self.operators.contains_key(id)
    }

    /// All registered ids, sorted
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.operators.keys().cloned().collect();
        ids.sort();
        ids
    }
}
