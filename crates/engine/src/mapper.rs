//! Derived mappers
//!
//! A [`DerivedMapper`] names a registered operator plus the options and
//! output codec to stack it with. The engine fills in the codec options
//! (`key_codec`, `value_input_codec`, `value_output_codec`) that the caller
//! left unset, so the operator decodes with the same codecs as the view it
//! is stacked on.

use std::sync::Arc;

use keyspan_codec::ValueCodec;
use keyspan_operators::OperatorConfig;

/// An operator to stack on a view
pub trait DerivedMapper {
    /// Registered operator id
    fn operator_id(&self) -> &str;

    /// Operator options
    fn options(&self) -> OperatorConfig {
        OperatorConfig::new()
    }

    /// Codec of the operator's typed output; `None` keeps the map's value
    /// codec
    fn output_codec(&self) -> Option<Arc<dyn ValueCodec>> {
        None
    }
}

/// A mapper built from plain parts
#[derive(Debug, Clone)]
pub struct OperatorMapper {
    operator_id: String,
    options: OperatorConfig,
    output_codec: Option<Arc<dyn ValueCodec>>,
}

impl OperatorMapper {
    /// Mapper for `operator_id` with no options
    pub fn new(operator_id: impl Into<String>) -> Self {
        Self {
            operator_id: operator_id.into(),
            options: OperatorConfig::new(),
            output_codec: None,
        }
    }

    /// Set one option
    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.insert(key.into(), value.into());
        self
    }

    /// Set the output codec
    pub fn with_output_codec(mut self, codec: Arc<dyn ValueCodec>) -> Self {
        self.output_codec = Some(codec);
        self
    }
}

impl DerivedMapper for OperatorMapper {
    fn operator_id(&self) -> &str {
        &self.operator_id
    }

    fn options(&self) -> OperatorConfig {
        self.options.clone()
    }

    fn output_codec(&self) -> Option<Arc<dyn ValueCodec>> {
        self.output_codec.clone()
    }
}
