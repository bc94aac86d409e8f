//! Error types for pushdown operators

use crate::operator::ValueType;
use keyspan_codec::CodecError;
use thiserror::Error;

/// Result type alias for operator operations
pub type Result<T> = std::result::Result<T, OperatorError>;

/// Errors raised while building or running an operator
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OperatorError {
    /// A required configuration key is absent
    #[error("Operator {operator} is missing option '{option}'")]
    MissingOption {
        /// Operator id
        operator: String,
        /// Option key
        option: &'static str,
    },

    /// A configuration value could not be parsed or is out of range
    #[error("Invalid option '{option}' = '{value}': {reason}")]
    InvalidOption {
        /// Option key
        option: String,
        /// Raw option value
        value: String,
        /// What was wrong with it
        reason: String,
    },

    /// Decoding or encoding an entry failed
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),

    /// No operator is registered under this id
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),

    /// The operator cannot consume the values produced below it in the stack
    #[error("Operator {operator} cannot consume {input:?} values")]
    IncompatibleInput {
        /// Operator id
        operator: String,
        /// Value type produced by the parent view
        input: ValueType,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_option_message() {
        let err = OperatorError::MissingOption {
            operator: "sampling".to_string(),
            option: "seed",
        };
        let msg = err.to_string();
        assert!(msg.contains("sampling"));
        assert!(msg.contains("seed"));
    }

    #[test]
    fn test_codec_error_converts() {
        let err: OperatorError = CodecError::InvalidUtf8.into();
        assert!(matches!(err, OperatorError::Codec(CodecError::InvalidUtf8)));
    }
}
