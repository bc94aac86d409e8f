//! Error types for map views
//!
//! Every failure reaching a caller is one of these variants. Lower-layer
//! errors are folded in through `From`, so `?` works across the codec,
//! operator and store crates.

use keyspan_codec::CodecError;
use keyspan_operators::OperatorError;
use keyspan_storage::StoreError;
use thiserror::Error;

/// Result type alias for map operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by containers and views
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Bytes could not be decoded (or a value could not be encoded)
    #[error("Decode error: {0}")]
    Decode(#[from] CodecError),

    /// The store refused a write batch. The batch is gone; open a new one
    /// to retry.
    #[error("Write rejected: {reason}")]
    WriteRejected {
        /// Store-provided reason
        reason: String,
    },

    /// A mutation was attempted through a derived view
    #[error("View is read-only: cannot {operation}")]
    ReadOnly {
        /// Rejected operation
        operation: &'static str,
    },

    /// A partition cannot run a requested operator
    #[error("Operator {operator} is not available on partition {partition}")]
    MissingCapability {
        /// Operator id
        operator: String,
        /// Partition index
        partition: usize,
    },

    /// Invalid configuration or operator stack
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A batch writer is already open on this container
    #[error("A write batch is already open on this container")]
    BatchInProgress,

    /// Writing output failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Any other store failure
    #[error("Store error: {0}")]
    Store(StoreError),
}

impl From<OperatorError> for Error {
    fn from(e: OperatorError) -> Self {
        match e {
            OperatorError::Codec(c) => Error::Decode(c),
            other => Error::Configuration(other.to_string()),
        }
    }
}

impl From<StoreError> for Error {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Rejected { reason } => Error::WriteRejected { reason },
            StoreError::MissingCapability {
                operator,
                partition,
            } => Error::MissingCapability {
                operator,
                partition,
            },
            StoreError::Operator(op) => op.into(),
            other @ StoreError::DuplicatePriority { .. } => Error::Store(other),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e.to_string())
    }
}

impl Error {
    /// True for errors that leave the store untouched and can be retried
    /// with a fresh batch
    pub fn is_write_rejection(&self) -> bool {
        matches!(self, Error::WriteRejected { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyspan_core::LimitError;
    use keyspan_operators::ValueType;

    #[test]
    fn test_store_rejection_maps_to_write_rejected() {
        let store_err: StoreError = LimitError::BatchTooLarge { actual: 2, max: 1 }.into();
        let err: Error = store_err.into();
        assert!(err.is_write_rejection());
    }

    #[test]
    fn test_missing_capability_passes_through() {
        let err: Error = StoreError::MissingCapability {
            operator: "count".to_string(),
            partition: 1,
        }
        .into();
        assert_eq!(
            err,
            Error::MissingCapability {
                operator: "count".to_string(),
                partition: 1
            }
        );
    }

    #[test]
    fn test_operator_codec_error_is_decode() {
        let err: Error = StoreError::Operator(OperatorError::Codec(CodecError::InvalidUtf8)).into();
        assert_eq!(err, Error::Decode(CodecError::InvalidUtf8));
    }

    #[test]
    fn test_incompatible_input_is_configuration() {
        let err: Error = OperatorError::IncompatibleInput {
            operator: "stats".to_string(),
            input: ValueType::Summary,
        }
        .into();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_read_only_message() {
        let err = Error::ReadOnly { operation: "put" };
        assert_eq!(err.to_string(), "View is read-only: cannot put");
    }
}
