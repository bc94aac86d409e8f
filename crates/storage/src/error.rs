//! Error types for the store boundary

use keyspan_core::LimitError;
use keyspan_operators::OperatorError;
use thiserror::Error;

/// Result type alias for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors surfaced by a [`crate::Store`]
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// The store refused a write batch; nothing in it was applied
    #[error("Write batch rejected: {reason}")]
    Rejected {
        /// Why the batch was refused
        reason: String,
    },

    /// A partition cannot run an installed operator
    #[error("Operator {operator} is not available on partition {partition}")]
    MissingCapability {
        /// Operator id
        operator: String,
        /// Index of the partition in key order
        partition: usize,
    },

    /// Two operators on one scan share a priority
    #[error("Priority {priority} is already taken by {existing}; cannot install {operator}")]
    DuplicatePriority {
        /// Contested priority
        priority: u32,
        /// Operator already holding it
        existing: String,
        /// Operator being installed
        operator: String,
    },

    /// An operator failed to build or run
    #[error("Operator error: {0}")]
    Operator(#[from] OperatorError),
}

impl From<LimitError> for StoreError {
    fn from(e: LimitError) -> Self {
        StoreError::Rejected {
            reason: e.to_string(),
        }
    }
}
