//! Size limits for write batches
//!
//! The store enforces these when a batch is submitted. A batch that violates
//! any limit is rejected as a whole; nothing in it is applied.

use crate::types::Mutation;
use thiserror::Error;

/// Size limits for keys, values and batches
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum encoded key length in bytes (default: 1024)
    pub max_key_bytes: usize,

    /// Maximum encoded value length in bytes (default: 16MB)
    pub max_value_bytes: usize,

    /// Maximum number of mutations in one batch (default: 1M)
    pub max_batch_mutations: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_key_bytes: 1024,
            max_value_bytes: 16 * 1024 * 1024,
            max_batch_mutations: 1_000_000,
        }
    }
}

impl Limits {
    /// Create limits with small values for testing
    pub fn with_small_limits() -> Self {
        Limits {
            max_key_bytes: 100,
            max_value_bytes: 1000,
            max_batch_mutations: 100,
        }
    }

    /// Validate one mutation
    pub fn validate_mutation(&self, mutation: &Mutation) -> Result<(), LimitError> {
        let key_len = mutation.key().len();
        if key_len > self.max_key_bytes {
            return Err(LimitError::KeyTooLong {
                actual: key_len,
                max: self.max_key_bytes,
            });
        }
        if let Mutation::Put { value, .. } = mutation {
            if value.len() > self.max_value_bytes {
                return Err(LimitError::ValueTooLarge {
                    actual: value.len(),
                    max: self.max_value_bytes,
                });
            }
        }
        Ok(())
    }

    /// Validate a whole batch
    pub fn validate_batch(&self, mutations: &[Mutation]) -> Result<(), LimitError> {
        if mutations.len() > self.max_batch_mutations {
            return Err(LimitError::BatchTooLarge {
                actual: mutations.len(),
                max: self.max_batch_mutations,
            });
        }
        mutations
            .iter()
            .try_for_each(|m| self.validate_mutation(m))
    }
}

/// Limit violations
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LimitError {
    /// Key exceeds maximum length
    #[error("key too long: {actual} bytes exceeds maximum {max}")]
    KeyTooLong {
        /// Actual key length
        actual: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Value exceeds maximum size
    #[error("value too large: {actual} bytes exceeds maximum {max}")]
    ValueTooLarge {
        /// Actual value size
        actual: usize,
        /// Maximum allowed
        max: usize,
    },

    /// Batch holds too many mutations
    #[error("batch too large: {actual} mutations exceeds maximum {max}")]
    BatchTooLarge {
        /// Actual mutation count
        actual: usize,
        /// Maximum allowed
        max: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn put(key_len: usize, value_len: usize) -> Mutation {
        Mutation::Put {
            key: vec![b'k'; key_len],
            value: vec![b'v'; value_len],
        }
    }

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_key_bytes, 1024);
        assert_eq!(limits.max_value_bytes, 16 * 1024 * 1024);
    }

    #[test]
    fn test_key_at_limit_is_valid() {
        let limits = Limits::with_small_limits();
        assert!(limits.validate_mutation(&put(100, 1)).is_ok());
    }

    #[test]
    fn test_key_over_limit() {
        let limits = Limits::with_small_limits();
        let err = limits.validate_mutation(&put(101, 1)).unwrap_err();
        assert_eq!(err, LimitError::KeyTooLong { actual: 101, max: 100 });
    }

    #[test]
    fn test_value_over_limit() {
        let limits = Limits::with_small_limits();
        let err = limits.validate_mutation(&put(1, 1001)).unwrap_err();
        assert!(matches!(err, LimitError::ValueTooLarge { .. }));
    }

    #[test]
    fn test_delete_ignores_value_limit() {
        let limits = Limits::with_small_limits();
        let m = Mutation::Delete { key: vec![1; 10] };
        assert!(limits.validate_mutation(&m).is_ok());
    }

    #[test]
    fn test_batch_too_large() {
        let limits = Limits::with_small_limits();
        let batch: Vec<Mutation> = (0..101).map(|_| put(1, 1)).collect();
        assert!(matches!(
            limits.validate_batch(&batch),
            Err(LimitError::BatchTooLarge { actual: 101, max: 100 })
        ));
    }

    #[test]
    fn test_error_messages() {
        let err = LimitError::KeyTooLong { actual: 5, max: 4 };
        assert!(err.to_string().contains("key too long"));
    }
}
