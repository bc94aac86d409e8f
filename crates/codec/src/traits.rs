//! Value codec trait definitions.

use keyspan_core::Value;
use std::fmt;

/// Typed value codec.
///
/// Every key and value that crosses the store boundary goes through a codec.
/// The store itself only sees bytes; the codec identity travels with each
/// pushdown operator's configuration so the remote side can decode with the
/// same codec.
///
/// # Thread Safety
///
/// Codecs must be `Send + Sync` so one instance can be shared by every view
/// derived from a container.
///
/// # Codec Identity
///
/// Each codec has a unique identifier. [`crate::get_codec`] resolves an
/// identifier back to a codec instance.
pub trait ValueCodec: Send + Sync + fmt::Debug {
    /// Encode a typed value to bytes.
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    /// Decode bytes produced by [`ValueCodec::encode`].
    ///
    /// Malformed input is an error; a decoder never guesses a value.
    fn decode(&self, data: &[u8]) -> Result<Value, CodecError>;

    /// Unique codec identifier.
    fn codec_id(&self) -> &str;

    /// Whether byte order of encodings matches the natural order of the
    /// values this codec order-preserves (numbers, strings, bytes).
    fn preserves_order(&self) -> bool;
}

/// Codec errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    /// Input ended before the expected payload.
    #[error("Truncated input: expected {expected} bytes, got {actual}")]
    Truncated {
        /// Bytes required
        expected: usize,
        /// Bytes available
        actual: usize,
    },

    /// Envelope version byte is not understood.
    #[error("Unsupported envelope version: {0}")]
    UnsupportedVersion(u8),

    /// Type tag is not one of the known tags.
    #[error("Unknown type tag: 0x{0:02x}")]
    UnknownTypeTag(u8),

    /// String payload is not valid UTF-8.
    #[error("Invalid UTF-8 in string payload")]
    InvalidUtf8,

    /// Generic-object envelope could not be (de)serialized.
    #[error("Opaque envelope error: {0}")]
    Opaque(String),

    /// Codec cannot represent this value.
    #[error("Codec {codec} cannot encode {type_name} value")]
    UnsupportedValue {
        /// Codec identifier
        codec: String,
        /// Value type name
        type_name: &'static str,
    },

    /// Unknown codec identifier.
    #[error("Unknown codec: {0}")]
    UnknownCodec(String),
}
