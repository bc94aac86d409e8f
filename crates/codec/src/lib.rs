//! Value codecs.
//!
//! A codec turns typed [`keyspan_core::Value`]s into the bytes the store
//! sorts and back. Codecs are looked up by string identifier so a pushdown
//! operator running next to the data can decode with the same codec as the
//! client that configured it.
//!
//! # Known Codecs
//!
//! - `"fixed_point"`: order-preserving tagged envelope (default)
//! - `"long"`: 8-byte big-endian integers
//! - `"opaque"`: MessagePack, no ordering
//!
//! # Usage
//!
//! ```
//! use keyspan_codec::get_codec;
//! use keyspan_core::Value;
//!
//! let codec = get_codec("fixed_point").unwrap();
//! let encoded = codec.encode(&Value::from("hello")).unwrap();
//! assert_eq!(codec.decode(&encoded).unwrap(), Value::from("hello"));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

mod fixed_point;
mod long;
mod opaque;
mod traits;

use std::sync::Arc;

pub use fixed_point::{FixedPointCodec, TAG_BYTES, TAG_FIXED_POINT, TAG_OBJECT, TAG_UTF8, VERSION0};
pub use long::LongCodec;
pub use opaque::OpaqueCodec;
pub use traits::{CodecError, ValueCodec};

/// Identifier of the default codec for keys and values
pub const DEFAULT_CODEC_ID: &str = "fixed_point";

/// Get a codec by its identifier.
///
/// Returns the codec if recognized, or an error for unknown codec IDs.
pub fn get_codec(codec_id: &str) -> Result<Arc<dyn ValueCodec>, CodecError> {
    match codec_id {
        "fixed_point" => Ok(Arc::new(FixedPointCodec)),
        "long" => Ok(Arc::new(LongCodec)),
        "opaque" => Ok(Arc::new(OpaqueCodec)),
        _ => Err(CodecError::UnknownCodec(codec_id.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_known_codecs() {
        for id in ["fixed_point", "long", "opaque"] {
            let codec = get_codec(id).unwrap();
            assert_eq!(codec.codec_id(), id);
        }
    }

    #[test]
    fn test_get_unknown_codec() {
        let result = get_codec("java");
        assert!(matches!(result, Err(CodecError::UnknownCodec(_))));
    }

    #[test]
    fn test_default_codec_preserves_order() {
        assert!(get_codec(DEFAULT_CODEC_ID).unwrap().preserves_order());
    }
}
