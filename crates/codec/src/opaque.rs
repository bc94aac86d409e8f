//! Opaque MessagePack codec.
//!
//! Round-trips any [`Value`] but gives no ordering guarantee. Useful for
//! values whose byte order does not matter, such as payloads of a map keyed
//! by an order-preserving codec.

use keyspan_core::Value;

use super::traits::{CodecError, ValueCodec};

/// MessagePack codec without envelope or ordering.
#[derive(Debug, Clone, Copy, Default)]
pub struct OpaqueCodec;

impl ValueCodec for OpaqueCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        rmp_serde::to_vec(value).map_err(|e| CodecError::Opaque(e.to_string()))
    }

    fn decode(&self, data: &[u8]) -> Result<Value, CodecError> {
        rmp_serde::from_slice(data).map_err(|e| CodecError::Opaque(e.to_string()))
    }

    fn codec_id(&self) -> &str {
        "opaque"
    }

    fn preserves_order(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opaque_roundtrip() {
        let v = Value::Array(vec![Value::Int(1), Value::from("x"), Value::Null]);
        let bytes = OpaqueCodec.encode(&v).unwrap();
        assert_eq!(OpaqueCodec.decode(&bytes).unwrap(), v);
    }

    #[test]
    fn test_opaque_rejects_garbage() {
        assert!(matches!(
            OpaqueCodec.decode(&[0xc1]),
            Err(CodecError::Opaque(_))
        ));
    }
}
