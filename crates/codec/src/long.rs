//! Fixed 8-byte integer codec.
//!
//! Encodes integers as 8-byte big-endian two's complement words. This is the
//! wire format of `count` and `checksum` partial aggregates. Negative values
//! sort after positive ones, so the codec is not order-preserving.

use byteorder::{BigEndian, ByteOrder};
use keyspan_core::Value;

use super::traits::{CodecError, ValueCodec};

const WORD_LEN: usize = 8;

/// 8-byte big-endian `i64` codec.
///
/// Floats are truncated toward zero and strings are parsed as decimal
/// integers before encoding.
#[derive(Debug, Clone, Copy, Default)]
pub struct LongCodec;

impl LongCodec {
    /// Encode an `i64` directly
    pub fn encode_i64(value: i64) -> Vec<u8> {
        let mut buf = vec![0u8; WORD_LEN];
        BigEndian::write_i64(&mut buf, value);
        buf
    }

    /// Decode an `i64` directly
    pub fn decode_i64(data: &[u8]) -> Result<i64, CodecError> {
        if data.len() != WORD_LEN {
            return Err(CodecError::Truncated {
                expected: WORD_LEN,
                actual: data.len(),
            });
        }
        Ok(BigEndian::read_i64(data))
    }
}

impl ValueCodec for LongCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let unsupported = || CodecError::UnsupportedValue {
            codec: self.codec_id().to_string(),
            type_name: value.type_name(),
        };
        let n = match value {
            Value::Int(i) => *i,
            Value::Float(f) if f.is_finite() => *f as i64,
            Value::String(s) => s.trim().parse::<i64>().map_err(|_| unsupported())?,
            _ => return Err(unsupported()),
        };
        Ok(Self::encode_i64(n))
    }

    fn decode(&self, data: &[u8]) -> Result<Value, CodecError> {
        Self::decode_i64(data).map(Value::Int)
    }

    fn codec_id(&self) -> &str {
        "long"
    }

    fn preserves_order(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_layout() {
        assert_eq!(LongCodec::encode_i64(1), vec![0, 0, 0, 0, 0, 0, 0, 1]);
        assert_eq!(LongCodec::encode_i64(-1), vec![0xff; 8]);
    }

    #[test]
    fn test_long_roundtrip() {
        let codec = LongCodec;
        for i in [i64::MIN, -7, 0, 1000, i64::MAX] {
            let bytes = codec.encode(&Value::Int(i)).unwrap();
            assert_eq!(codec.decode(&bytes).unwrap(), Value::Int(i));
        }
    }

    #[test]
    fn test_long_coerces_float_and_string() {
        let codec = LongCodec;
        assert_eq!(codec.encode(&Value::Float(3.9)).unwrap(), LongCodec::encode_i64(3));
        assert_eq!(codec.encode(&Value::from(" 42 ")).unwrap(), LongCodec::encode_i64(42));
    }

    #[test]
    fn test_long_rejects_other_values() {
        let codec = LongCodec;
        assert!(matches!(
            codec.encode(&Value::Bool(true)),
            Err(CodecError::UnsupportedValue { type_name: "Bool", .. })
        ));
        assert!(codec.encode(&Value::from("abc")).is_err());
    }

    #[test]
    fn test_long_decode_wrong_length() {
        assert!(matches!(
            LongCodec.decode(&[1, 2, 3]),
            Err(CodecError::Truncated { expected: 8, actual: 3 })
        ));
    }
}
