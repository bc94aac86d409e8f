//! Order-preserving fixed-point codec.
//!
//! Every encoding is an envelope `[version, tag, payload...]`:
//!
//! | Tag | Meaning | Payload |
//! |-----|---------|---------|
//! | `a` | raw bytes | passthrough |
//! | `f` | fixed-point number | 8-byte biased integer part, plus an 8-byte scaled fraction for floats |
//! | `o` | generic object | MessagePack of the value, no ordering guarantee |
//! | `s` | UTF-8 string | passthrough bytes |
//!
//! The integer part of a number is `floor(n)` with the sign bit flipped
//! (equivalently `n + 2^63` as an unsigned word), so big-endian byte order
//! equals numeric order over the whole `i64` range. Floats add a second word
//! holding `round(i64::MAX * (n - floor(n)))`.
//!
//! Floats outside the `i64` range, NaN and infinities fall back to the
//! generic object envelope. Comparisons between `o` envelopes are undefined,
//! and only the `a`, `f` and `s` layouts are meant to be read by other
//! implementations.

use byteorder::{BigEndian, ByteOrder};
use keyspan_core::Value;

use super::traits::{CodecError, ValueCodec};

/// Envelope version written in byte 0
pub const VERSION0: u8 = 0;
/// Raw byte array tag
pub const TAG_BYTES: u8 = b'a';
/// Fixed-point number tag
pub const TAG_FIXED_POINT: u8 = b'f';
/// Generic object tag
pub const TAG_OBJECT: u8 = b'o';
/// UTF-8 string tag
pub const TAG_UTF8: u8 = b's';

const SIGN_BIT: u64 = 0x8000_0000_0000_0000;
const HEADER_LEN: usize = 2;
const WORD_LEN: usize = 8;

/// Order-preserving codec for numbers, strings and bytes.
///
/// # Example
///
/// ```
/// use keyspan_codec::{FixedPointCodec, ValueCodec};
/// use keyspan_core::Value;
///
/// let codec = FixedPointCodec;
/// let a = codec.encode(&Value::Int(-5)).unwrap();
/// let b = codec.encode(&Value::Int(5)).unwrap();
/// assert!(a < b);
/// assert_eq!(codec.decode(&b).unwrap(), Value::Int(5));
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPointCodec;

impl FixedPointCodec {
    fn envelope(tag: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
        out.push(VERSION0);
        out.push(tag);
        out.extend_from_slice(payload);
        out
    }

    fn push_word(out: &mut Vec<u8>, word: u64) {
        let mut buf = [0u8; WORD_LEN];
        BigEndian::write_u64(&mut buf, word);
        out.extend_from_slice(&buf);
    }

    fn encode_int(i: i64) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + WORD_LEN);
        out.push(VERSION0);
        out.push(TAG_FIXED_POINT);
        Self::push_word(&mut out, (i as u64) ^ SIGN_BIT);
        out
    }

    fn encode_float(f: f64) -> Vec<u8> {
        let floor = f.floor();
        let int_part = floor as i64;
        // f - floor(f) is exact; -0.0 lands on a zero fraction like 0.0
        let frac = f - int_part as f64;
        let scaled = (i64::MAX as f64 * frac).round() as i64;

        let mut out = Vec::with_capacity(HEADER_LEN + 2 * WORD_LEN);
        out.push(VERSION0);
        out.push(TAG_FIXED_POINT);
        Self::push_word(&mut out, (int_part as u64) ^ SIGN_BIT);
        Self::push_word(&mut out, scaled as u64);
        out
    }

    /// True when the float can be represented as fixed point
    fn in_fixed_point_range(f: f64) -> bool {
        f >= i64::MIN as f64 && f <= i64::MAX as f64
    }

    fn encode_opaque(value: &Value) -> Result<Vec<u8>, CodecError> {
        let payload = rmp_serde::to_vec(value).map_err(|e| CodecError::Opaque(e.to_string()))?;
        Ok(Self::envelope(TAG_OBJECT, &payload))
    }

    fn decode_fixed_point(payload: &[u8]) -> Result<Value, CodecError> {
        match payload.len() {
            WORD_LEN => {
                let int_part = (BigEndian::read_u64(payload) ^ SIGN_BIT) as i64;
                Ok(Value::Int(int_part))
            }
            len if len == 2 * WORD_LEN => {
                let int_part = (BigEndian::read_u64(&payload[..WORD_LEN]) ^ SIGN_BIT) as i64;
                let scaled = BigEndian::read_u64(&payload[WORD_LEN..]) as i64;
                let frac = scaled as f64 / i64::MAX as f64;
                Ok(Value::Float(int_part as f64 + frac))
            }
            len if len < WORD_LEN => Err(CodecError::Truncated {
                expected: WORD_LEN,
                actual: len,
            }),
            len => Err(CodecError::Truncated {
                expected: 2 * WORD_LEN,
                actual: len,
            }),
        }
    }
}

impl ValueCodec for FixedPointCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        match value {
            Value::String(s) => Ok(Self::envelope(TAG_UTF8, s.as_bytes())),
            Value::Int(i) => Ok(Self::encode_int(*i)),
            Value::Float(f) if Self::in_fixed_point_range(*f) => Ok(Self::encode_float(*f)),
            Value::Bytes(b) => Ok(Self::envelope(TAG_BYTES, b)),
            other => Self::encode_opaque(other),
        }
    }

    fn decode(&self, data: &[u8]) -> Result<Value, CodecError> {
        if data.len() < HEADER_LEN {
            return Err(CodecError::Truncated {
                expected: HEADER_LEN,
                actual: data.len(),
            });
        }
        if data[0] != VERSION0 {
            return Err(CodecError::UnsupportedVersion(data[0]));
        }
        let payload = &data[HEADER_LEN..];
        match data[1] {
            TAG_BYTES => Ok(Value::Bytes(payload.to_vec())),
            TAG_FIXED_POINT => Self::decode_fixed_point(payload),
            TAG_OBJECT => {
                rmp_serde::from_slice(payload).map_err(|e| CodecError::Opaque(e.to_string()))
            }
            TAG_UTF8 => String::from_utf8(payload.to_vec())
                .map(Value::String)
                .map_err(|_| CodecError::InvalidUtf8),
            tag => Err(CodecError::UnknownTypeTag(tag)),
        }
    }

    fn codec_id(&self) -> &str {
        "fixed_point"
    }

    fn preserves_order(&self) -> bool {
        true
    }
}
