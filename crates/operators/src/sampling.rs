//! Deterministic hash-range sampling
//!
//! A key is admitted when `SHA-256(seed || key)` falls between two hash
//! points derived from the configured fractions. Admission depends only on
//! the seed, the fractions and the key bytes, so the same descriptor picks
//! the same keys on any range, partition layout or repeated scan.
//!
//! The upper bound is exclusive except when `to_fraction == 1`, where the
//! all-ones hash point is admitted too. That is the only way a digest equal
//! to the top of the hash range can be selected.

use rand::RngCore;
use sha2::{Digest, Sha256};

use keyspan_core::{Entry, Timestamp};

use crate::error::{OperatorError, Result};
use crate::operator::{parse_option, required_option, OperatorConfig, PushdownOperator};

/// Registered id of the sampling filter
pub const SAMPLING_ID: &str = "sampling";

/// Lower hash fraction, inclusive
pub const OPT_FROM_FRACTION: &str = "from_fraction";
/// Upper hash fraction, exclusive unless 1
pub const OPT_TO_FRACTION: &str = "to_fraction";
/// Seed prepended to every key before hashing
pub const OPT_SEED: &str = "seed";
/// Oldest admitted timestamp, inclusive
pub const OPT_FROM_TS: &str = "from_ts";
/// Newest admitted timestamp, inclusive
pub const OPT_TO_TS: &str = "to_ts";

/// Digest length of SHA-256
pub const DIGEST_LEN: usize = 32;

const RANDOM_SEED_BYTES: usize = 20;

/// Map a fraction in `[0, 1]` to an `n`-byte big-endian point.
///
/// The result is `floor(fraction * (2^(8n) - 1))`, built one byte at a time:
/// each byte receives `fraction * 255` plus the carried remainder of the
/// byte before it, and overflow carries back into the more significant
/// bytes.
pub fn hash_point(len: usize, fraction: f64) -> Vec<u8> {
    let mut digits = vec![0u32; len];
    let mut remainder = 0.0f64;
    for digit in digits.iter_mut() {
        let product = fraction * 255.0 + remainder * 256.0;
        let int_part = product.floor();
        remainder = product - int_part;
        *digit = int_part as u32;
    }

    let mut carry = 0u32;
    for digit in digits.iter_mut().rev() {
        let total = *digit + carry;
        *digit = total & 0xff;
        carry = total >> 8;
    }
    if carry > 0 {
        return vec![0xff; len];
    }
    digits.into_iter().map(|d| d as u8).collect()
}

/// Hex string of 20 random bytes
pub fn random_seed() -> String {
    let mut bytes = [0u8; RANDOM_SEED_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

// ============================================================================
// SampleDescriptor
// ============================================================================

/// Immutable description of a sample
#[derive(Debug, Clone, PartialEq)]
pub struct SampleDescriptor {
    seed: String,
    from_fraction: f64,
    to_fraction: f64,
    from_ts: Option<Timestamp>,
    to_ts: Option<Timestamp>,
}

impl SampleDescriptor {
    /// Sample the hash range `[from_fraction, to_fraction)` under `seed`
    pub fn new(seed: impl Into<String>, from_fraction: f64, to_fraction: f64) -> Result<Self> {
        validate_fraction(OPT_FROM_FRACTION, from_fraction)?;
        validate_fraction(OPT_TO_FRACTION, to_fraction)?;
        Ok(Self {
            seed: seed.into(),
            from_fraction,
            to_fraction,
            from_ts: None,
            to_ts: None,
        })
    }

    /// Sample roughly `fraction` of the keys under a fresh random seed
    pub fn with_fraction(fraction: f64) -> Result<Self> {
        Self::new(random_seed(), 0.0, fraction)
    }

    /// Admit every key; combine with [`SampleDescriptor::with_time_range`]
    /// for a pure timestamp filter
    pub fn full_range() -> Self {
        Self {
            seed: String::new(),
            from_fraction: 0.0,
            to_fraction: 1.0,
            from_ts: None,
            to_ts: None,
        }
    }

    /// Restrict admission to timestamps in `[from_ts, to_ts]`
    pub fn with_time_range(mut self, from_ts: Option<Timestamp>, to_ts: Option<Timestamp>) -> Self {
        self.from_ts = from_ts;
        self.to_ts = to_ts;
        self
    }

    /// Sampling seed
    pub fn seed(&self) -> &str {
        &self.seed
    }

    /// Lower hash fraction
    pub fn from_fraction(&self) -> f64 {
        self.from_fraction
    }

    /// Upper hash fraction
    pub fn to_fraction(&self) -> f64 {
        self.to_fraction
    }

    /// Oldest admitted timestamp
    pub fn from_ts(&self) -> Option<Timestamp> {
        self.from_ts
    }

    /// Newest admitted timestamp
    pub fn to_ts(&self) -> Option<Timestamp> {
        self.to_ts
    }

    /// Wire form of the descriptor
    pub fn to_config(&self) -> OperatorConfig {
        let mut config = OperatorConfig::new();
        config.insert(OPT_SEED.to_string(), self.seed.clone());
        config.insert(OPT_FROM_FRACTION.to_string(), self.from_fraction.to_string());
        config.insert(OPT_TO_FRACTION.to_string(), self.to_fraction.to_string());
        if let Some(ts) = self.from_ts {
            config.insert(OPT_FROM_TS.to_string(), ts.to_string());
        }
        if let Some(ts) = self.to_ts {
            config.insert(OPT_TO_TS.to_string(), ts.to_string());
        }
        config
    }

    /// Rebuild a descriptor from its wire form
    pub fn from_config(config: &OperatorConfig) -> Result<Self> {
        let seed = required_option(config, SAMPLING_ID, OPT_SEED)?;
        required_option(config, SAMPLING_ID, OPT_FROM_FRACTION)?;
        required_option(config, SAMPLING_ID, OPT_TO_FRACTION)?;
        let from_fraction = parse_option::<f64>(config, OPT_FROM_FRACTION)?.unwrap_or(0.0);
        let to_fraction = parse_option::<f64>(config, OPT_TO_FRACTION)?.unwrap_or(1.0);
        Ok(Self::new(seed, from_fraction, to_fraction)?.with_time_range(
            parse_option(config, OPT_FROM_TS)?,
            parse_option(config, OPT_TO_TS)?,
        ))
    }
}

fn validate_fraction(option: &str, fraction: f64) -> Result<()> {
    if (0.0..=1.0).contains(&fraction) {
        Ok(())
    } else {
        Err(OperatorError::InvalidOption {
            option: option.to_string(),
            value: fraction.to_string(),
            reason: "fraction must lie in [0, 1]".to_string(),
        })
    }
}

// ============================================================================
// SamplingFilter
// ============================================================================

/// Stateless admission test built from a [`SampleDescriptor`].
///
/// Hash points are computed once here, never per key.
#[derive(Debug, Clone)]
pub struct SamplingFilter {
    seed: Vec<u8>,
    lo: Vec<u8>,
    hi: Vec<u8>,
    inclusive_top: bool,
    from_ts: Option<Timestamp>,
    to_ts: Option<Timestamp>,
}

impl SamplingFilter {
    /// Build the filter
    pub fn new(descriptor: &SampleDescriptor) -> Self {
        Self {
            seed: descriptor.seed.as_bytes().to_vec(),
            lo: hash_point(DIGEST_LEN, descriptor.from_fraction),
            hi: hash_point(DIGEST_LEN, descriptor.to_fraction),
            inclusive_top: descriptor.to_fraction == 1.0,
            from_ts: descriptor.from_ts,
            to_ts: descriptor.to_ts,
        }
    }

    /// Build the filter from operator options
    pub fn from_config(config: &OperatorConfig) -> Result<Self> {
        Ok(Self::new(&SampleDescriptor::from_config(config)?))
    }

    /// Seeded digest of a key
    pub fn digest(&self, key: &[u8]) -> [u8; DIGEST_LEN] {
        let mut hasher = Sha256::new();
        hasher.update(&self.seed);
        hasher.update(key);
        let mut out = [0u8; DIGEST_LEN];
        out.copy_from_slice(&hasher.finalize());
        out
    }

    /// Decide whether an entry with this key and timestamp is in the sample
    pub fn admit(&self, key: &[u8], timestamp: Timestamp) -> bool {
        if self.from_ts.map_or(false, |min| timestamp < min) {
            return false;
        }
        if self.to_ts.map_or(false, |max| timestamp > max) {
            return false;
        }
        let h = self.digest(key);
        let (h, lo, hi) = (h.as_slice(), self.lo.as_slice(), self.hi.as_slice());
        h >= lo && (h < hi || (self.inclusive_top && h == hi))
    }
}

impl PushdownOperator for SamplingFilter {
    fn process(&mut self, entries: Vec<Entry>) -> Result<Vec<Entry>> {
        Ok(entries
            .into_iter()
            .filter(|e| self.admit(&e.key, e.timestamp))
            .collect())
    }
}
