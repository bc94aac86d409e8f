//! Running numeric summary with an associative merge
//!
//! Each partition builds one [`SummaryStatistics`] from the numeric values it
//! sees. Partials are combined with the pairwise update of Chan et al., so
//! merging in any order yields the summary of the union (up to floating
//! point rounding).

use serde::{Deserialize, Serialize};

/// Count, mean, variance, min, max and sum of a stream of numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryStatistics {
    n: u64,
    mean: f64,
    /// Sum of squared deviations from the mean
    m2: f64,
    min: f64,
    max: f64,
    sum: f64,
}

impl Default for SummaryStatistics {
    fn default() -> Self {
        Self::new()
    }
}

impl SummaryStatistics {
    /// Empty summary
    pub fn new() -> Self {
        Self {
            n: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::NAN,
            max: f64::NAN,
            sum: 0.0,
        }
    }

    /// Add one observation (Welford update)
    pub fn add_value(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (x - self.mean);
        self.sum += x;
        if self.n == 1 {
            self.min = x;
            self.max = x;
        } else {
            self.min = self.min.min(x);
            self.max = self.max.max(x);
        }
    }

    /// Fold another summary into this one
    pub fn merge(&mut self, other: &SummaryStatistics) {
        if other.n == 0 {
            return;
        }
        if self.n == 0 {
            *self = other.clone();
            return;
        }
        let n_a = self.n as f64;
        let n_b = other.n as f64;
        let n = n_a + n_b;
        let delta = other.mean - self.mean;
        self.mean += delta * n_b / n;
        self.m2 += other.m2 + delta * delta * n_a * n_b / n;
        self.n += other.n;
        self.sum += other.sum;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
    }

    /// Merge any number of partial summaries
    pub fn aggregate<'a>(parts: impl IntoIterator<Item = &'a SummaryStatistics>) -> Self {
        parts.into_iter().fold(Self::new(), |mut acc, part| {
            acc.merge(part);
            acc
        })
    }

    /// Number of observations
    pub fn n(&self) -> u64 {
        self.n
    }

    /// Arithmetic mean; NaN when empty
    pub fn mean(&self) -> f64 {
        if self.n == 0 {
            f64::NAN
        } else {
            self.mean
        }
    }

    /// Sample variance (divides by n - 1); 0 for one observation, NaN when empty
    pub fn variance(&self) -> f64 {
        match self.n {
            0 => f64::NAN,
            1 => 0.0,
            n => self.m2 / (n - 1) as f64,
        }
    }

    /// Population variance (divides by n); NaN when empty
    pub fn population_variance(&self) -> f64 {
        if self.n == 0 {
            f64::NAN
        } else {
            self.m2 / self.n as f64
        }
    }

    /// Square root of the sample variance
    pub fn standard_deviation(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Smallest observation; NaN when empty
    pub fn min(&self) -> f64 {
        self.min
    }

    /// Largest observation; NaN when empty
    pub fn max(&self) -> f64 {
        self.max
    }

    /// Sum of observations
    pub fn sum(&self) -> f64 {
        self.sum
    }
}
