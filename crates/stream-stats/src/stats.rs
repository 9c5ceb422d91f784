//! Statistics Snapshot

use serde::{Deserialize, Serialize};

/// Sentinel for location statistics before any value was tracked
pub const NO_DATA: f64 = -1.0;

/// Which quantity the `normalized` field carries
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizationConvention {
    /// Min-max scaling of the current value into [0, 1]
    #[default]
    MinMax,
    /// Median absolute deviation of the window
    Mad,
}

/// Running statistics for one feature after its latest update
///
/// Never contains NaN or infinity. Before any value has been tracked the
/// location fields (`mean`, `median`, `min`, `max`) hold [`NO_DATA`] and
/// every other field is 0.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Latest tracked value
    pub current: f64,
    /// Window mean
    pub mean: f64,
    /// Population standard deviation
    pub standard_deviation: f64,
    /// Population variance
    pub variance: f64,
    /// (current - mean) / standard deviation
    pub z_score: f64,
    /// Window minimum
    pub min: f64,
    /// Window maximum
    pub max: f64,
    /// Window median
    pub median: f64,
    /// Min-max scaled or MAD value, depending on the convention
    pub normalized: f64,
    /// Median absolute deviation (0 under the min-max convention)
    pub mad: f64,
}

impl Stats {
    /// Snapshot reported before any value has been tracked
    pub const EMPTY: Stats = Stats {
        current: 0.0,
        mean: NO_DATA,
        standard_deviation: 0.0,
        variance: 0.0,
        z_score: 0.0,
        min: NO_DATA,
        max: NO_DATA,
        median: NO_DATA,
        normalized: 0.0,
        mad: 0.0,
    };

    /// Every field 0
    pub const ZERO: Stats = Stats {
        current: 0.0,
        mean: 0.0,
        standard_deviation: 0.0,
        variance: 0.0,
        z_score: 0.0,
        min: 0.0,
        max: 0.0,
        median: 0.0,
        normalized: 0.0,
        mad: 0.0,
    };

    /// Check that every field is finite
    pub fn is_finite(&self) -> bool {
        [
            self.current,
            self.mean,
            self.standard_deviation,
            self.variance,
            self.z_score,
            self.min,
            self.max,
            self.median,
            self.normalized,
            self.mad,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

impl Default for Stats {
    fn default() -> Self {
        Self::EMPTY
    }
}
