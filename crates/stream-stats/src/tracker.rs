//! Statistics Tracker

use crate::error::StatsError;
use crate::extrema::ExtremaDeques;
use crate::median::MedianHeaps;
use crate::stats::{NormalizationConvention, Stats};
use history_window::HistoryWindow;
use tracing::{debug, warn};

/// Streaming statistics over the most recent `history_size` values
///
/// Running sum and sum of squares give mean and variance in O(1), monotonic
/// deques give the extrema without rescans, and two heaps maintain the
/// median in O(log H). The running sums are rebuilt from the window once per
/// `history_size` evictions to bound floating-point drift.
#[derive(Debug, Clone)]
pub struct StatisticsTracker {
    /// Bounded FIFO of tracked values
    window: HistoryWindow<f64>,
    /// Running sum of the window
    sum: f64,
    /// Running sum of squares of the window
    sum_of_squares: f64,
    /// Window extrema
    extrema: ExtremaDeques,
    /// Window median
    median: MedianHeaps,
    /// What the `normalized` field carries
    convention: NormalizationConvention,
    /// Evictions since the running sums were last rebuilt
    evictions_since_resync: usize,
    /// Scratch buffer for MAD selection
    scratch: Vec<f64>,
    /// Stats of the most recent update
    last: Stats,
}

impl StatisticsTracker {
    /// Create a tracker keeping the last `history_size` values
    pub fn new(
        history_size: usize,
        convention: NormalizationConvention,
    ) -> Result<Self, StatsError> {
        let window = HistoryWindow::new(history_size)?;
        debug!(
            "Creating statistics tracker: history={}, convention={:?}",
            history_size, convention
        );
        Ok(Self {
            window,
            sum: 0.0,
            sum_of_squares: 0.0,
            extrema: ExtremaDeques::new(),
            median: MedianHeaps::new(),
            convention,
            evictions_since_resync: 0,
            scratch: Vec::new(),
            last: Stats::EMPTY,
        })
    }

    /// Track a new value and return the updated statistics
    pub fn update(&mut self, value: f64) -> Result<Stats, StatsError> {
        if !value.is_finite() {
            return Err(StatsError::InvalidInput(value));
        }

        self.sum += value;
        self.sum_of_squares += value * value;
        self.extrema.push(value);
        self.median.insert(value);

        if let Some(evicted) = self.window.push(value) {
            self.sum -= evicted;
            self.sum_of_squares -= evicted * evicted;
            self.extrema.evict(evicted);
            self.median.remove(evicted);

            self.evictions_since_resync += 1;
            if self.evictions_since_resync >= self.window.capacity() {
                self.resync_sums();
            }
        }

        self.last = self.compute(value);
        Ok(self.last)
    }

    /// Stats of the most recent update, or [`Stats::EMPTY`] before any value
    pub fn get(&self) -> Stats {
        self.last
    }

    /// Forget every tracked value
    pub fn reset(&mut self) {
        self.window.clear();
        self.sum = 0.0;
        self.sum_of_squares = 0.0;
        self.extrema.clear();
        self.median.clear();
        self.evictions_since_resync = 0;
        self.last = Stats::EMPTY;
    }

    /// Number of values in the window
    pub fn len(&self) -> usize {
        self.window.len()
    }

    /// Check if nothing has been tracked
    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    /// Maximum window length
    pub fn capacity(&self) -> usize {
        self.window.capacity()
    }

    /// Active normalization convention
    pub fn convention(&self) -> NormalizationConvention {
        self.convention
    }

    /// Tracked values, oldest first
    pub fn window(&self) -> impl Iterator<Item = f64> + '_ {
        self.window.iter().copied()
    }

    fn resync_sums(&mut self) {
        self.sum = self.window.iter().sum();
        self.sum_of_squares = self.window.iter().map(|v| v * v).sum();
        self.evictions_since_resync = 0;
    }

    fn compute(&mut self, value: f64) -> Stats {
        let n = self.window.len() as f64;
        let mean = self.sum / n;
        let variance = (self.sum_of_squares / n - mean * mean).max(0.0);
        let standard_deviation = variance.sqrt();

        let divisor = if standard_deviation > 0.0 {
            standard_deviation
        } else {
            1.0
        };
        let z_score = (value - mean) / divisor;

        let min = self.extrema.min().unwrap_or(value);
        let max = self.extrema.max().unwrap_or(value);
        let median = self.median.median().unwrap_or(value);

        let (normalized, mad) = match self.convention {
            NormalizationConvention::MinMax => {
                let normalized = if max > min {
                    ((value - min) / (max - min)).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                (normalized, 0.0)
            }
            NormalizationConvention::Mad => {
                let mad = self.median_absolute_deviation(median);
                (mad, mad)
            }
        };

        let stats = Stats {
            current: value,
            mean,
            standard_deviation,
            variance,
            z_score,
            min,
            max,
            median,
            normalized,
            mad,
        };

        if stats.is_finite() {
            stats
        } else {
            // Only reachable when squares overflow for huge magnitudes
            warn!("Non-finite statistics for value {}, dropping dispersion", value);
            Stats {
                mean: finite_or(mean, value),
                standard_deviation: finite_or(standard_deviation, 0.0),
                variance: finite_or(variance, 0.0),
                z_score: finite_or(z_score, 0.0),
                normalized: finite_or(normalized, 0.0),
                mad: finite_or(mad, 0.0),
                ..stats
            }
        }
    }

    /// Median of |x - median| over the window, O(H) by selection
    fn median_absolute_deviation(&mut self, median: f64) -> f64 {
        self.scratch.clear();
        self.scratch
            .extend(self.window.iter().map(|v| (v - median).abs()));
        median_of(&mut self.scratch).unwrap_or(0.0)
    }
}

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

/// Median of an unsorted buffer (reorders it)
fn median_of(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let len = values.len();
    let (lower, upper_mid, _) = values.select_nth_unstable_by(len / 2, f64::total_cmp);
    let upper_mid = *upper_mid;
    if len % 2 == 1 {
        return Some(upper_mid);
    }
    let lower_mid = lower.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    Some((lower_mid + upper_mid) / 2.0)
}
