//! Streaming Statistics Engine
//!
//! Maintains running statistics (mean, variance, z-score, extrema, median,
//! normalized value) over a bounded history of scalar feature values.
//! Every update is amortized sub-linear in the history size.

mod error;
mod extrema;
mod median;
mod stats;
mod tracker;

pub use error::StatsError;
pub use extrema::ExtremaDeques;
pub use median::MedianHeaps;
pub use stats::{NormalizationConvention, Stats, NO_DATA};
pub use tracker::StatisticsTracker;
