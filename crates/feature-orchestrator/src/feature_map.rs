//! Flat Feature Map

use analyzer_channel::AnalyzerResult;
use serde::Serialize;
use std::collections::BTreeMap;
use stream_stats::Stats;

/// Suffixes of the statistic keys published for every feature
pub const STAT_SUFFIXES: [&str; 7] = [
    "Normalized",
    "Mean",
    "StandardDeviation",
    "Median",
    "Min",
    "Max",
    "ZScore",
];

/// Key of the beat flag
pub const BEAT_KEY: &str = "beat";

/// A single published value
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Number(f64),
    Flag(bool),
}

/// Flat key to value mapping rebuilt every tick
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct FeatureMap {
    values: BTreeMap<String, FeatureValue>,
}

impl FeatureMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `<key>` plus one `<key><Suffix>` entry per statistic
    pub fn insert_result(&mut self, key: &str, result: &AnalyzerResult) {
        self.insert_number(key, result.value);
        for (suffix, value) in STAT_SUFFIXES.iter().zip(stat_values(&result.stats)) {
            self.insert_number(format!("{key}{suffix}"), value);
        }
    }

    /// Insert every key of a feature with value 0
    pub fn insert_zeroed(&mut self, key: &str) {
        self.insert_number(key, 0.0);
        for suffix in STAT_SUFFIXES {
            self.insert_number(format!("{key}{suffix}"), 0.0);
        }
    }

    pub fn insert_number(&mut self, key: impl Into<String>, value: f64) {
        self.values.insert(key.into(), FeatureValue::Number(value));
    }

    pub fn insert_flag(&mut self, key: impl Into<String>, flag: bool) {
        self.values.insert(key.into(), FeatureValue::Flag(flag));
    }

    pub fn get(&self, key: &str) -> Option<FeatureValue> {
        self.values.get(key).copied()
    }

    /// Numeric value of `key`, `None` when missing or a flag
    pub fn number(&self, key: &str) -> Option<f64> {
        match self.values.get(key) {
            Some(FeatureValue::Number(value)) => Some(*value),
            _ => None,
        }
    }

    /// Boolean value of `key`, `None` when missing or a number
    pub fn flag(&self, key: &str) -> Option<bool> {
        match self.values.get(key) {
            Some(FeatureValue::Flag(flag)) => Some(*flag),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&str, FeatureValue)> + '_ {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Render as a JSON object for the renderer
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

/// Statistic values in [`STAT_SUFFIXES`] order
fn stat_values(stats: &Stats) -> [f64; 7] {
    [
        stats.normalized,
        stats.mean,
        stats.standard_deviation,
        stats.median,
        stats.min,
        stats.max,
        stats.z_score,
    ]
}
