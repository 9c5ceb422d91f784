//! Spectral Feature Analyzers
//!
//! Every analyzer maps one windowed magnitude spectrum (and, for flux, the
//! previous one) to a scalar. `None` means "no signal, hold the previous
//! value". Non-finite bins read as silence and non-finite results are turned
//! into `None`, so NaN and infinity never leave this module.

use crate::moments::{central_moment, magnitude, mu};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Empirical gain applied to the normalized centroid
const CENTROID_GAIN: f64 = 1.5;
/// Stabilizes the kurtosis denominator for near-pure tones
const KURTOSIS_EPSILON: f64 = 1e-10;
/// Raw kurtosis above this is treated as degenerate input
const KURTOSIS_SANITY_LIMIT: f64 = 1e6;
/// Empirical scale bringing kurtosis into the visual range
const KURTOSIS_SCALE: f64 = 0.01;
/// Empirical divisor bringing flux into the visual range
const FLUX_SCALE: f64 = 30_000.0;
/// Fraction of total magnitude below the rolloff bin
const ROLLOFF_THRESHOLD: f64 = 0.85;

/// Analyzer name that matches no known variant
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown analyzer: {0}")]
pub struct UnknownAnalyzer(pub String);

/// Spectral feature computed by one analyzer channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FeatureAnalyzer {
    /// Σ (bin / N)²
    Energy,
    /// Magnitude-weighted mean bin, normalized to [0, 1]
    SpectralCentroid,
    /// Standard deviation of the bin distribution
    SpectralSpread,
    /// Excess kurtosis of the bin distribution
    SpectralKurtosis,
    /// Positive magnitude change against the previous frame
    SpectralFlux,
    /// Normalized bin below which 85% of the magnitude lies
    SpectralRolloff,
    /// Σ |s[k] - s[k-1]|
    SpectralRoughness,
    /// Normalized Shannon entropy of the power distribution
    SpectralEntropy,
    /// Peak magnitude over total magnitude
    SpectralCrest,
    /// Skewness of the magnitude values
    SpectralSkew,
}

impl FeatureAnalyzer {
    /// Every analyzer, in feature-map order
    pub const ALL: [FeatureAnalyzer; 10] = [
        FeatureAnalyzer::SpectralCentroid,
        FeatureAnalyzer::SpectralFlux,
        FeatureAnalyzer::SpectralSpread,
        FeatureAnalyzer::SpectralRolloff,
        FeatureAnalyzer::SpectralRoughness,
        FeatureAnalyzer::SpectralKurtosis,
        FeatureAnalyzer::Energy,
        FeatureAnalyzer::SpectralEntropy,
        FeatureAnalyzer::SpectralCrest,
        FeatureAnalyzer::SpectralSkew,
    ];

    /// Configuration name (PascalCase)
    pub fn name(&self) -> &'static str {
        match self {
            FeatureAnalyzer::Energy => "Energy",
            FeatureAnalyzer::SpectralCentroid => "SpectralCentroid",
            FeatureAnalyzer::SpectralSpread => "SpectralSpread",
            FeatureAnalyzer::SpectralKurtosis => "SpectralKurtosis",
            FeatureAnalyzer::SpectralFlux => "SpectralFlux",
            FeatureAnalyzer::SpectralRolloff => "SpectralRolloff",
            FeatureAnalyzer::SpectralRoughness => "SpectralRoughness",
            FeatureAnalyzer::SpectralEntropy => "SpectralEntropy",
            FeatureAnalyzer::SpectralCrest => "SpectralCrest",
            FeatureAnalyzer::SpectralSkew => "SpectralSkew",
        }
    }

    /// Feature-map key (camelCase)
    pub fn feature_key(&self) -> &'static str {
        match self {
            FeatureAnalyzer::Energy => "energy",
            FeatureAnalyzer::SpectralCentroid => "spectralCentroid",
            FeatureAnalyzer::SpectralSpread => "spectralSpread",
            FeatureAnalyzer::SpectralKurtosis => "spectralKurtosis",
            FeatureAnalyzer::SpectralFlux => "spectralFlux",
            FeatureAnalyzer::SpectralRolloff => "spectralRolloff",
            FeatureAnalyzer::SpectralRoughness => "spectralRoughness",
            FeatureAnalyzer::SpectralEntropy => "spectralEntropy",
            FeatureAnalyzer::SpectralCrest => "spectralCrest",
            FeatureAnalyzer::SpectralSkew => "spectralSkew",
        }
    }

    /// Whether the analyzer reads the previous frame
    pub fn uses_previous_frame(&self) -> bool {
        matches!(self, FeatureAnalyzer::SpectralFlux)
    }

    /// Compute the feature for one frame
    pub fn compute(&self, spectrum: &[f64], previous: Option<&[f64]>) -> Option<f64> {
        let value = match self {
            FeatureAnalyzer::Energy => Some(energy(spectrum)),
            FeatureAnalyzer::SpectralCentroid => spectral_centroid(spectrum),
            FeatureAnalyzer::SpectralSpread => Some(spectral_spread(spectrum)),
            FeatureAnalyzer::SpectralKurtosis => spectral_kurtosis(spectrum),
            FeatureAnalyzer::SpectralFlux => previous.and_then(|p| spectral_flux(spectrum, p)),
            FeatureAnalyzer::SpectralRolloff => Some(spectral_rolloff(spectrum)),
            FeatureAnalyzer::SpectralRoughness => Some(spectral_roughness(spectrum)),
            FeatureAnalyzer::SpectralEntropy => spectral_entropy(spectrum),
            FeatureAnalyzer::SpectralCrest => Some(spectral_crest(spectrum)),
            FeatureAnalyzer::SpectralSkew => Some(spectral_skew(spectrum)),
        };
        value.filter(|v| v.is_finite())
    }
}

impl fmt::Display for FeatureAnalyzer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FeatureAnalyzer {
    type Err = UnknownAnalyzer;

    /// Accepts `SpectralCentroid`, `spectralCentroid` or any other casing
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        FeatureAnalyzer::ALL
            .iter()
            .copied()
            .find(|a| a.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownAnalyzer(s.to_string()))
    }
}

fn energy(spectrum: &[f64]) -> f64 {
    let n = spectrum.len() as f64;
    spectrum
        .iter()
        .map(|&bin| {
            let scaled = magnitude(bin) / n;
            scaled * scaled
        })
        .sum()
}

fn spectral_centroid(spectrum: &[f64]) -> Option<f64> {
    let centroid = mu(1, spectrum)?;
    if spectrum.len() < 2 {
        return Some(0.0);
    }
    let max_centroid = (spectrum.len() - 1) as f64;
    Some((centroid * CENTROID_GAIN / max_centroid).clamp(0.0, 1.0))
}

fn spectral_spread(spectrum: &[f64]) -> f64 {
    match (mu(1, spectrum), mu(2, spectrum)) {
        (Some(mean), Some(second)) => (second - mean * mean).max(0.0).sqrt(),
        _ => 0.0,
    }
}

fn spectral_kurtosis(spectrum: &[f64]) -> Option<f64> {
    let mean = mu(1, spectrum)?;
    let variance = central_moment(2, mean, spectrum)?;
    let fourth = central_moment(4, mean, spectrum)?;

    let kurtosis = fourth / (variance * variance + KURTOSIS_EPSILON) - 3.0;
    if !kurtosis.is_finite() || kurtosis > KURTOSIS_SANITY_LIMIT {
        return Some(0.0);
    }
    Some(kurtosis * KURTOSIS_SCALE)
}

fn spectral_flux(current: &[f64], previous: &[f64]) -> Option<f64> {
    if current.len() != previous.len() {
        return None;
    }
    let flux: f64 = current
        .iter()
        .zip(previous)
        .map(|(&c, &p)| (magnitude(c) - magnitude(p)).max(0.0))
        .sum();
    Some(flux / FLUX_SCALE)
}

fn spectral_rolloff(spectrum: &[f64]) -> f64 {
    let total: f64 = spectrum.iter().map(|&b| magnitude(b)).sum();
    if total <= 0.0 {
        return 0.0;
    }
    let threshold = total * ROLLOFF_THRESHOLD;
    let mut cumulative = 0.0;
    for (i, &bin) in spectrum.iter().enumerate() {
        cumulative += magnitude(bin);
        if cumulative >= threshold {
            return i as f64 / spectrum.len() as f64;
        }
    }
    0.0
}

fn spectral_roughness(spectrum: &[f64]) -> f64 {
    spectrum
        .windows(2)
        .map(|pair| (magnitude(pair[1]) - magnitude(pair[0])).abs())
        .sum()
}

fn spectral_entropy(spectrum: &[f64]) -> Option<f64> {
    let total: f64 = spectrum.iter().map(|&b| magnitude(b).powi(2)).sum();
    if total <= 0.0 {
        return None;
    }
    if spectrum.len() < 2 {
        return Some(0.0);
    }
    let entropy: f64 = spectrum
        .iter()
        .map(|&b| magnitude(b).powi(2) / total)
        .filter(|&p| p > 0.0)
        .map(|p| -p * p.ln())
        .sum();
    Some(entropy / (spectrum.len() as f64).ln())
}

fn spectral_crest(spectrum: &[f64]) -> f64 {
    let sum: f64 = spectrum.iter().map(|&b| magnitude(b)).sum();
    if sum <= 0.0 {
        return 0.0;
    }
    let peak = spectrum.iter().map(|&b| magnitude(b)).fold(0.0, f64::max);
    peak / sum
}

fn spectral_skew(spectrum: &[f64]) -> f64 {
    if spectrum.is_empty() {
        return 0.0;
    }
    let n = spectrum.len() as f64;
    let mean = spectrum.iter().map(|&b| magnitude(b)).sum::<f64>() / n;
    let variance = spectrum
        .iter()
        .map(|&b| (magnitude(b) - mean).powi(2))
        .sum::<f64>()
        / n;
    let std_dev = variance.sqrt();
    if std_dev == 0.0 {
        return 0.0;
    }
    let third = spectrum
        .iter()
        .map(|&b| (magnitude(b) - mean).powi(3))
        .sum::<f64>()
        / n;
    third / std_dev.powi(3)
}
