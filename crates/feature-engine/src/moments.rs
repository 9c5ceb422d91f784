//! Weighted Spectral Moments

/// Read a magnitude bin, treating non-finite values as silence
#[inline]
pub(crate) fn magnitude(bin: f64) -> f64 {
    if bin.is_finite() {
        bin.abs()
    } else {
        0.0
    }
}

/// `i`-th raw moment of the bin index weighted by magnitude
///
/// `mu(i) = Σ k^i·|s[k]| / Σ|s[k]|`. Returns `None` when the spectrum carries
/// no energy.
pub fn mu(order: i32, spectrum: &[f64]) -> Option<f64> {
    let mut numerator = 0.0;
    let mut denominator = 0.0;

    for (k, &bin) in spectrum.iter().enumerate() {
        let m = magnitude(bin);
        numerator += (k as f64).powi(order) * m;
        denominator += m;
    }

    if denominator > 0.0 {
        Some(numerator / denominator)
    } else {
        None
    }
}

/// Central moment of the bin index weighted by magnitude
pub(crate) fn central_moment(order: i32, mean: f64, spectrum: &[f64]) -> Option<f64> {
    let mut numerator = 0.0;
    let mut denominator = 0.0;

    for (k, &bin) in spectrum.iter().enumerate() {
        let m = magnitude(bin);
        numerator += (k as f64 - mean).powi(order) * m;
        denominator += m;
    }

    if denominator > 0.0 {
        Some(numerator / denominator)
    } else {
        None
    }
}
