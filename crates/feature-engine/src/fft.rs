//! FFT Front End
//!
//! Turns a block of PCM samples into the magnitude spectrum the analyzers
//! consume, for hosts that do not already receive frequency-domain frames.

use crate::window::WindowFunction;
use rustfft::{num_complex::Complex, FftPlanner};
use tracing::debug;

/// Windowed forward FFT producing `len / 2 + 1` magnitude bins
pub struct SpectrumBuilder {
    /// FFT planner, caches plans per block size
    planner: FftPlanner<f64>,
    /// Window applied to the PCM block
    window: WindowFunction,
    /// Reused complex buffer
    buffer: Vec<Complex<f64>>,
}

impl SpectrumBuilder {
    /// Create a builder applying `window` to every block
    pub fn new(window: WindowFunction) -> Self {
        Self {
            planner: FftPlanner::new(),
            window,
            buffer: Vec::new(),
        }
    }

    /// Compute the magnitude spectrum of a PCM block
    ///
    /// Magnitudes are scaled by `1 / len`. Non-finite samples are read as 0.
    /// An empty block yields an empty spectrum.
    pub fn magnitudes(&mut self, samples: &[f64]) -> Vec<f64> {
        let n = samples.len();
        if n == 0 {
            return Vec::new();
        }

        let window = self.window;
        self.buffer.clear();
        self.buffer.extend(samples.iter().enumerate().map(|(i, &s)| {
            let s = if s.is_finite() { s } else { 0.0 };
            Complex::new(s * window.coefficient(i, n), 0.0)
        }));

        let fft = self.planner.plan_fft_forward(n);
        fft.process(&mut self.buffer);

        let bins = n / 2 + 1;
        debug!("Computed {}-bin spectrum from {} samples", bins, n);
        self.buffer
            .iter()
            .take(bins)
            .map(|c| c.norm() / n as f64)
            .collect()
    }

    /// Window applied before the transform
    pub fn window(&self) -> WindowFunction {
        self.window
    }
}

impl Default for SpectrumBuilder {
    fn default() -> Self {
        Self::new(WindowFunction::Hanning)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_sine_peak_bin() {
        let mut builder = SpectrumBuilder::default();
        // 8 cycles over 256 samples lands exactly on bin 8
        let samples: Vec<f64> = (0..256)
            .map(|i| (2.0 * PI * 8.0 * i as f64 / 256.0).sin())
            .collect();

        let spectrum = builder.magnitudes(&samples);
        assert_eq!(spectrum.len(), 129);

        let peak = spectrum
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(peak, Some(8));
    }

    #[test]
    fn test_empty_block() {
        let mut builder = SpectrumBuilder::default();
        assert!(builder.magnitudes(&[]).is_empty());
    }

    #[test]
    fn test_non_finite_samples_are_silence() {
        let mut builder = SpectrumBuilder::new(WindowFunction::kaiser());
        let spectrum = builder.magnitudes(&[f64::NAN; 64]);
        assert!(spectrum.iter().all(|&m| m == 0.0));
    }
}
