//! Analysis Windows

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Default Kaiser shape parameter
pub const DEFAULT_KAISER_BETA: f64 = 5.658;

/// Taper applied to a frame before analysis
///
/// Sequences of length 0 come back empty; a single sample passes through
/// unchanged (its window coefficient is defined as 1). At length 2 both
/// Hanning coefficients are endpoints and therefore 0, so a 2-bin frame
/// always windows to silence.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowFunction {
    /// 0.5 - 0.5 cos(2πn / (N - 1))
    #[default]
    Hanning,
    /// I0(β sqrt(1 - (2n / (N - 1) - 1)²)) / I0(β)
    Kaiser { beta: f64 },
}

impl WindowFunction {
    /// Kaiser window with the default shape parameter
    pub fn kaiser() -> Self {
        Self::Kaiser {
            beta: DEFAULT_KAISER_BETA,
        }
    }

    /// Window coefficient for sample `n` of a frame of `len` samples
    pub fn coefficient(&self, n: usize, len: usize) -> f64 {
        if len < 2 {
            return 1.0;
        }
        let span = (len - 1) as f64;
        match *self {
            WindowFunction::Hanning => 0.5 - 0.5 * (2.0 * PI * n as f64 / span).cos(),
            WindowFunction::Kaiser { beta } => {
                let ratio = 2.0 * n as f64 / span - 1.0;
                let radicand = (1.0 - ratio * ratio).max(0.0);
                bessel_i0(beta * radicand.sqrt()) / bessel_i0(beta)
            }
        }
    }

    /// Return a windowed copy of `samples`
    pub fn apply(&self, samples: &[f64]) -> Vec<f64> {
        let mut windowed = samples.to_vec();
        self.apply_in_place(&mut windowed);
        windowed
    }

    /// Window `samples` in place
    pub fn apply_in_place(&self, samples: &mut [f64]) {
        let len = samples.len();
        if len < 2 {
            return;
        }
        for (n, sample) in samples.iter_mut().enumerate() {
            *sample *= self.coefficient(n, len);
        }
    }
}

/// Zeroth-order modified Bessel function of the first kind (power series)
fn bessel_i0(x: f64) -> f64 {
    let half = x / 2.0;
    let mut sum = 1.0;
    let mut term = 1.0;
    let mut k = 1.0;

    while term > 1e-6 * sum {
        term *= (half / k) * (half / k);
        sum += term;
        k += 1.0;
    }

    sum
}
