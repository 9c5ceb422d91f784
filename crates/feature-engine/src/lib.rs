//! Spectral Feature Engine
//!
//! Pure feature analyzers mapping one magnitude spectrum to one scalar,
//! the analysis windows applied before them, and an FFT front end for hosts
//! that only have PCM blocks.

mod analyzers;
mod fft;
mod moments;
mod window;

pub use analyzers::{FeatureAnalyzer, UnknownAnalyzer};
pub use fft::SpectrumBuilder;
pub use moments::mu;
pub use window::{WindowFunction, DEFAULT_KAISER_BETA};
