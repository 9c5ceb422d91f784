//! Spectrum Sources

use analyzer_channel::SpectrumFrame;
use feature_engine::SpectrumBuilder;

/// Supplies the current magnitude spectrum once per tick
///
/// `None` means no frame is available this tick.
pub trait SpectrumSource: Send {
    fn next_frame(&mut self) -> Option<SpectrumFrame>;
}

impl<F> SpectrumSource for F
where
    F: FnMut() -> Option<SpectrumFrame> + Send,
{
    fn next_frame(&mut self) -> Option<SpectrumFrame> {
        self()
    }
}

/// Source that transforms PCM blocks into magnitude spectra
pub struct PcmSource<F> {
    builder: SpectrumBuilder,
    pull: F,
}

impl<F> PcmSource<F>
where
    F: FnMut() -> Option<Vec<f64>> + Send,
{
    /// Wrap a callback yielding one PCM block per tick
    pub fn new(builder: SpectrumBuilder, pull: F) -> Self {
        Self { builder, pull }
    }
}

impl<F> SpectrumSource for PcmSource<F>
where
    F: FnMut() -> Option<Vec<f64>> + Send,
{
    fn next_frame(&mut self) -> Option<SpectrumFrame> {
        let block = (self.pull)()?;
        if block.is_empty() {
            return None;
        }
        Some(self.builder.magnitudes(&block).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_closure_source() {
        let mut calls = 0;
        let mut source = move || {
            calls += 1;
            (calls % 2 == 1).then(|| SpectrumFrame::from(vec![1.0, 2.0]))
        };
        assert_eq!(source.next_frame().as_deref(), Some(&[1.0, 2.0][..]));
        assert!(source.next_frame().is_none());
    }

    #[test]
    fn test_pcm_source() {
        let mut source = PcmSource::new(SpectrumBuilder::default(), || Some(vec![0.5; 64]));
        let frame: Arc<[f64]> = source.next_frame().unwrap();
        assert_eq!(frame.len(), 33);
        // Windowed constant block concentrates at DC
        assert!(frame[0] > frame[4]);

        let mut empty = PcmSource::new(SpectrumBuilder::default(), || Some(Vec::new()));
        assert!(empty.next_frame().is_none());
    }
}
