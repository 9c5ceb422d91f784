//! Feature Orchestrator
//!
//! Per-tick pump of the audio feature engine: pulls a spectrum frame from the
//! host, fans it out to every analyzer channel, collects the results under one
//! shared deadline and publishes them as a flat, JSON-serializable map.

mod config;
mod error;
mod feature_map;
mod orchestrator;
mod source;

pub use config::{AnalyzerEntry, EngineConfig, ENV_PREFIX};
pub use error::EngineError;
pub use feature_map::{FeatureMap, FeatureValue, BEAT_KEY, STAT_SUFFIXES};
pub use orchestrator::FeatureOrchestrator;
pub use source::{PcmSource, SpectrumSource};

pub use analyzer_channel::{AnalyzerResult, Freshness, SpectrumFrame};

use tracing::{debug, Level};
use tracing_subscriber::FmtSubscriber;

/// Install the global fmt subscriber
///
/// Safe to call more than once; later calls keep the first subscriber.
pub fn init_logging() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    if tracing::subscriber::set_global_default(subscriber).is_err() {
        debug!("Global subscriber already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_logging_twice() {
        init_logging();
        init_logging();
    }
}
