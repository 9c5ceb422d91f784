//! Engine Configuration

use crate::error::EngineError;
use analyzer_channel::{ChannelConfig, DEFAULT_QUEUE_DEPTH};
use config::{Config, Environment, File, FileFormat};
use feature_engine::WindowFunction;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use stream_stats::NormalizationConvention;
use tracing::info;

/// Prefix of environment variable overrides, e.g. `FEATURE_ENGINE__TIMEOUT_MS`
pub const ENV_PREFIX: &str = "FEATURE_ENGINE";

/// One configured analyzer, either a bare name or a table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnalyzerEntry {
    /// Analyzer name using the engine-wide history size
    Name(String),
    /// Analyzer with its own history size
    Table {
        name: String,
        #[serde(default)]
        history_size: Option<usize>,
    },
}

impl AnalyzerEntry {
    /// Configured analyzer name
    pub fn name(&self) -> &str {
        match self {
            AnalyzerEntry::Name(name) => name,
            AnalyzerEntry::Table { name, .. } => name,
        }
    }

    /// Per-analyzer history size override
    pub fn history_size(&self) -> Option<usize> {
        match self {
            AnalyzerEntry::Name(_) => None,
            AnalyzerEntry::Table { history_size, .. } => *history_size,
        }
    }
}

impl From<&str> for AnalyzerEntry {
    fn from(name: &str) -> Self {
        AnalyzerEntry::Name(name.to_string())
    }
}

/// Feature engine configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Analyzers to run, one channel each
    pub analyzers: Vec<AnalyzerEntry>,

    /// Default history size of every channel
    pub history_size: usize,

    /// Per-tick deadline (ms)
    pub timeout_ms: u64,

    /// Window applied to each frame before analysis
    pub window: WindowFunction,

    /// What the `Normalized` keys carry
    pub normalization: NormalizationConvention,

    /// Flux z-score above which `beat` is raised
    pub beat_threshold: f64,

    /// Bound of each channel's queues
    pub queue_depth: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            analyzers: ["Energy", "SpectralCentroid", "SpectralSpread", "SpectralKurtosis"]
                .into_iter()
                .map(AnalyzerEntry::from)
                .collect(),
            history_size: 500,
            timeout_ms: 50,
            window: WindowFunction::Hanning,
            normalization: NormalizationConvention::MinMax,
            beat_threshold: 0.9,
            queue_depth: DEFAULT_QUEUE_DEPTH,
        }
    }
}

impl EngineConfig {
    /// Parse TOML text, then apply environment overrides
    pub fn from_toml_str(toml: &str) -> Result<Self, EngineError> {
        let settings = Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .add_source(environment())
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Load a TOML file, then apply environment overrides
    pub fn load(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref();
        info!("Loading engine configuration from {}", path.display());
        let settings = Config::builder()
            .add_source(File::from(path).format(FileFormat::Toml))
            .add_source(environment())
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Per-tick deadline
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Startup configuration of every channel, in configured order
    pub fn channel_configs(&self) -> Vec<ChannelConfig> {
        self.analyzers
            .iter()
            .map(|entry| ChannelConfig {
                analyzer: entry.name().to_string(),
                history_size: entry.history_size().unwrap_or(self.history_size),
                convention: self.normalization,
            })
            .collect()
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.history_size, 500);
        assert_eq!(config.timeout(), Duration::from_millis(50));
        assert_eq!(config.beat_threshold, 0.9);
        assert_eq!(config.window, WindowFunction::Hanning);
        assert_eq!(config.analyzers.len(), 4);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = EngineConfig::from_toml_str("timeout_ms = 16").unwrap();
        assert_eq!(config.timeout_ms, 16);
        assert_eq!(config.history_size, 500);
        assert_eq!(config.queue_depth, DEFAULT_QUEUE_DEPTH);
    }

    #[test]
    fn test_full_toml() {
        let toml = r#"
            history_size = 100
            normalization = "mad"
            window = { kaiser = { beta = 4.0 } }
            analyzers = [
                "Energy",
                { name = "spectralFlux", history_size = 43 },
            ]
        "#;
        let config = EngineConfig::from_toml_str(toml).unwrap();

        assert_eq!(config.normalization, NormalizationConvention::Mad);
        assert_eq!(config.window, WindowFunction::Kaiser { beta: 4.0 });

        let channels = config.channel_configs();
        assert_eq!(channels.len(), 2);
        assert_eq!(channels[0].analyzer, "Energy");
        assert_eq!(channels[0].history_size, 100);
        assert_eq!(channels[1].analyzer, "spectralFlux");
        assert_eq!(channels[1].history_size, 43);
        assert_eq!(channels[1].convention, NormalizationConvention::Mad);
    }

    #[test]
    fn test_environment_overrides_toml() {
        // Same timeout as test_partial_toml_keeps_defaults, which may run concurrently
        std::env::set_var("FEATURE_ENGINE__TIMEOUT_MS", "16");
        std::env::set_var("FEATURE_ENGINE__BEAT_THRESHOLD", "1.5");
        let config = EngineConfig::from_toml_str("timeout_ms = 40\nbeat_threshold = 0.5");
        std::env::remove_var("FEATURE_ENGINE__TIMEOUT_MS");
        std::env::remove_var("FEATURE_ENGINE__BEAT_THRESHOLD");

        let config = config.unwrap();
        assert_eq!(config.timeout_ms, 16);
        assert_eq!(config.beat_threshold, 1.5);
        assert_eq!(config.history_size, 500);
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            EngineConfig::from_toml_str("history_size = ["),
            Err(EngineError::Config(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(EngineConfig::load("/nonexistent/engine.toml").is_err());
    }
}
