//! Engine Error Types

use analyzer_channel::ChannelError;
use thiserror::Error;

/// Errors configuring or driving the feature engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration could not be loaded or deserialized
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// Every configured analyzer channel failed to start
    #[error("No analyzer channel could be started")]
    NoChannels,

    /// Rejected channel operation
    #[error(transparent)]
    Channel(#[from] ChannelError),
}
