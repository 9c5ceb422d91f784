//! Channel Error Types

use feature_engine::UnknownAnalyzer;
use thiserror::Error;

/// Errors starting or talking to an analyzer channel
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Configured analyzer name matches no analyzer
    #[error(transparent)]
    UnknownAnalyzer(#[from] UnknownAnalyzer),

    /// History size of zero
    #[error("Invalid history size {0}, must be greater than zero")]
    InvalidHistorySize(usize),

    /// The channel task has exited
    #[error("Analyzer channel {0} is unavailable")]
    Unavailable(String),

    /// The channel is not draining its request queue
    #[error("Analyzer channel {0} request queue is full")]
    QueueFull(String),
}
