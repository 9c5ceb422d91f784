//! Statistics Error Types

use history_window::HistoryError;
use thiserror::Error;

/// Errors raised by the statistics tracker
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    /// Non-finite value pushed into the tracker (an analyzer bug)
    #[error("Statistics tracker can only track finite numbers, received {0}")]
    InvalidInput(f64),

    /// Tracker configured with an unusable history
    #[error("Invalid history window: {0}")]
    History(#[from] HistoryError),
}
