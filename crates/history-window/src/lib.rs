//! Bounded History Window
//!
//! Provides a fixed-capacity FIFO that evicts its oldest value on overflow.
//! Each statistics tracker owns one window, so no synchronization is needed.

mod window;

pub use window::HistoryWindow;

use thiserror::Error;

/// Errors while constructing a history window
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HistoryError {
    #[error("History capacity must be greater than zero")]
    ZeroCapacity,
}
