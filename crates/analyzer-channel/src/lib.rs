//! Analyzer Channels
//!
//! Each configured analyzer runs as an isolated tokio task owning its own
//! statistics tracker. The orchestrator reaches it only through an
//! [`RpcGateway`], which correlates responses by request id, races them
//! against a per-tick deadline and substitutes the last known-good result
//! when the task is late.

mod channel;
mod error;
mod gateway;
mod sanitize;

pub use channel::{
    AnalyzerChannel, ChannelConfig, ChannelHandle, ChannelRequest, ChannelResponse,
    DEFAULT_QUEUE_DEPTH,
};
pub use error::ChannelError;
pub use gateway::{AnalyzerResult, Freshness, RpcGateway, DEFAULT_TIMEOUT};

use std::sync::Arc;

/// One tick's magnitude spectrum, shared read-only by every channel
pub type SpectrumFrame = Arc<[f64]>;
