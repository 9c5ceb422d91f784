//! Analyzer Channel Task

use crate::error::ChannelError;
use crate::SpectrumFrame;
use feature_engine::FeatureAnalyzer;
use serde::{Deserialize, Serialize};
use stream_stats::{NormalizationConvention, Stats, StatisticsTracker, StatsError};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

/// Default bound of the request and response queues
pub const DEFAULT_QUEUE_DEPTH: usize = 4;

/// Startup configuration of one channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Analyzer name, e.g. `SpectralCentroid`
    pub analyzer: String,
    /// Number of values kept for statistics
    pub history_size: usize,
    /// What the `normalized` statistic carries
    #[serde(default)]
    pub convention: NormalizationConvention,
}

impl ChannelConfig {
    /// Configuration with the min-max convention
    pub fn new(analyzer: impl Into<String>, history_size: usize) -> Self {
        Self {
            analyzer: analyzer.into(),
            history_size,
            convention: NormalizationConvention::MinMax,
        }
    }
}

/// Message sent from a gateway to its channel task
#[derive(Debug, Clone)]
pub enum ChannelRequest {
    /// Analyze one frame and answer with `id`
    Analyze { id: u64, frame: SpectrumFrame },
    /// Restart statistics with a new history size
    Configure { history_size: usize },
    /// Forget all history
    Reset,
}

/// Answer to an [`ChannelRequest::Analyze`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelResponse {
    /// Id of the request being answered
    pub id: u64,
    /// Feature value
    pub value: f64,
    /// Statistics after this value
    pub stats: Stats,
}

/// Gateway-side ends of a channel's queues
#[derive(Debug)]
pub struct ChannelHandle {
    /// Requests into the task
    pub requests: mpsc::Sender<ChannelRequest>,
    /// Responses out of the task
    pub responses: mpsc::Receiver<ChannelResponse>,
}

impl ChannelHandle {
    /// Create a handle plus the task-side ends of both queues
    pub fn pair(
        queue_depth: usize,
    ) -> (
        Self,
        mpsc::Receiver<ChannelRequest>,
        mpsc::Sender<ChannelResponse>,
    ) {
        let depth = queue_depth.max(1);
        let (request_tx, request_rx) = mpsc::channel(depth);
        let (response_tx, response_rx) = mpsc::channel(depth);
        (
            Self {
                requests: request_tx,
                responses: response_rx,
            },
            request_rx,
            response_tx,
        )
    }
}

/// One analyzer paired with its exclusively owned statistics tracker
pub struct AnalyzerChannel {
    /// Feature computed by this channel
    analyzer: FeatureAnalyzer,
    /// Running statistics of the feature
    tracker: StatisticsTracker,
    /// Previous frame, for analyzers that diff against it
    previous: Option<SpectrumFrame>,
    /// Last computed value, answered when the analyzer skips a frame
    held: f64,
}

impl AnalyzerChannel {
    /// Validate the configuration and build the channel state
    pub fn new(config: &ChannelConfig) -> Result<Self, ChannelError> {
        let analyzer: FeatureAnalyzer = config.analyzer.parse()?;
        let tracker = StatisticsTracker::new(config.history_size, config.convention)
            .map_err(|_| ChannelError::InvalidHistorySize(config.history_size))?;

        Ok(Self {
            analyzer,
            tracker,
            previous: None,
            held: 0.0,
        })
    }

    /// Analyzer computed by this channel
    pub fn analyzer(&self) -> FeatureAnalyzer {
        self.analyzer
    }

    /// Compute the feature for one frame and fold it into the statistics
    ///
    /// When the analyzer has no value for this frame the previous value and
    /// statistics are answered unchanged.
    pub fn analyze(&mut self, frame: &SpectrumFrame) -> (f64, Stats) {
        let previous = self.previous.as_deref();
        let computed = self.analyzer.compute(frame, previous);
        if self.analyzer.uses_previous_frame() {
            self.previous = Some(frame.clone());
        }

        let Some(value) = computed else {
            debug!(analyzer = %self.analyzer, "No signal, holding {}", self.held);
            return (self.held, self.tracker.get());
        };

        match self.tracker.update(value) {
            Ok(stats) => {
                self.held = value;
                (value, stats)
            }
            Err(e @ StatsError::InvalidInput(_)) => {
                error!(analyzer = %self.analyzer, "Analyzer produced unusable value: {}", e);
                (self.held, self.tracker.get())
            }
            Err(e) => {
                error!(analyzer = %self.analyzer, "Statistics update failed: {}", e);
                (self.held, self.tracker.get())
            }
        }
    }

    /// Replace the tracker with a fresh one of `history_size`
    pub fn configure(&mut self, history_size: usize) -> Result<(), ChannelError> {
        if history_size == self.tracker.capacity() {
            return Ok(());
        }
        self.tracker = StatisticsTracker::new(history_size, self.tracker.convention())
            .map_err(|_| ChannelError::InvalidHistorySize(history_size))?;
        info!(analyzer = %self.analyzer, "History size set to {}", history_size);
        Ok(())
    }

    /// Forget history, previous frame and held value
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.previous = None;
        self.held = 0.0;
    }

    /// Current statistics
    pub fn stats(&self) -> Stats {
        self.tracker.get()
    }

    /// Validate `config` and spawn the channel task on the current runtime
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        config: &ChannelConfig,
        queue_depth: usize,
    ) -> Result<(ChannelHandle, JoinHandle<()>), ChannelError> {
        let channel = Self::new(config)?;
        Ok(channel.spawn(queue_depth))
    }

    /// Move the channel into its own task
    pub fn spawn(self, queue_depth: usize) -> (ChannelHandle, JoinHandle<()>) {
        let (handle, requests, responses) = ChannelHandle::pair(queue_depth);
        let task = tokio::spawn(self.run(requests, responses));
        (handle, task)
    }

    /// Serve requests until the gateway drops its sender
    pub async fn run(
        mut self,
        mut requests: mpsc::Receiver<ChannelRequest>,
        responses: mpsc::Sender<ChannelResponse>,
    ) {
        info!(analyzer = %self.analyzer, "Analyzer channel started");

        while let Some(request) = requests.recv().await {
            match request {
                ChannelRequest::Analyze { id, frame } => {
                    let (value, stats) = self.analyze(&frame);
                    let response = ChannelResponse { id, value, stats };
                    if responses.send(response).await.is_err() {
                        debug!(analyzer = %self.analyzer, "Gateway dropped, stopping");
                        break;
                    }
                }
                ChannelRequest::Configure { history_size } => {
                    if let Err(e) = self.configure(history_size) {
                        error!(analyzer = %self.analyzer, "Ignoring configuration: {}", e);
                    }
                }
                ChannelRequest::Reset => {
                    debug!(analyzer = %self.analyzer, "Resetting");
                    self.reset();
                }
            }
        }

        info!(analyzer = %self.analyzer, "Analyzer channel stopped");
    }
}
