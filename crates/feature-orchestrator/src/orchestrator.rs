//! Feature Orchestrator

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::feature_map::{FeatureMap, BEAT_KEY};
use crate::source::SpectrumSource;
use analyzer_channel::{AnalyzerChannel, AnalyzerResult, ChannelError, RpcGateway, SpectrumFrame};
use feature_engine::{FeatureAnalyzer, WindowFunction};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// One configured analyzer and, when it started, its gateway
struct ChannelSlot {
    /// Feature map key
    key: String,
    analyzer: Option<FeatureAnalyzer>,
    gateway: Option<RpcGateway>,
}

/// Drives every analyzer channel once per externally clocked tick
pub struct FeatureOrchestrator {
    source: Box<dyn SpectrumSource>,
    window: WindowFunction,
    slots: Vec<ChannelSlot>,
    tasks: Vec<JoinHandle<()>>,
    /// Shared per-tick deadline
    timeout: Duration,
    beat_threshold: f64,
    publisher: watch::Sender<Arc<FeatureMap>>,
    ticks: u64,
}

impl FeatureOrchestrator {
    /// Start one channel per configured analyzer
    ///
    /// A channel that fails to start only zeroes its own keys. Fails with
    /// [`EngineError::NoChannels`] when no channel started. Must be called
    /// from within a tokio runtime.
    pub fn start(
        config: &EngineConfig,
        source: impl SpectrumSource + 'static,
    ) -> Result<Self, EngineError> {
        info!(
            "Starting feature orchestrator: {} analyzers, timeout={}ms",
            config.analyzers.len(),
            config.timeout_ms
        );

        let mut slots = Vec::with_capacity(config.analyzers.len());
        let mut tasks = Vec::new();
        let mut seen = HashSet::new();

        for channel_config in config.channel_configs() {
            let analyzer = match channel_config.analyzer.parse::<FeatureAnalyzer>() {
                Ok(analyzer) => analyzer,
                Err(e) => {
                    error!("Channel {} failed to start: {}", channel_config.analyzer, e);
                    slots.push(ChannelSlot {
                        key: fallback_key(&channel_config.analyzer),
                        analyzer: None,
                        gateway: None,
                    });
                    continue;
                }
            };

            if !seen.insert(analyzer) {
                warn!("Analyzer {} configured twice, keeping the first", analyzer);
                continue;
            }

            let gateway = match AnalyzerChannel::start(&channel_config, config.queue_depth) {
                Ok((handle, task)) => {
                    tasks.push(task);
                    Some(RpcGateway::new(
                        analyzer.name(),
                        handle,
                        channel_config.history_size,
                        config.timeout(),
                    ))
                }
                Err(e) => {
                    error!("Channel {} failed to start: {}", analyzer, e);
                    None
                }
            };

            slots.push(ChannelSlot {
                key: analyzer.feature_key().to_string(),
                analyzer: Some(analyzer),
                gateway,
            });
        }

        Self::from_slots(config, Box::new(source), slots, tasks)
    }

    /// Assemble an orchestrator around already connected slots
    fn from_slots(
        config: &EngineConfig,
        source: Box<dyn SpectrumSource>,
        slots: Vec<ChannelSlot>,
        tasks: Vec<JoinHandle<()>>,
    ) -> Result<Self, EngineError> {
        if slots.iter().all(|slot| slot.gateway.is_none()) {
            return Err(EngineError::NoChannels);
        }

        let (publisher, _) = watch::channel(Arc::new(FeatureMap::new()));
        let mut orchestrator = Self {
            source,
            window: config.window,
            slots,
            tasks,
            timeout: config.timeout(),
            beat_threshold: config.beat_threshold,
            publisher,
            ticks: 0,
        };

        // Subscribers see every key from the start
        let initial = Arc::new(orchestrator.build_map(None));
        orchestrator.publisher.send_replace(initial);

        info!(
            "Feature orchestrator started with {} active channels",
            orchestrator.active_channels()
        );
        Ok(orchestrator)
    }

    /// Run one tick and publish its feature map
    ///
    /// Frames are sent to every channel before any response is awaited; all
    /// channels then race one shared deadline.
    pub async fn tick(&mut self) -> Arc<FeatureMap> {
        self.ticks += 1;
        metrics::counter!("feature_orchestrator_ticks_total").increment(1);

        let results = match self.next_windowed_frame() {
            Some(frame) => {
                for gateway in self.slots.iter_mut().filter_map(|s| s.gateway.as_mut()) {
                    gateway.dispatch(frame.clone());
                }

                let deadline = Instant::now() + self.timeout;
                let mut results = Vec::with_capacity(self.slots.len());
                for slot in &mut self.slots {
                    let result = match slot.gateway.as_mut() {
                        Some(gateway) => Some(gateway.collect(deadline).await),
                        None => None,
                    };
                    results.push(result);
                }
                results
            }
            None => {
                debug!("Silent frame on tick {}, republishing cached results", self.ticks);
                self.slots
                    .iter()
                    .map(|slot| slot.gateway.as_ref().map(RpcGateway::last_result))
                    .collect()
            }
        };

        let map = Arc::new(self.build_map(Some(results.as_slice())));
        self.publisher.send_replace(map.clone());
        map
    }

    /// Watch the feature map published by every tick
    pub fn subscribe(&self) -> watch::Receiver<Arc<FeatureMap>> {
        self.publisher.subscribe()
    }

    /// Most recently published feature map
    pub fn latest(&self) -> Arc<FeatureMap> {
        self.publisher.borrow().clone()
    }

    /// Restart every channel's statistics with a new history size
    pub fn set_history_size(&mut self, history_size: usize) -> Result<(), EngineError> {
        if history_size == 0 {
            return Err(ChannelError::InvalidHistorySize(history_size).into());
        }

        for gateway in self.slots.iter_mut().filter_map(|s| s.gateway.as_mut()) {
            if let Err(e) = gateway.set_history_size(history_size) {
                warn!("Could not resize {}: {}", gateway.name(), e);
            }
        }
        info!("History size set to {}", history_size);
        Ok(())
    }

    /// Clear every channel's history
    pub fn reset(&mut self) {
        for gateway in self.slots.iter_mut().filter_map(|s| s.gateway.as_mut()) {
            if let Err(e) = gateway.reset() {
                warn!("Could not reset {}: {}", gateway.name(), e);
            }
        }
    }

    /// Number of channels whose task is reachable
    pub fn active_channels(&self) -> usize {
        self.slots
            .iter()
            .filter_map(|s| s.gateway.as_ref())
            .filter(|g| g.is_active())
            .count()
    }

    /// Number of ticks run so far
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Close every channel and wait for its task to finish
    pub async fn shutdown(mut self) {
        info!("Shutting down feature orchestrator");
        for slot in &mut self.slots {
            slot.gateway = None;
        }
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Analyzer channel task failed: {}", e);
            }
        }
        info!("Feature orchestrator stopped after {} ticks", self.ticks);
    }

    /// Pull and window the next frame, `None` when the tick is silent
    ///
    /// Under the Hanning window a 2-bin frame is always silent.
    fn next_windowed_frame(&mut self) -> Option<SpectrumFrame> {
        let frame = self.source.next_frame()?;
        let windowed = self.window.apply(&frame);
        if windowed.iter().sum::<f64>() == 0.0 {
            return None;
        }
        Some(windowed.into())
    }

    /// Flatten per-slot results, zeroing slots without one
    fn build_map(&self, results: Option<&[Option<AnalyzerResult>]>) -> FeatureMap {
        let mut map = FeatureMap::new();
        let mut beat = None;

        for (index, slot) in self.slots.iter().enumerate() {
            let result = match results {
                Some(results) => results.get(index).copied().flatten(),
                None => slot.gateway.as_ref().map(RpcGateway::last_result),
            };

            match result {
                Some(result) => map.insert_result(&slot.key, &result),
                None => map.insert_zeroed(&slot.key),
            }

            if slot.analyzer == Some(FeatureAnalyzer::SpectralFlux) {
                beat = Some(result.map_or(false, |r| r.stats.z_score > self.beat_threshold));
            }
        }

        if let Some(beat) = beat {
            map.insert_flag(BEAT_KEY, beat);
        }
        map
    }
}

/// camelCase key for a name that matches no analyzer
fn fallback_key(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}
