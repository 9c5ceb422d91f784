//! Deadline-Guarded RPC Gateway

use crate::channel::{ChannelHandle, ChannelRequest, ChannelResponse};
use crate::error::ChannelError;
use crate::sanitize::sanitize;
use crate::SpectrumFrame;
use serde::Serialize;
use stream_stats::Stats;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::{TryRecvError, TrySendError};
use tokio::time::{timeout_at, Duration, Instant};
use tracing::{debug, info, warn};

/// Default per-tick deadline
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(50);

/// Where a result served by the gateway came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Freshness {
    /// Answer to this tick's request
    Fresh,
    /// Last known-good answer to an earlier request
    Stale,
    /// Nothing received yet
    Default,
}

/// Value and statistics served for one analyzer on one tick
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnalyzerResult {
    /// Feature value
    pub value: f64,
    /// Statistics of the feature
    pub stats: Stats,
    /// Origin of the result
    pub freshness: Freshness,
}

impl AnalyzerResult {
    /// Result served before any response was cached: value 0, empty stats
    pub fn default_result() -> Self {
        Self {
            value: 0.0,
            stats: Stats::EMPTY,
            freshness: Freshness::Default,
        }
    }
}

/// Orchestrator-side stub of one analyzer channel
///
/// Correlates responses with requests by id. A response to anything but the
/// outstanding request is discarded.
pub struct RpcGateway {
    /// Analyzer name, used in logs and metric labels
    name: String,
    requests: mpsc::Sender<ChannelRequest>,
    responses: mpsc::Receiver<ChannelResponse>,
    /// Deadline used by [`RpcGateway::process`]
    timeout: Duration,
    next_id: u64,
    /// Id of the request awaiting a response
    outstanding: Option<u64>,
    /// Last known-good value and stats
    last_good: Option<(f64, Stats)>,
    history_size: usize,
    available: bool,
    /// Dispatches abandoned so far, overlapped or refused by a full queue
    abandoned: u64,
}

impl RpcGateway {
    /// Wrap a running channel's handle
    pub fn new(
        name: impl Into<String>,
        handle: ChannelHandle,
        history_size: usize,
        timeout: Duration,
    ) -> Self {
        let name = name.into();
        info!("Creating gateway for {}: timeout={:?}", name, timeout);
        Self {
            name,
            requests: handle.requests,
            responses: handle.responses,
            timeout,
            next_id: 0,
            outstanding: None,
            last_good: None,
            history_size,
            available: true,
            abandoned: 0,
        }
    }

    /// Send `frame` to the channel without waiting
    ///
    /// Any request still outstanding is abandoned first. Returns the id of the
    /// new request, or `None` when it could not be queued; the next
    /// [`collect`](Self::collect) then serves the cached result.
    pub fn dispatch(&mut self, frame: SpectrumFrame) -> Option<u64> {
        self.drain_late_responses();

        if let Some(abandoned) = self.outstanding.take() {
            debug!("{}: abandoning request {}", self.name, abandoned);
            self.count_abandoned();
        }

        if !self.available {
            return None;
        }

        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);

        match self.requests.try_send(ChannelRequest::Analyze { id, frame }) {
            Ok(()) => {
                self.outstanding = Some(id);
                Some(id)
            }
            Err(TrySendError::Full(_)) => {
                warn!("{}: request queue full, serving cached result", self.name);
                self.count_abandoned();
                None
            }
            Err(TrySendError::Closed(_)) => {
                self.mark_unavailable();
                None
            }
        }
    }

    /// Wait until `deadline` for the outstanding response
    ///
    /// A response already queued is taken even if the deadline has passed.
    pub async fn collect(&mut self, deadline: Instant) -> AnalyzerResult {
        let Some(id) = self.outstanding else {
            return self.last_result();
        };

        loop {
            match timeout_at(deadline, self.responses.recv()).await {
                Ok(Some(response)) if response.id == id => {
                    self.outstanding = None;
                    return self.accept(response);
                }
                Ok(Some(response)) => {
                    debug!(
                        "{}: discarding response {} while waiting for {}",
                        self.name, response.id, id
                    );
                }
                Ok(None) => {
                    self.outstanding = None;
                    self.mark_unavailable();
                    return self.last_result();
                }
                Err(_) => {
                    debug!("{}: request {} missed its deadline", self.name, id);
                    metrics::counter!(
                        "feature_channel_timeouts_total",
                        "analyzer" => self.name.clone()
                    )
                    .increment(1);
                    return self.last_result();
                }
            }
        }
    }

    /// Dispatch `frame` and collect within this gateway's own timeout
    pub async fn process(&mut self, frame: SpectrumFrame) -> AnalyzerResult {
        self.dispatch(frame);
        let deadline = Instant::now() + self.timeout;
        self.collect(deadline).await
    }

    /// Restart the channel's statistics with a new history size
    pub fn set_history_size(&mut self, history_size: usize) -> Result<(), ChannelError> {
        if history_size == 0 {
            return Err(ChannelError::InvalidHistorySize(history_size));
        }
        if history_size == self.history_size {
            return Ok(());
        }

        self.send_control(ChannelRequest::Configure { history_size })?;
        self.history_size = history_size;
        Ok(())
    }

    /// Clear the channel's history and the cached result
    pub fn reset(&mut self) -> Result<(), ChannelError> {
        self.send_control(ChannelRequest::Reset)?;
        self.outstanding = None;
        self.last_good = None;
        Ok(())
    }

    /// Whether the channel task is still reachable
    pub fn is_active(&self) -> bool {
        self.available && !self.requests.is_closed()
    }

    /// Cached result, or the default when nothing has been received
    pub fn last_result(&self) -> AnalyzerResult {
        match self.last_good {
            Some((value, stats)) => AnalyzerResult {
                value,
                stats,
                freshness: Freshness::Stale,
            },
            None => AnalyzerResult::default_result(),
        }
    }

    /// Analyzer name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deadline used by [`RpcGateway::process`]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// History size last requested from the channel
    pub fn history_size(&self) -> usize {
        self.history_size
    }

    /// Dispatches abandoned since creation
    pub fn abandoned(&self) -> u64 {
        self.abandoned
    }

    fn count_abandoned(&mut self) {
        self.abandoned += 1;
        metrics::counter!(
            "feature_channel_abandoned_total",
            "analyzer" => self.name.clone()
        )
        .increment(1);
    }

    fn accept(&mut self, response: ChannelResponse) -> AnalyzerResult {
        let ChannelResponse {
            mut value,
            mut stats,
            ..
        } = response;

        let prior = self.last_good.as_ref().map(|(v, s)| (*v, s));
        let replaced = sanitize(&mut value, &mut stats, prior);
        if replaced > 0 {
            warn!("{}: replaced {} non-finite fields", self.name, replaced);
            metrics::counter!(
                "feature_channel_sanitized_total",
                "analyzer" => self.name.clone()
            )
            .increment(replaced as u64);
        }

        self.last_good = Some((value, stats));
        AnalyzerResult {
            value,
            stats,
            freshness: Freshness::Fresh,
        }
    }

    /// Drop responses that arrived after their deadline
    fn drain_late_responses(&mut self) {
        loop {
            match self.responses.try_recv() {
                Ok(response) => {
                    debug!("{}: discarding late response {}", self.name, response.id);
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.mark_unavailable();
                    break;
                }
            }
        }
    }

    fn send_control(&mut self, request: ChannelRequest) -> Result<(), ChannelError> {
        match self.requests.try_send(request) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ChannelError::QueueFull(self.name.clone())),
            Err(TrySendError::Closed(_)) => {
                self.mark_unavailable();
                Err(ChannelError::Unavailable(self.name.clone()))
            }
        }
    }

    fn mark_unavailable(&mut self) {
        if self.available {
            warn!("{}: channel task has exited, serving last known-good result", self.name);
            self.available = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{AnalyzerChannel, ChannelConfig, DEFAULT_QUEUE_DEPTH};
    use std::sync::Arc;

    fn frame(bins: &[f64]) -> SpectrumFrame {
        Arc::from(bins)
    }

    /// Gateway plus the task-side queue ends, driven by hand
    fn manual_gateway() -> (
        RpcGateway,
        mpsc::Receiver<ChannelRequest>,
        mpsc::Sender<ChannelResponse>,
    ) {
        let (handle, requests, responses) = ChannelHandle::pair(DEFAULT_QUEUE_DEPTH);
        let gateway = RpcGateway::new("Energy", handle, 16, DEFAULT_TIMEOUT);
        (gateway, requests, responses)
    }

    fn request_id(request: ChannelRequest) -> u64 {
        match request {
            ChannelRequest::Analyze { id, .. } => id,
            other => panic!("unexpected request {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_channel_serves_default_within_timeout() {
        let (mut gateway, _requests, _responses) = manual_gateway();

        let started = Instant::now();
        let result = gateway.process(frame(&[1.0, 2.0])).await;
        let waited = started.elapsed();

        assert_eq!(result, AnalyzerResult::default_result());
        assert_eq!(result.stats, Stats::EMPTY);
        assert!(waited >= DEFAULT_TIMEOUT);
        assert!(waited < DEFAULT_TIMEOUT + Duration::from_millis(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_serves_last_known_good() {
        let (mut gateway, mut requests, responses) = manual_gateway();

        let id = gateway.dispatch(frame(&[1.0])).unwrap();
        assert_eq!(request_id(requests.recv().await.unwrap()), id);
        let stats = Stats {
            current: 4.0,
            mean: 4.0,
            ..Stats::ZERO
        };
        responses
            .send(ChannelResponse { id, value: 4.0, stats })
            .await
            .unwrap();
        let fresh = gateway.collect(Instant::now() + DEFAULT_TIMEOUT).await;
        assert_eq!(fresh.freshness, Freshness::Fresh);

        // Second request never answered
        let stale = gateway.process(frame(&[1.0])).await;
        assert_eq!(stale.freshness, Freshness::Stale);
        assert_eq!(stale.value, 4.0);
        assert_eq!(stale.stats, stats);
    }

    #[tokio::test(start_paused = true)]
    async fn test_superseded_response_is_ignored() {
        let (mut gateway, mut requests, responses) = manual_gateway();

        let first = gateway.dispatch(frame(&[1.0])).unwrap();
        let second = gateway.dispatch(frame(&[2.0])).unwrap();
        assert!(second > first);
        assert_eq!(request_id(requests.recv().await.unwrap()), first);
        assert_eq!(request_id(requests.recv().await.unwrap()), second);

        // Late answer to the abandoned request arrives first
        responses
            .send(ChannelResponse {
                id: first,
                value: 100.0,
                stats: Stats::ZERO,
            })
            .await
            .unwrap();
        responses
            .send(ChannelResponse {
                id: second,
                value: 2.0,
                stats: Stats::ZERO,
            })
            .await
            .unwrap();

        let result = gateway.collect(Instant::now() + DEFAULT_TIMEOUT).await;
        assert_eq!(result.freshness, Freshness::Fresh);
        assert_eq!(result.value, 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_response_discarded_on_next_dispatch() {
        let (mut gateway, mut requests, responses) = manual_gateway();

        let first = gateway.dispatch(frame(&[1.0])).unwrap();
        requests.recv().await.unwrap();
        let missed = gateway.collect(Instant::now() + DEFAULT_TIMEOUT).await;
        assert_eq!(missed.freshness, Freshness::Default);

        responses
            .send(ChannelResponse {
                id: first,
                value: 100.0,
                stats: Stats::ZERO,
            })
            .await
            .unwrap();

        gateway.dispatch(frame(&[1.0])).unwrap();
        let result = gateway.collect(Instant::now() + DEFAULT_TIMEOUT).await;
        assert_eq!(result, AnalyzerResult::default_result());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_served_from_cache() {
        let (mut gateway, mut requests, responses) = manual_gateway();

        // The channel never reads: the first DEFAULT_QUEUE_DEPTH requests queue up
        for expected in 0..DEFAULT_QUEUE_DEPTH as u64 {
            assert_eq!(gateway.dispatch(frame(&[1.0])), Some(expected));
            let result = gateway.collect(Instant::now() + DEFAULT_TIMEOUT).await;
            assert_eq!(result, AnalyzerResult::default_result());
        }
        // Each queued request superseded the previous one
        assert_eq!(gateway.abandoned(), 3);

        for _ in 0..2 {
            assert_eq!(gateway.dispatch(frame(&[1.0])), None);
            let started = Instant::now();
            let result = gateway.collect(started + DEFAULT_TIMEOUT).await;
            assert_eq!(started.elapsed(), Duration::ZERO);
            assert_eq!(result, AnalyzerResult::default_result());
        }
        // The last queued request plus two refused dispatches
        assert_eq!(gateway.abandoned(), 6);
        assert!(gateway.is_active());

        // The channel wakes up and answers its whole backlog
        for _ in 0..DEFAULT_QUEUE_DEPTH {
            let id = request_id(requests.recv().await.unwrap());
            responses
                .send(ChannelResponse {
                    id,
                    value: 100.0,
                    stats: Stats::ZERO,
                })
                .await
                .unwrap();
        }

        let id = gateway.dispatch(frame(&[1.0])).unwrap();
        assert_eq!(id, DEFAULT_QUEUE_DEPTH as u64 + 2);
        assert_eq!(request_id(requests.recv().await.unwrap()), id);
        responses
            .send(ChannelResponse {
                id,
                value: 42.0,
                stats: Stats::ZERO,
            })
            .await
            .unwrap();

        let result = gateway.collect(Instant::now() + DEFAULT_TIMEOUT).await;
        assert_eq!(result.freshness, Freshness::Fresh);
        assert_eq!(result.value, 42.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_finite_response_sanitized() {
        let (mut gateway, mut requests, responses) = manual_gateway();

        let id = gateway.dispatch(frame(&[1.0])).unwrap();
        requests.recv().await.unwrap();
        responses
            .send(ChannelResponse {
                id,
                value: f64::NAN,
                stats: Stats {
                    z_score: f64::INFINITY,
                    ..Stats::EMPTY
                },
            })
            .await
            .unwrap();

        let result = gateway.collect(Instant::now() + DEFAULT_TIMEOUT).await;
        assert_eq!(result.value, 0.0);
        assert_eq!(result.stats.z_score, 0.0);
        assert!(result.stats.is_finite());
    }

    #[tokio::test(start_paused = true)]
    async fn test_exited_channel_reported_unavailable() {
        let (mut gateway, requests, responses) = manual_gateway();
        drop(requests);
        drop(responses);

        assert_eq!(gateway.dispatch(frame(&[1.0])), None);
        assert!(!gateway.is_active());
        assert_eq!(
            gateway.process(frame(&[1.0])).await,
            AnalyzerResult::default_result()
        );
        assert!(matches!(
            gateway.reset(),
            Err(ChannelError::Unavailable(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_size_validation() {
        let (mut gateway, mut requests, _responses) = manual_gateway();

        assert!(matches!(
            gateway.set_history_size(0),
            Err(ChannelError::InvalidHistorySize(0))
        ));
        gateway.set_history_size(16).unwrap();
        assert!(requests.try_recv().is_err());

        gateway.set_history_size(32).unwrap();
        assert_eq!(gateway.history_size(), 32);
        assert!(matches!(
            requests.recv().await,
            Some(ChannelRequest::Configure { history_size: 32 })
        ));
    }

    #[tokio::test]
    async fn test_live_channel_fresh_results() {
        let config = ChannelConfig::new("Energy", 4);
        let (handle, task) = AnalyzerChannel::start(&config, DEFAULT_QUEUE_DEPTH).unwrap();
        let mut gateway = RpcGateway::new("Energy", handle, 4, Duration::from_secs(5));

        let first = gateway.process(frame(&[2.0, 2.0])).await;
        assert_eq!(first.freshness, Freshness::Fresh);
        assert_eq!(first.value, 2.0);

        let second = gateway.process(frame(&[4.0, 4.0])).await;
        assert_eq!(second.value, 8.0);
        assert_eq!(second.stats.mean, 5.0);
        assert_eq!(second.stats.min, 2.0);
        assert_eq!(second.stats.max, 8.0);

        gateway.reset().unwrap();
        assert_eq!(gateway.last_result(), AnalyzerResult::default_result());
        let after_reset = gateway.process(frame(&[2.0, 2.0])).await;
        assert_eq!(after_reset.stats.mean, 2.0);

        drop(gateway);
        task.await.unwrap();
    }
}
