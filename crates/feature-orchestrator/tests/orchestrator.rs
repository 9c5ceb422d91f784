use feature_orchestrator::{
    init_logging, AnalyzerEntry, EngineConfig, FeatureOrchestrator, FeatureValue, SpectrumFrame,
    BEAT_KEY,
};
use std::collections::VecDeque;
use std::sync::Arc;

fn frame(bins: &[f64]) -> Option<SpectrumFrame> {
    Some(Arc::from(bins))
}

/// Source replaying `frames`, then silence
fn replay(frames: Vec<Option<SpectrumFrame>>) -> impl FnMut() -> Option<SpectrumFrame> + Send {
    let mut frames = VecDeque::from(frames);
    move || frames.pop_front().flatten()
}

fn config(analyzers: &[&str]) -> EngineConfig {
    EngineConfig {
        analyzers: analyzers.iter().copied().map(AnalyzerEntry::from).collect(),
        history_size: 8,
        timeout_ms: 1_000,
        ..EngineConfig::default()
    }
}

fn close(actual: Option<f64>, expected: f64) -> bool {
    actual.map_or(false, |v| (v - expected).abs() < 1e-9)
}

#[tokio::test]
async fn test_tick_publishes_flat_map() {
    init_logging();
    let spectrum = [0.0, 1.0, 2.0, 1.0, 0.0];
    let source = replay(vec![frame(&spectrum), frame(&spectrum)]);
    let mut orchestrator =
        FeatureOrchestrator::start(&config(&["Energy", "SpectralCentroid"]), source).unwrap();
    assert_eq!(orchestrator.active_channels(), 2);

    // Hanning turns the frame into [0, 0.5, 2, 0.5, 0]
    let first = orchestrator.tick().await;
    assert_eq!(first.len(), 16);
    assert!(close(first.number("energy"), 0.18));
    assert!(close(first.number("spectralCentroid"), 0.75));
    assert!(close(first.number("energyMean"), 0.18));
    assert!(close(first.number("energyNormalized"), 0.0));

    let second = orchestrator.tick().await;
    assert!(close(second.number("energyMean"), 0.18));
    assert!(close(second.number("energyStandardDeviation"), 0.0));
    assert!(close(second.number("energyZScore"), 0.0));
    assert!(close(second.number("energyMin"), 0.18));
    assert!(close(second.number("energyMax"), 0.18));
    assert!(close(second.number("energyMedian"), 0.18));
    assert_eq!(orchestrator.ticks(), 2);

    let json = second.to_json().unwrap();
    assert!(json.contains("\"spectralCentroidZScore\""));

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_failed_channel_is_zeroed() {
    let source = replay(vec![frame(&[0.0, 1.0, 2.0, 1.0, 0.0])]);
    let mut orchestrator =
        FeatureOrchestrator::start(&config(&["Energy", "Wobble"]), source).unwrap();
    assert_eq!(orchestrator.active_channels(), 1);

    let map = orchestrator.tick().await;
    assert!(close(map.number("energy"), 0.18));
    assert_eq!(map.number("wobble"), Some(0.0));
    assert_eq!(map.number("wobbleMean"), Some(0.0));
    assert_eq!(map.number("wobbleZScore"), Some(0.0));

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_silent_frames_republish_cached_values() {
    let source = replay(vec![
        frame(&[0.0, 1.0, 2.0, 1.0, 0.0]),
        None,
        frame(&[0.0; 5]),
    ]);
    let mut orchestrator = FeatureOrchestrator::start(&config(&["Energy"]), source).unwrap();

    let heard = orchestrator.tick().await;
    let missing = orchestrator.tick().await;
    let silent = orchestrator.tick().await;

    assert_eq!(heard, missing);
    assert_eq!(heard, silent);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_beat_flag_follows_flux() {
    let quiet = [0.0, 1.0, 1.0, 1.0, 0.0];
    let loud = [0.0, 100.0, 100.0, 100.0, 0.0];
    let source = replay(vec![
        frame(&quiet),
        frame(&quiet),
        frame(&quiet),
        frame(&quiet),
        frame(&loud),
    ]);
    let mut orchestrator =
        FeatureOrchestrator::start(&config(&["Energy", "SpectralFlux"]), source).unwrap();

    let mut last = orchestrator.latest();
    assert_eq!(last.flag(BEAT_KEY), Some(false));
    for _ in 0..4 {
        last = orchestrator.tick().await;
        assert_eq!(last.get(BEAT_KEY), Some(FeatureValue::Flag(false)));
    }

    let onset = orchestrator.tick().await;
    assert_eq!(onset.flag(BEAT_KEY), Some(true));
    assert!(onset.number("spectralFluxZScore").unwrap_or(0.0) > 0.9);

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_subscribers_see_every_tick() {
    let source = replay(vec![frame(&[0.0, 1.0, 2.0, 1.0, 0.0])]);
    let mut orchestrator = FeatureOrchestrator::start(&config(&["Energy"]), source).unwrap();
    let mut updates = orchestrator.subscribe();
    assert_eq!(updates.borrow().number("energy"), Some(0.0));

    let published = orchestrator.tick().await;
    updates.changed().await.unwrap();
    assert!(Arc::ptr_eq(&updates.borrow_and_update(), &published));

    orchestrator.shutdown().await;
}

#[tokio::test]
async fn test_reconfigure_and_reset() {
    let spectrum = [0.0, 1.0, 2.0, 1.0, 0.0];
    let doubled = [0.0, 2.0, 4.0, 2.0, 0.0];
    let source = replay(vec![frame(&spectrum), frame(&doubled), frame(&doubled)]);
    let mut orchestrator = FeatureOrchestrator::start(&config(&["Energy"]), source).unwrap();

    orchestrator.tick().await;
    orchestrator.set_history_size(1).unwrap();
    let resized = orchestrator.tick().await;
    assert!(close(resized.number("energyMin"), 0.72));
    assert!(close(resized.number("energyMax"), 0.72));

    orchestrator.reset();
    let after_reset = orchestrator.tick().await;
    assert!(close(after_reset.number("energyMean"), 0.72));

    orchestrator.shutdown().await;
}
