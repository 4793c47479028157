// tests/scheduler_tests.rs
//! End-to-end scheduling: readiness, label retention, staleness and the async loop

use affect_core::inference::{
    Classifier, ClassifierError, ClassifierInput, LinearSoftmaxClassifier, SkipReason,
    TickEventKind,
};
use affect_core::simulation::{SyntheticConfig, SyntheticEeg};
use affect_core::{
    AffectPipeline, ConnectionState, EmotionLabel, MockTimeProvider, PipelineConfig, Prediction,
    TickOutcome,
};
use serial_test::serial;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Classifier that can be switched into a failing mode
struct FlakyClassifier {
    inner: LinearSoftmaxClassifier,
    failing: AtomicBool,
}

impl Classifier for FlakyClassifier {
    fn infer(&self, input: &ClassifierInput) -> Result<Prediction, ClassifierError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ClassifierError::Model("backend unavailable".to_string()));
        }
        self.inner.infer(input)
    }

    fn name(&self) -> &str {
        "flaky"
    }
}

fn pipeline_with(classifier: Arc<dyn Classifier>) -> (AffectPipeline, Arc<MockTimeProvider>) {
    let clock = Arc::new(MockTimeProvider::new(1_000_000_000));
    let pipeline = AffectPipeline::builder(PipelineConfig::default())
        .classifier(classifier)
        .time_provider(clock.clone())
        .build()
        .unwrap();
    (pipeline, clock)
}

fn feed(pipeline: &AffectPipeline, source: &mut SyntheticEeg, count: usize) {
    for sample in source.take_samples(count) {
        pipeline.ingest(sample).unwrap();
    }
}

#[test]
fn test_full_buffer_yields_label() {
    let (pipeline, _) = pipeline_with(Arc::new(LinearSoftmaxClassifier::constant(
        EmotionLabel::Negative,
        60,
    )));
    let mut source = SyntheticEeg::new(SyntheticConfig::default());
    feed(&pipeline, &mut source, 2560);

    assert_eq!(pipeline.connection_state(), ConnectionState::Ready);
    assert!(pipeline.tick().is_published());

    let (label, confidence) = pipeline.current_label().unwrap();
    assert_eq!(label, EmotionLabel::Negative);
    assert!((0.0..=1.0).contains(&confidence));
    assert!(pipeline.status_line().starts_with("READY: NEGATIVE"));
}

#[test]
fn test_empty_buffer_gives_no_prediction() {
    let (pipeline, _) = pipeline_with(Arc::new(LinearSoftmaxClassifier::constant(
        EmotionLabel::Positive,
        60,
    )));

    assert!(matches!(pipeline.tick(), TickOutcome::Skipped(SkipReason::NoData)));
    assert_eq!(pipeline.current_label(), None);

    let event = pipeline.events().try_recv().unwrap();
    assert_eq!(event.state, ConnectionState::NoData);
    assert!(matches!(event.kind, TickEventKind::Skipped(_)));
}

#[test]
fn test_failed_tick_keeps_previous_label() {
    let classifier = Arc::new(FlakyClassifier {
        inner: LinearSoftmaxClassifier::constant(EmotionLabel::Positive, 60),
        failing: AtomicBool::new(false),
    });
    let (pipeline, _) = pipeline_with(classifier.clone());
    let mut source = SyntheticEeg::new(SyntheticConfig::default());
    feed(&pipeline, &mut source, 2560);

    assert!(pipeline.tick().is_published());
    let before = pipeline.current_label();

    classifier.failing.store(true, Ordering::SeqCst);
    assert!(matches!(pipeline.tick(), TickOutcome::Failed(_)));
    assert_eq!(pipeline.current_label(), before);

    let failures = pipeline.recent_failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].error.to_string().contains("backend unavailable"));

    let metrics = pipeline.scheduler_metrics();
    assert_eq!(metrics.published, 1);
    assert_eq!(metrics.failed, 1);
}

#[test]
fn test_stale_then_recovers_on_fresh_sample() {
    let (pipeline, clock) = pipeline_with(Arc::new(LinearSoftmaxClassifier::constant(
        EmotionLabel::Neutral,
        60,
    )));
    let mut source = SyntheticEeg::new(SyntheticConfig::default());
    feed(&pipeline, &mut source, 2560);
    assert!(pipeline.tick().is_published());

    clock.advance(Duration::from_millis(10_000));
    assert_eq!(pipeline.connection_state(), ConnectionState::Ready);

    clock.advance(Duration::from_millis(1));
    assert!(matches!(pipeline.tick(), TickOutcome::Skipped(SkipReason::Stale { .. })));
    assert_eq!(pipeline.connection_state(), ConnectionState::Stale);
    assert!(pipeline.status_line().starts_with("STALE: no samples for"));
    assert!(pipeline.current_label().is_some());

    feed(&pipeline, &mut source, 1);
    assert_eq!(pipeline.connection_state(), ConnectionState::Ready);
    assert!(pipeline.tick().is_published());
}

#[test]
fn test_stale_partial_buffer_recovers_to_collecting() {
    let (pipeline, clock) = pipeline_with(Arc::new(LinearSoftmaxClassifier::constant(
        EmotionLabel::Neutral,
        60,
    )));
    let mut source = SyntheticEeg::new(SyntheticConfig::default());
    feed(&pipeline, &mut source, 300);

    clock.advance(Duration::from_secs(30));
    assert_eq!(pipeline.connection_state(), ConnectionState::Stale);

    feed(&pipeline, &mut source, 1);
    assert_eq!(pipeline.connection_state(), ConnectionState::Collecting);
    assert_eq!(
        pipeline.status_line(),
        "COLLECTING: buffer has 301 samples (need 2560)"
    );
}

#[tokio::test(start_paused = true)]
#[serial]
async fn test_run_loop_ticks_until_shutdown() {
    let (pipeline, _) = pipeline_with(Arc::new(LinearSoftmaxClassifier::constant(
        EmotionLabel::Positive,
        60,
    )));
    let mut source = SyntheticEeg::new(SyntheticConfig::default());
    feed(&pipeline, &mut source, 2560);

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle = pipeline.spawn_scheduler(shutdown_rx);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(pipeline.scheduler_metrics().ticks, 0);

    tokio::time::sleep(Duration::from_secs(8)).await;
    shutdown_tx.send(true).unwrap();
    handle.await.unwrap();

    let metrics = pipeline.scheduler_metrics();
    assert!(metrics.ticks >= 1);
    assert_eq!(metrics.published, metrics.ticks);
    assert_eq!(pipeline.current_label().map(|(l, _)| l), Some(EmotionLabel::Positive));
}

#[tokio::test(start_paused = true)]
#[serial]
async fn test_run_loop_stops_when_sender_dropped() {
    let (pipeline, _) = pipeline_with(Arc::new(LinearSoftmaxClassifier::constant(
        EmotionLabel::Positive,
        60,
    )));

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handle = pipeline.spawn_scheduler(shutdown_rx);
    drop(shutdown_tx);

    tokio::time::timeout(Duration::from_secs(1), handle)
        .await
        .expect("scheduler did not stop")
        .unwrap();
    assert_eq!(pipeline.scheduler_metrics().ticks, 0);
}
