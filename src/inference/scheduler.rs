// src/inference/scheduler.rs
//! Periodic inference over the sample buffer
//!
//! Each tick checks connection health, then runs snapshot → condition →
//! window → features → classifier → publish. A tick either publishes a label
//! or is abandoned as a whole; failures and panics never escape `tick`.

use crate::acquisition::{to_channel_matrix, SampleBuffer};
use crate::error::{AffectError, AffectResult, ProcessingStage};
use crate::health::{ConnectionState, HealthTracker};
use crate::inference::classifier::{Classifier, ClassifierError, ClassifierInput};
use crate::inference::label::{EmotionLabel, LabelCell, Prediction};
use crate::inference::scaler::FeatureScaler;
use crate::processing::features::{FeatureExtractor, FeatureVector};
use crate::processing::windowing::{latest_window, normalize_window};
use crate::processing::SignalConditioner;
use crate::utils::time::{elapsed_since, TimeProvider};
use crossbeam::channel::{self, Receiver, Sender, TrySendError};
use ndarray::Array2;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Why a tick produced no prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NoData,
    Insufficient { have: usize, need: usize },
    Stale { silent_for: Duration },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoData => write!(f, "no data received yet"),
            SkipReason::Insufficient { have, need } => {
                write!(f, "buffer has {} samples (need {})", have, need)
            }
            SkipReason::Stale { silent_for } => {
                write!(f, "no samples for {:.1}s", silent_for.as_secs_f64())
            }
        }
    }
}

/// Result of a single tick
#[derive(Debug, Clone)]
pub enum TickOutcome {
    Published(Prediction),
    Skipped(SkipReason),
    Failed(AffectError),
}

impl TickOutcome {
    pub fn is_published(&self) -> bool {
        matches!(self, TickOutcome::Published(_))
    }
}

/// Lightweight summary broadcast after every tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickEvent {
    pub tick: u64,
    pub timestamp_nanos: u64,
    pub state: ConnectionState,
    pub kind: TickEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickEventKind {
    Published { label: EmotionLabel, confidence: f32 },
    Skipped(SkipReason),
    Failed { stage: Option<ProcessingStage>, message: String },
}

/// A recorded tick failure
#[derive(Debug, Clone)]
pub struct TickFailure {
    pub tick: u64,
    pub timestamp_nanos: u64,
    pub error: AffectError,
}

/// Scheduler counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerMetrics {
    pub ticks: u64,
    pub published: u64,
    pub skipped: u64,
    pub failed: u64,
    pub events_dropped: u64,
}

/// Everything derived from one snapshot, up to the classifier call
#[derive(Debug, Clone)]
pub struct PreparedWindow {
    /// Full conditioned snapshot, `[channels][samples]`
    pub conditioned: Array2<f64>,
    pub input: ClassifierInput,
}

/// Tunables for [`InferenceScheduler`]
#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub classifier_input_samples: usize,
    pub tick_interval: Duration,
    pub failure_history: usize,
    pub event_queue_size: usize,
}

pub struct InferenceScheduler {
    buffer: Arc<SampleBuffer>,
    health: HealthTracker,
    conditioner: SignalConditioner,
    extractor: FeatureExtractor,
    scaler: Option<FeatureScaler>,
    classifier: Arc<dyn Classifier>,
    label: LabelCell,
    time_provider: Arc<dyn TimeProvider>,
    settings: SchedulerSettings,

    failures: Mutex<VecDeque<TickFailure>>,
    events_tx: Sender<TickEvent>,
    events_rx: Receiver<TickEvent>,

    ticks: AtomicU64,
    published: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    events_dropped: AtomicU64,
}

impl InferenceScheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        buffer: Arc<SampleBuffer>,
        health: HealthTracker,
        conditioner: SignalConditioner,
        extractor: FeatureExtractor,
        scaler: Option<FeatureScaler>,
        classifier: Arc<dyn Classifier>,
        time_provider: Arc<dyn TimeProvider>,
        settings: SchedulerSettings,
    ) -> Self {
        let (events_tx, events_rx) = channel::bounded(settings.event_queue_size.max(1));

        Self {
            buffer,
            health,
            conditioner,
            extractor,
            scaler,
            classifier,
            label: LabelCell::new(),
            time_provider,
            failures: Mutex::new(VecDeque::with_capacity(settings.failure_history)),
            settings,
            events_tx,
            events_rx,
            ticks: AtomicU64::new(0),
            published: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            events_dropped: AtomicU64::new(0),
        }
    }

    /// Run one scheduling cycle
    pub fn tick(&self) -> TickOutcome {
        let tick = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;
        let now = self.time_provider.now_nanos();
        let status = self.buffer.status();
        let state = self.health.observe(&status, now);

        let outcome = match state {
            ConnectionState::NoData => TickOutcome::Skipped(SkipReason::NoData),
            ConnectionState::Collecting => TickOutcome::Skipped(SkipReason::Insufficient {
                have: status.size,
                need: self.health.required_samples(),
            }),
            ConnectionState::Stale => TickOutcome::Skipped(SkipReason::Stale {
                silent_for: status
                    .last_arrival_nanos
                    .map_or(Duration::ZERO, |last| elapsed_since(last, now)),
            }),
            ConnectionState::Ready => match self.run_guarded() {
                Ok(prediction) => {
                    self.label.publish(prediction.label, prediction.confidence);
                    TickOutcome::Published(prediction)
                }
                Err(error) => TickOutcome::Failed(error),
            },
        };

        self.record(tick, now, state, &outcome);
        outcome
    }

    /// Snapshot and prepare the classifier input without invoking the classifier
    pub fn prepare(&self) -> AffectResult<PreparedWindow> {
        let samples = self.buffer.snapshot();
        if samples.is_empty() {
            return Err(AffectError::Processing {
                stage: ProcessingStage::Snapshot,
                reason: "buffer is empty".to_string(),
                context: crate::error_context!("scheduler", "snapshot"),
            });
        }

        let raw = to_channel_matrix(&samples, self.buffer.channel_count());
        let conditioned = self.conditioner.condition(raw.view())?;
        let window = latest_window(conditioned.view(), self.settings.classifier_input_samples)?;
        let features: FeatureVector = self.extractor.extract(window.view())?;

        let mut classifier_window = normalize_window(window.view());
        if let Some(scaler) = &self.scaler {
            scaler.transform(&mut classifier_window)?;
        }

        Ok(PreparedWindow {
            conditioned,
            input: ClassifierInput {
                window: classifier_window,
                features,
            },
        })
    }

    fn run_guarded(&self) -> AffectResult<Prediction> {
        let result = panic::catch_unwind(AssertUnwindSafe(|| -> AffectResult<Prediction> {
            let prepared = self.prepare()?;
            let prediction = self.classifier.infer(&prepared.input)?;
            Ok(prediction)
        }));

        let prediction = match result {
            Ok(result) => result?,
            Err(payload) => {
                return Err(ClassifierError::Panicked(panic_message(payload.as_ref())).into())
            }
        };

        if !prediction.has_valid_confidence() {
            return Err(AffectError::Processing {
                stage: ProcessingStage::Publish,
                reason: format!("confidence {} outside [0, 1]", prediction.confidence),
                context: crate::error_context!("scheduler", "publish"),
            });
        }
        Ok(prediction)
    }

    fn record(&self, tick: u64, now: u64, state: ConnectionState, outcome: &TickOutcome) {
        let kind = match outcome {
            TickOutcome::Published(prediction) => {
                self.published.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(
                    tick,
                    label = %prediction.label,
                    confidence = prediction.confidence,
                    "published prediction"
                );
                TickEventKind::Published {
                    label: prediction.label,
                    confidence: prediction.confidence,
                }
            }
            TickOutcome::Skipped(reason) => {
                self.skipped.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(tick, state = %state, reason = %reason, "no prediction");
                TickEventKind::Skipped(*reason)
            }
            TickOutcome::Failed(error) => {
                self.failed.fetch_add(1, Ordering::Relaxed);
                let stage = error.stage();
                tracing::error!(
                    tick,
                    stage = stage.map(|s| s.to_string()).unwrap_or_default(),
                    error = %error,
                    "tick abandoned"
                );

                let mut failures = self.failures.lock();
                if self.settings.failure_history > 0 {
                    if failures.len() == self.settings.failure_history {
                        failures.pop_front();
                    }
                    failures.push_back(TickFailure {
                        tick,
                        timestamp_nanos: now,
                        error: error.clone(),
                    });
                }

                TickEventKind::Failed {
                    stage,
                    message: error.to_string(),
                }
            }
        };

        let event = TickEvent {
            tick,
            timestamp_nanos: now,
            state,
            kind,
        };
        // Full queue: shed the oldest event
        let mut pending = event;
        while let Err(TrySendError::Full(rejected)) = self.events_tx.try_send(pending) {
            if self.events_rx.try_recv().is_ok() {
                self.events_dropped.fetch_add(1, Ordering::Relaxed);
            }
            pending = rejected;
        }
    }

    /// Latest published label, if any
    pub fn current_label(&self) -> Option<(EmotionLabel, f32)> {
        self.label.load()
    }

    /// Evaluate health now and log any transition
    pub fn connection_state(&self) -> ConnectionState {
        self.health
            .observe(&self.buffer.status(), self.time_provider.now_nanos())
    }

    /// Receiver shared by all subscribers; each event is delivered once
    pub fn events(&self) -> Receiver<TickEvent> {
        self.events_rx.clone()
    }

    /// Most recent failures, oldest first
    pub fn recent_failures(&self) -> Vec<TickFailure> {
        self.failures.lock().iter().cloned().collect()
    }

    pub fn metrics(&self) -> SchedulerMetrics {
        SchedulerMetrics {
            ticks: self.ticks.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
        }
    }

    pub fn buffer(&self) -> &Arc<SampleBuffer> {
        &self.buffer
    }

    pub fn health(&self) -> &HealthTracker {
        &self.health
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    pub fn tick_interval(&self) -> Duration {
        self.settings.tick_interval
    }

    /// Tick on a fixed period until `shutdown` turns true or its sender is dropped
    ///
    /// The first tick fires one period after start. CPU-bound work runs on
    /// the blocking pool; a slow tick delays the next one rather than
    /// stacking up.
    #[cfg(feature = "tokio")]
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        use tokio::time::{interval_at, Instant, MissedTickBehavior};

        let period = self.settings.tick_interval;
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        tracing::info!(
            period_ms = period.as_millis() as u64,
            classifier = self.classifier_name(),
            "inference scheduler started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let scheduler = Arc::clone(&self);
                    if let Err(err) = tokio::task::spawn_blocking(move || scheduler.tick()).await {
                        tracing::error!(error = %err, "tick task did not complete");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        tracing::info!(ticks = self.metrics().ticks, "inference scheduler stopped");
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::inference::classifier::LinearSoftmaxClassifier;
    use crate::utils::time::MockTimeProvider;

    struct PanickingClassifier;

    impl Classifier for PanickingClassifier {
        fn infer(&self, _input: &ClassifierInput) -> Result<Prediction, ClassifierError> {
            panic!("model exploded");
        }
    }

    fn scheduler(
        classifier: Arc<dyn Classifier>,
        required: usize,
    ) -> (InferenceScheduler, Arc<MockTimeProvider>) {
        let config = PipelineConfig::default();
        let clock = Arc::new(MockTimeProvider::new(0));
        let buffer = Arc::new(SampleBuffer::new(256, 4, clock.clone()).unwrap());
        let scheduler = InferenceScheduler::new(
            buffer,
            HealthTracker::new(required, Duration::from_secs(10)),
            SignalConditioner::new(&config.signal, &config.filter).unwrap(),
            FeatureExtractor::new(256.0, 4, config.features.bands.clone(), 128),
            None,
            classifier,
            clock.clone(),
            SchedulerSettings {
                classifier_input_samples: 128,
                tick_interval: Duration::from_secs(3),
                failure_history: 2,
                event_queue_size: 4,
            },
        );
        (scheduler, clock)
    }

    fn fill(scheduler: &InferenceScheduler, count: usize) {
        for i in 0..count {
            let v = (i as f32 * 0.3).sin() * 10.0;
            scheduler.buffer().ingest_values(&[v, -v, v * 0.5, 1.0], i as u64).unwrap();
        }
    }

    #[test]
    fn test_skip_without_data() {
        let (scheduler, _) = scheduler(
            Arc::new(LinearSoftmaxClassifier::constant(EmotionLabel::Neutral, 60)),
            200,
        );

        assert!(matches!(scheduler.tick(), TickOutcome::Skipped(SkipReason::NoData)));
        assert_eq!(scheduler.current_label(), None);
    }

    #[test]
    fn test_skip_reports_fill_level() {
        let (scheduler, _) = scheduler(
            Arc::new(LinearSoftmaxClassifier::constant(EmotionLabel::Neutral, 60)),
            200,
        );
        fill(&scheduler, 50);

        match scheduler.tick() {
            TickOutcome::Skipped(reason) => {
                assert_eq!(reason, SkipReason::Insufficient { have: 50, need: 200 });
                assert_eq!(reason.to_string(), "buffer has 50 samples (need 200)");
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[test]
    fn test_publishes_when_ready() {
        let (scheduler, _) = scheduler(
            Arc::new(LinearSoftmaxClassifier::constant(EmotionLabel::Positive, 60)),
            200,
        );
        fill(&scheduler, 200);

        assert!(scheduler.tick().is_published());
        let (label, confidence) = scheduler.current_label().unwrap();
        assert_eq!(label, EmotionLabel::Positive);
        assert!((0.0..=1.0).contains(&confidence));

        let event = scheduler.events().try_recv().unwrap();
        assert_eq!(event.state, ConnectionState::Ready);
    }

    #[test]
    fn test_panic_is_contained() {
        let (scheduler, _) = scheduler(Arc::new(PanickingClassifier), 100);
        fill(&scheduler, 100);

        match scheduler.tick() {
            TickOutcome::Failed(err) => {
                assert_eq!(err.stage(), Some(ProcessingStage::Inference));
                assert!(err.to_string().contains("model exploded"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(scheduler.current_label(), None);
        assert_eq!(scheduler.metrics().failed, 1);
    }

    #[test]
    fn test_failure_history_is_bounded() {
        let (scheduler, _) = scheduler(
            Arc::new(LinearSoftmaxClassifier::constant(EmotionLabel::Positive, 7)),
            100,
        );
        fill(&scheduler, 100);

        for _ in 0..5 {
            assert!(matches!(scheduler.tick(), TickOutcome::Failed(_)));
        }
        let failures = scheduler.recent_failures();
        assert_eq!(failures.len(), 2);
        assert_eq!(failures[0].tick, 4);
        assert_eq!(failures[1].tick, 5);
    }

    #[test]
    fn test_stale_after_timeout() {
        let (scheduler, clock) = scheduler(
            Arc::new(LinearSoftmaxClassifier::constant(EmotionLabel::Positive, 60)),
            100,
        );
        fill(&scheduler, 100);
        clock.advance(Duration::from_secs(11));

        match scheduler.tick() {
            TickOutcome::Skipped(SkipReason::Stale { silent_for }) => {
                assert_eq!(silent_for, Duration::from_secs(11));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
        assert_eq!(scheduler.connection_state(), ConnectionState::Stale);
    }

    #[test]
    fn test_full_event_queue_counts_drops() {
        let (scheduler, _) = scheduler(
            Arc::new(LinearSoftmaxClassifier::constant(EmotionLabel::Positive, 60)),
            100,
        );
        for _ in 0..6 {
            scheduler.tick();
        }
        let metrics = scheduler.metrics();
        assert_eq!(metrics.ticks, 6);
        assert_eq!(metrics.skipped, 6);
        assert_eq!(metrics.events_dropped, 2);

        let retained: Vec<u64> = scheduler.events().try_iter().map(|e| e.tick).collect();
        assert_eq!(retained, vec![3, 4, 5, 6]);
    }
}
