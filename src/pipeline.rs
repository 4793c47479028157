// src/pipeline.rs
//! Owned pipeline state behind `Arc`: buffer, scheduler and status surface

use crate::acquisition::{BufferMetrics, Sample, SampleBuffer};
use crate::config::PipelineConfig;
use crate::error::{AffectError, AffectErrorBuilder, AffectResult};
use crate::health::{ConnectionState, HealthTracker};
use crate::inference::{
    Classifier, EmotionLabel, FeatureScaler, InferenceScheduler, SchedulerMetrics,
    SchedulerSettings, SkipReason, TickEvent, TickFailure, TickOutcome,
};
use crate::processing::features::{FeatureExtractor, FeatureVector};
use crate::processing::{preprocess_recording, PreprocessedRecording, SignalConditioner};
use crate::utils::time::{elapsed_since, SystemTimeProvider, TimeProvider};
use crossbeam::channel::Receiver;
use ndarray::{Array2, ArrayView2};
use std::sync::Arc;

/// Intermediate data of the most recent window, for inspection
#[derive(Debug, Clone)]
pub struct WindowDiagnostics {
    pub channel_labels: Vec<String>,
    pub state: ConnectionState,
    /// Whole conditioned snapshot
    pub conditioned: Array2<f64>,
    /// Normalised (and scaled, if configured) classifier window
    pub classifier_window: Array2<f64>,
    pub features: FeatureVector,
}

/// Assembles an [`AffectPipeline`], checking every fatal condition up front
pub struct PipelineBuilder {
    config: PipelineConfig,
    classifier: Option<Arc<dyn Classifier>>,
    scaler: Option<FeatureScaler>,
    time_provider: Arc<dyn TimeProvider>,
}

impl PipelineBuilder {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            classifier: None,
            scaler: None,
            time_provider: Arc::new(SystemTimeProvider),
        }
    }

    pub fn classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn scaler(mut self, scaler: FeatureScaler) -> Self {
        self.scaler = Some(scaler);
        self
    }

    pub fn time_provider(mut self, time_provider: Arc<dyn TimeProvider>) -> Self {
        self.time_provider = time_provider;
        self
    }

    pub fn build(self) -> AffectResult<AffectPipeline> {
        let config = self.config;
        config.validate()?;

        let classifier = self.classifier.ok_or_else(|| {
            AffectErrorBuilder::new("pipeline_builder", "build").configuration("no classifier supplied")
        })?;

        let signal = &config.signal;
        let input_len = config.inference.classifier_input_samples;
        let extractor = FeatureExtractor::new(
            signal.sampling_rate_hz,
            signal.channel_count,
            config.features.bands.clone(),
            input_len,
        );

        let mut problems = Vec::new();
        if let Some(expected) = classifier.expected_feature_len() {
            if expected != extractor.layout().len() {
                problems.push(format!(
                    "classifier expects {} features, pipeline produces {}",
                    expected,
                    extractor.layout().len()
                ));
            }
        }
        if let Some(scaler) = &self.scaler {
            let window_values = signal.channel_count * input_len;
            if scaler.len() != window_values {
                problems.push(format!(
                    "scaler fitted on {} values, classifier window has {}",
                    scaler.len(),
                    window_values
                ));
            }
        }

        let conditioner = SignalConditioner::new(signal, &config.filter)
            .map_err(|e| problems_error(vec![e.to_string()]));
        let buffer = SampleBuffer::new(
            signal.buffer_capacity,
            signal.channel_count,
            Arc::clone(&self.time_provider),
        )
        .map_err(|e| problems_error(vec![e.to_string()]));

        if !problems.is_empty() {
            return Err(problems_error(problems));
        }
        let conditioner = conditioner?;
        let buffer = Arc::new(buffer?);

        let batch = BatchPreprocessor {
            conditioner: conditioner.clone(),
            extractor: FeatureExtractor::new(
                signal.sampling_rate_hz,
                signal.channel_count,
                config.features.bands.clone(),
                config.features.window_samples,
            ),
        };

        let health = HealthTracker::new(config.required_samples(), config.inference.data_timeout());
        let scheduler = InferenceScheduler::new(
            Arc::clone(&buffer),
            health,
            conditioner,
            extractor,
            self.scaler,
            classifier,
            Arc::clone(&self.time_provider),
            SchedulerSettings {
                classifier_input_samples: input_len,
                tick_interval: config.inference.tick_interval(),
                failure_history: config.inference.failure_history,
                event_queue_size: config.inference.event_queue_size,
            },
        );

        tracing::info!(
            channels = signal.channel_count,
            sampling_rate_hz = signal.sampling_rate_hz,
            buffer_capacity = signal.buffer_capacity,
            required_samples = config.required_samples(),
            classifier = scheduler.classifier_name(),
            "affect pipeline built"
        );

        Ok(AffectPipeline {
            config,
            buffer,
            batch,
            scheduler: Arc::new(scheduler),
            time_provider: self.time_provider,
        })
    }
}

fn problems_error(reasons: Vec<String>) -> AffectError {
    AffectError::Configuration {
        component: "pipeline_builder".to_string(),
        reasons,
        context: crate::error_context!("pipeline_builder", "build"),
    }
}

/// Offline conditioning and featurisation sized by the feature config
struct BatchPreprocessor {
    conditioner: SignalConditioner,
    extractor: FeatureExtractor,
}

/// Ingest, status and scheduling entry points
pub struct AffectPipeline {
    config: PipelineConfig,
    buffer: Arc<SampleBuffer>,
    batch: BatchPreprocessor,
    scheduler: Arc<InferenceScheduler>,
    time_provider: Arc<dyn TimeProvider>,
}

impl AffectPipeline {
    pub fn builder(config: PipelineConfig) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }

    /// Build with the wall clock and no scaler
    pub fn new(config: PipelineConfig, classifier: Arc<dyn Classifier>) -> AffectResult<Self> {
        Self::builder(config).classifier(classifier).build()
    }

    /// Entry point for the transport collaborator
    pub fn ingest_sample(&self, channels: &[f32], timestamp: u64) -> AffectResult<()> {
        self.buffer.ingest_values(channels, timestamp)?;
        Ok(())
    }

    pub fn ingest(&self, sample: Sample) -> AffectResult<()> {
        self.buffer.ingest(sample)?;
        Ok(())
    }

    pub fn current_label(&self) -> Option<(EmotionLabel, f32)> {
        self.scheduler.current_label()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.scheduler.connection_state()
    }

    /// Run the pre-classifier stages on the current buffer
    pub fn raw_window_snapshot(&self) -> AffectResult<WindowDiagnostics> {
        let state = self.connection_state();
        let prepared = self.scheduler.prepare()?;

        Ok(WindowDiagnostics {
            channel_labels: self.config.signal.channel_labels.clone(),
            state,
            conditioned: prepared.conditioned,
            classifier_window: prepared.input.window,
            features: prepared.input.features,
        })
    }

    /// Condition a whole `[channels][samples]` recording and featurise every
    /// configured sliding window
    pub fn preprocess(&self, raw: ArrayView2<'_, f64>) -> AffectResult<PreprocessedRecording> {
        let expected = self.config.signal.channel_count;
        if raw.nrows() != expected {
            return Err(AffectErrorBuilder::new("pipeline", "preprocess").invalid_sample(&format!(
                "recording has {} channels, pipeline expects {}",
                raw.nrows(),
                expected
            )));
        }

        let features = &self.config.features;
        preprocess_recording(
            raw,
            &self.batch.conditioner,
            &self.batch.extractor,
            features.window_samples,
            features.window_overlap,
        )
    }

    pub fn tick(&self) -> TickOutcome {
        self.scheduler.tick()
    }

    /// One-line human summary of state and label
    pub fn status_line(&self) -> String {
        let state = self.connection_state();
        let status = self.buffer.status();

        let detail = match state {
            ConnectionState::NoData => SkipReason::NoData.to_string(),
            ConnectionState::Collecting => SkipReason::Insufficient {
                have: status.size,
                need: self.config.required_samples(),
            }
            .to_string(),
            ConnectionState::Stale => {
                let silent_for = status
                    .last_arrival_nanos
                    .map(|last| elapsed_since(last, self.time_provider.now_nanos()))
                    .unwrap_or_default();
                SkipReason::Stale { silent_for }.to_string()
            }
            ConnectionState::Ready => match self.current_label() {
                Some((label, confidence)) => format!("{} ({:.2})", label, confidence),
                None => "awaiting first prediction".to_string(),
            },
        };

        format!("{}: {}", state, detail)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn buffer(&self) -> &Arc<SampleBuffer> {
        &self.buffer
    }

    pub fn scheduler(&self) -> &Arc<InferenceScheduler> {
        &self.scheduler
    }

    pub fn buffer_metrics(&self) -> BufferMetrics {
        self.buffer.metrics()
    }

    pub fn scheduler_metrics(&self) -> SchedulerMetrics {
        self.scheduler.metrics()
    }

    pub fn recent_failures(&self) -> Vec<TickFailure> {
        self.scheduler.recent_failures()
    }

    pub fn events(&self) -> Receiver<TickEvent> {
        self.scheduler.events()
    }

    /// Start the periodic scheduler on the current tokio runtime
    #[cfg(feature = "tokio")]
    pub fn spawn_scheduler(
        &self,
        shutdown: tokio::sync::watch::Receiver<bool>,
    ) -> tokio::task::JoinHandle<()> {
        tokio::spawn(Arc::clone(&self.scheduler).run(shutdown))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::LinearSoftmaxClassifier;
    use crate::utils::time::MockTimeProvider;

    fn pipeline(config: PipelineConfig) -> (AffectPipeline, Arc<MockTimeProvider>) {
        let clock = Arc::new(MockTimeProvider::new(0));
        let pipeline = AffectPipeline::builder(config)
            .classifier(Arc::new(LinearSoftmaxClassifier::constant(EmotionLabel::Neutral, 60)))
            .time_provider(clock.clone())
            .build()
            .unwrap();
        (pipeline, clock)
    }

    #[test]
    fn test_missing_classifier_is_fatal() {
        let err = PipelineBuilder::new(PipelineConfig::default()).build().err().unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_window_longer_than_buffer_is_fatal() {
        let mut config = PipelineConfig::default();
        config.inference.classifier_input_samples = 7680;
        let err = AffectPipeline::new(
            config,
            Arc::new(LinearSoftmaxClassifier::constant(EmotionLabel::Neutral, 60)),
        )
        .err()
        .unwrap();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_feature_length_mismatch_is_fatal() {
        let err = AffectPipeline::new(
            PipelineConfig::default(),
            Arc::new(LinearSoftmaxClassifier::constant(EmotionLabel::Neutral, 59)),
        )
        .err()
        .unwrap();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("classifier expects 59 features"));
    }

    #[test]
    fn test_scaler_length_mismatch_is_fatal() {
        let err = AffectPipeline::builder(PipelineConfig::default())
            .classifier(Arc::new(LinearSoftmaxClassifier::constant(EmotionLabel::Neutral, 60)))
            .scaler(FeatureScaler::new(vec![0.0; 10], vec![1.0; 10]).unwrap())
            .build()
            .err()
            .unwrap();
        assert!(err.to_string().contains("scaler fitted on 10 values"));
    }

    #[test]
    fn test_status_line_reports_fill() {
        let (pipeline, _) = pipeline(PipelineConfig::default());
        assert_eq!(pipeline.status_line(), "NO_DATA: no data received yet");

        for i in 0..10 {
            pipeline.ingest_sample(&[1.0, 2.0, 3.0, 4.0], i).unwrap();
        }
        assert_eq!(
            pipeline.status_line(),
            "COLLECTING: buffer has 10 samples (need 2560)"
        );
    }

    #[test]
    fn test_rejected_sample_leaves_buffer_untouched() {
        let (pipeline, _) = pipeline(PipelineConfig::default());
        let err = pipeline.ingest_sample(&[1.0, f32::NAN, 3.0, 4.0], 0).unwrap_err();

        assert!(matches!(err, AffectError::InvalidSample { .. }));
        assert_eq!(pipeline.buffer().size(), 0);
        assert_eq!(pipeline.connection_state(), ConnectionState::NoData);
    }

    #[test]
    fn test_preprocess_uses_configured_windows() {
        let mut config = PipelineConfig::default();
        config.features.window_samples = 256;
        config.features.window_overlap = 0.75;
        let (pipeline, _) = pipeline(config);

        let raw = Array2::from_shape_fn((4, 1024), |(c, i)| ((c + 1) as f64 * i as f64 * 0.07).sin() * 15.0);
        let out = pipeline.preprocess(raw.view()).unwrap();

        // (1024 - 256) / 64 + 1
        assert_eq!(out.window_count(), 13);
        assert_eq!(out.windows.dim(), (13, 4, 256));
        assert_eq!(out.combined_features.dim(), (13, 60));
    }

    #[test]
    fn test_preprocess_rejects_wrong_channel_count() {
        let (pipeline, _) = pipeline(PipelineConfig::default());
        let raw = Array2::zeros((3, 1024));

        let err = pipeline.preprocess(raw.view()).unwrap_err();
        assert!(matches!(err, AffectError::InvalidSample { .. }));
        assert!(err.to_string().contains("recording has 3 channels"));
    }

    #[test]
    fn test_window_snapshot_shapes() {
        let mut config = PipelineConfig::default();
        config.inference.required_samples = Some(64);
        let (pipeline, _) = pipeline(config);
        for i in 0..64 {
            let v = (i as f32 * 0.2).sin();
            pipeline.ingest_sample(&[v, v, v, v], i).unwrap();
        }

        let diagnostics = pipeline.raw_window_snapshot().unwrap();
        assert_eq!(diagnostics.channel_labels, vec!["TP9", "AF7", "AF8", "TP10"]);
        assert_eq!(diagnostics.conditioned.dim(), (4, 64));
        assert_eq!(diagnostics.classifier_window.dim(), (4, 128));
        assert_eq!(diagnostics.features.len(), 60);
        assert_eq!(diagnostics.state, ConnectionState::Ready);
    }
}
