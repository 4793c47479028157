// src/config/mod.rs
//! Pipeline configuration
//!
//! Every field has a default backed by [`constants`], so a partial TOML file
//! (or none at all) yields a usable configuration. [`PipelineConfig::validate`]
//! collects every fatal problem before the pipeline is built; nothing here is
//! re-checked on the hot path.

pub mod constants;
pub mod loader;

pub use constants::*;
pub use loader::{ConfigError, ConfigLoader};

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Complete pipeline configuration
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub features: FeatureConfig,
    #[serde(default)]
    pub inference: InferenceConfig,
}

/// Acquisition settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SignalConfig {
    #[serde(default = "defaults::sampling_rate_hz")]
    pub sampling_rate_hz: f64,

    #[serde(default = "defaults::channel_count")]
    pub channel_count: usize,

    #[serde(default = "defaults::channel_labels")]
    pub channel_labels: Vec<String>,

    #[serde(default = "defaults::buffer_capacity")]
    pub buffer_capacity: usize,
}

/// Conditioning settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FilterConfig {
    #[serde(default = "defaults::bandpass_low_hz")]
    pub bandpass_low_hz: f64,

    #[serde(default = "defaults::bandpass_high_hz")]
    pub bandpass_high_hz: f64,

    #[serde(default = "defaults::filter_order")]
    pub filter_order: usize,

    #[serde(default = "defaults::notch_enabled")]
    pub notch_enabled: bool,

    #[serde(default = "defaults::notch_hz")]
    pub notch_hz: f64,

    #[serde(default = "defaults::notch_bandwidth_hz")]
    pub notch_bandwidth_hz: f64,

    #[serde(default = "defaults::artifact_threshold")]
    pub artifact_threshold: f64,
}

/// A named frequency band used for spectral power features
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FrequencyBand {
    pub name: String,
    pub low_hz: f64,
    pub high_hz: f64,
}

impl FrequencyBand {
    pub fn new(name: &str, low_hz: f64, high_hz: f64) -> Self {
        Self {
            name: name.to_string(),
            low_hz,
            high_hz,
        }
    }

    /// Inclusive on both edges
    pub fn contains(&self, freq_hz: f64) -> bool {
        freq_hz >= self.low_hz && freq_hz <= self.high_hz
    }
}

/// Windowing and feature settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FeatureConfig {
    /// Window length for sliding-window passes
    #[serde(default = "defaults::window_samples")]
    pub window_samples: usize,

    /// Fraction of a window shared with the next one, in `[0, 1)`
    #[serde(default = "defaults::window_overlap")]
    pub window_overlap: f64,

    #[serde(default = "defaults::bands")]
    pub bands: Vec<FrequencyBand>,
}

/// Scheduler and health settings
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct InferenceConfig {
    /// Samples per channel the classifier expects
    #[serde(default = "defaults::classifier_input_samples")]
    pub classifier_input_samples: usize,

    /// Buffer fill required before the connection counts as ready;
    /// defaults to the buffer capacity when absent
    #[serde(default)]
    pub required_samples: Option<usize>,

    #[serde(default = "defaults::tick_interval_ms")]
    pub tick_interval_ms: u64,

    #[serde(default = "defaults::data_timeout_ms")]
    pub data_timeout_ms: u64,

    #[serde(default = "defaults::failure_history")]
    pub failure_history: usize,

    #[serde(default = "defaults::event_queue_size")]
    pub event_queue_size: usize,
}

/// Default value providers using constants
mod defaults {
    use super::FrequencyBand;
    use crate::config::constants::*;

    pub fn sampling_rate_hz() -> f64 { signal::DEFAULT_SAMPLING_RATE_HZ }
    pub fn channel_count() -> usize { signal::DEFAULT_CHANNEL_COUNT }
    pub fn channel_labels() -> Vec<String> {
        signal::DEFAULT_CHANNEL_LABELS.iter().map(|s| s.to_string()).collect()
    }
    pub fn buffer_capacity() -> usize { signal::DEFAULT_BUFFER_CAPACITY }

    pub fn bandpass_low_hz() -> f64 { filters::DEFAULT_BANDPASS_LOW_HZ }
    pub fn bandpass_high_hz() -> f64 { filters::DEFAULT_BANDPASS_HIGH_HZ }
    pub fn filter_order() -> usize { filters::DEFAULT_FILTER_ORDER }
    pub fn notch_enabled() -> bool { true }
    pub fn notch_hz() -> f64 { filters::POWERLINE_FREQ_50HZ }
    pub fn notch_bandwidth_hz() -> f64 { filters::DEFAULT_NOTCH_BANDWIDTH_HZ }
    pub fn artifact_threshold() -> f64 { filters::DEFAULT_ARTIFACT_THRESHOLD }

    pub fn bands() -> Vec<FrequencyBand> {
        features::DEFAULT_BANDS
            .iter()
            .map(|&(name, low, high)| FrequencyBand::new(name, low, high))
            .collect()
    }
    pub fn window_samples() -> usize { features::DEFAULT_WINDOW_SAMPLES }
    pub fn window_overlap() -> f64 { features::DEFAULT_WINDOW_OVERLAP }

    pub fn classifier_input_samples() -> usize { inference::DEFAULT_CLASSIFIER_INPUT_SAMPLES }
    pub fn tick_interval_ms() -> u64 { inference::DEFAULT_TICK_INTERVAL_MS }
    pub fn data_timeout_ms() -> u64 { inference::DEFAULT_DATA_TIMEOUT_MS }
    pub fn failure_history() -> usize { inference::DEFAULT_FAILURE_HISTORY }
    pub fn event_queue_size() -> usize { inference::DEFAULT_EVENT_QUEUE_SIZE }
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            sampling_rate_hz: defaults::sampling_rate_hz(),
            channel_count: defaults::channel_count(),
            channel_labels: defaults::channel_labels(),
            buffer_capacity: defaults::buffer_capacity(),
        }
    }
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            bandpass_low_hz: defaults::bandpass_low_hz(),
            bandpass_high_hz: defaults::bandpass_high_hz(),
            filter_order: defaults::filter_order(),
            notch_enabled: defaults::notch_enabled(),
            notch_hz: defaults::notch_hz(),
            notch_bandwidth_hz: defaults::notch_bandwidth_hz(),
            artifact_threshold: defaults::artifact_threshold(),
        }
    }
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            window_samples: defaults::window_samples(),
            window_overlap: defaults::window_overlap(),
            bands: defaults::bands(),
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            classifier_input_samples: defaults::classifier_input_samples(),
            required_samples: None,
            tick_interval_ms: defaults::tick_interval_ms(),
            data_timeout_ms: defaults::data_timeout_ms(),
            failure_history: defaults::failure_history(),
            event_queue_size: defaults::event_queue_size(),
        }
    }
}

impl SignalConfig {
    pub fn nyquist_hz(&self) -> f64 {
        self.sampling_rate_hz / 2.0
    }
}

impl InferenceConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn data_timeout(&self) -> Duration {
        Duration::from_millis(self.data_timeout_ms)
    }
}

impl PipelineConfig {
    /// Buffer fill at which the connection becomes ready
    pub fn required_samples(&self) -> usize {
        self.inference
            .required_samples
            .unwrap_or(self.signal.buffer_capacity)
    }

    /// Check every fatal constraint, returning all violations at once
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let sig = &self.signal;
        let capacity = sig.buffer_capacity;

        if !(sig.sampling_rate_hz.is_finite() && sig.sampling_rate_hz > 0.0) {
            errors.push(format!("Sampling rate must be positive, got {}", sig.sampling_rate_hz));
        }
        if sig.channel_count == 0 || sig.channel_count > signal::MAX_CHANNEL_COUNT {
            errors.push(format!(
                "Channel count must be between 1 and {}, got {}",
                signal::MAX_CHANNEL_COUNT, sig.channel_count
            ));
        }
        if sig.channel_labels.len() != sig.channel_count {
            errors.push(format!(
                "Expected {} channel labels, got {}",
                sig.channel_count,
                sig.channel_labels.len()
            ));
        }
        if capacity == 0 {
            errors.push("Buffer capacity must be greater than 0".to_string());
        }

        let required = self.required_samples();
        if required == 0 || required > capacity {
            errors.push(format!(
                "Required samples ({}) must be between 1 and buffer capacity ({})",
                required, capacity
            ));
        }
        if self.inference.classifier_input_samples == 0 || self.inference.classifier_input_samples > capacity {
            errors.push(format!(
                "Classifier input length ({}) exceeds buffer capacity ({}) or is zero",
                self.inference.classifier_input_samples, capacity
            ));
        }
        if self.features.window_samples == 0 || self.features.window_samples > capacity {
            errors.push(format!(
                "Window length ({}) exceeds buffer capacity ({}) or is zero",
                self.features.window_samples, capacity
            ));
        }
        if !(0.0..1.0).contains(&self.features.window_overlap) {
            errors.push(format!(
                "Window overlap must be in [0, 1), got {}",
                self.features.window_overlap
            ));
        }
        if self.inference.tick_interval_ms == 0 {
            errors.push("Tick interval must be greater than 0".to_string());
        }
        if self.inference.data_timeout_ms == 0 {
            errors.push("Data timeout must be greater than 0".to_string());
        }

        self.validate_frequencies(&mut errors);

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    fn validate_frequencies(&self, errors: &mut Vec<String>) {
        let nyquist = self.signal.nyquist_hz();
        let filter = &self.filter;

        if filter.bandpass_low_hz <= 0.0 || filter.bandpass_low_hz >= filter.bandpass_high_hz {
            errors.push(format!(
                "Bandpass edges must satisfy 0 < low < high, got {} - {} Hz",
                filter.bandpass_low_hz, filter.bandpass_high_hz
            ));
        }
        if filter.bandpass_low_hz >= nyquist {
            errors.push(format!(
                "Bandpass low edge ({} Hz) must be below Nyquist ({} Hz)",
                filter.bandpass_low_hz, nyquist
            ));
        }
        if filter.filter_order < filters::MIN_FILTER_ORDER
            || filter.filter_order > filters::MAX_FILTER_ORDER
            || filter.filter_order % 2 != 0
        {
            errors.push(format!(
                "Filter order must be even and between {} and {}, got {}",
                filters::MIN_FILTER_ORDER, filters::MAX_FILTER_ORDER, filter.filter_order
            ));
        }
        if filter.notch_enabled {
            let notch = filter.notch_hz;
            if notch <= 0.0 {
                errors.push(format!("Notch frequency must be positive, got {}", notch));
            }
            if filter.notch_bandwidth_hz <= 0.0 || filter.notch_bandwidth_hz >= notch {
                errors.push(format!(
                    "Notch bandwidth must be in (0, {}), got {}",
                    notch, filter.notch_bandwidth_hz
                ));
            }
        }
        if !(filter.artifact_threshold.is_finite() && filter.artifact_threshold > 0.0) {
            errors.push(format!(
                "Artifact threshold must be positive, got {}",
                filter.artifact_threshold
            ));
        }

        if self.features.bands.is_empty() {
            errors.push("At least one frequency band is required".to_string());
        }
        for band in &self.features.bands {
            if band.low_hz < 0.0 || band.low_hz >= band.high_hz {
                errors.push(format!(
                    "Band '{}' must satisfy 0 <= low < high, got {} - {} Hz",
                    band.name, band.low_hz, band.high_hz
                ));
            }
            if band.low_hz >= nyquist {
                errors.push(format!(
                    "Band '{}' starts at or above Nyquist ({} Hz)",
                    band.name, nyquist
                ));
            }
        }
    }
}
