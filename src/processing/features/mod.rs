// src/processing/features/mod.rs
//! Fixed-length feature vectors for a `[channels][samples]` window
//!
//! Layout, channel-major within each block:
//! - statistics: `channels × 10` (see [`statistics::STATISTIC_NAMES`])
//! - band power: `channels × bands`

pub mod spectral;
pub mod statistics;

use crate::config::constants::features::STATISTICAL_FEATURE_COUNT;
use crate::config::FrequencyBand;
use crate::error::{AffectError, AffectResult, ProcessingStage};
use ndarray::{ArrayView2, Axis};
use spectral::WelchEstimator;

/// Shape of a feature vector; a pure function of channel and band count
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FeatureLayout {
    pub channels: usize,
    pub bands: usize,
}

impl FeatureLayout {
    pub fn new(channels: usize, bands: usize) -> Self {
        Self { channels, bands }
    }

    pub fn len(&self) -> usize {
        self.channels * (STATISTICAL_FEATURE_COUNT + self.bands)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn statistics_len(&self) -> usize {
        self.channels * STATISTICAL_FEATURE_COUNT
    }

    pub fn band_power_len(&self) -> usize {
        self.channels * self.bands
    }
}

/// Ordered feature values for one window
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f64>,
    layout: FeatureLayout,
}

impl FeatureVector {
    pub fn layout(&self) -> FeatureLayout {
        self.layout
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.values
    }

    /// Whole statistics block
    pub fn statistics(&self) -> &[f64] {
        &self.values[..self.layout.statistics_len()]
    }

    /// Whole band power block
    pub fn band_powers(&self) -> &[f64] {
        &self.values[self.layout.statistics_len()..]
    }

    pub fn channel_statistics(&self, channel: usize) -> &[f64] {
        let start = channel * STATISTICAL_FEATURE_COUNT;
        &self.statistics()[start..start + STATISTICAL_FEATURE_COUNT]
    }

    pub fn channel_band_powers(&self, channel: usize) -> &[f64] {
        let start = channel * self.layout.bands;
        &self.band_powers()[start..start + self.layout.bands]
    }
}

/// Computes [`FeatureVector`]s for windows of a fixed channel count
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    sample_rate_hz: f64,
    channels: usize,
    bands: Vec<FrequencyBand>,
    /// Planned for the most common window length
    welch: WelchEstimator,
}

impl FeatureExtractor {
    pub fn new(
        sample_rate_hz: f64,
        channels: usize,
        bands: Vec<FrequencyBand>,
        expected_window_len: usize,
    ) -> Self {
        Self {
            sample_rate_hz,
            channels,
            bands,
            welch: WelchEstimator::for_window(expected_window_len, sample_rate_hz),
        }
    }

    pub fn layout(&self) -> FeatureLayout {
        FeatureLayout::new(self.channels, self.bands.len())
    }

    pub fn bands(&self) -> &[FrequencyBand] {
        &self.bands
    }

    /// Statistics and band power for one window
    pub fn extract(&self, window: ArrayView2<'_, f64>) -> AffectResult<FeatureVector> {
        let (channels, samples) = window.dim();
        if channels != self.channels {
            return Err(extraction_error(format!(
                "window has {} channels, extractor expects {}",
                channels, self.channels
            )));
        }
        if samples == 0 {
            return Err(extraction_error("empty window".to_string()));
        }

        let layout = self.layout();
        let segment_len = spectral::welch_segment_len(samples);
        let rebuilt;
        let welch = if segment_len == self.welch.segment_len() {
            &self.welch
        } else {
            rebuilt = WelchEstimator::new(segment_len, self.sample_rate_hz);
            &rebuilt
        };

        let mut values = Vec::with_capacity(layout.len());
        let mut powers = Vec::with_capacity(layout.band_power_len());

        for row in window.axis_iter(Axis(0)) {
            let channel = row.to_vec();
            values.extend_from_slice(&statistics::channel_statistics(&channel));

            let spectrum = welch.estimate(&channel);
            powers.extend(self.bands.iter().map(|band| spectrum.band_power(band)));
        }
        values.extend(powers);

        if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
            return Err(extraction_error(format!("non-finite feature at index {}", idx)));
        }

        debug_assert_eq!(values.len(), layout.len());
        Ok(FeatureVector { values, layout })
    }
}

fn extraction_error(reason: String) -> AffectError {
    AffectError::Processing {
        stage: ProcessingStage::FeatureExtraction,
        reason,
        context: crate::error_context!("feature_extractor", "extract"),
    }
}
