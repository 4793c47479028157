// src/processing/preprocess.rs
//! Offline path: condition a whole recording and featurise every window

use crate::error::AffectResult;
use crate::processing::conditioner::SignalConditioner;
use crate::processing::features::FeatureExtractor;
use crate::processing::windowing::{normalize_window, slide_windows};
use ndarray::{Array2, Array3, ArrayView2, Axis};
use rayon::prelude::*;

/// Rectangular outputs for a recording, one row per window
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessedRecording {
    /// `[windows][channels][samples]`, each window normalised per channel
    pub windows: Array3<f64>,
    /// `[windows][channels × 10]`
    pub statistical_features: Array2<f64>,
    /// `[windows][channels × bands]`
    pub power_features: Array2<f64>,
    /// Statistics followed by band power, `[windows][feature_len]`
    pub combined_features: Array2<f64>,
}

impl PreprocessedRecording {
    pub fn window_count(&self) -> usize {
        self.windows.len_of(Axis(0))
    }
}

pub fn preprocess_recording(
    raw: ArrayView2<'_, f64>,
    conditioner: &SignalConditioner,
    extractor: &FeatureExtractor,
    window_len: usize,
    overlap: f64,
) -> AffectResult<PreprocessedRecording> {
    let conditioned = conditioner.condition(raw)?;
    let windows: Vec<ArrayView2<'_, f64>> =
        slide_windows(conditioned.view(), window_len, overlap)?.collect();

    let layout = extractor.layout();
    let channels = conditioned.nrows();
    let count = windows.len();

    let processed = windows
        .par_iter()
        .map(|window| {
            let features = extractor.extract(*window)?;
            Ok((normalize_window(*window), features))
        })
        .collect::<AffectResult<Vec<_>>>()?;

    let mut normalized = Array3::zeros((count, channels, window_len));
    let mut combined = Array2::zeros((count, layout.len()));
    for (i, (window, features)) in processed.into_iter().enumerate() {
        normalized.index_axis_mut(Axis(0), i).assign(&window);
        combined
            .row_mut(i)
            .assign(&ndarray::ArrayView1::from(features.as_slice()));
    }

    let split = layout.statistics_len();
    let statistical_features = combined.slice(ndarray::s![.., ..split]).to_owned();
    let power_features = combined.slice(ndarray::s![.., split..]).to_owned();

    tracing::debug!(
        samples = raw.ncols(),
        windows = count,
        feature_len = layout.len(),
        "recording preprocessed"
    );

    Ok(PreprocessedRecording {
        windows: normalized,
        statistical_features,
        power_features,
        combined_features: combined,
    })
}
