// src/inference/classifier.rs
//! Classifier seam and a reference linear-softmax implementation

use crate::inference::label::{EmotionLabel, Prediction};
use crate::processing::features::FeatureVector;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised by classifier implementations
#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("model error: {0}")]
    Model(String),

    #[error("input shape mismatch: expected {expected}, got {actual}")]
    InputShape { expected: usize, actual: usize },

    #[error("failed to read model {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse model: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("classifier panicked: {0}")]
    Panicked(String),
}

/// Everything a classifier may look at for one tick
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifierInput {
    /// `[channels][input_len]`, normalised and optionally scaled
    pub window: Array2<f64>,
    /// Computed from the conditioned, unnormalised window
    pub features: FeatureVector,
}

/// External model collaborator
///
/// Implementations may be slow and may fail; the scheduler isolates both.
pub trait Classifier: Send + Sync {
    fn infer(&self, input: &ClassifierInput) -> Result<Prediction, ClassifierError>;

    /// Feature length the model was built for, checked when the pipeline is built
    fn expected_feature_len(&self) -> Option<usize> {
        None
    }

    fn name(&self) -> &str {
        "classifier"
    }
}

/// Linear model over the feature vector followed by softmax and argmax
///
/// Class rows follow [`EmotionLabel::ALL`]. Attention is each channel's share
/// of the absolute contribution to the winning logit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSoftmaxClassifier {
    /// One row per class
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    /// Channel count used to group attention
    #[serde(default)]
    pub channels: Option<usize>,
}

impl LinearSoftmaxClassifier {
    pub fn new(weights: Vec<Vec<f64>>, bias: Vec<f64>) -> Result<Self, ClassifierError> {
        let model = Self {
            weights,
            bias,
            channels: None,
        };
        model.check()?;
        Ok(model)
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = Some(channels);
        self
    }

    /// Model that always prefers `label` with a fixed margin
    pub fn constant(label: EmotionLabel, feature_len: usize) -> Self {
        let mut bias = vec![0.0; EmotionLabel::ALL.len()];
        bias[label.index()] = 2.0;
        Self {
            weights: vec![vec![0.0; feature_len]; EmotionLabel::ALL.len()],
            bias,
            channels: None,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, ClassifierError> {
        let model: Self = serde_json::from_str(json)?;
        model.check()?;
        Ok(model)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ClassifierError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn feature_len(&self) -> usize {
        self.weights.first().map_or(0, Vec::len)
    }

    fn check(&self) -> Result<(), ClassifierError> {
        let classes = EmotionLabel::ALL.len();
        if self.weights.len() != classes || self.bias.len() != classes {
            return Err(ClassifierError::Model(format!(
                "expected {} class rows, got {} weight rows and {} biases",
                classes,
                self.weights.len(),
                self.bias.len()
            )));
        }

        let len = self.feature_len();
        if self.weights.iter().any(|row| row.len() != len) {
            return Err(ClassifierError::Model("ragged weight matrix".to_string()));
        }
        if let Some(channels) = self.channels {
            if channels == 0 || len % channels != 0 {
                return Err(ClassifierError::Model(format!(
                    "{} features cannot be grouped into {} channels",
                    len, channels
                )));
            }
        }
        Ok(())
    }
}

impl Classifier for LinearSoftmaxClassifier {
    fn infer(&self, input: &ClassifierInput) -> Result<Prediction, ClassifierError> {
        let x = input.features.as_slice();
        if x.len() != self.feature_len() {
            return Err(ClassifierError::InputShape {
                expected: self.feature_len(),
                actual: x.len(),
            });
        }

        let logits: Vec<f64> = self
            .weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>() + b)
            .collect();
        let probabilities = softmax(&logits);

        let (best, confidence) = probabilities
            .iter()
            .copied()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or_else(|| ClassifierError::Model("no classes".to_string()))?;
        let label = EmotionLabel::from_index(best)
            .ok_or_else(|| ClassifierError::Model(format!("class index {}", best)))?;

        let mut prediction = Prediction::new(label, confidence as f32);
        if let Some(channels) = self.channels {
            prediction = prediction.with_attention(self.attention(best, x, channels));
        }
        Ok(prediction)
    }

    fn expected_feature_len(&self) -> Option<usize> {
        Some(self.feature_len())
    }

    fn name(&self) -> &str {
        "linear-softmax"
    }
}

impl LinearSoftmaxClassifier {
    fn attention(&self, class: usize, x: &[f64], channels: usize) -> Vec<f32> {
        let layout = input_layout(x.len(), channels);
        let mut share = vec![0.0f64; channels];
        for (i, (w, v)) in self.weights[class].iter().zip(x).enumerate() {
            share[layout(i)] += (w * v).abs();
        }

        let total: f64 = share.iter().sum();
        share
            .iter()
            .map(|s| if total > 0.0 { (s / total) as f32 } else { 1.0 / channels as f32 })
            .collect()
    }
}

/// Channel owning feature `i` when the vector is made of channel-major blocks
fn input_layout(len: usize, channels: usize) -> impl Fn(usize) -> usize {
    use crate::config::constants::features::STATISTICAL_FEATURE_COUNT;

    let stats_len = channels * STATISTICAL_FEATURE_COUNT;
    let bands = len.saturating_sub(stats_len) / channels.max(1);
    move |i| {
        if i < stats_len {
            i / STATISTICAL_FEATURE_COUNT
        } else {
            ((i - stats_len) / bands.max(1)).min(channels - 1)
        }
    }
}

/// Numerically stable softmax
pub fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let sum: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}
