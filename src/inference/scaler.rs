// src/inference/scaler.rs
//! Standard scaler fitted offline on flattened classifier windows

use crate::error::{AffectError, AffectResult, ProcessingStage};
use crate::inference::classifier::ClassifierError;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// `(x - mean) / scale` per flattened position
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureScaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

impl FeatureScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ClassifierError> {
        let scaler = Self { mean, scale };
        scaler.check()?;
        Ok(scaler)
    }

    pub fn from_json_str(json: &str) -> Result<Self, ClassifierError> {
        let scaler: Self = serde_json::from_str(json)?;
        scaler.check()?;
        Ok(scaler)
    }

    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| ClassifierError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }

    /// Scale a `[channels][samples]` window flattened row-major
    pub fn transform(&self, window: &mut Array2<f64>) -> AffectResult<()> {
        if window.len() != self.len() {
            return Err(AffectError::Processing {
                stage: ProcessingStage::Scaling,
                reason: format!(
                    "scaler fitted on {} values, window has {}",
                    self.len(),
                    window.len()
                ),
                context: crate::error_context!("feature_scaler", "transform"),
            });
        }

        // Iteration is in logical (row-major) order regardless of memory layout
        for ((value, mean), scale) in window.iter_mut().zip(&self.mean).zip(&self.scale) {
            let scale = if *scale == 0.0 { 1.0 } else { *scale };
            *value = (*value - mean) / scale;
        }
        Ok(())
    }

    fn check(&self) -> Result<(), ClassifierError> {
        if self.mean.len() != self.scale.len() {
            return Err(ClassifierError::Model(format!(
                "scaler mean has {} entries, scale has {}",
                self.mean.len(),
                self.scale.len()
            )));
        }
        if self.mean.iter().chain(&self.scale).any(|v| !v.is_finite()) {
            return Err(ClassifierError::Model("non-finite scaler parameter".to_string()));
        }
        Ok(())
    }
}
