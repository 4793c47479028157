// src/processing/conditioner.rs
//! Bandpass, notch and artifact repair over a `[channels][samples]` matrix

use crate::config::{FilterConfig, SignalConfig};
use crate::error::{AffectError, AffectResult, ProcessingStage};
use crate::processing::artifact::interpolate_artifacts;
use crate::processing::filters::{BandpassFilter, FilterError, NotchFilter};
use ndarray::{Array2, ArrayView1, ArrayView2};
use rayon::prelude::*;

/// Per-call conditioning report
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditioningReport {
    /// Replaced samples per channel
    pub artifacts_replaced: Vec<usize>,
}

/// Stateless signal conditioner; identical input yields identical output
#[derive(Debug, Clone)]
pub struct SignalConditioner {
    bandpass: BandpassFilter,
    notch: Option<NotchFilter>,
    artifact_threshold: f64,
}

impl SignalConditioner {
    pub fn new(signal: &SignalConfig, filter: &FilterConfig) -> Result<Self, FilterError> {
        let bandpass = BandpassFilter::butterworth(
            filter.filter_order,
            filter.bandpass_low_hz,
            filter.bandpass_high_hz,
            signal.sampling_rate_hz,
        )?;

        let notch = if filter.notch_enabled {
            NotchFilter::if_below_nyquist(
                filter.notch_hz,
                filter.notch_bandwidth_hz,
                signal.sampling_rate_hz,
            )?
        } else {
            None
        };

        Ok(Self {
            bandpass,
            notch,
            artifact_threshold: filter.artifact_threshold,
        })
    }

    pub fn has_notch(&self) -> bool {
        self.notch.is_some()
    }

    pub fn bandpass(&self) -> &BandpassFilter {
        &self.bandpass
    }

    pub fn condition(&self, data: ArrayView2<'_, f64>) -> AffectResult<Array2<f64>> {
        self.condition_with_report(data).map(|(out, _)| out)
    }

    /// Condition every channel in parallel
    pub fn condition_with_report(
        &self,
        data: ArrayView2<'_, f64>,
    ) -> AffectResult<(Array2<f64>, ConditioningReport)> {
        let (channels, samples) = data.dim();

        let conditioned: Vec<(Vec<f64>, usize)> = (0..channels)
            .into_par_iter()
            .map(|ch| {
                let raw: Vec<f64> = data.row(ch).to_vec();
                let mut filtered = self.bandpass.apply(&raw);
                if let Some(notch) = &self.notch {
                    filtered = notch.apply(&filtered);
                }
                let replaced = interpolate_artifacts(&mut filtered, self.artifact_threshold);
                (filtered, replaced)
            })
            .collect();

        let mut out = Array2::zeros((channels, samples));
        let mut report = ConditioningReport {
            artifacts_replaced: Vec::with_capacity(channels),
        };

        for (ch, (values, replaced)) in conditioned.into_iter().enumerate() {
            if let Some(idx) = values.iter().position(|v| !v.is_finite()) {
                return Err(AffectError::Processing {
                    stage: ProcessingStage::Filtering,
                    reason: format!("non-finite output on channel {} at sample {}", ch, idx),
                    context: crate::error_context!("signal_conditioner", "condition"),
                });
            }
            out.row_mut(ch).assign(&ArrayView1::from(values.as_slice()));
            report.artifacts_replaced.push(replaced);
        }

        Ok((out, report))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;

    fn conditioner() -> SignalConditioner {
        let config = PipelineConfig::default();
        SignalConditioner::new(&config.signal, &config.filter).unwrap()
    }

    #[test]
    fn test_shape_is_preserved() {
        let data = Array2::from_shape_fn((4, 300), |(c, i)| ((c + i) as f64 * 0.1).sin());
        let out = conditioner().condition(data.view()).unwrap();
        assert_eq!(out.dim(), (4, 300));
    }

    #[test]
    fn test_constant_input_is_rejected() {
        let data = Array2::from_elem((4, 1024), 37.5);
        let out = conditioner().condition(data.view()).unwrap();
        assert!(out.iter().all(|v| v.abs() < 1e-6));
    }

    #[test]
    fn test_deterministic_output() {
        let data = Array2::from_shape_fn((4, 512), |(c, i)| ((c * 7 + i) as f64 * 0.37).cos() * 20.0);
        let c = conditioner();
        let a = c.condition(data.view()).unwrap();
        let b = c.condition(data.view()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_notch_skipped_at_low_rate() {
        let mut config = PipelineConfig::default();
        config.signal.sampling_rate_hz = 100.0;
        config.filter.bandpass_high_hz = 40.0;
        let c = SignalConditioner::new(&config.signal, &config.filter).unwrap();
        assert!(!c.has_notch());
    }

    #[test]
    fn test_empty_input() {
        let data = Array2::<f64>::zeros((4, 0));
        let (out, report) = conditioner().condition_with_report(data.view()).unwrap();
        assert_eq!(out.dim(), (4, 0));
        assert_eq!(report.artifacts_replaced, vec![0; 4]);
    }
}
