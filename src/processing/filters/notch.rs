// src/processing/filters/notch.rs
//! Powerline notch

use super::{BandType, Biquad, BiquadCascade, FilterError};

/// Zero-phase notch around a single frequency
#[derive(Debug, Clone)]
pub struct NotchFilter {
    cascade: BiquadCascade,
    center_hz: f64,
    bandwidth_hz: f64,
}

impl NotchFilter {
    pub fn new(center_hz: f64, bandwidth_hz: f64, sample_rate_hz: f64) -> Result<Self, FilterError> {
        if !(bandwidth_hz > 0.0 && bandwidth_hz < center_hz) {
            return Err(FilterError::InvalidParameters(format!(
                "notch bandwidth {} Hz invalid for center {} Hz",
                bandwidth_hz, center_hz
            )));
        }

        let section = Biquad::design(
            BandType::Bandstop,
            center_hz,
            center_hz / bandwidth_hz,
            sample_rate_hz,
        )?;

        Ok(Self {
            cascade: BiquadCascade::new(vec![section]),
            center_hz,
            bandwidth_hz,
        })
    }

    /// Build the notch unless its stop band reaches Nyquist
    pub fn if_below_nyquist(
        center_hz: f64,
        bandwidth_hz: f64,
        sample_rate_hz: f64,
    ) -> Result<Option<Self>, FilterError> {
        if center_hz + bandwidth_hz / 2.0 >= sample_rate_hz / 2.0 {
            tracing::debug!(center_hz, sample_rate_hz, "notch skipped near Nyquist");
            return Ok(None);
        }
        Self::new(center_hz, bandwidth_hz, sample_rate_hz).map(Some)
    }

    pub fn apply(&self, signal: &[f64]) -> Vec<f64> {
        self.cascade.filtfilt(signal)
    }

    pub fn center_hz(&self) -> f64 {
        self.center_hz
    }

    pub fn bandwidth_hz(&self) -> f64 {
        self.bandwidth_hz
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_removes_powerline_tone() {
        let notch = NotchFilter::new(50.0, 2.56, 256.0).unwrap();
        let input: Vec<f64> = (0..2048)
            .map(|i| (2.0 * PI * 50.0 * i as f64 / 256.0).sin())
            .collect();
        let output = notch.apply(&input);

        let residual = output[512..1536].iter().map(|v| v.abs()).fold(0.0, f64::max);
        assert!(residual < 0.05, "residual {}", residual);
    }

    #[test]
    fn test_skipped_near_nyquist() {
        assert!(NotchFilter::if_below_nyquist(60.0, 2.0, 120.0).unwrap().is_none());
        assert!(NotchFilter::if_below_nyquist(50.0, 2.56, 256.0).unwrap().is_some());
    }

    #[test]
    fn test_invalid_bandwidth() {
        assert!(NotchFilter::new(50.0, 0.0, 256.0).is_err());
        assert!(NotchFilter::new(50.0, 60.0, 256.0).is_err());
    }
}
