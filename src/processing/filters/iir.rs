// src/processing/filters/iir.rs
//! Butterworth bandpass built from highpass and lowpass cascades

use super::{BandType, BiquadCascade, FilterError};
use crate::config::constants::filters::NYQUIST_CLAMP_FRACTION;

/// Zero-phase Butterworth bandpass
#[derive(Debug, Clone)]
pub struct BandpassFilter {
    cascade: BiquadCascade,
    low_hz: f64,
    high_hz: f64,
    order: usize,
}

impl BandpassFilter {
    /// Design the filter; a high edge at or above Nyquist is pulled down
    /// to just below it
    pub fn butterworth(
        order: usize,
        low_hz: f64,
        high_hz: f64,
        sample_rate_hz: f64,
    ) -> Result<Self, FilterError> {
        let nyquist = sample_rate_hz / 2.0;
        if !(low_hz > 0.0 && low_hz < high_hz) {
            return Err(FilterError::InvalidParameters(format!(
                "bandpass edges must satisfy 0 < low < high, got {} and {}",
                low_hz, high_hz
            )));
        }
        if low_hz >= nyquist {
            return Err(FilterError::InvalidParameters(format!(
                "bandpass low edge {} Hz is at or above Nyquist {} Hz",
                low_hz, nyquist
            )));
        }

        let high_hz = if high_hz >= nyquist {
            let clamped = nyquist * NYQUIST_CLAMP_FRACTION;
            tracing::warn!(
                requested_hz = high_hz,
                clamped_hz = clamped,
                "bandpass high edge clamped below Nyquist"
            );
            clamped
        } else {
            high_hz
        };

        let mut cascade = BiquadCascade::butterworth(BandType::Highpass, order, low_hz, sample_rate_hz)?;
        cascade.extend(BiquadCascade::butterworth(
            BandType::Lowpass,
            order,
            high_hz,
            sample_rate_hz,
        )?);

        Ok(Self {
            cascade,
            low_hz,
            high_hz,
            order,
        })
    }

    pub fn apply(&self, signal: &[f64]) -> Vec<f64> {
        self.cascade.filtfilt(signal)
    }

    /// Effective edges after clamping
    pub fn edges(&self) -> (f64, f64) {
        (self.low_hz, self.high_hz)
    }

    pub fn order(&self) -> usize {
        self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq_hz: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| (2.0 * PI * freq_hz * i as f64 / 256.0).sin())
            .collect()
    }

    fn rms(signal: &[f64]) -> f64 {
        (signal.iter().map(|v| v * v).sum::<f64>() / signal.len() as f64).sqrt()
    }

    #[test]
    fn test_passband_is_preserved() {
        let filter = BandpassFilter::butterworth(4, 0.5, 50.0, 256.0).unwrap();
        let input = sine(10.0, 4096);
        let output = filter.apply(&input);

        let ratio = rms(&output[1024..3072]) / rms(&input[1024..3072]);
        assert!((ratio - 1.0).abs() < 0.1, "ratio {}", ratio);
    }

    #[test]
    fn test_stopband_is_attenuated() {
        let filter = BandpassFilter::butterworth(4, 0.5, 30.0, 256.0).unwrap();
        let input = sine(100.0, 4096);
        let output = filter.apply(&input);

        let ratio = rms(&output[1024..3072]) / rms(&input[1024..3072]);
        assert!(ratio < 0.01, "ratio {}", ratio);
    }

    #[test]
    fn test_high_edge_is_clamped() {
        let filter = BandpassFilter::butterworth(4, 0.5, 200.0, 256.0).unwrap();
        let (_, high) = filter.edges();
        assert!((high - 126.72).abs() < 1e-9);
    }

    #[test]
    fn test_invalid_edges() {
        assert!(BandpassFilter::butterworth(4, 0.0, 50.0, 256.0).is_err());
        assert!(BandpassFilter::butterworth(4, 40.0, 30.0, 256.0).is_err());
        assert!(BandpassFilter::butterworth(4, 130.0, 140.0, 256.0).is_err());
    }
}
