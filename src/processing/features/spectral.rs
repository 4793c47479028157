// src/processing/features/spectral.rs
//! Welch power spectral density and band power

use crate::config::constants::features::MAX_WELCH_SEGMENT;
use crate::config::FrequencyBand;
use crate::processing::windowing::hann_periodic;
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Segment length used for a window of `window_len` samples
pub fn welch_segment_len(window_len: usize) -> usize {
    (window_len / 4).min(MAX_WELCH_SEGMENT).max(1)
}

/// One-sided power spectral density
#[derive(Debug, Clone, PartialEq)]
pub struct PowerSpectrum {
    pub frequencies: Vec<f64>,
    pub density: Vec<f64>,
}

impl PowerSpectrum {
    /// Mean density over bins inside the band (inclusive edges), 0.0 if none
    pub fn band_power(&self, band: &FrequencyBand) -> f64 {
        let (sum, count) = self
            .frequencies
            .iter()
            .zip(&self.density)
            .filter(|(f, _)| band.contains(**f))
            .fold((0.0, 0usize), |(sum, count), (_, p)| (sum + p, count + 1));

        if count == 0 {
            0.0
        } else {
            sum / count as f64
        }
    }
}

/// Welch estimator with a fixed segment length
///
/// Hann window, 50% overlap, constant detrend, density scaling.
#[derive(Clone)]
pub struct WelchEstimator {
    segment_len: usize,
    window: Vec<f64>,
    window_power: f64,
    fft: Arc<dyn Fft<f64>>,
    sample_rate_hz: f64,
}

impl std::fmt::Debug for WelchEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WelchEstimator")
            .field("segment_len", &self.segment_len)
            .field("sample_rate_hz", &self.sample_rate_hz)
            .finish()
    }
}

impl WelchEstimator {
    pub fn new(segment_len: usize, sample_rate_hz: f64) -> Self {
        let segment_len = segment_len.max(1);
        let window = hann_periodic(segment_len);
        let window_power = window.iter().map(|w| w * w).sum();
        let fft = FftPlanner::new().plan_fft_forward(segment_len);

        Self {
            segment_len,
            window,
            window_power,
            fft,
            sample_rate_hz,
        }
    }

    /// Estimator sized for a window of `window_len` samples
    pub fn for_window(window_len: usize, sample_rate_hz: f64) -> Self {
        Self::new(welch_segment_len(window_len), sample_rate_hz)
    }

    pub fn segment_len(&self) -> usize {
        self.segment_len
    }

    pub fn estimate(&self, signal: &[f64]) -> PowerSpectrum {
        // A signal shorter than one segment is analysed as a single segment
        let estimator;
        let this = if signal.len() < self.segment_len && !signal.is_empty() {
            estimator = Self::new(signal.len(), self.sample_rate_hz);
            &estimator
        } else {
            self
        };
        this.estimate_segments(signal)
    }

    fn estimate_segments(&self, signal: &[f64]) -> PowerSpectrum {
        let nperseg = self.segment_len;
        let bins = nperseg / 2 + 1;
        let frequencies = (0..bins)
            .map(|k| k as f64 * self.sample_rate_hz / nperseg as f64)
            .collect();

        let step = nperseg - nperseg / 2;
        let mut density = vec![0.0; bins];
        let mut segments = 0usize;
        let mut buffer = vec![Complex::new(0.0, 0.0); nperseg];
        let scale = 1.0 / (self.sample_rate_hz * self.window_power);

        let mut start = 0;
        while start + nperseg <= signal.len() {
            let segment = &signal[start..start + nperseg];
            let mean = segment.iter().sum::<f64>() / nperseg as f64;
            for ((slot, &x), &w) in buffer.iter_mut().zip(segment).zip(&self.window) {
                *slot = Complex::new((x - mean) * w, 0.0);
            }
            self.fft.process(&mut buffer);

            for (k, acc) in density.iter_mut().enumerate() {
                let mut power = buffer[k].norm_sqr() * scale;
                let is_nyquist = nperseg % 2 == 0 && k == nperseg / 2;
                if k != 0 && !is_nyquist {
                    power *= 2.0;
                }
                *acc += power;
            }

            segments += 1;
            start += step;
        }

        if segments > 0 {
            density.iter_mut().for_each(|p| *p /= segments as f64);
        }

        PowerSpectrum { frequencies, density }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn sine(freq_hz: f64, amplitude: f64, len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| amplitude * (2.0 * PI * freq_hz * i as f64 / 256.0).sin())
            .collect()
    }

    #[test]
    fn test_segment_length() {
        assert_eq!(welch_segment_len(128), 32);
        assert_eq!(welch_segment_len(7680), 256);
        assert_eq!(welch_segment_len(2), 1);
    }

    #[test]
    fn test_frequency_grid() {
        let spectrum = WelchEstimator::new(32, 256.0).estimate(&vec![0.0; 128]);
        assert_eq!(spectrum.frequencies.len(), 17);
        assert_eq!(spectrum.frequencies[1], 8.0);
        assert_eq!(spectrum.frequencies[16], 128.0);
    }

    #[test]
    fn test_peak_at_tone_frequency() {
        let estimator = WelchEstimator::for_window(1024, 256.0);
        let spectrum = estimator.estimate(&sine(10.0, 1.0, 1024));

        let peak = spectrum
            .density
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(k, _)| spectrum.frequencies[k])
            .unwrap();
        assert!((peak - 10.0).abs() <= 1.0);
    }

    #[test]
    fn test_total_power_matches_variance() {
        let estimator = WelchEstimator::for_window(2048, 256.0);
        let spectrum = estimator.estimate(&sine(16.0, 2.0, 2048));
        let df = spectrum.frequencies[1];
        let total: f64 = spectrum.density.iter().sum::<f64>() * df;

        // A sine of amplitude A carries A²/2 power
        assert!((total - 2.0).abs() < 0.1, "total {}", total);
    }

    #[test]
    fn test_band_power_selection() {
        let spectrum = PowerSpectrum {
            frequencies: vec![0.0, 4.0, 8.0, 12.0],
            density: vec![1.0, 2.0, 4.0, 8.0],
        };

        assert_eq!(spectrum.band_power(&FrequencyBand::new("theta", 4.0, 8.0)), 3.0);
        assert_eq!(spectrum.band_power(&FrequencyBand::new("gap", 9.0, 11.0)), 0.0);
    }

    #[test]
    fn test_constant_signal_has_no_power() {
        let spectrum = WelchEstimator::new(32, 256.0).estimate(&vec![5.0; 128]);
        assert!(spectrum.density.iter().all(|p| p.abs() < 1e-20));
    }
}
