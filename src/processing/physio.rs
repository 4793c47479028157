// src/processing/physio.rs
//! Companion physiological signals: windowed heart/breathing-rate features and
//! PPG heart-rate estimation

use crate::config::constants::physio;
use crate::error::{AffectErrorBuilder, AffectResult, ProcessingStage};
use crate::processing::filters::{BandpassFilter, FilterError};
use crate::processing::windowing::slide_windows;
use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

/// Vital carried by a rate series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateKind {
    /// Beats per minute
    HeartRate,
    /// Breaths per minute
    BreathingRate,
}

impl RateKind {
    /// Sample-to-sample change counted as a sudden rise or fall
    pub fn jump_threshold(self) -> f64 {
        match self {
            RateKind::HeartRate => physio::HEART_RATE_JUMP_BPM,
            RateKind::BreathingRate => physio::BREATHING_RATE_JUMP,
        }
    }
}

/// Summary of one rate window
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateFeatures {
    pub mean: f64,
    pub std: f64,
    pub range: f64,
    pub sudden_increases: usize,
    pub sudden_decreases: usize,
}

impl RateFeatures {
    pub const LEN: usize = 5;

    pub fn from_window(values: &[f64], jump_threshold: f64) -> Self {
        if values.is_empty() {
            return Self {
                mean: 0.0,
                std: 0.0,
                range: 0.0,
                sudden_increases: 0,
                sudden_decreases: 0,
            };
        }

        let n = values.len() as f64;
        let mean = values.iter().sum::<f64>() / n;
        let std = (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);

        let (mut sudden_increases, mut sudden_decreases) = (0, 0);
        for pair in values.windows(2) {
            let delta = pair[1] - pair[0];
            if delta > jump_threshold {
                sudden_increases += 1;
            } else if delta < -jump_threshold {
                sudden_decreases += 1;
            }
        }

        Self {
            mean,
            std,
            range: max - min,
            sudden_increases,
            sudden_decreases,
        }
    }

    pub fn to_array(&self) -> [f64; Self::LEN] {
        [
            self.mean,
            self.std,
            self.range,
            self.sudden_increases as f64,
            self.sudden_decreases as f64,
        ]
    }
}

/// Windows of a rate series and their features, one row per window
#[derive(Debug, Clone, PartialEq)]
pub struct RateRecording {
    /// `[windows][window_samples]`
    pub windows: Array2<f64>,
    /// `[windows][5]`: mean, std, range, rises, falls
    pub features: Array2<f64>,
}

impl RateRecording {
    pub fn window_count(&self) -> usize {
        self.windows.len_of(Axis(0))
    }
}

/// Slice a rate series into half-overlapping windows of `window_secs` and
/// summarise each one
pub fn rate_features(
    series: &[f64],
    kind: RateKind,
    sample_rate_hz: f64,
    window_secs: f64,
) -> AffectResult<RateRecording> {
    let window_len = (window_secs * sample_rate_hz) as usize;
    let data = ArrayView2::from_shape((1, series.len()), series).map_err(|e| {
        AffectErrorBuilder::new("physio", "rate_features")
            .processing(ProcessingStage::Windowing, &e.to_string())
    })?;
    let windows: Vec<ArrayView2<'_, f64>> =
        slide_windows(data, window_len, physio::RATE_WINDOW_OVERLAP)?.collect();

    let jump = kind.jump_threshold();
    let mut raw = Array2::zeros((windows.len(), window_len));
    let mut features = Array2::zeros((windows.len(), RateFeatures::LEN));
    for (i, window) in windows.iter().enumerate() {
        let values = window.row(0).to_vec();
        let summary = RateFeatures::from_window(&values, jump).to_array();
        raw.row_mut(i).assign(&ArrayView1::from(values.as_slice()));
        features.row_mut(i).assign(&ArrayView1::from(&summary[..]));
    }

    Ok(RateRecording {
        windows: raw,
        features,
    })
}

/// Local maxima at least `min_distance` samples apart with at least
/// `min_prominence` above their higher surrounding base
///
/// Plateaus report their middle sample. When two peaks are too close the
/// higher one is kept.
pub fn find_peaks(signal: &[f64], min_distance: usize, min_prominence: f64) -> Vec<usize> {
    let n = signal.len();
    if n < 3 {
        return Vec::new();
    }

    let mut peaks = Vec::new();
    let mut i = 1;
    while i < n - 1 {
        if signal[i - 1] < signal[i] {
            let mut ahead = i + 1;
            while ahead < n - 1 && signal[ahead] == signal[i] {
                ahead += 1;
            }
            if signal[ahead] < signal[i] {
                peaks.push((i + ahead - 1) / 2);
                i = ahead;
                continue;
            }
        }
        i += 1;
    }

    if min_distance > 1 && peaks.len() > 1 {
        let mut by_height: Vec<usize> = (0..peaks.len()).collect();
        by_height.sort_by(|&a, &b| signal[peaks[b]].total_cmp(&signal[peaks[a]]));

        let mut keep = vec![true; peaks.len()];
        for &idx in &by_height {
            if !keep[idx] {
                continue;
            }
            let mut j = idx;
            while j > 0 && peaks[idx] - peaks[j - 1] < min_distance {
                j -= 1;
                keep[j] = false;
            }
            let mut j = idx + 1;
            while j < peaks.len() && peaks[j] - peaks[idx] < min_distance {
                keep[j] = false;
                j += 1;
            }
        }
        peaks = peaks
            .into_iter()
            .zip(keep)
            .filter_map(|(peak, kept)| kept.then_some(peak))
            .collect();
    }

    peaks.retain(|&peak| prominence(signal, peak) >= min_prominence);
    peaks
}

fn prominence(signal: &[f64], peak: usize) -> f64 {
    let height = signal[peak];
    let left = signal[..=peak]
        .iter()
        .rev()
        .take_while(|&&v| v <= height)
        .fold(height, |low, &v| low.min(v));
    let right = signal[peak..]
        .iter()
        .take_while(|&&v| v <= height)
        .fold(height, |low, &v| low.min(v));
    height - left.max(right)
}

/// BPM from peak positions; `None` unless more than two peaks give at least
/// one plausible beat interval and the rate itself is plausible
pub fn bpm_from_peaks(peaks: &[usize], sample_rate_hz: f64) -> Option<f64> {
    if peaks.len() <= 2 {
        return None;
    }

    let (shortest, longest) = physio::BEAT_INTERVAL_SECS;
    let intervals: Vec<f64> = peaks
        .windows(2)
        .map(|pair| (pair[1] - pair[0]) as f64 / sample_rate_hz)
        .filter(|&secs| secs > shortest && secs < longest)
        .collect();
    if intervals.is_empty() {
        return None;
    }

    let bpm = 60.0 / (intervals.iter().sum::<f64>() / intervals.len() as f64);
    let (low, high) = physio::PLAUSIBLE_BPM;
    (low..=high).contains(&bpm).then_some(bpm)
}

/// Heart rate from a photoplethysmography trace
#[derive(Debug, Clone)]
pub struct HeartRateEstimator {
    bandpass: BandpassFilter,
    sample_rate_hz: f64,
}

impl HeartRateEstimator {
    pub fn new(sample_rate_hz: f64) -> Result<Self, FilterError> {
        let (low, high) = physio::PPG_BAND_HZ;
        Ok(Self {
            bandpass: BandpassFilter::butterworth(physio::PPG_FILTER_ORDER, low, high, sample_rate_hz)?,
            sample_rate_hz,
        })
    }

    /// Estimator for the headband's 64 Hz PPG stream
    pub fn headband() -> Result<Self, FilterError> {
        Self::new(physio::PPG_SAMPLING_RATE_HZ)
    }

    pub fn sample_rate_hz(&self) -> f64 {
        self.sample_rate_hz
    }

    /// BPM over the whole trace, if a plausible rhythm is present
    pub fn estimate(&self, ppg: &[f64]) -> Option<f64> {
        if ppg.len() < physio::MIN_PPG_SAMPLES {
            return None;
        }

        let filtered = self.bandpass.apply(ppg);
        let n = filtered.len() as f64;
        let mean = filtered.iter().sum::<f64>() / n;
        let std = (filtered.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt();

        let min_distance = (self.sample_rate_hz * physio::MIN_PEAK_SPACING_SECS) as usize;
        let peaks = find_peaks(&filtered, min_distance, std * physio::PEAK_PROMINENCE_FACTOR);
        let bpm = bpm_from_peaks(&peaks, self.sample_rate_hz);

        tracing::trace!(peaks = peaks.len(), bpm = ?bpm, "ppg heart rate");
        bpm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_rate_windows_half_overlap() {
        let series = vec![70.0; 400];
        let out = rate_features(&series, RateKind::HeartRate, 100.0, 2.0).unwrap();

        assert_eq!(out.window_count(), 3);
        assert_eq!(out.windows.dim(), (3, 200));
        assert_eq!(out.features.row(0).to_vec(), vec![70.0, 0.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_sudden_changes_are_counted() {
        let series: Vec<f64> = (0..400)
            .map(|i| if i >= 200 && i % 2 == 1 { 80.0 } else { 70.0 })
            .collect();
        let out = rate_features(&series, RateKind::HeartRate, 100.0, 2.0).unwrap();

        let middle = out.features.row(1).to_vec();
        assert_eq!(&middle[3..], &[50.0, 49.0]);
        let last = out.features.row(2).to_vec();
        assert_eq!(last, vec![75.0, 5.0, 10.0, 100.0, 99.0]);
    }

    #[test]
    fn test_jump_threshold_depends_on_vital() {
        let steps: Vec<f64> = (0..200).map(|i| 12.0 + 3.0 * i as f64).collect();
        let heart = RateFeatures::from_window(&steps, RateKind::HeartRate.jump_threshold());
        let breath = RateFeatures::from_window(&steps, RateKind::BreathingRate.jump_threshold());

        assert_eq!(heart.sudden_increases, 0);
        assert_eq!(breath.sudden_increases, 199);
        assert_eq!(breath.sudden_decreases, 0);
    }

    #[test]
    fn test_short_series_has_no_windows() {
        let out = rate_features(&[15.0; 150], RateKind::BreathingRate, 100.0, 2.0).unwrap();
        assert_eq!(out.window_count(), 0);
        assert_eq!(out.features.dim(), (0, RateFeatures::LEN));
    }

    #[test]
    fn test_zero_length_window_is_rejected() {
        assert!(rate_features(&[70.0; 10], RateKind::HeartRate, 100.0, 0.001).is_err());
    }

    #[test]
    fn test_peak_distance_keeps_higher() {
        let signal = [0.0, 1.0, 0.0, 5.0, 0.0, 2.0, 0.0];
        assert_eq!(find_peaks(&signal, 1, 0.0), vec![1, 3, 5]);
        assert_eq!(find_peaks(&signal, 3, 0.0), vec![3]);
    }

    #[test]
    fn test_peak_prominence_filters_shoulders() {
        let signal = [0.0, 3.0, 2.0, 2.5, 0.0];
        assert_eq!(find_peaks(&signal, 1, 0.0), vec![1, 3]);
        assert_eq!(find_peaks(&signal, 1, 1.0), vec![1]);
    }

    #[test]
    fn test_plateau_reports_middle() {
        let signal = [0.0, 2.0, 2.0, 2.0, 0.0];
        assert_eq!(find_peaks(&signal, 1, 0.0), vec![2]);
    }

    #[test]
    fn test_bpm_from_peaks() {
        assert_eq!(bpm_from_peaks(&[0, 64, 128, 192], 64.0), Some(60.0));
        // Intervals of 1.67 s are outside the accepted beat range
        assert_eq!(bpm_from_peaks(&[0, 107, 214, 321], 64.0), None);
        assert_eq!(bpm_from_peaks(&[0, 64], 64.0), None);
    }

    #[test]
    fn test_estimates_pulse_rate() {
        let estimator = HeartRateEstimator::headband().unwrap();
        let ppg: Vec<f64> = (0..1920)
            .map(|i| 500.0 + (2.0 * PI * 1.2 * i as f64 / 64.0).sin())
            .collect();

        let bpm = estimator.estimate(&ppg).unwrap();
        assert!((bpm - 72.0).abs() < 1.0, "bpm {}", bpm);
    }

    #[test]
    fn test_short_trace_gives_no_estimate() {
        let estimator = HeartRateEstimator::headband().unwrap();
        assert_eq!(estimator.estimate(&[1.0; 100]), None);
    }
}
