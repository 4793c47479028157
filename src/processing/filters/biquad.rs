// src/processing/filters/biquad.rs
//! Second-order sections and zero-phase cascade filtering

use super::{BandType, FilterError};
use std::f64::consts::PI;

/// Time constants of padding before the edge transient reaches real data
const SETTLING_TIME_CONSTANTS: f64 = 6.0;

/// Normalised biquad coefficients (a0 = 1)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b0: f64,
    pub b1: f64,
    pub b2: f64,
    pub a1: f64,
    pub a2: f64,
}

impl Biquad {
    /// Bilinear-transform section with prewarping at `freq_hz`
    ///
    /// For `Bandstop` the quality factor is `freq_hz / bandwidth`.
    pub fn design(
        band_type: BandType,
        freq_hz: f64,
        q: f64,
        sample_rate_hz: f64,
    ) -> Result<Self, FilterError> {
        let nyquist = sample_rate_hz / 2.0;
        if !(freq_hz > 0.0 && freq_hz < nyquist) {
            return Err(FilterError::InvalidParameters(format!(
                "corner {:.3} Hz outside (0, {:.3}) Hz",
                freq_hz, nyquist
            )));
        }
        if !(q > 0.0 && q.is_finite()) {
            return Err(FilterError::InvalidParameters(format!("quality factor {}", q)));
        }

        let w0 = 2.0 * PI * freq_hz / sample_rate_hz;
        let cos_w0 = w0.cos();
        let alpha = w0.sin() / (2.0 * q);
        let a0 = 1.0 + alpha;

        let (b0, b1, b2) = match band_type {
            BandType::Lowpass => {
                let k = (1.0 - cos_w0) / 2.0;
                (k, 1.0 - cos_w0, k)
            }
            BandType::Highpass => {
                let k = (1.0 + cos_w0) / 2.0;
                (k, -(1.0 + cos_w0), k)
            }
            BandType::Bandstop => (1.0, -2.0 * cos_w0, 1.0),
        };

        Ok(Self {
            b0: b0 / a0,
            b1: b1 / a0,
            b2: b2 / a0,
            a1: -2.0 * cos_w0 / a0,
            a2: (1.0 - alpha) / a0,
        })
    }

    /// Gain at DC
    pub fn dc_gain(&self) -> f64 {
        (self.b0 + self.b1 + self.b2) / (1.0 + self.a1 + self.a2)
    }

    /// Largest pole magnitude
    pub fn pole_radius(&self) -> f64 {
        let disc = self.a1 * self.a1 - 4.0 * self.a2;
        if disc < 0.0 {
            self.a2.sqrt()
        } else {
            let root = disc.sqrt();
            ((-self.a1 + root) / 2.0).abs().max(((-self.a1 - root) / 2.0).abs())
        }
    }

    /// Transposed direct form II state for a unit step already in progress
    fn steady_state(&self) -> [f64; 2] {
        let gain = self.dc_gain();
        [gain - self.b0, self.b2 - self.a2 * gain]
    }

    #[inline]
    fn step(&self, state: &mut [f64; 2], input: f64) -> f64 {
        let output = self.b0 * input + state[0];
        state[0] = self.b1 * input - self.a1 * output + state[1];
        state[1] = self.b2 * input - self.a2 * output;
        output
    }
}

/// Cascade of second-order sections
#[derive(Debug, Clone, PartialEq)]
pub struct BiquadCascade {
    sections: Vec<Biquad>,
}

impl BiquadCascade {
    pub fn new(sections: Vec<Biquad>) -> Self {
        Self { sections }
    }

    /// Butterworth low or highpass of even `order`
    pub fn butterworth(
        band_type: BandType,
        order: usize,
        corner_hz: f64,
        sample_rate_hz: f64,
    ) -> Result<Self, FilterError> {
        if order == 0 || order % 2 != 0 {
            return Err(FilterError::InvalidParameters(format!(
                "Butterworth order must be even and non-zero, got {}",
                order
            )));
        }
        if band_type == BandType::Bandstop {
            return Err(FilterError::InvalidParameters(
                "Butterworth cascade supports lowpass and highpass only".to_string(),
            ));
        }

        // Pole pair k sits at angle (2k + 1)π / 2N from the imaginary axis
        let sections = (0..order / 2)
            .map(|k| {
                let theta = (2 * k + 1) as f64 * PI / (2 * order) as f64;
                let q = 1.0 / (2.0 * theta.cos());
                Biquad::design(band_type, corner_hz, q, sample_rate_hz)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { sections })
    }

    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Samples for the slowest section's transient to decay by `SETTLING_TIME_CONSTANTS` e-folds
    pub fn settling_samples(&self) -> usize {
        let slowest = self
            .sections
            .iter()
            .map(Biquad::pole_radius)
            .fold(0.0, f64::max);
        if !(slowest > 0.0 && slowest < 1.0) {
            return 0;
        }
        (SETTLING_TIME_CONSTANTS * -1.0 / slowest.ln()).ceil() as usize
    }

    pub fn extend(&mut self, other: BiquadCascade) {
        self.sections.extend(other.sections);
    }

    /// Single causal pass starting from steady state at `data[0]`
    pub fn filter_in_place(&self, data: &mut [f64]) {
        let Some(&first) = data.first() else {
            return;
        };

        let mut scale = first;
        for section in &self.sections {
            let mut state = section.steady_state().map(|z| z * scale);
            for value in data.iter_mut() {
                *value = section.step(&mut state, *value);
            }
            scale *= section.dc_gain();
        }
    }

    /// Forward-backward filtering with odd reflection padding
    ///
    /// Padding covers the settling time of the slowest pole, limited by the
    /// input length.
    pub fn filtfilt(&self, input: &[f64]) -> Vec<f64> {
        let len = input.len();
        if len < 2 || self.sections.is_empty() {
            return input.to_vec();
        }

        let padlen = (3 * (2 * self.sections.len() + 1))
            .max(self.settling_samples())
            .min(len - 1);
        let first = input[0];
        let last = input[len - 1];

        let mut extended = Vec::with_capacity(len + 2 * padlen);
        extended.extend((1..=padlen).rev().map(|i| 2.0 * first - input[i]));
        extended.extend_from_slice(input);
        extended.extend((1..=padlen).map(|i| 2.0 * last - input[len - 1 - i]));

        self.filter_in_place(&mut extended);
        extended.reverse();
        self.filter_in_place(&mut extended);
        extended.reverse();

        extended[padlen..padlen + len].to_vec()
    }
}
