// src/processing/windowing.rs
//! Window slicing, padding and normalisation over `[channels][samples]` data

use crate::error::{AffectError, AffectResult, ProcessingStage};
use ndarray::{s, Array2, ArrayView2, Axis};
use std::f64::consts::PI;

/// Lazy, restartable sequence of overlapping windows
///
/// Trailing samples that do not fill a whole window are dropped.
#[derive(Debug, Clone)]
pub struct SlidingWindows<'a> {
    data: ArrayView2<'a, f64>,
    window_len: usize,
    step: usize,
    next_start: usize,
}

impl<'a> SlidingWindows<'a> {
    pub fn window_len(&self) -> usize {
        self.window_len
    }

    pub fn step(&self) -> usize {
        self.step
    }
}

impl<'a> Iterator for SlidingWindows<'a> {
    type Item = ArrayView2<'a, f64>;

    fn next(&mut self) -> Option<Self::Item> {
        let end = self.next_start + self.window_len;
        if end > self.data.ncols() {
            return None;
        }

        let window = self.data.slice_move(s![.., self.next_start..end]);
        self.next_start += self.step;
        Some(window)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self
            .data
            .ncols()
            .checked_sub(self.next_start + self.window_len)
            .map_or(0, |slack| slack / self.step + 1);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for SlidingWindows<'_> {}

/// Hop between consecutive windows, never below one sample
pub fn window_step(window_len: usize, overlap: f64) -> usize {
    ((window_len as f64 * (1.0 - overlap)).floor() as usize).max(1)
}

pub fn slide_windows(
    data: ArrayView2<'_, f64>,
    window_len: usize,
    overlap: f64,
) -> AffectResult<SlidingWindows<'_>> {
    if window_len == 0 {
        return Err(windowing_error("window length must be at least 1"));
    }
    if !(0.0..1.0).contains(&overlap) {
        return Err(windowing_error(&format!("overlap {} outside [0, 1)", overlap)));
    }

    Ok(SlidingWindows {
        data,
        window_len,
        step: window_step(window_len, overlap),
        next_start: 0,
    })
}

/// Most recent `len` samples, left-padded with each channel's earliest value
/// when the history is shorter
pub fn latest_window(data: ArrayView2<'_, f64>, len: usize) -> AffectResult<Array2<f64>> {
    let (channels, available) = data.dim();
    if len == 0 {
        return Err(windowing_error("window length must be at least 1"));
    }
    if available == 0 {
        return Err(windowing_error("no samples to build a window from"));
    }

    if available >= len {
        return Ok(data.slice(s![.., available - len..]).to_owned());
    }

    let pad = len - available;
    let mut window = Array2::zeros((channels, len));
    for (ch, row) in data.axis_iter(Axis(0)).enumerate() {
        window.slice_mut(s![ch, ..pad]).fill(row[0]);
        window.slice_mut(s![ch, pad..]).assign(&row);
    }
    Ok(window)
}

/// Zero mean and unit variance per channel along time
///
/// A flat channel is only centred.
pub fn normalize_window(window: ArrayView2<'_, f64>) -> Array2<f64> {
    let mut out = window.to_owned();
    for mut row in out.axis_iter_mut(Axis(0)) {
        let n = row.len();
        if n == 0 {
            continue;
        }
        let mean = row.sum() / n as f64;
        let var = row.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n as f64;
        let std = var.sqrt();
        let scale = if std > 0.0 { std } else { 1.0 };
        row.mapv_inplace(|v| (v - mean) / scale);
    }
    out
}

/// Periodic Hann window as used for spectral estimation
pub fn hann_periodic(size: usize) -> Vec<f64> {
    if size <= 1 {
        return vec![1.0; size];
    }
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / size as f64).cos())
        .collect()
}

fn windowing_error(reason: &str) -> AffectError {
    AffectError::Processing {
        stage: ProcessingStage::Windowing,
        reason: reason.to_string(),
        context: crate::error_context!("windowing", "slice"),
    }
}
