// src/processing/artifact.rs
//! Amplitude-threshold artifact repair

/// Replace samples whose magnitude exceeds `threshold` by linear
/// interpolation between the nearest clean neighbours.
///
/// Flagged samples before the first or after the last clean sample take that
/// edge value. A channel with fewer than two clean samples is left untouched.
/// Returns the number of replaced samples.
pub fn interpolate_artifacts(channel: &mut [f64], threshold: f64) -> usize {
    let clean: Vec<usize> = channel
        .iter()
        .enumerate()
        .filter(|(_, v)| v.abs() <= threshold)
        .map(|(i, _)| i)
        .collect();

    if clean.len() < 2 || clean.len() == channel.len() {
        return 0;
    }

    let clean_values: Vec<f64> = clean.iter().map(|&i| channel[i]).collect();
    let first = clean[0];
    let last = clean[clean.len() - 1];

    // `right` is the position in `clean` of the first clean index above i
    let mut right = 0;
    let mut replaced = 0;
    for i in 0..channel.len() {
        while right < clean.len() && clean[right] <= i {
            right += 1;
        }
        if channel[i].abs() <= threshold {
            continue;
        }

        channel[i] = if i < first {
            clean_values[0]
        } else if i > last {
            clean_values[clean.len() - 1]
        } else {
            let (x0, y0) = (clean[right - 1] as f64, clean_values[right - 1]);
            let (x1, y1) = (clean[right] as f64, clean_values[right]);
            y0 + (y1 - y0) * (i as f64 - x0) / (x1 - x0)
        };
        replaced += 1;
    }

    replaced
}
