// src/processing/features/statistics.rs
//! Per-channel distribution statistics

use crate::config::constants::features::STATISTICAL_FEATURE_COUNT;

/// Order of the statistics block for one channel
pub const STATISTIC_NAMES: [&str; STATISTICAL_FEATURE_COUNT] = [
    "mean", "std", "var", "max", "min", "median", "p25", "p75", "skewness", "kurtosis",
];

/// Compute the statistics block for one channel.
///
/// Moments are population moments; kurtosis is excess kurtosis. A flat
/// channel reports zero skewness and kurtosis. An empty channel yields zeros.
pub fn channel_statistics(values: &[f64]) -> [f64; STATISTICAL_FEATURE_COUNT] {
    if values.is_empty() {
        return [0.0; STATISTICAL_FEATURE_COUNT];
    }

    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;

    let (mut m2, mut m3, mut m4) = (0.0, 0.0, 0.0);
    for v in values {
        let d = v - mean;
        let d2 = d * d;
        m2 += d2;
        m3 += d2 * d;
        m4 += d2 * d2;
    }
    m2 /= n;
    m3 /= n;
    m4 /= n;

    let (skewness, kurtosis) = if m2 > 0.0 {
        (m3 / m2.powf(1.5), m4 / (m2 * m2) - 3.0)
    } else {
        (0.0, 0.0)
    };

    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    [
        mean,
        m2.sqrt(),
        m2,
        sorted[sorted.len() - 1],
        sorted[0],
        percentile_sorted(&sorted, 0.5),
        percentile_sorted(&sorted, 0.25),
        percentile_sorted(&sorted, 0.75),
        skewness,
        kurtosis,
    ]
}

/// Linear-interpolated percentile of sorted data, `q` in [0, 1]
pub fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        len => {
            let rank = q.clamp(0.0, 1.0) * (len - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
        }
    }
}
