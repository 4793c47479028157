// src/config/constants.rs
//! System-wide configuration constants

/// Signal acquisition constants
pub mod signal {
    pub const DEFAULT_SAMPLING_RATE_HZ: f64 = 256.0;
    pub const DEFAULT_CHANNEL_COUNT: usize = 4;
    /// Muse headband electrode positions (10-20 system)
    pub const DEFAULT_CHANNEL_LABELS: [&str; DEFAULT_CHANNEL_COUNT] = ["TP9", "AF7", "AF8", "TP10"];
    /// Ten seconds of history at the default rate
    pub const DEFAULT_BUFFER_CAPACITY: usize = 2560;
    pub const MAX_CHANNEL_COUNT: usize = 64;
}

/// Conditioning filter constants
pub mod filters {
    pub const DEFAULT_BANDPASS_LOW_HZ: f64 = 0.5;
    pub const DEFAULT_BANDPASS_HIGH_HZ: f64 = 50.0;
    pub const DEFAULT_FILTER_ORDER: usize = 4;
    pub const MIN_FILTER_ORDER: usize = 2;
    pub const MAX_FILTER_ORDER: usize = 8;
    pub const POWERLINE_FREQ_50HZ: f64 = 50.0;
    /// 1% of Nyquist on either side of the notch at 256 Hz
    pub const DEFAULT_NOTCH_BANDWIDTH_HZ: f64 = 2.56;
    /// Highpass edges at or above Nyquist are pulled down to this fraction of it
    pub const NYQUIST_CLAMP_FRACTION: f64 = 0.99;
    /// Amplitude in µV above which a sample is treated as an artifact
    pub const DEFAULT_ARTIFACT_THRESHOLD: f64 = 100.0;
}

/// Feature extraction constants
pub mod features {
    /// mean, std, var, max, min, median, p25, p75, skewness, kurtosis
    pub const STATISTICAL_FEATURE_COUNT: usize = 10;
    pub const DEFAULT_BANDS: [(&str, f64, f64); 5] = [
        ("delta", 0.5, 4.0),
        ("theta", 4.0, 8.0),
        ("alpha", 8.0, 13.0),
        ("beta", 13.0, 30.0),
        ("gamma", 30.0, 50.0),
    ];
    pub const MAX_WELCH_SEGMENT: usize = 256;
    /// Two seconds at the default rate
    pub const DEFAULT_WINDOW_SAMPLES: usize = 512;
    pub const DEFAULT_WINDOW_OVERLAP: f64 = 0.5;
}

/// Inference scheduling constants
pub mod inference {
    pub const DEFAULT_CLASSIFIER_INPUT_SAMPLES: usize = 128;
    pub const DEFAULT_TICK_INTERVAL_MS: u64 = 3000;
    pub const DEFAULT_DATA_TIMEOUT_MS: u64 = 10_000;
    pub const DEFAULT_FAILURE_HISTORY: usize = 16;
    pub const DEFAULT_EVENT_QUEUE_SIZE: usize = 64;
    /// Log one rejected sample out of this many after the first
    pub const REJECTION_LOG_INTERVAL: u64 = 256;
}

/// Heart-rate, breathing-rate and PPG constants
pub mod physio {
    pub const DEFAULT_RATE_SAMPLING_HZ: f64 = 100.0;
    pub const DEFAULT_RATE_WINDOW_SECS: f64 = 2.0;
    pub const RATE_WINDOW_OVERLAP: f64 = 0.5;
    /// BPM change between consecutive samples counted as sudden
    pub const HEART_RATE_JUMP_BPM: f64 = 5.0;
    /// Breaths/min change between consecutive samples counted as rapid
    pub const BREATHING_RATE_JUMP: f64 = 2.0;

    pub const PPG_SAMPLING_RATE_HZ: f64 = 64.0;
    pub const PPG_BAND_HZ: (f64, f64) = (0.5, 4.0);
    pub const PPG_FILTER_ORDER: usize = 2;
    pub const MIN_PPG_SAMPLES: usize = 128;
    /// 150 BPM ceiling on peak spacing
    pub const MIN_PEAK_SPACING_SECS: f64 = 0.4;
    pub const PEAK_PROMINENCE_FACTOR: f64 = 0.3;
    pub const BEAT_INTERVAL_SECS: (f64, f64) = (0.33, 1.5);
    pub const PLAUSIBLE_BPM: (f64, f64) = (40.0, 180.0);
}

/// Time conversion helpers
pub mod time {
    pub const NANOSECONDS_PER_SECOND: u64 = 1_000_000_000;
    pub const NANOSECONDS_PER_MILLISECOND: u64 = 1_000_000;
}

/// Configuration sources
pub mod paths {
    pub const LOCAL_CONFIG_FILE: &str = "affect.toml";
    pub const ENV_PREFIX: &str = "AFFECT";
    pub const ENV_SEPARATOR: &str = "__";
}
