// src/processing/mod.rs
//! Signal conditioning, windowing and feature extraction, plus companion
//! physiological signals

pub mod artifact;
pub mod conditioner;
pub mod features;
pub mod filters;
pub mod physio;
pub mod preprocess;
pub mod windowing;

pub use artifact::interpolate_artifacts;
pub use conditioner::{ConditioningReport, SignalConditioner};
pub use features::{FeatureExtractor, FeatureLayout, FeatureVector};
pub use physio::{find_peaks, rate_features, HeartRateEstimator, RateFeatures, RateKind, RateRecording};
pub use preprocess::{preprocess_recording, PreprocessedRecording};
pub use windowing::{latest_window, normalize_window, slide_windows, SlidingWindows};
