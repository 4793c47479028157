//! Affect-Core: real-time EEG acquisition, conditioning and affective-state inference
//!
//! The crate turns a bursty stream of multi-channel EEG samples into a
//! periodically refreshed affective label. It features:
//!
//! - A bounded, thread-safe sample buffer with eviction at capacity
//! - Zero-phase Butterworth bandpass, powerline notch and artifact repair
//! - Sliding windows with statistical and Welch band-power features
//! - A fixed-cadence inference scheduler with staleness handling
//! - Layered configuration (defaults, TOML, environment)
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use affect_core::config::PipelineConfig;
//! use affect_core::inference::{EmotionLabel, LinearSoftmaxClassifier};
//! use affect_core::pipeline::AffectPipeline;
//! use affect_core::simulation::{SyntheticConfig, SyntheticEeg};
//! use std::sync::Arc;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let classifier = LinearSoftmaxClassifier::constant(EmotionLabel::Neutral, 60);
//!     let pipeline = AffectPipeline::new(PipelineConfig::default(), Arc::new(classifier))?;
//!
//!     for sample in SyntheticEeg::new(SyntheticConfig::default()).take(2560) {
//!         pipeline.ingest(sample)?;
//!     }
//!
//!     pipeline.tick();
//!     println!("{}", pipeline.status_line());
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_inception)]

pub mod acquisition;
pub mod config;
pub mod error;
pub mod health;
pub mod inference;
pub mod pipeline;
pub mod processing;
pub mod simulation;
pub mod utils;

// Re-export commonly used types for convenience
pub use acquisition::{Sample, SampleBuffer};
pub use config::PipelineConfig;
pub use error::{AffectError, AffectResult};
pub use health::ConnectionState;
pub use inference::{Classifier, EmotionLabel, Prediction, TickOutcome};
pub use pipeline::{AffectPipeline, PipelineBuilder, WindowDiagnostics};
pub use utils::time::{MockTimeProvider, SystemTimeProvider, TimeProvider};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Get library information
pub fn version_info() -> VersionInfo {
    VersionInfo {
        name: NAME.to_string(),
        version: VERSION.to_string(),
        description: "Real-time EEG conditioning and affective-state inference".to_string(),
        features: vec![
            "Bounded concurrent sample buffer".to_string(),
            "Zero-phase filtering and artifact repair".to_string(),
            "Statistical and band-power features".to_string(),
            "Periodic inference with connection health".to_string(),
        ],
    }
}

/// Library version information
#[derive(Debug, Clone)]
pub struct VersionInfo {
    /// Library name
    pub name: String,
    /// Version string
    pub version: String,
    /// Description
    pub description: String,
    /// List of features
    pub features: Vec<String>,
}
