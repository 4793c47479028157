// src/processing/filters/mod.rs
//! Digital filters for EEG conditioning
//!
//! All filters are second-order-section cascades run forward and backward so
//! the conditioned signal carries no phase lag.

pub mod biquad;
pub mod iir;
pub mod notch;

pub use biquad::{Biquad, BiquadCascade};
pub use iir::BandpassFilter;
pub use notch::NotchFilter;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandType {
    Lowpass,
    Highpass,
    Bandstop,
}

/// Common filter error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FilterError {
    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),
}
