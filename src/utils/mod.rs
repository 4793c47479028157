// src/utils/mod.rs
//! Common utilities
//!
//! Clock injection lives here so every time-dependent component can be driven
//! from a [`MockTimeProvider`] in tests.

pub mod time;

pub use time::{
    current_timestamp_nanos,
    duration_to_nanos,
    elapsed_since,
    MockTimeProvider,
    SystemTimeProvider,
    TimeProvider,
};
