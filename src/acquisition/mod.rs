// src/acquisition/mod.rs
//! Sample acquisition and buffering

pub mod ring_buffer;
pub mod sample_buffer;

pub use ring_buffer::{RingError, SampleRing};
pub use sample_buffer::{
    to_channel_matrix, BufferMetrics, BufferStatus, IngestError, Sample, SampleBuffer,
};
