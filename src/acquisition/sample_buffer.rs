// src/acquisition/sample_buffer.rs
//! Shared sample store between the network receiver and the scheduler

use crate::acquisition::ring_buffer::{RingError, SampleRing};
use crate::config::constants::inference::REJECTION_LOG_INTERVAL;
use crate::utils::time::TimeProvider;
use ndarray::Array2;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// One multi-channel reading
#[derive(Debug, Clone, PartialEq)]
pub struct Sample {
    channels: Arc<[f32]>,
    timestamp: u64,
}

impl Sample {
    /// `timestamp` is whatever the device reported; arrival time is tracked by the buffer
    pub fn new(channels: Vec<f32>, timestamp: u64) -> Self {
        Self {
            channels: channels.into(),
            timestamp,
        }
    }

    pub fn channels(&self) -> &[f32] {
        &self.channels
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn timestamp(&self) -> u64 {
        self.timestamp
    }

    /// Check shape and finiteness against the configured layout
    pub fn validate(&self, expected_channels: usize) -> Result<(), IngestError> {
        if self.channels.len() != expected_channels {
            return Err(IngestError::ChannelCount {
                expected: expected_channels,
                actual: self.channels.len(),
            });
        }

        match self.channels.iter().position(|v| !v.is_finite()) {
            Some(channel) => Err(IngestError::NonFinite { channel }),
            None => Ok(()),
        }
    }
}

/// Reasons a sample is rejected at ingest
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IngestError {
    #[error("expected {expected} channels, got {actual}")]
    ChannelCount { expected: usize, actual: usize },

    #[error("non-finite value on channel {channel}")]
    NonFinite { channel: usize },
}

/// Ingest counters and fill level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BufferMetrics {
    pub accepted: u64,
    pub rejected: u64,
    pub evicted: u64,
    pub size: usize,
    pub capacity: usize,
    pub utilization: f32,
}

/// Size and last arrival read under a single lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStatus {
    pub size: usize,
    pub capacity: usize,
    pub last_arrival_nanos: Option<u64>,
}

struct BufferState {
    ring: SampleRing<Sample>,
    last_arrival_nanos: Option<u64>,
}

/// Bounded, thread-safe FIFO of samples with eviction at capacity
pub struct SampleBuffer {
    state: Mutex<BufferState>,
    channel_count: usize,
    time_provider: Arc<dyn TimeProvider>,

    accepted: AtomicU64,
    rejected: AtomicU64,
    evicted: AtomicU64,
}

impl SampleBuffer {
    pub fn new(
        capacity: usize,
        channel_count: usize,
        time_provider: Arc<dyn TimeProvider>,
    ) -> Result<Self, RingError> {
        Ok(Self {
            state: Mutex::new(BufferState {
                ring: SampleRing::new(capacity)?,
                last_arrival_nanos: None,
            }),
            channel_count,
            time_provider,
            accepted: AtomicU64::new(0),
            rejected: AtomicU64::new(0),
            evicted: AtomicU64::new(0),
        })
    }

    /// Validate and append a sample, evicting the oldest when full
    pub fn ingest(&self, sample: Sample) -> Result<(), IngestError> {
        if let Err(err) = sample.validate(self.channel_count) {
            let rejected = self.rejected.fetch_add(1, Ordering::Relaxed) + 1;
            if rejected == 1 || rejected % REJECTION_LOG_INTERVAL == 0 {
                tracing::warn!(
                    reason = %err,
                    channels = sample.channel_count(),
                    total_rejected = rejected,
                    "rejected sample"
                );
            }
            return Err(err);
        }

        let arrival = self.time_provider.now_nanos();
        let evicted = {
            let mut state = self.state.lock();
            state.last_arrival_nanos = Some(arrival);
            state.ring.push(sample)
        };

        self.accepted.fetch_add(1, Ordering::Relaxed);
        if evicted.is_some() {
            self.evicted.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }

    /// Convenience for transport collaborators holding raw values
    pub fn ingest_values(&self, channels: &[f32], timestamp: u64) -> Result<(), IngestError> {
        self.ingest(Sample::new(channels.to_vec(), timestamp))
    }

    /// Owned copy of the contents, oldest first
    pub fn snapshot(&self) -> Vec<Sample> {
        self.state.lock().ring.to_vec()
    }

    pub fn size(&self) -> usize {
        self.state.lock().ring.len()
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().ring.capacity()
    }

    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// Arrival time of the newest accepted sample
    pub fn last_arrival(&self) -> Option<u64> {
        self.state.lock().last_arrival_nanos
    }

    pub fn status(&self) -> BufferStatus {
        let state = self.state.lock();
        BufferStatus {
            size: state.ring.len(),
            capacity: state.ring.capacity(),
            last_arrival_nanos: state.last_arrival_nanos,
        }
    }

    /// Drop every sample; the last-arrival time is kept
    pub fn clear(&self) {
        self.state.lock().ring.clear();
    }

    pub fn metrics(&self) -> BufferMetrics {
        let (size, capacity, utilization) = {
            let state = self.state.lock();
            (state.ring.len(), state.ring.capacity(), state.ring.utilization())
        };

        BufferMetrics {
            accepted: self.accepted.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            size,
            capacity,
            utilization,
        }
    }
}

/// Transpose samples into a `[channels][samples]` matrix
pub fn to_channel_matrix(samples: &[Sample], channel_count: usize) -> Array2<f64> {
    Array2::from_shape_fn((channel_count, samples.len()), |(ch, idx)| {
        f64::from(samples[idx].channels()[ch])
    })
}
