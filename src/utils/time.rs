// src/utils/time.rs
//! Clock abstraction shared by the sample buffer, health tracker and scheduler

use crate::config::constants::time::NANOSECONDS_PER_MILLISECOND;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Time provider trait for dependency injection and testing
pub trait TimeProvider: Send + Sync {
    fn now_nanos(&self) -> u64;

    fn now_millis(&self) -> u64 {
        self.now_nanos() / NANOSECONDS_PER_MILLISECOND
    }
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemTimeProvider;

impl TimeProvider for SystemTimeProvider {
    fn now_nanos(&self) -> u64 {
        current_timestamp_nanos()
    }
}

/// Manually advanced clock for deterministic tests and replays
#[derive(Debug, Default)]
pub struct MockTimeProvider {
    current_time: AtomicU64,
}

impl MockTimeProvider {
    pub fn new(initial_time_nanos: u64) -> Self {
        Self {
            current_time: AtomicU64::new(initial_time_nanos),
        }
    }

    pub fn advance_by(&self, nanos: u64) {
        self.current_time.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn advance(&self, duration: Duration) {
        self.advance_by(duration_to_nanos(duration));
    }

    pub fn set_time(&self, nanos: u64) {
        self.current_time.store(nanos, Ordering::Relaxed);
    }
}

impl TimeProvider for MockTimeProvider {
    fn now_nanos(&self) -> u64 {
        self.current_time.load(Ordering::Relaxed)
    }
}

/// Nanoseconds since the Unix epoch, zero if the clock is before it
pub fn current_timestamp_nanos() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(duration_to_nanos)
        .unwrap_or_default()
}

/// Saturating conversion
pub fn duration_to_nanos(duration: Duration) -> u64 {
    u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX)
}

/// Elapsed time between two readings; zero if the clock went backwards
pub fn elapsed_since(earlier_nanos: u64, now_nanos: u64) -> Duration {
    Duration::from_nanos(now_nanos.saturating_sub(earlier_nanos))
}
