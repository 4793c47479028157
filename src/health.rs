// src/health.rs
//! Connection health derived from sample arrival and buffer fill

use crate::acquisition::BufferStatus;
use crate::utils::time::elapsed_since;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Observable state of the data stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionState {
    /// Nothing has arrived yet
    NoData,
    /// Samples are arriving but history is shorter than required
    Collecting,
    /// Enough fresh history to run inference
    Ready,
    /// Nothing arrived within the data timeout
    Stale,
}

impl ConnectionState {
    pub fn is_ready(self) -> bool {
        self == ConnectionState::Ready
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::NoData => "NO_DATA",
            ConnectionState::Collecting => "COLLECTING",
            ConnectionState::Ready => "READY",
            ConnectionState::Stale => "STALE",
        };
        f.write_str(name)
    }
}

/// State as a pure function of the last arrival, the clock and the fill level
///
/// Staleness wins over fill level: an elapsed time strictly greater than the
/// timeout always yields `Stale`.
pub fn evaluate(
    last_arrival_nanos: Option<u64>,
    now_nanos: u64,
    size: usize,
    required: usize,
    data_timeout: Duration,
) -> ConnectionState {
    let Some(last) = last_arrival_nanos else {
        return ConnectionState::NoData;
    };

    if elapsed_since(last, now_nanos) > data_timeout {
        ConnectionState::Stale
    } else if size >= required {
        ConnectionState::Ready
    } else {
        ConnectionState::Collecting
    }
}

/// Remembers the last observed state so transitions can be reported once
#[derive(Debug)]
pub struct HealthTracker {
    required_samples: usize,
    data_timeout: Duration,
    last_state: Mutex<ConnectionState>,
}

impl HealthTracker {
    pub fn new(required_samples: usize, data_timeout: Duration) -> Self {
        Self {
            required_samples,
            data_timeout,
            last_state: Mutex::new(ConnectionState::NoData),
        }
    }

    pub fn required_samples(&self) -> usize {
        self.required_samples
    }

    pub fn data_timeout(&self) -> Duration {
        self.data_timeout
    }

    /// Evaluate without recording a transition
    pub fn state(&self, status: &BufferStatus, now_nanos: u64) -> ConnectionState {
        evaluate(
            status.last_arrival_nanos,
            now_nanos,
            status.size,
            self.required_samples,
            self.data_timeout,
        )
    }

    /// Evaluate and log a transition if the state changed since the last observation
    pub fn observe(&self, status: &BufferStatus, now_nanos: u64) -> ConnectionState {
        let state = self.state(status, now_nanos);

        let mut last = self.last_state.lock();
        if *last != state {
            let previous = *last;
            tracing::info!(
                from = %previous,
                to = %state,
                buffered = status.size,
                required = self.required_samples,
                "connection state changed"
            );
            *last = state;
        }
        state
    }

    pub fn last_observed(&self) -> ConnectionState {
        *self.last_state.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: u64 = 1_000_000_000;
    const TIMEOUT: Duration = Duration::from_secs(10);

    #[test]
    fn test_no_data_before_first_sample() {
        assert_eq!(evaluate(None, 50 * SECOND, 0, 2560, TIMEOUT), ConnectionState::NoData);
    }

    #[test]
    fn test_collecting_then_ready() {
        assert_eq!(evaluate(Some(SECOND), SECOND, 10, 2560, TIMEOUT), ConnectionState::Collecting);
        assert_eq!(evaluate(Some(SECOND), SECOND, 2560, 2560, TIMEOUT), ConnectionState::Ready);
    }

    #[test]
    fn test_stale_overrides_fill_level() {
        let now = 11 * SECOND + 1;
        assert_eq!(evaluate(Some(SECOND), now, 2560, 2560, TIMEOUT), ConnectionState::Stale);
        assert_eq!(evaluate(Some(SECOND), now, 3, 2560, TIMEOUT), ConnectionState::Stale);
    }

    #[test]
    fn test_timeout_boundary_is_not_stale() {
        assert_eq!(evaluate(Some(0), 10 * SECOND, 2560, 2560, TIMEOUT), ConnectionState::Ready);
    }

    #[test]
    fn test_tracker_records_transitions() {
        let tracker = HealthTracker::new(4, TIMEOUT);
        let mut status = BufferStatus { size: 1, capacity: 8, last_arrival_nanos: Some(0) };

        assert_eq!(tracker.observe(&status, 0), ConnectionState::Collecting);
        status.size = 4;
        assert_eq!(tracker.observe(&status, SECOND), ConnectionState::Ready);
        assert_eq!(tracker.observe(&status, 20 * SECOND), ConnectionState::Stale);
        assert_eq!(tracker.last_observed(), ConnectionState::Stale);

        status.last_arrival_nanos = Some(21 * SECOND);
        assert_eq!(tracker.observe(&status, 21 * SECOND), ConnectionState::Ready);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(ConnectionState::NoData.to_string(), "NO_DATA");
        assert_eq!(ConnectionState::Stale.to_string(), "STALE");
    }
}
