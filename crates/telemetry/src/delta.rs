//! Rate computation from cumulative OS counters.
//!
//! A single counter reading means nothing on its own; usage is derived from
//! the difference between two readings. [`DeltaTracker`] keeps the previous
//! reading and turns each new one into a [`DeltaResult`].

use std::time::{Duration, Instant};

/// One raw reading of monotonically non-decreasing idle/busy counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSample {
    pub cumulative_idle: u64,
    pub cumulative_busy: u64,
    pub taken_at: Instant,
}

impl CounterSample {
    /// Creates a sample stamped with the current instant.
    pub fn now(cumulative_idle: u64, cumulative_busy: u64) -> Self {
        Self {
            cumulative_idle,
            cumulative_busy,
            taken_at: Instant::now(),
        }
    }

    /// Idle plus busy ticks.
    pub fn total(&self) -> u64 {
        self.cumulative_idle.saturating_add(self.cumulative_busy)
    }
}

/// Outcome of feeding one sample to a [`DeltaTracker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaResult {
    /// No usable previous sample: first call, or the counters went backwards.
    NoBaseline,
    /// Counters did not move since the previous sample.
    Flat,
    Delta {
        idle_delta: u64,
        busy_delta: u64,
        total_delta: u64,
        elapsed: Duration,
    },
}

/// Holds at most one previous [`CounterSample`] and computes deltas against it.
///
/// State is only replaced as a whole, after the result for the new sample has
/// been computed, so an abandoned or failed poll leaves it untouched.
#[derive(Debug, Default, Clone)]
pub struct DeltaTracker {
    previous: Option<CounterSample>,
}

impl DeltaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds a new sample and returns the delta against the stored one.
    pub fn poll(&mut self, current: CounterSample) -> DeltaResult {
        let Some(previous) = self.previous else {
            self.previous = Some(current);
            return DeltaResult::NoBaseline;
        };

        if current.cumulative_idle < previous.cumulative_idle
            || current.cumulative_busy < previous.cumulative_busy
        {
            tracing::debug!(
                prev_idle = previous.cumulative_idle,
                prev_busy = previous.cumulative_busy,
                idle = current.cumulative_idle,
                busy = current.cumulative_busy,
                "counter reset detected, taking new baseline"
            );
            self.previous = Some(current);
            return DeltaResult::NoBaseline;
        }

        let idle_delta = current.cumulative_idle - previous.cumulative_idle;
        let busy_delta = current.cumulative_busy - previous.cumulative_busy;
        // Both deltas fit in u64 individually; their sum may not after a
        // wraparound-sized jump.
        let Some(total_delta) = idle_delta.checked_add(busy_delta) else {
            self.previous = Some(current);
            return DeltaResult::NoBaseline;
        };

        let result = if total_delta == 0 {
            DeltaResult::Flat
        } else {
            DeltaResult::Delta {
                idle_delta,
                busy_delta,
                total_delta,
                elapsed: current.taken_at.saturating_duration_since(previous.taken_at),
            }
        };

        self.previous = Some(current);
        result
    }

    /// The stored baseline, if any.
    pub fn previous(&self) -> Option<&CounterSample> {
        self.previous.as_ref()
    }
}
