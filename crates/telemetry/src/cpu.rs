//! CPU utilization from idle/busy tick counters.

use crate::delta::{CounterSample, DeltaResult, DeltaTracker};
use crate::error::SampleError;

/// Result of one CPU usage sample.
///
/// `Unavailable` is distinct from `Percent(0.0)`: zero is a valid
/// measurement, unavailable means the counters could not be read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UsageReading {
    Percent(f64),
    Unavailable,
}

impl UsageReading {
    pub fn percent(&self) -> Option<f64> {
        match self {
            Self::Percent(p) => Some(*p),
            Self::Unavailable => None,
        }
    }
}

/// Turns successive tick-counter readings into a 0-100 usage percentage.
#[derive(Debug, Default)]
pub struct CpuUsageSampler {
    tracker: DeltaTracker,
    last_measured: Option<f64>,
}

impl CpuUsageSampler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Computes usage for a fresh counter reading.
    ///
    /// The first reading (and any reading after a counter reset) reports 0.0
    /// because there is nothing to compare against yet.
    pub fn sample(&mut self, raw: CounterSample) -> UsageReading {
        let percent = match self.tracker.poll(raw) {
            DeltaResult::NoBaseline => return UsageReading::Percent(0.0),
            DeltaResult::Flat => 0.0,
            DeltaResult::Delta {
                busy_delta,
                total_delta,
                ..
            } => (100.0 * busy_delta as f64 / total_delta as f64).clamp(0.0, 100.0),
        };
        self.last_measured = Some(percent);
        UsageReading::Percent(percent)
    }

    /// Like [`sample`](Self::sample), but accepts the adapter's raw result.
    ///
    /// A failed read reports `Unavailable` and keeps the previous baseline, so
    /// the next successful read is measured against the older sample.
    pub fn sample_from(&mut self, read: Result<CounterSample, SampleError>) -> UsageReading {
        match read {
            Ok(raw) => self.sample(raw),
            Err(e) => {
                tracing::debug!(error = %e, "CPU counters unavailable");
                UsageReading::Unavailable
            }
        }
    }

    /// Most recent usage derived from a real delta, if any.
    pub fn last_measured(&self) -> Option<f64> {
        self.last_measured
    }

    /// Whether a baseline sample is stored.
    pub fn is_primed(&self) -> bool {
        self.tracker.previous().is_some()
    }
}
