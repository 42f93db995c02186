//! Sampler tuning knobs.

use std::time::Duration;

use crate::temperature::{FallbackEstimate, PlausibleRange};

/// Default bound on a single temperature probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Configuration shared by the samplers of one [`HostSampler`](crate::HostSampler).
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    /// Longest a temperature strategy may take before it counts as failed.
    pub probe_timeout: Duration,
    pub plausible: PlausibleRange,
    pub fallback: FallbackEstimate,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
            plausible: PlausibleRange::default(),
            fallback: FallbackEstimate::default(),
        }
    }
}
