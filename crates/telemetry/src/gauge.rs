//! Used/total readings shared by memory and disk.

const BYTES_PER_MB: f64 = 1_048_576.0;

/// An absolute used/total reading. `used_bytes <= total_bytes` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GaugeReading {
    pub used_bytes: u64,
    pub total_bytes: u64,
}

impl GaugeReading {
    /// Percentage used, 0.0 for a zero-capacity gauge.
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 0.0;
        }
        self.used_bytes as f64 / self.total_bytes as f64 * 100.0
    }

    pub fn used_mb(&self) -> f64 {
        self.used_bytes as f64 / BYTES_PER_MB
    }

    pub fn total_mb(&self) -> f64 {
        self.total_bytes as f64 / BYTES_PER_MB
    }
}

/// Stateless conversion of a raw (used, total) pair into a [`GaugeReading`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AbsoluteGauge;

impl AbsoluteGauge {
    /// Builds a reading, clamping `used` to `total`.
    ///
    /// The two values usually come from separate queries, so `used` can
    /// briefly exceed `total`.
    pub fn compute(used: u64, total: u64) -> GaugeReading {
        GaugeReading {
            used_bytes: used.min(total),
            total_bytes: total,
        }
    }
}
