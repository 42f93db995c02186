//! Boundary between the platform-independent samplers and the OS.

use std::path::Path;
use std::sync::Arc;

use crate::delta::CounterSample;
use crate::error::SampleError;
use crate::temperature::TemperatureStrategy;

/// Raw metric source for one platform.
///
/// Every call may block on the OS. Implementations return plain readings and
/// leave rates, clamping and fallbacks to the samplers.
pub trait OsAdapter: Send + Sync {
    /// Cumulative idle/busy CPU ticks.
    fn read_cpu_counters(&self) -> Result<CounterSample, SampleError>;

    /// Physical memory as `(used_bytes, total_bytes)`.
    fn read_memory(&self) -> Result<(u64, u64), SampleError>;

    /// Filesystem holding `path` as `(used_bytes, total_bytes)`.
    fn read_disk(&self, path: &Path) -> Result<(u64, u64), SampleError>;

    /// Temperature strategies in priority order.
    fn temperature_strategies(&self) -> Vec<Arc<dyn TemperatureStrategy>>;
}
