//! Host resource sampler: CPU usage, memory, disk and CPU temperature.
//!
//! Platform adapters supply raw OS readings; the samplers here turn
//! cumulative CPU counters into rates, clamp absolute gauges and resolve
//! temperature through a fallback chain of sensor strategies.

mod adapter;
mod collector;
mod config;
mod cpu;
mod cpu_model;
mod delta;
mod error;
mod gauge;
mod host_info;
mod sampler;
mod sensors;
mod temperature;

#[cfg(test)]
mod testing;

#[cfg(target_os = "linux")]
#[path = "sysfs_linux.rs"]
mod platform;

#[cfg(target_os = "windows")]
#[path = "sysfs_windows.rs"]
mod platform;

#[cfg(target_os = "macos")]
#[path = "sysfs_macos.rs"]
mod platform;

#[cfg(not(any(target_os = "linux", target_os = "windows", target_os = "macos")))]
#[path = "sysfs_other.rs"]
mod platform;

pub use adapter::OsAdapter;
pub use collector::{Collector, SendFn};
pub use config::{DEFAULT_PROBE_TIMEOUT, SamplerConfig};
pub use cpu::{CpuUsageSampler, UsageReading};
pub use cpu_model::{CpuModel, CpuVendor, parse_cpu_model};
pub use delta::{CounterSample, DeltaResult, DeltaTracker};
pub use error::SampleError;
pub use gauge::{AbsoluteGauge, GaugeReading};
pub use host_info::read_host_info;
pub use platform::NativeAdapter;
pub use sampler::HostSampler;
pub use sensors::ComponentsStrategy;
pub use temperature::{
    FallbackEstimate, PlausibleRange, SensorHandle, StrategyState, TemperatureReading,
    TemperatureResolver, TemperatureSource, TemperatureStrategy,
};
