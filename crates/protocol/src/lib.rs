//! Plain data types handed from the host sampler to a monitoring front end.

pub mod telemetry;

pub use telemetry::{
    CpuMetrics, DiskMetrics, GaugeMetrics, HostInfo, HostSnapshot, TemperatureMetrics,
};
