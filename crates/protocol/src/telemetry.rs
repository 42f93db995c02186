use serde::{Deserialize, Serialize};

/// One poll cycle of host metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostSnapshot {
    /// Milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Absent when the CPU counters could not be read.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuMetrics>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<GaugeMetrics>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disks: Vec<DiskMetrics>,
    pub temperature: TemperatureMetrics,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<HostInfo>,
}

/// CPU utilization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuMetrics {
    #[serde(default)]
    pub usage_percent: f64,
}

/// Used/total view of memory or a filesystem.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GaugeMetrics {
    #[serde(default)]
    pub used_mb: f64,
    #[serde(default)]
    pub total_mb: f64,
    #[serde(default)]
    pub usage_percent: f64,
}

/// Usage of the filesystem holding `path`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiskMetrics {
    pub path: String,
    #[serde(flatten)]
    pub usage: GaugeMetrics,
}

/// CPU temperature and where it came from.
///
/// `source_id` is the strategy that measured it, or `"estimated"`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureMetrics {
    pub celsius: f64,
    pub source_id: String,
    pub measured: bool,
}

/// Static description of the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostInfo {
    pub hostname: String,
    pub os_version: String,
    pub kernel_version: String,
    pub cpu_model: String,
    pub logical_cores: u32,
}
