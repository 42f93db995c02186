//! Linux procfs/sysfs metric readers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::adapter::OsAdapter;
use crate::delta::CounterSample;
use crate::error::SampleError;
use crate::sensors::{self, ComponentsStrategy};
use crate::temperature::{SensorHandle, TemperatureStrategy};

const HWMON_ROOT: &str = "/sys/class/hwmon";

const THERMAL_ZONE_PATHS: &[&str] = &[
    "/sys/class/thermal/thermal_zone0/temp",
    "/sys/devices/virtual/thermal/thermal_zone0/temp",
];

/// hwmon driver names that report the CPU package temperature.
const CPU_HWMON_DRIVERS: &[&str] = &["k10temp", "coretemp", "zenpower", "cpu_thermal"];

/// Reads metrics from `/proc` and `/sys`.
#[derive(Debug, Default)]
pub struct NativeAdapter;

impl NativeAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl OsAdapter for NativeAdapter {
    fn read_cpu_counters(&self) -> Result<CounterSample, SampleError> {
        let content = std::fs::read_to_string("/proc/stat")?;
        let line = content
            .lines()
            .next()
            .ok_or_else(|| SampleError::unavailable("/proc/stat is empty"))?;
        let (idle, busy) = parse_cpu_line(line)?;
        Ok(CounterSample::now(idle, busy))
    }

    fn read_memory(&self) -> Result<(u64, u64), SampleError> {
        let content = std::fs::read_to_string("/proc/meminfo")?;
        parse_meminfo(&content)
    }

    fn read_disk(&self, path: &Path) -> Result<(u64, u64), SampleError> {
        sensors::read_disk_usage(path)
    }

    fn temperature_strategies(&self) -> Vec<Arc<dyn TemperatureStrategy>> {
        vec![
            Arc::new(HwmonStrategy::new(HWMON_ROOT)),
            Arc::new(ThermalZoneStrategy::new(
                THERMAL_ZONE_PATHS.iter().map(PathBuf::from).collect(),
            )),
            Arc::new(ComponentsStrategy),
        ]
    }
}

// ---------------------------------------------------------------------------
// Temperature strategies
// ---------------------------------------------------------------------------

/// CPU package sensor found by scanning hwmon devices for a known driver.
#[derive(Debug)]
pub struct HwmonStrategy {
    root: PathBuf,
}

impl HwmonStrategy {
    pub const ID: &'static str = "hwmon";

    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl TemperatureStrategy for HwmonStrategy {
    fn id(&self) -> &str {
        Self::ID
    }

    fn open(&self) -> Result<Box<dyn SensorHandle>, SampleError> {
        let mut dirs: Vec<PathBuf> = std::fs::read_dir(&self.root)?
            .flatten()
            .map(|e| e.path())
            .collect();
        dirs.sort();

        for dir in dirs {
            let name = read_trimmed(&dir.join("name")).unwrap_or_default();
            if !CPU_HWMON_DRIVERS.contains(&name.as_str()) {
                continue;
            }
            let input = dir.join("temp1_input");
            if input.exists() {
                tracing::debug!(driver = %name, path = %input.display(), "found hwmon CPU sensor");
                return Ok(Box::new(MilliCelsiusFile { path: input }));
            }
        }

        Err(SampleError::unavailable("no CPU hwmon sensor"))
    }
}

/// First existing ACPI thermal zone from a list of candidate paths.
#[derive(Debug)]
pub struct ThermalZoneStrategy {
    candidates: Vec<PathBuf>,
}

impl ThermalZoneStrategy {
    pub const ID: &'static str = "thermal_zone";

    pub fn new(candidates: Vec<PathBuf>) -> Self {
        Self { candidates }
    }
}

impl TemperatureStrategy for ThermalZoneStrategy {
    fn id(&self) -> &str {
        Self::ID
    }

    fn open(&self) -> Result<Box<dyn SensorHandle>, SampleError> {
        self.candidates
            .iter()
            .find(|p| p.exists())
            .map(|p| Box::new(MilliCelsiusFile { path: p.clone() }) as Box<dyn SensorHandle>)
            .ok_or_else(|| SampleError::unavailable("no thermal zone"))
    }
}

/// A sysfs file holding a temperature in millidegrees Celsius.
struct MilliCelsiusFile {
    path: PathBuf,
}

impl SensorHandle for MilliCelsiusFile {
    fn read_celsius(&mut self) -> Result<f64, SampleError> {
        let raw = std::fs::read_to_string(&self.path)?;
        let milli: i64 = raw
            .trim()
            .parse()
            .map_err(|e| SampleError::Parse(format!("{}: {e}", self.path.display())))?;
        Ok(milli as f64 / 1000.0)
    }
}

// ---------------------------------------------------------------------------
// Parsers
// ---------------------------------------------------------------------------

/// Parses the aggregate `cpu` line of `/proc/stat` into `(idle, busy)` ticks.
///
/// Format: `cpu  user nice system idle iowait irq softirq steal guest guest_nice`.
/// Idle includes iowait. Guest time is already counted in user, so only the
/// first eight fields are used.
fn parse_cpu_line(line: &str) -> Result<(u64, u64), SampleError> {
    let mut parts = line.split_whitespace();
    if parts.next() != Some("cpu") {
        return Err(SampleError::Parse(format!("not an aggregate cpu line: {line}")));
    }

    let fields: Vec<u64> = parts
        .take(8)
        .map(|f| f.parse::<u64>())
        .collect::<Result<_, _>>()
        .map_err(|e| SampleError::Parse(format!("bad cpu field: {e}")))?;

    if fields.len() < 4 {
        return Err(SampleError::Parse(format!(
            "expected at least 4 cpu fields, got {}",
            fields.len()
        )));
    }

    let iowait = fields.get(4).copied().unwrap_or(0);
    let idle = fields[3] + iowait;
    let busy = fields.iter().sum::<u64>() - idle;
    Ok((idle, busy))
}

/// Returns `(used, total)` bytes from `/proc/meminfo` content.
///
/// Used memory is `MemTotal - MemAvailable`, or `MemTotal - MemFree` on
/// kernels that predate `MemAvailable`.
fn parse_meminfo(content: &str) -> Result<(u64, u64), SampleError> {
    let mut total = None;
    let mut available = None;
    let mut free = None;

    for line in content.lines() {
        if let Some(val) = parse_meminfo_kb(line, "MemTotal:") {
            total = Some(val * 1024);
        } else if let Some(val) = parse_meminfo_kb(line, "MemAvailable:") {
            available = Some(val * 1024);
        } else if let Some(val) = parse_meminfo_kb(line, "MemFree:") {
            free = Some(val * 1024);
        }
    }

    let total = total.ok_or_else(|| SampleError::unavailable("MemTotal missing"))?;
    let available = available
        .or(free)
        .ok_or_else(|| SampleError::unavailable("MemAvailable missing"))?;
    Ok((total.saturating_sub(available), total))
}

/// Parses a line from `/proc/meminfo` matching a prefix, returns value in kB.
fn parse_meminfo_kb(line: &str, prefix: &str) -> Option<u64> {
    line.strip_prefix(prefix)?
        .split_whitespace()
        .next()
        .and_then(|v| v.parse().ok())
}

/// Reads a file and trims whitespace.
fn read_trimmed(path: &Path) -> Option<String> {
    std::fs::read_to_string(path)
        .ok()
        .map(|s| s.trim().to_string())
}
