//! Cross-platform readers backed by `sysinfo`.
//!
//! Used by every platform adapter for disks and as the last-resort
//! temperature strategy.

use std::path::Path;

use sysinfo::{Components, Disks};

use crate::error::SampleError;
use crate::temperature::{SensorHandle, TemperatureStrategy};

/// Labels that identify a CPU package sensor, lowercase.
const CPU_LABEL_HINTS: &[&str] = &["cpu", "package", "tctl", "tdie", "coretemp", "k10temp"];

/// Reads `(used_bytes, total_bytes)` of the filesystem mounted closest to `path`.
pub fn read_disk_usage(path: &Path) -> Result<(u64, u64), SampleError> {
    let disks = Disks::new_with_refreshed_list();
    let mounts = disks
        .list()
        .iter()
        .map(|d| (d.mount_point(), d.total_space(), d.available_space()));

    select_mount(mounts, path)
        .map(|(total, available)| (total.saturating_sub(available), total))
        .ok_or_else(|| {
            SampleError::unavailable(format!("no filesystem mounted at {}", path.display()))
        })
}

/// Picks the mount whose point is the longest prefix of `path` and returns
/// its `(total, available)` bytes.
fn select_mount<'a>(
    mounts: impl Iterator<Item = (&'a Path, u64, u64)>,
    path: &Path,
) -> Option<(u64, u64)> {
    mounts
        .filter(|(mount, _, _)| path.starts_with(mount))
        .max_by_key(|(mount, _, _)| mount.components().count())
        .map(|(_, total, available)| (total, available))
}

/// Temperature from the sensors `sysinfo` enumerates (hwmon, SMC, WMI).
#[derive(Debug, Default)]
pub struct ComponentsStrategy;

impl ComponentsStrategy {
    pub const ID: &'static str = "components";
}

struct ComponentSensor {
    components: Components,
    index: usize,
}

impl SensorHandle for ComponentSensor {
    fn read_celsius(&mut self) -> Result<f64, SampleError> {
        let component = self
            .components
            .list_mut()
            .get_mut(self.index)
            .ok_or_else(|| SampleError::unavailable("sensor disappeared"))?;
        component.refresh();

        let celsius = f64::from(component.temperature());
        if celsius.is_nan() {
            return Err(SampleError::unavailable(format!(
                "sensor '{}' returned no value",
                component.label()
            )));
        }
        Ok(celsius)
    }
}

impl TemperatureStrategy for ComponentsStrategy {
    fn id(&self) -> &str {
        Self::ID
    }

    fn open(&self) -> Result<Box<dyn SensorHandle>, SampleError> {
        let components = Components::new_with_refreshed_list();
        let index = pick_cpu_sensor(components.list().iter().map(|c| c.label()))
            .ok_or_else(|| SampleError::unavailable("no temperature sensors"))?;

        tracing::debug!(
            label = components.list()[index].label(),
            "using sysinfo temperature sensor"
        );
        Ok(Box::new(ComponentSensor { components, index }))
    }
}

/// Index of the first CPU-looking label, otherwise the first sensor.
fn pick_cpu_sensor<'a>(labels: impl Iterator<Item = &'a str>) -> Option<usize> {
    let labels: Vec<String> = labels.map(str::to_lowercase).collect();
    if labels.is_empty() {
        return None;
    }
    labels
        .iter()
        .position(|l| CPU_LABEL_HINTS.iter().any(|hint| l.contains(hint)))
        .or(Some(0))
}
