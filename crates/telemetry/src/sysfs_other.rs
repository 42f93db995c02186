//! Metric readers for platforms without a native CPU counter reader (BSDs
//! and others).
//!
//! Cumulative CPU ticks are not exposed here, so CPU usage reports
//! unavailable. Memory, disk and temperature go through `sysinfo`.

use std::path::Path;
use std::sync::Arc;

use sysinfo::System;

use crate::adapter::OsAdapter;
use crate::delta::CounterSample;
use crate::error::SampleError;
use crate::sensors::{self, ComponentsStrategy};
use crate::temperature::TemperatureStrategy;

#[derive(Debug, Default)]
pub struct NativeAdapter;

impl NativeAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl OsAdapter for NativeAdapter {
    fn read_cpu_counters(&self) -> Result<CounterSample, SampleError> {
        Err(SampleError::unavailable(
            "cumulative CPU counters not supported on this platform",
        ))
    }

    fn read_memory(&self) -> Result<(u64, u64), SampleError> {
        let mut sys = System::new();
        sys.refresh_memory();
        let total = sys.total_memory();
        if total == 0 {
            return Err(SampleError::unavailable("memory size unknown"));
        }
        Ok((total.saturating_sub(sys.available_memory()), total))
    }

    fn read_disk(&self, path: &Path) -> Result<(u64, u64), SampleError> {
        sensors::read_disk_usage(path)
    }

    fn temperature_strategies(&self) -> Vec<Arc<dyn TemperatureStrategy>> {
        vec![Arc::new(ComponentsStrategy)]
    }
}
