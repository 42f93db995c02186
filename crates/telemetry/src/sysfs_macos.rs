//! macOS metric readers.
//!
//! CPU ticks come from the Mach host interface, summed over all processors.
//! Memory, disk and temperature go through `sysinfo`.

use std::path::Path;
use std::sync::Arc;

use sysinfo::System;

use crate::adapter::OsAdapter;
use crate::delta::CounterSample;
use crate::error::SampleError;
use crate::sensors::{self, ComponentsStrategy};
use crate::temperature::TemperatureStrategy;

const CPU_STATES: usize = libc::CPU_STATE_MAX as usize;

#[derive(Debug)]
pub struct NativeAdapter {
    host: libc::mach_port_t,
}

impl NativeAdapter {
    pub fn new() -> Self {
        #[allow(deprecated)]
        // SAFETY: returns a send right to the host port; no preconditions.
        let host = unsafe { libc::mach_host_self() };
        Self { host }
    }
}

impl Default for NativeAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl OsAdapter for NativeAdapter {
    fn read_cpu_counters(&self) -> Result<CounterSample, SampleError> {
        let mut cpu_count: libc::natural_t = 0;
        let mut info: libc::processor_info_array_t = std::ptr::null_mut();
        let mut info_count: libc::mach_msg_type_number_t = 0;

        // SAFETY: all out-pointers are valid; on success the kernel hands us
        // an array of `info_count` integers that we must deallocate.
        let kr = unsafe {
            libc::host_processor_info(
                self.host,
                libc::PROCESSOR_CPU_LOAD_INFO,
                &mut cpu_count,
                &mut info,
                &mut info_count,
            )
        };
        if kr != libc::KERN_SUCCESS || info.is_null() {
            return Err(SampleError::unavailable(format!(
                "host_processor_info failed: {kr}"
            )));
        }

        // SAFETY: `info` points at `info_count` integers owned by us until
        // the vm_deallocate below.
        let ticks = unsafe { std::slice::from_raw_parts(info, info_count as usize) };
        let (idle, busy) = sum_load_ticks(ticks, cpu_count as usize);

        #[allow(deprecated)]
        // SAFETY: the region was allocated by host_processor_info for this task.
        unsafe {
            libc::vm_deallocate(
                libc::mach_task_self(),
                info as libc::vm_address_t,
                info_count as libc::vm_size_t * std::mem::size_of::<libc::integer_t>(),
            );
        }

        Ok(CounterSample::now(idle, busy))
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

/// Sums per-processor `[user, system, idle, nice]` tick groups into
/// cumulative `(idle, busy)`.
///
/// Each counter is an unsigned 32-bit tick count; a short trailing group is
/// ignored.
fn sum_load_ticks(ticks: &[libc::integer_t], cpus: usize) -> (u64, u64) {
    let state = |group: &[libc::integer_t], idx: libc::c_int| u64::from(group[idx as usize] as u32);

    ticks
        .chunks_exact(CPU_STATES)
        .take(cpus)
        .fold((0, 0), |(idle, busy), group| {
            (
                idle + state(group, libc::CPU_STATE_IDLE),
                busy + state(group, libc::CPU_STATE_USER)
                    + state(group, libc::CPU_STATE_SYSTEM)
                    + state(group, libc::CPU_STATE_NICE),
            )
        })
}
