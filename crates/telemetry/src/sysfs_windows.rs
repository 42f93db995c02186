//! Windows metric readers.
//!
//! CPU and memory use Win32 APIs. No documented API exposes the CPU package
//! temperature without a kernel driver; the strategies read the ACPI thermal
//! zone through PDH, the temperature value some firmware publishes in the
//! registry, and finally whatever `sysinfo` surfaces.

use std::path::Path;
use std::sync::Arc;

use windows_sys::Win32::Foundation::{ERROR_SUCCESS, FILETIME};
use windows_sys::Win32::System::Performance::{
    PDH_FMT_COUNTERVALUE, PDH_FMT_DOUBLE, PDH_HCOUNTER, PDH_HQUERY, PdhAddEnglishCounterW,
    PdhCloseQuery, PdhCollectQueryData, PdhGetFormattedCounterValue, PdhOpenQueryW,
};
use windows_sys::Win32::System::Registry::{HKEY_LOCAL_MACHINE, RRF_RT_REG_DWORD, RegGetValueW};
use windows_sys::Win32::System::SystemInformation::{GlobalMemoryStatusEx, MEMORYSTATUSEX};
use windows_sys::Win32::System::Threading::GetSystemTimes;

use crate::adapter::OsAdapter;
use crate::delta::CounterSample;
use crate::error::SampleError;
use crate::sensors::{self, ComponentsStrategy};
use crate::temperature::{SensorHandle, TemperatureStrategy};

const THERMAL_ZONE_COUNTER: &str = r"\Thermal Zone Information(_TZ.0)\Temperature";
const PROCESSOR_KEY: &str = r"HARDWARE\DESCRIPTION\System\CentralProcessor\0";
const TEMPERATURE_VALUE: &str = "Temperature";

#[derive(Debug, Default)]
pub struct NativeAdapter;

impl NativeAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl OsAdapter for NativeAdapter {
    fn read_cpu_counters(&self) -> Result<CounterSample, SampleError> {
        let mut idle = FILETIME {
            dwLowDateTime: 0,
            dwHighDateTime: 0,
        };
        let mut kernel = idle;
        let mut user = idle;

        // SAFETY: all three pointers refer to live, writable FILETIME values.
        let ok = unsafe { GetSystemTimes(&mut idle, &mut kernel, &mut user) };
        if ok == 0 {
            return Err(SampleError::Io(std::io::Error::last_os_error()));
        }

        let idle = filetime_ticks(&idle);
        // Kernel time includes idle time.
        let busy = (filetime_ticks(&kernel) + filetime_ticks(&user)).saturating_sub(idle);
        Ok(CounterSample::now(idle, busy))
    }

    fn read_memory(&self) -> Result<(u64, u64), SampleError> {
        // SAFETY: MEMORYSTATUSEX is plain data; zeroed is a valid bit pattern.
        let mut status: MEMORYSTATUSEX = unsafe { std::mem::zeroed() };
        status.dwLength = std::mem::size_of::<MEMORYSTATUSEX>() as u32;

        // SAFETY: `status` is writable and `dwLength` is set as the API requires.
        let ok = unsafe { GlobalMemoryStatusEx(&mut status) };
        if ok == 0 {
            return Err(SampleError::Io(std::io::Error::last_os_error()));
        }

        let total = status.ullTotalPhys;
        Ok((total.saturating_sub(status.ullAvailPhys), total))
    }

    fn read_disk(&self, path: &Path) -> Result<(u64, u64), SampleError> {
        sensors::read_disk_usage(path)
    }

    fn temperature_strategies(&self) -> Vec<Arc<dyn TemperatureStrategy>> {
        vec![
            Arc::new(PdhStrategy),
            Arc::new(RegistryStrategy),
            Arc::new(ComponentsStrategy),
        ]
    }
}

fn filetime_ticks(ft: &FILETIME) -> u64 {
    (u64::from(ft.dwHighDateTime) << 32) | u64::from(ft.dwLowDateTime)
}

/// NUL-terminated UTF-16 for the `W` APIs.
fn wide(s: &str) -> Vec<u16> {
    s.encode_utf16().chain(Some(0)).collect()
}

/// The thermal zone counter reports Kelvin.
fn kelvin_to_celsius(kelvin: f64) -> f64 {
    kelvin - 273.15
}

/// Registry temperatures are tenths of a Kelvin.
fn decikelvin_to_celsius(decikelvin: u32) -> f64 {
    f64::from(decikelvin) / 10.0 - 273.15
}

/// ACPI thermal zone `_TZ.0` read through a PDH query.
#[derive(Debug, Default)]
pub struct PdhStrategy;

impl TemperatureStrategy for PdhStrategy {
    fn id(&self) -> &str {
        "pdh"
    }

    fn open(&self) -> Result<Box<dyn SensorHandle>, SampleError> {
        // SAFETY: PDH handles are plain values; zero is the "no handle" state.
        let mut query: PDH_HQUERY = unsafe { std::mem::zeroed() };
        // SAFETY: a null data source selects live data; `query` is writable.
        let status = unsafe { PdhOpenQueryW(std::ptr::null(), 0, &mut query) };
        if status != ERROR_SUCCESS {
            return Err(SampleError::unavailable(format!(
                "PdhOpenQueryW failed: {status:#x}"
            )));
        }
        // From here on Drop closes the query.
        let mut sensor = PdhSensor {
            query,
            // SAFETY: as above.
            counter: unsafe { std::mem::zeroed() },
        };

        let path = wide(THERMAL_ZONE_COUNTER);
        // SAFETY: `path` is NUL-terminated and outlives the call.
        let status =
            unsafe { PdhAddEnglishCounterW(sensor.query, path.as_ptr(), 0, &mut sensor.counter) };
        if status != ERROR_SUCCESS {
            return Err(SampleError::unavailable(format!(
                "thermal zone counter missing: {status:#x}"
            )));
        }

        Ok(Box::new(sensor))
    }
}

struct PdhSensor {
    query: PDH_HQUERY,
    counter: PDH_HCOUNTER,
}

// SAFETY: PDH query handles are not tied to the thread that opened them, and
// the resolver never uses one handle from two threads at once.
unsafe impl Send for PdhSensor {}

impl SensorHandle for PdhSensor {
    fn read_celsius(&mut self) -> Result<f64, SampleError> {
        // SAFETY: `query` is open for the lifetime of `self`.
        let status = unsafe { PdhCollectQueryData(self.query) };
        if status != ERROR_SUCCESS {
            return Err(SampleError::unavailable(format!(
                "PdhCollectQueryData failed: {status:#x}"
            )));
        }

        // SAFETY: plain data; zeroed is a valid bit pattern.
        let mut value: PDH_FMT_COUNTERVALUE = unsafe { std::mem::zeroed() };
        // SAFETY: `counter` belongs to `query`; the type out-pointer is optional.
        let status = unsafe {
            PdhGetFormattedCounterValue(
                self.counter,
                PDH_FMT_DOUBLE,
                std::ptr::null_mut(),
                &mut value,
            )
        };
        if status != ERROR_SUCCESS || value.CStatus != ERROR_SUCCESS {
            return Err(SampleError::unavailable(format!(
                "thermal zone value invalid: {status:#x}"
            )));
        }

        // SAFETY: PDH_FMT_DOUBLE fills the `doubleValue` member.
        let kelvin = unsafe { value.Anonymous.doubleValue };
        if kelvin <= 0.0 {
            return Err(SampleError::unavailable("thermal zone reported zero"));
        }
        Ok(kelvin_to_celsius(kelvin))
    }
}

impl Drop for PdhSensor {
    fn drop(&mut self) {
        // SAFETY: `query` was opened by PdhOpenQueryW and is closed only here.
        unsafe {
            PdhCloseQuery(self.query);
        }
    }
}

/// `Temperature` value under the first processor's registry key.
#[derive(Debug, Default)]
pub struct RegistryStrategy;

impl TemperatureStrategy for RegistryStrategy {
    fn id(&self) -> &str {
        "registry"
    }

    fn open(&self) -> Result<Box<dyn SensorHandle>, SampleError> {
        let mut sensor = RegistrySensor {
            key: wide(PROCESSOR_KEY),
            value: wide(TEMPERATURE_VALUE),
        };
        // Most systems lack the value; fail here rather than on every read.
        sensor.read_celsius()?;
        Ok(Box::new(sensor))
    }
}

struct RegistrySensor {
    key: Vec<u16>,
    value: Vec<u16>,
}

impl SensorHandle for RegistrySensor {
    fn read_celsius(&mut self) -> Result<f64, SampleError> {
        let mut data: u32 = 0;
        let mut size = std::mem::size_of::<u32>() as u32;
        // SAFETY: both names are NUL-terminated; `data` holds `size` bytes.
        let status = unsafe {
            RegGetValueW(
                HKEY_LOCAL_MACHINE,
                self.key.as_ptr(),
                self.value.as_ptr(),
                RRF_RT_REG_DWORD,
                std::ptr::null_mut(),
                (&mut data as *mut u32).cast(),
                &mut size,
            )
        };
        if status != ERROR_SUCCESS {
            return Err(SampleError::unavailable(format!(
                "processor temperature not in registry: {status}"
            )));
        }
        Ok(decikelvin_to_celsius(data))
    }
}
