//! Static host description: names, versions and CPU model.

use hostmetrics_protocol::HostInfo;
use sysinfo::{CpuRefreshKind, RefreshKind, System};

use crate::cpu_model::parse_cpu_model;

/// Collects the host description. Never fails; unknown fields get placeholders.
pub fn read_host_info() -> HostInfo {
    let sys =
        System::new_with_specifics(RefreshKind::new().with_cpu(CpuRefreshKind::everything()));

    let cpu_model = match sys.cpus().first() {
        Some(cpu) => parse_cpu_model(cpu.brand(), Some(cpu.frequency())).to_string(),
        None => "Unknown CPU".to_string(),
    };

    HostInfo {
        hostname: hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "Unknown Host".into()),
        os_version: System::long_os_version().unwrap_or_else(|| "Unknown OS".into()),
        kernel_version: System::kernel_version().unwrap_or_else(|| "Unknown Kernel".into()),
        cpu_model,
        logical_cores: u32::try_from(sys.cpus().len()).unwrap_or(u32::MAX).max(1),
    }
}
