//! Front-end facing sampler that owns all per-metric state.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use hostmetrics_protocol::{
    CpuMetrics, DiskMetrics, GaugeMetrics, HostInfo, HostSnapshot, TemperatureMetrics,
};
use tokio::sync::Mutex;

use crate::adapter::OsAdapter;
use crate::config::SamplerConfig;
use crate::cpu::{CpuUsageSampler, UsageReading};
use crate::error::SampleError;
use crate::gauge::{AbsoluteGauge, GaugeReading};
use crate::platform;
use crate::temperature::{TemperatureReading, TemperatureResolver};

/// Samples CPU, memory, disk and temperature for one host.
///
/// Each instance owns its own CPU baseline and temperature strategy state,
/// so several samplers can run side by side. Stateful samplers are guarded
/// by their own lock; memory and disk readings are stateless.
pub struct HostSampler {
    adapter: Arc<dyn OsAdapter>,
    cpu: Mutex<CpuUsageSampler>,
    temperature: Mutex<TemperatureResolver>,
}

impl HostSampler {
    pub fn new(adapter: Arc<dyn OsAdapter>, config: &SamplerConfig) -> Self {
        let temperature = TemperatureResolver::new(adapter.temperature_strategies(), config);
        Self {
            adapter,
            cpu: Mutex::new(CpuUsageSampler::new()),
            temperature: Mutex::new(temperature),
        }
    }

    /// Sampler backed by this platform's native adapter.
    pub fn native(config: &SamplerConfig) -> Self {
        Self::new(Arc::new(platform::NativeAdapter::new()), config)
    }

    /// CPU usage since the previous call; 0.0 on the first call.
    pub async fn sample_cpu_usage(&self) -> UsageReading {
        // Read while holding the lock so readings reach the tracker in order.
        let mut cpu = self.cpu.lock().await;
        let read = self.adapter.read_cpu_counters();
        cpu.sample_from(read)
    }

    pub fn sample_memory(&self) -> Result<GaugeReading, SampleError> {
        let (used, total) = self.adapter.read_memory()?;
        Ok(AbsoluteGauge::compute(used, total))
    }

    pub fn sample_disk(&self, path: &Path) -> Result<GaugeReading, SampleError> {
        let (used, total) = self.adapter.read_disk(path)?;
        Ok(AbsoluteGauge::compute(used, total))
    }

    /// Measured temperature, or an estimate from the last measured CPU usage.
    ///
    /// Does not poll the CPU counters itself.
    pub async fn sample_temperature(&self) -> TemperatureReading {
        let usage = self.cpu.lock().await.last_measured();
        self.temperature.lock().await.resolve(usage).await
    }

    /// One full poll cycle.
    ///
    /// Memory and disk queries can block on slow mounts, so they run on the
    /// blocking pool.
    pub async fn snapshot(&self, disk_paths: &[PathBuf], host: Option<HostInfo>) -> HostSnapshot {
        let cpu = self.sample_cpu_usage().await.percent().map(|p| CpuMetrics {
            usage_percent: floor_tenth(p),
        });

        let adapter = Arc::clone(&self.adapter);
        let paths = disk_paths.to_vec();
        let (memory, disks) =
            match tokio::task::spawn_blocking(move || read_gauges(adapter.as_ref(), &paths)).await {
                Ok(gauges) => gauges,
                Err(e) => {
                    tracing::warn!(error = %e, "gauge task failed");
                    (None, Vec::new())
                }
            };

        let temp = self.sample_temperature().await;
        let temperature = TemperatureMetrics {
            celsius: floor_tenth(temp.celsius),
            source_id: temp.source_id().to_string(),
            measured: temp.source.is_measured(),
        };

        HostSnapshot {
            timestamp: now_millis(),
            cpu,
            memory,
            disks,
            temperature,
            host,
        }
    }

    /// Takes a CPU baseline so the next sample yields a real delta.
    pub async fn prime(&self) {
        let _ = self.sample_cpu_usage().await;
    }

    /// Id of the temperature strategy currently preferred, if any.
    pub async fn temperature_source(&self) -> Option<String> {
        self.temperature
            .lock()
            .await
            .preferred_strategy()
            .map(str::to_string)
    }
}

fn read_gauges(
    adapter: &dyn OsAdapter,
    disk_paths: &[PathBuf],
) -> (Option<GaugeMetrics>, Vec<DiskMetrics>) {
    let memory = match adapter.read_memory() {
        Ok((used, total)) => Some(gauge_metrics(&AbsoluteGauge::compute(used, total))),
        Err(e) => {
            tracing::debug!(error = %e, "memory unavailable");
            None
        }
    };

    let disks = disk_paths
        .iter()
        .filter_map(|path| match adapter.read_disk(path) {
            Ok((used, total)) => Some(DiskMetrics {
                path: path.display().to_string(),
                usage: gauge_metrics(&AbsoluteGauge::compute(used, total)),
            }),
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "disk unavailable");
                None
            }
        })
        .collect();

    (memory, disks)
}

fn gauge_metrics(g: &GaugeReading) -> GaugeMetrics {
    GaugeMetrics {
        used_mb: floor_tenth(g.used_mb()),
        total_mb: floor_tenth(g.total_mb()),
        usage_percent: floor_tenth(g.percent()),
    }
}

/// One decimal place, truncated.
fn floor_tenth(v: f64) -> f64 {
    (v * 10.0).floor() / 10.0
}

fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;
    use crate::temperature::{TemperatureSource, TemperatureStrategy};
    use crate::testing::{FakeAdapter, FnStrategy};

    fn sampler(adapter: FakeAdapter) -> (Arc<FakeAdapter>, HostSampler) {
        let adapter = Arc::new(adapter);
        let sampler = HostSampler::new(
            Arc::clone(&adapter) as Arc<dyn OsAdapter>,
            &SamplerConfig::default(),
        );
        (adapter, sampler)
    }

    #[tokio::test]
    async fn cpu_first_poll_zero_then_delta() {
        let (_, s) = sampler(FakeAdapter::with_cpu([
            Some((1000, 1000)),
            Some((1080, 1020)),
        ]));
        assert_eq!(s.sample_cpu_usage().await, UsageReading::Percent(0.0));
        assert_eq!(s.sample_cpu_usage().await, UsageReading::Percent(20.0));
    }

    #[tokio::test]
    async fn cpu_read_failure_is_unavailable_not_zero() {
        let (_, s) = sampler(FakeAdapter::with_cpu([Some((0, 0)), None, Some((50, 50))]));
        s.sample_cpu_usage().await;
        assert_eq!(s.sample_cpu_usage().await, UsageReading::Unavailable);
        assert_eq!(s.sample_cpu_usage().await, UsageReading::Percent(50.0));
    }

    #[tokio::test]
    async fn memory_is_idempotent() {
        let (_, s) = sampler(FakeAdapter {
            memory: Some((4 * 1_048_576, 16 * 1_048_576)),
            ..FakeAdapter::default()
        });
        let a = s.sample_memory().unwrap();
        let b = s.sample_memory().unwrap();
        assert_eq!(a, b);
        assert_eq!(a.percent(), 25.0);
        assert_eq!(a.used_mb(), 4.0);
    }

    #[tokio::test]
    async fn disk_over_capacity_is_clamped() {
        let (_, s) = sampler(FakeAdapter {
            disk: Some((150, 100)),
            ..FakeAdapter::default()
        });
        let g = s.sample_disk(Path::new("/")).unwrap();
        assert_eq!(g.percent(), 100.0);
        assert_eq!(g.used_mb(), g.total_mb());
    }

    #[tokio::test]
    async fn memory_failure_propagates() {
        let (_, s) = sampler(FakeAdapter::default());
        assert!(matches!(
            s.sample_memory(),
            Err(SampleError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn temperature_estimate_uses_last_usage_without_polling_cpu() {
        let failing = FnStrategy::failing("A") as Arc<dyn TemperatureStrategy>;
        let (adapter, s) = sampler(FakeAdapter {
            strategies: vec![failing],
            ..FakeAdapter::with_cpu([Some((0, 0)), Some((70, 30))])
        });
        s.sample_cpu_usage().await;
        s.sample_cpu_usage().await;
        let reads = adapter.cpu_reads.load(Ordering::SeqCst);

        let reading = s.sample_temperature().await;
        let fallback = SamplerConfig::default().fallback;
        assert_eq!(
            reading.celsius,
            fallback.baseline + 30.0 / fallback.scale_factor
        );
        assert_eq!(reading.source, TemperatureSource::Estimated { from_usage: true });
        assert_eq!(adapter.cpu_reads.load(Ordering::SeqCst), reads);
    }

    #[tokio::test]
    async fn temperature_before_any_usage_is_constant() {
        let (_, s) = sampler(FakeAdapter::default());
        let reading = s.sample_temperature().await;
        assert_eq!(reading.celsius, SamplerConfig::default().fallback.constant);
        assert_eq!(reading.source_id(), "estimated");
    }

    #[tokio::test]
    async fn snapshot_collects_everything() {
        let sensor = FnStrategy::fixed("sensor", 61.25) as Arc<dyn TemperatureStrategy>;
        let (_, s) = sampler(FakeAdapter {
            memory: Some((1_048_576, 4 * 1_048_576)),
            disk: Some((10 * 1_048_576, 40 * 1_048_576)),
            strategies: vec![sensor],
            ..FakeAdapter::with_cpu([Some((100, 100)), Some((190, 110))])
        });
        s.prime().await;

        let snap = s.snapshot(&[PathBuf::from("/")], None).await;
        assert_eq!(snap.cpu.map(|c| c.usage_percent), Some(10.0));
        assert_eq!(snap.memory.map(|m| m.usage_percent), Some(25.0));
        assert_eq!(snap.disks.len(), 1);
        assert_eq!(snap.disks[0].usage.total_mb, 40.0);
        assert_eq!(snap.temperature.source_id, "sensor");
        assert_eq!(snap.temperature.celsius, 61.2);
        assert!(snap.temperature.measured);
        assert!(snap.timestamp > 0);
        assert_eq!(s.temperature_source().await.as_deref(), Some("sensor"));
    }

    #[tokio::test]
    async fn snapshot_omits_unavailable_metrics() {
        let (_, s) = sampler(FakeAdapter::default());
        let snap = s.snapshot(&[PathBuf::from("/")], None).await;
        assert!(snap.cpu.is_none());
        assert!(snap.memory.is_none());
        assert!(snap.disks.is_empty());
        assert!(!snap.temperature.measured);
    }

    #[tokio::test]
    async fn slow_disk_does_not_stall_the_runtime() {
        let (_, s) = sampler(FakeAdapter {
            disk: Some((1, 2)),
            disk_delay: Some(Duration::from_millis(300)),
            ..FakeAdapter::default()
        });
        let ticks = Arc::new(AtomicUsize::new(0));
        let ticker = {
            let ticks = Arc::clone(&ticks);
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    ticks.fetch_add(1, Ordering::SeqCst);
                }
            })
        };

        let snap = s.snapshot(&[PathBuf::from("/")], None).await;
        ticker.abort();

        assert_eq!(snap.disks.len(), 1);
        assert!(ticks.load(Ordering::SeqCst) >= 5);
    }

    #[tokio::test]
    async fn concurrent_cpu_polls_stay_in_range() {
        let readings = (0..20u64).map(|i| Some((i * 10, i * 7)));
        let (_, s) = sampler(FakeAdapter::with_cpu(readings));
        let s = Arc::new(s);

        let mut tasks = Vec::new();
        for _ in 0..20 {
            let s = Arc::clone(&s);
            tasks.push(tokio::spawn(async move { s.sample_cpu_usage().await }));
        }
        for t in tasks {
            let p = t.await.unwrap().percent().unwrap();
            assert!((0.0..=100.0).contains(&p));
        }
    }
}
