//! Async host metrics collector with configurable interval.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hostmetrics_protocol::{HostInfo, HostSnapshot};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use crate::host_info::read_host_info;
use crate::sampler::HostSampler;

/// Callback invoked with each snapshot.
pub type SendFn = Box<dyn Fn(HostSnapshot) + Send + Sync + 'static>;

/// Periodic collector.
///
/// Spawns a tokio task that takes a [`HostSnapshot`] every interval and
/// delivers it through the configured callback.
pub struct Collector {
    sampler: Arc<HostSampler>,
    inner: Arc<Mutex<CollectorInner>>,
}

struct CollectorInner {
    send_fn: SendFn,
    disk_paths: Vec<PathBuf>,
    host_info: Option<HostInfo>,
    cancel: Option<CancellationToken>,
}

impl Collector {
    /// Creates a new collector with the given send callback.
    pub fn new(sampler: Arc<HostSampler>, send_fn: SendFn) -> Self {
        Self {
            sampler,
            inner: Arc::new(Mutex::new(CollectorInner {
                send_fn,
                disk_paths: vec![default_disk_path()],
                host_info: None,
                cancel: None,
            })),
        }
    }

    /// Sets which filesystems are reported.
    pub async fn set_disk_paths(&self, paths: Vec<PathBuf>) {
        self.inner.lock().await.disk_paths = paths;
    }

    /// Attaches host info to every snapshot (read once, here).
    pub async fn enable_host_info(&self) {
        let info = tokio::task::spawn_blocking(read_host_info).await;
        match info {
            Ok(info) => self.inner.lock().await.host_info = Some(info),
            Err(e) => tracing::warn!("failed to read host info: {e}"),
        }
    }

    /// Starts periodic collection at the given interval (seconds).
    ///
    /// Minimum interval is 1 second; default is 2 if 0 is passed.
    pub async fn start(&self, interval_sec: u32) {
        let mut inner = self.inner.lock().await;

        // Stop existing loop if any.
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
        }

        let interval_sec = match interval_sec {
            0 => 2,
            v => v.max(1),
        };

        // Prime CPU counters.
        self.sampler.prime().await;

        let cancel = CancellationToken::new();
        inner.cancel = Some(cancel.clone());

        let sampler = Arc::clone(&self.sampler);
        let collector = Arc::clone(&self.inner);
        let interval = Duration::from_secs(u64::from(interval_sec));

        tokio::spawn(async move {
            collection_loop(sampler, collector, interval, cancel).await;
        });

        tracing::info!(interval_sec, "metrics collector started");
    }

    /// Stops the collector.
    pub async fn stop(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(cancel) = inner.cancel.take() {
            cancel.cancel();
            tracing::info!("metrics collector stopped");
        }
    }

    /// Returns `true` if the collector is running.
    pub async fn is_running(&self) -> bool {
        self.inner.lock().await.cancel.is_some()
    }

    /// Updates the collection interval (restarts the loop).
    pub async fn update_interval(&self, interval_sec: u32) {
        self.stop().await;
        self.start(interval_sec).await;
    }
}

/// Main collection loop.
async fn collection_loop(
    sampler: Arc<HostSampler>,
    inner: Arc<Mutex<CollectorInner>>,
    interval: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    // Skip the first immediate tick.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {
                let (paths, host) = {
                    let guard = inner.lock().await;
                    (guard.disk_paths.clone(), guard.host_info.clone())
                };
                let data = sampler.snapshot(&paths, host).await;
                if cancel.is_cancelled() {
                    break;
                }
                let guard = inner.lock().await;
                (guard.send_fn)(data);
            }
        }
    }
}

fn default_disk_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("C:\\")
    } else {
        PathBuf::from("/")
    }
}
