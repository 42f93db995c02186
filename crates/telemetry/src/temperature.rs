//! CPU temperature resolution over an ordered chain of sensor strategies.
//!
//! No single temperature source works on every host, so each platform
//! contributes a list of [`TemperatureStrategy`] values in priority order.
//! [`TemperatureResolver`] walks that list, remembers which strategy worked
//! and falls back to a usage-based estimate when nothing does.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::config::SamplerConfig;
use crate::error::SampleError;

/// An open sensor, created lazily by [`TemperatureStrategy::open`] and reused
/// across polls while it keeps producing readings.
pub trait SensorHandle: Send {
    fn read_celsius(&mut self) -> Result<f64, SampleError>;
}

/// One named way of obtaining a temperature reading.
pub trait TemperatureStrategy: Send + Sync {
    /// Stable identifier reported as the reading's source.
    fn id(&self) -> &str;

    /// Locates and opens the sensor. May be slow; runs off the async runtime.
    fn open(&self) -> Result<Box<dyn SensorHandle>, SampleError>;
}

/// Lifecycle of a strategy inside the resolver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyState {
    /// Never produced a plausible reading.
    Uninitialized,
    /// Produced a plausible reading on its last attempt.
    Active,
    /// Worked before, failed on its last attempt.
    Degraded,
}

/// Where a [`TemperatureReading`] came from.
#[derive(Debug, Clone, PartialEq)]
pub enum TemperatureSource {
    Measured { strategy: String },
    /// No strategy produced a value. `from_usage` tells whether the estimate
    /// was derived from CPU usage or is the fixed constant.
    Estimated { from_usage: bool },
}

impl TemperatureSource {
    pub const ESTIMATED_ID: &'static str = "estimated";

    /// The strategy id, or `"estimated"`.
    pub fn id(&self) -> &str {
        match self {
            Self::Measured { strategy } => strategy,
            Self::Estimated { .. } => Self::ESTIMATED_ID,
        }
    }

    pub fn is_measured(&self) -> bool {
        matches!(self, Self::Measured { .. })
    }
}

impl fmt::Display for TemperatureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemperatureReading {
    pub celsius: f64,
    pub source: TemperatureSource,
}

impl TemperatureReading {
    pub fn source_id(&self) -> &str {
        self.source.id()
    }
}

/// Open interval of believable sensor values in °C.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlausibleRange {
    pub min_exclusive: f64,
    pub max_exclusive: f64,
}

impl PlausibleRange {
    pub fn contains(&self, celsius: f64) -> bool {
        celsius > self.min_exclusive && celsius < self.max_exclusive
    }
}

impl Default for PlausibleRange {
    fn default() -> Self {
        Self {
            min_exclusive: 0.0,
            max_exclusive: 120.0,
        }
    }
}

/// Value reported when every strategy fails.
///
/// With a known CPU usage the estimate is `baseline + usage / scale_factor`,
/// otherwise `constant`. These are tuning knobs, not a thermal model.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FallbackEstimate {
    pub constant: f64,
    pub baseline: f64,
    pub scale_factor: f64,
}

impl FallbackEstimate {
    pub fn estimate(&self, usage_percent: Option<f64>) -> TemperatureReading {
        match usage_percent {
            Some(usage) if self.scale_factor > 0.0 && usage.is_finite() => TemperatureReading {
                celsius: self.baseline + usage.clamp(0.0, 100.0) / self.scale_factor,
                source: TemperatureSource::Estimated { from_usage: true },
            },
            _ => TemperatureReading {
                celsius: self.constant,
                source: TemperatureSource::Estimated { from_usage: false },
            },
        }
    }
}

impl Default for FallbackEstimate {
    #[cfg(target_os = "windows")]
    fn default() -> Self {
        Self {
            constant: 45.0,
            baseline: 35.0,
            scale_factor: 5.0,
        }
    }

    #[cfg(not(target_os = "windows"))]
    fn default() -> Self {
        Self {
            constant: 45.0,
            baseline: 35.0,
            scale_factor: 3.0,
        }
    }
}

type ProbeTask = JoinHandle<Result<(Box<dyn SensorHandle>, f64), SampleError>>;

struct Slot {
    strategy: Arc<dyn TemperatureStrategy>,
    handle: Option<Box<dyn SensorHandle>>,
    state: StrategyState,
    /// Blocking task that outlived the probe timeout. At most one per slot.
    pending: Option<ProbeTask>,
}

/// Resolves a temperature through an ordered list of strategies.
///
/// The first strategy to return a plausible value becomes preferred and is
/// tried alone on later polls. When the preferred strategy fails, its handle
/// is dropped, it is marked [`StrategyState::Degraded`] and the whole list is
/// walked again from the top in the same poll.
pub struct TemperatureResolver {
    slots: Vec<Slot>,
    preferred: Option<usize>,
    plausible: PlausibleRange,
    fallback: FallbackEstimate,
    probe_timeout: Duration,
}

impl TemperatureResolver {
    pub fn new(strategies: Vec<Arc<dyn TemperatureStrategy>>, config: &SamplerConfig) -> Self {
        let slots = strategies
            .into_iter()
            .map(|strategy| Slot {
                strategy,
                handle: None,
                state: StrategyState::Uninitialized,
                pending: None,
            })
            .collect();

        Self {
            slots,
            preferred: None,
            plausible: config.plausible,
            fallback: config.fallback,
            probe_timeout: config.probe_timeout,
        }
    }

    /// Produces a temperature, measured if possible, estimated otherwise.
    ///
    /// `usage_hint` is the most recent CPU usage, used only for the estimate.
    pub async fn resolve(&mut self, usage_hint: Option<f64>) -> TemperatureReading {
        if let Some(idx) = self.preferred {
            match self.try_slot(idx).await {
                Ok(reading) => return reading,
                Err(e) => {
                    tracing::warn!(
                        strategy = self.slots[idx].strategy.id(),
                        error = %e,
                        transient = e.is_transient(),
                        "preferred temperature source failed, rescanning"
                    );
                    self.preferred = None;
                }
            }
        }

        for idx in 0..self.slots.len() {
            match self.try_slot(idx).await {
                Ok(reading) => {
                    self.preferred = Some(idx);
                    return reading;
                }
                Err(e) => {
                    tracing::debug!(
                        strategy = self.slots[idx].strategy.id(),
                        error = %e,
                        "temperature strategy failed"
                    );
                }
            }
        }

        let reading = self.fallback.estimate(usage_hint);
        tracing::debug!(celsius = reading.celsius, "no temperature source, using estimate");
        reading
    }

    /// Runs one strategy under the probe timeout and updates its slot.
    ///
    /// A task that times out keeps running on the blocking pool and is parked
    /// in the slot. Until it finishes the strategy reports a timeout without
    /// spawning again, so a hung sensor holds at most one blocking thread.
    async fn try_slot(&mut self, idx: usize) -> Result<TemperatureReading, SampleError> {
        let timeout = self.probe_timeout;
        let slot = &mut self.slots[idx];

        let outcome = match slot.pending.take() {
            Some(task) if !task.is_finished() => {
                slot.pending = Some(task);
                Err(SampleError::Timeout(timeout))
            }
            // A late result is stale; its handle is dropped with it.
            _ => {
                let strategy = Arc::clone(&slot.strategy);
                let handle = slot.handle.take();

                let mut task = tokio::task::spawn_blocking(move || {
                    let mut handle = match handle {
                        Some(h) => h,
                        None => strategy.open()?,
                    };
                    let celsius = handle.read_celsius()?;
                    Ok::<_, SampleError>((handle, celsius))
                });

                match tokio::time::timeout(timeout, &mut task).await {
                    Ok(Ok(result)) => result,
                    Ok(Err(e)) => Err(SampleError::unavailable(format!("probe task failed: {e}"))),
                    Err(_) => {
                        slot.pending = Some(task);
                        Err(SampleError::Timeout(timeout))
                    }
                }
            }
        };

        let slot = &mut self.slots[idx];
        let outcome = match outcome {
            Ok((handle, celsius)) if self.plausible.contains(celsius) => {
                slot.handle = Some(handle);
                Ok(celsius)
            }
            Ok((_, celsius)) => Err(SampleError::Implausible { celsius }),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(celsius) => {
                if slot.state != StrategyState::Active {
                    tracing::info!(strategy = slot.strategy.id(), celsius, "temperature source active");
                }
                slot.state = StrategyState::Active;
                Ok(TemperatureReading {
                    celsius,
                    source: TemperatureSource::Measured {
                        strategy: slot.strategy.id().to_string(),
                    },
                })
            }
            Err(e) => {
                if slot.state == StrategyState::Active {
                    slot.state = StrategyState::Degraded;
                }
                Err(e)
            }
        }
    }

    /// Id of the strategy currently tried first, if any.
    pub fn preferred_strategy(&self) -> Option<&str> {
        self.preferred.map(|idx| self.slots[idx].strategy.id())
    }

    /// Every strategy id with its current state, in priority order.
    pub fn strategy_states(&self) -> Vec<(&str, StrategyState)> {
        self.slots
            .iter()
            .map(|s| (s.strategy.id(), s.state))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::testing::FnStrategy;

    fn config() -> SamplerConfig {
        SamplerConfig {
            probe_timeout: Duration::from_millis(200),
            plausible: PlausibleRange::default(),
            fallback: FallbackEstimate {
                constant: 45.0,
                baseline: 35.0,
                scale_factor: 3.0,
            },
        }
    }

    fn resolver(strategies: &[&Arc<FnStrategy>]) -> TemperatureResolver {
        let list = strategies
            .iter()
            .map(|s| Arc::clone(*s) as Arc<dyn TemperatureStrategy>)
            .collect();
        TemperatureResolver::new(list, &config())
    }

    #[tokio::test]
    async fn falls_through_to_working_strategy_and_prefers_it() {
        let a = FnStrategy::failing("A");
        let b = FnStrategy::fixed("B", 55.0);
        let mut r = resolver(&[&a, &b]);

        let first = r.resolve(None).await;
        assert_eq!(first.celsius, 55.0);
        assert_eq!(first.source_id(), "B");
        assert_eq!(a.opens.load(Ordering::SeqCst), 1);

        let second = r.resolve(None).await;
        assert_eq!(second.source_id(), "B");
        // A was skipped on the second poll.
        assert_eq!(a.opens.load(Ordering::SeqCst), 1);
        assert_eq!(b.reads.load(Ordering::SeqCst), 2);
        assert_eq!(r.preferred_strategy(), Some("B"));
    }

    #[tokio::test]
    async fn handle_is_opened_once_while_it_works() {
        let a = FnStrategy::fixed("A", 40.0);
        let mut r = resolver(&[&a]);
        for _ in 0..3 {
            r.resolve(None).await;
        }
        assert_eq!(a.opens.load(Ordering::SeqCst), 1);
        assert_eq!(a.reads.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn all_failing_with_usage_estimates_from_usage() {
        let a = FnStrategy::failing("A");
        let b = FnStrategy::failing("B");
        let mut r = resolver(&[&a, &b]);

        let reading = r.resolve(Some(30.0)).await;
        assert_eq!(reading.celsius, 35.0 + 30.0 / 3.0);
        assert_eq!(reading.source, TemperatureSource::Estimated { from_usage: true });
        assert_eq!(reading.source_id(), "estimated");
    }

    #[tokio::test]
    async fn all_failing_without_usage_uses_constant() {
        let mut r = resolver(&[]);
        let reading = r.resolve(None).await;
        assert_eq!(reading.celsius, 45.0);
        assert_eq!(reading.source, TemperatureSource::Estimated { from_usage: false });
    }

    #[tokio::test]
    async fn implausible_reading_falls_through() {
        let hot = FnStrategy::fixed("hot", 150.0);
        let zero = FnStrategy::fixed("zero", 0.0);
        let ok = FnStrategy::fixed("ok", 61.5);
        let mut r = resolver(&[&hot, &zero, &ok]);

        let reading = r.resolve(None).await;
        assert_eq!(reading.source_id(), "ok");
        assert_eq!(r.strategy_states()[0], ("hot", StrategyState::Uninitialized));
    }

    #[tokio::test]
    async fn preferred_failure_demotes_and_rescans_from_top() {
        // A fails on its first read only; B works once then fails.
        let a = FnStrategy::new("A", |n| {
            if n == 0 {
                Err(SampleError::unavailable("warming up"))
            } else {
                Ok(48.0)
            }
        });
        let b = FnStrategy::new("B", |n| {
            if n == 0 {
                Ok(52.0)
            } else {
                Err(SampleError::unavailable("sensor gone"))
            }
        });
        let mut r = resolver(&[&a, &b]);

        assert_eq!(r.resolve(None).await.source_id(), "B");

        let healed = r.resolve(None).await;
        assert_eq!(healed.source_id(), "A");
        assert_eq!(healed.celsius, 48.0);
        assert_eq!(
            r.strategy_states(),
            vec![("A", StrategyState::Active), ("B", StrategyState::Degraded)]
        );
        assert_eq!(r.preferred_strategy(), Some("A"));
    }

    #[tokio::test]
    async fn failed_handle_is_reopened() {
        let a = FnStrategy::new("A", |n| {
            if n == 1 {
                Err(SampleError::unavailable("transient"))
            } else {
                Ok(50.0)
            }
        });
        let mut r = resolver(&[&a]);

        assert!(r.resolve(None).await.source.is_measured());
        // Preferred read fails, handle dropped, rescan reopens it.
        assert!(r.resolve(None).await.source.is_measured());
        assert_eq!(a.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn stalled_probe_times_out() {
        let slow = FnStrategy::new("slow", |_| {
            std::thread::sleep(Duration::from_millis(600));
            Ok(50.0)
        });
        let fast = FnStrategy::fixed("fast", 42.0);
        let mut r = resolver(&[&slow, &fast]);

        let reading = r.resolve(None).await;
        assert_eq!(reading.source_id(), "fast");
    }

    #[test]
    fn hung_sensor_holds_a_single_blocking_thread() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .max_blocking_threads(2)
            .build()
            .unwrap();
        let hung = FnStrategy::new("hung", |_| {
            std::thread::sleep(Duration::from_millis(1500));
            Ok(50.0)
        });
        let mut r = resolver(&[&hung]);

        rt.block_on(async {
            for _ in 0..5 {
                let reading = r.resolve(None).await;
                assert_eq!(reading.source_id(), "estimated");
            }
            assert_eq!(hung.opens.load(Ordering::SeqCst), 1);

            // The pool still has room for unrelated blocking work.
            let other = tokio::task::spawn_blocking(|| 7);
            let value = tokio::time::timeout(Duration::from_millis(500), other)
                .await
                .expect("blocking pool exhausted")
                .unwrap();
            assert_eq!(value, 7);
        });
    }

    #[tokio::test]
    async fn late_result_is_discarded_and_strategy_retried() {
        let a = FnStrategy::new("A", |n| {
            if n == 0 {
                std::thread::sleep(Duration::from_millis(400));
            }
            Ok(50.0 + n as f64)
        });
        let mut r = resolver(&[&a]);

        assert_eq!(r.resolve(None).await.source_id(), "estimated");
        // Still running: no second task.
        assert_eq!(r.resolve(None).await.source_id(), "estimated");
        assert_eq!(a.opens.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(500)).await;
        let reading = r.resolve(None).await;
        assert_eq!(reading.source_id(), "A");
        assert_eq!(reading.celsius, 51.0);
        assert_eq!(a.opens.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn preferred_stall_demotes_and_recovers_later() {
        let a = FnStrategy::new("A", |n| {
            if n == 1 {
                std::thread::sleep(Duration::from_millis(400));
            }
            Ok(48.0)
        });
        let b = FnStrategy::new("B", |n| {
            if n == 0 {
                Ok(42.0)
            } else {
                Err(SampleError::unavailable("sensor gone"))
            }
        });
        let mut r = resolver(&[&a, &b]);

        assert_eq!(r.resolve(None).await.source_id(), "A");

        let second = r.resolve(None).await;
        assert_eq!(second.source_id(), "B");
        assert_eq!(second.celsius, 42.0);
        assert_eq!(r.preferred_strategy(), Some("B"));
        assert_eq!(
            r.strategy_states(),
            vec![("A", StrategyState::Degraded), ("B", StrategyState::Active)]
        );
        assert_eq!(a.opens.load(Ordering::SeqCst), 1);

        // A's stalled read finishes; once B fails, A is reopened.
        tokio::time::sleep(Duration::from_millis(500)).await;
        let third = r.resolve(None).await;
        assert_eq!(third.source_id(), "A");
        assert_eq!(third.celsius, 48.0);
        assert_eq!(a.opens.load(Ordering::SeqCst), 2);
        assert_eq!(r.preferred_strategy(), Some("A"));
        assert_eq!(
            r.strategy_states(),
            vec![("A", StrategyState::Active), ("B", StrategyState::Degraded)]
        );
    }

    #[test]
    fn fallback_clamps_usage() {
        let f = FallbackEstimate {
            constant: 45.0,
            baseline: 35.0,
            scale_factor: 5.0,
        };
        assert_eq!(f.estimate(Some(250.0)).celsius, 55.0);
        assert_eq!(f.estimate(Some(f64::NAN)).celsius, 45.0);
    }

    #[test]
    fn plausible_bounds_are_exclusive() {
        let range = PlausibleRange::default();
        assert!(!range.contains(0.0));
        assert!(range.contains(0.5));
        assert!(!range.contains(120.0));
    }
}
