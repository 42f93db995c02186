//! Scripted adapter and strategies for unit tests.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::adapter::OsAdapter;
use crate::delta::CounterSample;
use crate::error::SampleError;
use crate::temperature::{SensorHandle, TemperatureStrategy};

type ReadFn = dyn Fn(usize) -> Result<f64, SampleError> + Send + Sync;

/// Strategy whose reads are answered by a closure of the read number.
pub struct FnStrategy {
    id: String,
    read: Arc<ReadFn>,
    pub opens: AtomicUsize,
    pub reads: Arc<AtomicUsize>,
}

impl FnStrategy {
    pub fn new(
        id: &str,
        read: impl Fn(usize) -> Result<f64, SampleError> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            read: Arc::new(read),
            opens: AtomicUsize::new(0),
            reads: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn fixed(id: &str, celsius: f64) -> Arc<Self> {
        Self::new(id, move |_| Ok(celsius))
    }

    pub fn failing(id: &str) -> Arc<Self> {
        Self::new(id, |_| Err(SampleError::unavailable("no sensor")))
    }
}

struct FnHandle {
    read: Arc<ReadFn>,
    reads: Arc<AtomicUsize>,
}

impl SensorHandle for FnHandle {
    fn read_celsius(&mut self) -> Result<f64, SampleError> {
        let n = self.reads.fetch_add(1, Ordering::SeqCst);
        (self.read)(n)
    }
}

impl TemperatureStrategy for FnStrategy {
    fn id(&self) -> &str {
        &self.id
    }

    fn open(&self) -> Result<Box<dyn SensorHandle>, SampleError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FnHandle {
            read: Arc::clone(&self.read),
            reads: Arc::clone(&self.reads),
        }))
    }
}

/// Adapter replaying queued CPU readings and fixed gauges.
#[derive(Default)]
pub struct FakeAdapter {
    pub cpu: Mutex<VecDeque<Option<(u64, u64)>>>,
    pub memory: Option<(u64, u64)>,
    pub disk: Option<(u64, u64)>,
    /// Blocks every disk read for this long.
    pub disk_delay: Option<Duration>,
    pub strategies: Vec<Arc<dyn TemperatureStrategy>>,
    pub cpu_reads: AtomicUsize,
}

impl FakeAdapter {
    /// Queues CPU readings; `None` simulates a failed read.
    pub fn with_cpu(readings: impl IntoIterator<Item = Option<(u64, u64)>>) -> Self {
        Self {
            cpu: Mutex::new(readings.into_iter().collect()),
            ..Self::default()
        }
    }
}

impl OsAdapter for FakeAdapter {
    fn read_cpu_counters(&self) -> Result<CounterSample, SampleError> {
        self.cpu_reads.fetch_add(1, Ordering::SeqCst);
        let next = self.cpu.lock().unwrap().pop_front().flatten();
        next.map(|(idle, busy)| CounterSample::now(idle, busy))
            .ok_or_else(|| SampleError::unavailable("scripted failure"))
    }

    fn read_memory(&self) -> Result<(u64, u64), SampleError> {
        self.memory
            .ok_or_else(|| SampleError::unavailable("scripted failure"))
    }

    fn read_disk(&self, _path: &Path) -> Result<(u64, u64), SampleError> {
        if let Some(delay) = self.disk_delay {
            std::thread::sleep(delay);
        }
        self.disk.ok_or_else(|| SampleError::unavailable("scripted failure"))
    }

    fn temperature_strategies(&self) -> Vec<Arc<dyn TemperatureStrategy>> {
        self.strategies.clone()
    }
}
