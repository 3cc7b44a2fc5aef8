//! Bounded worker pool for decode units
//!
//! Spawns two groups of worker threads over the shared unit queue: a
//! light lane for metadata and icon reads (sized by hardware parallelism,
//! these are short) and a heavy lane for full-image decodes (sized more
//! conservatively, each unit may allocate tens of megabytes). Workers
//! pull the nearest-pivot unit from their lane, run the executor, and
//! send the result on the completion channel; the dispatcher is never
//! blocked.
//!
//! Cancellation is cooperative. A cancelled generation stops being
//! scheduled and results stamped with it are dropped; a decode already in
//! progress runs to completion and its result is discarded.

use crate::cancel::{CancellationToken, GenerationWatermark};
use crate::queue::{Lane, UnitKind, UnitQueue, WorkUnit};
use crossbeam_channel::Sender;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Callback that performs the decode for one unit.
///
/// Invoked on a worker thread. The executor should check
/// `token.is_cancelled()` between expensive calls and bail out early;
/// whatever it returns for a cancelled unit is dropped by the worker.
pub type UnitExecutor<R, T> = Arc<dyn Fn(&WorkUnit<R>, &CancellationToken) -> T + Send + Sync>;

/// Completed unit, stamped with the generation it was issued under.
#[derive(Debug, Clone)]
pub struct UnitResult<T> {
    pub key: usize,
    pub kind: UnitKind,
    pub generation: u64,
    pub payload: T,
}

/// Configuration for the worker pool.
#[derive(Debug, Clone)]
pub struct WorkerPoolConfig {
    /// Light-lane threads (metadata/icon reads).
    /// Default: available hardware parallelism.
    pub light_workers: usize,

    /// Heavy-lane threads (full-image decodes). Default: 2.
    pub heavy_workers: usize,

    /// How long an idle worker waits before re-checking its lane.
    /// Default: 50ms.
    pub poll_interval: Duration,
}

impl Default for WorkerPoolConfig {
    fn default() -> Self {
        Self {
            light_workers: available_parallelism(),
            heavy_workers: 2,
            poll_interval: Duration::from_millis(50),
        }
    }
}

impl WorkerPoolConfig {
    /// Create a configuration with explicit lane sizes.
    pub fn new(light_workers: usize, heavy_workers: usize) -> Self {
        Self {
            light_workers: light_workers.max(1),
            heavy_workers: heavy_workers.max(1),
            poll_interval: Duration::from_millis(50),
        }
    }

    /// Set the idle poll interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

/// Worker pool executing decode units in priority order per lane.
///
/// # Example
///
/// ```
/// use gallery_scheduler::{UnitKind, WorkerPool, WorkerPoolConfig, WorkUnit, CancellationToken};
/// use std::sync::Arc;
///
/// let (results_tx, results_rx) = crossbeam_channel::unbounded();
/// let executor = Arc::new(|unit: &WorkUnit<u32>, _token: &CancellationToken| {
///     unit.request * 2
/// });
/// let pool = WorkerPool::new(executor, results_tx, WorkerPoolConfig::new(1, 1));
///
/// pool.submit(0, UnitKind::Metadata, 0, 0, 21);
/// let result = results_rx.recv().unwrap();
/// assert_eq!(result.payload, 42);
///
/// pool.shutdown();
/// ```
pub struct WorkerPool<R> {
    queue: UnitQueue<R>,
    watermark: GenerationWatermark,
    shutdown: Arc<AtomicBool>,
    poll_interval: Duration,
    workers: Vec<Worker>,
}

impl<R: Send + 'static> WorkerPool<R> {
    /// Create and start a pool; workers begin polling immediately.
    pub fn new<T: Send + 'static>(
        executor: UnitExecutor<R, T>,
        results: Sender<UnitResult<T>>,
        config: WorkerPoolConfig,
    ) -> Self {
        let queue = UnitQueue::new();
        let watermark = GenerationWatermark::new();
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut workers = Vec::with_capacity(config.light_workers + config.heavy_workers);

        for id in 0..config.light_workers {
            workers.push(Worker::spawn(
                format!("gallery-light-worker-{}", id),
                Lane::Light,
                queue.clone(),
                watermark.clone(),
                executor.clone(),
                results.clone(),
                shutdown.clone(),
                config.poll_interval,
            ));
        }
        for id in 0..config.heavy_workers {
            workers.push(Worker::spawn(
                format!("gallery-heavy-worker-{}", id),
                Lane::Heavy,
                queue.clone(),
                watermark.clone(),
                executor.clone(),
                results.clone(),
                shutdown.clone(),
                config.poll_interval,
            ));
        }

        Self {
            queue,
            watermark,
            shutdown,
            poll_interval: config.poll_interval,
            workers,
        }
    }

    /// Queue a unit for execution.
    ///
    /// Returns `false` (without queuing) if the unit's generation has
    /// already been cancelled.
    pub fn submit(&self, key: usize, kind: UnitKind, generation: u64, distance: u32, request: R) -> bool {
        if self.watermark.is_cancelled(generation) {
            return false;
        }
        self.queue.push(key, kind, generation, distance, request);
        true
    }

    /// Cancel `generation` and everything older.
    ///
    /// Queued units of cancelled generations are dropped; in-flight units
    /// finish their current decode and have their results discarded.
    /// Returns the number of queued units dropped.
    pub fn cancel_generation(&self, generation: u64) -> usize {
        self.watermark.cancel_generation(generation);
        let removed = self.queue.remove_generation(generation);
        if removed > 0 {
            log::debug!(
                "cancelled generation {}: dropped {} queued units",
                generation,
                removed
            );
        }
        removed
    }

    /// Pull back all queued units so they can be re-issued.
    ///
    /// In-flight units are unaffected; their results stay valid because
    /// they are keyed by row and stamped with a live generation.
    pub fn clear_pending(&self) -> Vec<WorkUnit<R>> {
        self.queue.clear_pending()
    }

    /// Wait until no queued or in-flight units remain, any generation.
    ///
    /// Returns `true` if the pool drained within `timeout`.
    pub fn drain(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.queue.outstanding() == 0 {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            thread::sleep(self.poll_interval.min(Duration::from_millis(10)));
        }
    }

    /// Queued plus in-flight units.
    pub fn outstanding(&self) -> usize {
        self.queue.outstanding()
    }

    /// Queued units not yet checked out.
    pub fn pending(&self) -> usize {
        self.queue.pending()
    }

    /// Total worker threads across both lanes.
    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }

    /// Shut down the pool and join all workers.
    ///
    /// Workers finish their current unit; remaining queued units are not
    /// executed.
    pub fn shutdown(self) {
        self.shutdown.store(true, Ordering::Release);
        for worker in self.workers {
            worker.join();
        }
    }
}

struct Worker {
    thread: Option<JoinHandle<()>>,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    fn spawn<R: Send + 'static, T: Send + 'static>(
        name: String,
        lane: Lane,
        queue: UnitQueue<R>,
        watermark: GenerationWatermark,
        executor: UnitExecutor<R, T>,
        results: Sender<UnitResult<T>>,
        shutdown: Arc<AtomicBool>,
        poll_interval: Duration,
    ) -> Self {
        let thread = thread::Builder::new()
            .name(name)
            .spawn(move || {
                Self::run(lane, queue, watermark, executor, results, shutdown, poll_interval);
            })
            .expect("Failed to spawn worker thread");

        Self {
            thread: Some(thread),
        }
    }

    fn run<R, T>(
        lane: Lane,
        queue: UnitQueue<R>,
        watermark: GenerationWatermark,
        executor: UnitExecutor<R, T>,
        results: Sender<UnitResult<T>>,
        shutdown: Arc<AtomicBool>,
        poll_interval: Duration,
    ) {
        loop {
            if shutdown.load(Ordering::Acquire) {
                break;
            }

            let Some(unit) = queue.checkout(lane) else {
                thread::sleep(poll_interval);
                continue;
            };

            if watermark.is_cancelled(unit.generation) {
                // Dropped without executing; the generation is gone.
                log::trace!(
                    "skipping unit for row {} from cancelled generation {}",
                    unit.key,
                    unit.generation
                );
                queue.finish();
                continue;
            }

            let token = watermark.token(unit.generation);
            let payload = executor(&unit, &token);

            if token.is_cancelled() {
                log::trace!(
                    "discarding result for row {} from cancelled generation {}",
                    unit.key,
                    unit.generation
                );
            } else {
                // A closed channel means the dispatcher is gone; keep
                // draining so shutdown can complete.
                let _ = results.send(UnitResult {
                    key: unit.key,
                    kind: unit.kind,
                    generation: unit.generation,
                    payload,
                });
            }
            queue.finish();
        }
    }

    fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            thread.join().expect("Worker thread panicked");
        }
    }
}

/// Logical CPU count, used to size the light lane.
fn available_parallelism() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}
