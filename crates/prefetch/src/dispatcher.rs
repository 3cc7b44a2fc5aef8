//! Read-ahead coordinator
//!
//! One coordinator thread owns all scheduling state: the scan order, the
//! worker pool, the image store, the icon window and the direction
//! tracker. UI events arrive on a control channel; decode completions
//! arrive on the pool's results channel; the coordinator blocks on
//! `select!` over both.
//!
//! Results are applied only when their generation stamp matches the row
//! source's live generation at apply time. That check is the sole defense
//! against stale writes; completion order within a generation does not
//! matter because every write is keyed by row.

use crate::source::{DecodeError, Decoder, IconPixels, RowMetadata, RowSource};
use crossbeam_channel::{unbounded, Receiver, Sender};
use gallery_cache::{
    compute_target_range, CacheConfig, Direction, DirectionTracker, IconWindow, ImageCacheStore,
    ImagePixels,
};
use gallery_scheduler::{
    UnitExecutor, UnitKind, UnitResult, WorkUnit, WorkerPool, WorkerPoolConfig,
};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Why the pivot moved. Only genuine repositions feed direction tracking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PivotReason {
    /// The user selected a row.
    Selection,
    /// The viewport scrolled.
    Scroll,
    /// The window was resized; the pivot is recomputed but the user did
    /// not move.
    Resize,
    /// The sort order or filter changed.
    SortFilter,
    /// A different folder was opened.
    FolderChange,
}

/// Tunables for the prefetch engine.
#[derive(Debug, Clone)]
pub struct PrefetchConfig {
    /// Cache budgets and scheduling weights.
    pub cache: CacheConfig,

    /// Worker lane sizes and idle poll interval.
    pub workers: WorkerPoolConfig,

    /// Long-edge bound for decoded thumbnails.
    pub icon_max_side: u32,

    /// How long a generation switch waits for in-flight decodes before
    /// proceeding; late results are discarded by the stamp check anyway.
    pub drain_timeout: Duration,

    /// Icon evictions allowed per cleanup call; the sweep resumes on the
    /// next icon completion.
    pub icon_sweep_budget: usize,
}

impl Default for PrefetchConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            workers: WorkerPoolConfig::default(),
            icon_max_side: 256,
            drain_timeout: Duration::from_secs(2),
            icon_sweep_budget: 16,
        }
    }
}

/// Decode parameters carried by a work unit.
#[derive(Debug, Clone)]
pub enum DecodeRequest {
    Metadata { path: PathBuf },
    Icon { path: PathBuf, max_side: u32 },
    Full { path: PathBuf, metadata: RowMetadata },
}

/// Successful decode output, one variant per unit kind.
#[derive(Debug, Clone)]
pub enum DecodePayload {
    Metadata(RowMetadata),
    Icon(IconPixels),
    Full(ImagePixels),
}

enum Control {
    SetPivot { key: usize, reason: PivotReason },
    Stop,
}

/// Point-in-time snapshot of engine state for the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PrefetchStatus {
    pub is_running: bool,
    pub cached_bytes: u64,
    pub max_bytes: u64,
    /// Inclusive row interval eligible for full-image caching, once the
    /// full pass has started.
    pub target_range: Option<(usize, usize)>,
    /// Percentage of rows whose metadata pass has completed.
    pub progress_percent: u8,
}

struct StatusInner {
    is_running: AtomicBool,
    cached_bytes: AtomicU64,
    max_bytes: AtomicU64,
    // -1 encodes "no target range yet".
    target_first: AtomicI64,
    target_last: AtomicI64,
    progress_percent: AtomicU64,
}

impl StatusInner {
    fn new(max_bytes: u64) -> Self {
        Self {
            is_running: AtomicBool::new(false),
            cached_bytes: AtomicU64::new(0),
            max_bytes: AtomicU64::new(max_bytes),
            target_first: AtomicI64::new(-1),
            target_last: AtomicI64::new(-1),
            progress_percent: AtomicU64::new(0),
        }
    }

    fn snapshot(&self) -> PrefetchStatus {
        let first = self.target_first.load(Ordering::Relaxed);
        let last = self.target_last.load(Ordering::Relaxed);
        PrefetchStatus {
            is_running: self.is_running.load(Ordering::Acquire),
            cached_bytes: self.cached_bytes.load(Ordering::Relaxed),
            max_bytes: self.max_bytes.load(Ordering::Relaxed),
            target_range: if first >= 0 && last >= 0 {
                Some((first as usize, last as usize))
            } else {
                None
            },
            progress_percent: self.progress_percent.load(Ordering::Relaxed).min(100) as u8,
        }
    }
}

/// Spawns and owns the coordinator thread.
pub struct Dispatcher;

impl Dispatcher {
    /// Start the engine over a row source and a decoder.
    ///
    /// Nothing is scheduled until the first
    /// [`DispatcherHandle::set_pivot`].
    pub fn spawn(
        rows: Arc<dyn RowSource>,
        decoder: Arc<dyn Decoder>,
        config: PrefetchConfig,
    ) -> DispatcherHandle {
        let (control_tx, control_rx) = unbounded();
        let (results_tx, results_rx) = unbounded();
        let status = Arc::new(StatusInner::new(config.cache.max_cache_bytes));

        let executor: UnitExecutor<DecodeRequest, Result<DecodePayload, DecodeError>> = {
            let decoder = Arc::clone(&decoder);
            Arc::new(move |unit: &WorkUnit<DecodeRequest>, _token| match &unit.request {
                DecodeRequest::Metadata { path } => {
                    decoder.read_metadata(path).map(DecodePayload::Metadata)
                }
                DecodeRequest::Icon { path, max_side } => {
                    decoder.read_icon(path, *max_side).map(DecodePayload::Icon)
                }
                DecodeRequest::Full { path, metadata } => {
                    decoder.read_full(path, metadata).map(DecodePayload::Full)
                }
            })
        };
        let pool = WorkerPool::new(executor, results_tx, config.workers.clone());

        let coordinator = Coordinator {
            store: ImageCacheStore::new(config.cache.max_cache_bytes),
            icons: IconWindow::new(config.cache.icon_chunk_size, config.cache.icon_expansion_factor),
            tracker: DirectionTracker::new(config.cache.direction_threshold),
            generation: rows.generation(),
            rows,
            config,
            pool,
            results: results_rx,
            control: control_rx,
            status: Arc::clone(&status),
            started: false,
            pivot: 0,
            direction: Direction::Forward,
            target: None,
            full_pass_started: false,
            metadata: HashMap::new(),
            issued: HashSet::new(),
            failed: HashSet::new(),
        };

        let thread = thread::Builder::new()
            .name("gallery-dispatcher".to_string())
            .spawn(move || coordinator.run())
            .expect("Failed to spawn dispatcher thread");

        DispatcherHandle {
            control: control_tx,
            status,
            thread: Some(thread),
        }
    }
}

/// Handle to a running engine.
///
/// # Example
///
/// ```no_run
/// use gallery_prefetch::{Dispatcher, PivotReason, PrefetchConfig};
/// # use gallery_prefetch::{Decoder, RowSource};
/// # use std::sync::Arc;
/// # fn demo(rows: Arc<dyn RowSource>, decoder: Arc<dyn Decoder>) {
/// let handle = Dispatcher::spawn(rows, decoder, PrefetchConfig::default());
/// handle.set_pivot(500, PivotReason::Selection);
/// let status = handle.status();
/// assert!(status.is_running);
/// handle.stop();
/// # }
/// ```
pub struct DispatcherHandle {
    control: Sender<Control>,
    status: Arc<StatusInner>,
    thread: Option<JoinHandle<()>>,
}

impl DispatcherHandle {
    /// Report that the center of attention moved to `key`.
    pub fn set_pivot(&self, key: usize, reason: PivotReason) {
        let _ = self.control.send(Control::SetPivot { key, reason });
    }

    /// Lock-free status snapshot for the UI.
    pub fn status(&self) -> PrefetchStatus {
        self.status.snapshot()
    }

    /// Cancel everything and join the coordinator thread.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.control.send(Control::Stop);
            let _ = thread.join();
        }
    }
}

impl Drop for DispatcherHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

struct Coordinator {
    rows: Arc<dyn RowSource>,
    config: PrefetchConfig,
    pool: WorkerPool<DecodeRequest>,
    results: Receiver<UnitResult<Result<DecodePayload, DecodeError>>>,
    control: Receiver<Control>,
    store: ImageCacheStore,
    icons: IconWindow,
    tracker: DirectionTracker,
    status: Arc<StatusInner>,

    /// False until the first pivot event arrives.
    started: bool,
    generation: u64,
    pivot: usize,
    direction: Direction,
    target: Option<(usize, usize)>,
    full_pass_started: bool,

    /// Parsed metadata per row, this generation.
    metadata: HashMap<usize, RowMetadata>,
    /// Units submitted and not yet completed, this generation.
    issued: HashSet<(usize, UnitKind)>,
    /// Failed units by row and kind; never reissued automatically. An
    /// icon failure does not block the row's metadata, and vice versa.
    failed: HashSet<(usize, UnitKind)>,
}

impl Coordinator {
    fn run(mut self) {
        self.status.is_running.store(true, Ordering::Release);

        let control = self.control.clone();
        let results = self.results.clone();
        loop {
            crossbeam_channel::select! {
                recv(control) -> message => match message {
                    Ok(Control::SetPivot { key, reason }) => self.on_pivot(key, reason),
                    Ok(Control::Stop) | Err(_) => break,
                },
                recv(results) -> message => match message {
                    Ok(result) => self.on_result(result),
                    Err(_) => break,
                },
            }
        }

        self.pool.cancel_generation(self.generation);
        self.pool.drain(self.config.drain_timeout);
        self.status.is_running.store(false, Ordering::Release);

        let Coordinator { pool, .. } = self;
        pool.shutdown();
    }

    fn on_pivot(&mut self, key: usize, reason: PivotReason) {
        let live = self.rows.generation();

        if !self.started {
            self.started = true;
            self.generation = live;
            self.pivot = key;
        } else if live != self.generation {
            self.begin_generation(live, key);
        } else if key != self.pivot {
            if reason != PivotReason::Resize {
                let (direction, _confidence) = self.tracker.observe(key, self.pivot);
                self.direction = direction;
            }
            self.pivot = key;
            // Pending units were prioritized for the old pivot; pull them
            // back and reissue below with fresh distances. In-flight units
            // keep running, their results stay valid.
            for unit in self.pool.clear_pending() {
                self.issued.remove(&(unit.key, unit.kind));
            }
        }
        // Same key, same generation: fall through, the issued set and the
        // row flags make the rescan a no-op.

        // The row on screen is never an eviction victim.
        self.store.set_displayed(Some(self.pivot));

        self.scan_and_issue();
        self.maybe_start_full_pass();
        self.refresh_status();
    }

    /// Tear down state for the old generation and adopt the new one.
    fn begin_generation(&mut self, generation: u64, pivot: usize) {
        log::debug!(
            "generation {} -> {}: cancelling in-flight work",
            self.generation,
            generation
        );
        self.pool.cancel_generation(self.generation);
        if !self.pool.drain(self.config.drain_timeout) {
            log::warn!("drain timed out; late results will be discarded by their stamp");
        }

        self.store.clear();
        self.icons.clear();
        self.tracker.reset();
        self.direction = Direction::Forward;
        self.metadata.clear();
        self.issued.clear();
        self.failed.clear();
        self.target = None;
        self.full_pass_started = false;
        self.generation = generation;
        self.pivot = pivot;
    }

    /// Issue metadata units for all rows lacking metadata, and icon units
    /// additionally for rows inside the icon window, nearest-pivot first.
    fn scan_and_issue(&mut self) {
        let row_count = self.rows.row_count();
        if row_count == 0 {
            return;
        }
        let pivot = self.pivot.min(row_count - 1);
        let (icon_first, icon_last) =
            icon_window_bounds(pivot, self.config.cache.icon_chunk_size, row_count);

        for key in gallery_scheduler::ScanOrder::new(pivot, row_count) {
            let flags = self.rows.flags_at(key);
            let distance = key.abs_diff(pivot) as u32;

            if !flags.metadata_loaded
                && !self.issued.contains(&(key, UnitKind::Metadata))
                && !self.failed.contains(&(key, UnitKind::Metadata))
            {
                if let Some(path) = self.rows.path_at(key) {
                    if self.pool.submit(
                        key,
                        UnitKind::Metadata,
                        self.generation,
                        distance,
                        DecodeRequest::Metadata { path },
                    ) {
                        self.issued.insert((key, UnitKind::Metadata));
                    }
                }
            }

            let wants_icon = key >= icon_first
                && key <= icon_last
                && !flags.icon_loaded
                && !self.icons.contains(key)
                && !self.issued.contains(&(key, UnitKind::Icon))
                && !self.failed.contains(&(key, UnitKind::Icon));
            if wants_icon {
                if let Some(path) = self.rows.path_at(key) {
                    if self.pool.submit(
                        key,
                        UnitKind::Icon,
                        self.generation,
                        distance,
                        DecodeRequest::Icon {
                            path,
                            max_side: self.config.icon_max_side,
                        },
                    ) {
                        self.issued.insert((key, UnitKind::Icon));
                    }
                }
            }
        }
    }

    /// Once enough rows have metadata, compute the target range and issue
    /// full-image decodes for it, nearest-pivot first.
    fn maybe_start_full_pass(&mut self) {
        let row_count = self.rows.row_count();
        if row_count == 0 {
            return;
        }
        let trigger = self.config.cache.full_image_trigger_count.min(row_count);
        if !self.full_pass_started && self.metadata_done() < trigger {
            return;
        }

        let pivot = self.pivot.min(row_count - 1);
        let (first, last) = {
            let metadata = &self.metadata;
            let default_bytes = self.config.cache.default_row_bytes;
            let sizes = |key: usize| {
                metadata
                    .get(&key)
                    .map(|m| m.estimated_full_bytes())
                    .unwrap_or(default_bytes)
            };
            match compute_target_range(
                pivot,
                self.direction,
                self.config.cache.ahead_weight,
                &sizes,
                self.config.cache.max_cache_bytes,
                row_count,
            ) {
                Some(range) => range,
                None => return,
            }
        };

        self.target = Some((first, last));
        self.full_pass_started = true;
        self.store.retarget(pivot, first, last);

        for key in gallery_scheduler::ScanOrder::over_range(pivot, first, last + 1) {
            self.issue_full_for(key);
        }
    }

    /// Issue a full-image decode for one row if it is a target row that
    /// still needs one and has metadata.
    fn issue_full_for(&mut self, key: usize) {
        let Some((first, last)) = self.target else {
            return;
        };
        if key < first || key > last {
            return;
        }
        if self.failed.contains(&(key, UnitKind::FullImage))
            || self.store.contains(key)
            || self.issued.contains(&(key, UnitKind::FullImage))
        {
            return;
        }
        if self.rows.flags_at(key).is_video {
            return;
        }
        let Some(metadata) = self.metadata.get(&key).cloned() else {
            return;
        };
        let Some(path) = self.rows.path_at(key) else {
            return;
        };

        let distance = key.abs_diff(self.pivot) as u32;
        if self.pool.submit(
            key,
            UnitKind::FullImage,
            self.generation,
            distance,
            DecodeRequest::Full { path, metadata },
        ) {
            self.issued.insert((key, UnitKind::FullImage));
        }
    }

    fn on_result(&mut self, result: UnitResult<Result<DecodePayload, DecodeError>>) {
        self.issued.remove(&(result.key, result.kind));

        // Sole stale-write defense: the stamp must match the live
        // generation at apply time.
        if result.generation != self.rows.generation() {
            log::trace!(
                "discarding result for row {} stamped with generation {}",
                result.key,
                result.generation
            );
            return;
        }

        match result.payload {
            Ok(DecodePayload::Metadata(metadata)) => {
                self.rows.write_metadata(result.key, result.generation, &metadata);
                self.metadata.insert(result.key, metadata);
                if self.full_pass_started {
                    self.issue_full_for(result.key);
                } else {
                    self.maybe_start_full_pass();
                }
            }
            Ok(DecodePayload::Icon(icon)) => {
                self.rows.write_icon(result.key, result.generation, Some(icon));
                self.icons.note_loaded(result.key);
                self.sweep_icons(result.generation);
            }
            Ok(DecodePayload::Full(pixels)) => {
                if !self.store.admit(result.key, Arc::new(pixels)) {
                    log::debug!("row {} decoded but not cached, budget full", result.key);
                }
            }
            Err(error) => {
                log::warn!("row {} decode failed: {}", result.key, error);
                self.failed.insert((result.key, result.kind));
            }
        }

        self.refresh_status();
    }

    /// Run one bounded icon cleanup pass if the window has overgrown.
    fn sweep_icons(&mut self, generation: u64) {
        if !self.icons.needs_cleanup() {
            return;
        }
        let row_count = self.rows.row_count();
        if row_count == 0 {
            return;
        }
        let pivot = self.pivot.min(row_count - 1);
        let (first, last) =
            icon_window_bounds(pivot, self.config.cache.icon_chunk_size, row_count);
        for key in self.icons.cleanup(first, last, self.config.icon_sweep_budget) {
            self.rows.write_icon(key, generation, None);
        }
    }

    /// Rows whose metadata pass is settled, successfully or not.
    fn metadata_done(&self) -> usize {
        let failed = self
            .failed
            .iter()
            .filter(|(_, kind)| *kind == UnitKind::Metadata)
            .count();
        self.metadata.len() + failed
    }

    fn refresh_status(&self) {
        let stats = self.store.stats();
        self.status
            .cached_bytes
            .store(stats.bytes_used, Ordering::Relaxed);

        match self.target {
            Some((first, last)) => {
                self.status
                    .target_first
                    .store(first as i64, Ordering::Relaxed);
                self.status.target_last.store(last as i64, Ordering::Relaxed);
            }
            None => {
                self.status.target_first.store(-1, Ordering::Relaxed);
                self.status.target_last.store(-1, Ordering::Relaxed);
            }
        }

        let row_count = self.rows.row_count();
        let done = self.metadata_done();
        let progress = if row_count == 0 {
            100
        } else {
            (done * 100 / row_count).min(100) as u64
        };
        self.status
            .progress_percent
            .store(progress, Ordering::Relaxed);
    }
}

/// The icon window: `chunk_size` keys centered on the pivot, clamped to
/// the row range.
fn icon_window_bounds(pivot: usize, chunk_size: usize, row_count: usize) -> (usize, usize) {
    let chunk_size = chunk_size.max(1);
    let first = pivot.saturating_sub(chunk_size / 2);
    let last = (first + chunk_size - 1).min(row_count.saturating_sub(1));
    (first, last)
}
