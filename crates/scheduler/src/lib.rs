//! Gallery Scheduler Library
//!
//! Priority scheduling for the photo-grid read-ahead engine: a
//! pivot-centered scan order, a generation-stamped two-lane work queue,
//! cooperative cancellation, and a bounded worker pool.
//!
//! The dispatcher issues decode units in [`ScanOrder`] around the user's
//! current row. Units carry the generation that was live when they were
//! issued; when the file set changes (new folder, filter, sort), the old
//! generation is cancelled through the [`GenerationWatermark`] and any
//! late results are discarded by the stamp check downstream.
//!
//! # Example
//!
//! ```
//! use gallery_scheduler::{ScanOrder, UnitKind, WorkerPool, WorkerPoolConfig, WorkUnit, CancellationToken};
//! use std::sync::Arc;
//!
//! let (results_tx, results_rx) = crossbeam_channel::unbounded();
//! let executor = Arc::new(|unit: &WorkUnit<()>, _token: &CancellationToken| unit.key);
//! let pool = WorkerPool::new(executor, results_tx, WorkerPoolConfig::new(2, 1));
//!
//! // Issue metadata reads for five rows, nearest to row 2 first.
//! for key in ScanOrder::new(2, 5) {
//!     let distance = key.abs_diff(2) as u32;
//!     pool.submit(key, UnitKind::Metadata, 0, distance, ());
//! }
//!
//! for _ in 0..5 {
//!     let result = results_rx.recv().unwrap();
//!     assert_eq!(result.generation, 0);
//! }
//! pool.shutdown();
//! ```

mod cancel;
mod queue;
mod scan;
mod worker;

pub use cancel::{CancellationToken, GenerationWatermark};
pub use queue::{Lane, UnitKind, UnitQueue, WorkUnit};
pub use scan::ScanOrder;
pub use worker::{UnitExecutor, UnitResult, WorkerPool, WorkerPoolConfig};
