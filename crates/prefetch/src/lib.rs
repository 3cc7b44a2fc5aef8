//! Gallery Prefetch Library
//!
//! The adaptive read-ahead engine for a photo-grid browser. Given a row
//! model ([`RowSource`]) and format codecs ([`Decoder`]), the engine
//! keeps thumbnails and decoded full images ready around the user's
//! position, under a fixed memory budget, while every scroll, selection,
//! resize, sort/filter change or folder switch invalidates in-flight
//! work.
//!
//! Built from [`gallery_scheduler`] (scan order, two-lane worker pool,
//! generation cancellation) and [`gallery_cache`] (budgeted image store,
//! direction hysteresis, icon window).
//!
//! # Example
//!
//! ```no_run
//! use gallery_prefetch::{Dispatcher, PivotReason, PrefetchConfig};
//! # use gallery_prefetch::{Decoder, RowSource};
//! # use std::sync::Arc;
//! # fn demo(rows: Arc<dyn RowSource>, decoder: Arc<dyn Decoder>) {
//! let handle = Dispatcher::spawn(rows, decoder, PrefetchConfig::default());
//!
//! // The user clicked row 500; metadata and icons load around it, and
//! // full images follow for the rows the budget covers.
//! handle.set_pivot(500, PivotReason::Selection);
//!
//! let status = handle.status();
//! println!("cached {} of {} bytes", status.cached_bytes, status.max_bytes);
//!
//! handle.stop();
//! # }
//! ```

pub mod dispatcher;
pub mod source;

pub use dispatcher::{
    DecodePayload, DecodeRequest, Dispatcher, DispatcherHandle, PivotReason, PrefetchConfig,
    PrefetchStatus,
};
pub use source::{
    DecodeError, Decoder, IconPixels, PreviewLocator, RowFlags, RowMetadata, RowSource,
};
