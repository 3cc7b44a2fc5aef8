//! Caching layer for the gallery read-ahead engine
//!
//! Three resource classes, three policies:
//!
//! - **Full images** ([`ImageCacheStore`]): byte-budgeted, evicting the
//!   row farthest from the pivot first.
//! - **Icons** ([`IconWindow`]): count-bounded around the pivot, with
//!   incremental cleanup sweeps.
//! - **Metadata**: unbounded; small enough that the engine keeps it all.
//!
//! The [`DirectionTracker`] and [`compute_target_range`] decide which
//! rows deserve the full-image budget; [`CacheConfig`] carries the
//! tunables.
//!
//! # Example
//!
//! ```
//! use gallery_cache::{
//!     compute_target_range, CacheConfig, Direction, ImageCacheStore,
//! };
//!
//! let config = CacheConfig::default().with_max_cache_mb(200);
//! let store = ImageCacheStore::new(config.max_cache_bytes);
//!
//! let sizes = |_key: usize| 20 * 1024 * 1024u64;
//! let (first, last) = compute_target_range(
//!     10,
//!     Direction::Forward,
//!     config.ahead_weight,
//!     &sizes,
//!     config.max_cache_bytes,
//!     1000,
//! )
//! .unwrap();
//! store.retarget(10, first, last);
//! ```

pub mod config;
pub mod direction;
pub mod icons;
pub mod store;
pub mod target;

pub use config::{CacheConfig, ConfigError};
pub use direction::{Direction, DirectionTracker};
pub use icons::IconWindow;
pub use store::{CacheStats, ImageCacheStore, ImagePixels};
pub use target::compute_target_range;
