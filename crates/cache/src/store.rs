//! Budgeted full-image store with priority eviction
//!
//! Holds decoded full images under a fixed byte budget. Eviction is not
//! LRU: the victim is always the cached row farthest from the pivot, so
//! the cache keeps the neighborhood the user is looking at. Rows inside
//! the current target range and the currently displayed row are never
//! eviction candidates.
//!
//! All mutation happens under a single lock around the entry map and the
//! byte accounting. Payloads are immutable once admitted and shared by
//! `Arc`; they are only ever replaced wholesale on re-decode or dropped
//! on eviction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A decoded full-size image.
///
/// Immutable after construction; the store hands out `Arc` clones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePixels {
    /// Width in pixels.
    pub width: u32,

    /// Height in pixels.
    pub height: u32,

    /// Raw pixel data (RGBA).
    pub data: Vec<u8>,
}

impl ImagePixels {
    /// Create an image buffer.
    pub fn new(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self {
            width,
            height,
            data,
        }
    }

    /// Payload size in bytes.
    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }
}

/// Statistics about store usage.
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of images currently cached.
    pub entry_count: usize,

    /// Total bytes held by cached images.
    pub bytes_used: u64,

    /// The byte budget.
    pub bytes_limit: u64,

    /// Number of cache hits.
    pub hits: u64,

    /// Number of cache misses.
    pub misses: u64,

    /// Number of images evicted to make room.
    pub evictions: u64,
}

impl CacheStats {
    /// Cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Budget utilization (0.0 to 1.0).
    pub fn utilization(&self) -> f64 {
        if self.bytes_limit == 0 {
            0.0
        } else {
            self.bytes_used as f64 / self.bytes_limit as f64
        }
    }
}

struct CacheEntry {
    size_bytes: u64,
    is_target: bool,
    pixels: Arc<ImagePixels>,
}

struct StoreState {
    entries: HashMap<usize, CacheEntry>,
    bytes_used: u64,
    max_bytes: u64,
    pivot: usize,
    displayed: Option<usize>,
    target: Option<(usize, usize)>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

impl StoreState {
    fn in_target(&self, key: usize) -> bool {
        match self.target {
            Some((first, last)) => key >= first && key <= last,
            None => false,
        }
    }

    /// The evictable entry farthest from the pivot, ties going to the
    /// smaller key for determinism.
    fn farthest_evictable(&self) -> Option<usize> {
        let pivot = self.pivot;
        self.entries
            .iter()
            .filter(|(key, entry)| !entry.is_target && Some(**key) != self.displayed)
            .map(|(key, _)| *key)
            .max_by(|a, b| {
                a.abs_diff(pivot)
                    .cmp(&b.abs_diff(pivot))
                    .then_with(|| b.cmp(a))
            })
    }

    fn evict(&mut self, key: usize) -> u64 {
        match self.entries.remove(&key) {
            Some(entry) => {
                self.bytes_used = self.bytes_used.saturating_sub(entry.size_bytes);
                self.evictions += 1;
                entry.size_bytes
            }
            None => 0,
        }
    }

    /// Evict farthest non-target entries until `needed` bytes are freed.
    ///
    /// Returns `false` if nothing evictable remains before enough room
    /// was made.
    fn make_room(&mut self, mut needed: u64) -> bool {
        while needed > 0 {
            let Some(victim) = self.farthest_evictable() else {
                return false;
            };
            let freed = self.evict(victim);
            log::debug!("evicted row {} ({} bytes) to make room", victim, freed);
            needed = needed.saturating_sub(freed);
        }
        true
    }
}

/// Byte-budgeted store of decoded full images.
///
/// # Example
///
/// ```
/// use gallery_cache::{ImageCacheStore, ImagePixels};
/// use std::sync::Arc;
///
/// let store = ImageCacheStore::new(100 * 1024 * 1024);
/// store.retarget(10, 8, 14);
///
/// let pixels = Arc::new(ImagePixels::new(4, 4, vec![0u8; 64]));
/// assert!(store.admit(10, pixels));
/// assert!(store.contains(10));
/// ```
pub struct ImageCacheStore {
    state: Mutex<StoreState>,
}

impl ImageCacheStore {
    /// Create a store with the given byte budget.
    pub fn new(max_bytes: u64) -> Self {
        Self {
            state: Mutex::new(StoreState {
                entries: HashMap::new(),
                bytes_used: 0,
                max_bytes,
                pivot: 0,
                displayed: None,
                target: None,
                hits: 0,
                misses: 0,
                evictions: 0,
            }),
        }
    }

    /// Create a store with a budget in megabytes.
    pub fn with_mb_limit(megabytes: u64) -> Self {
        Self::new(megabytes * 1024 * 1024)
    }

    /// Try to cache a decoded image for `key`.
    ///
    /// Admits directly when it fits; otherwise evicts farthest non-target
    /// entries first. Returns `false` without caching when room cannot be
    /// freed — that is an expected outcome, never an error. An existing
    /// entry for the same key is replaced wholesale; a failed re-admit
    /// leaves it in place.
    pub fn admit(&self, key: usize, pixels: Arc<ImagePixels>) -> bool {
        let mut state = self.state.lock().unwrap();
        let size = pixels.size_bytes();

        // The old entry is set aside so its bytes count as free for the
        // fit check; it goes back untouched if admission fails.
        let previous = state.entries.remove(&key);
        if let Some(previous) = &previous {
            state.bytes_used = state.bytes_used.saturating_sub(previous.size_bytes);
        }

        let mut admitted = size <= state.max_bytes;
        if admitted && state.bytes_used + size > state.max_bytes {
            let needed = state.bytes_used + size - state.max_bytes;
            admitted = state.make_room(needed);
            if !admitted {
                log::debug!(
                    "admission declined for row {}: {} bytes needed, nothing evictable",
                    key,
                    needed
                );
            }
        }
        if !admitted {
            if let Some(previous) = previous {
                state.bytes_used += previous.size_bytes;
                state.entries.insert(key, previous);
            }
            return false;
        }

        let is_target = state.in_target(key);
        state.bytes_used += size;
        state.entries.insert(
            key,
            CacheEntry {
                size_bytes: size,
                is_target,
                pixels,
            },
        );
        true
    }

    /// Fetch the cached image for `key`, if resident.
    pub fn get(&self, key: usize) -> Option<Arc<ImagePixels>> {
        let mut state = self.state.lock().unwrap();
        match state.entries.get(&key) {
            Some(entry) => {
                let pixels = Arc::clone(&entry.pixels);
                state.hits += 1;
                Some(pixels)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Whether `key` is resident, without touching hit/miss counters.
    pub fn contains(&self, key: usize) -> bool {
        let state = self.state.lock().unwrap();
        state.entries.contains_key(&key)
    }

    /// Drop the entry for `key`. Returns whether it was resident.
    pub fn remove(&self, key: usize) -> bool {
        let mut state = self.state.lock().unwrap();
        match state.entries.remove(&key) {
            Some(entry) => {
                state.bytes_used = state.bytes_used.saturating_sub(entry.size_bytes);
                true
            }
            None => false,
        }
    }

    /// Update the pivot and the target interval `[first, last]`.
    ///
    /// Entries inside the interval become eviction-protected; everything
    /// else becomes evictable again.
    pub fn retarget(&self, pivot: usize, first: usize, last: usize) {
        let mut state = self.state.lock().unwrap();
        state.pivot = pivot;
        state.target = Some((first, last));
        for (key, entry) in state.entries.iter_mut() {
            entry.is_target = *key >= first && *key <= last;
        }
    }

    /// Set the row currently on screen; it is never an eviction victim.
    pub fn set_displayed(&self, key: Option<usize>) {
        let mut state = self.state.lock().unwrap();
        state.displayed = key;
    }

    /// Drop everything; used on generation changes.
    pub fn clear(&self) {
        let mut state = self.state.lock().unwrap();
        state.entries.clear();
        state.bytes_used = 0;
        state.target = None;
        state.displayed = None;
    }

    /// Current statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock().unwrap();
        CacheStats {
            entry_count: state.entries.len(),
            bytes_used: state.bytes_used,
            bytes_limit: state.max_bytes,
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
        }
    }

    /// Bytes currently held.
    pub fn bytes_used(&self) -> u64 {
        let state = self.state.lock().unwrap();
        state.bytes_used
    }

    /// The byte budget.
    pub fn max_bytes(&self) -> u64 {
        let state = self.state.lock().unwrap();
        state.max_bytes
    }

    /// Number of cached images.
    pub fn entry_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.entries.len()
    }

    /// Keys of all resident entries, in no particular order.
    pub fn cached_keys(&self) -> Vec<usize> {
        let state = self.state.lock().unwrap();
        state.entries.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MB: u64 = 1024 * 1024;

    fn image(mb: u64) -> Arc<ImagePixels> {
        Arc::new(ImagePixels::new(0, 0, vec![0u8; (mb * MB) as usize]))
    }

    #[test]
    fn test_admit_within_budget() {
        let store = ImageCacheStore::with_mb_limit(100);
        assert!(store.admit(0, image(40)));
        assert!(store.admit(1, image(40)));
        assert_eq!(store.bytes_used(), 80 * MB);
        assert_eq!(store.entry_count(), 2);
    }

    #[test]
    fn test_get_and_stats() {
        let store = ImageCacheStore::with_mb_limit(100);
        store.admit(3, image(1));

        assert!(store.get(3).is_some());
        assert!(store.get(4).is_none());

        let stats = store.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 0.5);
        assert_eq!(stats.entry_count, 1);
    }

    #[test]
    fn test_budget_invariant_holds_after_every_admit() {
        let store = ImageCacheStore::with_mb_limit(100);
        store.retarget(0, 0, 2);
        for key in 0..50 {
            store.admit(key, image(7));
            assert!(store.bytes_used() <= 100 * MB);
        }
    }

    #[test]
    fn test_evicts_farthest_from_pivot() {
        let store = ImageCacheStore::with_mb_limit(100);
        store.retarget(50, 50, 50);
        assert!(store.admit(10, image(40))); // distance 40
        assert!(store.admit(45, image(40))); // distance 5

        // Needs 20MB freed; row 10 is farthest and must go.
        assert!(store.admit(49, image(40)));
        assert!(!store.contains(10));
        assert!(store.contains(45));
        assert!(store.contains(49));
    }

    #[test]
    fn test_eviction_tie_break_smaller_key() {
        let store = ImageCacheStore::with_mb_limit(100);
        store.retarget(50, 50, 50);
        assert!(store.admit(40, image(40))); // distance 10
        assert!(store.admit(60, image(40))); // distance 10

        assert!(store.admit(50, image(40)));
        assert!(!store.contains(40), "tie must evict the smaller key");
        assert!(store.contains(60));
    }

    #[test]
    fn test_never_evicts_target_while_non_target_exists() {
        let store = ImageCacheStore::with_mb_limit(100);
        store.retarget(0, 0, 1);
        assert!(store.admit(0, image(40))); // target
        assert!(store.admit(90, image(40))); // non-target, far away

        assert!(store.admit(1, image(40))); // target, forces eviction
        assert!(store.contains(0));
        assert!(!store.contains(90));
    }

    #[test]
    fn test_never_evicts_displayed_row() {
        let store = ImageCacheStore::with_mb_limit(100);
        store.retarget(0, 0, 0);
        store.set_displayed(Some(70));
        assert!(store.admit(70, image(60))); // displayed, non-target

        // Nothing evictable: the only resident row is displayed.
        assert!(!store.admit(5, image(60)));
        assert!(store.contains(70));
    }

    #[test]
    fn test_admission_fails_when_targets_exceed_budget() {
        let store = ImageCacheStore::with_mb_limit(100);
        store.retarget(0, 0, 10);
        assert!(store.admit(0, image(50)));
        assert!(store.admit(1, image(50)));

        // All residents are targets; a non-target row cannot displace them.
        assert!(!store.admit(20, image(10)));
        assert_eq!(store.entry_count(), 2);
        assert!(store.bytes_used() <= 100 * MB);
    }

    #[test]
    fn test_scenario_admit_evicts_at_least_needed_bytes() {
        // 195MB resident of a 200MB budget; admitting a 10MB target row
        // evicts farthest non-target rows worth at least 5MB first.
        let store = ImageCacheStore::new(200 * MB);
        store.retarget(10, 8, 12);
        for (key, mb) in [(100, 65), (101, 65), (9, 65)] {
            assert!(store.admit(key, image(mb)));
        }
        assert_eq!(store.bytes_used(), 195 * MB);

        assert!(store.admit(10, image(10)));
        assert!(store.bytes_used() <= 200 * MB);
        assert!(store.contains(10));
        assert!(store.contains(9), "target row must survive");
        // Exactly one far row is enough to free 5MB; 101 is farthest.
        assert!(!store.contains(101));
        assert!(store.contains(100));
    }

    #[test]
    fn test_oversized_image_never_admitted() {
        let store = ImageCacheStore::with_mb_limit(10);
        assert!(!store.admit(0, image(11)));
        assert_eq!(store.entry_count(), 0);
    }

    #[test]
    fn test_replace_wholesale_on_readmit() {
        let store = ImageCacheStore::with_mb_limit(100);
        assert!(store.admit(5, image(30)));
        assert!(store.admit(5, image(10)));

        assert_eq!(store.entry_count(), 1);
        assert_eq!(store.bytes_used(), 10 * MB);
    }

    #[test]
    fn test_failed_readmit_keeps_existing_entry() {
        let store = ImageCacheStore::with_mb_limit(10);
        assert!(store.admit(5, image(4)));

        // An oversized replacement is refused without touching the old
        // image.
        assert!(!store.admit(5, image(11)));
        assert!(store.contains(5));
        assert_eq!(store.bytes_used(), 4 * MB);
    }

    #[test]
    fn test_failed_readmit_restores_entry_when_nothing_evictable() {
        let store = ImageCacheStore::with_mb_limit(100);
        store.retarget(0, 0, 10);
        assert!(store.admit(3, image(50))); // target
        assert!(store.admit(20, image(40)));

        // Replacing row 20 with a bigger image needs 30MB more, but the
        // only other resident row is a target; the old entry survives.
        assert!(!store.admit(20, image(80)));
        assert!(store.contains(20));
        assert_eq!(store.bytes_used(), 90 * MB);
    }

    #[test]
    fn test_retarget_reflags_existing_entries() {
        let store = ImageCacheStore::with_mb_limit(200);
        store.retarget(0, 0, 5);
        assert!(store.admit(3, image(50))); // target for now
        assert!(store.admit(80, image(50)));

        // Move the window away; row 3 becomes evictable.
        store.retarget(80, 78, 82);
        assert!(store.admit(81, image(150)));
        assert!(!store.contains(3));
        assert!(store.contains(80));
    }

    #[test]
    fn test_remove_and_clear() {
        let store = ImageCacheStore::with_mb_limit(100);
        store.admit(1, image(10));
        store.admit(2, image(10));

        assert!(store.remove(1));
        assert!(!store.remove(1));
        assert_eq!(store.bytes_used(), 10 * MB);

        store.clear();
        assert_eq!(store.entry_count(), 0);
        assert_eq!(store.bytes_used(), 0);
    }

    #[test]
    fn test_payloads_are_shared_not_copied() {
        let store = ImageCacheStore::with_mb_limit(100);
        let pixels = image(1);
        store.admit(0, Arc::clone(&pixels));

        let fetched = store.get(0).unwrap();
        assert!(Arc::ptr_eq(&pixels, &fetched));
    }

    #[test]
    fn test_randomized_admissions_stay_bounded() {
        use rand::{Rng, SeedableRng};
        let mut rng = rand::rngs::StdRng::seed_from_u64(7);

        let store = ImageCacheStore::with_mb_limit(64);
        for _ in 0..500 {
            let key = rng.gen_range(0..200usize);
            let mb = rng.gen_range(1..=12u64);
            if rng.gen_bool(0.2) {
                let pivot = rng.gen_range(0..200usize);
                store.retarget(pivot, pivot.saturating_sub(2), pivot + 2);
            }
            store.admit(key, image(mb));
            assert!(store.bytes_used() <= 64 * MB);
        }
    }
}
