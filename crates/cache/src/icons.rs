//! Icon window bookkeeping
//!
//! Icons are small, so they are bounded by count rather than bytes. A
//! chunk of icons around the pivot stays resident; loads outside the
//! chunk (fast scrolling, overscan) are tolerated until the resident
//! count exceeds the chunk size times an expansion factor, at which point
//! a cleanup sweep evicts the oldest icons outside the current window.
//!
//! The window tracks keys only. The icon pixels themselves live with the
//! row presentation layer; callers apply the sweep results there.

use std::collections::{HashSet, VecDeque};

/// Count-bounded record of which rows have icons loaded.
///
/// Cleanup is incremental: each [`IconWindow::cleanup`] call evicts at
/// most a caller-chosen number of keys, so a sweep can be interleaved
/// with more urgent work and resumed later.
///
/// # Example
///
/// ```
/// use gallery_cache::IconWindow;
///
/// let mut window = IconWindow::new(100, 2.0);
/// for key in 0..150 {
///     window.note_loaded(key);
/// }
/// assert!(!window.needs_cleanup()); // under 200, still tolerated
/// ```
#[derive(Debug)]
pub struct IconWindow {
    /// Insertion order, oldest first.
    order: VecDeque<usize>,
    resident: HashSet<usize>,
    chunk_size: usize,
    limit: usize,
}

impl IconWindow {
    /// Create a window keeping `chunk_size` icons, tolerating growth to
    /// `chunk_size * expansion_factor` before cleanup.
    pub fn new(chunk_size: usize, expansion_factor: f64) -> Self {
        let factor = expansion_factor.max(1.0);
        Self {
            order: VecDeque::new(),
            resident: HashSet::new(),
            chunk_size: chunk_size.max(1),
            limit: ((chunk_size.max(1)) as f64 * factor) as usize,
        }
    }

    /// Record that an icon for `key` is now loaded.
    ///
    /// Re-loading an already resident key refreshes its age.
    pub fn note_loaded(&mut self, key: usize) {
        if self.resident.contains(&key) {
            self.order.retain(|&k| k != key);
        } else {
            self.resident.insert(key);
        }
        self.order.push_back(key);
    }

    /// Record that the icon for `key` was dropped externally.
    pub fn note_unloaded(&mut self, key: usize) {
        if self.resident.remove(&key) {
            self.order.retain(|&k| k != key);
        }
    }

    /// Whether `key` has a loaded icon.
    pub fn contains(&self, key: usize) -> bool {
        self.resident.contains(&key)
    }

    /// Number of loaded icons.
    pub fn len(&self) -> usize {
        self.resident.len()
    }

    /// Whether no icons are loaded.
    pub fn is_empty(&self) -> bool {
        self.resident.is_empty()
    }

    /// The configured resident chunk size.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Whether the resident count has exceeded the expansion limit.
    pub fn needs_cleanup(&self) -> bool {
        self.resident.len() > self.limit
    }

    /// Evict the oldest icons outside `[first, last]`, at most
    /// `max_evictions` per call, stopping once the count is back down to
    /// the chunk size. Returns the evicted keys so the caller can drop
    /// the pixels.
    pub fn cleanup(&mut self, first: usize, last: usize, max_evictions: usize) -> Vec<usize> {
        let mut evicted = Vec::new();
        let mut kept = VecDeque::new();

        while self.resident.len() > self.chunk_size && evicted.len() < max_evictions {
            let Some(key) = self.order.pop_front() else {
                break;
            };
            if key >= first && key <= last {
                kept.push_back(key);
                continue;
            }
            self.resident.remove(&key);
            evicted.push(key);
        }

        // Keys inside the window stay resident but keep their age order.
        while let Some(key) = kept.pop_back() {
            self.order.push_front(key);
        }

        if !evicted.is_empty() {
            log::debug!(
                "icon sweep evicted {} keys, {} resident",
                evicted.len(),
                self.resident.len()
            );
        }
        evicted
    }

    /// Forget everything; used on generation changes.
    pub fn clear(&mut self) {
        self.order.clear();
        self.resident.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_loaded_and_contains() {
        let mut window = IconWindow::new(10, 2.0);
        window.note_loaded(5);
        assert!(window.contains(5));
        assert!(!window.contains(6));
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_duplicate_loads_count_once() {
        let mut window = IconWindow::new(10, 2.0);
        window.note_loaded(5);
        window.note_loaded(5);
        assert_eq!(window.len(), 1);
    }

    #[test]
    fn test_needs_cleanup_only_past_expansion_limit() {
        let mut window = IconWindow::new(100, 2.0);
        for key in 0..200 {
            window.note_loaded(key);
        }
        assert!(!window.needs_cleanup());

        window.note_loaded(200);
        assert!(window.needs_cleanup());
    }

    #[test]
    fn test_cleanup_evicts_oldest_outside_window() {
        let mut window = IconWindow::new(4, 1.0);
        for key in [1, 2, 50, 51, 52, 53] {
            window.note_loaded(key);
        }

        let evicted = window.cleanup(50, 53, usize::MAX);
        assert_eq!(evicted, vec![1, 2]);
        assert_eq!(window.len(), 4);
        assert!(window.contains(50));
    }

    #[test]
    fn test_cleanup_spares_keys_inside_window() {
        let mut window = IconWindow::new(2, 1.0);
        for key in [10, 11, 90, 91] {
            window.note_loaded(key);
        }

        let evicted = window.cleanup(10, 11, usize::MAX);
        assert_eq!(evicted, vec![90, 91]);
        assert!(window.contains(10));
        assert!(window.contains(11));
    }

    #[test]
    fn test_cleanup_is_resumable() {
        let mut window = IconWindow::new(2, 1.0);
        for key in 0..10 {
            window.note_loaded(key);
        }

        // First pass bounded to 3 evictions leaves work behind.
        let first_pass = window.cleanup(8, 9, 3);
        assert_eq!(first_pass.len(), 3);
        assert_eq!(window.len(), 7);

        // Resuming finishes the sweep down to the chunk size.
        let second_pass = window.cleanup(8, 9, usize::MAX);
        assert_eq!(second_pass.len(), 5);
        assert_eq!(window.len(), 2);
        assert!(window.contains(8));
        assert!(window.contains(9));
    }

    #[test]
    fn test_cleanup_stops_at_chunk_size() {
        let mut window = IconWindow::new(5, 1.0);
        for key in 0..8 {
            window.note_loaded(key);
        }

        let evicted = window.cleanup(100, 100, usize::MAX);
        assert_eq!(evicted.len(), 3);
        assert_eq!(window.len(), 5);
    }

    #[test]
    fn test_reload_refreshes_age() {
        let mut window = IconWindow::new(2, 1.0);
        window.note_loaded(1);
        window.note_loaded(2);
        window.note_loaded(3);
        window.note_loaded(1); // 1 becomes the youngest

        let evicted = window.cleanup(100, 100, 1);
        assert_eq!(evicted, vec![2]);
        assert!(window.contains(1));
    }

    #[test]
    fn test_note_unloaded() {
        let mut window = IconWindow::new(10, 2.0);
        window.note_loaded(4);
        window.note_unloaded(4);
        assert!(!window.contains(4));
        assert!(window.is_empty());
    }

    #[test]
    fn test_clear() {
        let mut window = IconWindow::new(10, 2.0);
        for key in 0..5 {
            window.note_loaded(key);
        }
        window.clear();
        assert!(window.is_empty());
        assert_eq!(window.cleanup(0, 0, usize::MAX), Vec::<usize>::new());
    }
}
