//! Pivot-centered scan order
//!
//! Decode work is issued for rows nearest the user's position first. The
//! scan order starts at the pivot and alternates outward, one step ahead,
//! one step behind, until a boundary is exhausted and the remaining side
//! continues alone. The same order, re-parameterized over a sub-range, is
//! used when growing the full-image target range.

/// Lazy iterator over row keys, nearest to the pivot first.
///
/// Emits `pivot, pivot+1, pivot-1, pivot+2, pivot-2, ...`, each key in
/// the range exactly once. Pure bookkeeping over `(pivot, range)`; no
/// side effects, restartable via [`ScanOrder::reset`].
///
/// # Example
///
/// ```
/// use gallery_scheduler::ScanOrder;
///
/// let order: Vec<usize> = ScanOrder::new(2, 5).collect();
/// assert_eq!(order, vec![2, 3, 1, 4, 0]);
/// ```
#[derive(Debug, Clone)]
pub struct ScanOrder {
    start: usize,
    /// Exclusive upper bound.
    end: usize,
    pivot: usize,
    /// Next key on the ahead side, if still in range.
    ahead: usize,
    /// Next key on the behind side, `None` once exhausted.
    behind: Option<usize>,
    take_ahead: bool,
    pivot_emitted: bool,
}

impl ScanOrder {
    /// Scan order over all rows `[0, row_count)`.
    ///
    /// A pivot outside the range clamps to 0; `row_count == 0` yields an
    /// empty order.
    pub fn new(pivot: usize, row_count: usize) -> Self {
        Self::over_range(pivot, 0, row_count)
    }

    /// Scan order over the sub-range `[start, end)`.
    ///
    /// A pivot outside the range clamps to `start`.
    pub fn over_range(pivot: usize, start: usize, end: usize) -> Self {
        let pivot = if pivot < start || pivot >= end {
            start
        } else {
            pivot
        };
        Self {
            start,
            end,
            pivot,
            ahead: pivot.saturating_add(1),
            behind: pivot.checked_sub(1).filter(|&b| b >= start),
            take_ahead: true,
            pivot_emitted: false,
        }
    }

    /// The pivot this order is centered on.
    pub fn pivot(&self) -> usize {
        self.pivot
    }

    /// Total number of keys the order emits.
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    /// Whether the order emits nothing.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Restart the order from the pivot.
    pub fn reset(&mut self) {
        self.ahead = self.pivot.saturating_add(1);
        self.behind = self.pivot.checked_sub(1).filter(|&b| b >= self.start);
        self.take_ahead = true;
        self.pivot_emitted = false;
    }
}

impl Iterator for ScanOrder {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.start >= self.end {
            return None;
        }
        if !self.pivot_emitted {
            self.pivot_emitted = true;
            return Some(self.pivot);
        }

        let ahead_available = self.ahead < self.end;
        let pick_ahead = match (ahead_available, self.behind) {
            (true, Some(_)) => self.take_ahead,
            (true, None) => true,
            (false, Some(_)) => false,
            (false, None) => return None,
        };

        if pick_ahead {
            let key = self.ahead;
            self.ahead += 1;
            self.take_ahead = false;
            Some(key)
        } else {
            let key = self.behind.expect("behind side checked above");
            self.behind = key.checked_sub(1).filter(|&b| b >= self.start);
            self.take_ahead = true;
            Some(key)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_alternates_outward_from_pivot() {
        let order: Vec<usize> = ScanOrder::new(5, 11).collect();
        assert_eq!(order, vec![5, 6, 4, 7, 3, 8, 2, 9, 1, 10, 0]);
    }

    #[test]
    fn test_first_three_keys() {
        // Whenever pivot+1 and pivot-1 are both in range, the order must
        // begin pivot, pivot+1, pivot-1.
        for pivot in 1..9 {
            let order: Vec<usize> = ScanOrder::new(pivot, 10).take(3).collect();
            assert_eq!(order, vec![pivot, pivot + 1, pivot - 1]);
        }
    }

    #[test]
    fn test_large_grid_order_prefix() {
        let order: Vec<usize> = ScanOrder::new(500, 1000).take(5).collect();
        assert_eq!(order, vec![500, 501, 499, 502, 498]);
    }

    #[test]
    fn test_each_key_exactly_once() {
        for pivot in [0, 1, 7, 14] {
            let order: Vec<usize> = ScanOrder::new(pivot, 15).collect();
            assert_eq!(order.len(), 15);
            let unique: HashSet<usize> = order.iter().copied().collect();
            assert_eq!(unique.len(), 15);
            assert!(order.iter().all(|&k| k < 15));
        }
    }

    #[test]
    fn test_pivot_at_start_runs_forward() {
        let order: Vec<usize> = ScanOrder::new(0, 5).collect();
        assert_eq!(order, vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_pivot_at_end_runs_backward() {
        let order: Vec<usize> = ScanOrder::new(4, 5).collect();
        assert_eq!(order, vec![4, 3, 2, 1, 0]);
    }

    #[test]
    fn test_continues_one_side_after_boundary() {
        let order: Vec<usize> = ScanOrder::new(1, 6).collect();
        assert_eq!(order, vec![1, 2, 0, 3, 4, 5]);
    }

    #[test]
    fn test_out_of_range_pivot_clamps_to_zero() {
        let order: Vec<usize> = ScanOrder::new(99, 4).collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_empty_row_range() {
        let mut order = ScanOrder::new(0, 0);
        assert!(order.is_empty());
        assert_eq!(order.next(), None);
    }

    #[test]
    fn test_single_row() {
        let order: Vec<usize> = ScanOrder::new(0, 1).collect();
        assert_eq!(order, vec![0]);
    }

    #[test]
    fn test_len() {
        assert_eq!(ScanOrder::new(3, 10).len(), 10);
        assert_eq!(ScanOrder::over_range(5, 4, 9).len(), 5);
        assert_eq!(ScanOrder::new(0, 0).len(), 0);
    }

    #[test]
    fn test_reset_restarts_from_pivot() {
        let mut order = ScanOrder::new(2, 5);
        let first: Vec<usize> = order.by_ref().take(3).collect();
        order.reset();
        let again: Vec<usize> = order.by_ref().take(3).collect();
        assert_eq!(first, again);
        assert_eq!(first, vec![2, 3, 1]);
    }

    #[test]
    fn test_over_range_alternates_within_bounds() {
        let order: Vec<usize> = ScanOrder::over_range(10, 8, 13).collect();
        assert_eq!(order, vec![10, 11, 9, 12, 8]);
    }

    #[test]
    fn test_over_range_pivot_clamps_to_start() {
        let order: Vec<usize> = ScanOrder::over_range(2, 5, 8).collect();
        assert_eq!(order, vec![5, 6, 7]);
        assert_eq!(ScanOrder::over_range(2, 5, 8).pivot(), 5);
    }

    #[test]
    fn test_consumer_may_stop_early() {
        let mut order = ScanOrder::new(500, 1_000_000);
        assert_eq!(order.next(), Some(500));
        // Dropping the rest costs nothing; the order is lazy.
    }
}
