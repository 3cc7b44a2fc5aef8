//! Target range computation
//!
//! The target range is the contiguous row interval eligible for
//! full-image caching. It is grown outward from the pivot with the byte
//! budget split between the direction of travel and its opposite, so a
//! user scrolling forward gets most of the budget spent ahead of them.
//!
//! The range is a conceptual budget check only: it uses size estimates
//! and does not reserve anything. Admission into the store re-checks live
//! usage.

use crate::direction::Direction;

/// Compute the contiguous row interval eligible for full-image caching.
///
/// Walks outward from `pivot`, charging each row its estimated bytes
/// against a budget split `ahead_weight : (1 - ahead_weight)` between the
/// ahead side (the direction of travel) and the behind side. A side stops
/// once its share is spent or the row range boundary is hit. The pivot
/// row is always included and charged to the ahead side.
///
/// Returns the inclusive interval `(first, last)`, or `None` when
/// `row_count == 0`. A pivot outside `[0, row_count)` clamps to the
/// nearest valid key.
pub fn compute_target_range(
    pivot: usize,
    direction: Direction,
    ahead_weight: f64,
    row_bytes: &dyn Fn(usize) -> u64,
    max_cache_bytes: u64,
    row_count: usize,
) -> Option<(usize, usize)> {
    if row_count == 0 {
        return None;
    }
    let pivot = pivot.min(row_count - 1);
    let ahead_weight = ahead_weight.clamp(0.0, 1.0);

    let ahead_budget = (max_cache_bytes as f64 * ahead_weight) as u64;
    let behind_budget = max_cache_bytes - ahead_budget;

    // The pivot is always in range, even if it alone exceeds its share.
    let mut spent_ahead = row_bytes(pivot);

    let (first, last) = match direction {
        Direction::Forward => {
            let last = extend_up(pivot, row_count, ahead_budget, &mut spent_ahead, row_bytes);
            let mut spent_behind = 0;
            let first = extend_down(pivot, behind_budget, &mut spent_behind, row_bytes);
            (first, last)
        }
        Direction::Backward => {
            let first = extend_down(pivot, ahead_budget, &mut spent_ahead, row_bytes);
            let mut spent_behind = 0;
            let last = extend_up(pivot, row_count, behind_budget, &mut spent_behind, row_bytes);
            (first, last)
        }
    };

    debug_assert!(first <= pivot && pivot <= last);
    Some((first, last))
}

/// Extend toward larger keys while the budget allows; returns the last
/// key taken.
fn extend_up(
    pivot: usize,
    row_count: usize,
    budget: u64,
    spent: &mut u64,
    row_bytes: &dyn Fn(usize) -> u64,
) -> usize {
    let mut last = pivot;
    for key in (pivot + 1)..row_count {
        let cost = row_bytes(key);
        if spent.saturating_add(cost) > budget {
            break;
        }
        *spent += cost;
        last = key;
    }
    last
}

/// Extend toward smaller keys while the budget allows; returns the first
/// key taken.
fn extend_down(
    pivot: usize,
    budget: u64,
    spent: &mut u64,
    row_bytes: &dyn Fn(usize) -> u64,
) -> usize {
    let mut first = pivot;
    for key in (0..pivot).rev() {
        let cost = row_bytes(key);
        if spent.saturating_add(cost) > budget {
            break;
        }
        *spent += cost;
        first = key;
    }
    first
}
