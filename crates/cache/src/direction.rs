//! Scroll direction tracking with hysteresis
//!
//! The read-ahead budget is weighted toward the direction of travel, so
//! flipping direction is expensive: it reshapes the target range and can
//! churn the cache. Small back-and-forth moves (overshoot corrections,
//! keyboard fumbles) must not flip it. The tracker therefore requires a
//! streak of opposite-sign steps before it changes direction.

/// Direction of travel through the row list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward larger row keys.
    Forward,
    /// Toward smaller row keys.
    Backward,
}

impl Direction {
    /// The opposite direction.
    pub fn flipped(self) -> Self {
        match self {
            Direction::Forward => Direction::Backward,
            Direction::Backward => Direction::Forward,
        }
    }
}

/// Damped direction tracker.
///
/// Same-sign steps build confidence; opposite-sign steps build a contrary
/// streak, and only a streak reaching the threshold flips the direction.
///
/// # Example
///
/// ```
/// use gallery_cache::{Direction, DirectionTracker};
///
/// let mut tracker = DirectionTracker::new(3);
/// tracker.observe(20, 10); // forward
/// tracker.observe(18, 20); // one step back: not enough to flip
/// assert_eq!(tracker.direction(), Direction::Forward);
/// ```
#[derive(Debug, Clone)]
pub struct DirectionTracker {
    direction: Direction,
    confidence: u32,
    contrary_streak: u32,
    threshold: u32,
}

impl DirectionTracker {
    /// Create a tracker starting forward with no confidence.
    ///
    /// `threshold` is the number of consecutive opposite-sign steps that
    /// flips the direction (at least 1).
    pub fn new(threshold: u32) -> Self {
        Self {
            direction: Direction::Forward,
            confidence: 0,
            contrary_streak: 0,
            threshold: threshold.max(1),
        }
    }

    /// Feed one pivot move and get the (possibly updated) direction.
    ///
    /// A zero step (same pivot, e.g. after a resize) changes nothing.
    pub fn observe(&mut self, pivot: usize, previous_pivot: usize) -> (Direction, u32) {
        let step = pivot as i64 - previous_pivot as i64;
        if step == 0 {
            return (self.direction, self.confidence);
        }

        let step_direction = if step > 0 {
            Direction::Forward
        } else {
            Direction::Backward
        };

        if step_direction == self.direction {
            self.confidence = self.confidence.saturating_add(1);
            self.contrary_streak = 0;
        } else {
            self.confidence = self.confidence.saturating_sub(1);
            self.contrary_streak += 1;
            if self.contrary_streak >= self.threshold {
                self.direction = self.direction.flipped();
                self.confidence = self.contrary_streak;
                self.contrary_streak = 0;
            }
        }

        (self.direction, self.confidence)
    }

    /// Current direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Accumulated same-sign step count.
    pub fn confidence(&self) -> u32 {
        self.confidence
    }

    /// Forget everything; used on generation changes.
    pub fn reset(&mut self) {
        self.direction = Direction::Forward;
        self.confidence = 0;
        self.contrary_streak = 0;
    }
}
