//! Generation-based cooperative cancellation
//!
//! Every unit of work is stamped with the generation that was live when it
//! was issued. Cancelling a generation raises a shared watermark; any unit
//! stamped at or below the cancelled generation observes the cancellation
//! at its next check. Workers check tokens between decode calls and are
//! never pre-empted mid-call.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
};

/// Shared cancellation watermark over generations.
///
/// The watermark holds the lowest generation still considered live.
/// Cancelling generation `g` raises it to `g + 1`, which cancels every
/// token stamped with a generation `<= g` in one atomic store. The
/// watermark only ever moves forward.
///
/// # Example
///
/// ```
/// use gallery_scheduler::GenerationWatermark;
///
/// let watermark = GenerationWatermark::new();
/// let token = watermark.token(1);
///
/// assert!(!token.is_cancelled());
/// watermark.cancel_generation(1);
/// assert!(token.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct GenerationWatermark {
    floor: Arc<AtomicU64>,
}

impl GenerationWatermark {
    /// Create a watermark with every generation live.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel `generation` and everything older.
    ///
    /// Idempotent; the watermark never moves backwards, so cancelling an
    /// already-cancelled generation is a no-op.
    pub fn cancel_generation(&self, generation: u64) {
        self.floor
            .fetch_max(generation.saturating_add(1), Ordering::Release);
    }

    /// Whether `generation` has been cancelled.
    pub fn is_cancelled(&self, generation: u64) -> bool {
        generation < self.floor.load(Ordering::Acquire)
    }

    /// The lowest generation still live.
    pub fn live_floor(&self) -> u64 {
        self.floor.load(Ordering::Acquire)
    }

    /// Create a token stamped with `generation`.
    pub fn token(&self, generation: u64) -> CancellationToken {
        CancellationToken {
            watermark: self.clone(),
            generation,
        }
    }
}

/// Cancellation token carried by a single unit of work.
///
/// A token is a generation stamp plus a handle on the shared watermark.
/// Workers check `is_cancelled()` at safe points and stop early; decode
/// calls themselves are never interrupted.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    watermark: GenerationWatermark,
    generation: u64,
}

impl CancellationToken {
    /// Whether the generation this token is stamped with was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.watermark.is_cancelled(self.generation)
    }

    /// The generation this token is stamped with.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_watermark_cancels_nothing() {
        let watermark = GenerationWatermark::new();
        assert!(!watermark.is_cancelled(0));
        assert!(!watermark.is_cancelled(7));
        assert_eq!(watermark.live_floor(), 0);
    }

    #[test]
    fn test_cancel_generation_cancels_at_and_below() {
        let watermark = GenerationWatermark::new();
        watermark.cancel_generation(3);

        assert!(watermark.is_cancelled(0));
        assert!(watermark.is_cancelled(3));
        assert!(!watermark.is_cancelled(4));
        assert_eq!(watermark.live_floor(), 4);
    }

    #[test]
    fn test_cancel_is_idempotent_and_monotonic() {
        let watermark = GenerationWatermark::new();
        watermark.cancel_generation(5);
        watermark.cancel_generation(2); // no-op, older than the floor
        watermark.cancel_generation(5);

        assert_eq!(watermark.live_floor(), 6);
        assert!(!watermark.is_cancelled(6));
    }

    #[test]
    fn test_token_observes_cancellation() {
        let watermark = GenerationWatermark::new();
        let token = watermark.token(2);

        assert!(!token.is_cancelled());
        assert_eq!(token.generation(), 2);

        watermark.cancel_generation(2);
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_newer_token_survives_older_cancellation() {
        let watermark = GenerationWatermark::new();
        let old = watermark.token(1);
        let new = watermark.token(2);

        watermark.cancel_generation(1);
        assert!(old.is_cancelled());
        assert!(!new.is_cancelled());
    }

    #[test]
    fn test_clones_share_state() {
        let watermark = GenerationWatermark::new();
        let clone = watermark.clone();
        let token = clone.token(0);

        watermark.cancel_generation(0);
        assert!(clone.is_cancelled(0));
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_cancellation_across_threads() {
        use std::thread;

        let watermark = GenerationWatermark::new();
        let token = watermark.token(1);

        let handle = thread::spawn(move || {
            watermark.cancel_generation(1);
        });
        handle.join().unwrap();

        assert!(token.is_cancelled());
    }
}
