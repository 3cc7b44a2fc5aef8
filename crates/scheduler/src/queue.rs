//! Two-lane priority queue for decode units
//!
//! Units are ordered by distance from the pivot (nearest first) with FIFO
//! ordering among equal distances. Metadata and icon reads share the light
//! lane; full-image decodes go to the heavy lane, which has its own,
//! smaller concurrency ceiling in the worker pool.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::sync::{Arc, Mutex};

/// The kind of decode a unit performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnitKind {
    /// Parse light metadata (dimensions, embedded-preview location).
    Metadata,
    /// Decode a thumbnail for the icon window.
    Icon,
    /// Decode the full-size image into a pixel buffer.
    FullImage,
}

impl UnitKind {
    /// Which worker lane executes this kind of unit.
    pub fn lane(self) -> Lane {
        match self {
            UnitKind::Metadata | UnitKind::Icon => Lane::Light,
            UnitKind::FullImage => Lane::Heavy,
        }
    }
}

/// Worker lanes with separate concurrency ceilings.
///
/// Light units are short reads bounded by hardware parallelism. Heavy
/// units may allocate tens of megabytes and run for longer, so their lane
/// is sized more conservatively.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lane {
    Light,
    Heavy,
}

/// A single unit of decode work, stamped with its generation.
#[derive(Debug, Clone)]
pub struct WorkUnit<R> {
    /// Row key in the current filtered/sorted view.
    pub key: usize,

    /// What this unit decodes.
    pub kind: UnitKind,

    /// Generation live when the unit was issued. Results are applied only
    /// if this still matches the live generation at apply time.
    pub generation: u64,

    /// Distance from the pivot at issue time; smaller runs first.
    pub distance: u32,

    /// Kind-specific decode parameters.
    pub request: R,

    /// Issue order, for FIFO among equal distances.
    seq: u64,
}

impl<R> PartialEq for WorkUnit<R> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl<R> Eq for WorkUnit<R> {}

impl<R> PartialOrd for WorkUnit<R> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<R> Ord for WorkUnit<R> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max heap, so reverse: smaller distance first,
        // then earlier issue order.
        match other.distance.cmp(&self.distance) {
            Ordering::Equal => other.seq.cmp(&self.seq),
            ordering => ordering,
        }
    }
}

struct QueueState<R> {
    light: BinaryHeap<WorkUnit<R>>,
    heavy: BinaryHeap<WorkUnit<R>>,
    /// Units checked out by workers and not yet finished.
    in_flight: usize,
    next_seq: u64,
}

impl<R> QueueState<R> {
    fn lane_mut(&mut self, lane: Lane) -> &mut BinaryHeap<WorkUnit<R>> {
        match lane {
            Lane::Light => &mut self.light,
            Lane::Heavy => &mut self.heavy,
        }
    }
}

/// Thread-safe two-lane unit queue.
///
/// Workers check units out and report back when finished, so the queue
/// can answer "is anything still outstanding" for `drain()`.
pub struct UnitQueue<R> {
    state: Arc<Mutex<QueueState<R>>>,
}

impl<R> UnitQueue<R> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(QueueState {
                light: BinaryHeap::new(),
                heavy: BinaryHeap::new(),
                in_flight: 0,
                next_seq: 0,
            })),
        }
    }

    /// Queue a unit on the lane of its kind.
    pub fn push(&self, key: usize, kind: UnitKind, generation: u64, distance: u32, request: R) {
        let mut state = self.state.lock().unwrap();
        let seq = state.next_seq;
        state.next_seq += 1;

        let unit = WorkUnit {
            key,
            kind,
            generation,
            distance,
            request,
            seq,
        };
        state.lane_mut(kind.lane()).push(unit);
    }

    /// Check out the highest-priority unit of a lane.
    ///
    /// The unit counts as in-flight until `finish()` is called for it.
    pub fn checkout(&self, lane: Lane) -> Option<WorkUnit<R>> {
        let mut state = self.state.lock().unwrap();
        let unit = state.lane_mut(lane).pop();
        if unit.is_some() {
            state.in_flight += 1;
        }
        unit
    }

    /// Report a checked-out unit as finished (executed or discarded).
    pub fn finish(&self) {
        let mut state = self.state.lock().unwrap();
        state.in_flight = state.in_flight.saturating_sub(1);
    }

    /// Number of queued units across both lanes.
    pub fn pending(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.light.len() + state.heavy.len()
    }

    /// Number of queued units in one lane.
    pub fn lane_pending(&self, lane: Lane) -> usize {
        let state = self.state.lock().unwrap();
        match lane {
            Lane::Light => state.light.len(),
            Lane::Heavy => state.heavy.len(),
        }
    }

    /// Queued plus in-flight units, any generation.
    pub fn outstanding(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.light.len() + state.heavy.len() + state.in_flight
    }

    /// Remove every queued unit stamped at or below `generation`.
    ///
    /// Returns the number removed. In-flight units are unaffected; their
    /// results are discarded downstream by the generation stamp check.
    pub fn remove_generation(&self, generation: u64) -> usize {
        self.remove_if(|unit| unit.generation <= generation)
    }

    /// Drain every queued unit, returning them.
    ///
    /// Used when the pivot moves within a generation: pending units are
    /// pulled back so the dispatcher can re-issue them with distances
    /// relative to the new pivot.
    pub fn clear_pending(&self) -> Vec<WorkUnit<R>> {
        let mut state = self.state.lock().unwrap();
        let mut drained = Vec::with_capacity(state.light.len() + state.heavy.len());
        drained.extend(state.light.drain());
        drained.extend(state.heavy.drain());
        drained
    }

    /// Remove all queued units matching a predicate, returning the count.
    pub fn remove_if<F>(&self, predicate: F) -> usize
    where
        F: Fn(&WorkUnit<R>) -> bool,
    {
        let mut state = self.state.lock().unwrap();
        let before = state.light.len() + state.heavy.len();

        let light: Vec<WorkUnit<R>> = state.light.drain().filter(|u| !predicate(u)).collect();
        let heavy: Vec<WorkUnit<R>> = state.heavy.drain().filter(|u| !predicate(u)).collect();
        state.light = light.into_iter().collect();
        state.heavy = heavy.into_iter().collect();

        before - (state.light.len() + state.heavy.len())
    }
}

impl<R> Default for UnitQueue<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R> Clone for UnitQueue<R> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn push(queue: &UnitQueue<()>, key: usize, kind: UnitKind, generation: u64, distance: u32) {
        queue.push(key, kind, generation, distance, ());
    }

    #[test]
    fn test_kind_lanes() {
        assert_eq!(UnitKind::Metadata.lane(), Lane::Light);
        assert_eq!(UnitKind::Icon.lane(), Lane::Light);
        assert_eq!(UnitKind::FullImage.lane(), Lane::Heavy);
    }

    #[test]
    fn test_nearest_distance_first() {
        let queue = UnitQueue::new();
        push(&queue, 10, UnitKind::Metadata, 1, 5);
        push(&queue, 11, UnitKind::Metadata, 1, 0);
        push(&queue, 12, UnitKind::Metadata, 1, 2);

        assert_eq!(queue.checkout(Lane::Light).unwrap().key, 11);
        assert_eq!(queue.checkout(Lane::Light).unwrap().key, 12);
        assert_eq!(queue.checkout(Lane::Light).unwrap().key, 10);
        assert!(queue.checkout(Lane::Light).is_none());
    }

    #[test]
    fn test_fifo_within_equal_distance() {
        let queue = UnitQueue::new();
        push(&queue, 1, UnitKind::Metadata, 1, 3);
        push(&queue, 2, UnitKind::Metadata, 1, 3);
        push(&queue, 3, UnitKind::Metadata, 1, 3);

        assert_eq!(queue.checkout(Lane::Light).unwrap().key, 1);
        assert_eq!(queue.checkout(Lane::Light).unwrap().key, 2);
        assert_eq!(queue.checkout(Lane::Light).unwrap().key, 3);
    }

    #[test]
    fn test_lanes_are_independent() {
        let queue = UnitQueue::new();
        push(&queue, 1, UnitKind::Metadata, 1, 0);
        push(&queue, 2, UnitKind::FullImage, 1, 0);

        assert_eq!(queue.lane_pending(Lane::Light), 1);
        assert_eq!(queue.lane_pending(Lane::Heavy), 1);

        assert_eq!(queue.checkout(Lane::Heavy).unwrap().key, 2);
        assert!(queue.checkout(Lane::Heavy).is_none());
        assert_eq!(queue.checkout(Lane::Light).unwrap().key, 1);
    }

    #[test]
    fn test_outstanding_counts_in_flight() {
        let queue = UnitQueue::new();
        push(&queue, 1, UnitKind::Metadata, 1, 0);
        push(&queue, 2, UnitKind::Metadata, 1, 1);
        assert_eq!(queue.outstanding(), 2);

        let _unit = queue.checkout(Lane::Light).unwrap();
        assert_eq!(queue.pending(), 1);
        assert_eq!(queue.outstanding(), 2);

        queue.finish();
        assert_eq!(queue.outstanding(), 1);
    }

    #[test]
    fn test_remove_generation() {
        let queue = UnitQueue::new();
        push(&queue, 1, UnitKind::Metadata, 1, 0);
        push(&queue, 2, UnitKind::FullImage, 1, 0);
        push(&queue, 3, UnitKind::Metadata, 2, 0);

        let removed = queue.remove_generation(1);
        assert_eq!(removed, 2);
        assert_eq!(queue.pending(), 1);
        assert_eq!(queue.checkout(Lane::Light).unwrap().key, 3);
    }

    #[test]
    fn test_clear_pending_returns_units() {
        let queue = UnitQueue::new();
        push(&queue, 1, UnitKind::Metadata, 1, 0);
        push(&queue, 2, UnitKind::Icon, 1, 1);
        push(&queue, 3, UnitKind::FullImage, 1, 2);

        let drained = queue.clear_pending();
        assert_eq!(drained.len(), 3);
        assert_eq!(queue.pending(), 0);

        let mut keys: Vec<usize> = drained.iter().map(|u| u.key).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec![1, 2, 3]);
    }

    #[test]
    fn test_priority_survives_remove_if() {
        let queue = UnitQueue::new();
        push(&queue, 1, UnitKind::Metadata, 1, 4);
        push(&queue, 2, UnitKind::Metadata, 1, 1);
        push(&queue, 3, UnitKind::Metadata, 1, 2);

        queue.remove_if(|u| u.key == 3);

        assert_eq!(queue.checkout(Lane::Light).unwrap().key, 2);
        assert_eq!(queue.checkout(Lane::Light).unwrap().key, 1);
    }

    #[test]
    fn test_default_is_empty() {
        let queue: UnitQueue<()> = UnitQueue::default();
        assert_eq!(queue.pending(), 0);
        assert_eq!(queue.outstanding(), 0);
    }
}
