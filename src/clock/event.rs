//! The clock's priority queue: `(timestamp, sequence_number)`-ordered events.
//!
//! Mirrors `kimberlite-sim`'s `EventQueue`/`EventId` (a `BinaryHeap`-backed
//! scheduler with FIFO tie-breaks), generalized over an arbitrary payload
//! type `M` and an arbitrary target key instead of the teacher's
//! VSR-specific `EventKind`.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::collections::HashSet;

use crate::name::ActorName;

/// Opaque handle returned by `schedule_after`, used to `cancel` later.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct EventId(u64);

impl EventId {
    /// Constructs an `EventId` from a raw sequence number.
    ///
    /// Exists for adapter shims that need to manufacture a placeholder
    /// handle (e.g. a no-op `Scheduler` implementation); real handles only
    /// ever come from `EventQueue::schedule`.
    pub fn from_raw(raw: u64) -> Self {
        Self(raw)
    }
}

/// One scheduled event: `target` receives `message` at `time_ms`.
///
/// `seq` breaks ties between events sharing a `time_ms` — it is assigned
/// at insertion order, so same-timestamp events are delivered FIFO
/// (spec.md's invariant: `(E1.timestamp, E1.seq) < (E2.timestamp, E2.seq)`
/// for any two events popped in order).
#[derive(Debug, Clone)]
pub struct Event<M> {
    pub id: EventId,
    pub time_ms: u64,
    pub seq: u64,
    pub target: ActorName,
    pub message: M,
}

// BinaryHeap is a max-heap; we want the smallest (time_ms, seq) popped
// first, so Ord is reversed relative to the natural field order.
struct HeapEntry<M>(Event<M>);

impl<M> PartialEq for HeapEntry<M> {
    fn eq(&self, other: &Self) -> bool {
        self.0.time_ms == other.0.time_ms && self.0.seq == other.0.seq
    }
}
impl<M> Eq for HeapEntry<M> {}

impl<M> PartialOrd for HeapEntry<M> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<M> Ord for HeapEntry<M> {
    fn cmp(&self, other: &Self) -> Ordering {
        (other.0.time_ms, other.0.seq).cmp(&(self.0.time_ms, self.0.seq))
    }
}

/// Priority queue of scheduled events, ordered `(timestamp ASC, seq ASC)`.
///
/// Cancellation is lazy-scrub (spec.md §9 Open Question): `cancel` marks
/// the token cancelled and `pop`/`peek` skip over cancelled entries rather
/// than searching the heap to remove them eagerly.
pub struct EventQueue<M> {
    heap: BinaryHeap<HeapEntry<M>>,
    cancelled: HashSet<EventId>,
    next_seq: u64,
}

impl<M> EventQueue<M> {
    pub fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            cancelled: HashSet::new(),
            next_seq: 0,
        }
    }

    /// Schedules `message` for delivery to `target` at `time_ms`.
    pub fn schedule(&mut self, time_ms: u64, target: ActorName, message: M) -> EventId {
        let seq = self.next_seq;
        self.next_seq += 1;
        let id = EventId(seq);
        self.heap.push(HeapEntry(Event {
            id,
            time_ms,
            seq,
            target,
            message,
        }));
        id
    }

    /// Marks `id` cancelled. Idempotent: cancelling twice, or cancelling an
    /// id that already fired, is a no-op either way.
    ///
    /// Returns `true` if `id` was still pending (and is now cancelled),
    /// `false` if it was unknown, already cancelled, or already delivered.
    ///
    /// The tombstone set is consulted first so a second `cancel` of the
    /// same id is rejected outright — under lazy scrub the entry stays
    /// physically in the heap until it is popped, so without this check a
    /// repeat `cancel` would still find it there and (wrongly) report
    /// success again.
    pub fn cancel(&mut self, id: EventId) -> bool {
        if self.cancelled.contains(&id) {
            return false;
        }
        if self.heap.iter().any(|e| e.0.id == id) {
            self.cancelled.insert(id);
            true
        } else {
            false
        }
    }

    /// Removes and returns the next non-cancelled event, if any.
    pub fn pop(&mut self) -> Option<Event<M>> {
        loop {
            let entry = self.heap.pop()?;
            if self.cancelled.remove(&entry.0.id) {
                continue;
            }
            return Some(entry.0);
        }
    }

    /// Returns the timestamp of the next non-cancelled event, without
    /// removing it.
    pub fn next_time(&self) -> Option<u64> {
        self.heap
            .iter()
            .filter(|e| !self.cancelled.contains(&e.0.id))
            .map(|e| e.0.time_ms)
            .min()
    }

    pub fn is_empty(&self) -> bool {
        self.next_time().is_none()
    }

    /// Number of pending, non-cancelled events.
    pub fn len(&self) -> usize {
        self.heap.len() - self.cancelled.len()
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.cancelled.clear();
    }
}

impl<M> Default for EventQueue<M> {
    fn default() -> Self {
        Self::new()
    }
}
