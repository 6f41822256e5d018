//! The simulator module provides the mechanics to drive a discrete event
//! simulation - a simulated clock, a priority-ordered event queue, and a
//! dispatch loop.  Events are plain values; each model defines one event
//! enum and processes fired events with a single match.
//!
//! Events scheduled for the same fire time are dispatched in scheduling
//! order, so a run is fully determined by the random seed and the schedule
//! stream.  Cancellation never removes an event from the queue: the handle
//! returned by `schedule` flips a flag, and flagged events are discarded at
//! extraction time.

use std::cell::Cell;
use std::cmp::Ordering;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::rc::Rc;

use crate::utils::errors::SimulationError;

struct EventRecord<E> {
    cancelled: Cell<bool>,
    kind: E,
}

/// A reference to a scheduled event.  Handles are cheap to clone and allow
/// models to keep scheduled events in side collections (e.g. the per-node
/// active transfer lists of the backup model) and to cancel them without
/// touching the event queue.
pub struct EventHandle<E>(Rc<EventRecord<E>>);

impl<E> Clone for EventHandle<E> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<E> EventHandle<E> {
    /// Mark the event as cancelled.  The event stays in the queue and is
    /// discarded when it reaches the front.
    pub fn cancel(&self) {
        self.0.cancelled.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.get()
    }

    pub fn kind(&self) -> &E {
        &self.0.kind
    }

    /// Identity comparison: two handles are the same event only if they
    /// refer to the same scheduling.
    pub fn is_same(&self, other: &EventHandle<E>) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

struct Scheduled<E> {
    fire_time: f64,
    seq: u64,
    record: Rc<EventRecord<E>>,
}

impl<E> PartialEq for Scheduled<E> {
    fn eq(&self, other: &Self) -> bool {
        self.seq == other.seq
    }
}

impl<E> Eq for Scheduled<E> {}

impl<E> Ord for Scheduled<E> {
    fn cmp(&self, other: &Self) -> Ordering {
        // fire_time is asserted finite at scheduling, so total_cmp agrees
        // with the usual ordering
        self.fire_time
            .total_cmp(&other.fire_time)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

impl<E> PartialOrd for Scheduled<E> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// The event queue and simulated clock shared by every model.  The queue is
/// keyed by `(fire_time, insertion_seq)`: among events scheduled for the
/// same instant, the one scheduled first fires first.
pub struct Scheduler<E> {
    time: f64,
    next_seq: u64,
    queue: BinaryHeap<Reverse<Scheduled<E>>>,
}

impl<E> Default for Scheduler<E> {
    fn default() -> Self {
        Self {
            time: 0.0,
            next_seq: 0,
            queue: BinaryHeap::new(),
        }
    }
}

impl<E> Scheduler<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// The current simulated time.  Only advances, and only at dispatch.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// The number of events still in the queue, cancelled ones included.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Add an event to the queue after the required delay.
    pub fn schedule(&mut self, delay: f64, kind: E) -> EventHandle<E> {
        assert!(
            delay >= 0.0 && delay.is_finite(),
            "event delay must be finite and non-negative"
        );
        let record = Rc::new(EventRecord {
            cancelled: Cell::new(false),
            kind,
        });
        let seq = self.next_seq;
        self.next_seq += 1;
        self.queue.push(Reverse(Scheduled {
            fire_time: self.time + delay,
            seq,
            record: Rc::clone(&record),
        }));
        EventHandle(record)
    }

    /// Extract the next event due at or before `max_t`, advancing the clock
    /// to its fire time.  Returns `None`, without advancing the clock, when
    /// the queue is empty or the next event fires beyond `max_t`.  Cancelled
    /// events are discarded here; the clock still advances over them.
    pub fn pop_due(&mut self, max_t: f64) -> Option<EventHandle<E>> {
        loop {
            match self.queue.peek() {
                Some(Reverse(next)) if next.fire_time <= max_t => {}
                _ => return None,
            }
            if let Some(Reverse(next)) = self.queue.pop() {
                self.time = next.fire_time;
                if !next.record.cancelled.get() {
                    return Some(EventHandle(next.record));
                }
            }
        }
    }
}

/// The contract every simulation model fulfils: it owns a scheduler and
/// processes fired events.  `process` may schedule further events
/// (including at zero delay) and mutate any model state.
pub trait Simulation {
    type Event;

    fn scheduler_mut(&mut self) -> &mut Scheduler<Self::Event>;

    fn process(&mut self, event: EventHandle<Self::Event>) -> Result<(), SimulationError>;

    /// Run the simulation, dispatching events in `(fire_time, seq)` order
    /// until the queue drains or the next event would fire beyond `max_t`.
    fn run(&mut self, max_t: f64) -> Result<(), SimulationError> {
        while let Some(event) = self.scheduler_mut().pop_due(max_t) {
            self.process(event)?;
        }
        Ok(())
    }
}
