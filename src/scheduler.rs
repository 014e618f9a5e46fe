//! The per-individual event scheduler.
//!
//! One [`Scheduler`] drives exactly one individual's simulation: a
//! time-ordered queue of [`Event`]s plus a monotonic clock. Cancellation is
//! lazy — callers never remove a queued event, they flip its `enabled` flag
//! via the [`EventHandle`] returned from [`Scheduler::schedule`].

use std::cell::Cell;
use std::rc::Rc;

use crate::model::{LesionMessage, PersonDiseaseMessage, PersonTestingMessage, PersonTreatmentMessage};

/// A shared, non-owning handle to a still-queued event's `enabled` flag.
///
/// Disabling a handle after the event has already been consumed is a no-op.
pub type EventHandle = Rc<Cell<bool>>;

/// The payload carried by one queued event.
///
/// Rather than storing a handler closure or function pointer (which would
/// fight the borrow checker given that handlers mutate the very `Person`/
/// `Lesion` that owns the scheduler), each message is tagged with enough
/// information for the consume loop to `match` it to the right statechart
/// and dispatch directly. This is the "flat tag + match" dispatch the
/// design notes call out as the easiest way to keep ordering deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Message {
    Disease(PersonDiseaseMessage),
    Testing(PersonTestingMessage),
    Treatment(PersonTreatmentMessage),
    /// Targets the lesion at this index in the person's lesion list.
    Lesion(usize, LesionMessage),
    /// Not a statechart message: asks the Person to instantiate and start
    /// a new lesion, then reschedule itself for the lesion after that (if
    /// any). Kept distinct from `Lesion(idx, Init)` because no lesion (and
    /// so no index) exists yet when this fires.
    CreateLesion,
    /// Not a statechart message: the annual tick that runs this year's
    /// routine/surveillance testing actions, then reschedules itself.
    YearlyActions,
    /// Not a statechart message: one year of an in-progress treatment
    /// series, reschedules itself until `max_ongoing_treatments` is hit.
    OngoingTreatment,
    /// Terminates the consume loop immediately when dequeued.
    EndSimulation,
}

impl Message {
    /// The symbolic name used in event log records (§6.2: "state and
    /// message values are their symbolic names").
    pub fn name(&self) -> &'static str {
        match self {
            Message::Disease(m) => m.name(),
            Message::Testing(m) => m.name(),
            Message::Treatment(m) => m.name(),
            Message::Lesion(_, m) => m.name(),
            Message::CreateLesion => "CREATE_LESION",
            Message::YearlyActions => "YEARLY_ACTIONS",
            Message::OngoingTreatment => "ONGOING_TREATMENT",
            Message::EndSimulation => "END_SIMULATION",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Event {
    pub message: Message,
    pub time: f64,
    enabled: EventHandle,
}

impl Event {
    pub fn enabled(&self) -> bool {
        self.enabled.get()
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    queue: Vec<Event>,
    time: f64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            queue: Vec::new(),
            time: 0.0,
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Insert an event at `self.time() + delay`, returning a handle the
    /// caller may later use to disable it.
    ///
    /// Ties are broken FIFO: a new event is inserted *after* every existing
    /// event with the same time, matching the source scheduler's linear
    /// insertion (`for index, event in enumerate(queue): if new.time <
    /// event.time: insert; break`). We locate the slot with a binary search
    /// instead of a linear scan, which is asymptotically equivalent but
    /// avoids walking the whole queue for every insertion.
    ///
    /// `delay` must be `>= 0`.
    pub fn schedule(&mut self, message: Message, delay: f64) -> EventHandle {
        debug_assert!(delay >= 0.0, "scheduled delay must be non-negative");
        let time = self.time + delay;
        let enabled = Rc::new(Cell::new(true));
        let event = Event {
            message,
            time,
            enabled: Rc::clone(&enabled),
        };
        let index = self.queue.partition_point(|e| e.time <= time);
        self.queue.insert(index, event);
        enabled
    }

    /// Remove and return the earliest event, advancing `self.time()` to its
    /// time. Panics if the queue is empty (mirrors the source's
    /// `consume_next_event`, which raises `IndexError`).
    pub fn consume_next(&mut self) -> Event {
        assert!(!self.is_empty(), "consume_next called on an empty queue");
        let event = self.queue.remove(0);
        self.time = event.time;
        event
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PersonDiseaseMessage as D;

    fn msg(tag: u8) -> Message {
        // Use distinct disease messages purely as opaque tags for ordering tests.
        match tag {
            0 => Message::Disease(D::Init),
            1 => Message::Disease(D::PolypOnset),
            _ => Message::Disease(D::OtherDeath),
        }
    }

    #[test]
    fn s1_scheduler_basics() {
        // schedule three events at delays 4, 2, 2 tagged a/b/c (a=0,b=1,c=2)
        let mut s = Scheduler::new();
        s.schedule(msg(0), 4.0); // "a"
        s.schedule(msg(1), 2.0); // "b"
        s.schedule(msg(2), 2.0); // "c"

        let a = s.consume_next();
        assert_eq!(a.message, msg(1)); // "b" first
        assert_eq!(a.time, 2.0);

        let b = s.consume_next();
        assert_eq!(b.message, msg(2)); // "c" second
        assert_eq!(b.time, 2.0);

        let c = s.consume_next();
        assert_eq!(c.message, msg(0)); // "a" last
        assert_eq!(c.time, 4.0);

        assert_eq!(s.time(), 4.0);
        assert!(s.is_empty());
    }

    #[test]
    fn s2_lazy_cancellation() {
        let mut s = Scheduler::new();
        let x = s.schedule(msg(0), 5.0);
        x.set(false);
        s.schedule(msg(1), 5.0);

        let mut fired = Vec::new();
        while !s.is_empty() {
            let ev = s.consume_next();
            if !ev.enabled() {
                continue;
            }
            fired.push(ev.message);
        }
        assert_eq!(fired, vec![msg(1)]);
    }

    #[test]
    fn fifo_tie_break_holds_for_interleaved_inserts() {
        let mut s = Scheduler::new();
        s.schedule(msg(0), 1.0);
        s.schedule(msg(1), 0.0);
        s.schedule(msg(2), 1.0);
        s.schedule(msg(0), 0.0);

        let times: Vec<f64> = std::iter::from_fn(|| {
            if s.is_empty() {
                None
            } else {
                Some(s.consume_next().time)
            }
        })
        .collect();
        assert_eq!(times, vec![0.0, 0.0, 1.0, 1.0]);
    }

    #[test]
    fn delay_correctness() {
        let mut s = Scheduler::new();
        s.schedule(msg(0), 3.0);
        let ev = s.consume_next();
        assert_eq!(ev.time, 3.0);

        let handle = s.schedule(msg(1), 2.5);
        // scheduling doesn't advance time
        assert_eq!(s.time(), 3.0);
        let _ = handle;
    }

    #[test]
    #[should_panic(expected = "empty queue")]
    fn consume_next_on_empty_queue_panics() {
        let mut s = Scheduler::new();
        s.consume_next();
    }

    #[test]
    fn monotonicity_holds_across_many_inserts() {
        let mut s = Scheduler::new();
        for i in (0..20).rev() {
            s.schedule(msg(0), i as f64 * 0.5);
        }
        let mut last = f64::NEG_INFINITY;
        while !s.is_empty() {
            let ev = s.consume_next();
            assert!(ev.time >= last);
            last = ev.time;
        }
    }
}
