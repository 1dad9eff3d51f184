use std::cmp::Reverse;
use std::collections::BinaryHeap;

use crate::error::SimError;
use crate::fan::{FanId, Gate};

/// One scheduled occurrence in simulated time. A sum type: each kind
/// carries exactly the payload its handler needs, and nothing else.
/// Events are immutable once scheduled.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    /// A fan reaches the perimeter and queues for pat-down inspection.
    Arrival { fan: FanId },
    /// An inspection agent finishes with a fan. `busy_start` is when the
    /// agent took the fan, kept on the event so busy-time accounting does
    /// not depend on server state at pop time.
    InspectionEnd {
        fan: FanId,
        agent: usize,
        busy_start: f64,
    },
    /// A fan finishes the walk from the esplanade to their gate.
    GateArrival { fan: FanId },
    /// A turnstile releases a fan into the stadium.
    TurnstileEnd {
        fan: FanId,
        gate: Gate,
        turnstile: usize,
        busy_start: f64,
    },
}

impl Event {
    pub fn fan(&self) -> FanId {
        match *self {
            Event::Arrival { fan }
            | Event::InspectionEnd { fan, .. }
            | Event::GateArrival { fan }
            | Event::TurnstileEnd { fan, .. } => fan,
        }
    }
}

/// Heap entry ordered by (time, insertion sequence). The sequence number
/// gives FIFO behavior on time ties, which is what makes runs with the
/// same seed byte-for-byte reproducible.
#[derive(Debug)]
struct Scheduled {
    time: f64,
    seq: u64,
    event: Event,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.seq == other.seq
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Sampled times are always finite, so total_cmp agrees with the
        // usual ordering here.
        self.time
            .total_cmp(&other.time)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Future Event List: a min-heap of pending events keyed by
/// (time, insertion sequence).
#[derive(Debug, Default)]
pub struct FutureEventList {
    heap: BinaryHeap<Reverse<Scheduled>>,
    next_seq: u64,
}

impl FutureEventList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self, time: f64, event: Event) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Reverse(Scheduled { time, seq, event }));
    }

    /// Remove and return the earliest event (FIFO among time ties).
    pub fn pop_min(&mut self) -> Option<(f64, Event)> {
        self.heap.pop().map(|Reverse(s)| (s.time, s.event))
    }

    /// Time of the earliest pending event without removing it.
    pub fn peek_time(&self) -> Option<f64> {
        self.heap.peek().map(|Reverse(s)| s.time)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

/// Owns the FEL and the simulated clock. The clock starts below any
/// representable event time so that pre-generated arrivals (negative
/// seconds, before kickoff) schedule cleanly; once events start popping,
/// scheduling into the past is a hard invariant violation.
#[derive(Debug)]
pub struct EventManager {
    fel: FutureEventList,
    current_time: f64,
    processed: u64,
}

impl Default for EventManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EventManager {
    pub fn new() -> Self {
        Self {
            fel: FutureEventList::new(),
            current_time: f64::NEG_INFINITY,
            processed: 0,
        }
    }

    /// Current simulated time: the time of the last event popped.
    pub fn now(&self) -> f64 {
        self.current_time
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn pending(&self) -> usize {
        self.fel.len()
    }

    pub fn peek_time(&self) -> Option<f64> {
        self.fel.peek_time()
    }

    pub fn has_events(&self) -> bool {
        !self.fel.is_empty()
    }

    /// Schedule at an absolute simulated time.
    pub fn schedule_at(&mut self, time: f64, event: Event) -> Result<(), SimError> {
        if time < self.current_time {
            return Err(SimError::ScheduledInPast {
                time,
                now: self.current_time,
            });
        }
        self.fel.schedule(time, event);
        Ok(())
    }

    /// Schedule at a delay relative to the current clock.
    pub fn schedule_in(&mut self, delay: f64, event: Event) -> Result<(), SimError> {
        self.schedule_at(self.current_time + delay, event)
    }

    /// Pop the next event and advance the clock to its time.
    pub fn advance(&mut self) -> Option<Event> {
        let (time, event) = self.fel.pop_min()?;
        self.current_time = time;
        self.processed += 1;
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arrival(fan: FanId) -> Event {
        Event::Arrival { fan }
    }

    #[test]
    fn pops_in_time_order() {
        let mut fel = FutureEventList::new();
        fel.schedule(5.0, arrival(1));
        fel.schedule(-3.0, arrival(2));
        fel.schedule(0.0, arrival(3));

        assert_eq!(fel.peek_time(), Some(-3.0));
        assert_eq!(fel.pop_min().unwrap().1.fan(), 2);
        assert_eq!(fel.pop_min().unwrap().1.fan(), 3);
        assert_eq!(fel.pop_min().unwrap().1.fan(), 1);
        assert!(fel.pop_min().is_none());
    }

    #[test]
    fn time_ties_pop_in_insertion_order() {
        let mut fel = FutureEventList::new();
        fel.schedule(-100.0, arrival(7));
        fel.schedule(-100.0, arrival(3));
        fel.schedule(-100.0, arrival(9));

        assert_eq!(fel.pop_min().unwrap().1.fan(), 7);
        assert_eq!(fel.pop_min().unwrap().1.fan(), 3);
        assert_eq!(fel.pop_min().unwrap().1.fan(), 9);
    }

    #[test]
    fn consecutive_pops_never_go_backwards() {
        let mut fel = FutureEventList::new();
        for (i, t) in [4.0, -2.0, 4.0, 0.5, -2.0, 7.25].into_iter().enumerate() {
            fel.schedule(t, arrival(i as FanId));
        }
        let mut last = f64::NEG_INFINITY;
        while let Some((t, _)) = fel.pop_min() {
            assert!(t >= last);
            last = t;
        }
    }

    #[test]
    fn advance_moves_the_clock() {
        let mut mgr = EventManager::new();
        mgr.schedule_at(-300.0, arrival(1)).unwrap();
        mgr.schedule_at(-250.0, arrival(2)).unwrap();

        assert_eq!(mgr.pending(), 2);
        mgr.advance().unwrap();
        assert_eq!(mgr.now(), -300.0);
        mgr.advance().unwrap();
        assert_eq!(mgr.now(), -250.0);
        assert_eq!(mgr.processed(), 2);
        assert!(!mgr.has_events());
    }

    #[test]
    fn negative_times_allowed_before_first_pop() {
        let mut mgr = EventManager::new();
        // Pre-generation schedules arrivals well before kickoff.
        assert!(mgr.schedule_at(-10_800.0, arrival(1)).is_ok());
    }

    #[test]
    fn scheduling_in_the_past_is_rejected() {
        let mut mgr = EventManager::new();
        mgr.schedule_at(0.0, arrival(1)).unwrap();
        mgr.advance().unwrap();
        let err = mgr.schedule_at(-1.0, arrival(2)).unwrap_err();
        assert!(matches!(err, SimError::ScheduledInPast { .. }));
    }

    #[test]
    fn relative_scheduling_uses_current_clock() {
        let mut mgr = EventManager::new();
        mgr.schedule_at(10.0, arrival(1)).unwrap();
        mgr.advance().unwrap();
        mgr.schedule_in(5.0, arrival(2)).unwrap();
        assert_eq!(mgr.peek_time(), Some(15.0));
    }
}
