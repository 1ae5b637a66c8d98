//! Event calendar for the simulator.

use ordered_float::OrderedFloat;
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::models::OperationRef;

/// A wake-up for one operation's process.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Event {
    pub time: f64,
    seq: u64,
    pub operation: OperationRef,
}

impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Earliest first, then FIFO within the same instant (reversed for max-heap).
        OrderedFloat(other.time)
            .cmp(&OrderedFloat(self.time))
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Pending events ordered by `(time, insertion order)`.
#[derive(Debug, Default)]
pub(crate) struct EventQueue {
    events: BinaryHeap<Event>,
    next_seq: u64,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedules a wake-up for `operation` at `time`.
    pub fn schedule(&mut self, time: f64, operation: OperationRef) {
        self.events.push(Event {
            time,
            seq: self.next_seq,
            operation,
        });
        self.next_seq += 1;
    }

    pub fn peek_time(&self) -> Option<f64> {
        self.events.peek().map(|e| e.time)
    }

    pub fn pop(&mut self) -> Option<Event> {
        self.events.pop()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }
}
