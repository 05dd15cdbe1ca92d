//! Future event list
//!
//! A binary heap ordered by `(dispatch time, insertion sequence)`. Events
//! scheduled for the same instant come out in the order they were inserted.

use std::collections::BinaryHeap;

use crate::event::{Event, EventId, EventIdGen, ScheduledEvent};
use crate::time::SimTime;

#[derive(Debug, Default)]
pub struct Scheduler {
    queue: BinaryHeap<ScheduledEvent>,
    ids: EventIdGen,
}

impl Scheduler {
    pub fn new() -> Self {
        Self {
            queue: BinaryHeap::new(),
            ids: EventIdGen::new(),
        }
    }

    /// Insert an event to be dispatched at `at`
    pub fn schedule(&mut self, at: SimTime, event: Event) -> EventId {
        let id = self.ids.next_id();
        self.queue.push(ScheduledEvent { id, at, event });
        id
    }

    /// Remove and return the earliest event
    pub fn pop_next(&mut self) -> Option<ScheduledEvent> {
        self.queue.pop()
    }

    /// Dispatch time of the earliest event
    pub fn next_time(&self) -> Option<SimTime> {
        self.queue.peek().map(|scheduled| scheduled.at)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Discard every pending event, returning how many were dropped
    pub fn clear(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::LayerKind;
    use crate::event::Address;
    use crate::identity::NodeId;

    fn init(node: u32) -> Event {
        Event::init(Address::layer(NodeId(node), LayerKind::Routing))
    }

    fn dispatch_order(scheduler: &mut Scheduler) -> Vec<NodeId> {
        std::iter::from_fn(|| scheduler.pop_next())
            .map(|s| s.event.target.node)
            .collect()
    }

    #[test]
    fn test_orders_by_time() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule(SimTime::new(30), init(3));
        scheduler.schedule(SimTime::new(10), init(1));
        scheduler.schedule(SimTime::new(20), init(2));

        assert_eq!(dispatch_order(&mut scheduler), vec![NodeId(1), NodeId(2), NodeId(3)]);
        assert!(scheduler.is_empty());
    }

    #[test]
    fn test_same_time_is_fifo() {
        let mut scheduler = Scheduler::new();
        for node in 0..50 {
            scheduler.schedule(SimTime::new(5), init(node));
        }

        assert_eq!(dispatch_order(&mut scheduler), NodeId::range(50));
    }

    #[test]
    fn test_next_time_and_clear() {
        let mut scheduler = Scheduler::new();
        assert!(scheduler.next_time().is_none());

        scheduler.schedule(SimTime::new(7), init(0));
        scheduler.schedule(SimTime::new(3), init(1));
        assert_eq!(scheduler.next_time(), Some(SimTime::new(3)));
        assert_eq!(scheduler.len(), 2);

        assert_eq!(scheduler.clear(), 2);
        assert!(scheduler.pop_next().is_none());
    }
}
