use super::types::{Waypoint, WaypointSpec};
use std::collections::VecDeque;

/// Ordered list of pending waypoints.
///
/// Front is the next waypoint to dispatch. Every enqueued waypoint receives
/// the next ordinal index, so indices are stable even when priority
/// waypoints jump the line.
#[derive(Debug, Clone, Default)]
pub struct WaypointQueue {
    pending: VecDeque<Waypoint>,
    next_index: u64,
}

impl WaypointQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends to the tail.
    pub fn enqueue(&mut self, spec: WaypointSpec) -> Waypoint {
        let waypoint = self.assign_index(spec);
        self.pending.push_back(waypoint);
        waypoint
    }

    /// Inserts at the head, ahead of everything already queued.
    pub fn enqueue_priority(&mut self, spec: WaypointSpec) -> Waypoint {
        let waypoint = self.assign_index(spec);
        self.pending.push_front(waypoint);
        waypoint
    }

    pub fn pop_next(&mut self) -> Option<Waypoint> {
        self.pending.pop_front()
    }

    pub fn peek(&self) -> Option<&Waypoint> {
        self.pending.front()
    }

    pub fn remaining(&self) -> Vec<Waypoint> {
        self.pending.iter().copied().collect()
    }

    /// Empties the queue, handing back what was pending in queue order.
    pub fn clear(&mut self) -> Vec<Waypoint> {
        self.pending.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Total number of waypoints that have ever entered the queue.
    pub fn total_enqueued(&self) -> u64 {
        self.next_index
    }

    fn assign_index(&mut self, spec: WaypointSpec) -> Waypoint {
        let waypoint = Waypoint {
            index: self.next_index,
            pose: spec.pose,
            tolerance: spec.tolerance,
        };
        self.next_index += 1;
        waypoint
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::waypoint_following::types::Pose;

    fn spec(x: f64) -> WaypointSpec {
        WaypointSpec::new(Pose::from_point(x, 0.0, 0.0))
    }

    #[test]
    fn pops_in_fifo_order() {
        let mut queue = WaypointQueue::new();
        queue.enqueue(spec(1.0));
        queue.enqueue(spec(2.0));

        assert_eq!(queue.pop_next().unwrap().pose.position.x, 1.0);
        assert_eq!(queue.pop_next().unwrap().pose.position.x, 2.0);
        assert!(queue.pop_next().is_none());
    }

    #[test]
    fn priority_goes_to_front_but_keeps_fresh_index() {
        let mut queue = WaypointQueue::new();
        queue.enqueue(spec(1.0));
        queue.enqueue(spec(2.0));
        let urgent = queue.enqueue_priority(spec(9.0));

        assert_eq!(urgent.index, 2);
        assert_eq!(queue.peek().unwrap().index, 2);
        let order: Vec<u64> = queue.remaining().iter().map(|w| w.index).collect();
        assert_eq!(order, vec![2, 0, 1]);
    }

    #[test]
    fn clear_returns_pending_and_preserves_counter() {
        let mut queue = WaypointQueue::new();
        queue.enqueue(spec(1.0));
        queue.enqueue(spec(2.0));

        let drained = queue.clear();
        assert_eq!(drained.len(), 2);
        assert!(queue.is_empty());

        let next = queue.enqueue(spec(3.0));
        assert_eq!(next.index, 2);
        assert_eq!(queue.total_enqueued(), 3);
    }

    #[test]
    fn pop_on_empty_is_none() {
        let mut queue = WaypointQueue::new();
        assert!(queue.pop_next().is_none());
        assert!(queue.peek().is_none());
        assert_eq!(queue.len(), 0);
    }
}
