//! A time-ordered queue of pending work ("plans").
//!
//! `Context` stores its scheduled callbacks here. Adding a plan is
//! *O*(log(*n*)); cancellation removes only the payload, and the stale heap
//! entry is skipped when it reaches the front.
use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::HashMap;

/// Handle returned by `add_plan`, used to cancel the plan later.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct PlanId(u64);

/// A plan removed from the front of the queue.
pub struct Plan<T> {
    pub time: f64,
    pub data: T,
}

/// Plans are ordered by time. Plans at the same time come out in the order
/// they were added.
pub struct PlanQueue<T> {
    heap: BinaryHeap<Entry>,
    payloads: HashMap<u64, T>,
    next_id: u64,
}

impl<T> PlanQueue<T> {
    #[must_use]
    pub fn new() -> PlanQueue<T> {
        PlanQueue {
            heap: BinaryHeap::new(),
            payloads: HashMap::default(),
            next_id: 0,
        }
    }

    pub fn add_plan(&mut self, time: f64, data: T) -> PlanId {
        let id = self.next_id;
        self.next_id += 1;
        self.heap.push(Entry { time, id });
        self.payloads.insert(id, data);
        PlanId(id)
    }

    /// Returns the payload of the cancelled plan, or `None` if it already ran
    /// or was cancelled before.
    pub fn cancel_plan(&mut self, id: &PlanId) -> Option<T> {
        self.payloads.remove(&id.0)
    }

    pub fn get_next_plan(&mut self) -> Option<Plan<T>> {
        while let Some(entry) = self.heap.pop() {
            if let Some(data) = self.payloads.remove(&entry.id) {
                return Some(Plan {
                    time: entry.time,
                    data,
                });
            }
        }
        None
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.payloads.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.payloads.len()
    }
}

impl<T> Default for PlanQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
struct Entry {
    time: f64,
    id: u64,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// `BinaryHeap` is a max-heap, so the earliest (time, id) must compare greatest.
impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .total_cmp(&other.time)
            .then(self.id.cmp(&other.id))
            .reverse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_queue() {
        let mut queue = PlanQueue::<()>::new();
        assert!(queue.is_empty());
        assert!(queue.get_next_plan().is_none());
    }

    #[test]
    fn plans_come_out_in_time_order() {
        let mut queue = PlanQueue::new();
        queue.add_plan(3.0, 'c');
        queue.add_plan(1.0, 'a');
        queue.add_plan(2.0, 'b');
        assert_eq!(queue.len(), 3);

        let order: Vec<(f64, char)> = std::iter::from_fn(|| queue.get_next_plan())
            .map(|plan| (plan.time, plan.data))
            .collect();
        assert_eq!(order, vec![(1.0, 'a'), (2.0, 'b'), (3.0, 'c')]);
    }

    #[test]
    fn ties_break_by_insertion() {
        let mut queue = PlanQueue::new();
        queue.add_plan(1.0, 1);
        queue.add_plan(1.0, 2);
        queue.add_plan(0.5, 0);
        queue.add_plan(1.0, 3);
        let order: Vec<i32> = std::iter::from_fn(|| queue.get_next_plan())
            .map(|plan| plan.data)
            .collect();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn cancelled_plans_are_skipped() {
        let mut queue = PlanQueue::new();
        let first = queue.add_plan(1.0, "first");
        queue.add_plan(2.0, "second");
        assert_eq!(queue.cancel_plan(&first), Some("first"));
        assert_eq!(queue.cancel_plan(&first), None);

        let plan = queue.get_next_plan().unwrap();
        assert_eq!(plan.time, 2.0);
        assert_eq!(plan.data, "second");
        assert!(queue.get_next_plan().is_none());
    }
}
