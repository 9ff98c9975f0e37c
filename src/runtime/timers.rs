//! Deadline-ordered timer queue.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::time::Duration;

/// Identifier of a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(u64);

pub(crate) type Task = Box<dyn FnOnce()>;

/// Min-heap of `(deadline, id)` plus the task table.
///
/// Cancelled timers are removed from the table eagerly and skipped lazily
/// when they reach the top of the heap. Ties on the deadline fire in
/// scheduling order because ids increase monotonically.
#[derive(Default)]
pub(crate) struct TimerQueue {
    heap: BinaryHeap<Reverse<(Duration, TimerId)>>,
    tasks: HashMap<TimerId, Task>,
    next_id: u64,
}

impl TimerQueue {
    pub(crate) fn insert(&mut self, deadline: Duration, task: Task) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.heap.push(Reverse((deadline, id)));
        self.tasks.insert(id, task);
        id
    }

    /// Allocates an id for a task that will never run.
    pub(crate) fn unarmed(&mut self) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        id
    }

    pub(crate) fn cancel(&mut self, id: TimerId) -> bool {
        self.tasks.remove(&id).is_some()
    }

    pub(crate) fn len(&self) -> usize {
        self.tasks.len()
    }

    /// Earliest live deadline.
    pub(crate) fn next_deadline(&mut self) -> Option<Duration> {
        self.skip_cancelled();
        self.heap.peek().map(|Reverse((deadline, _))| *deadline)
    }

    /// Removes and returns the earliest task due at or before `now`.
    pub(crate) fn pop_due(&mut self, now: Duration) -> Option<(Duration, Task)> {
        self.skip_cancelled();
        let Reverse((deadline, id)) = *self.heap.peek()?;
        if deadline > now {
            return None;
        }
        self.heap.pop();
        self.tasks.remove(&id).map(|task| (deadline, task))
    }

    fn skip_cancelled(&mut self) {
        while let Some(Reverse((_, id))) = self.heap.peek() {
            if self.tasks.contains_key(id) {
                break;
            }
            self.heap.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;

    #[test]
    fn pops_in_deadline_then_insertion_order() {
        let order = Rc::new(RefCell::new(Vec::new()));
        let mut q = TimerQueue::default();

        for (label, ms) in [("b", 20u64), ("a", 10), ("c", 20)] {
            let o = Rc::clone(&order);
            q.insert(Duration::from_millis(ms), Box::new(move || o.borrow_mut().push(label)));
        }

        while let Some((_, task)) = q.pop_due(Duration::from_millis(100)) {
            task();
        }
        assert_eq!(*order.borrow(), vec!["a", "b", "c"]);
    }

    #[test]
    fn cancelled_timers_are_skipped() {
        let mut q = TimerQueue::default();
        let first = q.insert(Duration::from_millis(5), Box::new(|| {}));
        q.insert(Duration::from_millis(9), Box::new(|| {}));

        assert!(q.cancel(first));
        assert!(!q.cancel(first));
        assert_eq!(q.len(), 1);
        assert_eq!(q.next_deadline(), Some(Duration::from_millis(9)));
        assert!(q.pop_due(Duration::from_millis(8)).is_none());
    }
}
