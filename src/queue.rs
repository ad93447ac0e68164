//! Bounded two-tier wait queue.
//!
//! High-priority items go after any high items already waiting and ahead of
//! everything else. Normal and low items share one FIFO tail, so `Low`
//! behaves exactly like `Normal` once queued.
//!
//! The queue is single-owner (the dispatcher's scheduler thread) and does no
//! locking of its own.

use crate::types::Priority;
use std::collections::VecDeque;
use std::fmt;

/// Returned by [`PriorityQueue::enqueue`] when the queue is at capacity.
/// Carries the rejected item back to the caller.
pub struct QueueFull<T>(pub T);

impl<T> fmt::Debug for QueueFull<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueueFull(..)")
    }
}

/// Snapshot of queue occupancy by tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct QueueStats {
    pub total: usize,
    pub capacity: usize,
    pub high: usize,
    pub normal: usize,
    pub low: usize,
}

pub struct PriorityQueue<T> {
    entries: VecDeque<(Priority, T)>,
    /// Number of high-priority entries, always a prefix of `entries`.
    high_waiting: usize,
    max_depth: usize,
}

impl<T> PriorityQueue<T> {
    pub fn new(max_depth: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            high_waiting: 0,
            max_depth,
        }
    }

    pub fn enqueue(&mut self, priority: Priority, item: T) -> Result<(), QueueFull<T>> {
        if self.entries.len() >= self.max_depth {
            return Err(QueueFull(item));
        }
        match priority {
            Priority::High => {
                self.entries.insert(self.high_waiting, (priority, item));
                self.high_waiting += 1;
            }
            Priority::Normal | Priority::Low => self.entries.push_back((priority, item)),
        }
        Ok(())
    }

    /// Remove and return the item at the head.
    pub fn dequeue_next(&mut self) -> Option<T> {
        let (priority, item) = self.entries.pop_front()?;
        if priority == Priority::High {
            self.high_waiting -= 1;
        }
        Some(item)
    }

    /// Remove every waiting item, head first.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.high_waiting = 0;
        self.entries.drain(..).map(|(_, item)| item)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn stats(&self) -> QueueStats {
        let low = self
            .entries
            .iter()
            .filter(|(priority, _)| *priority == Priority::Low)
            .count();
        QueueStats {
            total: self.entries.len(),
            capacity: self.max_depth,
            high: self.high_waiting,
            normal: self.entries.len() - self.high_waiting - low,
            low,
        }
    }
}
