//! Priority queue of pending jobs
//!
//! One FIFO per priority level. Dequeue and peek scan the levels from the
//! highest priority (index 0) down, so a job never overtakes an earlier job
//! of the same level and never waits behind a job of a lower level.

use crate::domain::Priority;
use std::collections::VecDeque;

/// FIFO-per-level priority queue
///
/// No locking of its own: the scheduler owns it and mutates it from a
/// single task.
#[derive(Debug)]
pub struct PriorityQueue<T> {
    levels: [VecDeque<T>; Priority::COUNT],
}

impl<T> PriorityQueue<T> {
    pub fn new() -> Self {
        Self {
            levels: std::array::from_fn(|_| VecDeque::new()),
        }
    }

    /// Append `item` to the tail of its level
    pub fn enqueue(&mut self, item: T, priority: Priority) {
        self.levels[priority.index()].push_back(item);
    }

    /// Remove the head of the highest non-empty level
    ///
    /// Callers are expected to check `is_empty()` first; `None` here means
    /// the caller's bookkeeping is off.
    pub fn dequeue(&mut self) -> Option<T> {
        self.levels.iter_mut().find_map(VecDeque::pop_front)
    }

    /// Item at logical position `index` across all levels in dispatch order
    pub fn peek(&self, index: usize) -> Option<&T> {
        let mut remaining = index;
        for level in &self.levels {
            if remaining < level.len() {
                return level.get(remaining);
            }
            remaining -= level.len();
        }
        None
    }

    pub fn is_empty(&self) -> bool {
        self.levels.iter().all(VecDeque::is_empty)
    }

    pub fn len(&self) -> usize {
        self.levels.iter().map(VecDeque::len).sum()
    }

    /// Number of items queued at exactly `priority`
    pub fn len_at(&self, priority: Priority) -> usize {
        self.levels[priority.index()].len()
    }

    /// True if any level strictly above `priority` has work queued
    ///
    /// With `BACKGROUND_BOUNDARY` this answers "is any foreground job waiting?".
    pub fn has_jobs_above(&self, priority: Priority) -> bool {
        self.levels[..priority.index()]
            .iter()
            .any(|level| !level.is_empty())
    }

    /// All items in dispatch order
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.levels.iter().flat_map(VecDeque::iter)
    }
}

impl<T> Default for PriorityQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
