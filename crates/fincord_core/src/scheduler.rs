//! One-tick deferral of work.
//!
//! Work scheduled during one turn of the host event loop becomes due on the
//! next call to [`DeferredQueue::take_due`]. Cancelled tasks are removed
//! from the queue rather than skipped when they come due.

use std::collections::VecDeque;

/// Identifier of a scheduled task.
pub type TaskId = u64;

/// FIFO queue of deferred tasks.
#[derive(Debug)]
pub struct DeferredQueue<T> {
    tasks: VecDeque<(TaskId, T)>,
    next_id: TaskId,
}

impl<T> DeferredQueue<T> {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self {
            tasks: VecDeque::new(),
            next_id: 1,
        }
    }

    /// Defer `task` to the next tick.
    pub fn schedule(&mut self, task: T) -> TaskId {
        let id = self.next_id;
        self.next_id += 1;
        self.tasks.push_back((id, task));
        id
    }

    /// Remove a pending task. Returns `false` if it already ran or was
    /// cancelled.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|(task_id, _)| *task_id != id);
        self.tasks.len() != before
    }

    /// Whether `id` is still queued.
    pub fn is_pending(&self, id: TaskId) -> bool {
        self.tasks.iter().any(|(task_id, _)| *task_id == id)
    }

    /// Number of queued tasks.
    pub fn pending_len(&self) -> usize {
        self.tasks.len()
    }

    /// Drain every task that is due, oldest first.
    pub fn take_due(&mut self) -> Vec<(TaskId, T)> {
        self.tasks.drain(..).collect()
    }

    /// Drop every pending task; returns how many were dropped.
    pub fn clear(&mut self) -> usize {
        let count = self.tasks.len();
        self.tasks.clear();
        count
    }
}

impl<T> Default for DeferredQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
