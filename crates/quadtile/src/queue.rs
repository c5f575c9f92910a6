//! Frame-scoped request queue.
//!
//! The assembler submits fetch requests here while it walks the hierarchy and
//! drains the queue into a worker pool once the walk is done. Requests are
//! ordered coarse-first; when the queue is full the finest request loses.
//! Anything not handed to the pool in a drain pass is discarded, since the
//! next frame re-derives what is still missing.

use std::collections::BTreeMap;

/// Something that accepts work while it has capacity.
pub trait WorkerPool<T> {
    fn is_full(&self) -> bool;

    /// Hand a task over. Returns `false` if the task was not accepted.
    fn submit(&self, task: T) -> bool;
}

/// Task ordering: lower values are served first.
pub trait Prioritized {
    fn priority(&self) -> u32;
}

/// A bounded priority queue of pending tasks.
#[derive(Debug)]
pub struct RequestQueue<T> {
    tasks: BTreeMap<(u32, u64), T>,
    capacity: usize,
    sequence: u64,
}

impl<T: Prioritized> RequestQueue<T> {
    /// Create a queue holding at most `capacity` tasks (minimum one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            tasks: BTreeMap::new(),
            capacity: capacity.max(1),
            sequence: 0,
        }
    }

    /// Queue a task without blocking.
    ///
    /// Returns `false` if the queue was full and `task` was the one dropped.
    pub fn submit(&mut self, task: T) -> bool {
        let key = (task.priority(), self.sequence);
        self.sequence += 1;
        self.tasks.insert(key, task);

        if self.tasks.len() <= self.capacity {
            return true;
        }
        self.tasks
            .pop_last()
            .is_none_or(|(dropped, _)| dropped != key)
    }

    /// Submit queued tasks to `pool` in priority order while it has room,
    /// then clear the queue. Returns the number of tasks the pool accepted.
    pub fn drain<P: WorkerPool<T> + ?Sized>(&mut self, pool: &P) -> usize {
        let mut submitted = 0;
        while !pool.is_full() {
            let Some((_, task)) = self.tasks.pop_first() else {
                break;
            };
            if pool.submit(task) {
                submitted += 1;
            }
        }

        if !self.tasks.is_empty() {
            tracing::trace!(deferred = self.tasks.len(), "worker pool full");
        }
        self.tasks.clear();
        submitted
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.tasks.clear();
    }
}
