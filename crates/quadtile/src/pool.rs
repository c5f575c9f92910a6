//! A bounded pool of background fetch tasks.
//!
//! The pool does not own threads; it spawns onto a Tokio runtime and counts
//! the tasks it has in flight, refusing new work once the count reaches its
//! limit. Callers that cannot submit leave the work for a later pass.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::runtime::Handle;

use crate::error::{Error, Result};

/// Bounded task pool on a Tokio runtime.
///
/// Clones share the same slot count.
#[derive(Debug, Clone)]
pub struct TaskPool {
    handle: Handle,
    active: Arc<AtomicUsize>,
    max_active: usize,
}

/// Releases a pool slot when the task finishes or is dropped.
struct SlotGuard(Arc<AtomicUsize>);

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl TaskPool {
    /// Create a pool spawning onto `handle` with at most `max_active` tasks.
    pub fn new(handle: Handle, max_active: usize) -> Result<Self> {
        if max_active == 0 {
            return Err(Error::invalid_config(
                "task pool",
                "at least one active task is required",
            ));
        }
        Ok(Self {
            handle,
            active: Arc::new(AtomicUsize::new(0)),
            max_active,
        })
    }

    /// Create a pool on the runtime the caller is running in.
    pub fn current(max_active: usize) -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| Error::invalid_config("task pool", e.to_string()))?;
        Self::new(handle, max_active)
    }

    #[must_use]
    pub fn is_full(&self) -> bool {
        self.active.load(Ordering::Acquire) >= self.max_active
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.active.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn max_active(&self) -> usize {
        self.max_active
    }

    #[must_use]
    pub fn handle(&self) -> &Handle {
        &self.handle
    }

    /// Spawn `future` if a slot is free. Returns `false`, dropping the
    /// future, when the pool is full.
    pub fn try_spawn<F>(&self, future: F) -> bool
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let reserved = self
            .active
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |active| {
                (active < self.max_active).then_some(active + 1)
            })
            .is_ok();
        if !reserved {
            return false;
        }

        let guard = SlotGuard(Arc::clone(&self.active));
        self.handle.spawn(async move {
            let _guard = guard;
            future.await;
        });
        true
    }

    /// Run `future` to completion on the pool's runtime, blocking the caller.
    ///
    /// Must be called from a plain thread or from a worker of a
    /// multi-threaded runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        if Handle::try_current().is_ok() {
            tokio::task::block_in_place(|| self.handle.block_on(future))
        } else {
            self.handle.block_on(future)
        }
    }
}
