use crate::error::{Result, TaskError};
use crate::task::{Id, Inner};
use dashmap::DashMap;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

// Every task created by a manager lives here until it reaches `Done`. This is
// what lets `destroy()` find tasks nobody holds a handle to anymore, and wait
// for the last of them to drain.
#[derive(Debug)]
pub(crate) struct OwnedTasks {
    tasks: DashMap<Id, Arc<Inner>>,

    // Kept separately because DashMap's len iterates over all shards.
    size: AtomicUsize,

    // Closed once the manager starts destroying itself. Inserts are serialized
    // against closing so that no task escapes `shutdown_all`.
    closed: Mutex<bool>,

    /// Signalled whenever the registry becomes empty.
    drained: Condvar,
}

impl OwnedTasks {
    pub(crate) fn new() -> Self {
        Self {
            tasks: DashMap::new(),
            size: AtomicUsize::new(0),
            closed: Mutex::new(false),
            drained: Condvar::new(),
        }
    }

    pub(crate) fn insert(&self, task: Arc<Inner>) -> Result<()> {
        let closed = self.closed.lock();
        if *closed {
            return Err(TaskError::ShuttingDown);
        }

        self.size.fetch_add(1, Ordering::AcqRel);
        let prev = self.tasks.insert(task.id(), task);
        debug_assert!(prev.is_none(), "task ids are unique");

        Ok(())
    }

    pub(crate) fn remove(&self, id: &Id) -> Option<Arc<Inner>> {
        let (_, task) = self.tasks.remove(id)?;

        if self.size.fetch_sub(1, Ordering::AcqRel) == 1 {
            // Taking the lock orders us against a waiter that just checked
            // `size` and is about to sleep.
            let _closed = self.closed.lock();
            self.drained.notify_all();
        }

        Some(task)
    }

    pub(crate) fn len(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn is_closed(&self) -> bool {
        *self.closed.lock()
    }

    /// Closes the registry to new tasks and requests shutdown of every task
    /// still alive. Returns how many tasks were signalled.
    pub(crate) fn shutdown_all(&self) -> usize {
        let tasks = {
            let mut closed = self.closed.lock();
            *closed = true;

            self.tasks
                .iter()
                .map(|entry| Arc::clone(entry.value()))
                .collect::<Vec<_>>()
        };

        // Outside of any registry lock: shutting down may schedule the task.
        tasks.iter().filter(|task| task.shutdown()).count()
    }

    /// Blocks until every task has reached `Done`.
    pub(crate) fn wait_until_empty(&self) {
        let mut closed = self.closed.lock();
        while !self.is_empty() {
            self.drained.wait(&mut closed);
        }
    }
}
