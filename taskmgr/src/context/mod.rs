//! Per-thread execution context.
//!
//! Worker threads record which worker they are and which task they are
//! currently dispatching, so that handlers can ask "who am I running for".

use crate::task::Id;
use std::cell::Cell;
use std::thread_local;

thread_local! {
    static CURRENT_TASK: Cell<Option<Id>> = const { Cell::new(None) };

    static WORKER_INDEX: Cell<Option<usize>> = const { Cell::new(None) };
}

pub(crate) fn current_task_id() -> Option<Id> {
    CURRENT_TASK.with(|c| c.get())
}

pub(crate) fn set_current_task_id(id: Option<Id>) -> Option<Id> {
    CURRENT_TASK.with(|c| c.replace(id))
}

pub(crate) fn init_worker_context(index: usize) {
    WORKER_INDEX.with(|w| w.set(Some(index)));
}

/// Index of the worker running on this thread, `None` outside the pool.
pub(crate) fn current_worker() -> Option<usize> {
    WORKER_INDEX.with(|w| w.get())
}
