//! Tasks: serialized execution contexts with a private FIFO event queue, a
//! LIFO stack of shutdown hooks, and a small state machine.
//!
//! # Ownership
//!
//! A task is referenced from three places:
//!
//! 1. [`Task`] handles, owned by producers and counted in `refs`.
//! 2. The manager's registry, which keeps the task alive until it is `Done`.
//! 3. The ready queue and the worker currently dispatching it.
//!
//! Only the first kind decides when a task may be reclaimed: a task is `Done`
//! once no handle remains, its queue is empty, and its hooks have run.

use crate::runtime::Shared;
use std::sync::Arc;

// Public API
pub mod id;
pub use self::id::{Id, try_id};

mod state;
pub use self::state::State;

#[allow(clippy::module_inception)]
pub(crate) mod task;
pub use self::task::Task;
pub(crate) use self::task::Inner;

// Re-exports
pub(crate) mod harness;
pub(crate) use self::harness::{Harness, Turn};

pub(crate) mod purge;

/// Creates a task owned by `owner`. Returns the caller's handle along with the
/// cell to be stored in the registry.
pub(crate) fn new_task(owner: &Arc<Shared>, quantum: usize) -> (Task, Arc<Inner>) {
    let inner = Arc::new(Inner::new(Id::next(), quantum, owner));
    let task = Task::attach_inner(Arc::clone(&inner));

    (task, inner)
}
