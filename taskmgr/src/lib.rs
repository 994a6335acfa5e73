//! A multi-threaded task and event scheduler.
//!
//! Work is organized into [`Task`]s. Each task owns a FIFO queue of
//! [`Event`]s and a LIFO stack of shutdown hooks. A [`TaskManager`] runs a
//! fixed pool of workers which dispatch the events of ready tasks, never
//! running the same task on two workers at once.

mod context;

pub mod error;
pub use error::TaskError;

pub mod event;
pub use event::{Event, EventAttrs, EventId, EventType, Sender, Tag};

pub mod runtime;
pub use runtime::{Builder, Handle, TaskManager};

pub mod task;
pub use task::{State, Task};

mod utils;

#[cfg(test)]
mod test_utils;
