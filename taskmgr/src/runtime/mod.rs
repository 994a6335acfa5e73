//! The task manager: a fixed pool of worker threads sharing one ready queue.
//!
//! A task is pushed on the ready queue when it goes from `Idle` to `Ready`.
//! Whichever worker pops it claims it, dispatches up to `quantum` events, and
//! either returns it to `Idle` or pushes it back at the tail of the ready
//! queue. Since a task is on the queue at most once, it never runs on two
//! workers at the same time.

// Public API
pub mod builder;
pub use builder::Builder;

mod manager;
pub use manager::{Handle, TaskManager};

// Exports
pub(crate) use builder::ManagerConfig;

pub(crate) mod shared;
pub(crate) use shared::Shared;

mod pool;
pub(crate) mod registry;
mod worker;
