use crate::runtime::Shared;
use crate::task::{Harness, Turn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// A dispatch thread. Workers are interchangeable: each one pulls the next
/// ready task from the shared queue and drives one turn of it.
#[derive(Debug)]
pub(crate) struct Worker {
    index: usize,

    shared: Arc<Shared>,

    /// Set by whoever unparks us.
    should_unpark: Arc<AtomicBool>,
}

#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct WorkerStats {
    pub(crate) turns: usize,
    pub(crate) drained: usize,
    pub(crate) parks: usize,
}

impl Worker {
    pub(crate) fn new(index: usize, shared: Arc<Shared>) -> Self {
        Self {
            index,
            shared,
            should_unpark: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Runs until the manager shuts down and no ready task is left.
    pub(crate) fn event_loop(&self) -> WorkerStats {
        let span = tracing::debug_span!("worker", index = self.index);
        let _enter = span.enter();

        tracing::debug!("worker started");
        let mut stats = WorkerStats::default();

        loop {
            if let Some(inner) = self.shared.next_task() {
                stats.turns += 1;

                match Harness::new(inner).run() {
                    Turn::Drained => stats.drained += 1,
                    Turn::Yielded | Turn::Idle => {}
                }
            } else if self.shared.shutdown.load(Ordering::Acquire) {
                break;
            } else {
                stats.parks += 1;
                self.shared.park_current_thread(&self.should_unpark);
            }
        }

        tracing::debug!(
            turns = stats.turns,
            drained = stats.drained,
            parks = stats.parks,
            "worker stopped"
        );

        stats
    }
}
