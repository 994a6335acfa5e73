use crate::task::id::TaskIdGuard;
use crate::task::state::{ShutdownHook, Transition, TurnEnd};
use crate::task::task::Inner;
use crate::task::Task;
use std::any::Any;
use std::panic;
use std::sync::Arc;

/// Outcome of a dispatch turn, as seen by the worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Turn {
    /// Events remain; the task was pushed back on the ready queue.
    Yielded,

    Idle,

    /// The task finished shutting down during this turn.
    Drained,
}

/// Drives one scheduling turn of a task on the current worker.
pub(crate) struct Harness {
    inner: Arc<Inner>,
}

impl Harness {
    pub(crate) fn new(inner: Arc<Inner>) -> Self {
        Self { inner }
    }

    /// Claims the task and runs up to `quantum` events in FIFO order. If the
    /// task is shutting down and its queue empties, the hook stack is run to
    /// completion in LIFO order.
    pub(crate) fn run(self) -> Turn {
        self.inner.core.lock().claim();

        // Handlers get a counted handle, so a task whose owners are all gone
        // cannot be reclaimed under their feet. Dropping it last performs the
        // reclamation if nobody else holds the task by then.
        let task = Task::attach_inner(Arc::clone(&self.inner));
        let _id_guard = TaskIdGuard::enter(self.inner.id());

        for _ in 0..self.inner.quantum {
            let Some(event) = self.inner.core.lock().pop() else {
                break;
            };

            let (id, ty) = (event.id(), event.event_type());
            if let Err(payload) =
                panic::catch_unwind(panic::AssertUnwindSafe(|| event.dispatch(&task)))
            {
                tracing::error!(
                    task = %self.inner.id(),
                    event = %id,
                    event_type = ty,
                    panic = panic_payload_as_str(&*payload),
                    "event handler panicked"
                );
            }
        }

        let mut end = self.inner.core.lock().end_turn();
        if let TurnEnd::RunHooks(hooks) = end {
            self.run_hooks(&task, hooks);
            end = self.inner.core.lock().hooks_done();
        }

        let turn = match end {
            TurnEnd::Reschedule => {
                tracing::trace!(task = %self.inner.id(), "quantum exhausted, rescheduling");
                self.inner.apply(Transition::Schedule);
                Turn::Yielded
            }
            TurnEnd::Idle => Turn::Idle,
            TurnEnd::Drained => Turn::Drained,
            TurnEnd::RunHooks(_) => unreachable!("hooks already ran this turn"),
        };

        drop(task);
        turn
    }

    fn run_hooks(&self, task: &Task, mut hooks: Vec<ShutdownHook>) {
        tracing::debug!(task = %self.inner.id(), hooks = hooks.len(), "running shutdown hooks");

        while let Some(hook) = hooks.pop() {
            if let Err(payload) = panic::catch_unwind(panic::AssertUnwindSafe(|| hook(task))) {
                tracing::error!(
                    task = %self.inner.id(),
                    panic = panic_payload_as_str(&*payload),
                    "shutdown hook panicked"
                );
            }
        }
    }
}

pub(crate) fn panic_payload_as_str(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "Box<dyn Any>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::panic;

    #[test]
    fn test_panic_payload_as_str() {
        let payload = panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_payload_as_str(&*payload), "boom");

        let payload = panic::catch_unwind(|| panic!("{} {}", "formatted", 1)).unwrap_err();
        assert_eq!(panic_payload_as_str(&*payload), "formatted 1");

        let payload = panic::catch_unwind(|| panic::panic_any(7u8)).unwrap_err();
        assert_eq!(panic_payload_as_str(&*payload), "Box<dyn Any>");
    }
}
