use crate::error::{Result, TaskError};
use crate::event::{Event, EventId};
use crate::task::Task;
use crate::task::purge::Filter;
use std::collections::VecDeque;
use std::fmt;
use std::mem;

/// Closure run once during a task's shutdown sequence.
pub(crate) type ShutdownHook = Box<dyn FnOnce(&Task) + Send + 'static>;

/// Lifecycle of a task.
///
/// ```text
///            send / shutdown              claimed by worker
///   Idle ──────────────────────► Ready ───────────────────► Running
///    ▲                             ▲                          │
///    │        queue exhausted      │   quantum exhausted      │
///    └─────────────────────────────┼──────────────────────────┤
///                                  │   late sends             │ shutdown requested,
///                                  └──────── ShuttingDown ◄───┘ queue exhausted
///                                                 │
///                                                 ▼ hooks ran, no owners left
///                                                Done
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    Idle,
    Ready,
    Running,
    ShuttingDown,
    Done,
}

/// What the caller has to do after releasing the core lock.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Nothing,

    /// The task just became `Ready` and must be pushed on the ready queue.
    Schedule,
}

/// Decision taken at the end of a dispatch turn.
#[must_use]
pub(crate) enum TurnEnd {
    /// Events remain, the task is `Ready` again.
    Reschedule,

    /// The task went back to `Idle`.
    Idle,

    /// Shutdown hooks must run now, in the order they are popped from the
    /// returned stack.
    RunHooks(Vec<ShutdownHook>),

    /// Shutdown finished. The task waits in `ShuttingDown` for its last owner.
    Drained,
}

/// Mutable part of a task, always accessed under the task's lock.
pub(crate) struct Core {
    pub(super) state: State,

    /// Pending events, in send order.
    pub(super) queue: VecDeque<Event>,

    /// Registered shutdown hooks, in registration order. Popped from the back.
    pub(super) hooks: Vec<ShutdownHook>,

    pub(super) shutdown_requested: bool,

    /// Set once the hook stack has been fully executed.
    pub(super) hooks_ran: bool,
}

impl Core {
    pub(super) fn new() -> Self {
        Self {
            state: State::Idle,
            queue: VecDeque::new(),
            hooks: Vec::new(),
            shutdown_requested: false,
            hooks_ran: false,
        }
    }

    pub(super) fn push(&mut self, event: Event) -> Result<Transition> {
        if self.state == State::Done {
            return Err(TaskError::InvalidState);
        }

        self.queue.try_reserve(1)?;
        self.queue.push_back(event);
        Ok(self.wake())
    }

    fn wake(&mut self) -> Transition {
        match self.state {
            State::Idle => {
                self.state = State::Ready;
                Transition::Schedule
            }
            // Only a drained task is parked in `ShuttingDown`. While hooks are
            // executing the worker still owns it.
            State::ShuttingDown if self.hooks_ran => {
                self.state = State::Ready;
                Transition::Schedule
            }
            _ => Transition::Nothing,
        }
    }

    pub(super) fn push_hook(&mut self, hook: ShutdownHook) -> Result<()> {
        if self.shutdown_requested || matches!(self.state, State::ShuttingDown | State::Done) {
            return Err(TaskError::ShuttingDown);
        }

        self.hooks.try_reserve(1)?;
        self.hooks.push(hook);
        Ok(())
    }

    /// Returns `None` if shutdown had already been requested.
    pub(super) fn request_shutdown(&mut self) -> Option<Transition> {
        if self.shutdown_requested || self.state == State::Done {
            return None;
        }

        self.shutdown_requested = true;
        Some(self.wake())
    }

    /// A task is on the ready queue at most once per transition into
    /// `Ready`, so whoever pops it is the only one claiming it.
    pub(super) fn claim(&mut self) {
        debug_assert_eq!(self.state, State::Ready, "claimed a task that is not ready");
        self.state = State::Running;
    }

    pub(super) fn pop(&mut self) -> Option<Event> {
        debug_assert!(matches!(self.state, State::Running));
        self.queue.pop_front()
    }

    pub(super) fn end_turn(&mut self) -> TurnEnd {
        debug_assert_eq!(self.state, State::Running);

        if !self.queue.is_empty() {
            self.state = State::Ready;
            TurnEnd::Reschedule
        } else if self.shutdown_requested && !self.hooks_ran {
            self.state = State::ShuttingDown;
            TurnEnd::RunHooks(mem::take(&mut self.hooks))
        } else if self.shutdown_requested {
            self.state = State::ShuttingDown;
            TurnEnd::Drained
        } else {
            self.state = State::Idle;
            TurnEnd::Idle
        }
    }

    /// Called once every hook returned by [`Core::end_turn`] has run.
    pub(super) fn hooks_done(&mut self) -> TurnEnd {
        debug_assert_eq!(self.state, State::ShuttingDown);
        self.hooks_ran = true;

        // Events sent while the hooks were running.
        if !self.queue.is_empty() {
            self.state = State::Ready;
            TurnEnd::Reschedule
        } else {
            TurnEnd::Drained
        }
    }

    /// Moves to `Done` if nothing is left to do. Only meaningful once the
    /// caller has established that no owners remain.
    pub(super) fn try_finish(&mut self) -> bool {
        let drained = self.state == State::ShuttingDown && self.hooks_ran && self.queue.is_empty();
        if drained {
            self.state = State::Done;
        }
        drained
    }

    /// Terminal without ever running. Later shutdown requests are no-ops and
    /// `try_finish` never fires again.
    pub(super) fn abandon(&mut self) {
        self.shutdown_requested = true;
        self.state = State::Done;
    }

    pub(super) fn purge(&mut self, filter: &Filter) -> Vec<Event> {
        let (purged, kept): (VecDeque<_>, VecDeque<_>) = self
            .queue
            .drain(..)
            .partition(|event| filter.matches(event));

        self.queue = kept;
        purged.into()
    }

    pub(super) fn remove(&mut self, id: EventId) -> Option<Event> {
        let pos = self
            .queue
            .iter()
            .position(|event| event.id() == id && event.is_purgeable())?;

        self.queue.remove(pos)
    }
}

impl fmt::Debug for Core {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Core")
            .field("state", &self.state)
            .field("queued", &self.queue.len())
            .field("hooks", &self.hooks.len())
            .field("shutdown_requested", &self.shutdown_requested)
            .field("hooks_ran", &self.hooks_ran)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Sender;

    fn event(ty: u32) -> Event {
        Event::new(Sender::new(1), ty, |_, _| {})
    }

    fn hook() -> ShutdownHook {
        Box::new(|_| {})
    }

    #[test]
    fn test_first_send_schedules_once() -> anyhow::Result<()> {
        let mut core = Core::new();

        assert_eq!(core.push(event(1))?, Transition::Schedule);
        assert_eq!(core.state, State::Ready);

        assert_eq!(core.push(event(2))?, Transition::Nothing);
        assert_eq!(core.queue.len(), 2);
        Ok(())
    }

    #[test]
    fn test_turn_back_to_idle() -> anyhow::Result<()> {
        let mut core = Core::new();
        let _ = core.push(event(1))?;

        core.claim();
        assert_eq!(core.state, State::Running);
        assert!(core.pop().is_some());
        assert!(matches!(core.end_turn(), TurnEnd::Idle));
        assert_eq!(core.state, State::Idle);
        Ok(())
    }

    #[test]
    fn test_quantum_exhausted_reschedules() -> anyhow::Result<()> {
        let mut core = Core::new();
        let _ = core.push(event(1))?;
        let _ = core.push(event(2))?;

        core.claim();
        assert!(core.pop().is_some());
        assert!(matches!(core.end_turn(), TurnEnd::Reschedule));
        assert_eq!(core.state, State::Ready);
        Ok(())
    }

    #[test]
    fn test_send_while_running_does_not_reschedule() -> anyhow::Result<()> {
        let mut core = Core::new();
        let _ = core.push(event(1))?;
        core.claim();

        assert_eq!(core.push(event(2))?, Transition::Nothing);
        assert_eq!(core.state, State::Running);
        Ok(())
    }

    #[test]
    fn test_shutdown_on_idle_task_schedules_it() {
        let mut core = Core::new();

        assert_eq!(core.request_shutdown(), Some(Transition::Schedule));
        assert_eq!(core.state, State::Ready);
        assert_eq!(core.request_shutdown(), None);
    }

    #[test]
    fn test_hooks_rejected_after_shutdown_request() {
        let mut core = Core::new();
        assert!(core.push_hook(hook()).is_ok());

        let _ = core.request_shutdown();
        assert_eq!(core.push_hook(hook()).err(), Some(TaskError::ShuttingDown));
        assert_eq!(core.hooks.len(), 1);
    }

    #[test]
    fn test_shutdown_sequence() -> anyhow::Result<()> {
        let mut core = Core::new();
        core.push_hook(hook())?;
        core.push_hook(hook())?;
        let _ = core.push(event(1))?;
        let _ = core.request_shutdown();

        core.claim();
        assert!(core.pop().is_some());

        let TurnEnd::RunHooks(hooks) = core.end_turn() else {
            panic!("expected hooks to run");
        };
        assert_eq!(hooks.len(), 2);
        assert_eq!(core.state, State::ShuttingDown);

        // Sends while hooks run are queued but do not hand the task out.
        assert_eq!(core.push(event(2))?, Transition::Nothing);
        assert!(matches!(core.hooks_done(), TurnEnd::Reschedule));
        assert_eq!(core.state, State::Ready);

        core.claim();
        assert!(core.pop().is_some());
        assert!(matches!(core.end_turn(), TurnEnd::Drained));
        assert!(core.try_finish());
        assert_eq!(core.state, State::Done);
        Ok(())
    }

    #[test]
    fn test_late_send_wakes_drained_task() -> anyhow::Result<()> {
        let mut core = Core::new();
        let _ = core.request_shutdown();
        core.claim();
        let TurnEnd::RunHooks(_) = core.end_turn() else {
            panic!("expected hooks to run");
        };
        assert!(matches!(core.hooks_done(), TurnEnd::Drained));

        assert_eq!(core.push(event(1))?, Transition::Schedule);
        assert!(!core.try_finish());
        Ok(())
    }

    #[test]
    fn test_done_rejects_everything() {
        let mut core = Core::new();
        core.state = State::Done;

        assert_eq!(core.push(event(1)).err(), Some(TaskError::InvalidState));
        assert_eq!(core.push_hook(hook()).err(), Some(TaskError::ShuttingDown));
        assert_eq!(core.request_shutdown(), None);
    }

    #[test]
    fn test_abandoned_core_never_schedules_or_finishes() {
        let mut core = Core::new();
        core.abandon();

        assert_eq!(core.state, State::Done);
        assert_eq!(core.request_shutdown(), None);
        assert!(!core.try_finish());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "claimed a task that is not ready")]
    fn test_claim_requires_ready() {
        Core::new().claim();
    }
}
