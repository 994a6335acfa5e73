use crate::error::{Result, TaskError};
use crate::event::{Event, EventId, EventType, Sender, Tag};
use crate::runtime::Shared;
use crate::task::Id;
use crate::task::purge::Filter;
use crate::task::state::{Core, State, Transition};
use parking_lot::Mutex;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

/// Shared task cell. The manager's registry and ready queue hold it directly,
/// while owners go through [`Task`], which is what `refs` counts.
pub(crate) struct Inner {
    pub(super) id: Id,

    /// Maximum number of events dispatched per scheduling turn.
    pub(super) quantum: usize,

    /// Number of live [`Task`] handles.
    pub(super) refs: AtomicUsize,

    pub(super) core: Mutex<Core>,

    owner: Weak<Shared>,
}

impl Inner {
    pub(crate) fn new(id: Id, quantum: usize, owner: &Arc<Shared>) -> Self {
        debug_assert!(quantum > 0);
        Self {
            id,
            quantum,
            refs: AtomicUsize::new(0),
            core: Mutex::new(Core::new()),
            owner: Arc::downgrade(owner),
        }
    }

    pub(crate) fn id(&self) -> Id {
        self.id
    }

    fn owner(&self) -> Result<Arc<Shared>> {
        self.owner.upgrade().ok_or(TaskError::InvalidState)
    }

    pub(crate) fn apply(self: &Arc<Self>, transition: Transition) {
        if transition != Transition::Schedule {
            return;
        }

        match self.owner() {
            Ok(shared) => shared.schedule(Arc::clone(self)),
            Err(_) => tracing::warn!(
                task = %self.id,
                pending = self.core.lock().queue.len(),
                "task manager is gone, task will not be dispatched"
            ),
        }
    }

    /// Marks a task that was never registered with its manager as finished,
    /// so releasing its handle neither schedules nor reclaims it.
    pub(crate) fn abandon(&self) {
        self.core.lock().abandon();
        tracing::trace!(task = %self.id, "task abandoned");
    }

    /// Requests shutdown, returning false if it had already been requested.
    pub(crate) fn shutdown(self: &Arc<Self>) -> bool {
        let transition = self.core.lock().request_shutdown();

        match transition {
            Some(transition) => {
                tracing::debug!(task = %self.id, "shutdown requested");
                self.apply(transition);
                true
            }
            None => false,
        }
    }

    /// The last [`Task`] handle went away.
    fn last_ref_released(self: &Arc<Self>) {
        let (transition, done) = {
            let mut core = self.core.lock();
            let transition = core.request_shutdown();

            // A worker may hold a temporary handle while dispatching. Reading
            // under the lock orders us against its end of turn.
            let done = self.refs.load(Ordering::Acquire) == 0 && core.try_finish();
            (transition, done)
        };

        if let Some(transition) = transition {
            tracing::debug!(task = %self.id, "last reference released, shutting down");
            self.apply(transition);
        }

        if done {
            self.reclaim();
        }
    }

    fn reclaim(&self) {
        tracing::debug!(task = %self.id, "task done");

        if let Some(shared) = self.owner.upgrade() {
            shared.tasks.remove(&self.id);
        }
    }
}

impl fmt::Debug for Inner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("quantum", &self.quantum)
            .field("refs", &self.refs.load(Ordering::Relaxed))
            .field("core", &*self.core.lock())
            .finish()
    }
}

/// An owning handle to a task.
///
/// Cloning a handle attaches a new owner and dropping it detaches one. When the
/// last owner detaches, shutdown is requested if it was not already; the task
/// is reclaimed once its queue is empty, its shutdown hooks have run, and no
/// owner remains.
pub struct Task {
    inner: Arc<Inner>,
}

impl Task {
    /// Creates a counted handle on `inner`.
    pub(crate) fn attach_inner(inner: Arc<Inner>) -> Self {
        inner.refs.fetch_add(1, Ordering::Relaxed);
        Self { inner }
    }

    /// Returns a [task ID] that uniquely identifies this task.
    ///
    /// [task ID]: crate::task::Id
    pub fn id(&self) -> Id {
        self.inner.id
    }

    pub fn quantum(&self) -> usize {
        self.inner.quantum
    }

    /// Current lifecycle state. Only a snapshot: other threads may move the
    /// task along as soon as this returns.
    pub fn state(&self) -> State {
        self.inner.core.lock().state
    }

    /// Number of events queued and not yet dispatched.
    pub fn pending(&self) -> usize {
        self.inner.core.lock().queue.len()
    }

    /// Number of live owning handles, including temporary ones held by a
    /// worker during dispatch.
    pub fn refs(&self) -> usize {
        self.inner.refs.load(Ordering::Acquire)
    }

    /// Attaches a new owner.
    pub fn attach(&self) -> Task {
        self.clone()
    }

    /// Detaches this owner.
    pub fn detach(self) {
        drop(self);
    }

    /// Appends `event` to the task's queue. Never waits for dispatch.
    ///
    /// Sends are accepted while the task is shutting down; such events are
    /// delivered before the task is reclaimed.
    pub fn send(&self, event: Event) -> Result<()> {
        // Refuse early if nobody could ever dispatch the event.
        let _shared = self.inner.owner()?;

        let transition = self.inner.core.lock().push(event)?;
        self.inner.apply(transition);
        Ok(())
    }

    /// Sends `event` and detaches this owner.
    pub fn send_and_detach(self, event: Event) -> Result<()> {
        self.send(event)
    }

    /// Registers a hook to run during shutdown. Hooks run on a worker thread,
    /// after the event queue has drained, in reverse registration order.
    ///
    /// Fails with [`TaskError::ShuttingDown`] once shutdown has been
    /// requested, leaving the registered hooks untouched.
    pub fn on_shutdown<F>(&self, hook: F) -> Result<()>
    where
        F: FnOnce(&Task) + Send + 'static,
    {
        self.inner.core.lock().push_hook(Box::new(hook))
    }

    /// Requests shutdown. Idempotent. Hooks are not run synchronously.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// Requests shutdown and detaches this owner.
    pub fn destroy(self) {
        self.shutdown();
    }

    /// Removes every queued, purgeable event sent by `sender` with type `ty`
    /// and tag `tag`. `None` matches any sender or tag. Returns the number of
    /// events removed; their actions are dropped without being invoked.
    pub fn purge(&self, sender: Option<Sender>, ty: EventType, tag: Option<Tag>) -> usize {
        self.purge_matching(&Filter::new(sender, ty, tag))
    }

    /// Same as [`Task::purge`] for every type in `first..=last`.
    pub fn purge_range(
        &self,
        sender: Option<Sender>,
        first: EventType,
        last: EventType,
        tag: Option<Tag>,
    ) -> usize {
        self.purge_matching(&Filter::range(sender, first, last, tag))
    }

    /// Removes the queued event `id`. Returns false if the event is not
    /// queued (already dispatched, purged, or never sent here) or is marked
    /// non-purgeable; a non-purgeable event stays queued and is delivered.
    pub fn purge_event(&self, id: EventId) -> bool {
        let removed = self.inner.core.lock().remove(id);
        removed.is_some()
    }

    fn purge_matching(&self, filter: &Filter) -> usize {
        // Dropped outside the lock, actions may own arbitrary state.
        let purged = self.inner.core.lock().purge(filter);

        tracing::trace!(task = %self.inner.id, ?filter, purged = purged.len(), "purge");
        purged.len()
    }
}

impl Clone for Task {
    fn clone(&self) -> Self {
        Task::attach_inner(Arc::clone(&self.inner))
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        if self.inner.refs.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.inner.last_ref_released();
        }
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Eq for Task {}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.inner.fmt(f)
    }
}
