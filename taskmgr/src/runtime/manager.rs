use crate::context;
use crate::error::{Result, TaskError};
use crate::runtime::pool::ThreadPool;
use crate::runtime::{Builder, ManagerConfig, Shared};
use crate::task::{self, Task};
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;

/// Owns a pool of worker threads and every task created through it.
///
/// ```ignore
/// let manager = taskmgr::TaskManager::create(4)?;
/// let task = manager.create_task(0)?;
///
/// task.send(Event::new(Sender::of(&me), QUERY, |task, event| {
///     tracing::info!(task = %task.id(), id = %event.id(), "got query");
/// }))?;
///
/// manager.destroy();
/// ```
///
/// Dropping the manager destroys it.
#[derive(Debug)]
pub struct TaskManager {
    handle: Handle,

    // Only `None` once destroyed.
    pool: Option<ThreadPool>,
}

/// A cloneable reference to a [`TaskManager`], usable from handlers to create
/// more tasks. Does not keep the manager alive.
#[derive(Debug, Clone)]
pub struct Handle {
    shared: Arc<Shared>,
}

impl TaskManager {
    /// Creates a manager with `workers` threads and default settings.
    pub fn create(workers: usize) -> Result<TaskManager> {
        Builder::new().worker_threads(workers).try_build()
    }

    pub fn builder() -> Builder {
        Builder::new()
    }

    pub(crate) fn from_config(cfg: ManagerConfig) -> Result<TaskManager> {
        let shared = Arc::new(Shared::new(&cfg));
        let pool = ThreadPool::spawn(&shared)?;

        tracing::debug!(
            workers = cfg.worker_threads,
            default_quantum = cfg.default_quantum,
            "task manager created"
        );

        Ok(TaskManager {
            handle: Handle { shared },
            pool: Some(pool),
        })
    }

    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// See [`Handle::create_task`].
    pub fn create_task(&self, quantum: usize) -> Result<Task> {
        self.handle.create_task(quantum)
    }

    /// Number of tasks not yet reclaimed.
    pub fn num_tasks(&self) -> usize {
        self.handle.num_tasks()
    }

    pub fn worker_threads(&self) -> usize {
        self.pool.as_ref().map_or(0, ThreadPool::len)
    }

    /// Requests shutdown of every task, waits for all of them to drain and
    /// run their hooks, then stops and joins the workers.
    ///
    /// Blocks until every [`Task`] handle has been detached: a task is only
    /// reclaimed once nobody owns it.
    pub fn destroy(mut self) {
        self.destroy_inner();
    }

    fn destroy_inner(&mut self) {
        let Some(mut pool) = self.pool.take() else {
            return;
        };

        let shared = Arc::clone(&self.handle.shared);
        let signalled = shared.tasks.shutdown_all();
        tracing::debug!(tasks = signalled, "destroying task manager");

        if context::current_worker().is_none() {
            drain_and_join(&shared, &mut pool);
            return;
        }

        // Waiting here would wait on ourselves: the task being dispatched on
        // this thread cannot drain until we return. Hand the wait off.
        let reaper = thread::Builder::new()
            .name("taskmgr-reaper".to_string())
            .spawn({
                let shared = Arc::clone(&shared);
                move || drain_and_join(&shared, &mut pool)
            });

        if let Err(e) = reaper {
            tracing::error!(error = %e, "failed to spawn reaper, workers stop once idle");
            shared.shutdown.store(true, Ordering::Release);
            shared.unpark_all_threads();
        }
    }
}

/// Waits for every task to reach `Done`, then stops and joins the workers.
fn drain_and_join(shared: &Shared, pool: &mut ThreadPool) {
    shared.tasks.wait_until_empty();

    shared.shutdown.store(true, Ordering::Release);
    shared.unpark_all_threads();

    if let Err(e) = pool.join_all() {
        tracing::error!(error = %e, "error while joining workers");
    }

    tracing::debug!("task manager destroyed");
}

impl Drop for TaskManager {
    fn drop(&mut self) {
        self.destroy_inner();
    }
}

impl Handle {
    /// Creates a task with an empty queue, no hooks, and one owner: the
    /// returned handle. A `quantum` of 0 selects the manager default.
    ///
    /// Fails with [`TaskError::ShuttingDown`] once the manager is being
    /// destroyed.
    pub fn create_task(&self, quantum: usize) -> Result<Task> {
        let quantum = self.shared.cfg.quantum_or_default(quantum);
        let (task, inner) = task::new_task(&self.shared, quantum);

        // Registration is what makes a task visible to `destroy()`. A task
        // that lost the race against it must not be scheduled by the drop
        // of its only handle.
        if let Err(e) = self.shared.tasks.insert(Arc::clone(&inner)) {
            inner.abandon();
            return Err(e);
        }

        tracing::trace!(task = %task.id(), quantum, "task created");
        Ok(task)
    }

    pub fn num_tasks(&self) -> usize {
        self.shared.tasks.len()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shared.tasks.is_closed()
    }
}

#[cfg(test)]
impl Handle {
    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }
}
