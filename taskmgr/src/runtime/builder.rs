use crate::error::TaskError;
use crate::runtime::TaskManager;
use std::convert::TryFrom;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;

/// Default bound on events dispatched per scheduling turn.
pub(crate) const DEFAULT_QUANTUM: usize = 20;

#[derive(Clone)]
pub(crate) struct ThreadNameFn(pub(crate) Arc<dyn Fn() -> String + Send + Sync + 'static>);

fn default_thread_name_fn() -> ThreadNameFn {
    let worker_count = Arc::new(AtomicUsize::new(0));

    ThreadNameFn(Arc::new(move || {
        let id = worker_count.fetch_add(1, Ordering::Relaxed);
        format!("taskmgr-{}", id)
    }))
}

impl fmt::Debug for ThreadNameFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ThreadNameFn").field(&"<function>").finish()
    }
}

/// Builds a [`TaskManager`].
///
/// ```ignore
/// let manager = taskmgr::Builder::new()
///     .worker_threads(4)
///     .default_quantum(8)
///     .thread_name("resolver")
///     .try_build()?;
/// ```
#[derive(Debug)]
pub struct Builder {
    /// Number of worker threads. Defaults to the available parallelism.
    worker_threads: Option<usize>,

    /// Events dispatched per turn for tasks created without an explicit
    /// quantum.
    default_quantum: usize,

    /// Name fn used for worker threads.
    thread_name: ThreadNameFn,

    /// Stack size used for worker threads.
    thread_stack_size: Option<usize>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    pub fn new() -> Builder {
        Self {
            worker_threads: None,
            default_quantum: DEFAULT_QUANTUM,
            thread_name: default_thread_name_fn(),
            thread_stack_size: None,
        }
    }

    /// The number of worker threads dispatching events. Must be at least one,
    /// which is checked by [`Builder::try_build`].
    ///
    /// Defaults to 1 worker per CPU core.
    pub fn worker_threads(mut self, val: usize) -> Self {
        self.worker_threads = Some(val);
        self
    }

    /// Maximum number of events a worker dispatches for one task before
    /// handing it back to the ready queue. Smaller values favor fairness
    /// between tasks, larger values favor throughput of busy tasks.
    ///
    /// Must be at least one. Defaults to 20.
    pub fn default_quantum(mut self, val: usize) -> Self {
        self.default_quantum = val;
        self
    }

    /// Sets the name of worker threads.
    ///
    /// The default name is "taskmgr-{id}", where id is monotonically
    /// increasing.
    pub fn thread_name(mut self, val: impl Into<String>) -> Self {
        let val = val.into();
        self.thread_name = ThreadNameFn(Arc::new(move || val.clone()));
        self
    }

    /// Sets a function used to generate the name of worker threads.
    pub fn thread_name_fn<F>(mut self, f: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.thread_name = ThreadNameFn(Arc::new(f));
        self
    }

    /// Sets the stack size (in bytes) for worker threads.
    ///
    /// The actual stack size may be greater than this value if the platform
    /// specifies minimal stack size.
    pub fn thread_stack_size(mut self, val: usize) -> Self {
        self.thread_stack_size = Some(val);
        self
    }

    /// Creates the configured [`TaskManager`], spawning its workers.
    pub fn try_build(self) -> Result<TaskManager, TaskError> {
        let cfg = ManagerConfig::try_from(self)?;
        TaskManager::from_config(cfg)
    }
}

/// Validated configuration, shared by the manager and its workers.
#[derive(Debug, Clone)]
pub(crate) struct ManagerConfig {
    pub(crate) worker_threads: usize,
    pub(crate) default_quantum: usize,
    pub(crate) thread_name: ThreadNameFn,
    pub(crate) thread_stack_size: Option<usize>,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        ManagerConfig {
            worker_threads: 1,
            default_quantum: DEFAULT_QUANTUM,
            thread_name: default_thread_name_fn(),
            thread_stack_size: None,
        }
    }
}

impl ManagerConfig {
    fn validate(&self) -> Result<(), TaskError> {
        if self.worker_threads == 0 {
            return Err(TaskError::InvalidArgument(
                "worker_threads must be greater than 0".to_string(),
            ));
        }

        if self.default_quantum == 0 {
            return Err(TaskError::InvalidArgument(
                "default_quantum must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    /// A quantum of 0 selects the manager default.
    pub(crate) fn quantum_or_default(&self, quantum: usize) -> usize {
        if quantum == 0 {
            self.default_quantum
        } else {
            quantum
        }
    }
}

impl TryFrom<Builder> for ManagerConfig {
    type Error = TaskError;

    fn try_from(builder: Builder) -> Result<Self, Self::Error> {
        let worker_threads = match builder.worker_threads {
            Some(n) => n,
            None => thread::available_parallelism().map_or(1, |n| n.get()),
        };

        let cfg = ManagerConfig {
            worker_threads,
            default_quantum: builder.default_quantum,
            thread_name: builder.thread_name,
            thread_stack_size: builder.thread_stack_size,
        };

        cfg.validate()?;

        Ok(cfg)
    }
}
