use crate::context::init_worker_context;
use crate::error::{Result, TaskError};
use crate::runtime::Shared;
use crate::runtime::worker::Worker;
use crate::utils::ScopeGuard;
use anyhow::anyhow;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread;

/// The worker threads of a manager.
#[derive(Debug)]
pub(crate) struct ThreadPool {
    handles: Vec<thread::JoinHandle<()>>,
}

impl ThreadPool {
    /// Spawns `cfg.worker_threads` workers. If any thread fails to spawn, the
    /// ones already started are stopped and joined before the error is
    /// returned.
    pub(crate) fn spawn(shared: &Arc<Shared>) -> Result<Self> {
        let num_workers = shared.cfg.worker_threads;
        let mut pool = Self {
            handles: Vec::with_capacity(num_workers),
        };

        for index in 0..num_workers {
            match spawn_worker_thread(index, shared) {
                Ok(handle) => pool.handles.push(handle),
                Err(e) => {
                    tracing::error!(index, error = %e, "failed to spawn worker thread");

                    // No task exists yet, workers exit as soon as they see the
                    // flag.
                    shared.shutdown.store(true, Ordering::Release);
                    shared.unpark_all_threads();
                    if let Err(e) = pool.join_all() {
                        tracing::warn!(error = %e, "while stopping partial thread pool");
                    }

                    return Err(TaskError::ResourceExhausted);
                }
            }
        }

        tracing::debug!(workers = num_workers, "thread pool started");
        Ok(pool)
    }

    pub(crate) fn len(&self) -> usize {
        self.handles.len()
    }

    pub(crate) fn join_all(&mut self) -> anyhow::Result<()> {
        let panicked = self
            .handles
            .drain(..)
            .filter_map(|handle| {
                let name = handle.thread().name().map(str::to_owned);
                handle.join().err().map(|_| name)
            })
            .collect::<Vec<_>>();

        if panicked.is_empty() {
            Ok(())
        } else {
            Err(anyhow!(
                "{} worker thread(s) panicked: {:?}",
                panicked.len(),
                panicked
            ))
        }
    }
}

fn spawn_worker_thread(index: usize, shared: &Arc<Shared>) -> std::io::Result<thread::JoinHandle<()>> {
    let mut builder = thread::Builder::new().name((shared.cfg.thread_name.0)());

    if let Some(stack_size) = shared.cfg.thread_stack_size {
        builder = builder.stack_size(stack_size);
    }

    let worker = Worker::new(index, Arc::clone(shared));

    builder.spawn(move || {
        init_worker_context(index);

        // Handlers run under `catch_unwind`, so reaching this means the
        // scheduler itself panicked.
        let mut guard = ScopeGuard::new(|| {
            tracing::error!(index, "worker thread exited abnormally");
        });

        worker.event_loop();
        guard.disarm();
    })
}
