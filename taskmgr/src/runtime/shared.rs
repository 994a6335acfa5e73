use crate::runtime::ManagerConfig;
use crate::runtime::registry::OwnedTasks;
use crate::task::Inner;
use crossbeam_deque::{Injector, Steal};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::iter;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, Thread};

/// State shared between the manager, its handles, every task and every worker.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) cfg: ManagerConfig,

    /// Every task not yet `Done`.
    pub(crate) tasks: OwnedTasks,

    /// Ready queue. A task is pushed here exactly once per transition to
    /// `Ready`, so at most one worker can claim it.
    pub(crate) injector: Injector<Arc<Inner>>,

    /// Tells workers to exit once they run out of work.
    pub(crate) shutdown: AtomicBool,

    /// LIFO collection of parked workers, with the flag each one waits on. We
    /// unpark the most recently parked worker first, its cache is the warmest.
    parked_threads: Mutex<VecDeque<(Thread, Arc<AtomicBool>)>>,
}

impl Shared {
    pub(crate) fn new(cfg: &ManagerConfig) -> Self {
        Self {
            cfg: cfg.clone(),
            tasks: OwnedTasks::new(),
            injector: Injector::new(),
            shutdown: AtomicBool::new(false),
            parked_threads: Mutex::new(VecDeque::with_capacity(cfg.worker_threads)),
        }
    }

    /// Pushes a `Ready` task on the ready queue and wakes a worker for it.
    pub(crate) fn schedule(&self, task: Arc<Inner>) {
        self.injector.push(task);
        self.unpark_one_thread();
    }

    pub(crate) fn next_task(&self) -> Option<Arc<Inner>> {
        iter::repeat_with(|| self.injector.steal())
            .find(|s| !s.is_retry())
            .and_then(Steal::success)
    }

    /// Parks the current thread until a task is scheduled or the manager shuts
    /// down.
    pub(crate) fn park_current_thread(&self, should_unpark: &Arc<AtomicBool>) {
        {
            let mut parked_threads = self.parked_threads.lock();

            // Checked *while holding the lock*: `schedule` pushes before it
            // takes the lock to unpark, so either we see the task here or it
            // sees us in the parked list.
            if !self.injector.is_empty() || self.shutdown.load(Ordering::Acquire) {
                return;
            }

            should_unpark.store(false, Ordering::Release);
            parked_threads.push_back((thread::current(), Arc::clone(should_unpark)));
        }

        // Loop to account for spurious wakeups.
        while !should_unpark.load(Ordering::Acquire) {
            thread::park();
        }
    }

    pub(crate) fn unpark_one_thread(&self) -> bool {
        if let Some((thread, should_unpark)) = self.parked_threads.lock().pop_back() {
            should_unpark.store(true, Ordering::Release);
            thread.unpark();
            true
        } else {
            false
        }
    }

    pub(crate) fn unpark_all_threads(&self) -> usize {
        let mut num_unparked = 0;
        let mut parked_threads = self.parked_threads.lock();

        while let Some((thread, should_unpark)) = parked_threads.pop_back() {
            num_unparked += 1;
            should_unpark.store(true, Ordering::Release);
            thread.unpark();
        }

        num_unparked
    }

    #[cfg(test)]
    pub(crate) fn num_parked(&self) -> usize {
        self.parked_threads.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use static_assertions::assert_impl_all;
    use std::time::Duration;

    assert_impl_all!(Shared: Send, Sync);

    #[test]
    fn test_park_returns_immediately_on_shutdown() {
        let shared = Shared::new(&ManagerConfig::default());
        shared.shutdown.store(true, Ordering::Release);

        shared.park_current_thread(&Arc::new(AtomicBool::new(false)));
        assert_eq!(shared.num_parked(), 0);
    }

    #[test]
    fn test_unpark_all_threads() {
        let shared = Arc::new(Shared::new(&ManagerConfig::default()));

        let handles = (0..2)
            .map(|_| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || shared.park_current_thread(&Arc::new(AtomicBool::new(false))))
            })
            .collect::<Vec<_>>();

        while shared.num_parked() < 2 {
            thread::sleep(Duration::from_millis(1));
        }

        assert_eq!(shared.unpark_all_threads(), 2);
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(!shared.unpark_one_thread());
    }
}
