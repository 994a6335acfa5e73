use crate::context;
use std::sync::atomic::{AtomicU64, Ordering};
use std::{fmt, num::NonZeroU64};

/// An opaque ID that uniquely identifies a task among every task created in
/// this process.
///
/// # Notes
///
/// - Task IDs are *not* guaranteed to be sequential across managers.
/// - The ID of the task whose event is currently being dispatched can be
///   obtained from inside a handler with [`task::try_id()`](crate::task::try_id()).
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, PartialOrd, Ord)]
pub struct Id(pub(crate) NonZeroU64);

/// Returns the [`Id`] of the task whose event or shutdown hook is running on
/// the current thread, or `None` if called outside of a dispatch.
pub fn try_id() -> Option<Id> {
    context::current_task_id()
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Id {
    pub(crate) fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);

        let id = COUNTER.fetch_add(1, Ordering::Relaxed);

        // Even at a billion tasks per second this takes centuries to wrap.
        let Some(id) = NonZeroU64::new(id) else {
            Self::exhausted();
        };

        Self(id)
    }

    #[cold]
    fn exhausted() -> ! {
        panic!("failed to generate unique task ID: bitspace exhausted")
    }

    pub fn as_u64(&self) -> u64 {
        self.0.get()
    }
}

/// Sets the current task id for the duration of a dispatch and restores the
/// previous one when dropped, including on unwind.
pub(crate) struct TaskIdGuard {
    parent_task_id: Option<Id>,
}

impl TaskIdGuard {
    pub(crate) fn enter(id: Id) -> Self {
        TaskIdGuard {
            parent_task_id: context::set_current_task_id(Some(id)),
        }
    }
}

impl Drop for TaskIdGuard {
    fn drop(&mut self) {
        context::set_current_task_id(self.parent_task_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_new_task_id_unique() {
        let n = 13;
        let all_ids = (0..n).map(|_| Id::next()).collect::<HashSet<_>>();
        assert_eq!(all_ids.len(), n);
    }

    #[test]
    fn test_task_id_guard_nests() {
        assert_eq!(try_id(), None);

        let outer = Id::next();
        let inner = Id::next();
        {
            let _g1 = TaskIdGuard::enter(outer);
            assert_eq!(try_id(), Some(outer));
            {
                let _g2 = TaskIdGuard::enter(inner);
                assert_eq!(try_id(), Some(inner));
            }
            assert_eq!(try_id(), Some(outer));
        }

        assert_eq!(try_id(), None);
    }
}
