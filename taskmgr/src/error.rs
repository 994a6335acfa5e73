use std::collections::TryReserveError;

/// Errors returned by task manager and task operations.
///
/// Every rejected call is reported to the caller; the manager never drops a
/// requested operation silently.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskError {
    /// Malformed construction parameters, e.g. a pool of zero workers.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Memory or threads could not be obtained for a new task, event slot or
    /// worker.
    #[error("resources exhausted")]
    ResourceExhausted,

    /// The task (or the manager) has begun its shutdown sequence. Callers may
    /// treat this as a normal negative result.
    #[error("shutting down")]
    ShuttingDown,

    /// The operation targets a task that has already been reclaimed, or whose
    /// manager is gone.
    #[error("invalid task state")]
    InvalidState,
}

impl TaskError {
    pub fn is_shutting_down(&self) -> bool {
        matches!(self, TaskError::ShuttingDown)
    }

    /// Errors that indicate a caller lifecycle bug rather than an expected
    /// negative result.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TaskError::InvalidState)
    }
}

impl From<TryReserveError> for TaskError {
    fn from(_: TryReserveError) -> Self {
        TaskError::ResourceExhausted
    }
}

pub type Result<T> = std::result::Result<T, TaskError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        assert!(TaskError::ShuttingDown.is_shutting_down());
        assert!(!TaskError::ShuttingDown.is_fatal());
        assert!(TaskError::InvalidState.is_fatal());
        assert!(!TaskError::ResourceExhausted.is_fatal());
    }

    #[test]
    fn test_try_reserve_maps_to_resource_exhausted() {
        let mut v: Vec<u64> = Vec::new();
        let err = v.try_reserve(usize::MAX).unwrap_err();
        assert_eq!(TaskError::from(err), TaskError::ResourceExhausted);
    }

    #[test]
    fn test_display() {
        assert_eq!(
            TaskError::InvalidArgument("worker_threads must be greater than 0".into()).to_string(),
            "invalid argument: worker_threads must be greater than 0"
        );
        assert_eq!(TaskError::ShuttingDown.to_string(), "shutting down");
    }
}
