use crate::event::{Event, EventType, Sender};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::mpsc;
use std::time::Duration;

pub(crate) const TIMEOUT: Duration = Duration::from_secs(10);

/// Event type of the control event used to hold a worker inside a task.
pub(crate) const T_CONTROL: EventType = 99999;

/// A one-shot latch: handlers block on it until the test opens it.
#[derive(Debug, Clone, Default)]
pub(crate) struct Gate {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl Gate {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn open(&self) {
        let (open, cv) = &*self.inner;
        *open.lock() = true;
        cv.notify_all();
    }

    pub(crate) fn wait(&self) {
        let (open, cv) = &*self.inner;
        let mut open = open.lock();
        while !*open {
            cv.wait(&mut open);
        }
    }
}

/// Thread-safe log of what handlers and hooks observed, in order.
#[derive(Debug, Clone)]
pub(crate) struct Recorder<T> {
    log: Arc<Mutex<Vec<T>>>,
}

impl<T: Clone> Recorder<T> {
    pub(crate) fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(crate) fn push(&self, value: T) {
        self.log.lock().push(value);
    }

    pub(crate) fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub(crate) fn snapshot(&self) -> Vec<T> {
        self.log.lock().clone()
    }
}

/// Builds a control event which signals `started` once dispatched, then blocks
/// the worker until `gate` opens. Everything sent to the task afterwards stays
/// queued meanwhile.
pub(crate) fn blocking_event(gate: &Gate) -> (Event, mpsc::Receiver<()>) {
    let (tx, rx) = mpsc::channel();
    let gate = gate.clone();

    let event = Event::new(Sender::new(1), T_CONTROL, move |_, _| {
        let _ = tx.send(());
        gate.wait();
    });

    (event, rx)
}

/// Event recording `value` when dispatched.
pub(crate) fn recording_event<T>(recorder: &Recorder<T>, ty: EventType, value: T) -> Event
where
    T: Clone + Send + 'static,
{
    let recorder = recorder.clone();
    Event::new(Sender::new(1), ty, move |_, _| recorder.push(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_gate_releases_waiters() {
        let gate = Gate::new();
        let (tx, rx) = mpsc::channel();

        let waiter = {
            let gate = gate.clone();
            thread::spawn(move || {
                gate.wait();
                tx.send(()).unwrap();
            })
        };

        assert!(rx.recv_timeout(Duration::from_millis(20)).is_err());
        gate.open();
        rx.recv_timeout(TIMEOUT).unwrap();
        waiter.join().unwrap();
    }
}
