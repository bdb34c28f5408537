//! Cancellable periodic task.

use parking_lot::{Condvar, Mutex};
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::warn;

struct Shared {
    stopped: Mutex<bool>,
    signal: Condvar,
}

/// A named thread running a closure at a fixed interval.
///
/// The wait is a condvar with timeout, so [`PeriodicTask::stop`] wakes the
/// thread immediately instead of waiting out the current sleep, and the
/// thread is guaranteed to have ceased before `stop` returns.
pub struct PeriodicTask {
    shared: Arc<Shared>,
    handle: Option<JoinHandle<()>>,
}

impl PeriodicTask {
    /// Spawn the task. `tick` runs once per `interval`, off the lock.
    pub fn spawn<F>(name: &str, interval: Duration, tick: F) -> io::Result<Self>
    where
        F: Fn() + Send + 'static,
    {
        let shared = Arc::new(Shared {
            stopped: Mutex::new(false),
            signal: Condvar::new(),
        });

        let thread_shared = shared.clone();
        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || loop {
                let mut stopped = thread_shared.stopped.lock();
                if *stopped {
                    break;
                }
                let waited = thread_shared.signal.wait_for(&mut stopped, interval);
                if *stopped {
                    break;
                }
                drop(stopped);
                if waited.timed_out() {
                    tick();
                }
            })?;

        Ok(PeriodicTask {
            shared,
            handle: Some(handle),
        })
    }

    /// Signal the task to stop and wait for the thread to finish.
    ///
    /// An in-progress tick is allowed to complete; no new tick starts after
    /// this returns.
    pub fn stop(mut self) {
        self.halt();
    }

    fn halt(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        *self.shared.stopped.lock() = true;
        self.shared.signal.notify_all();
        if handle.join().is_err() {
            warn!("periodic task thread panicked");
        }
    }
}

impl Drop for PeriodicTask {
    fn drop(&mut self) {
        self.halt();
    }
}
