//! Bounded worker pool with caller-runs backpressure.

use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{sync_channel, Receiver, SyncSender, TrySendError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Free queue slots at or below which a saturation warning is logged.
const LOW_QUEUE_WATERMARK: usize = 3;

/// How a submission was executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The job was queued for a worker thread.
    Queued,
    /// The queue was full (or the pool closed); the submitting thread ran
    /// the job itself. Nothing is ever dropped.
    RanInline,
}

/// A fixed set of worker threads draining a bounded queue.
///
/// The pool is a pure dispatcher: it never retries and knows nothing about
/// what a job does. When the queue is full the submitting thread executes
/// the job synchronously — deliberate, bounded backpressure instead of
/// unbounded queueing or silent dropping.
pub struct WorkerPool<J: Send + 'static> {
    tx: Mutex<Option<SyncSender<J>>>,
    queued: Arc<AtomicUsize>,
    capacity: usize,
    runner: Arc<dyn Fn(J) + Send + Sync>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl<J: Send + 'static> WorkerPool<J> {
    /// Start `concurrency` worker threads over a queue of depth `capacity`.
    pub fn start<F>(concurrency: usize, capacity: usize, runner: F) -> io::Result<Self>
    where
        F: Fn(J) + Send + Sync + 'static,
    {
        let (tx, rx) = sync_channel::<J>(capacity);
        let rx = Arc::new(Mutex::new(rx));
        let runner: Arc<dyn Fn(J) + Send + Sync> = Arc::new(runner);
        let queued = Arc::new(AtomicUsize::new(0));

        let mut workers = Vec::with_capacity(concurrency);
        for index in 0..concurrency {
            let rx = rx.clone();
            let runner = runner.clone();
            let queued = queued.clone();
            let handle = thread::Builder::new()
                .name(format!("spool-upload-{index}"))
                .spawn(move || worker_loop(rx, runner, queued))?;
            workers.push(handle);
        }

        Ok(WorkerPool {
            tx: Mutex::new(Some(tx)),
            queued,
            capacity,
            runner,
            workers: Mutex::new(workers),
        })
    }

    /// Hand a job to the pool, running it inline when the queue is full.
    pub fn submit(&self, job: J) -> SubmitOutcome {
        let guard = self.tx.lock();
        let Some(tx) = guard.as_ref() else {
            drop(guard);
            warn!("job submitted after pool shutdown; running on caller thread");
            (self.runner)(job);
            return SubmitOutcome::RanInline;
        };

        match tx.try_send(job) {
            Ok(()) => {
                let depth = self.queued.fetch_add(1, Ordering::SeqCst) + 1;
                drop(guard);
                let remaining = self.capacity.saturating_sub(depth);
                if remaining <= LOW_QUEUE_WATERMARK {
                    warn!(remaining, "upload queue capacity is running low");
                }
                SubmitOutcome::Queued
            }
            Err(TrySendError::Full(job)) => {
                drop(guard);
                debug!("upload queue full; running batch on caller thread");
                (self.runner)(job);
                SubmitOutcome::RanInline
            }
            Err(TrySendError::Disconnected(job)) => {
                drop(guard);
                (self.runner)(job);
                SubmitOutcome::RanInline
            }
        }
    }

    /// Jobs currently waiting in the queue.
    pub fn queued(&self) -> usize {
        self.queued.load(Ordering::SeqCst)
    }

    /// Close the queue, drain every queued job, and join all workers.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&self) {
        drop(self.tx.lock().take());
        let workers = std::mem::take(&mut *self.workers.lock());
        for handle in workers {
            if handle.join().is_err() {
                warn!("upload worker thread panicked");
            }
        }
    }
}

fn worker_loop<J: Send + 'static>(
    rx: Arc<Mutex<Receiver<J>>>,
    runner: Arc<dyn Fn(J) + Send + Sync>,
    queued: Arc<AtomicUsize>,
) {
    loop {
        // Holding the lock across recv only serializes dequeueing; jobs run
        // after the guard is released.
        let job = {
            let rx = rx.lock();
            rx.recv()
        };
        match job {
            Ok(job) => {
                queued.fetch_sub(1, Ordering::SeqCst);
                runner(job);
            }
            Err(_) => break,
        }
    }
}
