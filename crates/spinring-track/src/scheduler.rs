//! Fixed-size worker pool over a queue of particle tasks.

use std::any::Any;
use std::collections::BTreeMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;

use spinring_core::errors::{ErrorInfo, SpinError};
use tracing::{debug, warn};

/// Failure messages keyed by particle id.
pub type ErrorLedger = BTreeMap<u32, String>;

/// Count of output samples written by a running task.
#[derive(Debug, Default)]
pub struct Progress {
    written: AtomicU64,
    expected: u64,
}

impl Progress {
    /// Progress of a task expected to write `expected` samples.
    pub fn new(expected: u64) -> Self {
        Self {
            written: AtomicU64::new(0),
            expected,
        }
    }

    /// Records one written sample.
    pub fn advance(&self) {
        self.written.fetch_add(1, Ordering::Relaxed);
    }

    /// Clears the counter before a (re)run.
    pub fn reset(&self) {
        self.written.store(0, Ordering::Relaxed);
    }

    /// Samples written so far.
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    /// Fraction of the expected samples written.
    pub fn fraction(&self) -> f64 {
        if self.expected == 0 {
            return 1.0;
        }
        (self.written() as f64 / self.expected as f64).min(1.0)
    }
}

/// Unit of work run by the [`Scheduler`].
pub trait Task: Send {
    /// Particle id, unique within one scheduler.
    fn id(&self) -> u32;

    /// Runs the simulation to completion.
    fn run(&mut self) -> Result<(), SpinError>;

    /// Shared progress counter, polled while the task runs.
    fn progress(&self) -> Arc<Progress>;
}

/// Snapshot of a running batch, handed to progress monitors.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressReport {
    /// Number of queued tasks.
    pub total: usize,
    /// Tasks that ran to completion, failed ones included.
    pub finished: usize,
    /// Tasks in the error ledger.
    pub failed: usize,
    /// Written fraction of each running task.
    pub running: BTreeMap<u32, f64>,
}

impl ProgressReport {
    /// Overall fraction of the batch, counting partial progress of running tasks.
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 1.0;
        }
        let partial: f64 = self.running.values().sum();
        ((self.finished as f64 + partial) / self.total as f64).min(1.0)
    }
}

struct QueueState<T> {
    tasks: Vec<Option<T>>,
    next: usize,
    finished: usize,
    running: BTreeMap<u32, Arc<Progress>>,
    errors: ErrorLedger,
}

/// Work queue executing each task once on a pool of `threads` workers.
///
/// Workers claim the next task under the queue mutex and run it outside the
/// lock. An error or panic of one task is written to the error ledger and
/// never affects the other tasks.
pub struct Scheduler<T: Task> {
    state: Mutex<QueueState<T>>,
    threads: usize,
    total: usize,
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panic: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panic: {message}")
    } else {
        "panic: unknown payload".to_string()
    }
}

impl<T: Task> Scheduler<T> {
    /// Queues `tasks` for a pool of `max(1, threads)` workers.
    pub fn new(tasks: Vec<T>, threads: usize) -> Self {
        let total = tasks.len();
        Self {
            state: Mutex::new(QueueState {
                tasks: tasks.into_iter().map(Some).collect(),
                next: 0,
                finished: 0,
                running: BTreeMap::new(),
                errors: ErrorLedger::new(),
            }),
            threads: threads.max(1),
            total,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Worker count.
    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Number of queued tasks.
    pub fn num_tasks(&self) -> usize {
        self.total
    }

    /// Number of tasks present in the error ledger.
    pub fn num_failed(&self) -> usize {
        self.lock().errors.len()
    }

    /// Number of tasks not present in the error ledger.
    pub fn num_successful(&self) -> usize {
        self.total - self.num_failed()
    }

    /// Point-in-time progress of the tasks currently running.
    pub fn progress(&self) -> BTreeMap<u32, f64> {
        self.lock()
            .running
            .iter()
            .map(|(id, progress)| (*id, progress.fraction()))
            .collect()
    }

    /// Counts and running fractions at this instant.
    pub fn report(&self) -> ProgressReport {
        let state = self.lock();
        ProgressReport {
            total: self.total,
            finished: state.finished,
            failed: state.errors.len(),
            running: state
                .running
                .iter()
                .map(|(id, progress)| (*id, progress.fraction()))
                .collect(),
        }
    }

    /// Copy of the error ledger.
    pub fn errors(&self) -> ErrorLedger {
        self.lock().errors.clone()
    }

    /// Runs every queued task and blocks until all workers are done.
    ///
    /// Calling it again is a no-op because the queue is exhausted.
    pub fn start(&self) -> Result<(), SpinError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .thread_name(|index| format!("spinring-worker-{index}"))
            .build()
            .map_err(|err| {
                SpinError::Scheduler(
                    ErrorInfo::new("thread-pool", err.to_string())
                        .with_context("threads", self.threads),
                )
            })?;
        pool.scope(|scope| {
            for _ in 0..self.threads {
                scope.spawn(|_| self.work());
            }
        });
        Ok(())
    }

    /// Like [`Scheduler::start`], calling `monitor` every `interval` while
    /// tasks run and once more with the final report.
    pub fn start_monitored<F>(&self, interval: Duration, mut monitor: F) -> Result<(), SpinError>
    where
        F: FnMut(&ProgressReport),
    {
        let outcome = thread::scope(|scope| {
            let (done_tx, done_rx) = mpsc::channel();
            let worker = scope.spawn(move || {
                let outcome = self.start();
                let _ = done_tx.send(());
                outcome
            });
            loop {
                match done_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => monitor(&self.report()),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            worker.join()
        });
        let outcome = outcome.map_err(|payload| {
            SpinError::Scheduler(ErrorInfo::new("scheduler-thread", panic_message(payload)))
        })?;
        monitor(&self.report());
        outcome
    }

    fn claim(&self) -> Option<(usize, T)> {
        let mut state = self.lock();
        while state.next < state.tasks.len() {
            let index = state.next;
            state.next += 1;
            if let Some(task) = state.tasks[index].take() {
                state.running.insert(task.id(), task.progress());
                return Some((index, task));
            }
        }
        None
    }

    fn work(&self) {
        while let Some((index, mut task)) = self.claim() {
            let id = task.id();
            debug!(particle = id, "task started");
            let failure = match catch_unwind(AssertUnwindSafe(|| task.run())) {
                Ok(Ok(())) => None,
                Ok(Err(err)) => Some(err.to_string()),
                Err(payload) => Some(panic_message(payload)),
            };
            let mut state = self.lock();
            state.running.remove(&id);
            state.finished += 1;
            if let Some(message) = failure {
                warn!(particle = id, error = %message, "particle failed");
                state.errors.insert(id, message);
            }
            state.tasks[index] = Some(task);
        }
    }

    /// Consumes the scheduler, returning the tasks in queue order and the ledger.
    pub fn into_parts(self) -> (Vec<T>, ErrorLedger) {
        let state = self.state.into_inner().unwrap_or_else(PoisonError::into_inner);
        (state.tasks.into_iter().flatten().collect(), state.errors)
    }
}
