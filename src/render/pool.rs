//! Worker pools that run boxed tasks and report their outcomes on a channel.
//!
//! [`TaskPool`] is the dispatch seam used by the orchestrator: spawn a task
//! under a [`Ticket`], then pull [`TaskOutcome`]s in completion order. Panics
//! inside a task are caught and reported as [`TaskOutcome::Panicked`].

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

pub type Task<T> = Box<dyn FnOnce() -> T + Send + 'static>;

/// Identifies a task: the render it belongs to and its job index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub generation: u64,
    pub job: usize,
}

#[derive(Debug)]
pub enum TaskOutcome<T> {
    Completed { ticket: Ticket, value: T },
    Panicked { ticket: Ticket, message: String },
}

impl<T> TaskOutcome<T> {
    #[must_use]
    pub const fn ticket(&self) -> Ticket {
        match self {
            Self::Completed { ticket, .. } | Self::Panicked { ticket, .. } => *ticket,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("a worker pool needs at least one worker")]
    NoWorkers,
    #[error("failed to start worker {index}: {reason}")]
    SpawnFailed { index: usize, reason: String },
    #[error("{missing} worker(s) did not register within {timeout_ms} ms")]
    RegistrationTimeout { missing: usize, timeout_ms: u128 },
    #[error("worker {index} is no longer accepting tasks")]
    WorkerGone { index: usize },
    #[error("the result channel is closed")]
    Disconnected,
}

/// Spawn-N / join-all abstraction over a set of workers.
pub trait TaskPool<T: Send + 'static> {
    fn worker_count(&self) -> usize;

    /// Grows or shrinks the pool. Growing returns once every new worker has
    /// registered.
    ///
    /// # Errors
    /// Zero workers, a thread that failed to start, or a registration timeout.
    fn resize(&mut self, workers: usize) -> Result<(), PoolError>;

    /// Queues `task` on some worker.
    ///
    /// # Errors
    /// The pool is empty or the chosen worker has stopped.
    fn spawn(&mut self, ticket: Ticket, task: Task<T>) -> Result<(), PoolError>;

    /// Waits up to `timeout` for the next finished task; `Ok(None)` on timeout.
    ///
    /// # Errors
    /// [`PoolError::Disconnected`] if no worker can ever report again.
    fn next_outcome(&mut self, timeout: Duration) -> Result<Option<TaskOutcome<T>>, PoolError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolOptions {
    /// Worker threads are named `{prefix}-{index}`.
    pub thread_name_prefix: String,
    /// How long `resize` waits for new workers to register.
    pub registration_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            thread_name_prefix: "curve-worker".to_string(),
            registration_timeout: Duration::from_secs(5),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Runs `task`, converting a panic into [`TaskOutcome::Panicked`].
fn run_task<T>(ticket: Ticket, task: Task<T>) -> TaskOutcome<T> {
    match panic::catch_unwind(AssertUnwindSafe(task)) {
        Ok(value) => TaskOutcome::Completed { ticket, value },
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            log::warn!("task {ticket:?} panicked: {message}");
            TaskOutcome::Panicked { ticket, message }
        }
    }
}

/// Waits until `expected` registrations arrive on `registered`.
fn await_registrations(
    registered: &Receiver<usize>,
    expected: usize,
    timeout: Duration,
) -> Result<(), PoolError> {
    let deadline = Instant::now() + timeout;
    for received in 0..expected {
        let remaining = deadline.saturating_duration_since(Instant::now());
        match registered.recv_timeout(remaining) {
            Ok(index) => log::trace!("worker {index} registered"),
            Err(_) => {
                return Err(PoolError::RegistrationTimeout {
                    missing: expected - received,
                    timeout_ms: timeout.as_millis(),
                });
            }
        }
    }
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// WorkerPool
// ─────────────────────────────────────────────────────────────────────────────

enum WorkerMessage<T> {
    Run { ticket: Ticket, task: Task<T> },
    Retire,
}

/// Fixed set of named OS threads, each with its own task queue. Tasks are
/// handed out round-robin, so N tasks on N workers run one per worker.
pub struct WorkerPool<T> {
    workers: Vec<Sender<WorkerMessage<T>>>,
    results_tx: Sender<TaskOutcome<T>>,
    results_rx: Receiver<TaskOutcome<T>>,
    next_worker: usize,
    options: PoolOptions,
}

impl<T> std::fmt::Debug for WorkerPool<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn worker_loop<T>(
    index: usize,
    tasks: &Receiver<WorkerMessage<T>>,
    results: &Sender<TaskOutcome<T>>,
    registered: Sender<usize>,
) {
    let _ = registered.send(index);
    drop(registered);

    while let Ok(message) = tasks.recv() {
        match message {
            WorkerMessage::Run { ticket, task } => {
                if results.send(run_task(ticket, task)).is_err() {
                    break;
                }
            }
            WorkerMessage::Retire => break,
        }
    }
    log::debug!("worker {index} retired");
}

impl<T: Send + 'static> WorkerPool<T> {
    /// Starts a pool with `workers` threads and waits for them to register.
    ///
    /// # Errors
    /// See [`TaskPool::resize`].
    pub fn new(workers: usize, options: PoolOptions) -> Result<Self, PoolError> {
        let (results_tx, results_rx) = mpsc::channel();
        let mut pool = Self {
            workers: Vec::new(),
            results_tx,
            results_rx,
            next_worker: 0,
            options,
        };
        pool.resize(workers)?;
        Ok(pool)
    }

    fn start_worker(
        &self,
        index: usize,
        registered: &Sender<usize>,
    ) -> Result<Sender<WorkerMessage<T>>, PoolError> {
        let (tx, rx) = mpsc::channel::<WorkerMessage<T>>();
        let results = self.results_tx.clone();
        let registered = registered.clone();
        thread::Builder::new()
            .name(format!("{}-{index}", self.options.thread_name_prefix))
            .spawn(move || worker_loop(index, &rx, &results, registered))
            .map_err(|err| PoolError::SpawnFailed {
                index,
                reason: err.to_string(),
            })?;
        log::debug!("spawned worker {index}");
        Ok(tx)
    }
}

impl<T: Send + 'static> TaskPool<T> for WorkerPool<T> {
    fn worker_count(&self) -> usize {
        self.workers.len()
    }

    fn resize(&mut self, workers: usize) -> Result<(), PoolError> {
        if workers == 0 {
            return Err(PoolError::NoWorkers);
        }

        // Highest-index workers retire first; they finish queued tasks before exiting.
        while self.workers.len() > workers {
            if let Some(sender) = self.workers.pop() {
                let _ = sender.send(WorkerMessage::Retire);
            }
        }

        let current = self.workers.len();
        if current < workers {
            let (registered_tx, registered_rx) = mpsc::channel();
            for index in current..workers {
                let sender = self.start_worker(index, &registered_tx)?;
                self.workers.push(sender);
            }
            await_registrations(
                &registered_rx,
                workers - current,
                self.options.registration_timeout,
            )?;
        }
        self.next_worker %= self.workers.len();
        Ok(())
    }

    fn spawn(&mut self, ticket: Ticket, task: Task<T>) -> Result<(), PoolError> {
        if self.workers.is_empty() {
            return Err(PoolError::NoWorkers);
        }
        let index = self.next_worker % self.workers.len();
        self.next_worker = (index + 1) % self.workers.len();
        self.workers[index]
            .send(WorkerMessage::Run { ticket, task })
            .map_err(|_| PoolError::WorkerGone { index })
    }

    fn next_outcome(&mut self, timeout: Duration) -> Result<Option<TaskOutcome<T>>, PoolError> {
        match self.results_rx.recv_timeout(timeout) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(PoolError::Disconnected),
        }
    }
}

impl<T> Drop for WorkerPool<T> {
    fn drop(&mut self) {
        // Workers are detached, not joined: a stuck task must not block the owner.
        for sender in self.workers.drain(..) {
            let _ = sender.send(WorkerMessage::Retire);
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// RayonPool
// ─────────────────────────────────────────────────────────────────────────────

/// [`TaskPool`] backed by a dedicated rayon thread pool.
#[cfg(feature = "parallel")]
pub struct RayonPool<T> {
    pool: rayon::ThreadPool,
    workers: usize,
    results_tx: Sender<TaskOutcome<T>>,
    results_rx: Receiver<TaskOutcome<T>>,
    options: PoolOptions,
}

#[cfg(feature = "parallel")]
impl<T: Send + 'static> RayonPool<T> {
    /// # Errors
    /// See [`TaskPool::resize`].
    pub fn new(workers: usize, options: PoolOptions) -> Result<Self, PoolError> {
        let pool = Self::build(workers, &options)?;
        let (results_tx, results_rx) = mpsc::channel();
        Ok(Self {
            pool,
            workers,
            results_tx,
            results_rx,
            options,
        })
    }

    fn build(workers: usize, options: &PoolOptions) -> Result<rayon::ThreadPool, PoolError> {
        if workers == 0 {
            return Err(PoolError::NoWorkers);
        }
        let (registered_tx, registered_rx) = mpsc::channel();
        let prefix = options.thread_name_prefix.clone();
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |index| format!("{prefix}-{index}"))
            .start_handler(move |index| {
                let _ = registered_tx.send(index);
            })
            .build()
            .map_err(|err| PoolError::SpawnFailed {
                index: 0,
                reason: err.to_string(),
            })?;
        await_registrations(&registered_rx, workers, options.registration_timeout)?;
        Ok(pool)
    }
}

#[cfg(feature = "parallel")]
impl<T: Send + 'static> TaskPool<T> for RayonPool<T> {
    fn worker_count(&self) -> usize {
        self.workers
    }

    fn resize(&mut self, workers: usize) -> Result<(), PoolError> {
        if workers != self.workers {
            self.pool = Self::build(workers, &self.options)?;
            self.workers = workers;
        }
        Ok(())
    }

    fn spawn(&mut self, ticket: Ticket, task: Task<T>) -> Result<(), PoolError> {
        let results = self.results_tx.clone();
        self.pool.spawn(move || {
            let _ = results.send(run_task(ticket, task));
        });
        Ok(())
    }

    fn next_outcome(&mut self, timeout: Duration) -> Result<Option<TaskOutcome<T>>, PoolError> {
        match self.results_rx.recv_timeout(timeout) {
            Ok(outcome) => Ok(Some(outcome)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(PoolError::Disconnected),
        }
    }
}
