//! Worker pool that runs render tasks off the calling thread.
//!
//! [`RenderQueue`] owns a [`rayon`] thread pool. Submitting a task marks it
//! `Scheduled`, returns its [`TaskHandle`], and runs it on the next free
//! worker. Each task opens its own decoder, so tasks that share an
//! [`Asset`](crate::Asset) never share decoder state.
//!
//! # Example
//!
//! ```no_run
//! use framestrip::{Asset, QueueOptions, RenderQueue, RenderTask, TargetFrame};
//!
//! let asset = Asset::open("input.mp4")?;
//! let queue = RenderQueue::with_options(QueueOptions::new().with_max_concurrent(2))?;
//!
//! let handles: Vec<_> = (0..4)
//!     .map(|second| {
//!         let task = RenderTask::with_indexes(
//!             asset.clone(),
//!             [std::time::Duration::from_secs(second)],
//!             TargetFrame::from_size(160.0, 90.0),
//!         );
//!         queue.submit(task)
//!     })
//!     .collect::<Result<_, _>>()?;
//!
//! for handle in handles {
//!     let output = handle.wait()?;
//!     println!("{} frame(s)", output.len());
//! }
//! # Ok::<(), framestrip::RenderError>(())
//! ```

use std::collections::HashMap;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;

use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::error::RenderError;
use crate::task::{RenderTask, TaskControl, TaskHandle, TaskId, TaskState, UnitOfWork};

/// Worker pool settings.
#[derive(Debug, Clone)]
#[must_use]
pub struct QueueOptions {
    /// Maximum number of tasks running at once. `None` uses the available
    /// parallelism of the machine.
    pub max_concurrent: Option<usize>,
    /// Prefix for worker thread names.
    pub thread_name_prefix: String,
}

impl Default for QueueOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueOptions {
    /// Default settings: one worker per available core.
    pub fn new() -> Self {
        Self {
            max_concurrent: None,
            thread_name_prefix: "framestrip-render".to_string(),
        }
    }

    /// Limit concurrency. `1` runs tasks one at a time. Clamped to at
    /// least 1.
    pub fn with_max_concurrent(mut self, workers: usize) -> Self {
        self.max_concurrent = Some(workers.max(1));
        self
    }

    /// Shorthand for `with_max_concurrent(1)`.
    pub fn serial(self) -> Self {
        self.with_max_concurrent(1)
    }

    /// Set the worker thread name prefix.
    pub fn with_thread_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_name_prefix = prefix.into();
        self
    }

    fn resolve_workers(&self) -> usize {
        self.max_concurrent.unwrap_or_else(|| {
            thread::available_parallelism()
                .map(|count| count.get())
                .unwrap_or(1)
        })
    }
}

/// Tasks that have been submitted but not yet finished.
#[derive(Default)]
struct InFlight {
    tasks: Mutex<HashMap<TaskId, Arc<TaskControl>>>,
    idle: Condvar,
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, Arc<TaskControl>>> {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Removes a task from the in-flight set when dropped, even if the task
/// panicked.
struct InFlightGuard {
    in_flight: Arc<InFlight>,
    id: TaskId,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        let mut tasks = self.in_flight.lock();
        tasks.remove(&self.id);
        if tasks.is_empty() {
            self.in_flight.idle.notify_all();
        }
    }
}

/// A scheduler for [`RenderTask`]s backed by a worker pool.
pub struct RenderQueue {
    pool: ThreadPool,
    workers: usize,
    in_flight: Arc<InFlight>,
}

impl Debug for RenderQueue {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("RenderQueue")
            .field("workers", &self.workers)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

impl RenderQueue {
    /// Create a queue with one worker per available core.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::QueueBuild`] if the worker threads cannot be
    /// spawned.
    pub fn new() -> Result<Self, RenderError> {
        Self::with_options(QueueOptions::new())
    }

    /// Create a queue with explicit settings.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::QueueBuild`] if the worker threads cannot be
    /// spawned.
    pub fn with_options(options: QueueOptions) -> Result<Self, RenderError> {
        let workers = options.resolve_workers();
        let prefix = options.thread_name_prefix.clone();
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(move |index| format!("{prefix}-{index}"))
            .panic_handler(|_| log::error!("Render task panicked on a worker thread"))
            .build()
            .map_err(|error| RenderError::QueueBuild(error.to_string()))?;

        log::debug!("Render queue started with {workers} worker(s)");

        Ok(Self {
            pool,
            workers,
            in_flight: Arc::new(InFlight::default()),
        })
    }

    /// Number of worker threads.
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Submit a task and return the handle that receives its outcome.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::AlreadySubmitted`] if the task is not in the
    /// [`Created`](TaskState::Created) state.
    pub fn submit(&self, mut task: RenderTask) -> Result<TaskHandle, RenderError> {
        let control = Arc::clone(task.control());
        let id = control.id;
        if !control.transition(TaskState::Created, TaskState::Scheduled) {
            return Err(RenderError::AlreadySubmitted(id));
        }

        let handle = task.handle();
        self.in_flight.lock().insert(id, control);

        let guard = InFlightGuard {
            in_flight: Arc::clone(&self.in_flight),
            id,
        };
        self.pool.spawn(move || {
            let _guard = guard;
            task.start();
        });

        log::debug!("Render task {id} scheduled");
        Ok(handle)
    }

    /// Submit several tasks, stopping at the first rejected one.
    ///
    /// # Errors
    ///
    /// Returns the first [`submit`](RenderQueue::submit) error. Tasks
    /// submitted before it keep running.
    pub fn submit_all<I>(&self, tasks: I) -> Result<Vec<TaskHandle>, RenderError>
    where
        I: IntoIterator<Item = RenderTask>,
    {
        tasks.into_iter().map(|task| self.submit(task)).collect()
    }

    /// Request cancellation of every task submitted and not yet finished.
    pub fn cancel_all(&self) {
        let tasks = self.in_flight.lock();
        log::debug!("Cancelling {} in-flight render task(s)", tasks.len());
        for control in tasks.values() {
            control.cancellation.cancel();
        }
    }

    /// Number of tasks submitted and not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Block until every submitted task has finished.
    pub fn wait_idle(&self) {
        let mut tasks = self.in_flight.lock();
        while !tasks.is_empty() {
            tasks = self
                .in_flight
                .idle
                .wait(tasks)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }
}
