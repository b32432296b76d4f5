//! Observing and stopping render tasks.
//!
//! A [`ProgressCallback`] attached through
//! [`RenderOptions::with_progress`](crate::RenderOptions::with_progress)
//! receives a [`ProgressInfo`] per reporting step of each phase. One
//! callback can be shared by many tasks; [`ProgressInfo::task`] tells them
//! apart.
//!
//! Every [`RenderTask`](crate::RenderTask) owns a [`CancellationToken`].
//! Clones of it are reachable through
//! [`TaskHandle::cancellation_token`](crate::TaskHandle::cancellation_token)
//! and [`RenderTask::cancellation_token`](crate::RenderTask::cancellation_token).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use framestrip::{
//!     Asset, ProgressCallback, ProgressInfo, RenderOptions, RenderTask, TargetFrame,
//! };
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         if let Some(pct) = info.percentage {
//!             println!("task {} [{:?}] {pct:.1}%", info.task, info.operation);
//!         }
//!     }
//! }
//!
//! let asset = Asset::open("input.mp4")?;
//! let task = RenderTask::new(asset, TargetFrame::new(0.0, 0.0, 320.0, 180.0))
//!     .with_options(RenderOptions::new().with_progress(Arc::new(PrintProgress)));
//! # Ok::<(), framestrip::RenderError>(())
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::task::TaskId;

/// The phase of a render task being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum OperationType {
    /// Decoding frames from the asset.
    FrameDecode,
    /// Scaling and cropping decoded frames into the target rectangle.
    Fitting,
}

/// A snapshot of one phase of a running task.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// The task being reported.
    pub task: TaskId,
    /// Which phase is running.
    pub operation: OperationType,
    /// Distinct frames finished so far in this phase.
    pub completed: u64,
    /// Distinct frames this phase will process.
    pub total: Option<u64>,
    /// `completed / total` as a percentage, if `total` is known and non-zero.
    pub percentage: Option<f32>,
    /// Time since the phase started.
    pub elapsed: Duration,
    /// Linear extrapolation of the time left in this phase.
    pub estimated_remaining: Option<Duration>,
    /// The frame number that triggered this report, if any.
    pub frame_number: Option<u64>,
}

/// Receives progress reports from render tasks.
///
/// Reports are delivered on the worker thread running the task. A callback
/// can only observe; stop a task with its [`CancellationToken`].
pub trait ProgressCallback: Send + Sync {
    /// Called once per reporting step.
    fn on_progress(&self, info: &ProgressInfo);
}

pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Shared flag that asks a render task to stop.
///
/// Clones observe the same flag. Cancellation cannot be undone. Tasks look
/// at the flag before opening a decoder and between decoded frames.
///
/// # Example
///
/// ```
/// use framestrip::CancellationToken;
///
/// let token = CancellationToken::new();
/// let observer = token.clone();
/// token.cancel();
/// assert!(observer.is_cancelled());
/// ```
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    /// A token that has not been cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Counts finished frames of one phase and reports every `report_every`.
pub(crate) struct PhaseTracker {
    callback: Arc<dyn ProgressCallback>,
    task: TaskId,
    operation: OperationType,
    total: Option<u64>,
    report_every: u64,
    completed: u64,
    unreported: u64,
    started: Instant,
}

impl PhaseTracker {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        task: TaskId,
        operation: OperationType,
        total: Option<u64>,
        report_every: u64,
    ) -> Self {
        Self {
            callback,
            task,
            operation,
            total,
            report_every: report_every.max(1),
            completed: 0,
            unreported: 0,
            started: Instant::now(),
        }
    }

    pub(crate) fn record(&mut self, frame_number: u64) {
        self.completed += 1;
        self.unreported += 1;
        if self.unreported == self.report_every {
            self.emit(Some(frame_number));
        }
    }

    /// Report the tail of a phase whose length is not a multiple of
    /// `report_every`.
    pub(crate) fn flush(&mut self) {
        if self.unreported > 0 {
            self.emit(None);
        }
    }

    fn emit(&mut self, frame_number: Option<u64>) {
        self.unreported = 0;
        let elapsed = self.started.elapsed();
        let (percentage, estimated_remaining) = match self.total {
            Some(total) if total > 0 => {
                let fraction = self.completed as f64 / total as f64;
                let left = total.saturating_sub(self.completed) as f64 / self.completed as f64;
                (Some((fraction * 100.0) as f32), Some(elapsed.mul_f64(left)))
            }
            _ => (None, None),
        };

        self.callback.on_progress(&ProgressInfo {
            task: self.task,
            operation: self.operation,
            completed: self.completed,
            total: self.total,
            percentage,
            elapsed,
            estimated_remaining,
            frame_number,
        });
    }
}
