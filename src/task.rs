//! Cancellable render tasks.
//!
//! A [`RenderTask`] is one unit of work: decode the frames at its indexes
//! from its [`Asset`], fit them into its [`TargetFrame`], and report a single
//! [`TaskOutcome`]. Tasks move through
//! `Created → Scheduled → Running → Completed | Failed | Cancelled`.
//!
//! The outcome is delivered twice, in this order: to the optional
//! completion callback (on the worker thread, with a reference to the
//! finished task) and then to the [`TaskHandle`] obtained from
//! [`RenderTask::handle`] or [`RenderQueue::submit`](crate::RenderQueue::submit).
//! Both fire exactly once for every terminal state, including
//! cancellation and failure.
//!
//! # Example
//!
//! ```no_run
//! use framestrip::{Asset, FrameIndex, RenderQueue, RenderTask, TargetFrame};
//!
//! let asset = Asset::open("input.mp4")?;
//! let task = RenderTask::with_indexes(
//!     asset,
//!     vec![FrameIndex::Frame(0), FrameIndex::Frame(120)],
//!     TargetFrame::new(0.0, 0.0, 160.0, 90.0),
//! )
//! .on_complete(|task, outcome| {
//!     println!("task {} finished: ok={}", task.id(), outcome.is_ok());
//! });
//!
//! let queue = RenderQueue::new()?;
//! let output = queue.submit(task)?.wait()?;
//! assert_eq!(output.len(), 2);
//! # Ok::<(), framestrip::RenderError>(())
//! ```

use std::collections::HashMap;
use std::fmt::{Debug, Display, Formatter, Result as FmtResult};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::task::{Context, Poll};

use image::DynamicImage;
use tokio::sync::oneshot::{self, Receiver, Sender, error::TryRecvError};

use crate::asset::Asset;
use crate::configuration::RenderOptions;
use crate::error::RenderError;
use crate::geometry::{TargetFrame, fit_image};
use crate::index::FrameIndex;
use crate::output::{RenderOutput, RenderedFrame};
use crate::progress::{CancellationToken, OperationType, PhaseTracker};

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of a [`RenderTask`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(u64);

impl TaskId {
    pub(crate) fn next() -> Self {
        TaskId(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw numeric value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for TaskId {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a render task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TaskState {
    /// Constructed, not yet handed to a scheduler.
    Created = 0,
    /// Accepted by a scheduler, waiting for a worker.
    Scheduled = 1,
    /// Executing on a worker.
    Running = 2,
    /// Finished with rendered output.
    Completed = 3,
    /// Finished with an error other than cancellation.
    Failed = 4,
    /// Stopped because cancellation was requested.
    Cancelled = 5,
}

impl TaskState {
    /// Whether the task has produced its outcome.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled
        )
    }

    fn from_u8(value: u8) -> Self {
        match value {
            0 => TaskState::Created,
            1 => TaskState::Scheduled,
            2 => TaskState::Running,
            3 => TaskState::Completed,
            4 => TaskState::Failed,
            _ => TaskState::Cancelled,
        }
    }
}

/// The single result of a render task.
pub type TaskOutcome = Result<RenderOutput, RenderError>;

/// Callback invoked once with the finished task and its outcome.
pub type CompletionCallback = Box<dyn FnOnce(&RenderTask, &TaskOutcome) + Send + 'static>;

/// A cancellable unit of work that a scheduler can drive.
pub trait UnitOfWork: Send {
    /// Run the work to completion on the current thread.
    ///
    /// Calling `start` on work that has already run is a no-op.
    fn start(&mut self);

    /// Request cooperative cancellation.
    fn cancel(&self);

    /// Whether the work has reached a terminal state.
    fn is_done(&self) -> bool;
}

/// State shared between a task, its handle and its scheduler.
#[derive(Debug)]
pub(crate) struct TaskControl {
    pub(crate) id: TaskId,
    state: AtomicU8,
    /// Set once the outcome has been handed to the handle.
    published: AtomicBool,
    pub(crate) cancellation: CancellationToken,
}

impl TaskControl {
    fn new() -> Self {
        Self {
            id: TaskId::next(),
            state: AtomicU8::new(TaskState::Created as u8),
            published: AtomicBool::new(false),
            cancellation: CancellationToken::new(),
        }
    }

    pub(crate) fn state(&self) -> TaskState {
        TaskState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Move to `to` if the current state is `from`.
    pub(crate) fn transition(&self, from: TaskState, to: TaskState) -> bool {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    fn set(&self, to: TaskState) {
        self.state.store(to as u8, Ordering::Release);
    }

    fn publish(&self) {
        self.published.store(true, Ordering::Release);
    }

    fn is_published(&self) -> bool {
        self.published.load(Ordering::Acquire)
    }
}

/// An asynchronous job that renders frames of an asset into a rectangle.
///
/// The asset and target frame are fixed at construction. Options and the
/// completion callback can be changed until the task is submitted;
/// submission moves the task, so nothing can be reassigned while it runs.
pub struct RenderTask {
    control: Arc<TaskControl>,
    asset: Asset,
    indexes: Option<Vec<FrameIndex>>,
    target_frame: TargetFrame,
    options: RenderOptions,
    completion: Option<CompletionCallback>,
    outcome_sender: Option<Sender<TaskOutcome>>,
}

impl Debug for RenderTask {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("RenderTask")
            .field("id", &self.control.id)
            .field("state", &self.control.state())
            .field("asset", &self.asset)
            .field("indexes", &self.indexes)
            .field("target_frame", &self.target_frame)
            .field("options", &self.options)
            .field("has_completion", &self.completion.is_some())
            .finish_non_exhaustive()
    }
}

impl RenderTask {
    /// Create a task that renders the default frame (the first frame).
    pub fn new(asset: Asset, target_frame: TargetFrame) -> Self {
        Self::build(asset, None, target_frame)
    }

    /// Create a task that renders one output per entry of `indexes`.
    ///
    /// An empty list is allowed; such a task completes successfully with
    /// no frames and never opens a decoder.
    pub fn with_indexes<I>(asset: Asset, indexes: I, target_frame: TargetFrame) -> Self
    where
        I: IntoIterator,
        I::Item: Into<FrameIndex>,
    {
        let indexes = indexes.into_iter().map(Into::into).collect();
        Self::build(asset, Some(indexes), target_frame)
    }

    fn build(asset: Asset, indexes: Option<Vec<FrameIndex>>, target_frame: TargetFrame) -> Self {
        Self {
            control: Arc::new(TaskControl::new()),
            asset,
            indexes,
            target_frame,
            options: RenderOptions::default(),
            completion: None,
            outcome_sender: None,
        }
    }

    /// Replace the render options.
    #[must_use]
    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    /// Set the completion callback, replacing any previous one.
    #[must_use]
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(&RenderTask, &TaskOutcome) + Send + 'static,
    {
        self.set_completion(callback);
        self
    }

    /// Set the completion callback in place, replacing any previous one.
    pub fn set_completion<F>(&mut self, callback: F)
    where
        F: FnOnce(&RenderTask, &TaskOutcome) + Send + 'static,
    {
        self.completion = Some(Box::new(callback));
    }

    /// Remove the completion callback.
    pub fn clear_completion(&mut self) {
        self.completion = None;
    }

    /// Whether a completion callback is set.
    pub fn has_completion(&self) -> bool {
        self.completion.is_some()
    }

    /// This task's identifier.
    pub fn id(&self) -> TaskId {
        self.control.id
    }

    /// The asset frames are read from.
    pub fn asset(&self) -> &Asset {
        &self.asset
    }

    /// The requested indexes, or `None` for the default single frame.
    pub fn indexes(&self) -> Option<&[FrameIndex]> {
        self.indexes.as_deref()
    }

    /// The rectangle output is rendered for.
    pub fn target_frame(&self) -> TargetFrame {
        self.target_frame
    }

    /// The render options.
    pub fn options(&self) -> &RenderOptions {
        &self.options
    }

    /// Current lifecycle state.
    pub fn state(&self) -> TaskState {
        self.control.state()
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.control.cancellation.is_cancelled()
    }

    /// A clone of the task's cancellation token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.control.cancellation.clone()
    }

    /// Create a handle that will receive this task's outcome.
    ///
    /// Only the most recently created handle receives the outcome; earlier
    /// handles resolve to [`RenderError::TaskDropped`].
    pub fn handle(&mut self) -> TaskHandle {
        let (sender, receiver) = oneshot::channel();
        self.outcome_sender = Some(sender);
        TaskHandle {
            control: Arc::clone(&self.control),
            receiver: Some(receiver),
        }
    }

    /// Run the task on the current thread and return its outcome directly.
    ///
    /// The completion callback still fires. A handle created earlier is not
    /// resolved with the outcome and reports [`RenderError::TaskDropped`].
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::AlreadySubmitted`] if the task has already
    /// run, otherwise the task's own outcome.
    pub fn run(mut self) -> TaskOutcome {
        self.outcome_sender = None;
        let outcome = self.execute();
        if outcome.is_some() {
            self.control.publish();
        }
        outcome.unwrap_or(Err(RenderError::AlreadySubmitted(self.control.id)))
    }

    pub(crate) fn control(&self) -> &Arc<TaskControl> {
        &self.control
    }

    /// Drive the task to a terminal state and invoke the callback.
    ///
    /// Returns `None` if the task was not in a runnable state.
    fn execute(&mut self) -> Option<TaskOutcome> {
        let id = self.control.id;
        let runnable = self.control.transition(TaskState::Created, TaskState::Running)
            || self.control.transition(TaskState::Scheduled, TaskState::Running);
        if !runnable {
            log::warn!(
                "Ignoring start of render task {id} in state {:?}",
                self.control.state()
            );
            return None;
        }

        log::debug!(
            "Render task {id} running ({} index(es), target {}x{})",
            self.indexes.as_ref().map_or(1, Vec::len),
            self.target_frame.width,
            self.target_frame.height,
        );

        let outcome = if self.is_cancelled() {
            Err(RenderError::Cancelled)
        } else {
            self.render()
        };

        let final_state = match &outcome {
            Ok(_) => TaskState::Completed,
            Err(RenderError::Cancelled) => TaskState::Cancelled,
            Err(_) => TaskState::Failed,
        };
        self.control.set(final_state);

        match &outcome {
            Ok(output) => log::debug!("Render task {id} completed with {} frame(s)", output.len()),
            Err(RenderError::Cancelled) => log::debug!("Render task {id} cancelled"),
            Err(error) => log::warn!("Render task {id} failed: {error}"),
        }

        if let Some(callback) = self.completion.take() {
            callback(&*self, &outcome);
        }

        Some(outcome)
    }

    fn render(&self) -> TaskOutcome {
        self.target_frame.validate()?;

        let metadata = self.asset.metadata();
        let options = &self.options;
        let requested: &[FrameIndex] = match &self.indexes {
            Some(indexes) => indexes,
            None => &[FrameIndex::DEFAULT],
        };

        let resolved = requested
            .iter()
            .map(|index| index.resolve(metadata, options.clamp_to_end))
            .collect::<Result<Vec<u64>, RenderError>>()?;

        let mut output = RenderOutput {
            target_frame: self.target_frame,
            frames: Vec::with_capacity(resolved.len()),
            pixel_format: options.pixel_format,
            background: options.background,
            filter: options.filter,
        };
        if resolved.is_empty() {
            return Ok(output);
        }

        let mut unique = resolved.clone();
        unique.sort_unstable();
        unique.dedup();

        let (width, height) = self.target_frame.pixel_size();
        let total = Some(unique.len() as u64);
        let mut decode_tracker = PhaseTracker::new(
            Arc::clone(&options.progress),
            self.control.id,
            OperationType::FrameDecode,
            total,
            options.batch_size,
        );
        let mut fit_tracker = PhaseTracker::new(
            Arc::clone(&options.progress),
            self.control.id,
            OperationType::Fitting,
            total,
            options.batch_size,
        );

        let mut fitted: HashMap<u64, DynamicImage> = HashMap::with_capacity(unique.len());
        let mut reader = self.asset.open_reader()?;
        reader.read_frames(
            &unique,
            options.pixel_format,
            &self.control.cancellation,
            &mut |frame_number, image| {
                decode_tracker.record(frame_number);
                let image = fit_image(
                    &image,
                    width,
                    height,
                    options.content_mode,
                    options.filter,
                    options.background,
                )?;
                fit_tracker.record(frame_number);
                fitted.insert(frame_number, image);
                Ok(())
            },
        )?;
        decode_tracker.flush();
        fit_tracker.flush();

        for (index, frame_number) in requested.iter().zip(resolved) {
            let image = fitted.get(&frame_number).cloned().ok_or_else(|| {
                RenderError::VideoDecodeError(format!(
                    "Frame source produced no image for frame {frame_number}"
                ))
            })?;
            output.frames.push(RenderedFrame {
                index: *index,
                frame_number,
                timestamp: metadata.frame_timestamp(frame_number),
                image,
            });
        }

        Ok(output)
    }
}

impl UnitOfWork for RenderTask {
    fn start(&mut self) {
        if let Some(outcome) = self.execute() {
            if let Some(sender) = self.outcome_sender.take() {
                // The handle may have been dropped; nobody is waiting then.
                let _ = sender.send(outcome);
            }
            self.control.publish();
        }
    }

    fn cancel(&self) {
        self.control.cancellation.cancel();
    }

    fn is_done(&self) -> bool {
        self.control.state().is_terminal()
    }
}

/// Receives the outcome of a submitted [`RenderTask`].
///
/// Supports blocking ([`wait`](TaskHandle::wait)), polling
/// ([`try_outcome`](TaskHandle::try_outcome)) and `.await`.
pub struct TaskHandle {
    control: Arc<TaskControl>,
    receiver: Option<Receiver<TaskOutcome>>,
}

impl Debug for TaskHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("TaskHandle")
            .field("id", &self.control.id)
            .field("state", &self.control.state())
            .field("outcome_taken", &self.receiver.is_none())
            .finish()
    }
}

impl TaskHandle {
    /// Identifier of the task this handle belongs to.
    pub fn id(&self) -> TaskId {
        self.control.id
    }

    /// Current lifecycle state of the task, as seen from the handle.
    ///
    /// A task whose completion callback is still running reports
    /// [`TaskState::Running`] here; the terminal state becomes visible
    /// together with the outcome.
    pub fn state(&self) -> TaskState {
        match self.control.state() {
            state if state.is_terminal() && !self.control.is_published() => TaskState::Running,
            state => state,
        }
    }

    /// Whether the outcome is ready to be taken.
    ///
    /// Once this returns `true`, [`try_outcome`](TaskHandle::try_outcome)
    /// yields `Some` (unless it already has).
    pub fn is_done(&self) -> bool {
        self.control.is_published()
    }

    /// Request cooperative cancellation of the task.
    ///
    /// A task cancelled before it starts never decodes; a running task stops
    /// at the next frame boundary. Either way the outcome is
    /// `Err(RenderError::Cancelled)`.
    pub fn cancel(&self) {
        self.control.cancellation.cancel();
    }

    /// A clone of the task's cancellation token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.control.cancellation.clone()
    }

    /// Block until the task finishes and return its outcome.
    ///
    /// # Errors
    ///
    /// Returns the task's error, [`RenderError::TaskDropped`] if the task was
    /// dropped without running, or [`RenderError::OutcomeTaken`] if the
    /// outcome was already retrieved through
    /// [`try_outcome`](TaskHandle::try_outcome).
    ///
    /// # Panics
    ///
    /// Panics if called from within an asynchronous execution context; use
    /// `.await` there instead.
    pub fn wait(mut self) -> TaskOutcome {
        match self.receiver.take() {
            Some(receiver) => receiver
                .blocking_recv()
                .unwrap_or_else(|_| Err(RenderError::TaskDropped)),
            None => Err(RenderError::OutcomeTaken),
        }
    }

    /// Return the outcome if the task has finished, without blocking.
    ///
    /// Yields `Some` at most once.
    pub fn try_outcome(&mut self) -> Option<TaskOutcome> {
        let receiver = self.receiver.as_mut()?;
        let outcome = match receiver.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return None,
            Err(TryRecvError::Closed) => Err(RenderError::TaskDropped),
        };
        self.receiver = None;
        Some(outcome)
    }
}

impl Future for TaskHandle {
    type Output = TaskOutcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let Some(receiver) = self.receiver.as_mut() else {
            return Poll::Ready(Err(RenderError::OutcomeTaken));
        };
        let poll = Pin::new(receiver).poll(cx);
        match poll {
            Poll::Ready(result) => {
                self.receiver = None;
                Poll::Ready(result.unwrap_or_else(|_| Err(RenderError::TaskDropped)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
