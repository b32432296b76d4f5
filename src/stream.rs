//! Async adapters for render tasks.
//!
//! [`TaskHandle`] already implements [`Future`](std::future::Future), so a
//! task submitted to a [`RenderQueue`](crate::RenderQueue) can simply be
//! awaited. This module adds two Tokio-specific helpers:
//!
//! - [`spawn_render`] runs a task on Tokio's blocking thread pool instead of
//!   a `RenderQueue`, keeping CPU-heavy decoding off the async workers.
//! - [`OutcomeStream`] yields the outcomes of many handles in completion
//!   order.
//!
//! # Example
//!
//! ```no_run
//! use tokio_stream::StreamExt;
//!
//! use framestrip::{Asset, OutcomeStream, RenderTask, TargetFrame, spawn_render};
//!
//! # async fn example() -> Result<(), framestrip::RenderError> {
//! let asset = Asset::open("input.mp4")?;
//! let mut handles = Vec::new();
//! for frame in [0_u64, 30, 60] {
//!     let task = RenderTask::with_indexes(asset.clone(), [frame], TargetFrame::from_size(64.0, 36.0));
//!     handles.push(spawn_render(task)?);
//! }
//!
//! let mut outcomes = OutcomeStream::new(handles);
//! while let Some((id, outcome)) = outcomes.next().await {
//!     println!("task {id}: {} frame(s)", outcome?.len());
//! }
//! # Ok(())
//! # }
//! ```

use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio_stream::Stream;

use crate::error::RenderError;
use crate::task::{RenderTask, TaskHandle, TaskId, TaskOutcome, TaskState, UnitOfWork};

/// Run `task` on Tokio's blocking pool and return its handle.
///
/// Must be called from within a Tokio runtime.
///
/// # Errors
///
/// Returns [`RenderError::AlreadySubmitted`] if the task has already been
/// scheduled or run.
pub fn spawn_render(mut task: RenderTask) -> Result<TaskHandle, RenderError> {
    let id = task.id();
    if !task
        .control()
        .transition(TaskState::Created, TaskState::Scheduled)
    {
        return Err(RenderError::AlreadySubmitted(id));
    }

    let handle = task.handle();
    tokio::task::spawn_blocking(move || task.start());
    log::debug!("Render task {id} spawned on the blocking pool");
    Ok(handle)
}

/// A stream of `(TaskId, TaskOutcome)` pairs in completion order.
///
/// Each handle is awaited on its own Tokio task; the stream ends once every
/// handle has resolved.
pub struct OutcomeStream {
    receiver: UnboundedReceiver<(TaskId, TaskOutcome)>,
}

impl OutcomeStream {
    /// Start awaiting `handles`. Must be called from within a Tokio runtime.
    pub fn new<I>(handles: I) -> Self
    where
        I: IntoIterator<Item = TaskHandle>,
    {
        let (sender, receiver) = mpsc::unbounded_channel();
        for handle in handles {
            let sender = sender.clone();
            tokio::spawn(async move {
                let id = handle.id();
                let outcome = handle.await;
                // The stream may have been dropped; the outcome is discarded then.
                let _ = sender.send((id, outcome));
            });
        }
        Self { receiver }
    }
}

impl Stream for OutcomeStream {
    type Item = (TaskId, TaskOutcome);

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}
