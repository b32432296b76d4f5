//! # framestrip
//!
//! Cancellable render tasks that extract video frames and fit them into a
//! target rectangle, for scrubber strips and thumbnail previews.
//!
//! A [`RenderTask`] pairs an [`Asset`] with a [`TargetFrame`] and an
//! optional list of [`FrameIndex`] values. Submit it to a [`RenderQueue`]
//! (or run it directly) and receive exactly one [`TaskOutcome`], through a
//! completion callback, a [`TaskHandle`], or both. Decoding is powered by
//! FFmpeg via the [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next)
//! crate; frames are returned as [`image::DynamicImage`] values.
//!
//! ## Quick Start
//!
//! ### Render a single thumbnail
//!
//! ```no_run
//! use framestrip::{Asset, RenderTask, TargetFrame};
//!
//! let asset = Asset::open("input.mp4")?;
//! let output = RenderTask::new(asset, TargetFrame::from_size(320.0, 180.0)).run()?;
//! output.frames()[0].image.save("thumb.png")?;
//! # Ok::<(), framestrip::RenderError>(())
//! ```
//!
//! ### Render a scrubber strip on a worker pool
//!
//! ```no_run
//! use framestrip::{Asset, RenderQueue, RenderTask, TargetFrame, strip_indexes};
//!
//! let asset = Asset::open("input.mp4")?;
//! let target = TargetFrame::new(0.0, 0.0, 960.0, 54.0);
//! let indexes = strip_indexes(asset.metadata(), &target);
//!
//! let queue = RenderQueue::new()?;
//! let handle = queue.submit(RenderTask::with_indexes(asset, indexes, target))?;
//! handle.wait()?.strip()?.save("strip.png")?;
//! # Ok::<(), framestrip::RenderError>(())
//! ```
//!
//! ### Cancel
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use framestrip::{Asset, RenderError, RenderQueue, RenderTask, TargetFrame};
//!
//! let asset = Asset::open("input.mp4")?;
//! let queue = RenderQueue::new()?;
//! let handle = queue.submit(RenderTask::with_indexes(
//!     asset,
//!     (0..600).map(Duration::from_secs),
//!     TargetFrame::from_size(64.0, 36.0),
//! ))?;
//! handle.cancel();
//! assert!(matches!(handle.wait(), Err(RenderError::Cancelled) | Ok(_)));
//! # Ok::<(), RenderError>(())
//! ```
//!
//! ## Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `async` | `spawn_render` and `OutcomeStream` on top of Tokio |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod asset;
pub mod configuration;
pub mod error;
pub mod ffmpeg;
pub mod ffmpeg_source;
pub mod geometry;
pub mod index;
pub mod metadata;
pub mod output;
pub mod progress;
pub mod queue;
pub mod source;
#[cfg(feature = "async")]
pub mod stream;
pub mod task;

pub use asset::Asset;
pub use configuration::{ContentMode, PixelFormat, RenderOptions, ScaleFilter};
pub use error::RenderError;
pub use ffmpeg::{FfmpegLogLevel, set_ffmpeg_log_level};
pub use ffmpeg_source::FfmpegSource;
pub use geometry::{MAX_TARGET_PIXELS, TargetFrame, fit_image};
pub use index::{FrameIndex, evenly_spaced, strip_indexes, strip_thumbnail_count};
pub use metadata::VideoMetadata;
pub use output::{RenderOutput, RenderedFrame};
pub use progress::{CancellationToken, OperationType, ProgressCallback, ProgressInfo};
pub use queue::{QueueOptions, RenderQueue};
pub use source::{FrameHandler, FrameReader, FrameSource};
#[cfg(feature = "async")]
pub use stream::{OutcomeStream, spawn_render};
pub use task::{
    CompletionCallback, RenderTask, TaskHandle, TaskId, TaskOutcome, TaskState, UnitOfWork,
};
