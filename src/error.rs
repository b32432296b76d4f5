//! Error types for the `framestrip` crate.
//!
//! [`RenderError`] is the single error type used throughout the crate. It is
//! returned synchronously by submission APIs and delivered asynchronously as
//! the failure side of a [`TaskOutcome`](crate::TaskOutcome).

use std::{io::Error as IoError, path::PathBuf, time::Duration};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use thiserror::Error;

use crate::task::TaskId;

/// The unified error type for all `framestrip` operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RenderError {
    /// The media file could not be opened or probed.
    #[error("Failed to open media file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to [`Asset::open`](crate::Asset::open).
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The asset does not contain a video stream.
    #[error("No video stream found in asset")]
    NoVideoStream,

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// The requested frame number exceeds the total frame count.
    #[error("Frame {frame_number} is out of range (video has {total_frames} frames)")]
    FrameOutOfRange {
        /// The frame number that was requested.
        frame_number: u64,
        /// The total number of frames in the video.
        total_frames: u64,
    },

    /// The requested timestamp exceeds the media duration.
    #[error("Invalid timestamp: {0:?}")]
    InvalidTimestamp(Duration),

    /// The target rectangle has a non-positive or non-finite dimension, or
    /// covers more than [`MAX_TARGET_PIXELS`](crate::MAX_TARGET_PIXELS).
    #[error("Invalid target frame: {width}x{height} at ({x}, {y})")]
    InvalidTargetFrame {
        /// Horizontal origin of the rejected rectangle.
        x: f64,
        /// Vertical origin of the rejected rectangle.
        y: f64,
        /// Width of the rejected rectangle.
        width: f64,
        /// Height of the rejected rectangle.
        height: f64,
    },

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading or writing files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate while fitting or compositing frames.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// The task was cancelled through its
    /// [`CancellationToken`](crate::CancellationToken).
    #[error("Render task cancelled")]
    Cancelled,

    /// The task has already been scheduled or run.
    #[error("Render task {0} has already been submitted")]
    AlreadySubmitted(TaskId),

    /// The task was dropped before it produced an outcome.
    #[error("Render task was dropped before completing")]
    TaskDropped,

    /// The outcome was already taken from the handle.
    #[error("Render task outcome was already retrieved")]
    OutcomeTaken,

    /// The worker pool could not be created.
    #[error("Failed to build render queue: {0}")]
    QueueBuild(String),
}

impl From<FfmpegError> for RenderError {
    fn from(error: FfmpegError) -> Self {
        RenderError::FfmpegError(error.to_string())
    }
}
