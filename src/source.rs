//! The frame generation seam.
//!
//! An [`Asset`](crate::Asset) wraps a [`FrameSource`]. The source knows the
//! video's metadata and hands out [`FrameReader`]s; every render task opens
//! its own reader so tasks sharing one asset never share decoder state.
//!
//! The FFmpeg-backed implementation lives in [`crate::ffmpeg_source`].
//! Custom sources (pre-decoded frames, remote previews, test fixtures) plug
//! in through [`Asset::from_source`](crate::Asset::from_source).

use std::fmt::Debug;
use std::path::Path;

use image::DynamicImage;

use crate::configuration::PixelFormat;
use crate::error::RenderError;
use crate::metadata::VideoMetadata;
use crate::progress::CancellationToken;

/// Callback receiving `(requested_frame_number, image)` pairs.
pub type FrameHandler<'a> = dyn FnMut(u64, DynamicImage) -> Result<(), RenderError> + 'a;

/// A read-only media resource that can produce decoded frames.
pub trait FrameSource: Send + Sync + Debug {
    /// Cached metadata of the video stream.
    fn metadata(&self) -> &VideoMetadata;

    /// Filesystem location of the resource, if it has one.
    fn path(&self) -> Option<&Path> {
        None
    }

    /// Open an independent reader.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying resource cannot be opened.
    fn open_reader(&self) -> Result<Box<dyn FrameReader>, RenderError>;
}

/// A single-use decoding session over a [`FrameSource`].
pub trait FrameReader {
    /// Decode the frames at `frame_numbers` and pass each to `handler`.
    ///
    /// `frame_numbers` is sorted ascending with no duplicates. Readers call
    /// `handler` exactly once per entry, in order, with an image in
    /// `pixel_format`. They must check `cancellation` between frames and
    /// return [`RenderError::Cancelled`] once it fires.
    ///
    /// # Errors
    ///
    /// Returns the first decoding error, cancellation, or error returned by
    /// `handler`.
    fn read_frames(
        &mut self,
        frame_numbers: &[u64],
        pixel_format: PixelFormat,
        cancellation: &CancellationToken,
        handler: &mut FrameHandler<'_>,
    ) -> Result<(), RenderError>;
}
