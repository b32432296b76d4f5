//! Shared handles to media resources.

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::path::Path;
use std::sync::Arc;

use crate::error::RenderError;
use crate::ffmpeg_source::FfmpegSource;
use crate::metadata::VideoMetadata;
use crate::source::{FrameReader, FrameSource};

/// An opaque, read-only handle to a video resource.
///
/// Cloning is cheap and every clone refers to the same resource, so one
/// asset can back any number of concurrently running
/// [`RenderTask`](crate::RenderTask)s.
///
/// # Example
///
/// ```no_run
/// use framestrip::{Asset, RenderError};
///
/// let asset = Asset::open("input.mp4")?;
/// println!("{:?}", asset.metadata().duration);
/// # Ok::<(), RenderError>(())
/// ```
#[derive(Clone)]
pub struct Asset {
    source: Arc<dyn FrameSource>,
}

impl Debug for Asset {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("Asset").field("source", &self.source).finish()
    }
}

impl Asset {
    /// Open a video file through FFmpeg and cache its metadata.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::FileOpen`] if the file cannot be opened and
    /// [`RenderError::NoVideoStream`] if it has no video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RenderError> {
        Ok(Self::from_source(FfmpegSource::open(path)?))
    }

    /// Wrap a custom [`FrameSource`].
    pub fn from_source<S: FrameSource + 'static>(source: S) -> Self {
        Self {
            source: Arc::new(source),
        }
    }

    /// Metadata of the video stream.
    pub fn metadata(&self) -> &VideoMetadata {
        self.source.metadata()
    }

    /// Filesystem path of the resource, if it has one.
    pub fn path(&self) -> Option<&Path> {
        self.source.path()
    }

    /// Whether two handles refer to the same underlying resource.
    pub fn ptr_eq(&self, other: &Asset) -> bool {
        Arc::ptr_eq(&self.source, &other.source)
    }

    pub(crate) fn open_reader(&self) -> Result<Box<dyn FrameReader>, RenderError> {
        self.source.open_reader()
    }
}
