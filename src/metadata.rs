//! Video stream metadata.
//!
//! Metadata is extracted once when an [`Asset`](crate::Asset) is opened and
//! cached for the lifetime of the asset. Render tasks use it to resolve
//! timestamps to frame numbers and to reject out-of-range requests before
//! any decoding happens.

use std::time::Duration;

/// Metadata for the video stream of an asset.
///
/// # Example
///
/// ```no_run
/// use framestrip::Asset;
///
/// let asset = Asset::open("input.mp4").unwrap();
/// let video = asset.metadata();
/// println!("{}x{} @ {:.2} fps", video.width, video.height, video.frames_per_second);
/// ```
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second (may be approximate for variable-frame-rate content).
    pub frames_per_second: f64,
    /// Estimated total number of frames, computed from duration and frame rate.
    ///
    /// Zero when the container does not report enough information.
    pub frame_count: u64,
    /// Total duration of the asset.
    pub duration: Duration,
    /// Codec name (e.g. `"h264"`, `"vp9"`, `"av1"`).
    pub codec: String,
    /// Index of the video stream inside the container.
    pub stream_index: usize,
}

impl VideoMetadata {
    /// Width divided by height, or `1.0` when either dimension is unknown.
    pub fn aspect_ratio(&self) -> f64 {
        if self.width == 0 || self.height == 0 {
            1.0
        } else {
            self.width as f64 / self.height as f64
        }
    }

    /// Presentation time of `frame_number` derived from the frame rate.
    ///
    /// Saturates at [`Duration::MAX`] for frame numbers too large to
    /// represent.
    pub fn frame_timestamp(&self, frame_number: u64) -> Duration {
        if self.frames_per_second > 0.0 {
            Duration::try_from_secs_f64(frame_number as f64 / self.frames_per_second)
                .unwrap_or(Duration::MAX)
        } else {
            Duration::ZERO
        }
    }
}
