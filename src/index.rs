//! Frame positions to render.
//!
//! A render task carries an optional list of [`FrameIndex`] values. Each one
//! is resolved against the asset's [`VideoMetadata`] to a concrete frame
//! number before decoding starts.

use std::time::Duration;

use crate::error::RenderError;
use crate::geometry::TargetFrame;
use crate::metadata::VideoMetadata;

/// A position inside a video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameIndex {
    /// A 0-based frame number.
    Frame(u64),
    /// A presentation time from the start of the video.
    Timestamp(Duration),
}

impl FrameIndex {
    /// The index used when a task is created without an explicit list.
    pub const DEFAULT: FrameIndex = FrameIndex::Frame(0);

    /// Resolve to a frame number.
    ///
    /// Timestamps are converted with the stream frame rate, truncating. A
    /// timestamp exactly at the end of the video maps to the last frame.
    ///
    /// # Errors
    ///
    /// Unless `clamp_to_end` is set, returns
    /// [`RenderError::FrameOutOfRange`] for frame numbers past the known
    /// frame count and [`RenderError::InvalidTimestamp`] for timestamps past
    /// the duration.
    pub fn resolve(&self, metadata: &VideoMetadata, clamp_to_end: bool) -> Result<u64, RenderError> {
        let total_frames = metadata.frame_count;
        let last_frame = total_frames.saturating_sub(1);

        match *self {
            FrameIndex::Frame(frame_number) => {
                if total_frames > 0 && frame_number >= total_frames {
                    if clamp_to_end {
                        return Ok(last_frame);
                    }
                    return Err(RenderError::FrameOutOfRange {
                        frame_number,
                        total_frames,
                    });
                }
                Ok(frame_number)
            }
            FrameIndex::Timestamp(timestamp) => {
                let duration = metadata.duration;
                let timestamp = if !duration.is_zero() && timestamp > duration {
                    if !clamp_to_end {
                        return Err(RenderError::InvalidTimestamp(timestamp));
                    }
                    duration
                } else {
                    timestamp
                };

                let frame_number = timestamp_to_frame_number(timestamp, metadata.frames_per_second);
                if total_frames > 0 {
                    Ok(frame_number.min(last_frame))
                } else {
                    Ok(frame_number)
                }
            }
        }
    }
}

impl From<u64> for FrameIndex {
    fn from(frame_number: u64) -> Self {
        FrameIndex::Frame(frame_number)
    }
}

impl From<Duration> for FrameIndex {
    fn from(timestamp: Duration) -> Self {
        FrameIndex::Timestamp(timestamp)
    }
}

/// Convert a [`Duration`] to a frame number using the video's frame rate.
pub(crate) fn timestamp_to_frame_number(timestamp: Duration, frames_per_second: f64) -> u64 {
    if frames_per_second <= 0.0 {
        return 0;
    }
    (timestamp.as_secs_f64() * frames_per_second) as u64
}

/// `count` frame numbers spread evenly from the start of the video.
///
/// When the frame count is unknown only the first frame is returned. The
/// result never contains more entries than the video has frames.
///
/// # Example
///
/// ```
/// use std::time::Duration;
///
/// use framestrip::{FrameIndex, VideoMetadata, evenly_spaced};
///
/// let metadata = VideoMetadata {
///     width: 640,
///     height: 480,
///     frames_per_second: 30.0,
///     frame_count: 100,
///     duration: Duration::from_secs_f64(100.0 / 30.0),
///     codec: "h264".to_string(),
///     stream_index: 0,
/// };
/// let indexes = evenly_spaced(4, &metadata);
/// assert_eq!(indexes, vec![
///     FrameIndex::Frame(0),
///     FrameIndex::Frame(25),
///     FrameIndex::Frame(50),
///     FrameIndex::Frame(75),
/// ]);
/// ```
pub fn evenly_spaced(count: u32, metadata: &VideoMetadata) -> Vec<FrameIndex> {
    let frame_count = metadata.frame_count;
    if frame_count == 0 || count == 0 {
        return vec![FrameIndex::DEFAULT];
    }

    let count = (count as u64).min(frame_count);
    let step = if frame_count > count {
        frame_count / count
    } else {
        1
    };
    (0..count)
        .map(|index| index * step)
        .filter(|number| *number < frame_count)
        .map(FrameIndex::Frame)
        .collect()
}

/// Number of aspect-preserving thumbnails of the target's height that are
/// needed to cover the target's width.
///
/// Never more than the target's pixel width, so every thumbnail gets at
/// least one column in [`RenderOutput::strip`](crate::RenderOutput::strip).
pub fn strip_thumbnail_count(metadata: &VideoMetadata, target: &TargetFrame) -> u32 {
    if !(target.width > 0.0 && target.height > 0.0) {
        return 1;
    }
    let thumbnail_width = target.height * metadata.aspect_ratio();
    let count = (target.width / thumbnail_width).ceil();
    if count.is_finite() {
        count.clamp(1.0, target.pixel_size().0 as f64) as u32
    } else {
        1
    }
}

/// Evenly spaced indexes for a scrubber strip filling `target`.
///
/// Combines [`strip_thumbnail_count`] and [`evenly_spaced`].
pub fn strip_indexes(metadata: &VideoMetadata, target: &TargetFrame) -> Vec<FrameIndex> {
    evenly_spaced(strip_thumbnail_count(metadata, target), metadata)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_frame_rate_maps_to_first_frame() {
        assert_eq!(timestamp_to_frame_number(Duration::from_secs(4), 0.0), 0);
    }

    #[test]
    fn timestamp_conversion_truncates() {
        assert_eq!(timestamp_to_frame_number(Duration::from_millis(1010), 30.0), 30);
    }
}
