//! Shared helpers for integration tests.
//!
//! [`SyntheticSource`] produces solid-colour frames whose colour encodes the
//! frame number, so tests can check which frame ended up where without
//! decoding anything. [`encoded`] writes a real video for the FFmpeg path.

#![allow(dead_code)]

pub mod encoded;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use framestrip::{
    Asset, CancellationToken, FrameHandler, FrameReader, FrameSource, PixelFormat, RenderError,
    VideoMetadata,
};
use image::{DynamicImage, Rgb, RgbImage};

pub fn synthetic_metadata(frame_count: u64) -> VideoMetadata {
    let frames_per_second = 30.0;
    VideoMetadata {
        width: 64,
        height: 36,
        frames_per_second,
        frame_count,
        duration: Duration::from_secs_f64(frame_count as f64 / frames_per_second),
        codec: "synthetic".to_string(),
        stream_index: 0,
    }
}

/// The colour every pixel of `frame_number` has.
pub fn frame_colour(frame_number: u64) -> [u8; 3] {
    [
        (frame_number % 256) as u8,
        ((frame_number / 256) % 256) as u8,
        128,
    ]
}

#[derive(Debug, Default)]
struct Activity {
    opened: AtomicUsize,
    reads: Mutex<Vec<Vec<u64>>>,
}

/// An in-memory frame source with optional per-frame delay and failure
/// injection. Clones share the same activity log.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    metadata: VideoMetadata,
    delay: Duration,
    fail_at: Option<u64>,
    activity: Arc<Activity>,
}

impl SyntheticSource {
    pub fn new(frame_count: u64) -> Self {
        Self {
            metadata: synthetic_metadata(frame_count),
            delay: Duration::ZERO,
            fail_at: None,
            activity: Arc::new(Activity::default()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn failing_at(mut self, frame_number: u64) -> Self {
        self.fail_at = Some(frame_number);
        self
    }

    pub fn asset(&self) -> Asset {
        Asset::from_source(self.clone())
    }

    /// Number of readers opened so far.
    pub fn open_count(&self) -> usize {
        self.activity.opened.load(Ordering::SeqCst)
    }

    /// Frame number lists passed to `read_frames`, one entry per call.
    pub fn reads(&self) -> Vec<Vec<u64>> {
        self.activity.reads.lock().unwrap().clone()
    }
}

impl FrameSource for SyntheticSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn open_reader(&self) -> Result<Box<dyn FrameReader>, RenderError> {
        self.activity.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(SyntheticReader {
            source: self.clone(),
        }))
    }
}

struct SyntheticReader {
    source: SyntheticSource,
}

impl FrameReader for SyntheticReader {
    fn read_frames(
        &mut self,
        frame_numbers: &[u64],
        pixel_format: PixelFormat,
        cancellation: &CancellationToken,
        handler: &mut FrameHandler<'_>,
    ) -> Result<(), RenderError> {
        self.source
            .activity
            .reads
            .lock()
            .unwrap()
            .push(frame_numbers.to_vec());

        let metadata = &self.source.metadata;
        for &frame_number in frame_numbers {
            if cancellation.is_cancelled() {
                return Err(RenderError::Cancelled);
            }
            if !self.source.delay.is_zero() {
                thread::sleep(self.source.delay);
            }
            if self.source.fail_at == Some(frame_number) {
                return Err(RenderError::VideoDecodeError(format!(
                    "synthetic failure at frame {frame_number}"
                )));
            }

            let rgb = RgbImage::from_pixel(
                metadata.width,
                metadata.height,
                Rgb(frame_colour(frame_number)),
            );
            let image = match pixel_format {
                PixelFormat::Rgb8 => DynamicImage::ImageRgb8(rgb),
                PixelFormat::Rgba8 => DynamicImage::ImageRgba8(DynamicImage::ImageRgb8(rgb).to_rgba8()),
                PixelFormat::Gray8 => DynamicImage::ImageLuma8(DynamicImage::ImageRgb8(rgb).to_luma8()),
            };
            handler(frame_number, image)?;
        }
        Ok(())
    }
}
