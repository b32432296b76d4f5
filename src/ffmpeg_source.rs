//! FFmpeg-backed [`FrameSource`].
//!
//! [`FfmpegSource`] probes a file once and caches its video metadata.
//! Each [`FrameReader`] it opens owns a fresh demuxer, decoder and scaler,
//! seeks to the nearest keyframe before the first requested frame, then
//! decodes forward through all requested frames in one pass.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ffmpeg_next::{
    Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
};
use image::{DynamicImage, GrayImage, RgbImage, RgbaImage};

use crate::configuration::PixelFormat;
use crate::error::RenderError;
use crate::metadata::VideoMetadata;
use crate::progress::CancellationToken;
use crate::source::{FrameHandler, FrameReader, FrameSource};

/// A video file decoded through FFmpeg.
#[derive(Debug, Clone)]
pub struct FfmpegSource {
    path: PathBuf,
    metadata: VideoMetadata,
}

impl FfmpegSource {
    /// Open `path`, locate the best video stream and cache its metadata.
    ///
    /// Initialises FFmpeg on first use (safe to call repeatedly).
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::FileOpen`] if FFmpeg cannot open or parse the
    /// file, or [`RenderError::NoVideoStream`] if there is no video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, RenderError> {
        let path = path.as_ref().to_path_buf();
        log::debug!("Probing asset: {}", path.display());

        ffmpeg_next::init().map_err(|error| RenderError::FileOpen {
            path: path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| RenderError::FileOpen {
                path: path.clone(),
                reason: error.to_string(),
            })?;

        let metadata = probe_video(&input_context).map_err(|error| match error {
            RenderError::NoVideoStream => RenderError::NoVideoStream,
            other => RenderError::FileOpen {
                path: path.clone(),
                reason: other.to_string(),
            },
        })?;

        log::info!(
            "Opened asset: {} ({}x{}, {:.2} fps, ~{} frames, {:.2}s, codec={})",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.frames_per_second,
            metadata.frame_count,
            metadata.duration.as_secs_f64(),
            metadata.codec,
        );

        Ok(Self { path, metadata })
    }
}

impl FrameSource for FfmpegSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn path(&self) -> Option<&Path> {
        Some(&self.path)
    }

    fn open_reader(&self) -> Result<Box<dyn FrameReader>, RenderError> {
        let input_context =
            ffmpeg_next::format::input(&self.path).map_err(|error| RenderError::FileOpen {
                path: self.path.clone(),
                reason: error.to_string(),
            })?;
        Ok(Box::new(FfmpegReader {
            input_context,
            metadata: self.metadata.clone(),
        }))
    }
}

fn probe_video(input_context: &Input) -> Result<VideoMetadata, RenderError> {
    let stream = input_context
        .streams()
        .best(Type::Video)
        .ok_or(RenderError::NoVideoStream)?;
    let stream_index = stream.index();

    let decoder_context = CodecContext::from_parameters(stream.parameters())?;
    let video_decoder = decoder_context.decoder().video()?;

    let duration_microseconds = input_context.duration();
    let duration = if duration_microseconds > 0 {
        Duration::from_micros(duration_microseconds as u64)
    } else {
        Duration::ZERO
    };

    let frames_per_second = rational_to_f64(stream.avg_frame_rate())
        .or_else(|| rational_to_f64(stream.rate()))
        .unwrap_or(0.0);

    let frame_count = if stream.frames() > 0 {
        stream.frames() as u64
    } else if frames_per_second > 0.0 {
        (duration.as_secs_f64() * frames_per_second) as u64
    } else {
        0
    };

    let codec = video_decoder
        .codec()
        .map(|codec| codec.name().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    Ok(VideoMetadata {
        width: video_decoder.width(),
        height: video_decoder.height(),
        frames_per_second,
        frame_count,
        duration,
        codec,
        stream_index,
    })
}

fn rational_to_f64(rate: Rational) -> Option<f64> {
    if rate.denominator() != 0 && rate.numerator() > 0 {
        Some(rate.numerator() as f64 / rate.denominator() as f64)
    } else {
        None
    }
}

/// One decoding session over an FFmpeg input.
struct FfmpegReader {
    input_context: Input,
    metadata: VideoMetadata,
}

impl FrameReader for FfmpegReader {
    fn read_frames(
        &mut self,
        frame_numbers: &[u64],
        pixel_format: PixelFormat,
        cancellation: &CancellationToken,
        handler: &mut FrameHandler<'_>,
    ) -> Result<(), RenderError> {
        let Some(&first_frame) = frame_numbers.first() else {
            return Ok(());
        };

        let stream_index = self.metadata.stream_index;
        let frames_per_second = self.metadata.frames_per_second;

        let stream = self
            .input_context
            .stream(stream_index)
            .ok_or(RenderError::NoVideoStream)?;
        let time_base = stream.time_base();
        let decoder_context = CodecContext::from_parameters(stream.parameters())?;
        let mut decoder = decoder_context.decoder().video()?;

        let mut state = DecodeState::new(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            pixel_format,
            frame_numbers,
        )?;

        if first_frame > 0 && frames_per_second > 0.0 {
            let seek_timestamp = frame_number_to_seek_timestamp(first_frame, frames_per_second);
            log::debug!("Seeking to frame {first_frame} (ts={seek_timestamp}us)");
            self.input_context.seek(seek_timestamp, ..seek_timestamp)?;
        }

        for (stream, packet) in self.input_context.packets() {
            if cancellation.is_cancelled() {
                return Err(RenderError::Cancelled);
            }
            if stream.index() != stream_index {
                continue;
            }

            decoder.send_packet(&packet)?;
            if state.receive_all(&mut decoder, time_base, frames_per_second, cancellation, handler)? {
                return Ok(());
            }
        }

        decoder.send_eof()?;
        if state.receive_all(&mut decoder, time_base, frames_per_second, cancellation, handler)? {
            return Ok(());
        }

        state.drain_at_end_of_stream(cancellation, handler)
    }
}

/// Tracks which requested frames are still outstanding during one pass.
struct DecodeState<'a> {
    scaler: ScalingContext,
    converted_frame: VideoFrame,
    pixel_format: PixelFormat,
    width: u32,
    height: u32,
    pending: &'a [u64],
    last_decoded: Option<VideoFrame>,
}

impl<'a> DecodeState<'a> {
    fn new(
        source_format: Pixel,
        width: u32,
        height: u32,
        pixel_format: PixelFormat,
        pending: &'a [u64],
    ) -> Result<Self, RenderError> {
        let scaler = ScalingContext::get(
            source_format,
            width,
            height,
            pixel_format.to_ffmpeg_pixel(),
            width,
            height,
            ScalingFlags::BILINEAR,
        )?;
        Ok(Self {
            scaler,
            converted_frame: VideoFrame::empty(),
            pixel_format,
            width,
            height,
            pending,
            last_decoded: None,
        })
    }

    fn is_finished(&self) -> bool {
        self.pending.is_empty()
    }

    /// Pull every frame the decoder has ready and offer it to the pending
    /// targets. Returns `true` once no targets remain.
    fn receive_all(
        &mut self,
        decoder: &mut VideoDecoder,
        time_base: Rational,
        frames_per_second: f64,
        cancellation: &CancellationToken,
        handler: &mut FrameHandler<'_>,
    ) -> Result<bool, RenderError> {
        loop {
            let mut decoded = VideoFrame::empty();
            if decoder.receive_frame(&mut decoded).is_err() {
                return Ok(self.is_finished());
            }
            let current = frame_number_of(&decoded, time_base, frames_per_second);
            self.offer(decoded, current, cancellation, handler)?;
            if self.is_finished() {
                return Ok(true);
            }
        }
    }

    /// Deliver `decoded` for every outstanding target at or before `current`.
    ///
    /// A seek can land past a target; such targets receive the first frame
    /// decoded after them.
    fn offer(
        &mut self,
        decoded: VideoFrame,
        current: u64,
        cancellation: &CancellationToken,
        handler: &mut FrameHandler<'_>,
    ) -> Result<(), RenderError> {
        let ready = self.pending.partition_point(|&target| target <= current);
        if ready > 0 {
            self.deliver(&decoded, ready, cancellation, handler)?;
        }
        self.last_decoded = Some(decoded);
        Ok(())
    }

    /// Hand the last decoded frame to targets the stream never reached.
    fn drain_at_end_of_stream(
        &mut self,
        cancellation: &CancellationToken,
        handler: &mut FrameHandler<'_>,
    ) -> Result<(), RenderError> {
        if self.pending.is_empty() {
            return Ok(());
        }
        let Some(last) = self.last_decoded.take() else {
            return Err(RenderError::VideoDecodeError(format!(
                "Could not locate frame {} in the video stream",
                self.pending[0]
            )));
        };
        log::debug!(
            "Stream ended before frame {}; using last decoded frame for {} target(s)",
            self.pending[0],
            self.pending.len()
        );
        self.deliver(&last, self.pending.len(), cancellation, handler)
    }

    fn deliver(
        &mut self,
        decoded: &VideoFrame,
        count: usize,
        cancellation: &CancellationToken,
        handler: &mut FrameHandler<'_>,
    ) -> Result<(), RenderError> {
        self.scaler.run(decoded, &mut self.converted_frame)?;
        let image = convert_frame_to_image(
            &self.converted_frame,
            self.width,
            self.height,
            self.pixel_format,
        )?;

        let pending = self.pending;
        let (ready, rest) = pending.split_at(count);
        self.pending = rest;
        for &target in ready {
            if cancellation.is_cancelled() {
                return Err(RenderError::Cancelled);
            }
            handler(target, image.clone())?;
        }
        Ok(())
    }
}

fn frame_number_of(frame: &VideoFrame, time_base: Rational, frames_per_second: f64) -> u64 {
    let pts = frame.pts().or_else(|| frame.timestamp()).unwrap_or(0);
    pts_to_frame_number(pts, time_base, frames_per_second)
}

/// Rescale a PTS value from stream time base to seconds.
fn pts_to_seconds(pts: i64, time_base: Rational) -> f64 {
    pts as f64 * time_base.numerator() as f64 / time_base.denominator() as f64
}

/// Rescale a PTS value to a frame number. Negative PTS map to frame 0.
///
/// Products a hair below a whole number (1001/30000 time bases) count as
/// that frame.
fn pts_to_frame_number(pts: i64, time_base: Rational, frames_per_second: f64) -> u64 {
    let seconds = pts_to_seconds(pts, time_base).max(0.0);
    (seconds * frames_per_second + 1e-6) as u64
}

/// Frame number to a container seek position in `AV_TIME_BASE` units.
fn frame_number_to_seek_timestamp(frame_number: u64, frames_per_second: f64) -> i64 {
    let seconds = frame_number as f64 / frames_per_second;
    (seconds * 1_000_000.0) as i64
}

/// Copy plane 0 of a converted frame into a tightly packed buffer.
///
/// FFmpeg rows frequently carry padding (stride > width × bytes per pixel).
fn frame_to_buffer(video_frame: &VideoFrame, width: u32, height: u32, bytes_per_pixel: usize) -> Vec<u8> {
    let stride = video_frame.stride(0);
    let row_length = (width as usize) * bytes_per_pixel;
    let data = video_frame.data(0);

    if stride == row_length {
        data[..row_length * (height as usize)].to_vec()
    } else {
        let mut buffer = Vec::with_capacity(row_length * (height as usize));
        for row in 0..(height as usize) {
            let row_start = row * stride;
            buffer.extend_from_slice(&data[row_start..row_start + row_length]);
        }
        buffer
    }
}

fn convert_frame_to_image(
    video_frame: &VideoFrame,
    width: u32,
    height: u32,
    pixel_format: PixelFormat,
) -> Result<DynamicImage, RenderError> {
    let buffer = frame_to_buffer(video_frame, width, height, pixel_format.bytes_per_pixel());
    let image = match pixel_format {
        PixelFormat::Rgb8 => RgbImage::from_raw(width, height, buffer).map(DynamicImage::ImageRgb8),
        PixelFormat::Rgba8 => {
            RgbaImage::from_raw(width, height, buffer).map(DynamicImage::ImageRgba8)
        }
        PixelFormat::Gray8 => {
            GrayImage::from_raw(width, height, buffer).map(DynamicImage::ImageLuma8)
        }
    };
    image.ok_or_else(|| {
        RenderError::VideoDecodeError(
            "Failed to construct image from decoded frame data".to_string(),
        )
    })
}
