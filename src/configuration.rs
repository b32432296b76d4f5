//! Render configuration.
//!
//! [`RenderOptions`] is a builder that threads output format, fitting
//! behaviour, and progress reporting through a
//! [`RenderTask`](crate::RenderTask) without widening its constructors.
//!
//! # Example
//!
//! ```
//! use framestrip::{ContentMode, PixelFormat, RenderOptions, ScaleFilter};
//!
//! let options = RenderOptions::new()
//!     .with_pixel_format(PixelFormat::Rgba8)
//!     .with_content_mode(ContentMode::AspectFit)
//!     .with_background([0, 0, 0, 0])
//!     .with_filter(ScaleFilter::Lanczos3);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::sync::Arc;

use ffmpeg_next::format::Pixel;
use image::imageops::FilterType;

use crate::progress::{NoOpProgress, ProgressCallback};

/// Output pixel format for rendered frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    /// 8-bit RGB (24 bpp). This is the default.
    #[default]
    Rgb8,
    /// 8-bit RGBA with alpha pre-set to 255 (32 bpp).
    Rgba8,
    /// 8-bit grayscale (8 bpp).
    Gray8,
}

impl PixelFormat {
    pub(crate) fn to_ffmpeg_pixel(self) -> Pixel {
        match self {
            PixelFormat::Rgb8 => Pixel::RGB24,
            PixelFormat::Rgba8 => Pixel::RGBA,
            PixelFormat::Gray8 => Pixel::GRAY8,
        }
    }

    /// Bytes per pixel in a tightly packed buffer of this format.
    pub(crate) fn bytes_per_pixel(self) -> usize {
        match self {
            PixelFormat::Rgb8 => 3,
            PixelFormat::Rgba8 => 4,
            PixelFormat::Gray8 => 1,
        }
    }
}

impl FromStr for PixelFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "rgb8" | "rgb" => Ok(PixelFormat::Rgb8),
            "rgba8" | "rgba" => Ok(PixelFormat::Rgba8),
            "gray8" | "gray" | "grey" | "grayscale" => Ok(PixelFormat::Gray8),
            other => Err(format!("unsupported pixel format: {other}")),
        }
    }
}

/// How a decoded frame is mapped onto the target rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentMode {
    /// Scale to cover the whole rectangle, cropping the overflow around the
    /// centre. This is the default.
    #[default]
    AspectFill,
    /// Scale to fit inside the rectangle, padding with the background colour.
    AspectFit,
    /// Scale both axes independently to the rectangle size.
    Stretch,
}

impl FromStr for ContentMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "fill" | "aspect-fill" => Ok(ContentMode::AspectFill),
            "fit" | "aspect-fit" => Ok(ContentMode::AspectFit),
            "stretch" => Ok(ContentMode::Stretch),
            other => Err(format!("unsupported content mode: {other}")),
        }
    }
}

/// Resampling filter used when scaling frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleFilter {
    /// Nearest neighbour.
    Nearest,
    /// Linear (bilinear) filter. This is the default.
    #[default]
    Triangle,
    /// Cubic filter.
    CatmullRom,
    /// Lanczos with window 3.
    Lanczos3,
}

impl ScaleFilter {
    pub(crate) fn to_filter_type(self) -> FilterType {
        match self {
            ScaleFilter::Nearest => FilterType::Nearest,
            ScaleFilter::Triangle => FilterType::Triangle,
            ScaleFilter::CatmullRom => FilterType::CatmullRom,
            ScaleFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Configuration for a render task.
///
/// A default-constructed value renders RGB8 output, aspect-fills the
/// target, uses a bilinear filter and reports no progress.
#[derive(Clone)]
pub struct RenderOptions {
    pub(crate) pixel_format: PixelFormat,
    pub(crate) content_mode: ContentMode,
    pub(crate) filter: ScaleFilter,
    pub(crate) background: [u8; 4],
    pub(crate) clamp_to_end: bool,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    pub(crate) batch_size: u64,
}

impl Debug for RenderOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("RenderOptions")
            .field("pixel_format", &self.pixel_format)
            .field("content_mode", &self.content_mode)
            .field("filter", &self.filter)
            .field("background", &self.background)
            .field("clamp_to_end", &self.clamp_to_end)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            pixel_format: PixelFormat::Rgb8,
            content_mode: ContentMode::AspectFill,
            filter: ScaleFilter::Triangle,
            background: [0, 0, 0, 255],
            clamp_to_end: false,
            progress: Arc::new(NoOpProgress),
            batch_size: 1,
        }
    }

    /// Set the output pixel format.
    #[must_use]
    pub fn with_pixel_format(mut self, format: PixelFormat) -> Self {
        self.pixel_format = format;
        self
    }

    /// Set how frames are fitted into the target rectangle.
    #[must_use]
    pub fn with_content_mode(mut self, mode: ContentMode) -> Self {
        self.content_mode = mode;
        self
    }

    /// Set the resampling filter.
    #[must_use]
    pub fn with_filter(mut self, filter: ScaleFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Set the RGBA colour used for letterbox padding and empty strips.
    ///
    /// Grayscale output uses the luminance of this colour; RGB output drops
    /// the alpha channel.
    #[must_use]
    pub fn with_background(mut self, rgba: [u8; 4]) -> Self {
        self.background = rgba;
        self
    }

    /// Clamp indices past the end of the video to the last frame instead of
    /// failing the task.
    #[must_use]
    pub fn with_clamp_to_end(mut self, clamp: bool) -> Self {
        self.clamp_to_end = clamp;
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Set how often the progress callback fires (every N frames).
    ///
    /// Clamped to a minimum of 1.
    #[must_use]
    pub fn with_batch_size(mut self, size: u64) -> Self {
        self.batch_size = size.max(1);
        self
    }

    /// The configured output pixel format.
    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    /// The configured content mode.
    pub fn content_mode(&self) -> ContentMode {
        self.content_mode
    }

    /// The configured resampling filter.
    pub fn filter(&self) -> ScaleFilter {
        self.filter
    }

    /// The configured background colour.
    pub fn background(&self) -> [u8; 4] {
        self.background
    }

    /// Whether out-of-range indices are clamped to the last frame.
    pub fn clamp_to_end(&self) -> bool {
        self.clamp_to_end
    }

    /// Frames processed between progress callbacks.
    pub fn batch_size(&self) -> u64 {
        self.batch_size
    }
}
