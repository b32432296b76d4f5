//! Target rectangles and frame fitting.
//!
//! A [`TargetFrame`] describes where rendered output will be placed and how
//! large it is. [`fit_image`] maps a decoded frame onto the rectangle's pixel
//! size according to a [`ContentMode`].

use image::{DynamicImage, GenericImage, GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

use crate::configuration::{ContentMode, PixelFormat, ScaleFilter};
use crate::error::RenderError;

/// Largest pixel area a [`TargetFrame`] may cover (8192 × 8192).
pub const MAX_TARGET_PIXELS: u64 = 8192 * 8192;

/// Destination rectangle for rendered output, in points.
///
/// Only `width` and `height` affect the rendered pixels; `x` and `y` are
/// carried through to [`RenderOutput`](crate::RenderOutput) so the caller
/// can place the result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetFrame {
    /// Horizontal origin.
    pub x: f64,
    /// Vertical origin.
    pub y: f64,
    /// Width of the rectangle.
    pub width: f64,
    /// Height of the rectangle.
    pub height: f64,
}

impl TargetFrame {
    /// Create a rectangle from origin and size.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle at the origin.
    pub fn from_size(width: f64, height: f64) -> Self {
        Self::new(0.0, 0.0, width, height)
    }

    /// Check that every component is finite, the size is positive, and the
    /// rounded-up pixel area is at most [`MAX_TARGET_PIXELS`].
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::InvalidTargetFrame`] otherwise.
    pub fn validate(&self) -> Result<(), RenderError> {
        let finite = [self.x, self.y, self.width, self.height]
            .iter()
            .all(|value| value.is_finite());
        let fits = || {
            let (width, height) = self.pixel_size();
            (width as u64)
                .checked_mul(height as u64)
                .is_some_and(|area| area <= MAX_TARGET_PIXELS)
        };
        if finite && self.width > 0.0 && self.height > 0.0 && fits() {
            Ok(())
        } else {
            Err(RenderError::InvalidTargetFrame {
                x: self.x,
                y: self.y,
                width: self.width,
                height: self.height,
            })
        }
    }

    /// Output size in whole pixels, rounding fractional sizes up.
    ///
    /// Assumes the frame has been [validated](TargetFrame::validate).
    pub fn pixel_size(&self) -> (u32, u32) {
        let width = self.width.ceil().clamp(1.0, u32::MAX as f64) as u32;
        let height = self.height.ceil().clamp(1.0, u32::MAX as f64) as u32;
        (width, height)
    }
}

/// Largest size with the source aspect ratio that fits inside the bounds.
pub(crate) fn aspect_fit_size(
    source_width: u32,
    source_height: u32,
    bound_width: u32,
    bound_height: u32,
) -> (u32, u32) {
    if source_width == 0 || source_height == 0 {
        return (bound_width, bound_height);
    }
    let scale = (bound_width as f64 / source_width as f64)
        .min(bound_height as f64 / source_height as f64);
    let width = (source_width as f64 * scale).round() as u32;
    let height = (source_height as f64 * scale).round() as u32;
    (width.clamp(1, bound_width), height.clamp(1, bound_height))
}

/// Build a canvas of the given size and format filled with `background`.
pub(crate) fn blank_canvas(
    width: u32,
    height: u32,
    format: PixelFormat,
    background: [u8; 4],
) -> DynamicImage {
    let [red, green, blue, alpha] = background;
    match format {
        PixelFormat::Rgb8 => {
            DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([red, green, blue])))
        }
        PixelFormat::Rgba8 => DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([red, green, blue, alpha]),
        )),
        PixelFormat::Gray8 => {
            let luma = (0.299 * red as f64 + 0.587 * green as f64 + 0.114 * blue as f64).round();
            DynamicImage::ImageLuma8(GrayImage::from_pixel(width, height, Luma([luma as u8])))
        }
    }
}

/// Scale and crop `image` into a `width × height` image.
///
/// The result keeps the colour type of `image`. `background` is only used
/// by [`ContentMode::AspectFit`] for the padding around the scaled frame.
///
/// # Errors
///
/// Returns [`RenderError::ImageError`] if the scaled frame cannot be copied
/// onto the padded canvas.
///
/// # Example
///
/// ```
/// use framestrip::{ContentMode, ScaleFilter, fit_image};
/// use image::DynamicImage;
///
/// let frame = DynamicImage::new_rgb8(1920, 1080);
/// let thumb = fit_image(&frame, 100, 100, ContentMode::AspectFill, ScaleFilter::Triangle, [0; 4])?;
/// assert_eq!((thumb.width(), thumb.height()), (100, 100));
/// # Ok::<(), framestrip::RenderError>(())
/// ```
pub fn fit_image(
    image: &DynamicImage,
    width: u32,
    height: u32,
    mode: ContentMode,
    filter: ScaleFilter,
    background: [u8; 4],
) -> Result<DynamicImage, RenderError> {
    let filter_type = filter.to_filter_type();
    if image.width() == width && image.height() == height {
        return Ok(image.clone());
    }

    match mode {
        ContentMode::Stretch => Ok(image.resize_exact(width, height, filter_type)),
        ContentMode::AspectFill => Ok(image.resize_to_fill(width, height, filter_type)),
        ContentMode::AspectFit => {
            let (fit_width, fit_height) =
                aspect_fit_size(image.width(), image.height(), width, height);
            let scaled = image.resize_exact(fit_width, fit_height, filter_type);
            let mut canvas =
                blank_canvas(width, height, pixel_format_of(image), background);
            canvas.copy_from(&scaled, (width - fit_width) / 2, (height - fit_height) / 2)?;
            Ok(canvas)
        }
    }
}

/// Map an image's colour type back to the closest output format.
pub(crate) fn pixel_format_of(image: &DynamicImage) -> PixelFormat {
    match image {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageLuma16(_) => PixelFormat::Gray8,
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageRgb16(_) | DynamicImage::ImageRgb32F(_) => {
            PixelFormat::Rgb8
        }
        _ => PixelFormat::Rgba8,
    }
}
