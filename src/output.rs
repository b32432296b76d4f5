//! Results of a completed render task.

use std::time::Duration;

use image::{DynamicImage, GenericImage};

use crate::configuration::{ContentMode, PixelFormat, ScaleFilter};
use crate::error::RenderError;
use crate::geometry::{TargetFrame, blank_canvas, fit_image};
use crate::index::FrameIndex;

/// One rendered frame.
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    /// The index as the caller requested it.
    pub index: FrameIndex,
    /// The frame number the index resolved to.
    pub frame_number: u64,
    /// Presentation time of `frame_number`.
    pub timestamp: Duration,
    /// The frame fitted to the target's pixel size.
    pub image: DynamicImage,
}

/// Everything a successful render task produced.
///
/// Frames appear in the same order as the task's indexes, one per index.
#[derive(Debug, Clone)]
pub struct RenderOutput {
    pub(crate) target_frame: TargetFrame,
    pub(crate) frames: Vec<RenderedFrame>,
    pub(crate) pixel_format: PixelFormat,
    pub(crate) background: [u8; 4],
    pub(crate) filter: ScaleFilter,
}

impl RenderOutput {
    /// The rectangle the frames were rendered for.
    pub fn target_frame(&self) -> TargetFrame {
        self.target_frame
    }

    /// Rendered frames in index order.
    pub fn frames(&self) -> &[RenderedFrame] {
        &self.frames
    }

    /// Consume the output, returning the rendered frames.
    pub fn into_frames(self) -> Vec<RenderedFrame> {
        self.frames
    }

    /// Number of rendered frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Whether no frames were rendered.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Composite all frames left to right into one image of the target size.
    ///
    /// The width is split into equal cells (the last cell absorbs the
    /// rounding remainder) and each frame is aspect-filled into its cell.
    /// An output with no frames yields a canvas of the background colour.
    /// Cells are at least one pixel wide, so when there are more frames than
    /// pixel columns only the first `width` frames appear;
    /// [`strip_indexes`](crate::strip_indexes) never plans more than that.
    ///
    /// # Errors
    ///
    /// Returns [`RenderError::ImageError`] if a cell cannot be copied onto
    /// the canvas.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use framestrip::{Asset, RenderTask, TargetFrame, strip_indexes};
    ///
    /// let asset = Asset::open("input.mp4")?;
    /// let target = TargetFrame::from_size(800.0, 60.0);
    /// let indexes = strip_indexes(asset.metadata(), &target);
    /// let task = RenderTask::with_indexes(asset, indexes, target);
    /// let output = task.run()?;
    /// output.strip()?.save("strip.png")?;
    /// # Ok::<(), framestrip::RenderError>(())
    /// ```
    pub fn strip(&self) -> Result<DynamicImage, RenderError> {
        let (width, height) = self.target_frame.pixel_size();
        let mut canvas = blank_canvas(width, height, self.pixel_format, self.background);

        let count = self.frames.len().min(width as usize) as u32;
        if count == 0 {
            return Ok(canvas);
        }

        let cell_width = width / count;
        for (position, frame) in self.frames.iter().take(count as usize).enumerate() {
            let x = position as u32 * cell_width;
            let this_width = if position as u32 == count - 1 {
                width - x
            } else {
                cell_width
            };
            let cell = fit_image(
                &frame.image,
                this_width,
                height,
                ContentMode::AspectFill,
                self.filter,
                self.background,
            )?;
            canvas.copy_from(&cell, x, 0)?;
        }

        Ok(canvas)
    }
}
