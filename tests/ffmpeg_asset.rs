//! FFmpeg-backed asset tests.
//!
//! Rendering tests decode the bar video from `common::encoded`, where the
//! position of the bright bar identifies each frame.

mod common;

use std::io::Write;
use std::time::Duration;

use framestrip::{
    Asset, FrameIndex, PixelFormat, RenderError, RenderOptions, RenderQueue, RenderTask,
    TargetFrame, TaskState, strip_indexes,
};
use image::DynamicImage;

use common::encoded::{
    BAR_WIDTH, ENCODED_FPS, ENCODED_FRAMES, ENCODED_HEIGHT, ENCODED_WIDTH, bar_position,
    encoded_video_path,
};

fn open() -> Asset {
    Asset::open(encoded_video_path()).unwrap()
}

fn native_target() -> TargetFrame {
    TargetFrame::from_size(ENCODED_WIDTH as f64, ENCODED_HEIGHT as f64)
}

fn rendered_positions(indexes: Vec<FrameIndex>, pixel_format: PixelFormat) -> Vec<(u64, u64)> {
    RenderTask::with_indexes(open(), indexes, native_target())
        .with_options(RenderOptions::new().with_pixel_format(pixel_format))
        .run()
        .unwrap()
        .frames()
        .iter()
        .map(|frame| (frame.frame_number, bar_position(&frame.image)))
        .collect()
}

// ── Opening ────────────────────────────────────────────────────────

#[test]
fn open_missing_file_fails() {
    let result = Asset::open("tests/fixtures/does_not_exist.mp4");
    assert!(matches!(result, Err(RenderError::FileOpen { .. })));
}

#[test]
fn open_garbage_file_fails() {
    let mut file = tempfile::Builder::new().suffix(".mp4").tempfile().unwrap();
    file.write_all(b"definitely not a video container").unwrap();
    file.flush().unwrap();

    let result = Asset::open(file.path());
    assert!(matches!(
        result,
        Err(RenderError::FileOpen { .. } | RenderError::NoVideoStream)
    ));
}

#[test]
fn metadata_describes_the_stream() {
    let asset = open();
    let video = asset.metadata();
    assert_eq!((video.width, video.height), (ENCODED_WIDTH, ENCODED_HEIGHT));
    assert!((video.frames_per_second - ENCODED_FPS as f64).abs() < 0.01);
    assert_eq!(video.frame_count, ENCODED_FRAMES);
    assert!(video.duration > Duration::from_millis(900));
    assert_eq!(video.codec, "mpeg4");
    assert_eq!(asset.path(), Some(encoded_video_path()));
}

// ── Decoding ───────────────────────────────────────────────────────

#[test]
fn renders_first_frame_by_default() {
    let output = RenderTask::new(open(), TargetFrame::from_size(40.0, 16.0))
        .run()
        .unwrap();

    assert_eq!(output.len(), 1);
    let frame = &output.frames()[0];
    assert_eq!(frame.frame_number, 0);
    assert_eq!((frame.image.width(), frame.image.height()), (40, 16));
    assert!(matches!(frame.image, DynamicImage::ImageRgb8(_)));
}

#[test]
fn decodes_the_requested_frames() {
    // The earliest request, 12, seeks back to the keyframe at 10.
    let indexes = vec![FrameIndex::Frame(17), FrameIndex::Frame(12), FrameIndex::Frame(14)];
    assert_eq!(
        rendered_positions(indexes, PixelFormat::Rgb8),
        vec![(17, 17), (12, 12), (14, 14)]
    );
}

#[test]
fn mixed_indexes_keep_caller_order() {
    let indexes = vec![
        FrameIndex::Frame(ENCODED_FRAMES - 1),
        FrameIndex::Timestamp(Duration::from_millis(500)),
        FrameIndex::Frame(0),
    ];
    let output = RenderTask::with_indexes(open(), indexes.clone(), native_target())
        .with_options(RenderOptions::new().with_pixel_format(PixelFormat::Rgba8))
        .run()
        .unwrap();

    assert_eq!(output.len(), 3);
    for (frame, index) in output.frames().iter().zip(&indexes) {
        assert_eq!(frame.index, *index);
        assert!(matches!(frame.image, DynamicImage::ImageRgba8(_)));
        assert_eq!(bar_position(&frame.image), frame.frame_number);
    }
    let numbers: Vec<u64> = output.frames().iter().map(|frame| frame.frame_number).collect();
    assert_eq!(numbers, vec![ENCODED_FRAMES - 1, 12, 0]);
}

#[test]
fn gray_frames_keep_the_bar() {
    assert_eq!(
        rendered_positions(vec![FrameIndex::Frame(9), FrameIndex::Frame(21)], PixelFormat::Gray8),
        vec![(9, 9), (21, 21)]
    );
}

#[test]
fn last_frame_is_reached_at_end_of_stream() {
    let last = ENCODED_FRAMES - 1;
    assert_eq!(
        rendered_positions(vec![FrameIndex::Frame(last)], PixelFormat::Rgb8),
        vec![(last, last)]
    );
}

#[test]
fn timestamp_past_the_end_clamps_to_last_frame() {
    let last = ENCODED_FRAMES - 1;
    let output = RenderTask::with_indexes(open(), [Duration::from_secs(30)], native_target())
        .with_options(RenderOptions::new().with_clamp_to_end(true))
        .run()
        .unwrap();

    assert_eq!(output.frames()[0].frame_number, last);
    assert_eq!(bar_position(&output.frames()[0].image), last);
}

#[test]
fn odd_width_rows_are_packed() {
    // 200 px of RGB is 600 bytes, which FFmpeg pads to an aligned stride.
    let output = RenderTask::with_indexes(open(), [6_u64], native_target())
        .run()
        .unwrap();
    let image = output.frames()[0].image.to_rgb8();
    assert_eq!(image.as_raw().len(), (ENCODED_WIDTH * ENCODED_HEIGHT * 3) as usize);

    let bar_column = 6 * BAR_WIDTH + BAR_WIDTH / 2;
    for row in [0, ENCODED_HEIGHT / 2, ENCODED_HEIGHT - 1] {
        assert!(image.get_pixel(bar_column, row).0[0] > 160);
        assert!(image.get_pixel(BAR_WIDTH / 2, row).0[0] < 80);
    }
}

// ── Scheduling ─────────────────────────────────────────────────────

#[test]
fn strip_on_queue() {
    let asset = open();
    let target = TargetFrame::from_size(480.0, 40.0);
    let indexes = strip_indexes(asset.metadata(), &target);
    let expected = indexes.len();

    let queue = RenderQueue::new().unwrap();
    let output = queue
        .submit(RenderTask::with_indexes(asset, indexes, target))
        .unwrap()
        .wait()
        .unwrap();
    assert_eq!(output.len(), expected);

    let strip = output.strip().unwrap();
    assert_eq!((strip.width(), strip.height()), (480, 40));

    let directory = tempfile::tempdir().unwrap();
    let path = directory.path().join("strip.png");
    strip.save(&path).unwrap();
    assert!(path.exists());
}

#[test]
fn shared_asset_across_tasks() {
    let asset = open();
    let queue = RenderQueue::new().unwrap();
    let handles = queue
        .submit_all((0..4_u64).map(|quarter| {
            RenderTask::with_indexes(
                asset.clone(),
                [Duration::from_millis(quarter * 250)],
                native_target(),
            )
        }))
        .unwrap();

    let positions: Vec<u64> = handles
        .into_iter()
        .map(|handle| bar_position(&handle.wait().unwrap().frames()[0].image))
        .collect();
    assert_eq!(positions, vec![0, 6, 12, 18]);
}

#[test]
fn cancelled_task() {
    let task = RenderTask::with_indexes(open(), 0..ENCODED_FRAMES, native_target());
    task.cancellation_token().cancel();

    let queue = RenderQueue::new().unwrap();
    let handle = queue.submit(task).unwrap();
    assert!(matches!(handle.wait(), Err(RenderError::Cancelled)));
}

#[test]
fn out_of_range_frame() {
    let task = RenderTask::with_indexes(open(), [ENCODED_FRAMES + 100], native_target());

    let queue = RenderQueue::new().unwrap();
    let handle = queue.submit(task).unwrap();
    assert!(matches!(handle.wait(), Err(RenderError::FrameOutOfRange { .. })));
}

#[test]
fn failed_state_is_terminal() {
    let task = RenderTask::new(open(), TargetFrame::from_size(-1.0, 32.0));
    let queue = RenderQueue::new().unwrap();
    let mut handle = queue.submit(task).unwrap();
    queue.wait_idle();

    assert_eq!(handle.state(), TaskState::Failed);
    assert!(matches!(
        handle.try_outcome(),
        Some(Err(RenderError::InvalidTargetFrame { .. }))
    ));
}
