//! A small MPEG-4 video written with FFmpeg on first use.
//!
//! Frame `n` is black apart from a bright bar in column block `n`, so the
//! frame a render produced can be read back from its pixels with
//! [`bar_position`]. Keyframes fall every [`ENCODED_GOP`] frames, which makes
//! most requests seek to an earlier keyframe and decode forward.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use ffmpeg_next::format::context::Output;
use ffmpeg_next::format::{Flags as FormatFlags, Pixel};
use ffmpeg_next::frame::Video as VideoFrame;
use ffmpeg_next::{Packet, Rational, codec, encoder};
use image::DynamicImage;

pub const ENCODED_FRAMES: u64 = 25;
pub const ENCODED_FPS: i32 = 25;
pub const ENCODED_GOP: u32 = 10;
pub const BAR_WIDTH: u32 = 8;
pub const ENCODED_WIDTH: u32 = BAR_WIDTH * ENCODED_FRAMES as u32;
pub const ENCODED_HEIGHT: u32 = 32;

const DARK: u8 = 16;
const BRIGHT: u8 = 235;

/// Path of the encoded video, writing it on the first call.
pub fn encoded_video_path() -> &'static Path {
    static PATH: OnceLock<PathBuf> = OnceLock::new();
    PATH.get_or_init(|| {
        let directory = Path::new(env!("CARGO_TARGET_TMPDIR"));
        let path = directory.join("framestrip_bars.mp4");
        // Several test binaries may race to create the file.
        let scratch = directory.join(format!("framestrip_bars_{}.mp4", std::process::id()));
        write_bars(&scratch).expect("failed to encode test video");
        std::fs::rename(&scratch, &path).expect("failed to move test video into place");
        path
    })
}

/// The column block holding the brightest bar, i.e. the frame number.
pub fn bar_position(image: &DynamicImage) -> u64 {
    let luma = image.to_luma8();
    let row = luma.height() / 2;
    (0..ENCODED_FRAMES)
        .max_by_key(|&block| luma.get_pixel(block as u32 * BAR_WIDTH + BAR_WIDTH / 2, row).0[0])
        .unwrap()
}

fn bar_frame(frame_number: u64) -> VideoFrame {
    let mut frame = VideoFrame::new(Pixel::YUV420P, ENCODED_WIDTH, ENCODED_HEIGHT);
    let stride = frame.stride(0);
    let bar = frame_number as usize * BAR_WIDTH as usize;
    let luma = frame.data_mut(0);
    for row in 0..ENCODED_HEIGHT as usize {
        let line = &mut luma[row * stride..row * stride + ENCODED_WIDTH as usize];
        line.fill(DARK);
        line[bar..bar + BAR_WIDTH as usize].fill(BRIGHT);
    }
    frame.data_mut(1).fill(128);
    frame.data_mut(2).fill(128);
    frame.set_pts(Some(frame_number as i64));
    frame
}

fn write_bars(path: &Path) -> Result<(), ffmpeg_next::Error> {
    ffmpeg_next::init()?;

    let mut output = ffmpeg_next::format::output(path)?;
    let needs_global_header = output.format().flags().contains(FormatFlags::GLOBAL_HEADER);
    let mpeg4 = encoder::find(codec::Id::MPEG4).ok_or(ffmpeg_next::Error::EncoderNotFound)?;
    let frame_time_base = Rational::new(1, ENCODED_FPS);

    let mut stream = output.add_stream(mpeg4)?;
    let stream_index = stream.index();
    stream.set_time_base(frame_time_base);

    let mut encoder = codec::context::Context::from_parameters(stream.parameters())?
        .encoder()
        .video()?;
    encoder.set_width(ENCODED_WIDTH);
    encoder.set_height(ENCODED_HEIGHT);
    encoder.set_format(Pixel::YUV420P);
    encoder.set_time_base(frame_time_base);
    encoder.set_frame_rate(Some(Rational::new(ENCODED_FPS, 1)));
    encoder.set_gop(ENCODED_GOP);
    encoder.set_max_b_frames(0);
    encoder.set_bit_rate(4_000_000);
    if needs_global_header {
        encoder.set_flags(codec::Flags::GLOBAL_HEADER);
    }

    let mut encoder = encoder.open_as(mpeg4)?;
    stream.set_parameters(&encoder);
    output.write_header()?;

    let stream_time_base = output
        .stream(stream_index)
        .map(|stream| stream.time_base())
        .ok_or(ffmpeg_next::Error::StreamNotFound)?;

    for frame_number in 0..ENCODED_FRAMES {
        encoder.send_frame(&bar_frame(frame_number))?;
        write_packets(&mut encoder, &mut output, stream_index, frame_time_base, stream_time_base)?;
    }
    encoder.send_eof()?;
    write_packets(&mut encoder, &mut output, stream_index, frame_time_base, stream_time_base)?;

    output.write_trailer()
}

fn write_packets(
    encoder: &mut encoder::video::Encoder,
    output: &mut Output,
    stream_index: usize,
    from: Rational,
    to: Rational,
) -> Result<(), ffmpeg_next::Error> {
    let mut packet = Packet::empty();
    while encoder.receive_packet(&mut packet).is_ok() {
        packet.set_stream(stream_index);
        packet.rescale_ts(from, to);
        packet.write_interleaved(output)?;
    }
    Ok(())
}
