use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use framestrip::{
    Asset, ContentMode, FfmpegLogLevel, FrameIndex, OperationType, PixelFormat, ProgressCallback,
    ProgressInfo, QueueOptions, RenderOptions, RenderQueue, RenderTask, TargetFrame,
    evenly_spaced, strip_indexes,
};

const CLI_AFTER_HELP: &str = "Examples:\n  framestrip probe input.mp4 --json\n  framestrip render input.mp4 --out strip.png --width 960 --height 54\n  framestrip render input.mp4 --out thumbs --width 320 --height 180 --at 0:05,0:10 --separate\n  framestrip completions zsh > _framestrip";

#[derive(Debug, Parser)]
#[command(
    name = "framestrip",
    version,
    about = "Render video thumbnails and scrubber strips",
    after_help = CLI_AFTER_HELP
)]
struct Cli {
    #[command(flatten)]
    global: GlobalOptions,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Parser, Clone, Default)]
struct GlobalOptions {
    /// Show additional output.
    #[arg(long, global = true)]
    verbose: bool,

    /// Show a progress bar.
    #[arg(long, global = true)]
    progress: bool,

    /// Allow overwriting existing output files.
    #[arg(long, global = true)]
    overwrite: bool,

    /// FFmpeg log level (quiet, panic, fatal, error, warning, info, verbose, debug, trace).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Output pixel format (rgb8, rgba8, gray8).
    #[arg(long, global = true)]
    pixel_format: Option<String>,

    /// Number of render worker threads.
    #[arg(long, global = true)]
    threads: Option<usize>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print video metadata for an asset.
    #[command(
        about = "Print video metadata",
        visible_alias = "info",
        after_help = "Examples:\n  framestrip probe input.mp4\n  framestrip probe input.mp4 --json"
    )]
    Probe {
        /// Input media path.
        input: PathBuf,

        /// Output metadata as machine-readable JSON.
        #[arg(long)]
        json: bool,
    },

    /// Render frames into a target rectangle.
    #[command(
        about = "Render a strip or individual thumbnails",
        after_help = "Without --at, --frames or --count, enough frames are chosen to cover the width\nwith aspect-preserving thumbnails of the given height."
    )]
    Render {
        /// Input media path.
        input: PathBuf,
        /// Output image path, or directory with --separate.
        #[arg(long)]
        out: PathBuf,
        /// Target width in pixels.
        #[arg(long)]
        width: f64,
        /// Target height in pixels.
        #[arg(long)]
        height: f64,
        /// Comma-separated timestamps (seconds, MM:SS or HH:MM:SS).
        #[arg(long, conflicts_with_all = ["frames", "count"])]
        at: Option<String>,
        /// Comma-separated frame numbers.
        #[arg(long, conflicts_with = "count")]
        frames: Option<String>,
        /// Number of evenly spaced frames.
        #[arg(long)]
        count: Option<u32>,
        /// Content mode: fill | fit | stretch.
        #[arg(long, default_value = "fill")]
        mode: String,
        /// Write one image per frame instead of a single strip.
        #[arg(long)]
        separate: bool,
        /// Image extension used with --separate (png, jpg, bmp, tiff).
        #[arg(long, default_value = "png")]
        ext: String,
        /// Clamp positions past the end of the video to the last frame.
        #[arg(long)]
        clamp: bool,
    },

    /// Generate shell completion scripts.
    #[command(about = "Generate shell completions")]
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

fn parse_timecode(value: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("time value cannot be empty".into());
    }

    if let Ok(seconds) = trimmed.parse::<f64>() {
        return seconds_to_duration(seconds, trimmed);
    }

    let parts: Vec<&str> = trimmed.split(':').collect();
    let (hours, minutes, seconds) = match parts.as_slice() {
        [minutes, seconds] => (0_u64, minutes.parse::<u64>()?, seconds.parse::<f64>()?),
        [hours, minutes, seconds] => (
            hours.parse::<u64>()?,
            minutes.parse::<u64>()?,
            seconds.parse::<f64>()?,
        ),
        _ => return Err(format!("invalid time format: {trimmed}").into()),
    };

    let total_seconds = (hours as f64 * 3600.0) + (minutes as f64 * 60.0) + seconds;
    seconds_to_duration(total_seconds, trimmed)
}

fn seconds_to_duration(seconds: f64, original: &str) -> Result<Duration, Box<dyn std::error::Error>> {
    if seconds.is_nan() {
        return Err(format!("invalid time value: {original}").into());
    }
    Duration::try_from_secs_f64(seconds.max(0.0))
        .map_err(|error| format!("time value out of range: {original} ({error})").into())
}

fn parse_timestamp_list(value: &str) -> Result<Vec<FrameIndex>, Box<dyn std::error::Error>> {
    value
        .split(',')
        .map(|part| Ok(FrameIndex::Timestamp(parse_timecode(part)?)))
        .collect()
}

fn parse_frame_list(value: &str) -> Result<Vec<FrameIndex>, Box<dyn std::error::Error>> {
    value
        .split(',')
        .map(|part| Ok(FrameIndex::Frame(part.trim().parse::<u64>()?)))
        .collect()
}

fn ensure_writable_path(path: &Path, overwrite: bool) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        if overwrite {
            eprintln!(
                "{} {}",
                "warning:".yellow().bold(),
                format!("overwriting {}", path.display()).yellow()
            );
        } else {
            return Err(format!(
                "output already exists: {} (use --overwrite to replace)",
                path.display()
            )
            .into());
        }
    }
    Ok(())
}

fn apply_global_options(global: &GlobalOptions) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(level) = &global.log_level {
        let parsed: FfmpegLogLevel = level.parse()?;
        framestrip::set_ffmpeg_log_level(parsed);
    }
    Ok(())
}

fn base_render_options(
    global: &GlobalOptions,
    mode: &str,
    clamp: bool,
) -> Result<RenderOptions, Box<dyn std::error::Error>> {
    let mut options = RenderOptions::new()
        .with_content_mode(mode.parse::<ContentMode>()?)
        .with_clamp_to_end(clamp);

    if let Some(pixel_format) = &global.pixel_format {
        options = options.with_pixel_format(pixel_format.parse::<PixelFormat>()?);
    }

    Ok(options)
}

fn build_queue(global: &GlobalOptions) -> Result<RenderQueue, Box<dyn std::error::Error>> {
    let mut options = QueueOptions::new();
    if let Some(threads) = global.threads.filter(|&threads| threads > 0) {
        options = options.with_max_concurrent(threads);
    }
    Ok(RenderQueue::with_options(options)?)
}

fn progress_bar(length: u64) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let bar = ProgressBar::new(length);
    let style = ProgressStyle::with_template("{spinner:.green} {bar:40.cyan/blue} {pos}/{len} {msg}")?;
    bar.set_style(style.progress_chars("##-"));
    Ok(bar)
}

/// Mirrors decode progress of a single task onto a terminal progress bar.
struct TerminalProgress {
    bar: ProgressBar,
}

impl ProgressCallback for TerminalProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        if info.operation == OperationType::FrameDecode {
            if let Some(total) = info.total {
                self.bar.set_length(total);
            }
            self.bar.set_position(info.completed);
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn render(
    global: &GlobalOptions,
    input: &Path,
    out: &Path,
    target: TargetFrame,
    indexes: Option<Vec<FrameIndex>>,
    count: Option<u32>,
    options: RenderOptions,
    separate: bool,
    ext: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let asset = Asset::open(input)?;
    let indexes = match (indexes, count) {
        (Some(indexes), _) => indexes,
        (None, Some(count)) => evenly_spaced(count, asset.metadata()),
        (None, None) => strip_indexes(asset.metadata(), &target),
    };

    if global.verbose {
        eprintln!("rendering {} frame(s) into {}x{}", indexes.len(), target.width, target.height);
    }

    let queue = build_queue(global)?;

    if separate {
        if out.exists() && !global.overwrite {
            return Err(format!(
                "output directory already exists: {} (use --overwrite)",
                out.display()
            )
            .into());
        }
        fs::create_dir_all(out)?;

        let bar = if global.progress {
            Some(progress_bar(indexes.len() as u64)?)
        } else {
            None
        };

        let tasks = indexes.iter().map(|index| {
            RenderTask::with_indexes(asset.clone(), [*index], target).with_options(options.clone())
        });
        let handles = queue.submit_all(tasks)?;

        let ext = ext.trim_start_matches('.').to_ascii_lowercase();
        for handle in handles {
            let output = handle.wait()?;
            for frame in output.frames() {
                let path = out.join(format!("frame_{:06}.{ext}", frame.frame_number));
                frame.image.save(&path)?;
                if global.verbose {
                    eprintln!("saved frame {} -> {}", frame.frame_number, path.display());
                }
            }
            if let Some(bar) = &bar {
                bar.inc(1);
            }
        }

        if let Some(bar) = bar {
            bar.finish_with_message("done");
        }
        println!(
            "{} {}",
            "success:".green().bold(),
            format!("Rendered {} frame(s) to {}", indexes.len(), out.display()).green()
        );
    } else {
        ensure_writable_path(out, global.overwrite)?;

        let bar = if global.progress {
            Some(progress_bar(indexes.len() as u64)?)
        } else {
            None
        };
        let options = match &bar {
            Some(bar) => options.with_progress(Arc::new(TerminalProgress { bar: bar.clone() })),
            None => options,
        };

        let task = RenderTask::with_indexes(asset, indexes, target).with_options(options);
        let output = queue.submit(task)?.wait()?;
        if let Some(bar) = bar {
            bar.finish_with_message("done");
        }

        output.strip()?.save(out)?;
        println!("{} {}", "saved".green().bold(), out.display());
    }

    Ok(())
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    apply_global_options(&cli.global)?;

    match cli.command {
        Commands::Probe { input, json } => {
            let asset = Asset::open(&input)?;
            let video = asset.metadata();
            if json {
                let payload = json!({
                    "path": input.display().to_string(),
                    "width": video.width,
                    "height": video.height,
                    "fps": video.frames_per_second,
                    "frame_count": video.frame_count,
                    "duration_seconds": video.duration.as_secs_f64(),
                    "codec": video.codec,
                    "stream_index": video.stream_index,
                });
                println!("{}", serde_json::to_string_pretty(&payload)?);
            } else {
                println!("Duration: {:?}", video.duration);
                println!(
                    "Video: {}x{} @ {:.2} fps, ~{} frames [{}]",
                    video.width, video.height, video.frames_per_second, video.frame_count, video.codec,
                );
            }
        }
        Commands::Render {
            input,
            out,
            width,
            height,
            at,
            frames,
            count,
            mode,
            separate,
            ext,
            clamp,
        } => {
            let target = TargetFrame::from_size(width, height);
            target.validate()?;

            let indexes = match (at, frames) {
                (Some(at), _) => Some(parse_timestamp_list(&at)?),
                (None, Some(frames)) => Some(parse_frame_list(&frames)?),
                (None, None) => None,
            };
            let options = base_render_options(&cli.global, &mode, clamp)?;

            render(
                &cli.global,
                &input,
                &out,
                target,
                indexes,
                count,
                options,
                separate,
                &ext,
            )?;
        }
        Commands::Completions { shell } => {
            let mut command = Cli::command();
            clap_complete::generate(shell, &mut command, "framestrip", &mut std::io::stdout());
        }
    }

    Ok(())
}

fn main() {
    if let Err(error) = run() {
        eprintln!("{} {error}", "error:".red().bold());
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{parse_frame_list, parse_timecode, parse_timestamp_list};
    use framestrip::FrameIndex;

    #[test]
    fn parse_timecode_formats() {
        let seconds = parse_timecode("75").unwrap();
        assert_eq!(seconds.as_secs(), 75);

        let mm_ss = parse_timecode("01:15").unwrap();
        assert_eq!(mm_ss.as_secs(), 75);

        let hh_mm_ss = parse_timecode("00:01:15.5").unwrap();
        assert_eq!(hh_mm_ss.as_millis(), 75_500);

        assert!(parse_timecode("").is_err());
        assert!(parse_timecode("1:2:3:4").is_err());
        assert!(parse_timecode("inf").is_err());
        assert!(parse_timecode("NaN").is_err());
        assert!(parse_timecode("1e30").is_err());
        assert!(parse_timecode("00:1e30").is_err());
        assert_eq!(parse_timecode("-3").unwrap(), Duration::ZERO);
    }

    #[test]
    fn parse_timestamp_list_rejects_unrepresentable_times() {
        assert!(parse_timestamp_list("0,inf").is_err());
    }

    #[test]
    fn parse_lists() {
        let timestamps = parse_timestamp_list("0, 1.5").unwrap();
        assert_eq!(timestamps.len(), 2);
        assert!(matches!(timestamps[1], FrameIndex::Timestamp(time) if time.as_millis() == 1500));

        let frames = parse_frame_list("3,10").unwrap();
        assert_eq!(frames, vec![FrameIndex::Frame(3), FrameIndex::Frame(10)]);
        assert!(parse_frame_list("3,x").is_err());
    }
}
