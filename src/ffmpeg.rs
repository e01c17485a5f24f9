//! FFmpeg decode backend.
//!
//! [`FfmpegBackend`] implements [`VideoBackend`] on top of
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next). Requested frames
//! are decoded in one forward pass after a single seek, converted to RGB24,
//! and returned as [`image::RgbImage`] values.
//!
//! FFmpeg also has its own logging system, separate from the Rust
//! [`log`](https://crates.io/crates/log) crate, which prints warnings to
//! stderr. [`set_ffmpeg_log_level`] tunes it without importing `ffmpeg-next`
//! directly.
//!
//! # Example
//!
//! ```no_run
//! use vidbatch::{DecodedVideo, FfmpegLogLevel, FfmpegVideo};
//!
//! vidbatch::set_ffmpeg_log_level(FfmpegLogLevel::Error);
//!
//! let mut video = FfmpegVideo::open("clip.avi")?;
//! println!("{} frames", video.frame_count());
//! let first = video.frame(0)?;
//! # Ok::<(), vidbatch::VidbatchError>(())
//! ```

use std::{
    fmt::{Debug, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
};

use ffmpeg_next::{
    Rational,
    codec::context::Context as CodecContext,
    decoder::Video as VideoDecoder,
    format::{Pixel, context::Input},
    frame::Video as VideoFrame,
    media::Type,
    software::scaling::{Context as ScalingContext, Flags as ScalingFlags},
    util::log::Level,
};
use image::RgbImage;

use crate::{
    decoder::{DecodedVideo, VideoBackend},
    error::VidbatchError,
    metadata::VideoMetadata,
    utilities,
};

/// The default [`VideoBackend`], backed by the system FFmpeg libraries.
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend;

impl VideoBackend for FfmpegBackend {
    type Video = FfmpegVideo;

    fn open(&self, path: &Path) -> Result<FfmpegVideo, VidbatchError> {
        FfmpegVideo::open(path)
    }
}

/// An opened video file.
///
/// Holds the demuxer context and the metadata of the best video stream.
pub struct FfmpegVideo {
    input_context: Input,
    video_stream_index: usize,
    metadata: VideoMetadata,
    file_path: PathBuf,
}

impl Debug for FfmpegVideo {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("FfmpegVideo")
            .field("video_stream_index", &self.video_stream_index)
            .field("metadata", &self.metadata)
            .field("file_path", &self.file_path)
            .finish_non_exhaustive()
    }
}

impl FfmpegVideo {
    /// Open a video file and cache its stream metadata.
    ///
    /// Initializes FFmpeg (idempotent) and locates the best video stream.
    ///
    /// # Errors
    ///
    /// - [`VidbatchError::FileOpen`] if the file cannot be opened.
    /// - [`VidbatchError::NoVideoStream`] if it has no video stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, VidbatchError> {
        let path = path.as_ref();
        let file_path = path.to_path_buf();

        log::debug!("Opening video file: {}", file_path.display());

        ffmpeg_next::init().map_err(|error| VidbatchError::FileOpen {
            path: file_path.clone(),
            reason: format!("FFmpeg initialisation failed: {error}"),
        })?;

        let input_context =
            ffmpeg_next::format::input(&path).map_err(|error| VidbatchError::FileOpen {
                path: file_path.clone(),
                reason: error.to_string(),
            })?;

        let stream = input_context
            .streams()
            .best(Type::Video)
            .ok_or(VidbatchError::NoVideoStream)?;
        let video_stream_index = stream.index();

        let decoder_context =
            CodecContext::from_parameters(stream.parameters()).map_err(|error| {
                VidbatchError::FileOpen {
                    path: file_path.clone(),
                    reason: format!("Failed to read video codec parameters: {error}"),
                }
            })?;
        let video_decoder =
            decoder_context
                .decoder()
                .video()
                .map_err(|error| VidbatchError::FileOpen {
                    path: file_path.clone(),
                    reason: format!("Failed to create video decoder: {error}"),
                })?;

        let frame_rate = stream.avg_frame_rate();
        let frames_per_second = if frame_rate.denominator() != 0 {
            frame_rate.numerator() as f64 / frame_rate.denominator() as f64
        } else {
            let rate = stream.rate();
            if rate.denominator() != 0 {
                rate.numerator() as f64 / rate.denominator() as f64
            } else {
                0.0
            }
        };

        // Prefer the container's own count; fall back to duration × rate.
        let frame_count = if stream.frames() > 0 {
            stream.frames() as u64
        } else {
            let duration_seconds = if stream.duration() > 0 {
                utilities::pts_to_seconds(stream.duration(), stream.time_base())
            } else if input_context.duration() > 0 {
                input_context.duration() as f64 / 1_000_000.0
            } else {
                0.0
            };
            (duration_seconds * frames_per_second) as u64
        };

        if frame_count == 0 {
            log::warn!(
                "{} reports no frames; it will be rejected by the sequence builder",
                file_path.display()
            );
        }

        let codec = video_decoder
            .codec()
            .map(|codec| codec.name().to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let metadata = VideoMetadata {
            width: video_decoder.width(),
            height: video_decoder.height(),
            frames_per_second,
            frame_count,
            codec,
        };

        Ok(Self {
            input_context,
            video_stream_index,
            metadata,
            file_path,
        })
    }

    /// Metadata cached at open time.
    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Path the video was opened from.
    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// Decode a sorted, deduplicated list of frame numbers.
    ///
    /// Returns one image per requested number, in the same order.
    fn decode_sorted(&mut self, wanted: &[u64]) -> Result<Vec<RgbImage>, VidbatchError> {
        let frames_per_second = self.metadata.frames_per_second;

        let stream = self
            .input_context
            .stream(self.video_stream_index)
            .ok_or(VidbatchError::NoVideoStream)?;
        let time_base = stream.time_base();
        // Containers may start their clock past zero; frame numbers are
        // counted from the first presentation timestamp.
        let start_pts = match stream.start_time() {
            // AV_NOPTS_VALUE
            i64::MIN => 0,
            pts => pts,
        };
        let decoder_context = CodecContext::from_parameters(stream.parameters())?;
        let mut decoder = decoder_context.decoder().video()?;

        let mut scaler = ScalingContext::get(
            decoder.format(),
            decoder.width(),
            decoder.height(),
            Pixel::RGB24,
            decoder.width(),
            decoder.height(),
            ScalingFlags::BILINEAR,
        )?;

        // Every pass repositions the demuxer, since an earlier call may have
        // left it anywhere. Without a frame rate, timestamps cannot be mapped
        // to frame numbers, so rewind to the start and count instead.
        let use_timestamps = frames_per_second > 0.0;
        let start_offset = (utilities::pts_to_seconds(start_pts, time_base) * 1_000_000.0) as i64;
        let seek_timestamp = if use_timestamps {
            utilities::frame_number_to_seek_timestamp(wanted[0], frames_per_second) + start_offset
        } else {
            start_offset
        };
        self.input_context.seek(seek_timestamp, ..seek_timestamp)?;

        let mut collector = FrameCollector {
            wanted,
            collected: Vec::with_capacity(wanted.len()),
            last_number: None,
            last_image: None,
            start_pts,
            time_base,
            frames_per_second,
            use_timestamps,
        };

        let mut decoded_frame = VideoFrame::empty();
        let mut rgb_frame = VideoFrame::empty();

        for (stream, packet) in self.input_context.packets() {
            if collector.is_done() {
                break;
            }
            if stream.index() != self.video_stream_index {
                continue;
            }

            decoder.send_packet(&packet)?;
            collector.drain(&mut decoder, &mut scaler, &mut decoded_frame, &mut rgb_frame)?;
        }

        if !collector.is_done() {
            decoder.send_eof()?;
            collector.drain(&mut decoder, &mut scaler, &mut decoded_frame, &mut rgb_frame)?;
        }

        collector.finish(&self.file_path)
    }
}

impl DecodedVideo for FfmpegVideo {
    fn frame_count(&self) -> u64 {
        self.metadata.frame_count
    }

    fn frame(&mut self, index: u64) -> Result<RgbImage, VidbatchError> {
        self.frames(&[index])?
            .pop()
            .ok_or_else(|| VidbatchError::VideoDecodeError(format!("Frame {index} was not decoded")))
    }

    fn frames(&mut self, indices: &[u64]) -> Result<Vec<RgbImage>, VidbatchError> {
        if indices.is_empty() {
            return Ok(Vec::new());
        }

        let total_frames = self.metadata.frame_count;
        if let Some(&frame_number) = indices.iter().find(|&&index| index >= total_frames) {
            return Err(VidbatchError::FrameOutOfRange {
                frame_number,
                total_frames,
            });
        }

        let mut sorted_numbers = indices.to_vec();
        sorted_numbers.sort_unstable();
        sorted_numbers.dedup();

        let decoded = self.decode_sorted(&sorted_numbers)?;

        indices
            .iter()
            .map(|index| {
                sorted_numbers
                    .binary_search(index)
                    .map(|position| decoded[position].clone())
                    .map_err(|_| {
                        VidbatchError::VideoDecodeError(format!("Frame {index} was not decoded"))
                    })
            })
            .collect()
    }
}

/// Walks decoded frames and keeps the ones whose numbers were requested.
struct FrameCollector<'a> {
    wanted: &'a [u64],
    collected: Vec<RgbImage>,
    last_number: Option<u64>,
    last_image: Option<RgbImage>,
    start_pts: i64,
    time_base: Rational,
    frames_per_second: f64,
    use_timestamps: bool,
}

impl FrameCollector<'_> {
    fn is_done(&self) -> bool {
        self.collected.len() >= self.wanted.len()
    }

    fn drain(
        &mut self,
        decoder: &mut VideoDecoder,
        scaler: &mut ScalingContext,
        decoded_frame: &mut VideoFrame,
        rgb_frame: &mut VideoFrame,
    ) -> Result<(), VidbatchError> {
        while !self.is_done() && decoder.receive_frame(decoded_frame).is_ok() {
            let timestamp = decoded_frame.timestamp().or_else(|| decoded_frame.pts());
            let current_number = match (self.use_timestamps, timestamp) {
                (true, Some(pts)) => utilities::pts_to_frame_number(
                    pts - self.start_pts,
                    self.time_base,
                    self.frames_per_second,
                ),
                _ => self.last_number.map_or(0, |number| number + 1),
            };
            self.last_number = Some(current_number);

            let next_wanted = self.wanted[self.collected.len()];
            if next_wanted > current_number {
                continue;
            }

            scaler.run(decoded_frame, rgb_frame)?;
            let image = convert_frame_to_image(rgb_frame)?;

            // A seek can land past a requested frame; the closest later
            // frame stands in for it.
            while !self.is_done() && self.wanted[self.collected.len()] <= current_number {
                self.collected.push(image.clone());
            }
            self.last_image = Some(image);
        }
        Ok(())
    }

    fn finish(mut self, path: &Path) -> Result<Vec<RgbImage>, VidbatchError> {
        if self.is_done() {
            return Ok(self.collected);
        }

        // Estimated frame counts can overshoot the real stream by a few
        // frames; pad the tail with the final decoded frame.
        let last_image = self.last_image.take().ok_or_else(|| {
            VidbatchError::VideoDecodeError(format!(
                "No frames could be decoded from {}",
                path.display()
            ))
        })?;
        log::warn!(
            "{}: stream ended before frame {}; reusing the last decoded frame",
            path.display(),
            self.wanted[self.collected.len()]
        );
        while !self.is_done() {
            self.collected.push(last_image.clone());
        }
        Ok(self.collected)
    }
}

/// Convert a scaled RGB24 video frame to an [`image::RgbImage`].
fn convert_frame_to_image(rgb_frame: &VideoFrame) -> Result<RgbImage, VidbatchError> {
    let width = rgb_frame.width();
    let height = rgb_frame.height();
    let buffer = utilities::frame_to_rgb_buffer(rgb_frame);
    RgbImage::from_raw(width, height, buffer).ok_or_else(|| {
        VidbatchError::VideoDecodeError(
            "Failed to construct RGB image from decoded frame data".to_string(),
        )
    })
}

/// Verbosity of FFmpeg's own stderr logging, from silent to most verbose.
///
/// Variants are declared in the same order as [`LOG_LEVELS`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FfmpegLogLevel {
    Quiet,
    Panic,
    Fatal,
    /// Recoverable errors only. A good setting for long training runs.
    Error,
    /// FFmpeg's default.
    Warning,
    Info,
    Verbose,
    Debug,
    Trace,
}

/// `(level, FFmpeg level, name)` indexed by the enum discriminant.
const LOG_LEVELS: [(FfmpegLogLevel, Level, &str); 9] = [
    (FfmpegLogLevel::Quiet, Level::Quiet, "quiet"),
    (FfmpegLogLevel::Panic, Level::Panic, "panic"),
    (FfmpegLogLevel::Fatal, Level::Fatal, "fatal"),
    (FfmpegLogLevel::Error, Level::Error, "error"),
    (FfmpegLogLevel::Warning, Level::Warning, "warning"),
    (FfmpegLogLevel::Info, Level::Info, "info"),
    (FfmpegLogLevel::Verbose, Level::Verbose, "verbose"),
    (FfmpegLogLevel::Debug, Level::Debug, "debug"),
    (FfmpegLogLevel::Trace, Level::Trace, "trace"),
];

impl FfmpegLogLevel {
    /// Lower-case name, as accepted by [`from_name`](FfmpegLogLevel::from_name).
    pub fn name(self) -> &'static str {
        LOG_LEVELS[self as usize].2
    }

    /// Parse a level name such as `"error"` or `"warn"` (case-insensitive).
    pub fn from_name(value: &str) -> Option<Self> {
        let value = value.to_ascii_lowercase();
        let value = if value == "warn" { "warning" } else { value.as_str() };
        LOG_LEVELS
            .iter()
            .find(|(_, _, name)| *name == value)
            .map(|&(level, _, _)| level)
    }

    fn to_ffmpeg_level(self) -> Level {
        LOG_LEVELS[self as usize].1
    }

    fn from_ffmpeg_level(level: Level) -> Option<Self> {
        LOG_LEVELS
            .iter()
            .find(|(_, ffmpeg_level, _)| *ffmpeg_level == level)
            .map(|&(level, _, _)| level)
    }
}

/// Set how much FFmpeg itself prints to stderr. Output from this crate goes
/// through `log` and is unaffected.
pub fn set_ffmpeg_log_level(level: FfmpegLogLevel) {
    ffmpeg_next::util::log::set_level(level.to_ffmpeg_level());
}

/// The level FFmpeg is currently logging at, if it is one of the named ones.
pub fn get_ffmpeg_log_level() -> Option<FfmpegLogLevel> {
    ffmpeg_next::util::log::get_level()
        .ok()
        .and_then(FfmpegLogLevel::from_ffmpeg_level)
}
