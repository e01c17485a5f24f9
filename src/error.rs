//! Error types for the `vidbatch` crate.
//!
//! This module defines [`VidbatchError`], the unified error type returned by
//! all fallible operations in the crate. Errors carry the manifest or video
//! path involved, so a failed batch can be traced back to the offending file.

use std::{io::Error as IoError, path::PathBuf};

use ffmpeg_next::Error as FfmpegError;
use image::ImageError;
use ndarray::ShapeError;
use thiserror::Error;

/// The unified error type for all `vidbatch` operations.
///
/// Every public method that can fail returns `Result<T, VidbatchError>`.
/// Nothing is retried internally: a single undecodable video fails the whole
/// [`next_minibatch`](crate::MinibatchReader::next_minibatch) call.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum VidbatchError {
    /// The manifest could not be read or contains an invalid row.
    #[error("Failed to load dataset manifest {path}: {reason}")]
    DatasetLoad {
        /// Path of the manifest file.
        path: PathBuf,
        /// What was wrong with it.
        reason: String,
    },

    /// A video is shorter than the configured sequence length.
    #[error(
        "Sequence length {sequence_length} is larger than the total number of frames {frame_count} in {path}"
    )]
    InsufficientFrames {
        /// The offending video.
        path: PathBuf,
        /// Number of frames the decoder reported.
        frame_count: u64,
        /// Number of frames each clip needs.
        sequence_length: usize,
    },

    /// The crop size does not fit inside the resize bounding box.
    #[error(
        "Crop size {width}x{height} must be smaller than the resize bounds {max_width}x{max_height}"
    )]
    InvalidCropSize {
        /// Configured crop width.
        width: u32,
        /// Configured crop height.
        height: u32,
        /// Resize bounding-box width.
        max_width: u32,
        /// Resize bounding-box height.
        max_height: u32,
    },

    /// `next_minibatch` was called after the epoch ended without a `reset`.
    #[error("Reached the end of the epoch (batch start {batch_start}, epoch size {epoch_size}); call reset() first")]
    ExhaustedEpoch {
        /// Cursor position at the time of the call.
        batch_start: usize,
        /// Number of videos in one epoch.
        epoch_size: usize,
    },

    /// Reader or transformer options are inconsistent.
    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    /// The video file could not be opened.
    #[error("Failed to open video file at {path}: {reason}")]
    FileOpen {
        /// Path that was passed to the backend.
        path: PathBuf,
        /// Underlying reason the open failed.
        reason: String,
    },

    /// The file does not contain a video stream.
    #[error("No video stream found in file")]
    NoVideoStream,

    /// A video frame could not be decoded.
    #[error("Failed to decode video frame: {0}")]
    VideoDecodeError(String),

    /// The requested frame number exceeds the total frame count.
    #[error("Frame {frame_number} is out of range (video has {total_frames} frames)")]
    FrameOutOfRange {
        /// The frame number that was requested.
        frame_number: u64,
        /// The total number of frames in the video.
        total_frames: u64,
    },

    /// An error originating from the FFmpeg libraries.
    #[error("FFmpeg error: {0}")]
    FfmpegError(String),

    /// An I/O error occurred while reading files.
    #[error("I/O error: {0}")]
    IoError(#[from] IoError),

    /// An error from the `image` crate during frame conversion.
    #[error("Image processing error: {0}")]
    ImageError(#[from] ImageError),

    /// A tensor could not be assembled with the expected shape.
    #[error("Tensor shape error: {0}")]
    ShapeError(#[from] ShapeError),
}

impl From<FfmpegError> for VidbatchError {
    fn from(error: FfmpegError) -> Self {
        VidbatchError::FfmpegError(error.to_string())
    }
}
