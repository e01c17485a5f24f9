//! # vidbatch
//!
//! Video minibatch reader for 3D-convolution video classifiers.
//!
//! `vidbatch` reads a manifest of `(video, label)` rows, decodes a fixed
//! number of frames from each video, crops and normalizes them, and hands
//! back `(N, 3, 16, 112, 112)` clip tensors with one-hot labels as
//! [`ndarray`] arrays, powered by FFmpeg via the
//! [`ffmpeg-next`](https://crates.io/crates/ffmpeg-next) crate.
//!
//! ## Quick Start
//!
//! ```no_run
//! use vidbatch::{MinibatchReader, VidbatchError};
//!
//! let mut train = MinibatchReader::open("VideoDataset/train_map.csv", 11, true)?;
//!
//! train.reset();
//! while train.has_more() {
//!     let batch = train.next_minibatch(2)?;
//!     assert_eq!(batch.inputs().shape()[1..], [3, 16, 112, 112]);
//!     assert_eq!(batch.targets().shape()[1], 11);
//! }
//! # Ok::<(), VidbatchError>(())
//! ```
//!
//! ## Pipeline
//!
//! - **[`Manifest`]**: `path,label` rows; relative paths resolve against the
//!   manifest's directory.
//! - **[`FrameSampler`]**: picks 16 frame indices, every other frame for
//!   long videos; centred for evaluation, randomly placed for training.
//! - **[`FrameTransformer`]**: shrink to fit 171×128, centre-crop 112×112,
//!   scale to `[-1, 1]`, channel-first.
//! - **[`VideoSequenceBuilder`]**: one `(3, 16, 112, 112)` clip per video.
//! - **[`MinibatchReader`]**: epoch shuffling and batch slicing.
//!
//! ## Custom backends
//!
//! Decoding goes through the [`VideoBackend`] / [`DecodedVideo`] traits.
//! [`FfmpegBackend`] is the default; any other decoder can be plugged in with
//! [`MinibatchReader::with_backend`].
//!
//! ### Optional Features
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `rayon` | [`ReaderOptions::with_parallel`] decodes the videos of a batch across rayon threads |
//! | `full`  | Enables all of the above |
//!
//! ## Requirements
//!
//! FFmpeg development libraries must be installed on your system.

pub mod configuration;
pub mod decoder;
pub mod error;
pub mod ffmpeg;
pub mod manifest;
pub mod metadata;
#[cfg(feature = "rayon")]
mod parallel;
pub mod progress;
pub mod reader;
pub mod sampler;
pub mod sequence;
pub mod transform;
mod utilities;

pub use configuration::{
    CHANNEL_COUNT, ClipGeometry, DEFAULT_CROP_SIZE, DEFAULT_RESIZE_HEIGHT, DEFAULT_RESIZE_WIDTH,
    DEFAULT_SEQUENCE_LENGTH, ReaderOptions,
};
pub use decoder::{DecodedVideo, VideoBackend};
pub use error::VidbatchError;
pub use ffmpeg::{
    FfmpegBackend, FfmpegLogLevel, FfmpegVideo, get_ffmpeg_log_level, set_ffmpeg_log_level,
};
pub use manifest::{Manifest, ManifestEntry};
pub use metadata::VideoMetadata;
pub use progress::{ProgressCallback, ProgressInfo};
pub use reader::{Minibatch, MinibatchReader};
pub use sampler::{FrameSampler, FrameWindow, SamplingMode};
pub use sequence::VideoSequenceBuilder;
pub use transform::FrameTransformer;
