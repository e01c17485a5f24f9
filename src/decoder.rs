//! Decode backend capability traits.
//!
//! The reader never talks to a codec library directly. Anything that can open
//! a video, report how many frames it has, and hand back RGB frames by index
//! can feed clips into a [`MinibatchReader`](crate::MinibatchReader):
//!
//! - [`FfmpegBackend`](crate::FfmpegBackend) is the default, built on
//!   `ffmpeg-next`.
//! - Tests and synthetic datasets implement [`VideoBackend`] over in-memory
//!   frames.

use std::path::Path;

use image::RgbImage;

use crate::error::VidbatchError;

/// Opens videos.
///
/// Backends are shared across worker threads when parallel decoding is
/// enabled, hence the `Send + Sync` bound.
pub trait VideoBackend: Send + Sync {
    /// The per-file handle produced by [`open`](VideoBackend::open).
    type Video: DecodedVideo;

    /// Open the video at `path`.
    ///
    /// # Errors
    ///
    /// Implementations return [`VidbatchError::FileOpen`] or
    /// [`VidbatchError::NoVideoStream`] when the file is unusable.
    fn open(&self, path: &Path) -> Result<Self::Video, VidbatchError>;
}

/// An opened video that frames can be pulled from by index.
pub trait DecodedVideo {
    /// Total number of decodable frames.
    fn frame_count(&self) -> u64;

    /// Decode the frame at `index` (0-based) as 8-bit RGB.
    ///
    /// # Errors
    ///
    /// Returns [`VidbatchError::FrameOutOfRange`] for an index at or past
    /// [`frame_count`](DecodedVideo::frame_count), or a decode error.
    fn frame(&mut self, index: u64) -> Result<RgbImage, VidbatchError>;

    /// Decode several frames, returned in the order of `indices`.
    ///
    /// The default decodes each index independently. Backends with costly
    /// seeks should override this with a single forward pass.
    fn frames(&mut self, indices: &[u64]) -> Result<Vec<RgbImage>, VidbatchError> {
        indices.iter().map(|&index| self.frame(index)).collect()
    }
}
