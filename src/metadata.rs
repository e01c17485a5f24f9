//! Video stream metadata.
//!
//! [`VideoMetadata`] is read once when an [`FfmpegVideo`](crate::FfmpegVideo)
//! is opened and cached for the lifetime of the handle.

/// Metadata for the decoded video stream.
///
/// Includes dimensions, frame rate, frame count, and codec name.
#[derive(Debug, Clone)]
#[must_use]
pub struct VideoMetadata {
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Frames per second (may be approximate for variable-frame-rate content).
    pub frames_per_second: f64,
    /// Total number of frames. Taken from the container when it records one,
    /// otherwise estimated from duration and frame rate.
    pub frame_count: u64,
    /// Codec name (e.g. `"h264"`, `"mpeg4"`, `"xvid"`).
    pub codec: String,
}
