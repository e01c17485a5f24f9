//! Reader configuration.
//!
//! [`ReaderOptions`] is a builder that threads clip geometry, epoch limits,
//! seeding, and progress reporting through [`MinibatchReader`](crate::MinibatchReader)
//! without widening every constructor.
//!
//! # Example
//!
//! ```no_run
//! use vidbatch::ReaderOptions;
//!
//! let options = ReaderOptions::new()
//!     .with_epoch_size_limit(200)
//!     .with_seed(7);
//! ```

use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::sync::Arc;

use crate::error::VidbatchError;
use crate::progress::{NoOpProgress, ProgressCallback};

/// Frames per clip used by C3D-style classifiers.
pub const DEFAULT_SEQUENCE_LENGTH: usize = 16;
/// Square crop edge fed to the network.
pub const DEFAULT_CROP_SIZE: u32 = 112;
/// Width of the bounding box frames are shrunk into before cropping.
pub const DEFAULT_RESIZE_WIDTH: u32 = 171;
/// Height of the bounding box frames are shrunk into before cropping.
pub const DEFAULT_RESIZE_HEIGHT: u32 = 128;
/// Clips are always RGB.
pub const CHANNEL_COUNT: usize = 3;

/// Geometry of a single clip tensor.
///
/// Shared by the [`FrameSampler`](crate::FrameSampler),
/// [`FrameTransformer`](crate::FrameTransformer) and
/// [`VideoSequenceBuilder`](crate::VideoSequenceBuilder).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClipGeometry {
    /// Frames per clip.
    pub sequence_length: usize,
    /// Output width in pixels.
    pub crop_width: u32,
    /// Output height in pixels.
    pub crop_height: u32,
    /// Width of the resize bounding box.
    pub resize_width: u32,
    /// Height of the resize bounding box.
    pub resize_height: u32,
}

impl Default for ClipGeometry {
    fn default() -> Self {
        Self {
            sequence_length: DEFAULT_SEQUENCE_LENGTH,
            crop_width: DEFAULT_CROP_SIZE,
            crop_height: DEFAULT_CROP_SIZE,
            resize_width: DEFAULT_RESIZE_WIDTH,
            resize_height: DEFAULT_RESIZE_HEIGHT,
        }
    }
}

impl ClipGeometry {
    /// Check that the crop fits strictly inside the resize box and the clip
    /// has at least one frame.
    ///
    /// # Errors
    ///
    /// - [`VidbatchError::InvalidCropSize`] if the crop is not smaller than
    ///   the resize bounds in both dimensions.
    /// - [`VidbatchError::InvalidOptions`] for a zero sequence length or a
    ///   zero crop dimension.
    pub fn validate(&self) -> Result<(), VidbatchError> {
        if self.sequence_length == 0 {
            return Err(VidbatchError::InvalidOptions(
                "sequence length must be greater than zero".to_string(),
            ));
        }
        if self.crop_width == 0 || self.crop_height == 0 {
            return Err(VidbatchError::InvalidOptions(format!(
                "crop size {}x{} must be non-zero",
                self.crop_width, self.crop_height
            )));
        }
        if self.crop_width >= self.resize_width || self.crop_height >= self.resize_height {
            return Err(VidbatchError::InvalidCropSize {
                width: self.crop_width,
                height: self.crop_height,
                max_width: self.resize_width,
                max_height: self.resize_height,
            });
        }
        Ok(())
    }

    /// Shape of one clip tensor: `(channels, sequence_length, height, width)`.
    pub fn clip_shape(&self) -> (usize, usize, usize, usize) {
        (
            CHANNEL_COUNT,
            self.sequence_length,
            self.crop_height as usize,
            self.crop_width as usize,
        )
    }
}

/// Configuration for a [`MinibatchReader`](crate::MinibatchReader).
///
/// A default-constructed options value
/// produces 16×112×112 RGB clips over the whole manifest.
#[derive(Clone)]
pub struct ReaderOptions {
    pub(crate) geometry: ClipGeometry,
    /// `None` means the whole manifest is one epoch.
    pub(crate) epoch_size_limit: Option<usize>,
    /// `None` seeds from OS entropy.
    pub(crate) seed: Option<u64>,
    pub(crate) progress: Arc<dyn ProgressCallback>,
    /// Fire the progress callback every N videos.
    pub(crate) progress_interval: u64,
    /// Only honoured when the `rayon` feature is enabled.
    pub(crate) parallel: bool,
}

impl Debug for ReaderOptions {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ReaderOptions")
            .field("geometry", &self.geometry)
            .field("epoch_size_limit", &self.epoch_size_limit)
            .field("seed", &self.seed)
            .field("progress_interval", &self.progress_interval)
            .field("parallel", &self.parallel)
            .finish_non_exhaustive()
    }
}

impl Default for ReaderOptions {
    fn default() -> Self {
        Self::new()
    }
}

impl ReaderOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self {
            geometry: ClipGeometry::default(),
            epoch_size_limit: None,
            seed: None,
            progress: Arc::new(NoOpProgress),
            progress_interval: 1,
            parallel: false,
        }
    }

    /// Set the number of frames per clip.
    #[must_use]
    pub fn with_sequence_length(mut self, sequence_length: usize) -> Self {
        self.geometry.sequence_length = sequence_length;
        self
    }

    /// Set the output crop size.
    ///
    /// Both dimensions must stay below the resize bounds; this is checked
    /// when the reader is constructed.
    #[must_use]
    pub fn with_crop_size(mut self, width: u32, height: u32) -> Self {
        self.geometry.crop_width = width;
        self.geometry.crop_height = height;
        self
    }

    /// Set the bounding box frames are shrunk into before cropping.
    #[must_use]
    pub fn with_resize_bounds(mut self, width: u32, height: u32) -> Self {
        self.geometry.resize_width = width;
        self.geometry.resize_height = height;
        self
    }

    /// Cap the number of videos served per epoch.
    #[must_use]
    pub fn with_epoch_size_limit(mut self, limit: usize) -> Self {
        self.epoch_size_limit = Some(limit);
        self
    }

    /// Seed the reader's random generator for reproducible epochs.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Attach a progress callback.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = callback;
        self
    }

    /// Set how often the progress callback fires. Clamped to a minimum of 1.
    #[must_use]
    pub fn with_progress_interval(mut self, interval: u64) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    /// Decode the videos of a batch concurrently.
    ///
    /// Has no effect unless the crate is built with the `rayon` feature.
    /// Batches are identical to sequential decoding for the same seed.
    #[must_use]
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// The clip geometry these options describe.
    pub fn geometry(&self) -> ClipGeometry {
        self.geometry
    }

    /// The configured epoch size cap, if any.
    pub fn epoch_size_limit(&self) -> Option<usize> {
        self.epoch_size_limit
    }

    /// The configured seed, if any.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}
