//! Clip assembly.
//!
//! [`VideoSequenceBuilder`] opens one video through a [`VideoBackend`], asks
//! the [`FrameSampler`] which frames to use, runs each through the
//! [`FrameTransformer`], and stacks them along the time axis into a
//! `(channels, sequence_length, height, width)` tensor.

use std::path::Path;

use ndarray::{Array4, ArrayViewMut4, Axis, ErrorKind, ShapeError};
use rand::Rng;

use crate::{
    configuration::ClipGeometry,
    decoder::{DecodedVideo, VideoBackend},
    error::VidbatchError,
    ffmpeg::FfmpegBackend,
    sampler::{FrameSampler, SamplingMode},
    transform::FrameTransformer,
};

/// Builds one clip tensor per video.
///
/// The builder holds no per-video state, so one instance can serve many
/// threads as long as the backend is shareable.
///
/// # Example
///
/// ```no_run
/// use rand::{SeedableRng, rngs::StdRng};
/// use vidbatch::{ClipGeometry, FfmpegBackend, SamplingMode, VideoSequenceBuilder};
///
/// let builder = VideoSequenceBuilder::new(FfmpegBackend, ClipGeometry::default())?;
/// let mut rng = StdRng::seed_from_u64(0);
/// let clip = builder.build("clip.avi".as_ref(), SamplingMode::Evaluation, &mut rng)?;
/// assert_eq!(clip.dim(), (3, 16, 112, 112));
/// # Ok::<(), vidbatch::VidbatchError>(())
/// ```
#[derive(Debug, Clone)]
pub struct VideoSequenceBuilder<B: VideoBackend = FfmpegBackend> {
    backend: B,
    geometry: ClipGeometry,
    sampler: FrameSampler,
    transformer: FrameTransformer,
}

impl<B: VideoBackend> VideoSequenceBuilder<B> {
    /// Create a builder over `backend` producing clips of `geometry`.
    ///
    /// # Errors
    ///
    /// Returns [`VidbatchError::InvalidCropSize`] or
    /// [`VidbatchError::InvalidOptions`] if the geometry is unusable.
    pub fn new(backend: B, geometry: ClipGeometry) -> Result<Self, VidbatchError> {
        let transformer = FrameTransformer::new(&geometry)?;
        Ok(Self {
            backend,
            geometry,
            sampler: FrameSampler::new(geometry.sequence_length),
            transformer,
        })
    }

    /// The decode backend.
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Clip geometry.
    pub fn geometry(&self) -> ClipGeometry {
        self.geometry
    }

    /// The temporal sampler in use.
    pub fn sampler(&self) -> &FrameSampler {
        &self.sampler
    }

    /// The spatial transformer in use.
    pub fn transformer(&self) -> &FrameTransformer {
        &self.transformer
    }

    /// Build a freshly allocated clip tensor for the video at `path`.
    ///
    /// # Errors
    ///
    /// - [`VidbatchError::InsufficientFrames`] if the video has fewer frames
    ///   than the sequence length.
    /// - Any open or decode error from the backend.
    pub fn build<R: Rng + ?Sized>(
        &self,
        path: &Path,
        mode: SamplingMode,
        rng: &mut R,
    ) -> Result<Array4<f32>, VidbatchError> {
        let mut clip = Array4::zeros(self.geometry.clip_shape());
        self.build_into(path, mode, rng, clip.view_mut())?;
        Ok(clip)
    }

    /// Build the clip for `path` directly into `output`, which must have
    /// shape `(channels, sequence_length, height, width)`.
    ///
    /// # Errors
    ///
    /// Same as [`build`](VideoSequenceBuilder::build), plus
    /// [`VidbatchError::ShapeError`] if `output` has the wrong shape.
    pub fn build_into<R: Rng + ?Sized>(
        &self,
        path: &Path,
        mode: SamplingMode,
        rng: &mut R,
        mut output: ArrayViewMut4<'_, f32>,
    ) -> Result<(), VidbatchError> {
        if output.dim() != self.geometry.clip_shape() {
            return Err(ShapeError::from_kind(ErrorKind::IncompatibleShape).into());
        }

        let mut video = self.backend.open(path)?;
        let frame_count = video.frame_count();

        let indices = self
            .sampler
            .select(frame_count, mode, rng)
            .ok_or_else(|| VidbatchError::InsufficientFrames {
                path: path.to_path_buf(),
                frame_count,
                sequence_length: self.geometry.sequence_length,
            })?;

        let frames = video.frames(&indices)?;
        if frames.len() != indices.len() {
            return Err(VidbatchError::VideoDecodeError(format!(
                "{}: backend returned {} frames for {} requested indices",
                path.display(),
                frames.len(),
                indices.len()
            )));
        }
        for (time_index, frame) in frames.iter().enumerate() {
            self.transformer
                .transform_into(frame, output.index_axis_mut(Axis(1), time_index));
        }

        Ok(())
    }
}
