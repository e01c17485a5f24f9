//! Temporal frame selection.
//!
//! [`FrameSampler`] picks which `sequence_length` frames of a video make up a
//! clip. Videos longer than twice the clip length are sampled every other
//! frame so a clip covers more motion; otherwise consecutive frames are used.
//! Evaluation centres the window, training places it uniformly at random.

use rand::Rng;

/// Whether clips are drawn for training (randomized) or evaluation (fixed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SamplingMode {
    /// Centre the window in the video. Deterministic.
    #[default]
    Evaluation,
    /// Place the window uniformly at random on every call.
    Training,
}

impl SamplingMode {
    /// `Training` when `is_training`, `Evaluation` otherwise.
    pub fn from_training(is_training: bool) -> Self {
        if is_training {
            SamplingMode::Training
        } else {
            SamplingMode::Evaluation
        }
    }

    /// Returns `true` for [`SamplingMode::Training`].
    pub fn is_training(self) -> bool {
        self == SamplingMode::Training
    }
}

/// The range of source frames a clip is drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameWindow {
    /// First selected frame.
    pub start: u64,
    /// Distance between selected frames (1 or 2).
    pub step: u64,
    /// Number of source frames the window covers.
    pub span: u64,
}

/// Chooses clip frame indices from a video's frame count.
///
/// # Example
///
/// ```
/// use rand::{SeedableRng, rngs::StdRng};
/// use vidbatch::{FrameSampler, SamplingMode};
///
/// let sampler = FrameSampler::new(16);
/// let mut rng = StdRng::seed_from_u64(0);
/// let indices = sampler.select(40, SamplingMode::Evaluation, &mut rng).unwrap();
/// assert_eq!(indices.first(), Some(&4));
/// assert_eq!(indices.last(), Some(&34));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSampler {
    sequence_length: usize,
}

impl FrameSampler {
    /// Create a sampler producing `sequence_length` indices per clip.
    pub fn new(sequence_length: usize) -> Self {
        Self { sequence_length }
    }

    /// Frames per clip.
    pub fn sequence_length(&self) -> usize {
        self.sequence_length
    }

    /// Compute the sampling window for a video of `frame_count` frames.
    ///
    /// Returns `None` when the video is shorter than the clip.
    pub fn window<R: Rng + ?Sized>(
        &self,
        frame_count: u64,
        mode: SamplingMode,
        rng: &mut R,
    ) -> Option<FrameWindow> {
        let length = self.sequence_length as u64;
        if frame_count < length {
            return None;
        }

        let (step, span) = if frame_count > 2 * length {
            (2, 2 * length)
        } else {
            (1, length)
        };

        let start = match mode {
            SamplingMode::Evaluation => frame_count / 2 - span / 2,
            // Inclusive upper bound: the window may end on the last frame.
            SamplingMode::Training => rng.gen_range(0..=frame_count - span),
        };

        Some(FrameWindow { start, step, span })
    }

    /// Select `sequence_length` frame indices, all in `[0, frame_count)`.
    ///
    /// Returns `None` when `frame_count < sequence_length`.
    pub fn select<R: Rng + ?Sized>(
        &self,
        frame_count: u64,
        mode: SamplingMode,
        rng: &mut R,
    ) -> Option<Vec<u64>> {
        let window = self.window(frame_count, mode, rng)?;
        let indices: Vec<u64> = (0..self.sequence_length as u64)
            .map(|i| window.start + window.step * i)
            .collect();
        log::trace!(
            "Sampled {} of {frame_count} frames starting at {} (step {})",
            indices.len(),
            window.start,
            window.step
        );
        Some(indices)
    }
}
