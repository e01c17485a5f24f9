//! Parallel clip decoding.
//!
//! Clips within a batch are independent: each worker opens its own video
//! through the shared backend and decodes into its own tensor, so there is no
//! shared mutable state besides the progress tracker. Results come back in
//! batch order regardless of which worker finishes first.

use std::{path::Path, sync::Mutex};

use ::rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use ndarray::Array4;
use rand::{SeedableRng, rngs::StdRng};

use crate::{
    decoder::VideoBackend, error::VidbatchError, progress::BatchProgress,
    sampler::SamplingMode, sequence::VideoSequenceBuilder,
};

/// One video to turn into a clip.
pub(crate) struct ClipJob<'a> {
    pub(crate) path: &'a Path,
    /// Seeds the clip's temporal jitter.
    pub(crate) seed: u64,
}

/// Build one clip per job on the rayon thread pool.
///
/// Fails with the first error any worker hits.
pub(crate) fn build_clips<B: VideoBackend>(
    builder: &VideoSequenceBuilder<B>,
    jobs: &[ClipJob<'_>],
    mode: SamplingMode,
    tracker: &mut BatchProgress,
) -> Result<Vec<Array4<f32>>, VidbatchError> {
    let tracker = Mutex::new(tracker);

    jobs.par_iter()
        .map(|job| {
            let mut rng = StdRng::seed_from_u64(job.seed);
            let clip = builder.build(job.path, mode, &mut rng)?;
            if let Ok(mut tracker) = tracker.lock() {
                tracker.clip_done(job.path.to_path_buf());
            }
            Ok(clip)
        })
        .collect()
}
