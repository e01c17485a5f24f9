//! The minibatch reader.
//!
//! [`MinibatchReader`] owns a [`Manifest`], an index permutation, and a batch
//! cursor. A training loop drives it one epoch at a time:
//!
//! ```no_run
//! use vidbatch::{MinibatchReader, VidbatchError};
//!
//! let mut reader = MinibatchReader::open("VideoDataset/train_map.csv", 11, true)?;
//! for _epoch in 0..30 {
//!     reader.reset();
//!     while reader.has_more() {
//!         let batch = reader.next_minibatch(2)?;
//!         // Use batch.len(), not the requested size: the tail batch is short.
//!         let (videos, labels) = (batch.inputs(), batch.targets());
//!     }
//! }
//! # Ok::<(), VidbatchError>(())
//! ```

use std::path::Path;

use ndarray::{Array2, Array5, ArrayView2, ArrayView5, Axis};
use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};

use crate::{
    configuration::ReaderOptions,
    decoder::VideoBackend,
    error::VidbatchError,
    ffmpeg::FfmpegBackend,
    manifest::Manifest,
    progress::BatchProgress,
    sampler::SamplingMode,
    sequence::VideoSequenceBuilder,
};

/// One batch of clips and their one-hot labels.
///
/// `inputs` has shape `(len, 3, sequence_length, height, width)` and
/// `targets` has shape `(len, label_count)`; row `i` of both belongs to
/// manifest entry `dataset_indices[i]`.
#[derive(Debug, Clone)]
pub struct Minibatch {
    inputs: Array5<f32>,
    targets: Array2<f32>,
    dataset_indices: Vec<usize>,
}

impl Minibatch {
    /// Number of clips actually in this batch. May be smaller than the
    /// requested size at the end of an epoch.
    pub fn len(&self) -> usize {
        self.dataset_indices.len()
    }

    /// Whether the batch holds no clips.
    pub fn is_empty(&self) -> bool {
        self.dataset_indices.is_empty()
    }

    /// Stacked clips, `(N, C, T, H, W)`.
    pub fn inputs(&self) -> ArrayView5<'_, f32> {
        self.inputs.view()
    }

    /// Stacked one-hot labels, `(N, label_count)`.
    pub fn targets(&self) -> ArrayView2<'_, f32> {
        self.targets.view()
    }

    /// Manifest positions of the clips, in batch order.
    pub fn dataset_indices(&self) -> &[usize] {
        &self.dataset_indices
    }

    /// Take ownership of `(inputs, targets, len)`.
    pub fn into_parts(self) -> (Array5<f32>, Array2<f32>, usize) {
        let len = self.dataset_indices.len();
        (self.inputs, self.targets, len)
    }
}

/// Serves shuffled (training) or ordered (evaluation) minibatches of clips.
///
/// The permutation and cursor change only through [`reset`](MinibatchReader::reset)
/// and [`next_minibatch`](MinibatchReader::next_minibatch). The reader is
/// not meant to be shared between threads without external locking.
pub struct MinibatchReader<B: VideoBackend = FfmpegBackend, R: Rng = StdRng> {
    manifest: Manifest,
    targets: Array2<f32>,
    indices: Vec<usize>,
    batch_start: usize,
    epoch_size: usize,
    mode: SamplingMode,
    builder: VideoSequenceBuilder<B>,
    rng: R,
    options: ReaderOptions,
}

impl MinibatchReader<FfmpegBackend, StdRng> {
    /// Load `manifest_path` and decode with FFmpeg using default options.
    ///
    /// # Errors
    ///
    /// Returns [`VidbatchError::DatasetLoad`] if the manifest is missing,
    /// malformed, or has a label outside `[0, label_count)`.
    pub fn open<P: AsRef<Path>>(
        manifest_path: P,
        label_count: usize,
        is_training: bool,
    ) -> Result<Self, VidbatchError> {
        Self::open_with_options(manifest_path, label_count, is_training, ReaderOptions::new())
    }

    /// Load `manifest_path` and decode with FFmpeg using `options`.
    ///
    /// # Errors
    ///
    /// As [`open`](MinibatchReader::open), plus
    /// [`VidbatchError::InvalidCropSize`] for unusable clip geometry.
    pub fn open_with_options<P: AsRef<Path>>(
        manifest_path: P,
        label_count: usize,
        is_training: bool,
        options: ReaderOptions,
    ) -> Result<Self, VidbatchError> {
        let manifest = Manifest::load(manifest_path, label_count)?;
        MinibatchReader::with_backend(manifest, is_training, options, FfmpegBackend)
    }
}

impl<B: VideoBackend> MinibatchReader<B, StdRng> {
    /// Create a reader over an already-loaded manifest and a custom backend.
    ///
    /// The random generator is seeded from [`ReaderOptions::with_seed`], or
    /// from OS entropy when no seed is set.
    ///
    /// # Errors
    ///
    /// Returns [`VidbatchError::InvalidCropSize`] or
    /// [`VidbatchError::InvalidOptions`] for unusable clip geometry.
    pub fn with_backend(
        manifest: Manifest,
        is_training: bool,
        options: ReaderOptions,
        backend: B,
    ) -> Result<Self, VidbatchError> {
        let rng = match options.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(manifest, is_training, options, backend, rng)
    }
}

impl<B: VideoBackend, R: Rng> MinibatchReader<B, R> {
    /// Create a reader with an explicit random generator.
    ///
    /// `rng` drives both the epoch shuffle and the per-clip temporal jitter;
    /// the seed in `options` is ignored.
    ///
    /// # Errors
    ///
    /// Same as [`with_backend`](MinibatchReader::with_backend).
    pub fn with_rng(
        manifest: Manifest,
        is_training: bool,
        options: ReaderOptions,
        backend: B,
        mut rng: R,
    ) -> Result<Self, VidbatchError> {
        let builder = VideoSequenceBuilder::new(backend, options.geometry)?;

        let targets = manifest.one_hot_targets();
        let mut indices: Vec<usize> = (0..manifest.len()).collect();
        if is_training {
            indices.shuffle(&mut rng);
        }
        let epoch_size = options
            .epoch_size_limit
            .map_or(manifest.len(), |limit| limit.min(manifest.len()));

        log::debug!(
            "Reader over {} videos (epoch size {epoch_size}, training: {is_training})",
            manifest.len()
        );

        Ok(Self {
            manifest,
            targets,
            indices,
            batch_start: 0,
            epoch_size,
            mode: SamplingMode::from_training(is_training),
            builder,
            rng,
            options,
        })
    }

    /// Number of videos served per epoch.
    pub fn size(&self) -> usize {
        self.epoch_size
    }

    /// Whether the current epoch has videos left.
    pub fn has_more(&self) -> bool {
        self.batch_start < self.epoch_size
    }

    /// Start a new epoch: reshuffle when training and rewind the cursor.
    pub fn reset(&mut self) {
        if self.mode.is_training() {
            self.indices.shuffle(&mut self.rng);
        }
        self.batch_start = 0;
        log::info!(
            "Epoch reset (size {}, shuffled: {})",
            self.epoch_size,
            self.mode.is_training()
        );
    }

    /// Build the next batch of up to `requested_size` clips.
    ///
    /// The returned batch holds `min(requested_size, size() - cursor)` clips;
    /// use [`Minibatch::len`] rather than `requested_size` downstream.
    ///
    /// # Errors
    ///
    /// - [`VidbatchError::ExhaustedEpoch`] if the epoch is already used up
    ///   and [`reset`](MinibatchReader::reset) has not been called.
    /// - [`VidbatchError::InsufficientFrames`] or any decode error from any
    ///   video in the batch. The cursor does not advance on failure.
    pub fn next_minibatch(&mut self, requested_size: usize) -> Result<Minibatch, VidbatchError> {
        if self.batch_start >= self.epoch_size {
            return Err(VidbatchError::ExhaustedEpoch {
                batch_start: self.batch_start,
                epoch_size: self.epoch_size,
            });
        }

        let batch_end = self
            .batch_start
            .saturating_add(requested_size)
            .min(self.epoch_size);
        let dataset_indices = self.indices[self.batch_start..batch_end].to_vec();
        let batch_size = dataset_indices.len();

        // One seed per clip, drawn in batch order, so sequential and parallel
        // decoding see the same jitter.
        let seeds: Vec<u64> = dataset_indices.iter().map(|_| self.rng.r#gen()).collect();

        let (channels, length, height, width) = self.builder.geometry().clip_shape();
        let mut inputs = Array5::zeros((batch_size, channels, length, height, width));
        let mut targets = Array2::zeros((batch_size, self.manifest.label_count()));

        let mut tracker = BatchProgress::new(
            self.options.progress.clone(),
            self.batch_start,
            batch_size,
            self.options.progress_interval,
        );

        self.fill_inputs(&mut inputs, &dataset_indices, &seeds, &mut tracker)?;
        tracker.finish();

        for (row, &dataset_index) in dataset_indices.iter().enumerate() {
            targets
                .row_mut(row)
                .assign(&self.targets.row(dataset_index));
        }

        log::trace!(
            "Minibatch [{}, {batch_end}) of {}",
            self.batch_start,
            self.epoch_size
        );
        self.batch_start = batch_end;

        Ok(Minibatch {
            inputs,
            targets,
            dataset_indices,
        })
    }

    /// Cursor position within the current epoch.
    pub fn batch_start(&self) -> usize {
        self.batch_start
    }

    /// Whether the reader shuffles and jitters (training) or not.
    pub fn is_training(&self) -> bool {
        self.mode.is_training()
    }

    /// Sampling mode applied to every clip.
    pub fn mode(&self) -> SamplingMode {
        self.mode
    }

    /// The current epoch's visiting order (manifest positions).
    pub fn permutation(&self) -> &[usize] {
        &self.indices[..self.epoch_size]
    }

    /// The manifest being served.
    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// The clip builder, for decoding single videos outside an epoch.
    pub fn builder(&self) -> &VideoSequenceBuilder<B> {
        &self.builder
    }

    /// Options this reader was created with.
    pub fn options(&self) -> &ReaderOptions {
        &self.options
    }

    /// Decode every clip of the batch into its row of `inputs`.
    fn fill_inputs(
        &self,
        inputs: &mut Array5<f32>,
        dataset_indices: &[usize],
        seeds: &[u64],
        tracker: &mut BatchProgress,
    ) -> Result<(), VidbatchError> {
        #[cfg(feature = "rayon")]
        if self.options.parallel && dataset_indices.len() > 1 {
            let jobs: Vec<crate::parallel::ClipJob<'_>> = dataset_indices
                .iter()
                .zip(seeds)
                .map(|(&dataset_index, &seed)| crate::parallel::ClipJob {
                    path: &self.manifest.entries()[dataset_index].path,
                    seed,
                })
                .collect();
            let clips = crate::parallel::build_clips(&self.builder, &jobs, self.mode, tracker)?;
            for (row, clip) in clips.into_iter().enumerate() {
                inputs.index_axis_mut(Axis(0), row).assign(&clip);
            }
            return Ok(());
        }

        for (row, (&dataset_index, &seed)) in dataset_indices.iter().zip(seeds).enumerate() {
            let path = &self.manifest.entries()[dataset_index].path;
            let mut clip_rng = StdRng::seed_from_u64(seed);
            self.builder.build_into(
                path,
                self.mode,
                &mut clip_rng,
                inputs.index_axis_mut(Axis(0), row),
            )?;
            tracker.clip_done(path.clone());
        }
        Ok(())
    }
}
