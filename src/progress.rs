//! Progress reporting for batch construction.
//!
//! Decoding dominates the cost of [`next_minibatch`](crate::MinibatchReader::next_minibatch),
//! so the reader reports after each video it turns into a clip. Attach a
//! [`ProgressCallback`] through [`ReaderOptions::with_progress`](crate::ReaderOptions::with_progress).
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use vidbatch::{MinibatchReader, ProgressCallback, ProgressInfo, ReaderOptions, VidbatchError};
//!
//! struct PrintProgress;
//!
//! impl ProgressCallback for PrintProgress {
//!     fn on_progress(&self, info: &ProgressInfo) {
//!         println!(
//!             "epoch position {}: {}/{} clips ({:.0}%)",
//!             info.batch_start,
//!             info.completed,
//!             info.batch_size,
//!             info.percentage(),
//!         );
//!     }
//! }
//!
//! let options = ReaderOptions::new().with_progress(Arc::new(PrintProgress));
//! let mut reader = MinibatchReader::open_with_options("train_map.csv", 11, true, options)?;
//! let batch = reader.next_minibatch(4)?;
//! # Ok::<(), VidbatchError>(())
//! ```

use std::{
    path::PathBuf,
    sync::Arc,
    time::{Duration, Instant},
};

/// A snapshot of the batch being built.
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    /// Cursor position of the batch within the epoch.
    pub batch_start: usize,
    /// Clips finished so far.
    pub completed: usize,
    /// Clips in this batch.
    pub batch_size: usize,
    /// Time since the batch started.
    pub elapsed: Duration,
    /// Projected time until the batch is done, from the rate so far.
    pub estimated_remaining: Option<Duration>,
    /// The video that was just turned into a clip. `None` on the final
    /// report of a batch.
    pub last_video: Option<PathBuf>,
}

impl ProgressInfo {
    /// Completion in percent. An empty batch counts as complete.
    pub fn percentage(&self) -> f32 {
        if self.batch_size == 0 {
            100.0
        } else {
            self.completed as f32 / self.batch_size as f32 * 100.0
        }
    }

    /// Whether every clip of the batch has been built.
    pub fn is_complete(&self) -> bool {
        self.completed >= self.batch_size
    }
}

/// Receives progress while a batch is built.
///
/// Callbacks can be invoked from rayon workers, hence `Send + Sync`. They
/// observe only; a batch cannot be cancelled from a callback.
pub trait ProgressCallback: Send + Sync {
    /// Called every `progress_interval` clips and once when the batch is done.
    fn on_progress(&self, info: &ProgressInfo);
}

/// Default callback; ignores everything.
pub(crate) struct NoOpProgress;

impl ProgressCallback for NoOpProgress {
    fn on_progress(&self, _info: &ProgressInfo) {}
}

/// Counts finished clips for one batch and forwards snapshots to the callback.
pub(crate) struct BatchProgress {
    callback: Arc<dyn ProgressCallback>,
    batch_start: usize,
    batch_size: usize,
    completed: usize,
    interval: usize,
    pending: usize,
    started: Instant,
}

impl BatchProgress {
    pub(crate) fn new(
        callback: Arc<dyn ProgressCallback>,
        batch_start: usize,
        batch_size: usize,
        interval: u64,
    ) -> Self {
        Self {
            callback,
            batch_start,
            batch_size,
            completed: 0,
            interval: usize::try_from(interval).unwrap_or(usize::MAX).max(1),
            pending: 0,
            started: Instant::now(),
        }
    }

    /// Record one finished clip.
    pub(crate) fn clip_done(&mut self, video: PathBuf) {
        self.completed += 1;
        self.pending += 1;
        if self.pending >= self.interval {
            self.pending = 0;
            self.emit(Some(video));
        }
    }

    /// Emit the closing report of the batch.
    pub(crate) fn finish(&mut self) {
        self.emit(None);
    }

    fn emit(&self, last_video: Option<PathBuf>) {
        let elapsed = self.started.elapsed();
        let estimated_remaining = (self.completed > 0).then(|| {
            let remaining = self.batch_size.saturating_sub(self.completed);
            elapsed.mul_f64(remaining as f64 / self.completed as f64)
        });

        self.callback.on_progress(&ProgressInfo {
            batch_start: self.batch_start,
            completed: self.completed,
            batch_size: self.batch_size,
            elapsed,
            estimated_remaining,
            last_video,
        });
    }
}
