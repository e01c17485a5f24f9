//! Dataset manifests.
//!
//! A manifest is a headerless CSV file with one video per row:
//!
//! ```text
//! basketball/v_shooting_01_01.avi,0
//! biking/v_biking_01_01.avi,1
//! /data/ucf11/diving/v_diving_01_01.avi,2
//! ```
//!
//! Relative paths are resolved against the directory that contains the
//! manifest. Paths containing commas must be double-quoted. Columns after
//! the label are ignored.

use std::{
    fs,
    path::{Path, PathBuf},
};

use csv::{ReaderBuilder, StringRecord, Trim};
use ndarray::{Array1, Array2};

use crate::error::VidbatchError;

/// One row of a manifest: a video and its class label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    /// Resolved video path.
    pub path: PathBuf,
    /// Class index in `[0, label_count)`.
    pub label: usize,
}

/// An immutable, ordered list of [`ManifestEntry`] values.
///
/// # Example
///
/// ```no_run
/// use vidbatch::Manifest;
///
/// let manifest = Manifest::load("VideoDataset/train_map.csv", 11)?;
/// println!("{} videos, {} classes", manifest.len(), manifest.label_count());
/// # Ok::<(), vidbatch::VidbatchError>(())
/// ```
#[derive(Debug, Clone)]
pub struct Manifest {
    source: PathBuf,
    entries: Vec<ManifestEntry>,
    label_count: usize,
}

impl Manifest {
    /// Read and parse a manifest file.
    ///
    /// # Errors
    ///
    /// Returns [`VidbatchError::DatasetLoad`] if the file cannot be read, a
    /// row is malformed, or a label lies outside `[0, label_count)`.
    pub fn load<P: AsRef<Path>>(path: P, label_count: usize) -> Result<Self, VidbatchError> {
        let path = path.as_ref();
        log::debug!("Loading manifest: {}", path.display());

        let content = fs::read_to_string(path).map_err(|error| VidbatchError::DatasetLoad {
            path: path.to_path_buf(),
            reason: error.to_string(),
        })?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new(""));

        Self::parse_rows(&content, path, base_dir, label_count)
    }

    /// Parse manifest text that did not come from a file.
    ///
    /// Relative paths are resolved against `base_dir`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`load`](Manifest::load).
    pub fn parse(
        content: &str,
        base_dir: impl AsRef<Path>,
        label_count: usize,
    ) -> Result<Self, VidbatchError> {
        let base_dir = base_dir.as_ref();
        Self::parse_rows(content, base_dir, base_dir, label_count)
    }

    fn parse_rows(
        content: &str,
        source: &Path,
        base_dir: &Path,
        label_count: usize,
    ) -> Result<Self, VidbatchError> {
        let fail = |reason: String| VidbatchError::DatasetLoad {
            path: source.to_path_buf(),
            reason,
        };

        if label_count == 0 {
            return Err(fail("label count must be greater than zero".to_string()));
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(content.as_bytes());

        let mut entries = Vec::new();
        let mut record = StringRecord::new();
        loop {
            let has_record = reader.read_record(&mut record).map_err(|error| {
                let line_number = error.position().map_or(0, |position| position.line());
                fail(format!("line {line_number}: {error}"))
            })?;
            if !has_record {
                break;
            }

            let line_number = record.position().map_or(0, |position| position.line());
            if record.iter().all(|field| clean_field(field).is_empty()) {
                continue;
            }

            let video = record.get(0).map(clean_field).unwrap_or_default();
            let label_field = record
                .get(1)
                .map(clean_field)
                .ok_or_else(|| fail(format!("line {line_number}: expected `<path>,<label>`")))?;

            if video.is_empty() {
                return Err(fail(format!("line {line_number}: empty video path")));
            }

            let label: i64 = label_field.parse().map_err(|_| {
                fail(format!("line {line_number}: invalid label `{label_field}`"))
            })?;
            if label < 0 || label as u64 >= label_count as u64 {
                return Err(fail(format!(
                    "line {line_number}: label {label} is out of range [0, {label_count})"
                )));
            }

            entries.push(ManifestEntry {
                path: base_dir.join(video),
                label: label as usize,
            });
        }

        log::debug!(
            "Parsed {} manifest entries from {}",
            entries.len(),
            source.display()
        );

        Ok(Self {
            source: source.to_path_buf(),
            entries,
            label_count,
        })
    }

    /// Where the manifest was loaded from.
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Number of videos listed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the manifest lists no videos.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Width of the one-hot label vectors.
    pub fn label_count(&self) -> usize {
        self.label_count
    }

    /// All entries, in file order.
    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    /// The entry at `index`, if it exists.
    pub fn entry(&self, index: usize) -> Option<&ManifestEntry> {
        self.entries.get(index)
    }

    /// One-hot vector for `label`: `1.0` at position `label`, `0.0` elsewhere.
    pub fn one_hot(&self, label: usize) -> Array1<f32> {
        let mut vector = Array1::zeros(self.label_count);
        if let Some(slot) = vector.get_mut(label) {
            *slot = 1.0;
        }
        vector
    }

    /// One-hot label matrix of shape `(len, label_count)`, one row per entry.
    pub fn one_hot_targets(&self) -> Array2<f32> {
        let mut targets = Array2::zeros((self.entries.len(), self.label_count));
        for (row, entry) in self.entries.iter().enumerate() {
            targets[[row, entry.label]] = 1.0;
        }
        targets
    }

    /// Number of entries per class, indexed by label.
    pub fn class_histogram(&self) -> Vec<usize> {
        let mut counts = vec![0; self.label_count];
        for entry in &self.entries {
            counts[entry.label] += 1;
        }
        counts
    }
}

/// Strip quotes left on fields whose opening quote followed whitespace.
fn clean_field(field: &str) -> &str {
    field.trim().trim_matches('"')
}
