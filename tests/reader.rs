//! Minibatch reader tests.

mod common;

use std::{
    collections::HashSet,
    path::Path,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
};

use common::{DATA_DIR, SyntheticBackend, frame_value, synthetic_dataset};
use rand::{SeedableRng, rngs::StdRng};
use vidbatch::{
    Manifest, MinibatchReader, ProgressCallback, ProgressInfo, ReaderOptions, VidbatchError,
};

fn reader(
    count: usize,
    is_training: bool,
    options: ReaderOptions,
) -> MinibatchReader<SyntheticBackend> {
    let (manifest, backend) = synthetic_dataset(count, 11, 16);
    MinibatchReader::with_backend(manifest, is_training, options, backend)
        .expect("Failed to build reader")
}

/// Drain one epoch, returning the dataset index of every row served.
fn drain_epoch(reader: &mut MinibatchReader<SyntheticBackend>, batch_size: usize) -> Vec<usize> {
    let mut served = Vec::new();
    while reader.has_more() {
        let batch = reader.next_minibatch(batch_size).expect("Failed to read batch");
        assert!(batch.len() <= batch_size);
        served.extend_from_slice(batch.dataset_indices());
    }
    served
}

#[test]
fn size_is_dataset_length_when_unbounded() {
    let reader = reader(7, true, ReaderOptions::new().with_seed(1));
    assert_eq!(reader.size(), 7);
}

#[test]
fn size_is_capped_by_epoch_limit() {
    let capped = reader(7, false, ReaderOptions::new().with_epoch_size_limit(3));
    assert_eq!(capped.size(), 3);

    let loose = reader(7, false, ReaderOptions::new().with_epoch_size_limit(100));
    assert_eq!(loose.size(), 7);
}

#[test]
fn reset_rewinds_the_cursor() {
    let mut reader = reader(5, true, ReaderOptions::new().with_seed(2));
    reader.next_minibatch(2).unwrap();
    assert_eq!(reader.batch_start(), 2);

    reader.reset();
    assert_eq!(reader.batch_start(), 0);
    assert_eq!(reader.has_more(), reader.size() > 0);
}

#[test]
fn epoch_serves_every_row_exactly_once() {
    let mut reader = reader(9, true, ReaderOptions::new().with_seed(3));
    reader.reset();

    let served = drain_epoch(&mut reader, 4);

    assert_eq!(served.len(), reader.size());
    let unique: HashSet<usize> = served.iter().copied().collect();
    assert_eq!(unique.len(), served.len());
    assert!(served.iter().all(|&index| index < 9));
}

#[test]
fn tail_batch_is_short() {
    let mut reader = reader(5, false, ReaderOptions::new());
    let mut sizes = Vec::new();
    while reader.has_more() {
        sizes.push(reader.next_minibatch(2).unwrap().len());
    }
    assert_eq!(sizes, vec![2, 2, 1]);
}

#[test]
fn batch_tensors_have_the_expected_shapes() {
    let mut reader = reader(3, false, ReaderOptions::new());
    let batch = reader.next_minibatch(2).unwrap();

    assert_eq!(batch.inputs().dim(), (2, 3, 16, 112, 112));
    assert_eq!(batch.targets().dim(), (2, 11));
    assert!(batch.inputs().is_standard_layout());

    let (inputs, targets, len) = batch.into_parts();
    assert_eq!(len, 2);
    assert_eq!(inputs.shape()[0], 2);
    assert_eq!(targets.shape()[0], 2);
}

#[test]
fn labels_and_clips_stay_aligned() {
    // Video i has 40 + i frames, so its centred evaluation clip starts at a
    // frame index unique to it.
    let (manifest, backend) = synthetic_dataset(6, 4, 40);
    let mut reader = MinibatchReader::with_backend(
        manifest.clone(),
        true,
        ReaderOptions::new().with_seed(11),
        backend,
    )
    .unwrap();
    // Training mode jitters; rebuild in evaluation mode for exact frames.
    let (_, eval_backend) = synthetic_dataset(6, 4, 40);
    let mut eval_reader =
        MinibatchReader::with_backend(manifest.clone(), false, ReaderOptions::new(), eval_backend)
            .unwrap();

    let batch = reader.next_minibatch(6).unwrap();
    for (row, &dataset_index) in batch.dataset_indices().iter().enumerate() {
        let label = manifest.entries()[dataset_index].label;
        let target = batch.targets().row(row).to_vec();
        assert_eq!(target.iter().filter(|&&value| value == 1.0).count(), 1);
        assert_eq!(target[label], 1.0);
    }

    let batch = eval_reader.next_minibatch(6).unwrap();
    assert_eq!(batch.dataset_indices(), &[0, 1, 2, 3, 4, 5]);
    for (row, &dataset_index) in batch.dataset_indices().iter().enumerate() {
        let frame_count = 40 + dataset_index as u64;
        let expected_start = frame_count / 2 - 16;
        let clip = batch.inputs().index_axis_move(ndarray::Axis(0), row);
        assert_eq!(frame_value(clip, 0), expected_start);
        assert_eq!(batch.targets()[[row, dataset_index % 4]], 1.0);
    }
}

#[test]
fn exhausted_epoch_requires_reset() {
    let mut reader = reader(3, false, ReaderOptions::new());
    drain_epoch(&mut reader, 2);

    let result = reader.next_minibatch(2);
    assert!(matches!(
        result,
        Err(VidbatchError::ExhaustedEpoch {
            batch_start: 3,
            epoch_size: 3
        })
    ));

    reader.reset();
    assert!(reader.has_more());
    assert_eq!(reader.next_minibatch(2).unwrap().len(), 2);
}

#[test]
fn empty_manifest_has_nothing_to_serve() {
    let manifest = Manifest::parse("", DATA_DIR, 11).unwrap();
    let mut reader = MinibatchReader::with_backend(
        manifest,
        true,
        ReaderOptions::new().with_seed(0),
        SyntheticBackend::new(),
    )
    .unwrap();

    reader.reset();
    assert_eq!(reader.size(), 0);
    assert!(!reader.has_more());
    assert!(matches!(
        reader.next_minibatch(1),
        Err(VidbatchError::ExhaustedEpoch { .. })
    ));
}

#[test]
fn training_reshuffles_on_every_reset() {
    let mut reader = reader(20, true, ReaderOptions::new().with_seed(5));
    let mut orders = Vec::new();
    for _ in 0..3 {
        reader.reset();
        orders.push(reader.permutation().to_vec());
    }
    assert_ne!(orders[0], orders[1]);
    assert_ne!(orders[1], orders[2]);

    let identity: Vec<usize> = (0..20).collect();
    assert_ne!(orders[0], identity);
}

#[test]
fn evaluation_order_is_fixed() {
    let mut reader = reader(8, false, ReaderOptions::new());
    let identity: Vec<usize> = (0..8).collect();
    assert_eq!(reader.permutation(), identity.as_slice());

    reader.reset();
    assert_eq!(drain_epoch(&mut reader, 3), identity);
    reader.reset();
    assert_eq!(drain_epoch(&mut reader, 5), identity);
}

#[test]
fn epoch_limit_serves_a_prefix_of_the_permutation() {
    let mut reader = reader(10, true, ReaderOptions::new().with_seed(8).with_epoch_size_limit(4));
    reader.reset();
    let expected = reader.permutation().to_vec();
    assert_eq!(expected.len(), 4);
    assert_eq!(drain_epoch(&mut reader, 3), expected);
}

#[test]
fn same_seed_produces_identical_batches() {
    let options = ReaderOptions::new().with_seed(1234);
    let (manifest, backend) = synthetic_dataset(6, 3, 70);
    let mut first =
        MinibatchReader::with_backend(manifest.clone(), true, options.clone(), backend.clone())
            .unwrap();
    let mut second = MinibatchReader::with_backend(manifest, true, options, backend).unwrap();

    for _ in 0..3 {
        let a = first.next_minibatch(2).unwrap();
        let b = second.next_minibatch(2).unwrap();
        assert_eq!(a.dataset_indices(), b.dataset_indices());
        assert_eq!(a.inputs(), b.inputs());
        assert_eq!(a.targets(), b.targets());
    }
}

#[test]
fn explicit_rng_drives_the_shuffle() {
    let (manifest, backend) = synthetic_dataset(12, 3, 16);
    let first = MinibatchReader::with_rng(
        manifest.clone(),
        true,
        ReaderOptions::new(),
        backend.clone(),
        StdRng::seed_from_u64(77),
    )
    .unwrap();
    let second = MinibatchReader::with_rng(
        manifest,
        true,
        ReaderOptions::new(),
        backend,
        StdRng::seed_from_u64(77),
    )
    .unwrap();
    assert_eq!(first.permutation(), second.permutation());
}

#[test]
fn a_short_video_fails_the_whole_batch() {
    let text = "ok.avi,0\nshort.avi,1\n";
    let manifest = Manifest::parse(text, DATA_DIR, 2).unwrap();
    let backend = SyntheticBackend::new()
        .with_video(Path::new(DATA_DIR).join("ok.avi"), 30)
        .with_video(Path::new(DATA_DIR).join("short.avi"), 10);
    let mut reader =
        MinibatchReader::with_backend(manifest, false, ReaderOptions::new(), backend).unwrap();

    let result = reader.next_minibatch(2);
    assert!(matches!(
        result,
        Err(VidbatchError::InsufficientFrames { frame_count: 10, .. })
    ));
    assert_eq!(reader.batch_start(), 0, "cursor must not advance on failure");
}

#[test]
fn videos_are_opened_only_for_the_requested_batch() {
    let (manifest, backend) = synthetic_dataset(5, 2, 16);
    let mut reader =
        MinibatchReader::with_backend(manifest, false, ReaderOptions::new(), backend.clone())
            .unwrap();

    reader.next_minibatch(2).unwrap();

    let opened = backend.opened();
    assert_eq!(opened.len(), 2);
    assert_eq!(opened[0], Path::new(DATA_DIR).join("video_00.avi"));
    assert_eq!(opened[1], Path::new(DATA_DIR).join("video_01.avi"));
}

#[test]
fn invalid_crop_is_detected_at_construction() {
    let (manifest, backend) = synthetic_dataset(2, 2, 16);
    let result = MinibatchReader::with_backend(
        manifest,
        false,
        ReaderOptions::new().with_crop_size(128, 128),
        backend,
    );
    assert!(matches!(result, Err(VidbatchError::InvalidCropSize { .. })));
}

#[test]
fn missing_manifest_fails_construction() {
    let result = MinibatchReader::open("this_manifest_does_not_exist.csv", 11, true);
    assert!(matches!(result, Err(VidbatchError::DatasetLoad { .. })));
}

struct CountingProgress {
    calls: AtomicU64,
    last_completed: AtomicU64,
    complete_reports: AtomicU64,
}

impl ProgressCallback for CountingProgress {
    fn on_progress(&self, info: &ProgressInfo) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.last_completed
            .store(info.completed as u64, Ordering::SeqCst);
        if info.is_complete() {
            self.complete_reports.fetch_add(1, Ordering::SeqCst);
        }
        assert_eq!(info.batch_size, 3);
    }
}

#[test]
fn progress_is_reported_per_video() {
    let progress = Arc::new(CountingProgress {
        calls: AtomicU64::new(0),
        last_completed: AtomicU64::new(0),
        complete_reports: AtomicU64::new(0),
    });
    let mut reader = reader(4, false, ReaderOptions::new().with_progress(progress.clone()));

    reader.next_minibatch(3).unwrap();

    // One report per video plus the final one.
    assert_eq!(progress.calls.load(Ordering::SeqCst), 4);
    assert_eq!(progress.last_completed.load(Ordering::SeqCst), 3);
    // The last per-video report and the closing report.
    assert_eq!(progress.complete_reports.load(Ordering::SeqCst), 2);
}

#[test]
fn options_debug_output() {
    let options = ReaderOptions::new().with_seed(3).with_progress_interval(0);
    let debug = format!("{options:?}");
    assert!(debug.contains("ReaderOptions"));
    assert!(debug.contains("seed: Some(3)"));
    // Clamped to 1.
    assert!(debug.contains("progress_interval: 1"));
}
