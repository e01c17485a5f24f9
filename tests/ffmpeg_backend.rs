//! FFmpeg backend integration tests.
//!
//! Tests that decode real video require `tests/fixtures/sample_video.mp4`
//! (any clip of at least 40 frames) and are skipped when it is absent.

use std::path::Path;

use rand::{SeedableRng, rngs::StdRng};
use vidbatch::{
    ClipGeometry, DecodedVideo, FfmpegBackend, FfmpegLogLevel, FfmpegVideo, Manifest,
    MinibatchReader, ReaderOptions, SamplingMode, VideoSequenceBuilder, VidbatchError,
};

fn sample_video_path() -> &'static str {
    "tests/fixtures/sample_video.mp4"
}

#[test]
fn open_nonexistent_file() {
    let result = FfmpegVideo::open("this_file_does_not_exist.mp4");
    let error = result.unwrap_err();
    assert!(
        error.to_string().contains("Failed to open video file"),
        "Error message should mention file open failure: {error}",
    );
}

#[test]
fn open_invalid_file() {
    let temporary_directory = tempfile::tempdir().expect("Failed to create temp dir");
    let invalid_file_path = temporary_directory.path().join("invalid.mp4");
    std::fs::write(&invalid_file_path, b"this is not a media file")
        .expect("Failed to write invalid file");

    let result = FfmpegVideo::open(&invalid_file_path);
    assert!(result.is_err(), "Expected error for invalid media file");
}

#[test]
fn log_level_round_trip() {
    vidbatch::set_ffmpeg_log_level(FfmpegLogLevel::Error);
    assert_eq!(vidbatch::get_ffmpeg_log_level(), Some(FfmpegLogLevel::Error));
    assert_eq!(FfmpegLogLevel::from_name("WARN"), Some(FfmpegLogLevel::Warning));
    assert_eq!(FfmpegLogLevel::from_name("loud"), None);
}

#[test]
fn log_level_names_parse_back() {
    for level in [
        FfmpegLogLevel::Quiet,
        FfmpegLogLevel::Panic,
        FfmpegLogLevel::Fatal,
        FfmpegLogLevel::Error,
        FfmpegLogLevel::Warning,
        FfmpegLogLevel::Info,
        FfmpegLogLevel::Verbose,
        FfmpegLogLevel::Debug,
        FfmpegLogLevel::Trace,
    ] {
        assert_eq!(FfmpegLogLevel::from_name(level.name()), Some(level));
    }
    assert_eq!(FfmpegLogLevel::Warning.name(), "warning");
}

#[test]
fn metadata_is_cached_at_open() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let video = FfmpegVideo::open(path).expect("Failed to open test video");
    let metadata = video.metadata();
    assert!(metadata.width > 0);
    assert!(metadata.height > 0);
    assert!(metadata.frame_count > 0);
    assert_eq!(video.frame_count(), metadata.frame_count);
}

#[test]
fn frames_come_back_in_request_order() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut video = FfmpegVideo::open(path).expect("Failed to open test video");
    let (width, height) = (video.metadata().width, video.metadata().height);

    let frames = video.frames(&[10, 2, 10]).expect("Failed to decode frames");
    assert_eq!(frames.len(), 3);
    assert_eq!(frames[0], frames[2]);
    assert!(frames.iter().all(|frame| frame.dimensions() == (width, height)));
}

#[test]
fn frame_out_of_range() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut video = FfmpegVideo::open(path).expect("Failed to open test video");
    let result = video.frame(999_999);
    assert!(matches!(result, Err(VidbatchError::FrameOutOfRange { .. })));
}

#[test]
fn clip_from_real_video() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let builder = VideoSequenceBuilder::new(FfmpegBackend, ClipGeometry::default()).unwrap();
    let clip = builder
        .build(Path::new(path), SamplingMode::Training, &mut StdRng::seed_from_u64(0))
        .expect("Failed to build clip");
    assert_eq!(clip.dim(), (3, 16, 112, 112));
    assert!(clip.iter().all(|&value| (-1.0..=1.0).contains(&value)));
}

#[test]
fn reader_over_fixture_manifest() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let absolute = std::fs::canonicalize(path).expect("Failed to resolve fixture path");
    let directory = tempfile::tempdir().expect("Failed to create temp dir");
    let manifest_path = directory.path().join("map.csv");
    std::fs::write(
        &manifest_path,
        format!("{0},0\n{0},1\n{0},2\n", absolute.display()),
    )
    .expect("Failed to write manifest");

    let manifest = Manifest::load(&manifest_path, 3).unwrap();
    assert_eq!(manifest.entries()[0].path, absolute);

    let mut reader =
        MinibatchReader::open_with_options(&manifest_path, 3, false, ReaderOptions::new())
            .expect("Failed to open reader");
    let batch = reader.next_minibatch(2).expect("Failed to read batch");
    assert_eq!(batch.len(), 2);
    // Evaluation clips of the same file are identical.
    assert_eq!(
        batch.inputs().index_axis(ndarray::Axis(0), 0),
        batch.inputs().index_axis(ndarray::Axis(0), 1)
    );
    assert_eq!(reader.next_minibatch(2).unwrap().len(), 1);
    assert!(!reader.has_more());
}

#[test]
fn repeated_calls_on_one_handle_rewind() {
    let path = sample_video_path();
    if !Path::new(path).exists() {
        return;
    }

    let mut fresh = FfmpegVideo::open(path).expect("Failed to open test video");
    let expected_first = fresh.frame(0).expect("Failed to decode frame 0");
    let expected_later = fresh.frame(20).expect("Failed to decode frame 20");

    let mut video = FfmpegVideo::open(path).expect("Failed to open test video");
    let later = video.frame(20).expect("Failed to decode frame 20");
    let first = video.frame(0).expect("Failed to decode frame 0");
    let again = video.frames(&[0, 20]).expect("Failed to decode frames");

    assert_eq!(later, expected_later);
    assert_eq!(first, expected_first);
    assert_eq!(again, vec![expected_first, expected_later]);
}
