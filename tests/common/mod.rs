//! Shared test helpers: an in-memory decode backend.
//!
//! Every synthetic frame is a uniform RGB image whose byte value is the frame
//! index modulo 256, so a clip reveals which frames were sampled.

#![allow(dead_code)]

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use image::{Rgb, RgbImage};
use ndarray::ArrayView4;
use vidbatch::{DecodedVideo, Manifest, VideoBackend, VidbatchError};

pub const FRAME_WIDTH: u32 = 160;
pub const FRAME_HEIGHT: u32 = 120;
pub const DATA_DIR: &str = "/data/ucf11";

#[derive(Debug, Clone, Default)]
pub struct SyntheticBackend {
    frame_counts: HashMap<PathBuf, u64>,
    opened: Arc<Mutex<Vec<PathBuf>>>,
}

impl SyntheticBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_video(mut self, path: impl Into<PathBuf>, frame_count: u64) -> Self {
        self.frame_counts.insert(path.into(), frame_count);
        self
    }

    /// Paths opened so far, in order.
    pub fn opened(&self) -> Vec<PathBuf> {
        self.opened.lock().unwrap().clone()
    }
}

impl VideoBackend for SyntheticBackend {
    type Video = SyntheticVideo;

    fn open(&self, path: &Path) -> Result<SyntheticVideo, VidbatchError> {
        let frame_count =
            *self
                .frame_counts
                .get(path)
                .ok_or_else(|| VidbatchError::FileOpen {
                    path: path.to_path_buf(),
                    reason: "no such synthetic video".to_string(),
                })?;
        self.opened.lock().unwrap().push(path.to_path_buf());
        Ok(SyntheticVideo { frame_count })
    }
}

#[derive(Debug)]
pub struct SyntheticVideo {
    frame_count: u64,
}

impl DecodedVideo for SyntheticVideo {
    fn frame_count(&self) -> u64 {
        self.frame_count
    }

    fn frame(&mut self, index: u64) -> Result<RgbImage, VidbatchError> {
        if index >= self.frame_count {
            return Err(VidbatchError::FrameOutOfRange {
                frame_number: index,
                total_frames: self.frame_count,
            });
        }
        let value = (index % 256) as u8;
        Ok(RgbImage::from_pixel(
            FRAME_WIDTH,
            FRAME_HEIGHT,
            Rgb([value, value, value]),
        ))
    }
}

/// Recover the source frame index of time step `t` from a synthetic clip.
pub fn frame_value(clip: ArrayView4<'_, f32>, t: usize) -> u64 {
    (clip[[0, t, 0, 0]] * 127.5 + 127.5).round() as u64
}

/// A manifest of `count` videos named `video_XX.avi` under [`DATA_DIR`],
/// labelled round-robin, and a backend where video `i` has `first + i` frames.
pub fn synthetic_dataset(
    count: usize,
    label_count: usize,
    first_frame_count: u64,
) -> (Manifest, SyntheticBackend) {
    let mut text = String::new();
    let mut backend = SyntheticBackend::new();
    for i in 0..count {
        let name = format!("video_{i:02}.avi");
        text.push_str(&format!("{name},{}\n", i % label_count));
        backend = backend.with_video(Path::new(DATA_DIR).join(&name), first_frame_count + i as u64);
    }
    let manifest = Manifest::parse(&text, DATA_DIR, label_count).expect("valid manifest");
    (manifest, backend)
}
