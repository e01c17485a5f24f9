//! Spatial frame preprocessing.
//!
//! [`FrameTransformer`] turns one decoded RGB frame into the normalized,
//! channel-first array a 3D-convolution network consumes:
//!
//! 1. shrink the frame to fit the resize bounding box (171×128 by default),
//!    preserving aspect ratio and never enlarging it;
//! 2. take a centred crop of the configured size (112×112 by default);
//! 3. map each byte from `[0, 255]` to `[-1, 1]` via `(p - 127.5) / 127.5`;
//! 4. lay the result out as `(channel, height, width)`.

use image::{RgbImage, imageops::FilterType};
use ndarray::{Array3, ArrayViewMut3};

use crate::{
    configuration::{CHANNEL_COUNT, ClipGeometry},
    error::VidbatchError,
};

const PIXEL_CENTER: f32 = 127.5;

/// Resizes, crops, and normalizes frames.
///
/// # Example
///
/// ```
/// use image::{Rgb, RgbImage};
/// use vidbatch::{ClipGeometry, FrameTransformer};
///
/// let transformer = FrameTransformer::new(&ClipGeometry::default()).unwrap();
/// let frame = RgbImage::from_pixel(320, 240, Rgb([255, 255, 255]));
/// let array = transformer.transform(&frame);
/// assert_eq!(array.dim(), (3, 112, 112));
/// assert!(array.iter().all(|&value| value == 1.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameTransformer {
    crop_width: u32,
    crop_height: u32,
    resize_width: u32,
    resize_height: u32,
}

impl FrameTransformer {
    /// Build a transformer for the given geometry.
    ///
    /// # Errors
    ///
    /// Returns [`VidbatchError::InvalidCropSize`] if the crop is not strictly
    /// smaller than the resize bounds.
    pub fn new(geometry: &ClipGeometry) -> Result<Self, VidbatchError> {
        geometry.validate()?;
        Ok(Self {
            crop_width: geometry.crop_width,
            crop_height: geometry.crop_height,
            resize_width: geometry.resize_width,
            resize_height: geometry.resize_height,
        })
    }

    /// Output shape: `(channels, crop_height, crop_width)`.
    pub fn output_shape(&self) -> (usize, usize, usize) {
        (
            CHANNEL_COUNT,
            self.crop_height as usize,
            self.crop_width as usize,
        )
    }

    /// Size a `width`×`height` frame is shrunk to before cropping.
    pub fn resized_dimensions(&self, width: u32, height: u32) -> (u32, u32) {
        fit_within(width, height, self.resize_width, self.resize_height)
    }

    /// Transform `frame` into a freshly allocated `(C, H, W)` array.
    pub fn transform(&self, frame: &RgbImage) -> Array3<f32> {
        let mut output = Array3::zeros(self.output_shape());
        self.transform_into(frame, output.view_mut());
        output
    }

    /// Transform `frame` directly into `output`, which must have shape
    /// [`output_shape`](FrameTransformer::output_shape).
    ///
    /// Crop regions that fall outside a frame smaller than the crop are
    /// filled with black (`-1.0`).
    pub fn transform_into(&self, frame: &RgbImage, mut output: ArrayViewMut3<'_, f32>) {
        let (width, height) = frame.dimensions();
        let (resized_width, resized_height) = self.resized_dimensions(width, height);

        let resized;
        let source = if (resized_width, resized_height) == (width, height) {
            frame
        } else {
            resized = image::imageops::resize(
                frame,
                resized_width,
                resized_height,
                FilterType::Lanczos3,
            );
            &resized
        };

        let left = centred_offset(resized_width, self.crop_width);
        let top = centred_offset(resized_height, self.crop_height);

        for y in 0..self.crop_height as usize {
            let source_y = top + y as i64;
            for x in 0..self.crop_width as usize {
                let source_x = left + x as i64;
                let inside = source_x >= 0
                    && source_y >= 0
                    && source_x < i64::from(resized_width)
                    && source_y < i64::from(resized_height);

                let pixel = if inside {
                    source.get_pixel(source_x as u32, source_y as u32).0
                } else {
                    [0, 0, 0]
                };

                for (channel, &value) in pixel.iter().enumerate() {
                    output[[channel, y, x]] = normalize(value);
                }
            }
        }
    }
}

/// Map a byte from `[0, 255]` to `[-1, 1]`.
pub fn normalize(value: u8) -> f32 {
    (f32::from(value) - PIXEL_CENTER) / PIXEL_CENTER
}

/// Offset of a `crop`-wide window centred in `extent`.
///
/// Half-pixel offsets round to the nearest even value, so a 112 crop of a
/// 171-wide frame starts at column 30. Negative offsets mean padding.
fn centred_offset(extent: u32, crop: u32) -> i64 {
    let difference = i64::from(extent) - i64::from(crop);
    let floor = difference.div_euclid(2);
    if difference.rem_euclid(2) == 1 && floor.rem_euclid(2) == 1 {
        floor + 1
    } else {
        floor
    }
}

/// Dimensions that fit within `max_width`×`max_height` preserving aspect
/// ratio. Frames that already fit are left at their original size.
fn fit_within(width: u32, height: u32, max_width: u32, max_height: u32) -> (u32, u32) {
    if width == 0 || height == 0 || (width <= max_width && height <= max_height) {
        return (width, height);
    }
    let scale = (max_width as f64 / width as f64).min(max_height as f64 / height as f64);
    let new_width = ((width as f64) * scale).round() as u32;
    let new_height = ((height as f64) * scale).round() as u32;
    (new_width.clamp(1, max_width), new_height.clamp(1, max_height))
}
