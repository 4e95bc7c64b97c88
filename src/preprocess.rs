//! Frame to model-input conversion.
//!
//! The classifier expects a `[1, 224, 224, 3]` f32 tensor in NHWC order with
//! every channel byte mapped from `[0, 255]` onto `[-1, 1]`.

use image::imageops::{self, FilterType};
use std::borrow::Cow;

use crate::frame::{Frame, FRAME_CHANNELS};

/// Spatial size (height and width) of the model input.
pub const INPUT_SIZE: u32 = 224;

/// Channels of the model input.
pub const INPUT_CHANNELS: usize = FRAME_CHANNELS;

const INPUT_LEN: usize = INPUT_SIZE as usize * INPUT_SIZE as usize * INPUT_CHANNELS;

/// Fixed-shape model input, `[1, INPUT_SIZE, INPUT_SIZE, INPUT_CHANNELS]`.
///
/// Only `Preprocessor` builds these, so the length always matches the shape.
#[derive(Clone, Debug, PartialEq)]
pub struct InputTensor {
    data: Vec<f32>,
}

impl InputTensor {
    pub const SHAPE: [usize; 4] = [1, INPUT_SIZE as usize, INPUT_SIZE as usize, INPUT_CHANNELS];

    pub fn shape(&self) -> [usize; 4] {
        Self::SHAPE
    }

    /// Row-major NHWC values.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Map one channel byte onto `[-1, 1]`.
#[inline]
pub fn normalize_byte(b: u8) -> f32 {
    (b as f32 - 127.5) / 127.5
}

/// Bilinear resampling.
const RESIZE_FILTER: FilterType = FilterType::Triangle;

/// Resizes and normalizes frames for the classifier.
#[derive(Clone, Copy, Debug)]
pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Convert a frame into the model input tensor.
    ///
    /// Frames already at `INPUT_SIZE x INPUT_SIZE` are used as-is.
    pub fn prepare(&self, frame: &Frame) -> InputTensor {
        let source = frame.image();
        let resized = if source.width() == INPUT_SIZE && source.height() == INPUT_SIZE {
            Cow::Borrowed(source)
        } else {
            Cow::Owned(imageops::resize(source, INPUT_SIZE, INPUT_SIZE, RESIZE_FILTER))
        };

        let data: Vec<f32> = resized.as_raw().iter().copied().map(normalize_byte).collect();
        debug_assert_eq!(data.len(), INPUT_LEN);

        InputTensor { data }
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use image::RgbImage;

    fn gradient_frame(width: u32, height: u32) -> Frame {
        let image = RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
        });
        Frame::from_image(image, 1)
    }

    #[test]
    fn normalization_bounds() {
        assert_eq!(normalize_byte(0), -1.0);
        assert_eq!(normalize_byte(255), 1.0);
        assert!(normalize_byte(127).abs() < 0.005);
        assert!(normalize_byte(128).abs() < 0.005);
        for b in 0..=255u8 {
            let v = normalize_byte(b);
            assert!((-1.0..=1.0).contains(&v), "{} -> {}", b, v);
            assert_eq!(v, (b as f32 - 127.5) / 127.5);
        }
    }

    #[test]
    fn tensor_shape_is_fixed_for_any_resolution() {
        let preprocessor = Preprocessor::new();
        for (w, h) in [(640, 480), (1, 1), (224, 224), (300, 1000), (2, 3)] {
            let tensor = preprocessor.prepare(&gradient_frame(w, h));
            assert_eq!(tensor.shape(), [1, 224, 224, 3]);
            assert_eq!(tensor.len(), 224 * 224 * 3);
        }
    }

    #[test]
    fn native_size_frames_are_not_resampled() -> Result<()> {
        let pixels: Vec<u8> = (0..INPUT_LEN).map(|i| (i % 256) as u8).collect();
        let frame = Frame::from_rgb(pixels.clone(), INPUT_SIZE, INPUT_SIZE, 1)?;
        let tensor = Preprocessor::new().prepare(&frame);

        // Row-major, channel-interleaved: index 5 is pixel 1, channel 2.
        assert_eq!(tensor.as_slice()[5], normalize_byte(pixels[5]));
        assert!(tensor
            .as_slice()
            .iter()
            .zip(&pixels)
            .all(|(v, b)| *v == normalize_byte(*b)));
        Ok(())
    }

    #[test]
    fn uniform_frames_stay_uniform_after_resize() {
        let image = RgbImage::from_pixel(640, 480, image::Rgb([255, 0, 128]));
        let tensor = Preprocessor::new().prepare(&Frame::from_image(image, 1));

        for px in tensor.as_slice().chunks_exact(3) {
            assert_eq!(px[0], 1.0);
            assert_eq!(px[1], -1.0);
            assert_eq!(px[2], normalize_byte(128));
        }
    }

    #[test]
    fn preparation_is_deterministic() {
        let frame = gradient_frame(320, 240);
        let preprocessor = Preprocessor::new();
        assert_eq!(preprocessor.prepare(&frame), preprocessor.prepare(&frame));
    }
}
