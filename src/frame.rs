//! Captured camera frames.
//!
//! - `Frame`: immutable RGB image produced by the ingestion layer.
//!
//! A frame is shared between the display sink and the preprocessor of the
//! iteration that captured it. Pixels sit behind an `Arc`, so handing a frame
//! to both costs a reference count, never a copy, and nobody can mutate it.

use anyhow::{anyhow, Result};
use image::RgbImage;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Channels per pixel. Frames are always interleaved RGB.
pub const FRAME_CHANNELS: usize = 3;

/// Immutable RGB frame.
#[derive(Clone, Debug)]
pub struct Frame {
    image: Arc<RgbImage>,

    /// Monotonic capture counter assigned by the source (starts at 1).
    pub sequence: u64,

    captured_at: Instant,
}

impl Frame {
    /// Build a frame from interleaved RGB bytes.
    ///
    /// Fails when `data` does not hold exactly `width * height * 3` bytes.
    pub fn from_rgb(data: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(FRAME_CHANNELS))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if width == 0 || height == 0 {
            return Err(anyhow!("frame dimensions must be non-zero"));
        }
        if data.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                data.len()
            ));
        }
        let image = RgbImage::from_raw(width, height, data)
            .ok_or_else(|| anyhow!("RGB buffer rejected for {}x{}", width, height))?;
        Ok(Self::from_image(image, sequence))
    }

    pub fn from_image(image: RgbImage, sequence: u64) -> Self {
        Self {
            image: Arc::new(image),
            sequence,
            captured_at: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Row-major, channel-interleaved pixel bytes.
    pub fn pixels(&self) -> &[u8] {
        self.image.as_raw()
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Time since the source produced this frame.
    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }
}
