//! Frame ingestion sources.
//!
//! This module provides sources for camera frames:
//! - USB/V4L2 devices (feature: ingest-v4l2)
//! - Synthetic `stub://` devices (testing, hardware-free runs)
//!
//! All sources implement `FrameSource` and produce RGB `Frame` instances.
//! A source is opened, read and released by the capture worker alone; no
//! other thread touches the device handle.

pub mod camera;
#[cfg(feature = "ingest-v4l2")]
mod normalize;

pub use camera::{CameraConfig, CameraSource, CameraStats};

use anyhow::Result;

use crate::frame::Frame;

/// A device that yields frames until it is released.
///
/// Errors returned from `open` and `read_next` should carry a
/// `PipelineError` of kind `Device`. They are terminal for the capture loop.
pub trait FrameSource: Send {
    /// Acquire the device. Must be called before `read_next`.
    fn open(&mut self) -> Result<()>;

    /// Block until the next frame is available or the device fails.
    fn read_next(&mut self) -> Result<Frame>;

    /// Release the device. Safe to call when not open.
    fn release(&mut self);
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn read_next(&mut self) -> Result<Frame> {
        (**self).read_next()
    }

    fn release(&mut self) {
        (**self).release()
    }
}
