//! Camera frame source.
//!
//! This module provides `CameraSource` for capturing frames from a local
//! camera. The camera source is responsible for:
//! - Opening a local device node (e.g., /dev/video0)
//! - Capturing frames in-memory
//! - Normalizing device pixel formats to RGB24
//! - Producing `Frame` instances
//!
//! Device paths starting with `stub://` yield synthetic frames so the
//! pipeline can run without hardware.

use anyhow::Result;
use std::time::{Duration, Instant};

#[cfg(feature = "ingest-v4l2")]
use ouroboros::self_referencing;

#[cfg(feature = "ingest-v4l2")]
use super::normalize::{normalize_to_rgb, PixelFormat};
use super::FrameSource;
use crate::frame::{Frame, FRAME_CHANNELS};
use crate::PipelineError;

/// Configuration for a camera source.
#[derive(Clone, Debug)]
pub struct CameraConfig {
    /// Device path (e.g., "/dev/video0" or "stub://webcam")
    pub device: String,
    /// Requested frame rate. Zero leaves the driver default.
    pub target_fps: u32,
    /// Preferred frame width.
    pub width: u32,
    /// Preferred frame height.
    pub height: u32,
}

impl CameraConfig {
    /// Configuration for the camera at system index `index`.
    pub fn for_index(index: u32) -> Self {
        Self {
            device: format!("/dev/video{}", index),
            ..Self::default()
        }
    }

    pub fn is_synthetic(&self) -> bool {
        self.device.starts_with("stub://")
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device: "/dev/video0".to_string(),
            target_fps: 30,
            width: 640,
            height: 480,
        }
    }
}

/// Camera frame source.
///
/// Uses V4L2 for real devices, with a synthetic fallback for `stub://` paths.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "ingest-v4l2")]
    Device(DeviceCamera),
    #[cfg(not(feature = "ingest-v4l2"))]
    Unsupported(CameraConfig),
}

impl CameraSource {
    pub fn new(config: CameraConfig) -> Self {
        if config.is_synthetic() {
            return Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(config)),
            };
        }
        #[cfg(feature = "ingest-v4l2")]
        {
            Self {
                backend: CameraBackend::Device(DeviceCamera::new(config)),
            }
        }
        #[cfg(not(feature = "ingest-v4l2"))]
        {
            Self {
                backend: CameraBackend::Unsupported(config),
            }
        }
    }

    /// Get frame statistics.
    pub fn stats(&self) -> CameraStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.stats(),
            #[cfg(not(feature = "ingest-v4l2"))]
            CameraBackend::Unsupported(config) => CameraStats {
                frames_captured: 0,
                device: config.device.clone(),
            },
        }
    }
}

impl FrameSource for CameraSource {
    fn open(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.open(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.open(),
            #[cfg(not(feature = "ingest-v4l2"))]
            CameraBackend::Unsupported(config) => Err(PipelineError::device(format!(
                "camera {} requires the ingest-v4l2 feature",
                config.device
            ))
            .into()),
        }
    }

    fn read_next(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.read_next(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.read_next(),
            #[cfg(not(feature = "ingest-v4l2"))]
            CameraBackend::Unsupported(config) => {
                Err(PipelineError::device(format!("camera {} is not open", config.device)).into())
            }
        }
    }

    fn release(&mut self) {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.release(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::Device(source) => source.release(),
            #[cfg(not(feature = "ingest-v4l2"))]
            CameraBackend::Unsupported(_) => {}
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct CameraStats {
    pub frames_captured: u64,
    pub device: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://)
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    config: CameraConfig,
    open: bool,
    frame_count: u64,
    last_frame_at: Option<Instant>,
    /// Simulated scene, bumped every 50 frames.
    scene_state: u8,
}

impl SyntheticCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            config,
            open: false,
            frame_count: 0,
            last_frame_at: None,
            scene_state: 0,
        }
    }

    fn open(&mut self) -> Result<()> {
        self.open = true;
        log::info!("CameraSource: opened {} (synthetic)", self.config.device);
        Ok(())
    }

    fn read_next(&mut self) -> Result<Frame> {
        if !self.open {
            return Err(PipelineError::device(format!(
                "camera {} is not open",
                self.config.device
            ))
            .into());
        }

        // Pace to the requested rate like a real device would.
        if let (Some(last), Some(interval)) = (self.last_frame_at, self.frame_interval()) {
            let elapsed = last.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }

        self.frame_count += 1;
        self.last_frame_at = Some(Instant::now());
        let pixels = self.generate_synthetic_pixels();
        Frame::from_rgb(
            pixels,
            self.config.width,
            self.config.height,
            self.frame_count,
        )
    }

    fn frame_interval(&self) -> Option<Duration> {
        (self.config.target_fps > 0)
            .then(|| Duration::from_millis(1000 / self.config.target_fps as u64))
    }

    fn generate_synthetic_pixels(&mut self) -> Vec<u8> {
        let pixel_count =
            self.config.width as usize * self.config.height as usize * FRAME_CHANNELS;

        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }

        pixels
    }

    fn release(&mut self) {
        if self.open {
            self.open = false;
            log::info!(
                "CameraSource: released {} after {} frames (synthetic)",
                self.config.device,
                self.frame_count
            );
        }
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// V4L2 device source
// ----------------------------------------------------------------------------

#[cfg(feature = "ingest-v4l2")]
struct DeviceCamera {
    config: CameraConfig,
    state: Option<DeviceState>,
    frame_count: u64,
    active_width: u32,
    active_height: u32,
    active_format: PixelFormat,
}

#[cfg(feature = "ingest-v4l2")]
#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

#[cfg(feature = "ingest-v4l2")]
impl DeviceCamera {
    fn new(config: CameraConfig) -> Self {
        Self {
            active_width: config.width,
            active_height: config.height,
            active_format: PixelFormat::Rgb24,
            config,
            state: None,
            frame_count: 0,
        }
    }

    fn open(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let device_err = |what: &str, err: std::io::Error| {
            PipelineError::device(format!("{} {}: {}", what, self.config.device, err))
        };

        let mut device = v4l::Device::with_path(&self.config.device)
            .map_err(|err| device_err("open camera", err))?;
        let mut format = device
            .format()
            .map_err(|err| device_err("read format of", err))?;
        format.width = self.config.width;
        format.height = self.config.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "CameraSource: failed to set format on {}: {}",
                    self.config.device,
                    err
                );
                device
                    .format()
                    .map_err(|err| device_err("read format of", err))?
            }
        };

        let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            PipelineError::device(format!(
                "camera {} negotiated unsupported pixel format {}",
                self.config.device, format.fourcc
            ))
        })?;

        if self.config.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.config.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "CameraSource: failed to set fps on {}: {}",
                    self.config.device,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;
        self.active_format = pixel_format;

        let device_path = self.config.device.clone();
        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4).map_err(
                    |err| {
                        PipelineError::device(format!(
                            "create buffer stream for {}: {}",
                            device_path, err
                        ))
                    },
                )
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "CameraSource: opened {} ({}x{} {:?})",
            self.config.device,
            self.active_width,
            self.active_height,
            self.active_format
        );
        Ok(())
    }

    fn read_next(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let Some(state) = self.state.as_mut() else {
            return Err(PipelineError::device(format!(
                "camera {} is not open",
                self.config.device
            ))
            .into());
        };
        let device = &self.config.device;
        let buf = state.with_mut(|fields| {
            fields
                .stream
                .next()
                .map(|(buf, _meta)| buf.to_vec())
                .map_err(|err| {
                    PipelineError::device(format!("capture frame from {}: {}", device, err))
                })
        })?;

        let rgb = normalize_to_rgb(
            &buf,
            self.active_width,
            self.active_height,
            self.active_format,
        )
        .map_err(|err| PipelineError::device(format!("decode frame from {}: {}", device, err)))?;

        self.frame_count += 1;
        Frame::from_rgb(rgb, self.active_width, self.active_height, self.frame_count)
    }

    fn release(&mut self) {
        if self.state.take().is_some() {
            log::info!(
                "CameraSource: released {} after {} frames",
                self.config.device,
                self.frame_count
            );
        }
    }

    fn stats(&self) -> CameraStats {
        CameraStats {
            frames_captured: self.frame_count,
            device: self.config.device.clone(),
        }
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error_kind, ErrorKind};

    fn stub_config() -> CameraConfig {
        CameraConfig {
            device: "stub://test".to_string(),
            target_fps: 0,
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn camera_source_produces_frames() -> Result<()> {
        let mut source = CameraSource::new(stub_config());
        source.open()?;

        let frame = source.read_next()?;
        assert_eq!(frame.width(), 64);
        assert_eq!(frame.height(), 48);
        assert_eq!(frame.sequence, 1);
        assert_eq!(source.read_next()?.sequence, 2);
        assert_eq!(source.stats().frames_captured, 2);

        Ok(())
    }

    #[test]
    fn reading_before_open_is_a_device_error() {
        let mut source = CameraSource::new(stub_config());
        let err = source.read_next().unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Device));
    }

    #[test]
    fn release_closes_the_source() -> Result<()> {
        let mut source = CameraSource::new(stub_config());
        source.open()?;
        source.read_next()?;

        source.release();
        let err = source.read_next().unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Device));
        assert_eq!(source.stats().frames_captured, 1);
        source.release();
        Ok(())
    }

    #[test]
    fn index_maps_to_device_node() {
        assert_eq!(CameraConfig::for_index(0).device, "/dev/video0");
        assert_eq!(CameraConfig::for_index(2).device, "/dev/video2");
        assert!(!CameraConfig::for_index(0).is_synthetic());
    }

    #[cfg(not(feature = "ingest-v4l2"))]
    #[test]
    fn real_devices_need_the_v4l2_feature() {
        let mut source = CameraSource::new(CameraConfig::for_index(0));
        let err = source.open().unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::Device));
    }
}
