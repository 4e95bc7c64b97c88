//! rps-vision
//!
//! Camera-driven Rock, Paper, Scissors.
//!
//! # Architecture
//!
//! The crate is built around a single perception pipeline:
//!
//! 1. **Ingest**: a `FrameSource` owns the camera and yields RGB frames.
//! 2. **Preprocess**: frames become fixed-shape `[1, 224, 224, 3]` tensors.
//! 3. **Classify**: an `InferenceEngine` runs the model and reduces the scores
//!    to a `Prediction` (class name + confidence).
//! 4. **Publish**: the `CaptureLoop` worker overwrites a single shared
//!    `PredictionSlot` every iteration and hands each frame to a `DisplaySink`.
//!
//! The game polls the slot on its own cadence; the pipeline never pushes.
//!
//! # Module Structure
//!
//! - `frame`: immutable RGB frames
//! - `ingest`: frame sources (V4L2 cameras, synthetic `stub://` devices)
//! - `preprocess`: resize + normalize into the model input tensor
//! - `classify`: classifier backends, label table, node discovery, reduction
//! - `capture`: the background capture loop, prediction slot, display sinks
//! - `game`: hands, referee, round results
//! - `config`: file + environment configuration

pub mod capture;
pub mod classify;
pub mod config;
pub mod frame;
pub mod game;
pub mod ingest;
pub mod preprocess;

pub use capture::{CaptureLoop, CaptureState, ChannelSink, DisplaySink, NullSink, PredictionSlot};
pub use classify::{
    discover_input_node, discover_output_node, reduce, Classifier, InferenceEngine, LabelTable,
    Prediction, ScoreVector, StubClassifier,
};
#[cfg(feature = "backend-tract")]
pub use classify::TractClassifier;
pub use frame::Frame;
pub use game::{Hand, Outcome, Referee, RoundResult};
pub use ingest::{CameraConfig, CameraSource, CameraStats, FrameSource};
pub use preprocess::{InputTensor, Preprocessor, INPUT_CHANNELS, INPUT_SIZE};

/// Category of a pipeline failure.
///
/// None of these are retried. Device errors end the capture loop, load errors
/// end startup, inference errors end the capture loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Camera unavailable, or a frame read failed.
    Device,
    /// Model or labels could not be loaded.
    Load,
    /// The inference session is unusable.
    Inference,
    /// The score vector does not line up with the label table.
    LabelMismatch,
}

impl ErrorKind {
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Device => "device_error",
            ErrorKind::Load => "load_error",
            ErrorKind::Inference => "inference_error",
            ErrorKind::LabelMismatch => "label_mismatch",
        }
    }
}

/// Typed pipeline failure. Travels inside `anyhow::Error`; use
/// `err.downcast_ref::<PipelineError>()` to recover the kind.
#[derive(Clone, Debug)]
pub struct PipelineError {
    pub kind: ErrorKind,
    pub message: String,
}

impl PipelineError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn device(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Device, message)
    }

    pub fn load(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Load, message)
    }

    pub fn inference(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Inference, message)
    }

    pub fn label_mismatch(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::LabelMismatch, message)
    }
}

impl std::fmt::Display for PipelineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind.code(), self.message)
    }
}

impl std::error::Error for PipelineError {}

/// Returns the pipeline error kind carried by `err`, if any.
pub fn error_kind(err: &anyhow::Error) -> Option<ErrorKind> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<PipelineError>())
        .map(|e| e.kind)
}
