use anyhow::Result;

use crate::preprocess::InputTensor;

/// Per-class scores, index-aligned with the label table.
pub type ScoreVector = Vec<f32>;

/// Classifier backend trait.
///
/// A backend owns one loaded model and runs a single forward pass per call.
/// It is driven from the capture worker only, hence `&mut self` and `Send`.
pub trait Classifier: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run one forward pass.
    ///
    /// Failures should carry a `PipelineError` of kind `Inference`; a broken
    /// session is not expected to recover.
    fn classify(&mut self, input: &InputTensor) -> Result<ScoreVector>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
