use anyhow::Result;
use std::path::{Path, PathBuf};

use super::backend::{Classifier, ScoreVector};
use super::backends::StubClassifier;
use super::labels::LabelTable;
use super::result::{reduce, Prediction};
use crate::preprocess::InputTensor;
use crate::PipelineError;

/// Label file expected at the root of a model directory.
pub const LABELS_FILE: &str = "labels.txt";
/// ONNX export of the classifier.
pub const ONNX_MODEL_FILE: &str = "model.onnx";
/// Frozen TensorFlow graph of the classifier.
pub const TF_MODEL_FILE: &str = "model.pb";

/// Serialization of the model file in a model directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ModelFormat {
    Onnx,
    TensorFlow,
}

impl ModelFormat {
    /// Locate the model file inside `dir`. ONNX is preferred when both exist.
    pub fn detect(dir: &Path) -> Option<(PathBuf, ModelFormat)> {
        [
            (ONNX_MODEL_FILE, ModelFormat::Onnx),
            (TF_MODEL_FILE, ModelFormat::TensorFlow),
        ]
        .into_iter()
        .map(|(file, format)| (dir.join(file), format))
        .find(|(path, _)| path.is_file())
    }
}

/// A loaded model paired with its label table.
///
/// Built once at startup; labels are loaded as part of construction, so every
/// engine can classify. Owned by one capture worker at a time.
pub struct InferenceEngine {
    classifier: Box<dyn Classifier>,
    labels: LabelTable,
}

impl std::fmt::Debug for InferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("classifier", &self.classifier.name())
            .field("labels", &self.labels)
            .finish()
    }
}

impl InferenceEngine {
    pub fn new<C: Classifier + 'static>(classifier: C, labels: LabelTable) -> Self {
        Self {
            classifier: Box::new(classifier),
            labels,
        }
    }

    /// Load `labels.txt` and the model file from `dir`.
    ///
    /// `stub://` directories load a rotating stub classifier over
    /// rock/paper/scissors so the pipeline can run without a model.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        if dir.to_string_lossy().starts_with("stub://") {
            let labels = LabelTable::new(["rock", "paper", "scissors"])?;
            log::info!("model {}: stub classifier", dir.display());
            return Ok(Self::new(StubClassifier::rotating(labels.len()), labels));
        }

        if !dir.is_dir() {
            return Err(PipelineError::load(format!(
                "model directory {} does not exist",
                dir.display()
            ))
            .into());
        }
        let labels = LabelTable::load(dir.join(LABELS_FILE))?;
        let (model_path, format) = ModelFormat::detect(dir).ok_or_else(|| {
            PipelineError::load(format!(
                "no {} or {} in {}",
                ONNX_MODEL_FILE,
                TF_MODEL_FILE,
                dir.display()
            ))
        })?;

        let mut engine = Self::load_model(&model_path, format, labels)?;
        engine.classifier.warm_up()?;
        log::info!(
            "model loaded from {} ({:?}, {} classes)",
            model_path.display(),
            format,
            engine.labels.len()
        );
        Ok(engine)
    }

    #[cfg(feature = "backend-tract")]
    fn load_model(path: &Path, format: ModelFormat, labels: LabelTable) -> Result<Self> {
        let classifier = super::backends::TractClassifier::load(path, format)?;
        Ok(Self::new(classifier, labels))
    }

    #[cfg(not(feature = "backend-tract"))]
    fn load_model(path: &Path, format: ModelFormat, _labels: LabelTable) -> Result<Self> {
        Err(PipelineError::load(format!(
            "loading {:?} model {} requires the backend-tract feature",
            format,
            path.display()
        ))
        .into())
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    pub fn backend_name(&self) -> &'static str {
        self.classifier.name()
    }

    /// One forward pass. Scores must line up with the label table.
    pub fn classify(&mut self, input: &InputTensor) -> Result<ScoreVector> {
        let scores = self.classifier.classify(input)?;
        if scores.len() != self.labels.len() {
            return Err(PipelineError::label_mismatch(format!(
                "model produced {} scores for {} labels",
                scores.len(),
                self.labels.len()
            ))
            .into());
        }
        Ok(scores)
    }

    /// Classify and reduce to the winning class.
    pub fn predict(&mut self, input: &InputTensor) -> Result<Prediction> {
        let scores = self.classify(input)?;
        reduce(&scores, &self.labels)
    }
}
