#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::Result;
use tract_onnx::prelude::*;

use crate::classify::backend::{Classifier, ScoreVector};
use crate::classify::engine::ModelFormat;
use crate::classify::nodes::{discover_input_node, discover_output_node};
use crate::preprocess::InputTensor;
use crate::PipelineError;

/// Tract-based classifier for exported image models.
///
/// Loads a local ONNX file or frozen TensorFlow graph, wires the discovered
/// input/output operations, and pins the input to `[1, 224, 224, 3]` f32.
/// No network I/O; nothing is written to disk.
pub struct TractClassifier {
    model: TypedRunnableModel<TypedModel>,
}

impl TractClassifier {
    /// Load a model from disk and prepare it for inference.
    pub fn load<P: AsRef<Path>>(model_path: P, format: ModelFormat) -> Result<Self> {
        let model_path = model_path.as_ref();
        let fail = |stage: &str, err: anyhow::Error| {
            PipelineError::load(format!("{} {}: {:#}", stage, model_path.display(), err))
        };

        let model = match format {
            ModelFormat::Onnx => tract_onnx::onnx().model_for_path(model_path),
            ModelFormat::TensorFlow => tract_tensorflow::tensorflow().model_for_path(model_path),
        }
        .map_err(|err| fail("failed to load model", err))?;

        let (input_node, output_node) = {
            let names: Vec<&str> = model.nodes().iter().map(|node| node.name.as_str()).collect();
            (
                discover_input_node(names.iter().copied())?,
                discover_output_node(names.iter().copied())?,
            )
        };
        log::info!(
            "model {}: input node '{}', output node '{}'",
            model_path.display(),
            input_node,
            output_node
        );

        let shape = InputTensor::SHAPE;
        let model = model
            .with_input_names([input_node.as_str()])
            .and_then(|m| m.with_output_names([output_node.as_str()]))
            .map_err(|err| fail("failed to bind input/output nodes of", err))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(shape[0], shape[1], shape[2], shape[3])),
            )
            .map_err(|err| fail("failed to set input fact for", err))?
            .into_optimized()
            .map_err(|err| fail("failed to optimize", err))?
            .into_runnable()
            .map_err(|err| fail("failed to build runnable", err))?;

        Ok(Self { model })
    }

    fn build_input(&self, input: &InputTensor) -> Result<Tensor> {
        Tensor::from_shape(&input.shape(), input.as_slice()).map_err(|err| {
            PipelineError::inference(format!("failed to build input tensor: {:#}", err)).into()
        })
    }

    fn extract_scores(&self, outputs: TVec<TValue>) -> Result<ScoreVector> {
        let output = outputs
            .first()
            .ok_or_else(|| PipelineError::inference("model produced no outputs"))?;
        // Output is [batch = 1, classes]; the single batch row is the score vector.
        let scores = output.as_slice::<f32>().map_err(|err| {
            PipelineError::inference(format!("model output tensor was not f32: {:#}", err))
        })?;
        Ok(scores.to_vec())
    }
}

impl Classifier for TractClassifier {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn classify(&mut self, input: &InputTensor) -> Result<ScoreVector> {
        let tensor = self.build_input(input)?;
        let outputs = self
            .model
            .run(tvec!(tensor.into()))
            .map_err(|err| PipelineError::inference(format!("inference failed: {:#}", err)))?;
        self.extract_scores(outputs)
    }
}
