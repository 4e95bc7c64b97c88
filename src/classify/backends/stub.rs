use anyhow::Result;

use crate::classify::backend::{Classifier, ScoreVector};
use crate::preprocess::InputTensor;
use crate::PipelineError;

/// Stub backend for tests and hardware-free runs.
///
/// Replays a fixed script of score vectors, one per call, wrapping around at
/// the end. The input tensor is ignored.
pub struct StubClassifier {
    script: Vec<ScoreVector>,
    cursor: usize,
    calls: u64,
}

impl StubClassifier {
    pub fn new(script: Vec<ScoreVector>) -> Result<Self> {
        if script.is_empty() {
            return Err(PipelineError::load("stub classifier needs at least one score vector").into());
        }
        Ok(Self {
            script,
            cursor: 0,
            calls: 0,
        })
    }

    /// Always returns the same scores.
    pub fn constant(scores: ScoreVector) -> Self {
        Self {
            script: vec![scores],
            cursor: 0,
            calls: 0,
        }
    }

    /// Moves a clear winner through `classes` indices, one step per call.
    pub fn rotating(classes: usize) -> Self {
        let script = (0..classes.max(1))
            .map(|winner| {
                (0..classes.max(1))
                    .map(|i| if i == winner { 0.9 } else { 0.1 / classes as f32 })
                    .collect()
            })
            .collect();
        Self {
            script,
            cursor: 0,
            calls: 0,
        }
    }

    pub fn calls(&self) -> u64 {
        self.calls
    }
}

impl Classifier for StubClassifier {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn classify(&mut self, _input: &InputTensor) -> Result<ScoreVector> {
        let scores = self.script[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.script.len();
        self.calls += 1;
        Ok(scores)
    }
}
