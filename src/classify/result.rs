use anyhow::Result;

use super::labels::LabelTable;
use crate::PipelineError;

/// Outcome of one inference pass.
///
/// `confidence` is the raw winning score. For softmax heads it lies in
/// `[0, 1]`; other heads report whatever the model emits.
#[derive(Clone, Debug, PartialEq)]
pub struct Prediction {
    pub class_name: String,
    pub confidence: f32,
}

impl Prediction {
    pub fn new(class_name: impl Into<String>, confidence: f32) -> Self {
        Self {
            class_name: class_name.into(),
            confidence,
        }
    }
}

impl std::fmt::Display for Prediction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({:.2})", self.class_name, self.confidence)
    }
}

/// Index of the highest score; the lowest index wins ties.
///
/// Scores that never compare greater (NaN) are never selected over index 0.
fn arg_max(scores: &[f32]) -> usize {
    let mut best = 0;
    for (i, score) in scores.iter().enumerate().skip(1) {
        if *score > scores[best] {
            best = i;
        }
    }
    best
}

/// Reduce a score vector to the winning class.
///
/// An empty score vector, or a winner with no label, means the label table
/// does not belong to this model and is reported as `LabelMismatch`.
pub fn reduce(scores: &[f32], labels: &LabelTable) -> Result<Prediction> {
    if scores.is_empty() {
        return Err(PipelineError::label_mismatch("model produced no scores").into());
    }
    let index = arg_max(scores);
    let class_name = labels.get(index).ok_or_else(|| {
        PipelineError::label_mismatch(format!(
            "score index {} has no label ({} labels for {} scores)",
            index,
            labels.len(),
            scores.len()
        ))
    })?;
    Ok(Prediction::new(class_name, scores[index]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error_kind, ErrorKind};

    fn rps_labels() -> LabelTable {
        LabelTable::new(["rock", "paper", "scissors"]).unwrap()
    }

    #[test]
    fn picks_highest_score() -> Result<()> {
        let prediction = reduce(&[0.1, 0.7, 0.2], &rps_labels())?;
        assert_eq!(prediction, Prediction::new("paper", 0.7));
        Ok(())
    }

    #[test]
    fn first_index_wins_ties() -> Result<()> {
        let prediction = reduce(&[0.4, 0.4, 0.2], &rps_labels())?;
        assert_eq!(prediction.class_name, "rock");
        assert_eq!(prediction.confidence, 0.4);
        Ok(())
    }

    #[test]
    fn reduce_is_idempotent() -> Result<()> {
        let labels = rps_labels();
        let scores = [0.05, 0.15, 0.8];
        assert_eq!(reduce(&scores, &labels)?, reduce(&scores, &labels)?);
        Ok(())
    }

    #[test]
    fn raw_scores_pass_through() -> Result<()> {
        let prediction = reduce(&[-3.0, 12.5, 4.0], &rps_labels())?;
        assert_eq!(prediction, Prediction::new("paper", 12.5));
        Ok(())
    }

    #[test]
    fn short_label_table_fails_loudly() {
        let labels = LabelTable::new(["rock", "paper"]).unwrap();
        let err = reduce(&[0.1, 0.2, 0.7], &labels).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::LabelMismatch));

        // Winner within range still resolves.
        assert!(reduce(&[0.9, 0.05, 0.05], &labels).is_ok());
    }

    #[test]
    fn empty_scores_fail() {
        let err = reduce(&[], &rps_labels()).unwrap_err();
        assert_eq!(error_kind(&err), Some(ErrorKind::LabelMismatch));
    }

    #[test]
    fn display_is_compact() {
        assert_eq!(Prediction::new("rock", 0.912).to_string(), "rock (0.91)");
    }
}
