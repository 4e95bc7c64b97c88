mod backend;
mod backends;
mod engine;
mod labels;
mod nodes;
mod result;

pub use backend::{Classifier, ScoreVector};
pub use backends::StubClassifier;
#[cfg(feature = "backend-tract")]
pub use backends::TractClassifier;
pub use engine::{InferenceEngine, ModelFormat, LABELS_FILE, ONNX_MODEL_FILE, TF_MODEL_FILE};
pub use labels::LabelTable;
pub use nodes::{discover_input_node, discover_output_node, IO_NODE_MARKER};
pub use result::{reduce, Prediction};
