mod labels;
mod onnx;
mod preprocess;
pub mod types;

pub use labels::load_labels;
pub use onnx::OnnxClassifier;
pub use preprocess::{Preprocessor, TensorLayout};
pub use types::{top_prediction, Classifier, Prediction};

use anyhow::Result;
use std::path::Path;

/// Create the ONNX-backed classifier with labels loaded from `labels_path`
pub fn create_default_classifier(
    model_path: &Path,
    labels_path: &Path,
    preprocessor: Preprocessor,
    apply_softmax: bool,
) -> Result<Box<dyn Classifier>> {
    let labels = load_labels(labels_path)?;
    let classifier = OnnxClassifier::new(model_path, labels, preprocessor, apply_softmax)?;
    Ok(Box::new(classifier))
}
