use super::preprocess::{softmax, Preprocessor};
use super::types::{Classifier, Prediction};
use anyhow::{bail, Context, Result};
use image::RgbImage;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;

/// Image classifier backed by an ONNX model
///
/// The model takes one image tensor and returns one score per label, in the
/// same order as the labels file.
pub struct OnnxClassifier {
    session: Session,
    preprocessor: Preprocessor,
    labels: Vec<String>,
    apply_softmax: bool,
}

impl OnnxClassifier {
    pub fn new<P: AsRef<Path>>(
        model_path: P,
        labels: Vec<String>,
        preprocessor: Preprocessor,
        apply_softmax: bool,
    ) -> Result<Self> {
        let path = model_path.as_ref();

        tracing::info!("Loading classifier model from {}", path.display());

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(2)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        tracing::info!("Classifier model loaded successfully");

        Ok(Self {
            session,
            preprocessor,
            labels,
            apply_softmax,
        })
    }
}

impl Classifier for OnnxClassifier {
    fn classify(&mut self, frame: &RgbImage) -> Result<Vec<Prediction>> {
        let _span = tracing::debug_span!("classify").entered();

        let input = self.preprocessor.preprocess(frame);

        let _infer_span = tracing::debug_span!("inference").entered();
        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])
            .context("Failed to run inference")?;
        drop(_infer_span);

        let scores: Vec<f32> = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to read model output")?
            .iter()
            .copied()
            .collect();

        if scores.len() != self.labels.len() {
            bail!(
                "Model returned {} scores for {} labels",
                scores.len(),
                self.labels.len()
            );
        }

        let scores = if self.apply_softmax {
            softmax(&scores)
        } else {
            scores
        };

        Ok(self
            .labels
            .iter()
            .zip(scores)
            .map(|(label, confidence)| Prediction::new(label.clone(), confidence))
            .collect())
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }
}
