use anyhow::Result;
use image::RgbImage;
use std::cmp::Ordering;
use std::fmt;

/// One ranked candidate returned by a classifier
#[derive(Debug, Clone, PartialEq)]
pub struct Prediction {
    pub label: String,
    /// Confidence in [0, 1]
    pub confidence: f32,
}

impl Prediction {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        Self {
            label: label.into(),
            confidence,
        }
    }

    /// Short form of the label for display: `GOOD_POSITION` becomes `GOOD`
    pub fn short_label(&self) -> &str {
        self.label.split('_').next().unwrap_or(&self.label)
    }
}

impl fmt::Display for Prediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Position: {} ({:.2}%)",
            self.short_label(),
            self.confidence * 100.0
        )
    }
}

/// Trait for image classifiers
/// The polling loop only ever sees this seam, so tests can script results.
pub trait Classifier {
    /// Classify a frame into a list of candidates, in the classifier's own order
    fn classify(&mut self, frame: &RgbImage) -> Result<Vec<Prediction>>;

    /// Labels this classifier can produce
    fn labels(&self) -> &[String];
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn classify(&mut self, frame: &RgbImage) -> Result<Vec<Prediction>> {
        (**self).classify(frame)
    }

    fn labels(&self) -> &[String] {
        (**self).labels()
    }
}

/// Pick the highest-confidence candidate
///
/// The sort is stable, so equal confidences keep the order the classifier
/// returned them in. NaN confidences rank below everything else.
/// Returns `None` for an empty list.
pub fn top_prediction(mut predictions: Vec<Prediction>) -> Option<Prediction> {
    predictions.sort_by(|a, b| descending(a.confidence, b.confidence));
    predictions.into_iter().next()
}

fn descending(a: f32, b: f32) -> Ordering {
    match (a.is_nan(), b.is_nan()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
    }
}
