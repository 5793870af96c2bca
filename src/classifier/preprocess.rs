use clap::ValueEnum;
use image::{imageops, RgbImage};
use ndarray::Array4;

/// Memory layout the model expects for its image input
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TensorLayout {
    /// [1, height, width, 3], as exported from Keras/TensorFlow
    Nhwc,
    /// [1, 3, height, width], as exported from PyTorch
    Nchw,
}

/// Preprocessor for converting camera frames to classifier input tensors
pub struct Preprocessor {
    size: u32,
    layout: TensorLayout,
}

impl Preprocessor {
    pub fn new(size: u32, layout: TensorLayout) -> Self {
        Self { size, layout }
    }

    /// Preprocess an RGB frame into a normalized tensor
    ///
    /// Steps:
    /// 1. Crop the largest centered square
    /// 2. Resize to `size` x `size`
    /// 3. Scale each channel from [0, 255] to [-1, 1]
    /// 4. Lay out as NHWC or NCHW
    pub fn preprocess(&self, image: &RgbImage) -> Array4<f32> {
        let _span = tracing::debug_span!("preprocess").entered();

        let square = center_square(image);
        let resized = if square.dimensions() != (self.size, self.size) {
            imageops::resize(
                &square,
                self.size,
                self.size,
                imageops::FilterType::Triangle,
            )
        } else {
            square
        };

        let side = self.size as usize;
        let mut tensor = match self.layout {
            TensorLayout::Nhwc => Array4::<f32>::zeros((1, side, side, 3)),
            TensorLayout::Nchw => Array4::<f32>::zeros((1, 3, side, side)),
        };

        for (x, y, pixel) in resized.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for c in 0..3 {
                let value = pixel[c] as f32 / 127.5 - 1.0;
                match self.layout {
                    TensorLayout::Nhwc => tensor[[0, y, x, c]] = value,
                    TensorLayout::Nchw => tensor[[0, c, y, x]] = value,
                }
            }
        }

        tensor
    }
}

/// Crop the largest square centered in the frame
fn center_square(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let side = width.min(height);
    if width == height {
        return image.clone();
    }
    let x = (width - side) / 2;
    let y = (height - side) / 2;
    imageops::crop_imm(image, x, y, side, side).to_image()
}

/// Turn raw logits into probabilities
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum == 0.0 || !sum.is_finite() {
        return exps;
    }
    exps.into_iter().map(|v| v / sum).collect()
}
