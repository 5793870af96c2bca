use crate::status::Status;
use image::{imageops, Rgb, RgbImage};

const ALERT_BACKGROUND: Rgb<u8> = Rgb([239, 68, 68]);
const CALM_BACKGROUND: Rgb<u8> = Rgb([80, 80, 80]);
const CONFIDENCE_BAR: Rgb<u8> = Rgb([255, 255, 255]);

/// Renders the preview: the camera image cut to a centered circle over a
/// background that turns red while the alert is active, with the top
/// prediction's confidence as a bar along the bottom edge
pub struct Compositor {
    width: u32,
    height: u32,
    mirror: bool,
}

impl Compositor {
    pub fn new(width: u32, height: u32, mirror: bool) -> Self {
        Self {
            width,
            height,
            mirror,
        }
    }

    pub fn render(&self, status: &Status) -> RgbImage {
        let background = if status.alert_active {
            ALERT_BACKGROUND
        } else {
            CALM_BACKGROUND
        };
        let mut canvas = RgbImage::from_pixel(self.width, self.height, background);

        if let Some(prediction) = &status.prediction {
            self.draw_confidence_bar(&mut canvas, prediction.confidence);
        }

        let Some(frame) = status.frame.as_deref() else {
            return canvas;
        };

        let diameter = self.width.min(self.height) * 4 / 5;
        if diameter == 0 {
            return canvas;
        }
        let face = self.fit_square(frame, diameter);

        let left = (self.width - diameter) / 2;
        let top = (self.height - diameter) / 2;
        let radius = diameter as f32 / 2.0;

        for (x, y, pixel) in face.enumerate_pixels() {
            let dx = x as f32 + 0.5 - radius;
            let dy = y as f32 + 0.5 - radius;
            if dx * dx + dy * dy <= radius * radius {
                canvas.put_pixel(left + x, top + y, *pixel);
            }
        }

        canvas
    }

    fn draw_confidence_bar(&self, canvas: &mut RgbImage, confidence: f32) {
        let thickness = (self.height / 40).max(1);
        if self.height < thickness * 2 {
            return;
        }
        let length = (confidence.clamp(0.0, 1.0) * self.width as f32).round() as u32;
        let top = self.height - thickness * 2;

        for y in top..top + thickness {
            for x in 0..length.min(self.width) {
                canvas.put_pixel(x, y, CONFIDENCE_BAR);
            }
        }
    }

    /// Center-crop the frame to a square and scale it to `side`
    fn fit_square(&self, frame: &RgbImage, side: u32) -> RgbImage {
        let (width, height) = frame.dimensions();
        let crop = width.min(height);
        let square = imageops::crop_imm(frame, (width - crop) / 2, (height - crop) / 2, crop, crop)
            .to_image();
        let mut scaled = imageops::resize(&square, side, side, imageops::FilterType::Triangle);
        if self.mirror {
            imageops::flip_horizontal_in_place(&mut scaled);
        }
        scaled
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Prediction;
    use std::sync::Arc;

    #[test]
    fn confidence_bar_length_follows_prediction() {
        let compositor = Compositor::new(100, 40, false);
        let status = Status {
            prediction: Some(Prediction::new("BAD_POSITION", 0.25)),
            ..Status::default()
        };

        let canvas = compositor.render(&status);

        // 40px high: 1px bar on row 38
        assert_eq!(*canvas.get_pixel(0, 38), CONFIDENCE_BAR);
        assert_eq!(*canvas.get_pixel(24, 38), CONFIDENCE_BAR);
        assert_eq!(*canvas.get_pixel(25, 38), CALM_BACKGROUND);
        assert_eq!(*canvas.get_pixel(0, 39), CALM_BACKGROUND);
    }

    #[test]
    fn no_prediction_no_bar() {
        let canvas = Compositor::new(100, 40, false).render(&Status::default());
        assert!(canvas.pixels().all(|p| *p == CALM_BACKGROUND));
    }

    fn status(alert_active: bool, frame: Option<RgbImage>) -> Status {
        Status {
            alert_active,
            frame: frame.map(Arc::new),
            ..Status::default()
        }
    }

    #[test]
    fn background_follows_alert() {
        let compositor = Compositor::new(20, 10, false);

        let calm = compositor.render(&status(false, None));
        let alert = compositor.render(&status(true, None));

        assert_eq!(*calm.get_pixel(0, 0), CALM_BACKGROUND);
        assert_eq!(*alert.get_pixel(19, 9), ALERT_BACKGROUND);
    }

    #[test]
    fn frame_is_drawn_inside_circle_only() {
        let compositor = Compositor::new(100, 100, false);
        let white = RgbImage::from_pixel(64, 48, Rgb([255, 255, 255]));

        let canvas = compositor.render(&status(false, Some(white)));

        assert_eq!(*canvas.get_pixel(50, 50), Rgb([255, 255, 255]));
        // corner of the 80px square around the circle stays background
        assert_eq!(*canvas.get_pixel(11, 11), CALM_BACKGROUND);
        assert_eq!(*canvas.get_pixel(2, 50), CALM_BACKGROUND);
    }

    #[test]
    fn mirror_flips_left_and_right() {
        let frame = RgbImage::from_fn(40, 40, |x, _| {
            if x < 20 {
                Rgb([255, 0, 0])
            } else {
                Rgb([0, 0, 255])
            }
        });

        let plain = Compositor::new(50, 50, false).render(&status(false, Some(frame.clone())));
        let mirrored = Compositor::new(50, 50, true).render(&status(false, Some(frame)));

        assert_eq!(*plain.get_pixel(15, 25), Rgb([255, 0, 0]));
        assert_eq!(*mirrored.get_pixel(15, 25), Rgb([0, 0, 255]));
    }
}
