use crate::detect::backend::Detector;
use crate::detect::result::{BoundingBox, Detection};
use crate::error::InferenceError;
use crate::frame::Frame;

const DEFAULT_LUMA_THRESHOLD: u8 = 220;
const MIN_BLOB_PIXELS: u32 = 16;

/// Stub backend for demos and tests. Reports the bounding box of bright pixels.
///
/// Pairs with the synthetic camera, which draws a bright square over a dark
/// background. Confidence is the fill ratio of bright pixels inside the box,
/// mapped into `[0.5, 1.0]`.
pub struct StubBackend {
    label: String,
    luma_threshold: u8,
}

impl StubBackend {
    pub fn new() -> Self {
        Self {
            label: "object".to_string(),
            luma_threshold: DEFAULT_LUMA_THRESHOLD,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

impl Default for StubBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Detector for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(
        &mut self,
        frame: &Frame,
        score_threshold: f32,
    ) -> Result<Vec<Detection>, InferenceError> {
        let pixels = frame.pixels();
        let width = frame.width as usize;
        if pixels.len() != width * frame.height as usize * 3 {
            return Err(InferenceError::MalformedInput(
                "pixel buffer does not match frame dimensions".to_string(),
            ));
        }

        let (mut min_x, mut min_y) = (u32::MAX, u32::MAX);
        let (mut max_x, mut max_y) = (0u32, 0u32);
        let mut count = 0u32;
        for (i, px) in pixels.chunks_exact(3).enumerate() {
            let luma = (px[0] as u32 * 299 + px[1] as u32 * 587 + px[2] as u32 * 114) / 1000;
            if luma >= self.luma_threshold as u32 {
                let x = (i % width) as u32;
                let y = (i / width) as u32;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x);
                max_y = max_y.max(y);
                count += 1;
            }
        }

        if count < MIN_BLOB_PIXELS {
            return Ok(Vec::new());
        }

        let box_w = max_x - min_x + 1;
        let box_h = max_y - min_y + 1;
        let fill = count as f32 / (box_w * box_h) as f32;
        let score = 0.5 + 0.5 * fill.min(1.0);
        if score < score_threshold {
            return Ok(Vec::new());
        }

        Ok(vec![Detection::new(
            self.label.clone(),
            score,
            BoundingBox::new(min_x as f32, min_y as f32, box_w as f32, box_h as f32),
        )])
    }
}
