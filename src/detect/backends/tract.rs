#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use image::RgbImage;
use tract_onnx::prelude::*;

use crate::detect::backend::Detector;
use crate::detect::labels::COCO_LABELS;
use crate::detect::result::{BoundingBox, Detection};
use crate::error::InferenceError;
use crate::frame::Frame;

const NMS_IOU_THRESHOLD: f32 = 0.45;

type RunnableModel = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract-based backend for YOLO-style ONNX detection models.
///
/// Expects a single input `[1, 3, H, W]` (RGB, 0..1) and a single output
/// `[1, 4 + classes, anchors]` with centre-format boxes in input pixels.
/// Frames are resized to the model input and boxes scaled back to frame pixels.
pub struct TractBackend {
    model: RunnableModel,
    width: u32,
    height: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, width: u32, height: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(
                    f32::datum_type(),
                    tvec!(1, 3, height as usize, width as usize),
                ),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self {
            model,
            width,
            height,
        })
    }

    fn build_input(&self, frame: &Frame) -> Result<Tensor> {
        let rgb = RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not match its dimensions"))?;
        let resized = image::imageops::resize(&rgb, self.width, self.height, FilterType::Triangle);
        let input = tract_ndarray::Array4::from_shape_fn(
            (1, 3, self.height as usize, self.width as usize),
            |(_, channel, y, x)| resized.get_pixel(x as u32, y as u32)[channel] as f32 / 255.0,
        );
        Ok(input.into_tensor())
    }

    fn decode_output(
        &self,
        outputs: TVec<TValue>,
        frame: &Frame,
        score_threshold: f32,
    ) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output is not rank 3")?;
        let (_, rows, anchors) = view.dim();
        if rows <= 4 {
            return Err(anyhow!("unexpected output shape {:?}", view.shape()));
        }
        let classes = rows - 4;
        let sx = frame.width as f32 / self.width as f32;
        let sy = frame.height as f32 / self.height as f32;

        let mut candidates = Vec::new();
        for a in 0..anchors {
            let (mut best_class, mut best_score) = (0usize, f32::MIN);
            for c in 0..classes {
                let score = view[[0, 4 + c, a]];
                if score > best_score {
                    best_class = c;
                    best_score = score;
                }
            }
            if best_score < score_threshold {
                continue;
            }
            let (cx, cy) = (view[[0, 0, a]], view[[0, 1, a]]);
            let (w, h) = (view[[0, 2, a]], view[[0, 3, a]]);
            let bbox = BoundingBox::new((cx - w / 2.0) * sx, (cy - h / 2.0) * sy, w * sx, h * sy);
            let label = COCO_LABELS
                .get(best_class)
                .map(|l| l.to_string())
                .unwrap_or_else(|| format!("class_{}", best_class));
            candidates.push(Detection::new(label, best_score, bbox));
        }

        Ok(non_max_suppression(candidates, NMS_IOU_THRESHOLD))
    }
}

fn non_max_suppression(mut candidates: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    candidates.sort_by(|a, b| b.confidence_score().total_cmp(&a.confidence_score()));
    let mut kept: Vec<Detection> = Vec::new();
    for cand in candidates {
        if kept
            .iter()
            .all(|k| k.bounding_box().iou(&cand.bounding_box()) < iou_threshold)
        {
            kept.push(cand);
        }
    }
    kept
}

impl Detector for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(
        &mut self,
        frame: &Frame,
        score_threshold: f32,
    ) -> Result<Vec<Detection>, InferenceError> {
        let input = self
            .build_input(frame)
            .map_err(|e| InferenceError::MalformedInput(e.to_string()))?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .map_err(|e| InferenceError::Backend(format!("ONNX inference failed: {}", e)))?;
        self.decode_output(outputs, frame, score_threshold)
            .map_err(|e| InferenceError::Backend(e.to_string()))
    }

    fn warm_up(&mut self) -> Result<(), InferenceError> {
        let blank = Frame::solid(self.width, self.height, [0, 0, 0], 0);
        self.detect(&blank, 1.0).map(|_| ())
    }
}
