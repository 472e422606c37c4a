use crate::detect::result::Detection;
use crate::error::InferenceError;
use crate::frame::Frame;

/// Default minimum confidence for reported detections.
pub const DEFAULT_SCORE_THRESHOLD: f32 = 0.4;

/// Detector backend trait.
///
/// Given a frame, returns the objects found in it. Each call is independent:
/// backends keep no history between frames, so the same frame always yields
/// the same answer regardless of what came before.
///
/// Backends normally run on the inference worker thread.
pub trait Detector: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame, dropping results below `score_threshold`.
    ///
    /// Callers guarantee the frame has non-zero dimensions.
    fn detect(
        &mut self,
        frame: &Frame,
        score_threshold: f32,
    ) -> Result<Vec<Detection>, InferenceError>;

    /// Optional warm-up hook, run once after loading.
    fn warm_up(&mut self) -> Result<(), InferenceError> {
        Ok(())
    }
}

impl<D: Detector + ?Sized> Detector for Box<D> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn detect(
        &mut self,
        frame: &Frame,
        score_threshold: f32,
    ) -> Result<Vec<Detection>, InferenceError> {
        (**self).detect(frame, score_threshold)
    }

    fn warm_up(&mut self) -> Result<(), InferenceError> {
        (**self).warm_up()
    }
}

/// Run a detector behind the uniform adapter contract.
///
/// Rejects frames without dimensions before the backend sees them and
/// enforces the score threshold even if a backend ignores it.
pub fn run_detector(
    detector: &mut dyn Detector,
    frame: &Frame,
    score_threshold: f32,
) -> Result<Vec<Detection>, InferenceError> {
    if !frame.has_dimensions() {
        return Err(InferenceError::MalformedInput(format!(
            "frame {} has zero dimensions ({}x{})",
            frame.sequence, frame.width, frame.height
        )));
    }
    let mut detections = detector.detect(frame, score_threshold)?;
    detections.retain(|d| d.confidence_score() >= score_threshold);
    Ok(detections)
}
