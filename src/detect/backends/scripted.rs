use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::detect::backend::Detector;
use crate::detect::result::Detection;
use crate::error::InferenceError;
use crate::frame::Frame;

type Outcome = Result<Vec<Detection>, InferenceError>;

/// Backend that replays pre-arranged outcomes.
///
/// Outcomes are consumed in order; the last one repeats forever. Useful for
/// demos without a model and for driving the loop through failure paths.
pub struct ScriptedBackend {
    script: VecDeque<Outcome>,
    calls: Arc<AtomicUsize>,
}

impl ScriptedBackend {
    pub fn new(script: impl IntoIterator<Item = Outcome>) -> Self {
        Self {
            script: script.into_iter().collect(),
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always returns the same detections.
    pub fn detections(detections: Vec<Detection>) -> Self {
        Self::new([Ok(detections)])
    }

    /// Always fails with a backend error.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self::new([Err(InferenceError::Backend(reason.into()))])
    }

    /// Shared counter of `detect` invocations.
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        self.calls.clone()
    }
}

impl Detector for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame, score_threshold: f32) -> Outcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let outcome = if self.script.len() > 1 {
            self.script.pop_front()
        } else {
            self.script.front().cloned()
        };
        match outcome {
            Some(Ok(dets)) => Ok(dets
                .into_iter()
                .filter(|d| d.confidence_score() >= score_threshold)
                .collect()),
            Some(Err(err)) => Err(err),
            None => Ok(Vec::new()),
        }
    }
}
