//! Error taxonomy for the detection front end.
//!
//! Each subsystem fails with its own error type so a failure can be degraded
//! locally without cascading: acquisition errors are surfaced to the user,
//! inference errors are retried by the scheduler, network errors fall back to
//! synthesized enrichment, and a model load error disables detection only.

use thiserror::Error;

/// Failure to acquire or keep a frame source.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AcquisitionError {
    #[error("camera permission denied: {0}")]
    PermissionDenied(String),
    #[error("camera unavailable: {0}")]
    DeviceUnavailable(String),
    #[error("image decode failed: {0}")]
    Decode(String),
    #[error("frame stream lost: {0}")]
    StreamLost(String),
}

/// Failure to load the inference model. Fatal to detection for the session.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("model load failed: {reason}")]
pub struct ModelLoadError {
    pub reason: String,
}

impl ModelLoadError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Transient failure of a single detect call.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InferenceError {
    #[error("malformed input: {0}")]
    MalformedInput(String),
    #[error("inference backend failure: {0}")]
    Backend(String),
    #[error("inference worker disconnected")]
    Disconnected,
}

/// Failure of the remote enrichment exchange.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum NetworkError {
    #[error("enrichment endpoint not configured")]
    NotConfigured,
    #[error("server responded with status: {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("invalid response body: {0}")]
    InvalidBody(String),
}
