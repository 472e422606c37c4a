//! Live Detect
//!
//! Real-time object detection front end: acquire frames from a live camera or
//! a still image, run a detector against them at interactive rates, draw the
//! results over the frame, and optionally ask a remote service to enrich the
//! last detections.
//!
//! # Architecture
//!
//! One `DetectionSession` owns all mutable state and is pumped from a single
//! thread. It coordinates:
//!
//! 1. **Frame sources** (`source`): live camera or static image, exactly one
//!    active, the camera released on every exit path.
//! 2. **Detector adapter** (`detect`, `inference`): a uniform detect contract
//!    behind an asynchronous submit/poll port.
//! 3. **Loop scheduler** (`scheduler`): cancellable, self-rescheduling loop
//!    with epoch-tagged results, bounded readiness polling and a fixed retry
//!    cooldown.
//! 4. **Overlay renderer** (`overlay`): canvas resized to each frame, boxes
//!    and label tags drawn on top.
//! 5. **Mode state machine** (`session`): camera/image transitions with
//!    cancel, release, clear, acquire, auto-start.
//! 6. **Enrichment gateway** (`enrich`): one-shot HTTP exchange with local
//!    fallback synthesis.
//!
//! # Module Structure
//!
//! - `frame`: Frame container and dimensions
//! - `source`: Camera and image frame sources
//! - `detect`: Detection types, detector backends, registry
//! - `inference`, `model`: Inference ports and background model loading
//! - `scheduler`, `session`, `runtime`: Loop, mode machine, blocking driver
//! - `overlay`, `report`: Canvas rendering and the text results panel
//! - `enrich`: Enrichment contract, HTTP client, fallback
//! - `config`, `clock`, `error`: Configuration, time source, error taxonomy

pub mod clock;
pub mod config;
pub mod detect;
pub mod enrich;
pub mod error;
pub mod frame;
pub mod inference;
pub mod model;
pub mod overlay;
pub mod report;
pub mod runtime;
pub mod scheduler;
pub mod session;
pub mod source;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LiveDetectConfig;
pub use detect::{
    BackendRegistry, BoundingBox, Detection, Detector, ScriptedBackend, StubBackend,
    DEFAULT_SCORE_THRESHOLD,
};
pub use enrich::{
    DisabledGateway, EnrichedDetection, EnrichmentGateway, EnrichmentOutcome, EnrichmentSource,
    HttpEnrichmentClient, ImageContext,
};
pub use error::{AcquisitionError, InferenceError, ModelLoadError, NetworkError};
pub use frame::{Frame, FrameSize};
pub use inference::{
    InferencePort, InferenceReply, InferenceRequest, InferenceWorker, InlineInference, Ticket,
};
pub use model::{load_model, LoadedModel, ModelLoader, ModelSpec, ModelStatus};
pub use overlay::{Canvas, DrawOp, LabelFont, OverlayRenderer, OverlayStyle};
pub use report::render_report;
pub use runtime::{RunOutcome, SessionDriver};
pub use scheduler::{DetectionLoop, LoopEvent, LoopKind, LoopSettings, LoopState, LoopStats};
pub use session::{
    DetectionSession, EnrichmentRequest, InferenceStrategy, Mode, SessionOptions,
    SessionSnapshot,
};
pub use source::{
    CameraBackend, CameraConstraints, CameraDevice, DefaultSourceProvider, DeviceCameraBackend,
    FrameSource, ImageInput, Readiness, SourceKind, SourceProvider, SourceRequest,
};
