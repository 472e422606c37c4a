mod backend;
mod backends;
pub mod labels;
mod registry;
mod result;

pub use backend::{run_detector, Detector, DEFAULT_SCORE_THRESHOLD};
pub use backends::{ScriptedBackend, StubBackend};
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use registry::{BackendFactory, BackendParams, BackendRegistry};
pub use result::{BoundingBox, Detection};
