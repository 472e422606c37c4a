//! Model load boundary.
//!
//! Loading happens once, off the loop thread. The preferred backend is tried
//! first and the fallback second. If both fail the session keeps running with
//! detection marked unavailable; there is no retry.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};

use crate::detect::{BackendParams, BackendRegistry, Detector};
use crate::error::ModelLoadError;

/// Which backends to try, and with what parameters.
#[derive(Clone, Debug)]
pub struct ModelSpec {
    pub preferred_backend: String,
    pub fallback_backend: Option<String>,
    pub model_path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            preferred_backend: "stub".to_string(),
            fallback_backend: None,
            model_path: None,
            input_width: 640,
            input_height: 640,
        }
    }
}

impl ModelSpec {
    fn params(&self) -> BackendParams {
        BackendParams {
            model_path: self.model_path.clone(),
            input_width: self.input_width,
            input_height: self.input_height,
        }
    }
}

/// Detection availability as seen by the UI.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ModelStatus {
    Loading,
    Ready { backend: String },
    Unavailable { reason: String },
}

impl ModelStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, ModelStatus::Ready { .. })
    }
}

/// A loaded, warmed-up detector.
pub struct LoadedModel {
    pub backend: String,
    pub detector: Box<dyn Detector>,
}

impl std::fmt::Debug for LoadedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedModel")
            .field("backend", &self.backend)
            .finish()
    }
}

/// Load the preferred backend, falling back once if it is unavailable.
pub fn load_model(
    registry: &BackendRegistry,
    spec: &ModelSpec,
) -> Result<LoadedModel, ModelLoadError> {
    let params = spec.params();
    let mut attempts = vec![spec.preferred_backend.as_str()];
    if let Some(fallback) = spec.fallback_backend.as_deref() {
        if fallback != spec.preferred_backend {
            attempts.push(fallback);
        }
    }

    let mut failures = Vec::new();
    for name in attempts {
        let mut detector = match registry.create(name, &params) {
            Ok(detector) => detector,
            Err(err) => {
                log::warn!("ModelLoader: backend {} unavailable: {:#}", name, err);
                failures.push(format!("{}: {:#}", name, err));
                continue;
            }
        };
        if let Err(err) = detector.warm_up() {
            log::warn!("ModelLoader: backend {} failed warm-up: {}", name, err);
            failures.push(format!("{}: {}", name, err));
            continue;
        }
        log::info!("ModelLoader: using {} backend", name);
        return Ok(LoadedModel {
            backend: name.to_string(),
            detector,
        });
    }

    Err(ModelLoadError::new(failures.join("; ")))
}

/// One-shot background model load.
pub struct ModelLoader {
    rx: Option<Receiver<Result<LoadedModel, ModelLoadError>>>,
}

impl ModelLoader {
    /// Start loading on a background thread.
    pub fn spawn(registry: BackendRegistry, spec: ModelSpec) -> Self {
        let (tx, rx) = mpsc::channel();
        let spawned = std::thread::Builder::new()
            .name("model-load".to_string())
            .spawn(move || {
                let _ = tx.send(load_model(&registry, &spec));
            });
        match spawned {
            Ok(_) => Self { rx: Some(rx) },
            Err(err) => Self::finished(Err(ModelLoadError::new(format!(
                "spawn model loader: {}",
                err
            )))),
        }
    }

    /// A loader whose result is already known.
    pub fn finished(result: Result<LoadedModel, ModelLoadError>) -> Self {
        let (tx, rx) = mpsc::channel();
        let _ = tx.send(result);
        Self { rx: Some(rx) }
    }

    /// The load result once available. Returns `Some` exactly once.
    pub fn try_take(&mut self) -> Option<Result<LoadedModel, ModelLoadError>> {
        let rx = self.rx.as_ref()?;
        match rx.try_recv() {
            Ok(result) => {
                self.rx = None;
                Some(result)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.rx = None;
                Some(Err(ModelLoadError::new("model loader exited without a result")))
            }
        }
    }
}
