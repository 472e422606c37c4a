use std::collections::BTreeMap;

use anyhow::{anyhow, Result};

use super::backend::Detector;
use super::backends::StubBackend;

/// Parameters a backend factory may need to build its detector.
#[derive(Clone, Debug, Default)]
pub struct BackendParams {
    /// Model file for backends that load one.
    pub model_path: Option<std::path::PathBuf>,
    /// Model input width.
    pub input_width: u32,
    /// Model input height.
    pub input_height: u32,
}

/// Builds a detector. Plain function pointers keep the registry `Send`, so the
/// model loader can move it onto its thread.
pub type BackendFactory = fn(&BackendParams) -> Result<Box<dyn Detector>>;

/// Registry of detector backends, keyed by name.
pub struct BackendRegistry {
    factories: BTreeMap<String, BackendFactory>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    /// Registry with every backend compiled into this build.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("stub", |_| Ok(Box::new(StubBackend::new())));
        #[cfg(feature = "backend-tract")]
        registry.register("tract", |params| {
            let path = params
                .model_path
                .as_ref()
                .ok_or_else(|| anyhow!("tract backend requires a model path"))?;
            Ok(Box::new(super::backends::TractBackend::new(
                path,
                params.input_width,
                params.input_height,
            )?))
        });
        registry
    }

    /// Register a backend factory, replacing any previous one with that name.
    pub fn register(&mut self, name: &str, factory: BackendFactory) {
        self.factories.insert(name.to_string(), factory);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// List registered backends.
    pub fn list(&self) -> Vec<String> {
        self.factories.keys().cloned().collect()
    }

    /// Build the backend registered under `name`.
    pub fn create(&self, name: &str, params: &BackendParams) -> Result<Box<dyn Detector>> {
        let factory = self
            .factories
            .get(name)
            .ok_or_else(|| anyhow!("backend '{}' not registered", name))?;
        factory(params)
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::new()
    }
}
