use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::enrich::{DisabledGateway, EnrichmentGateway, HttpEnrichmentClient};
use crate::model::ModelSpec;
use crate::overlay::{LabelFont, OverlayStyle};
use crate::scheduler::LoopSettings;
use crate::session::{InferenceStrategy, Mode, SessionOptions};
use crate::source::{CameraConstraints, FacingMode};

const DEFAULT_CAMERA_DEVICE: &str = "stub://front_camera";
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_TARGET_FPS: u32 = 30;
const DEFAULT_BACKEND: &str = "stub";
const DEFAULT_MODEL_INPUT: u32 = 640;
const DEFAULT_SCORE_THRESHOLD: f32 = 0.4;
const DEFAULT_RETRY_COOLDOWN_MS: u64 = 1_000;
const DEFAULT_BOX_THICKNESS: u32 = 2;
const DEFAULT_ENRICH_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Deserialize, Default)]
struct LiveDetectConfigFile {
    camera: Option<CameraConfigFile>,
    model: Option<ModelConfigFile>,
    #[serde(rename = "loop")]
    detection: Option<LoopConfigFile>,
    overlay: Option<OverlayConfigFile>,
    enrichment: Option<EnrichmentConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    facing: Option<String>,
    target_fps: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct ModelConfigFile {
    backend: Option<String>,
    fallback_backend: Option<String>,
    path: Option<PathBuf>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    inference: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct LoopConfigFile {
    score_threshold: Option<f32>,
    retry_cooldown_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct OverlayConfigFile {
    font_path: Option<PathBuf>,
    box_thickness: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct EnrichmentConfigFile {
    url: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct LiveDetectConfig {
    pub camera: CameraSettings,
    pub model: ModelSettings,
    pub detection: DetectionSettings,
    pub overlay: OverlaySettings,
    pub enrichment: EnrichmentSettings,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub facing: FacingMode,
    pub target_fps: u32,
}

#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub backend: String,
    pub fallback_backend: Option<String>,
    pub path: Option<PathBuf>,
    pub input_width: u32,
    pub input_height: u32,
    pub inference: InferenceStrategy,
}

#[derive(Debug, Clone)]
pub struct DetectionSettings {
    pub score_threshold: f32,
    pub retry_cooldown: Duration,
}

#[derive(Debug, Clone)]
pub struct OverlaySettings {
    pub font_path: Option<PathBuf>,
    pub box_thickness: u32,
}

#[derive(Debug, Clone)]
pub struct EnrichmentSettings {
    pub url: Option<String>,
    pub timeout: Duration,
}

impl LiveDetectConfig {
    /// Defaults, then the JSON file named by `LIVEDETECT_CONFIG`, then
    /// `LIVEDETECT_*` environment overrides.
    pub fn load() -> Result<Self> {
        let config_path = std::env::var("LIVEDETECT_CONFIG").ok();
        let mut cfg = match config_path.as_deref() {
            Some(path) => {
                let path = Path::new(path);
                Self::from_file(read_config_file(path)?, path.parent())?
            }
            None => Self::from_file(LiveDetectConfigFile::default(), None)?,
        };
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load from an explicit file, ignoring the environment.
    pub fn from_path(path: &Path) -> Result<Self> {
        let cfg = Self::from_file(read_config_file(path)?, path.parent())?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: LiveDetectConfigFile, base_dir: Option<&Path>) -> Result<Self> {
        let camera_file = file.camera.unwrap_or_default();
        let camera = CameraSettings {
            device: camera_file
                .device
                .unwrap_or_else(|| DEFAULT_CAMERA_DEVICE.to_string()),
            width: camera_file.width.unwrap_or(DEFAULT_CAMERA_WIDTH),
            height: camera_file.height.unwrap_or(DEFAULT_CAMERA_HEIGHT),
            facing: match camera_file.facing.as_deref() {
                Some(facing) => parse_facing(facing)?,
                None => FacingMode::Environment,
            },
            target_fps: camera_file.target_fps.unwrap_or(DEFAULT_TARGET_FPS),
        };

        let model_file = file.model.unwrap_or_default();
        let model = ModelSettings {
            backend: model_file
                .backend
                .unwrap_or_else(|| DEFAULT_BACKEND.to_string()),
            fallback_backend: model_file.fallback_backend,
            path: model_file.path.map(|path| resolve_path(base_dir, path)),
            input_width: model_file.input_width.unwrap_or(DEFAULT_MODEL_INPUT),
            input_height: model_file.input_height.unwrap_or(DEFAULT_MODEL_INPUT),
            inference: match model_file.inference.as_deref() {
                Some(strategy) => parse_inference(strategy)?,
                None => InferenceStrategy::default(),
            },
        };

        let loop_file = file.detection.unwrap_or_default();
        let detection = DetectionSettings {
            score_threshold: loop_file
                .score_threshold
                .unwrap_or(DEFAULT_SCORE_THRESHOLD),
            retry_cooldown: Duration::from_millis(
                loop_file
                    .retry_cooldown_ms
                    .unwrap_or(DEFAULT_RETRY_COOLDOWN_MS),
            ),
        };

        let overlay_file = file.overlay.unwrap_or_default();
        let overlay = OverlaySettings {
            font_path: overlay_file
                .font_path
                .map(|path| resolve_path(base_dir, path)),
            box_thickness: overlay_file.box_thickness.unwrap_or(DEFAULT_BOX_THICKNESS),
        };

        let enrichment_file = file.enrichment.unwrap_or_default();
        let enrichment = EnrichmentSettings {
            url: enrichment_file.url.filter(|url| !url.trim().is_empty()),
            timeout: Duration::from_millis(
                enrichment_file
                    .timeout_ms
                    .unwrap_or(DEFAULT_ENRICH_TIMEOUT_MS),
            ),
        };

        Ok(Self {
            camera,
            model,
            detection,
            overlay,
            enrichment,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(device) = env_nonempty("LIVEDETECT_CAMERA_DEVICE") {
            self.camera.device = device;
        }
        if let Some(fps) = env_nonempty("LIVEDETECT_TARGET_FPS") {
            self.camera.target_fps = fps
                .parse()
                .map_err(|_| anyhow!("LIVEDETECT_TARGET_FPS must be a positive integer"))?;
        }
        if let Some(threshold) = env_nonempty("LIVEDETECT_SCORE_THRESHOLD") {
            self.detection.score_threshold = threshold
                .parse()
                .map_err(|_| anyhow!("LIVEDETECT_SCORE_THRESHOLD must be a number in [0, 1]"))?;
        }
        if let Some(backend) = env_nonempty("LIVEDETECT_BACKEND") {
            self.model.backend = backend;
        }
        if let Some(fallback) = env_nonempty("LIVEDETECT_FALLBACK_BACKEND") {
            self.model.fallback_backend = Some(fallback);
        }
        if let Some(path) = env_nonempty("LIVEDETECT_MODEL_PATH") {
            self.model.path = Some(PathBuf::from(path));
        }
        if let Some(url) = env_nonempty("LIVEDETECT_ENRICH_URL") {
            self.enrichment.url = Some(url);
        }
        if let Some(path) = env_nonempty("LIVEDETECT_FONT_PATH") {
            self.overlay.font_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.camera.device.trim().is_empty() {
            return Err(anyhow!("camera device must not be empty"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera width and height must be greater than zero"));
        }
        if self.camera.target_fps == 0 {
            return Err(anyhow!("target fps must be greater than zero"));
        }
        if !(0.0..=1.0).contains(&self.detection.score_threshold) {
            return Err(anyhow!(
                "score threshold must be within [0, 1], got {}",
                self.detection.score_threshold
            ));
        }
        if self.model.backend.trim().is_empty() {
            return Err(anyhow!("model backend must not be empty"));
        }
        if self.model.input_width == 0 || self.model.input_height == 0 {
            return Err(anyhow!("model input size must be greater than zero"));
        }
        if self.enrichment.timeout.is_zero() {
            return Err(anyhow!("enrichment timeout must be greater than zero"));
        }
        if let Some(raw) = &self.enrichment.url {
            let url = url::Url::parse(raw).with_context(|| format!("invalid enrichment url {}", raw))?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(anyhow!("enrichment url must use http or https: {}", raw));
            }
        }
        Ok(())
    }

    pub fn camera_constraints(&self) -> CameraConstraints {
        CameraConstraints {
            width: self.camera.width,
            height: self.camera.height,
            facing: self.camera.facing,
            target_fps: self.camera.target_fps,
        }
    }

    pub fn model_spec(&self) -> ModelSpec {
        ModelSpec {
            preferred_backend: self.model.backend.clone(),
            fallback_backend: self.model.fallback_backend.clone(),
            model_path: self.model.path.clone(),
            input_width: self.model.input_width,
            input_height: self.model.input_height,
        }
    }

    pub fn loop_settings(&self) -> LoopSettings {
        LoopSettings {
            retry_cooldown: self.detection.retry_cooldown,
            score_threshold: self.detection.score_threshold,
            ..LoopSettings::default()
        }
        .with_target_fps(self.camera.target_fps)
    }

    pub fn session_options(&self, initial_mode: Mode) -> SessionOptions {
        SessionOptions {
            initial_mode,
            loop_settings: self.loop_settings(),
            inference: self.model.inference,
        }
    }

    pub fn overlay_style(&self) -> OverlayStyle {
        OverlayStyle {
            box_thickness: self.overlay.box_thickness,
            ..OverlayStyle::default()
        }
    }

    pub fn label_font(&self) -> Result<LabelFont> {
        match &self.overlay.font_path {
            Some(path) => LabelFont::load(path),
            None => Ok(LabelFont::default()),
        }
    }

    /// HTTP gateway when an endpoint is configured, otherwise one that always
    /// falls back locally.
    pub fn enrichment_gateway(&self) -> Result<Arc<dyn EnrichmentGateway>> {
        match &self.enrichment.url {
            Some(url) => Ok(Arc::new(HttpEnrichmentClient::new(
                url,
                self.enrichment.timeout,
            )?)),
            None => Ok(Arc::new(DisabledGateway)),
        }
    }
}

fn read_config_file(path: &Path) -> Result<LiveDetectConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .filter(|value| !value.trim().is_empty())
}

fn resolve_path(base_dir: Option<&Path>, path: PathBuf) -> PathBuf {
    match base_dir {
        Some(base) if path.is_relative() => base.join(path),
        _ => path,
    }
}

fn parse_facing(value: &str) -> Result<FacingMode> {
    match value.to_ascii_lowercase().as_str() {
        "user" => Ok(FacingMode::User),
        "environment" => Ok(FacingMode::Environment),
        other => Err(anyhow!("camera facing must be user or environment, got {}", other)),
    }
}

fn parse_inference(value: &str) -> Result<InferenceStrategy> {
    match value.to_ascii_lowercase().as_str() {
        "worker" => Ok(InferenceStrategy::Worker),
        "inline" => Ok(InferenceStrategy::Inline),
        other => Err(anyhow!("model inference must be worker or inline, got {}", other)),
    }
}
