use std::sync::Mutex;
use std::time::Duration;

use tempfile::NamedTempFile;

use live_detect::config::LiveDetectConfig;
use live_detect::source::FacingMode;
use live_detect::{InferenceStrategy, Mode};

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "LIVEDETECT_CONFIG",
        "LIVEDETECT_CAMERA_DEVICE",
        "LIVEDETECT_TARGET_FPS",
        "LIVEDETECT_SCORE_THRESHOLD",
        "LIVEDETECT_BACKEND",
        "LIVEDETECT_FALLBACK_BACKEND",
        "LIVEDETECT_MODEL_PATH",
        "LIVEDETECT_ENRICH_URL",
        "LIVEDETECT_FONT_PATH",
    ] {
        std::env::remove_var(key);
    }
}

fn write_config(json: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp config");
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    file
}

#[test]
fn defaults_without_config_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = LiveDetectConfig::load().expect("load defaults");

    assert_eq!(cfg.camera.device, "stub://front_camera");
    assert_eq!(cfg.camera.width, 640);
    assert_eq!(cfg.camera.height, 480);
    assert_eq!(cfg.camera.facing, FacingMode::Environment);
    assert_eq!(cfg.model.backend, "stub");
    assert_eq!(cfg.detection.retry_cooldown, Duration::from_secs(1));
    assert!(cfg.enrichment.url.is_none());
    assert_eq!(cfg.enrichment_gateway().unwrap().name(), "disabled");
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(
        r#"{
            "camera": {
                "device": "stub://kitchen",
                "width": 320,
                "height": 240,
                "facing": "user",
                "target_fps": 15
            },
            "model": {
                "backend": "tract",
                "fallback_backend": "stub",
                "path": "models/detector.onnx",
                "inference": "inline"
            },
            "loop": {
                "score_threshold": 0.6,
                "retry_cooldown_ms": 250
            },
            "enrichment": {
                "url": "http://127.0.0.1:8080/api/process-detections",
                "timeout_ms": 2500
            }
        }"#,
    );

    std::env::set_var("LIVEDETECT_CONFIG", file.path());
    std::env::set_var("LIVEDETECT_CAMERA_DEVICE", "stub://porch");
    std::env::set_var("LIVEDETECT_SCORE_THRESHOLD", "0.3");

    let cfg = LiveDetectConfig::load().expect("load config");

    assert_eq!(cfg.camera.device, "stub://porch");
    assert_eq!(cfg.camera.width, 320);
    assert_eq!(cfg.camera.height, 240);
    assert_eq!(cfg.camera.facing, FacingMode::User);
    assert_eq!(cfg.camera.target_fps, 15);
    assert_eq!(cfg.model.backend, "tract");
    assert_eq!(cfg.model.fallback_backend.as_deref(), Some("stub"));
    assert_eq!(cfg.model.inference, InferenceStrategy::Inline);
    assert_eq!(cfg.detection.score_threshold, 0.3);
    assert_eq!(cfg.detection.retry_cooldown, Duration::from_millis(250));
    assert_eq!(cfg.enrichment.timeout, Duration::from_millis(2500));

    let base = file.path().parent().expect("temp dir");
    assert_eq!(
        cfg.model.path.as_deref(),
        Some(base.join("models/detector.onnx").as_path())
    );

    let options = cfg.session_options(Mode::Image);
    assert_eq!(options.initial_mode, Mode::Image);
    assert_eq!(options.loop_settings.retry_cooldown, Duration::from_millis(250));

    let spec = cfg.model_spec();
    assert_eq!(spec.preferred_backend, "tract");
    assert_eq!(spec.fallback_backend.as_deref(), Some("stub"));
    assert_eq!(
        cfg.enrichment_gateway().unwrap().name(),
        "http://127.0.0.1:8080/api/process-detections"
    );

    clear_env();
}

#[test]
fn rejects_out_of_range_threshold() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(r#"{ "loop": { "score_threshold": 1.5 } }"#);
    let err = LiveDetectConfig::from_path(file.path()).unwrap_err();
    assert!(err.to_string().contains("score threshold"));
}

#[test]
fn rejects_non_http_enrichment_url() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("LIVEDETECT_ENRICH_URL", "ftp://example.com/enrich");
    let err = LiveDetectConfig::load().unwrap_err();
    assert!(err.to_string().contains("http or https"));

    clear_env();
}

#[test]
fn rejects_unknown_facing_mode() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config(r#"{ "camera": { "facing": "sideways" } }"#);
    let err = LiveDetectConfig::from_path(file.path()).unwrap_err();
    assert!(err.to_string().contains("facing"));
}

#[test]
fn malformed_file_is_reported_with_path() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = write_config("{ not json");
    let err = LiveDetectConfig::from_path(file.path()).unwrap_err();
    assert!(err.to_string().contains("invalid config file"));
}

#[test]
fn explicit_path_ignores_environment() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("LIVEDETECT_CAMERA_DEVICE", "stub://from_env");
    let file = write_config(r#"{ "camera": { "device": "stub://from_file" } }"#);
    let cfg = LiveDetectConfig::from_path(file.path()).expect("load file");
    assert_eq!(cfg.camera.device, "stub://from_file");

    clear_env();
}
