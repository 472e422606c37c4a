//! livedetect - run the detection loop against a camera or a still image
//!
//! 1. Loads configuration (`LIVEDETECT_CONFIG` + `LIVEDETECT_*` overrides)
//! 2. Loads the detector in the background, preferred backend then fallback
//! 3. Camera: detects continuously for `--seconds`; image: one pass
//! 4. Optionally enriches the final detections
//! 5. Prints the results panel and writes overlay snapshots to `--out`

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use live_detect::{
    render_report, BackendRegistry, DefaultSourceProvider, DetectionSession, DeviceCameraBackend,
    EnrichmentRequest, ImageInput, LiveDetectConfig, LoopState, Mode, ModelLoader, ModelStatus,
    OverlayRenderer, RunOutcome, SessionDriver, SystemClock,
};

#[path = "../ui.rs"]
mod ui;

const MODEL_LOAD_TIMEOUT: Duration = Duration::from_secs(120);
const IMAGE_PASS_TIMEOUT: Duration = Duration::from_secs(60);
const SNAPSHOT_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum ModeArg {
    Camera,
    Image,
}

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Input mode.
    #[arg(long, value_enum, default_value_t = ModeArg::Camera)]
    mode: ModeArg,
    /// Image file for a single detection pass (implies --mode image).
    #[arg(long)]
    image: Option<PathBuf>,
    /// Camera device (stub://name, deny://name or /dev/videoN). Overrides config.
    #[arg(long)]
    device: Option<String>,
    /// How long to run camera detection, in seconds.
    #[arg(long, default_value_t = 5)]
    seconds: u64,
    /// Directory for overlay snapshots.
    #[arg(long)]
    out: Option<PathBuf>,
    /// Send the final detections to the enrichment service.
    #[arg(long)]
    enrich: bool,
    /// List detector backends and exit.
    #[arg(long)]
    list_backends: bool,
    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, value_enum, default_value_t = ui::UiMode::Auto, value_name = "MODE")]
    ui: ui::UiMode,
}

/// Writes at most one overlay per interval while the camera runs.
struct SnapshotWriter {
    dir: Option<PathBuf>,
    written: u64,
    seen_successes: u64,
    last_written_at: Option<Duration>,
}

impl SnapshotWriter {
    fn new(dir: Option<PathBuf>) -> Self {
        Self {
            dir,
            written: 0,
            seen_successes: 0,
            last_written_at: None,
        }
    }

    fn observe(&mut self, session: &DetectionSession, now: Duration) {
        let Some(dir) = &self.dir else {
            return;
        };
        let successes = session.loop_stats().successes;
        if successes == self.seen_successes {
            return;
        }
        self.seen_successes = successes;
        let due = self
            .last_written_at
            .map_or(true, |last| now.saturating_sub(last) >= SNAPSHOT_INTERVAL);
        if !due {
            return;
        }
        self.written += 1;
        self.last_written_at = Some(now);
        let path = dir.join(format!("frame-{:04}.png", self.written));
        if let Err(err) = session.canvas().save(&path) {
            log::warn!("livedetect: snapshot failed: {:#}", err);
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::new(args.ui, is_tty, !stdout_is_tty);

    let registry = BackendRegistry::with_defaults();
    if args.list_backends {
        for name in registry.list() {
            println!("{}", name);
        }
        return Ok(());
    }

    let mut cfg = {
        let _stage = ui.stage("Load configuration");
        LiveDetectConfig::load()?
    };
    if let Some(device) = args.device.clone() {
        cfg.camera.device = device;
    }

    let mode = match (args.mode, &args.image) {
        (_, Some(_)) => Mode::Image,
        (ModeArg::Image, None) => return Err(anyhow!("--mode image requires --image PATH")),
        (ModeArg::Camera, None) => Mode::Camera,
    };

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        ctrlc::set_handler(move || {
            shutdown.store(true, Ordering::SeqCst);
        })
        .context("install Ctrl-C handler")?;
    }

    let provider = DefaultSourceProvider::new(
        Box::new(DeviceCameraBackend::new(cfg.camera.device.clone())),
        cfg.camera_constraints(),
    );
    let renderer = OverlayRenderer::new(cfg.overlay_style(), cfg.label_font()?);
    let mut session =
        DetectionSession::new(Box::new(provider), renderer, cfg.session_options(mode));
    let clock = SystemClock::new();
    let driver = SessionDriver::new(&clock, &shutdown);

    {
        let mut stage = ui.stage("Load model");
        session.begin_model_load(ModelLoader::spawn(registry, cfg.model_spec()));
        driver.run(
            &mut session,
            Some(MODEL_LOAD_TIMEOUT),
            |s| *s.model_status() != ModelStatus::Loading,
            |_, _| {},
        );
        match session.model_status() {
            ModelStatus::Ready { backend } => stage.update(backend),
            ModelStatus::Unavailable { reason } => stage.fail(reason.clone()),
            ModelStatus::Loading => stage.fail("timed out"),
        }
    }

    if let Some(path) = &args.image {
        session.supply_image(ImageInput::Path(path.clone()), driver.now())?;
    }

    let outcome = {
        let name = match mode {
            Mode::Camera => format!("Detect objects ({})", cfg.camera.device),
            Mode::Image => "Detect objects (image)".to_string(),
        };
        let mut stage = ui.stage(&name);
        let mut snapshots = SnapshotWriter::new(args.out.clone());
        let limit = match mode {
            Mode::Camera => Duration::from_secs(args.seconds),
            Mode::Image => IMAGE_PASS_TIMEOUT,
        };
        let outcome = driver.run(
            &mut session,
            Some(limit),
            |s| {
                s.last_error().is_some()
                    || !s.model_status().is_ready()
                    || (mode == Mode::Image
                        && !matches!(
                            s.loop_state(),
                            LoopState::WaitingForSourceReady | LoopState::Detecting
                        ))
            },
            |s, now| {
                let stats = s.loop_stats();
                stage.update(&format!(
                    "{} object(s), {} pass(es), {} retried",
                    s.last_detections().len(),
                    stats.successes,
                    stats.failures
                ));
                snapshots.observe(s, now);
            },
        );
        if let Some(err) = session.last_error() {
            stage.fail(err.to_string());
        } else if let Some(err) = session.detection_error().filter(|_| mode == Mode::Image) {
            stage.fail(err.to_string());
        }
        outcome
    };
    if outcome == RunOutcome::Interrupted {
        log::info!("livedetect: interrupted, shutting down");
    }
    session.stop_detection();

    if args.enrich && outcome != RunOutcome::Interrupted {
        let mut stage = ui.stage("Enrich detections");
        let gateway = cfg.enrichment_gateway()?;
        match session.request_enrichment(gateway) {
            EnrichmentRequest::Started => {
                driver.run(
                    &mut session,
                    Some(cfg.enrichment.timeout + Duration::from_secs(1)),
                    |s| !s.is_processing_enrichment(),
                    |_, _| {},
                );
            }
            EnrichmentRequest::FellBack => stage.fail("enrichment unavailable, showing fallback"),
            EnrichmentRequest::NothingToSend => stage.fail("no objects detected to process"),
            EnrichmentRequest::AlreadyProcessing => stage.fail("already processing"),
        }
    }

    if let Some(dir) = &args.out {
        if session.canvas().width() > 0 {
            let path = dir.join("overlay.png");
            session.canvas().save(&path)?;
            log::info!("livedetect: overlay written to {}", path.display());
        }
    }

    let snapshot = session.snapshot();
    session.teardown();
    print!("{}", render_report(&snapshot));

    match snapshot.last_error {
        Some(err) => Err(anyhow!(err)),
        None => Ok(()),
    }
}
