//! Detection session: the mode state machine.
//!
//! The session owns every piece of mutable state (active frame source,
//! scheduler, inference port, renderer, detections, enrichment) and is driven
//! cooperatively by `pump(now)` from a single thread. Background work (model
//! load, inference worker, image decode, enrichment) reports back over
//! channels and is applied during `pump`, so no state is shared across threads.
//!
//! Every mode transition runs the same sequence:
//! 1. cancel the scheduler (bumps the epoch)
//! 2. release the outgoing source, stopping the camera when leaving Camera
//! 3. clear detections and enrichment, discard in-flight enrichment
//! 4. acquire the incoming source, only when actually needed
//! 5. Camera auto-starts detection once the model is ready; Image waits for
//!    an upload
//!
//! `running` is only ever true in Camera mode.

use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::time::Duration;

use crate::detect::Detection;
use crate::enrich::{
    enrich_or_fallback, synthesize_fallback, EnrichedDetection, EnrichmentGateway,
    EnrichmentOutcome, EnrichmentSource, ImageContext,
};
use crate::error::{AcquisitionError, InferenceError};
use crate::inference::{InferencePort, InferenceWorker, InlineInference};
use crate::model::{LoadedModel, ModelLoader, ModelStatus};
use crate::overlay::{Canvas, OverlayRenderer};
use crate::scheduler::{
    DetectionLoop, LoopEvent, LoopKind, LoopSettings, LoopState, LoopStats, WakeReason,
};
use crate::source::{FrameSource, ImageInput, SourceKind, SourceProvider, SourceRequest};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Camera,
    Image,
}

/// How a loaded detector is driven.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum InferenceStrategy {
    /// Dedicated worker thread.
    #[default]
    Worker,
    /// On the session thread, at submit time.
    Inline,
}

#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub initial_mode: Mode,
    pub loop_settings: LoopSettings,
    pub inference: InferenceStrategy,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            initial_mode: Mode::Camera,
            loop_settings: LoopSettings::default(),
            inference: InferenceStrategy::default(),
        }
    }
}

/// Result of asking for enrichment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnrichmentRequest {
    Started,
    /// The background call could not be started; fallback results are
    /// already in place.
    FellBack,
    /// No detections to send.
    NothingToSend,
    /// A request is already in flight.
    AlreadyProcessing,
}

/// Point-in-time view of the session for display.
#[derive(Clone, Debug)]
pub struct SessionSnapshot {
    pub mode: Mode,
    pub running: bool,
    pub loop_state: LoopState,
    pub model: ModelStatus,
    pub source: Option<SourceKind>,
    pub holds_camera: bool,
    pub last_detections: Vec<Detection>,
    pub last_enriched: Vec<EnrichedDetection>,
    pub enrichment_source: Option<EnrichmentSource>,
    pub processing: bool,
    pub last_error: Option<AcquisitionError>,
    /// Most recent failed detect call since the last success.
    pub detection_error: Option<InferenceError>,
    /// A failed detect call is waiting out its cooldown.
    pub retrying: bool,
    pub stats: LoopStats,
}

struct PendingEnrichment {
    generation: u64,
    /// Detections as sent, in order.
    sent: Vec<Detection>,
    rx: Receiver<EnrichmentOutcome>,
}

pub struct DetectionSession {
    options: SessionOptions,
    mode: Mode,
    provider: Box<dyn SourceProvider>,
    source: Option<FrameSource>,
    scheduler: DetectionLoop,
    port: Option<Box<dyn InferencePort>>,
    model: ModelStatus,
    loader: Option<ModelLoader>,
    renderer: OverlayRenderer,
    last_detections: Vec<Detection>,
    last_enriched: Vec<EnrichedDetection>,
    enrichment_source: Option<EnrichmentSource>,
    enrichment: Option<PendingEnrichment>,
    /// Bumped on every transition that clears results.
    generation: u64,
    last_error: Option<AcquisitionError>,
    detection_error: Option<InferenceError>,
    /// Camera detection should (re)start whenever it can.
    auto_start: bool,
    torn_down: bool,
}

impl DetectionSession {
    pub fn new(
        provider: Box<dyn SourceProvider>,
        renderer: OverlayRenderer,
        options: SessionOptions,
    ) -> Self {
        let scheduler = DetectionLoop::new(options.loop_settings.clone());
        Self {
            mode: options.initial_mode,
            options,
            provider,
            source: None,
            scheduler,
            port: None,
            model: ModelStatus::Loading,
            loader: None,
            renderer,
            last_detections: Vec::new(),
            last_enriched: Vec::new(),
            enrichment_source: None,
            enrichment: None,
            generation: 0,
            last_error: None,
            detection_error: None,
            auto_start: true,
            torn_down: false,
        }
    }

    // ------------------------------------------------------------------
    // Model
    // ------------------------------------------------------------------

    /// Watch a background model load. The result is applied by `pump`.
    pub fn begin_model_load(&mut self, loader: ModelLoader) {
        self.model = ModelStatus::Loading;
        self.loader = Some(loader);
    }

    /// Use an inference port directly, skipping the model loader.
    pub fn attach_inference(&mut self, port: Box<dyn InferencePort>, now: Duration) {
        self.loader = None;
        self.model = ModelStatus::Ready {
            backend: port.backend().to_string(),
        };
        self.port = Some(port);
        self.on_model_settled(now);
    }

    fn apply_loaded_model(&mut self, loaded: LoadedModel, now: Duration) {
        let port: Box<dyn InferencePort> = match self.options.inference {
            InferenceStrategy::Inline => Box::new(InlineInference::new(loaded.detector)),
            InferenceStrategy::Worker => match InferenceWorker::spawn(loaded.detector) {
                Ok(worker) => Box::new(worker),
                Err(err) => {
                    log::error!("DetectionSession: {:#}", err);
                    self.model = ModelStatus::Unavailable {
                        reason: format!("{:#}", err),
                    };
                    self.on_model_settled(now);
                    return;
                }
            },
        };
        self.model = ModelStatus::Ready {
            backend: loaded.backend,
        };
        self.port = Some(port);
        self.on_model_settled(now);
    }

    fn on_model_settled(&mut self, now: Duration) {
        match self.mode {
            Mode::Camera => {
                if self.auto_start {
                    let _ = self.start_camera_detection(now);
                }
            }
            Mode::Image => {
                if self.model.is_ready() && self.source.is_some() && !self.scheduler.is_active()
                {
                    self.scheduler.start(LoopKind::SingleShot, now);
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Mode transitions
    // ------------------------------------------------------------------

    /// Switch between camera and image mode. Switching to the current mode
    /// does nothing.
    pub fn switch_mode(&mut self, target: Mode, now: Duration) -> Result<(), AcquisitionError> {
        if target == self.mode || self.torn_down {
            return Ok(());
        }
        log::info!("DetectionSession: switching {:?} -> {:?}", self.mode, target);
        self.scheduler.stop();
        self.release_source();
        self.clear_results();
        self.renderer.clear();
        self.last_error = None;
        self.mode = target;
        match target {
            Mode::Camera => {
                self.auto_start = true;
                self.start_camera_detection(now)
            }
            Mode::Image => Ok(()),
        }
    }

    /// Load an image for single-shot detection, switching to image mode first
    /// if needed. Replaces any previous image.
    pub fn supply_image(&mut self, input: ImageInput, now: Duration) -> Result<(), AcquisitionError> {
        if self.torn_down {
            return Ok(());
        }
        self.switch_mode(Mode::Image, now)?;
        self.scheduler.stop();
        self.release_source();
        self.clear_results();
        self.renderer.clear();
        self.last_error = None;

        log::info!("DetectionSession: loading image {}", input.label());
        match self.provider.acquire(SourceRequest::Image(input)) {
            Ok(source) => self.source = Some(source),
            Err(err) => {
                log::warn!("DetectionSession: {}", err);
                self.last_error = Some(err.clone());
                return Err(err);
            }
        }
        if self.model.is_ready() {
            self.scheduler.start(LoopKind::SingleShot, now);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Detection control
    // ------------------------------------------------------------------

    /// Start detection. Camera mode acquires the camera if it is not held
    /// and starts the continuous loop; image mode re-runs the current image.
    pub fn start_detection(&mut self, now: Duration) -> Result<(), AcquisitionError> {
        if self.torn_down {
            return Ok(());
        }
        match self.mode {
            Mode::Camera => {
                self.auto_start = true;
                self.start_camera_detection(now)
            }
            Mode::Image => {
                if self.model.is_ready() && self.source.is_some() {
                    self.scheduler.start(LoopKind::SingleShot, now);
                }
                Ok(())
            }
        }
    }

    /// Pause detection. The camera stays on.
    pub fn stop_detection(&mut self) {
        self.auto_start = false;
        self.scheduler.stop();
    }

    /// Flip camera detection on or off. Returns whether it is now running.
    pub fn toggle_detection(&mut self, now: Duration) -> Result<bool, AcquisitionError> {
        if self.is_running() {
            self.stop_detection();
        } else {
            self.start_detection(now)?;
        }
        Ok(self.is_running())
    }

    fn start_camera_detection(&mut self, now: Duration) -> Result<(), AcquisitionError> {
        if self.model == ModelStatus::Loading {
            // Picked up again once the model settles.
            return self.ensure_camera();
        }
        self.ensure_camera()?;
        if !self.model.is_ready() {
            log::warn!("DetectionSession: detection unavailable, camera preview only");
            return Ok(());
        }
        if !self.scheduler.is_active() {
            self.scheduler.start(LoopKind::Continuous, now);
        }
        Ok(())
    }

    /// Acquire the camera unless it is already held.
    fn ensure_camera(&mut self) -> Result<(), AcquisitionError> {
        if self.source.as_ref().is_some_and(FrameSource::holds_camera) {
            return Ok(());
        }
        self.release_source();
        match self.provider.acquire(SourceRequest::Camera) {
            Ok(source) => {
                self.last_error = None;
                self.source = Some(source);
                Ok(())
            }
            Err(err) => {
                log::warn!("DetectionSession: {}", err);
                self.last_error = Some(err.clone());
                Err(err)
            }
        }
    }

    fn release_source(&mut self) {
        if let Some(mut source) = self.source.take() {
            source.release();
        }
    }

    fn clear_results(&mut self) {
        self.generation += 1;
        self.last_detections.clear();
        self.last_enriched.clear();
        self.enrichment_source = None;
        self.detection_error = None;
        // The worker thread finishes on its own; its answer has nowhere to go.
        self.enrichment = None;
    }

    // ------------------------------------------------------------------
    // Enrichment
    // ------------------------------------------------------------------

    /// Send the current detections for enrichment on a background thread.
    pub fn request_enrichment(&mut self, gateway: Arc<dyn EnrichmentGateway>) -> EnrichmentRequest {
        if self.enrichment.is_some() {
            return EnrichmentRequest::AlreadyProcessing;
        }
        if self.last_detections.is_empty() {
            return EnrichmentRequest::NothingToSend;
        }
        let canvas = self.renderer.canvas();
        let context = ImageContext::now(canvas.width(), canvas.height());
        let sent = self.last_detections.clone();
        let detections = sent.clone();
        let (tx, rx) = mpsc::channel();
        let spawned = std::thread::Builder::new()
            .name("enrichment".to_string())
            .spawn(move || {
                let outcome = enrich_or_fallback(gateway.as_ref(), &detections, &context);
                let _ = tx.send(outcome);
            });
        match spawned {
            Ok(_) => {
                self.enrichment = Some(PendingEnrichment {
                    generation: self.generation,
                    sent,
                    rx,
                });
                EnrichmentRequest::Started
            }
            Err(err) => {
                log::warn!("DetectionSession: spawn enrichment: {}", err);
                self.last_enriched = synthesize_fallback(&sent);
                self.enrichment_source = Some(EnrichmentSource::Fallback {
                    reason: err.to_string(),
                });
                EnrichmentRequest::FellBack
            }
        }
    }

    fn poll_enrichment(&mut self) {
        let Some(pending) = self.enrichment.as_ref() else {
            return;
        };
        let outcome = match pending.rx.try_recv() {
            Ok(outcome) => outcome,
            Err(TryRecvError::Empty) => return,
            Err(TryRecvError::Disconnected) => EnrichmentOutcome {
                enriched: synthesize_fallback(&pending.sent),
                source: EnrichmentSource::Fallback {
                    reason: "enrichment thread exited without a result".to_string(),
                },
            },
        };
        let generation = pending.generation;
        self.enrichment = None;
        if generation != self.generation {
            log::debug!("DetectionSession: dropping enrichment from an earlier mode");
            return;
        }
        self.last_enriched = outcome.enriched;
        self.enrichment_source = Some(outcome.source);
    }

    // ------------------------------------------------------------------
    // Driving
    // ------------------------------------------------------------------

    /// One cooperative turn. Applies finished background work and fires the
    /// scheduler if its wake is due. Returns the next scheduler deadline.
    pub fn pump(&mut self, now: Duration) -> Option<Duration> {
        if self.torn_down {
            return None;
        }

        if let Some(loader) = self.loader.as_mut() {
            if let Some(result) = loader.try_take() {
                self.loader = None;
                match result {
                    Ok(loaded) => self.apply_loaded_model(loaded, now),
                    Err(err) => {
                        log::error!("DetectionSession: {}", err);
                        self.model = ModelStatus::Unavailable { reason: err.reason };
                        self.on_model_settled(now);
                    }
                }
            }
        }

        self.drain_replies(now);
        if let Some(port) = self.port.as_mut() {
            if let Some(event) = self
                .scheduler
                .on_wake(now, self.source.as_mut(), port.as_mut())
            {
                self.handle_event(event);
            }
        }
        self.drain_replies(now);
        self.poll_enrichment();

        self.scheduler.next_deadline()
    }

    fn drain_replies(&mut self, now: Duration) {
        loop {
            let Some(reply) = self.port.as_mut().and_then(|port| port.poll()) else {
                break;
            };
            let event = self.scheduler.on_reply(reply, now);
            self.handle_event(event);
        }
    }

    fn handle_event(&mut self, event: LoopEvent) {
        match event {
            LoopEvent::Applied {
                frame,
                detections,
                finished,
                ..
            } => {
                self.renderer.render(&frame, &detections);
                self.last_detections = detections;
                self.detection_error = None;
                if finished {
                    log::info!(
                        "DetectionSession: image pass found {} object(s)",
                        self.last_detections.len()
                    );
                }
            }
            LoopEvent::SourceFailed(reason) => {
                let err = match self.source.as_ref().map(FrameSource::kind) {
                    Some(SourceKind::StaticImage) => AcquisitionError::Decode(reason),
                    _ => AcquisitionError::StreamLost(reason),
                };
                log::warn!("DetectionSession: {}", err);
                self.release_source();
                self.last_error = Some(err);
            }
            LoopEvent::Failed {
                error, retrying, ..
            } => {
                if !retrying {
                    log::warn!("DetectionSession: image pass failed: {}", error);
                }
                self.detection_error = Some(error);
            }
            LoopEvent::Waiting | LoopEvent::Submitted(_) | LoopEvent::Discarded(_) => {}
        }
    }

    /// Stop everything and release the camera. Safe to call repeatedly.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        self.scheduler.stop();
        self.release_source();
        self.enrichment = None;
        self.loader = None;
        self.port = None;
        log::info!("DetectionSession: torn down");
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Continuous camera detection is scheduled or in flight.
    pub fn is_running(&self) -> bool {
        self.mode == Mode::Camera
            && self.scheduler.kind() == LoopKind::Continuous
            && self.scheduler.is_active()
    }

    /// Background work is outstanding.
    pub fn is_busy(&self) -> bool {
        self.scheduler.is_active() || self.loader.is_some() || self.enrichment.is_some()
    }

    pub fn is_processing_enrichment(&self) -> bool {
        self.enrichment.is_some()
    }

    pub fn model_status(&self) -> &ModelStatus {
        &self.model
    }

    pub fn loop_state(&self) -> LoopState {
        self.scheduler.state()
    }

    pub fn loop_stats(&self) -> &LoopStats {
        self.scheduler.stats()
    }

    pub fn last_detections(&self) -> &[Detection] {
        &self.last_detections
    }

    pub fn last_enriched(&self) -> &[EnrichedDetection] {
        &self.last_enriched
    }

    pub fn last_error(&self) -> Option<&AcquisitionError> {
        self.last_error.as_ref()
    }

    pub fn detection_error(&self) -> Option<&InferenceError> {
        self.detection_error.as_ref()
    }

    /// A failed detect call is waiting out its cooldown.
    pub fn is_retrying(&self) -> bool {
        self.scheduler
            .pending_wake()
            .is_some_and(|wake| wake.reason == WakeReason::Cooldown)
    }

    pub fn holds_camera(&self) -> bool {
        self.source.as_ref().is_some_and(FrameSource::holds_camera)
    }

    pub fn canvas(&self) -> &Canvas {
        self.renderer.canvas()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode,
            running: self.is_running(),
            loop_state: self.scheduler.state(),
            model: self.model.clone(),
            source: self.source.as_ref().map(FrameSource::kind),
            holds_camera: self.holds_camera(),
            last_detections: self.last_detections.clone(),
            last_enriched: self.last_enriched.clone(),
            enrichment_source: self.enrichment_source.clone(),
            processing: self.enrichment.is_some(),
            last_error: self.last_error.clone(),
            detection_error: self.detection_error.clone(),
            retrying: self.is_retrying(),
            stats: self.scheduler.stats().clone(),
        }
    }
}

impl Drop for DetectionSession {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, ScriptedBackend};
    use crate::source::{CameraConstraints, DefaultSourceProvider, DeviceCameraBackend};

    fn session(device: &str, mode: Mode) -> DetectionSession {
        let provider = DefaultSourceProvider::new(
            Box::new(DeviceCameraBackend::new(device)),
            CameraConstraints {
                width: 32,
                height: 24,
                ..CameraConstraints::default()
            },
        );
        DetectionSession::new(
            Box::new(provider),
            OverlayRenderer::default(),
            SessionOptions {
                initial_mode: mode,
                inference: InferenceStrategy::Inline,
                ..SessionOptions::default()
            },
        )
    }

    fn cup() -> Detection {
        Detection::new("cup", 0.82, BoundingBox::new(1.0, 2.0, 5.0, 6.0))
    }

    fn scripted(detections: Vec<Detection>) -> Box<dyn InferencePort> {
        Box::new(InlineInference::new(Box::new(ScriptedBackend::detections(
            detections,
        ))))
    }

    #[test]
    fn camera_mode_autostarts_when_model_ready() {
        let mut s = session("stub://cam", Mode::Camera);
        assert!(!s.holds_camera());
        s.attach_inference(scripted(vec![cup()]), Duration::ZERO);
        assert!(s.holds_camera());
        assert!(s.is_running());
        s.pump(Duration::ZERO);
        assert_eq!(s.last_detections(), &[cup()]);
        assert_eq!((s.canvas().width(), s.canvas().height()), (32, 24));
    }

    #[test]
    fn model_failure_leaves_detection_unavailable() {
        let mut s = session("stub://cam", Mode::Camera);
        s.begin_model_load(ModelLoader::finished(Err(crate::error::ModelLoadError::new(
            "no backend",
        ))));
        s.pump(Duration::ZERO);
        assert!(matches!(s.model_status(), ModelStatus::Unavailable { .. }));
        assert!(!s.is_running());
        assert_eq!(s.loop_state(), LoopState::Idle);
    }

    #[test]
    fn switching_to_current_mode_is_a_noop() {
        let mut s = session("stub://cam", Mode::Camera);
        s.attach_inference(scripted(vec![cup()]), Duration::ZERO);
        s.pump(Duration::ZERO);
        s.switch_mode(Mode::Camera, Duration::ZERO).unwrap();
        assert_eq!(s.last_detections().len(), 1);
        assert!(s.is_running());
    }

    #[test]
    fn toggle_pauses_without_releasing_camera() {
        let mut s = session("stub://cam", Mode::Camera);
        s.attach_inference(scripted(Vec::new()), Duration::ZERO);
        assert!(!s.toggle_detection(Duration::ZERO).unwrap());
        assert!(s.holds_camera());
        assert_eq!(s.loop_state(), LoopState::Stopped);
        assert!(s.toggle_detection(Duration::ZERO).unwrap());
    }

    #[test]
    fn enrichment_needs_detections() {
        let mut s = session("stub://cam", Mode::Image);
        let gateway: Arc<dyn EnrichmentGateway> = Arc::new(crate::enrich::DisabledGateway);
        assert_eq!(
            s.request_enrichment(gateway),
            EnrichmentRequest::NothingToSend
        );
    }

    #[test]
    fn teardown_is_idempotent_and_releases_camera() {
        let mut s = session("stub://cam", Mode::Camera);
        s.attach_inference(scripted(Vec::new()), Duration::ZERO);
        s.teardown();
        s.teardown();
        assert!(!s.holds_camera());
        assert!(s.pump(Duration::ZERO).is_none());
    }

    /// Gateway whose worker thread dies before answering.
    struct CrashingGateway;

    impl EnrichmentGateway for CrashingGateway {
        fn name(&self) -> &str {
            "crashing"
        }

        fn enrich(
            &self,
            _detections: &[Detection],
            _context: &ImageContext,
        ) -> Result<Vec<EnrichedDetection>, crate::error::NetworkError> {
            panic!("gateway crashed");
        }
    }

    #[test]
    fn lost_enrichment_falls_back_to_the_detections_sent() {
        let person = Detection::new("person", 0.9, BoundingBox::new(8.0, 8.0, 4.0, 10.0));
        let backend = ScriptedBackend::new([Ok(vec![cup()]), Ok(vec![cup(), person])]);
        let mut s = session("stub://cam", Mode::Camera);
        let mut now = Duration::ZERO;
        s.attach_inference(Box::new(InlineInference::new(Box::new(backend))), now);
        s.pump(now);
        assert_eq!(s.last_detections(), &[cup()]);

        assert_eq!(
            s.request_enrichment(Arc::new(CrashingGateway)),
            EnrichmentRequest::Started
        );
        for _ in 0..500 {
            now += s.scheduler.settings().frame_interval;
            s.pump(now);
            if !s.is_processing_enrichment() {
                break;
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        assert!(!s.is_processing_enrichment());
        assert_eq!(s.last_detections().len(), 2);

        let snapshot = s.snapshot();
        assert_eq!(snapshot.last_enriched.len(), 1);
        assert_eq!(snapshot.last_enriched[0].detection, cup());
        assert!(matches!(
            snapshot.enrichment_source,
            Some(EnrichmentSource::Fallback { .. })
        ));
    }

    #[test]
    fn failing_image_pass_stops_after_its_attempts() {
        let backend = ScriptedBackend::failing("out of memory");
        let calls = backend.call_counter();
        let mut s = session("stub://cam", Mode::Image);
        let mut now = Duration::ZERO;
        s.attach_inference(Box::new(InlineInference::new(Box::new(backend))), now);
        let mut png = std::io::Cursor::new(Vec::new());
        image::RgbImage::new(8, 8)
            .write_to(&mut png, image::ImageFormat::Png)
            .unwrap();
        s.supply_image(
            ImageInput::Bytes {
                name: "still.png".into(),
                data: png.into_inner(),
            },
            now,
        )
        .unwrap();

        for _ in 0..300 {
            s.pump(now);
            now += Duration::from_millis(50);
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(
            calls.load(std::sync::atomic::Ordering::SeqCst),
            crate::scheduler::DEFAULT_SINGLE_SHOT_ATTEMPTS as usize
        );
        assert_eq!(s.loop_state(), LoopState::Idle);
        assert!(!s.is_busy());
        assert!(!s.is_retrying());
        assert!(matches!(
            s.detection_error(),
            Some(InferenceError::Backend(_))
        ));
    }
}
