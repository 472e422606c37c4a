use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::time::Duration;

use live_detect::{
    AcquisitionError, BoundingBox, CameraBackend, CameraConstraints, CameraDevice,
    DefaultSourceProvider, Detection, DetectionSession, DeviceCameraBackend, DrawOp,
    EnrichedDetection, EnrichmentGateway, EnrichmentRequest, EnrichmentSource, Frame,
    ImageContext, ImageInput, InferenceStrategy, InlineInference, LoopState, Mode, NetworkError,
    OverlayRenderer, ScriptedBackend, SessionOptions,
};

const FRAME: Duration = Duration::from_millis(40);

/// Open/stop bookkeeping shared with the test.
#[derive(Default)]
struct DeviceLedger {
    opened: AtomicUsize,
    stopped: AtomicUsize,
    max_live: AtomicUsize,
}

impl DeviceLedger {
    fn live(&self) -> usize {
        self.opened.load(Ordering::SeqCst) - self.stopped.load(Ordering::SeqCst)
    }
}

struct CountingBackend {
    ledger: Arc<DeviceLedger>,
}

struct CountingDevice {
    ledger: Arc<DeviceLedger>,
    sequence: u64,
    stopped: bool,
}

impl CameraBackend for CountingBackend {
    fn open(
        &mut self,
        _constraints: &CameraConstraints,
    ) -> Result<Box<dyn CameraDevice>, AcquisitionError> {
        self.ledger.opened.fetch_add(1, Ordering::SeqCst);
        let live = self.ledger.live();
        self.ledger.max_live.fetch_max(live, Ordering::SeqCst);
        Ok(Box::new(CountingDevice {
            ledger: self.ledger.clone(),
            sequence: 0,
            stopped: false,
        }))
    }
}

impl CameraDevice for CountingDevice {
    fn describe(&self) -> String {
        "counting camera".to_string()
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, AcquisitionError> {
        self.sequence += 1;
        Ok(Some(Frame::solid(16, 12, [40, 40, 40], self.sequence)))
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.ledger.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Gateway that answers only when the test says so.
struct GatedGateway {
    release: Mutex<mpsc::Receiver<()>>,
}

impl EnrichmentGateway for GatedGateway {
    fn name(&self) -> &str {
        "gated"
    }

    fn enrich(
        &self,
        detections: &[Detection],
        _context: &ImageContext,
    ) -> Result<Vec<EnrichedDetection>, NetworkError> {
        let _ = self.release.lock().unwrap().recv();
        Ok(detections
            .iter()
            .cloned()
            .map(|d| EnrichedDetection::new(d, None))
            .collect())
    }
}

/// Gateway whose service always answers 500.
struct BrokenServiceGateway;

impl EnrichmentGateway for BrokenServiceGateway {
    fn name(&self) -> &str {
        "broken"
    }

    fn enrich(
        &self,
        _detections: &[Detection],
        _context: &ImageContext,
    ) -> Result<Vec<EnrichedDetection>, NetworkError> {
        Err(NetworkError::Status(500))
    }
}

fn cup() -> Detection {
    Detection::new("cup", 0.82, BoundingBox::new(2.0, 2.0, 6.0, 6.0))
}

fn scripted() -> Box<InlineInference> {
    Box::new(InlineInference::new(Box::new(ScriptedBackend::detections(
        vec![cup()],
    ))))
}

fn options(mode: Mode) -> SessionOptions {
    SessionOptions {
        initial_mode: mode,
        inference: InferenceStrategy::Inline,
        ..SessionOptions::default()
    }
}

fn counting_session(mode: Mode) -> (DetectionSession, Arc<DeviceLedger>) {
    let ledger = Arc::new(DeviceLedger::default());
    let provider = DefaultSourceProvider::new(
        Box::new(CountingBackend {
            ledger: ledger.clone(),
        }),
        CameraConstraints::default(),
    );
    let session = DetectionSession::new(
        Box::new(provider),
        OverlayRenderer::default(),
        options(mode),
    );
    (session, ledger)
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .expect("encode png");
    out.into_inner()
}

/// Pump until `done` holds, advancing virtual time one frame per turn.
fn pump_until(
    session: &mut DetectionSession,
    now: &mut Duration,
    mut done: impl FnMut(&DetectionSession) -> bool,
) {
    for _ in 0..500 {
        session.pump(*now);
        if done(session) {
            return;
        }
        *now += FRAME;
        std::thread::sleep(Duration::from_millis(2));
    }
    panic!("condition not reached");
}

#[test]
fn camera_is_held_at_most_once_across_mode_switches() {
    let (mut session, ledger) = counting_session(Mode::Camera);
    let mut now = Duration::ZERO;
    session.attach_inference(scripted(), now);
    assert_eq!(ledger.live(), 1);

    for target in [
        Mode::Image,
        Mode::Camera,
        Mode::Camera,
        Mode::Image,
        Mode::Image,
        Mode::Camera,
        Mode::Image,
        Mode::Camera,
    ] {
        session.switch_mode(target, now).expect("switch");
        session.pump(now);
        now += FRAME;
        let expected = usize::from(target == Mode::Camera);
        assert_eq!(ledger.live(), expected, "after switching to {:?}", target);
        assert_eq!(session.holds_camera(), target == Mode::Camera);
    }

    session.teardown();
    assert_eq!(ledger.live(), 0);
    assert_eq!(
        ledger.opened.load(Ordering::SeqCst),
        ledger.stopped.load(Ordering::SeqCst)
    );
    assert_eq!(ledger.max_live.load(Ordering::SeqCst), 1);
}

#[test]
fn dropping_session_releases_camera() {
    let (mut session, ledger) = counting_session(Mode::Camera);
    session.attach_inference(scripted(), Duration::ZERO);
    session.pump(Duration::ZERO);
    assert_eq!(ledger.live(), 1);
    drop(session);
    assert_eq!(ledger.live(), 0);
}

#[test]
fn denied_camera_reports_error_and_image_mode_still_works() {
    let provider = DefaultSourceProvider::new(
        Box::new(DeviceCameraBackend::new("deny://front")),
        CameraConstraints::default(),
    );
    let mut session = DetectionSession::new(
        Box::new(provider),
        OverlayRenderer::default(),
        options(Mode::Camera),
    );
    let mut now = Duration::ZERO;
    session.attach_inference(scripted(), now);

    assert!(matches!(
        session.last_error(),
        Some(AcquisitionError::PermissionDenied(_))
    ));
    assert_eq!(session.loop_state(), LoopState::Idle);
    assert!(!session.holds_camera());

    session
        .supply_image(
            ImageInput::Bytes {
                name: "red.png".into(),
                data: png_bytes(24, 18),
            },
            now,
        )
        .expect("image accepted");
    assert_eq!(session.mode(), Mode::Image);
    pump_until(&mut session, &mut now, |s| s.loop_state() == LoopState::Idle);

    assert!(session.last_error().is_none());
    assert_eq!(session.last_detections(), &[cup()]);
    assert_eq!(
        (session.canvas().width(), session.canvas().height()),
        (24, 18)
    );
}

#[test]
fn undecodable_image_surfaces_decode_error() {
    let (mut session, ledger) = counting_session(Mode::Image);
    let mut now = Duration::ZERO;
    session.attach_inference(scripted(), now);
    session
        .supply_image(
            ImageInput::Bytes {
                name: "broken.png".into(),
                data: b"definitely not an image".to_vec(),
            },
            now,
        )
        .expect("decode happens later");
    pump_until(&mut session, &mut now, |s| s.last_error().is_some());

    assert!(matches!(
        session.last_error(),
        Some(AcquisitionError::Decode(_))
    ));
    assert!(session.last_detections().is_empty());
    assert!(!session.is_busy());
    assert_eq!(ledger.opened.load(Ordering::SeqCst), 0);
}

#[test]
fn switching_mode_clears_detections_and_enrichment() {
    let (mut session, _ledger) = counting_session(Mode::Camera);
    let mut now = Duration::ZERO;
    session.attach_inference(scripted(), now);
    pump_until(&mut session, &mut now, |s| !s.last_detections().is_empty());

    let (tx, rx) = mpsc::channel();
    let gateway = Arc::new(GatedGateway {
        release: Mutex::new(rx),
    });
    session.stop_detection();
    assert_eq!(
        session.request_enrichment(gateway.clone()),
        EnrichmentRequest::Started
    );
    assert_eq!(
        session.request_enrichment(gateway.clone()),
        EnrichmentRequest::AlreadyProcessing
    );
    tx.send(()).unwrap();
    pump_until(&mut session, &mut now, |s| !s.is_processing_enrichment());
    assert_eq!(session.last_enriched().len(), 1);

    session.switch_mode(Mode::Image, now).unwrap();
    assert!(session.last_detections().is_empty());
    assert!(session.last_enriched().is_empty());
    assert_eq!(session.canvas().ops(), &[DrawOp::Clear]);
}

#[test]
fn enrichment_from_previous_mode_is_dropped() {
    let (mut session, _ledger) = counting_session(Mode::Camera);
    let mut now = Duration::ZERO;
    session.attach_inference(scripted(), now);
    pump_until(&mut session, &mut now, |s| !s.last_detections().is_empty());
    session.stop_detection();

    let (tx, rx) = mpsc::channel();
    let gateway = Arc::new(GatedGateway {
        release: Mutex::new(rx),
    });
    assert_eq!(
        session.request_enrichment(gateway),
        EnrichmentRequest::Started
    );
    session.switch_mode(Mode::Image, now).unwrap();
    assert!(!session.is_processing_enrichment());

    tx.send(()).unwrap();
    for _ in 0..20 {
        session.pump(now);
        now += FRAME;
        std::thread::sleep(Duration::from_millis(2));
    }
    assert!(session.last_enriched().is_empty());
}

#[test]
fn enrichment_server_error_falls_back_while_camera_keeps_running() {
    let (mut session, _ledger) = counting_session(Mode::Camera);
    let mut now = Duration::ZERO;
    session.attach_inference(scripted(), now);
    pump_until(&mut session, &mut now, |s| !s.last_detections().is_empty());
    let successes_before = session.loop_stats().successes;

    assert_eq!(
        session.request_enrichment(Arc::new(BrokenServiceGateway)),
        EnrichmentRequest::Started
    );
    pump_until(&mut session, &mut now, |s| !s.is_processing_enrichment());
    for _ in 0..3 {
        now += FRAME;
        session.pump(now);
    }

    let snapshot = session.snapshot();
    assert!(snapshot.running);
    assert!(session.is_running());
    assert!(snapshot.stats.successes > successes_before);
    assert!(snapshot.last_error.is_none());
    assert_eq!(snapshot.last_enriched.len(), snapshot.last_detections.len());
    assert_eq!(snapshot.last_enriched[0].detection, cup());
    assert_eq!(
        snapshot.last_enriched[0].description(),
        Some("Cup typically found in everyday environments.")
    );
    match snapshot.enrichment_source {
        Some(EnrichmentSource::Fallback { reason }) => assert!(reason.contains("500")),
        other => panic!("expected fallback, got {:?}", other),
    }
}
