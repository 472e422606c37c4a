//! Blocking driver for a `DetectionSession`.
//!
//! Pumps the session on the calling thread, sleeping until the next scheduler
//! deadline but never longer than the idle poll, so replies from background
//! threads are picked up promptly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crate::clock::Clock;
use crate::session::DetectionSession;

pub const DEFAULT_IDLE_POLL: Duration = Duration::from_millis(5);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// The stop condition returned true.
    Finished,
    /// The time limit elapsed first.
    TimedOut,
    /// The shutdown flag was raised.
    Interrupted,
}

pub struct SessionDriver<'a> {
    clock: &'a dyn Clock,
    shutdown: &'a AtomicBool,
    idle_poll: Duration,
}

impl<'a> SessionDriver<'a> {
    pub fn new(clock: &'a dyn Clock, shutdown: &'a AtomicBool) -> Self {
        Self {
            clock,
            shutdown,
            idle_poll: DEFAULT_IDLE_POLL,
        }
    }

    pub fn with_idle_poll(mut self, idle_poll: Duration) -> Self {
        self.idle_poll = idle_poll;
        self
    }

    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Pump until `done` holds, `limit` elapses, or shutdown is requested.
    /// `on_turn` runs after every pump.
    pub fn run(
        &self,
        session: &mut DetectionSession,
        limit: Option<Duration>,
        mut done: impl FnMut(&DetectionSession) -> bool,
        mut on_turn: impl FnMut(&DetectionSession, Duration),
    ) -> RunOutcome {
        let started = self.clock.now();
        loop {
            let now = self.clock.now();
            let next = session.pump(now);
            on_turn(session, now);
            if done(session) {
                return RunOutcome::Finished;
            }
            if self.shutdown.load(Ordering::SeqCst) {
                log::info!("SessionDriver: shutdown requested");
                return RunOutcome::Interrupted;
            }
            if matches!(limit, Some(limit) if now.saturating_sub(started) >= limit) {
                return RunOutcome::TimedOut;
            }
            let sleep = next
                .map(|due| due.saturating_sub(now))
                .unwrap_or(self.idle_poll)
                .min(self.idle_poll);
            if !sleep.is_zero() {
                std::thread::sleep(sleep);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SystemClock;
    use crate::detect::{BoundingBox, Detection, ScriptedBackend};
    use crate::inference::InlineInference;
    use crate::overlay::OverlayRenderer;
    use crate::session::{Mode, SessionOptions};
    use crate::source::{CameraConstraints, DefaultSourceProvider, DeviceCameraBackend};

    fn camera_session() -> DetectionSession {
        let provider = DefaultSourceProvider::new(
            Box::new(DeviceCameraBackend::new("stub://runtime")),
            CameraConstraints {
                width: 16,
                height: 16,
                ..CameraConstraints::default()
            },
        );
        DetectionSession::new(
            Box::new(provider),
            OverlayRenderer::default(),
            SessionOptions {
                initial_mode: Mode::Camera,
                ..SessionOptions::default()
            },
        )
    }

    #[test]
    fn runs_until_detections_arrive() {
        let clock = SystemClock::new();
        let shutdown = AtomicBool::new(false);
        let mut session = camera_session();
        let cup = Detection::new("cup", 0.9, BoundingBox::new(0.0, 0.0, 4.0, 4.0));
        session.attach_inference(
            Box::new(InlineInference::new(Box::new(ScriptedBackend::detections(vec![cup])))),
            clock.now(),
        );
        let outcome = SessionDriver::new(&clock, &shutdown).run(
            &mut session,
            Some(Duration::from_secs(5)),
            |s| !s.last_detections().is_empty(),
            |_, _| {},
        );
        assert_eq!(outcome, RunOutcome::Finished);
    }

    #[test]
    fn shutdown_flag_interrupts() {
        let clock = SystemClock::new();
        let shutdown = AtomicBool::new(true);
        let mut session = camera_session();
        let outcome = SessionDriver::new(&clock, &shutdown).run(
            &mut session,
            None,
            |_| false,
            |_, _| {},
        );
        assert_eq!(outcome, RunOutcome::Interrupted);
    }

    #[test]
    fn time_limit_ends_run() {
        let clock = SystemClock::new();
        let shutdown = AtomicBool::new(false);
        let mut session = camera_session();
        let outcome = SessionDriver::new(&clock, &shutdown).run(
            &mut session,
            Some(Duration::from_millis(20)),
            |_| false,
            |_, _| {},
        );
        assert_eq!(outcome, RunOutcome::TimedOut);
    }
}
