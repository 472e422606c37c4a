//! Detection loop scheduler.
//!
//! The loop is a state machine driven from outside: the session calls
//! `on_wake` when the pending wake is due and `on_reply` for every inference
//! reply. Nothing here sleeps or spawns.
//!
//! ```text
//!            start                ready + submit
//!   Idle ───────────► Waiting ─────────────────► Detecting ──┐
//!   Stopped ────────►   │  ▲                        │  ▲      │ success: next frame
//!                       └──┘ not ready:             │  └──────┘ failure: cooldown
//!                            poll next frame        │
//!                                                   ▼ stop / mode switch
//!                                                Stopped
//! ```
//!
//! Invariants:
//! - at most one pending wake (`Option<PendingWake>`)
//! - no wake is scheduled while an inference is in flight
//! - `stop` bumps the epoch; a reply tagged with an older epoch is discarded
//! - the single-shot variant returns to `Idle` after one successful pass, or
//!   after `single_shot_attempts` failed detect calls

use std::time::Duration;

use crate::detect::{Detection, DEFAULT_SCORE_THRESHOLD};
use crate::error::InferenceError;
use crate::frame::Frame;
use crate::inference::{InferencePort, InferenceReply, InferenceRequest, Ticket};
use crate::source::{FrameSource, Readiness};

pub const DEFAULT_RETRY_COOLDOWN: Duration = Duration::from_secs(1);
pub const DEFAULT_SINGLE_SHOT_ATTEMPTS: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    WaitingForSourceReady,
    Detecting,
    Stopped,
}

/// Continuous for a live camera, single-shot for a still image.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopKind {
    Continuous,
    SingleShot,
}

#[derive(Clone, Debug)]
pub struct LoopSettings {
    /// One presentation frame. Lower bound between readiness polls.
    pub frame_interval: Duration,
    /// Delay before retrying after a failed detect call.
    pub retry_cooldown: Duration,
    pub score_threshold: f32,
    /// Detect calls a single-shot pass makes before giving up.
    pub single_shot_attempts: u32,
}

impl Default for LoopSettings {
    fn default() -> Self {
        Self {
            frame_interval: Duration::from_nanos(1_000_000_000 / 30),
            retry_cooldown: DEFAULT_RETRY_COOLDOWN,
            score_threshold: DEFAULT_SCORE_THRESHOLD,
            single_shot_attempts: DEFAULT_SINGLE_SHOT_ATTEMPTS,
        }
    }
}

impl LoopSettings {
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        if fps > 0 {
            self.frame_interval = Duration::from_nanos(1_000_000_000 / fps as u64);
        }
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WakeReason {
    SourcePoll,
    NextFrame,
    Cooldown,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PendingWake {
    pub due: Duration,
    pub reason: WakeReason,
}

/// What a wake or reply did.
#[derive(Debug)]
pub enum LoopEvent {
    /// Source not ready yet; polled again after one frame interval.
    Waiting,
    Submitted(Ticket),
    /// The source can never become ready. The loop has stopped.
    SourceFailed(String),
    /// Detections for the current epoch. `finished` marks the end of a
    /// single-shot pass.
    Applied {
        ticket: Ticket,
        frame: Frame,
        detections: Vec<Detection>,
        finished: bool,
    },
    /// Detect call failed. Retried after the cooldown unless a single-shot
    /// pass has used up its attempts.
    Failed {
        ticket: Ticket,
        error: InferenceError,
        retrying: bool,
    },
    /// Reply from a cancelled epoch or an unknown ticket.
    Discarded(Ticket),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub iterations: u64,
    pub successes: u64,
    pub failures: u64,
    pub discarded: u64,
    pub readiness_polls: u64,
}

pub struct DetectionLoop {
    settings: LoopSettings,
    state: LoopState,
    kind: LoopKind,
    epoch: u64,
    iteration: u64,
    /// Detect calls made in the current epoch.
    attempts: u32,
    wake: Option<PendingWake>,
    in_flight: Option<Ticket>,
    stats: LoopStats,
}

impl DetectionLoop {
    pub fn new(settings: LoopSettings) -> Self {
        Self {
            settings,
            state: LoopState::Idle,
            kind: LoopKind::Continuous,
            epoch: 0,
            iteration: 0,
            attempts: 0,
            wake: None,
            in_flight: None,
            stats: LoopStats::default(),
        }
    }

    pub fn settings(&self) -> &LoopSettings {
        &self.settings
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn kind(&self) -> LoopKind {
        self.kind
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn pending_wake(&self) -> Option<PendingWake> {
        self.wake
    }

    pub fn in_flight(&self) -> Option<Ticket> {
        self.in_flight
    }

    /// Waiting for the source or detecting.
    pub fn is_active(&self) -> bool {
        matches!(
            self.state,
            LoopState::WaitingForSourceReady | LoopState::Detecting
        )
    }

    /// When `on_wake` next has work to do.
    pub fn next_deadline(&self) -> Option<Duration> {
        self.wake.map(|wake| wake.due)
    }

    /// Begin a new epoch. Any previous iteration is cancelled first.
    pub fn start(&mut self, kind: LoopKind, now: Duration) {
        self.cancel();
        self.kind = kind;
        self.attempts = 0;
        self.state = LoopState::WaitingForSourceReady;
        self.wake = Some(PendingWake {
            due: now,
            reason: WakeReason::SourcePoll,
        });
        log::debug!(
            "DetectionLoop: started {:?} loop, epoch {}",
            kind,
            self.epoch
        );
    }

    /// Cancel the pending wake and orphan any in-flight inference.
    pub fn stop(&mut self) {
        let was_active = self.is_active();
        self.cancel();
        if was_active {
            self.state = LoopState::Stopped;
            log::debug!("DetectionLoop: stopped, epoch now {}", self.epoch);
        }
    }

    fn cancel(&mut self) {
        self.epoch += 1;
        self.wake = None;
        self.in_flight = None;
    }

    fn schedule(&mut self, now: Duration, delay: Duration, reason: WakeReason) {
        self.wake = Some(PendingWake {
            due: now + delay,
            reason,
        });
    }

    /// Fire the pending wake if it is due: check readiness and submit the
    /// current frame. Returns `None` when nothing was due.
    pub fn on_wake(
        &mut self,
        now: Duration,
        source: Option<&mut FrameSource>,
        port: &mut dyn InferencePort,
    ) -> Option<LoopEvent> {
        let wake = self.wake?;
        if wake.due > now {
            return None;
        }
        self.wake = None;

        let Some(source) = source else {
            self.stop();
            return Some(LoopEvent::SourceFailed("no active frame source".to_string()));
        };

        self.stats.readiness_polls += 1;
        let frame = match source.readiness() {
            Readiness::Ready => source.current_frame(),
            Readiness::Pending => None,
            Readiness::Failed(reason) => {
                log::warn!("DetectionLoop: {} failed: {}", source.describe(), reason);
                self.stop();
                return Some(LoopEvent::SourceFailed(reason));
            }
        };
        let Some(frame) = frame else {
            self.state = LoopState::WaitingForSourceReady;
            self.schedule(now, self.settings.frame_interval, WakeReason::SourcePoll);
            return Some(LoopEvent::Waiting);
        };

        self.iteration += 1;
        self.attempts += 1;
        self.stats.iterations += 1;
        let ticket = Ticket {
            epoch: self.epoch,
            iteration: self.iteration,
        };
        self.state = LoopState::Detecting;
        let request = InferenceRequest {
            ticket,
            frame,
            score_threshold: self.settings.score_threshold,
        };
        match port.submit(request) {
            Ok(()) => {
                self.in_flight = Some(ticket);
                Some(LoopEvent::Submitted(ticket))
            }
            Err(error) => Some(self.fail(ticket, error, now)),
        }
    }

    /// Apply an inference reply, or discard it if it belongs to a cancelled
    /// iteration.
    pub fn on_reply(&mut self, reply: InferenceReply, now: Duration) -> LoopEvent {
        if reply.ticket.epoch != self.epoch || self.in_flight != Some(reply.ticket) {
            self.stats.discarded += 1;
            log::debug!(
                "DetectionLoop: discarding stale reply {:?} (epoch {})",
                reply.ticket,
                self.epoch
            );
            return LoopEvent::Discarded(reply.ticket);
        }
        self.in_flight = None;

        match reply.outcome {
            Ok(detections) => {
                self.stats.successes += 1;
                let finished = match self.kind {
                    LoopKind::Continuous => {
                        self.schedule(now, self.settings.frame_interval, WakeReason::NextFrame);
                        false
                    }
                    LoopKind::SingleShot => {
                        self.state = LoopState::Idle;
                        true
                    }
                };
                LoopEvent::Applied {
                    ticket: reply.ticket,
                    frame: reply.frame,
                    detections,
                    finished,
                }
            }
            Err(error) => self.fail(reply.ticket, error, now),
        }
    }

    fn fail(&mut self, ticket: Ticket, error: InferenceError, now: Duration) -> LoopEvent {
        self.stats.failures += 1;
        if self.kind == LoopKind::SingleShot
            && self.attempts >= self.settings.single_shot_attempts.max(1)
        {
            log::warn!(
                "DetectionLoop: detection failed ({}), giving up after {} attempt(s)",
                error,
                self.attempts
            );
            self.state = LoopState::Idle;
            return LoopEvent::Failed {
                ticket,
                error,
                retrying: false,
            };
        }
        log::warn!(
            "DetectionLoop: detection failed ({}), retrying in {:?}",
            error,
            self.settings.retry_cooldown
        );
        self.schedule(now, self.settings.retry_cooldown, WakeReason::Cooldown);
        LoopEvent::Failed {
            ticket,
            error,
            retrying: true,
        }
    }
}
