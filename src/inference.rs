//! Asynchronous boundary between the detection loop and a detector.
//!
//! The loop never calls a detector directly. It submits an `InferenceRequest`
//! tagged with a `Ticket` and later polls for the matching `InferenceReply`.
//! The ticket carries the scheduler epoch, so a reply that resolves after the
//! loop was cancelled can be recognised as stale and dropped.
//!
//! - `InferenceWorker`: detector on a dedicated thread, channels in and out.
//! - `InlineInference`: detector runs at submit time; the reply is handed back
//!   on the next poll. Single-threaded and deterministic.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread::JoinHandle;

use anyhow::{Context, Result};

use crate::detect::{run_detector, Detection, Detector};
use crate::error::InferenceError;
use crate::frame::Frame;

/// Identifies one loop iteration: `iteration` within scheduler `epoch`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Ticket {
    pub epoch: u64,
    pub iteration: u64,
}

pub struct InferenceRequest {
    pub ticket: Ticket,
    pub frame: Frame,
    pub score_threshold: f32,
}

pub struct InferenceReply {
    pub ticket: Ticket,
    /// The frame the detections belong to, returned for rendering.
    pub frame: Frame,
    pub outcome: Result<Vec<Detection>, InferenceError>,
}

/// Where the loop sends frames for detection.
pub trait InferencePort: Send {
    /// Backend name, for status display.
    fn backend(&self) -> &str;

    /// Queue a frame for detection. Fails only if the port cannot accept work.
    fn submit(&mut self, request: InferenceRequest) -> Result<(), InferenceError>;

    /// Next finished reply, if any. Never blocks.
    fn poll(&mut self) -> Option<InferenceReply>;
}

// ----------------------------------------------------------------------------
// Inline
// ----------------------------------------------------------------------------

pub struct InlineInference {
    detector: Box<dyn Detector>,
    backend: String,
    ready: VecDeque<InferenceReply>,
}

impl InlineInference {
    pub fn new(detector: Box<dyn Detector>) -> Self {
        let backend = detector.name().to_string();
        Self {
            detector,
            backend,
            ready: VecDeque::new(),
        }
    }
}

impl InferencePort for InlineInference {
    fn backend(&self) -> &str {
        &self.backend
    }

    fn submit(&mut self, request: InferenceRequest) -> Result<(), InferenceError> {
        let outcome = run_detector(
            self.detector.as_mut(),
            &request.frame,
            request.score_threshold,
        );
        self.ready.push_back(InferenceReply {
            ticket: request.ticket,
            frame: request.frame,
            outcome,
        });
        Ok(())
    }

    fn poll(&mut self) -> Option<InferenceReply> {
        self.ready.pop_front()
    }
}

// ----------------------------------------------------------------------------
// Worker thread
// ----------------------------------------------------------------------------

pub struct InferenceWorker {
    backend: String,
    requests: Option<Sender<InferenceRequest>>,
    replies: Receiver<InferenceReply>,
    /// Submitted but not yet answered, oldest first. Used to fail outstanding
    /// tickets if the worker thread dies.
    outstanding: VecDeque<(Ticket, Frame)>,
    join: Option<JoinHandle<()>>,
}

impl InferenceWorker {
    pub fn spawn(mut detector: Box<dyn Detector>) -> Result<Self> {
        let backend = detector.name().to_string();
        let (req_tx, req_rx) = mpsc::channel::<InferenceRequest>();
        let (reply_tx, reply_rx) = mpsc::channel::<InferenceReply>();
        let join = std::thread::Builder::new()
            .name(format!("inference-{}", backend))
            .spawn(move || {
                while let Ok(request) = req_rx.recv() {
                    let outcome =
                        run_detector(detector.as_mut(), &request.frame, request.score_threshold);
                    let reply = InferenceReply {
                        ticket: request.ticket,
                        frame: request.frame,
                        outcome,
                    };
                    if reply_tx.send(reply).is_err() {
                        break;
                    }
                }
            })
            .context("spawn inference worker")?;
        log::info!("InferenceWorker: started for backend {}", backend);
        Ok(Self {
            backend,
            requests: Some(req_tx),
            replies: reply_rx,
            outstanding: VecDeque::new(),
            join: Some(join),
        })
    }
}

impl InferencePort for InferenceWorker {
    fn backend(&self) -> &str {
        &self.backend
    }

    fn submit(&mut self, request: InferenceRequest) -> Result<(), InferenceError> {
        let sender = self.requests.as_ref().ok_or(InferenceError::Disconnected)?;
        let ticket = request.ticket;
        let frame = request.frame.clone();
        sender
            .send(request)
            .map_err(|_| InferenceError::Disconnected)?;
        self.outstanding.push_back((ticket, frame));
        Ok(())
    }

    fn poll(&mut self) -> Option<InferenceReply> {
        match self.replies.try_recv() {
            Ok(reply) => {
                self.outstanding.retain(|(t, _)| *t != reply.ticket);
                Some(reply)
            }
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.requests = None;
                let (ticket, frame) = self.outstanding.pop_front()?;
                log::warn!("InferenceWorker: worker exited with ticket {:?} outstanding", ticket);
                Some(InferenceReply {
                    ticket,
                    frame,
                    outcome: Err(InferenceError::Disconnected),
                })
            }
        }
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        // Closing the request channel ends the worker loop.
        self.requests = None;
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("InferenceWorker: worker thread panicked");
            }
        }
    }
}
