//! V4L2 camera device.
//!
//! A capture thread owns the device and its mmap stream for the whole
//! session, so the stream can borrow the device on the thread's stack. Frames
//! are normalized to RGB on that thread and handed over through a two-slot
//! channel; when the loop falls behind, frames are dropped, never queued.
//!
//! Stopping sets a flag and joins the thread. The device is closed when the
//! thread returns, which is at most one capture interval later.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TryRecvError, TrySendError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use crate::error::AcquisitionError;
use crate::frame::Frame;

use super::camera::{CameraConstraints, CameraDevice, FacingMode};
use super::normalize::{normalize_to_rgb, PixelFormat};

const OPEN_TIMEOUT: Duration = Duration::from_secs(5);
const BUFFER_COUNT: u32 = 4;

type FrameResult = Result<Frame, AcquisitionError>;

pub struct V4l2Camera {
    path: String,
    width: u32,
    height: u32,
    frames: Receiver<FrameResult>,
    stop: Arc<AtomicBool>,
    join: Option<JoinHandle<()>>,
}

struct Negotiated {
    width: u32,
    height: u32,
    format: PixelFormat,
}

impl V4l2Camera {
    /// Open `path` and start streaming. Blocks until the device is streaming
    /// or has failed to open.
    pub fn open(path: &str, constraints: &CameraConstraints) -> Result<Self, AcquisitionError> {
        if constraints.facing == FacingMode::User {
            log::debug!("V4l2Camera: facing mode is not selectable on {}", path);
        }
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<Negotiated, AcquisitionError>>(1);
        let (frame_tx, frame_rx) = mpsc::sync_channel::<FrameResult>(2);
        let stop = Arc::new(AtomicBool::new(false));

        let thread_path = path.to_string();
        let thread_constraints = constraints.clone();
        let thread_stop = Arc::clone(&stop);
        let join = std::thread::Builder::new()
            .name("v4l2-capture".to_string())
            .spawn(move || {
                capture_thread(
                    &thread_path,
                    &thread_constraints,
                    ready_tx,
                    frame_tx,
                    &thread_stop,
                )
            })
            .map_err(|err| {
                AcquisitionError::DeviceUnavailable(format!("spawn capture thread: {}", err))
            })?;

        let negotiated = match ready_rx.recv_timeout(OPEN_TIMEOUT) {
            Ok(Ok(negotiated)) => negotiated,
            Ok(Err(err)) => {
                let _ = join.join();
                return Err(err);
            }
            Err(RecvTimeoutError::Timeout) => {
                stop.store(true, Ordering::SeqCst);
                return Err(AcquisitionError::DeviceUnavailable(format!(
                    "{} did not start streaming within {:?}",
                    path, OPEN_TIMEOUT
                )));
            }
            Err(RecvTimeoutError::Disconnected) => {
                let _ = join.join();
                return Err(AcquisitionError::DeviceUnavailable(format!(
                    "capture thread for {} exited during open",
                    path
                )));
            }
        };

        log::info!(
            "V4l2Camera: streaming {} ({}x{}, {:?})",
            path,
            negotiated.width,
            negotiated.height,
            negotiated.format
        );
        Ok(Self {
            path: path.to_string(),
            width: negotiated.width,
            height: negotiated.height,
            frames: frame_rx,
            stop,
            join: Some(join),
        })
    }
}

impl CameraDevice for V4l2Camera {
    fn describe(&self) -> String {
        format!("{} ({}x{})", self.path, self.width, self.height)
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, AcquisitionError> {
        let mut newest = None;
        loop {
            match self.frames.try_recv() {
                Ok(Ok(frame)) => newest = Some(frame),
                Ok(Err(err)) => return Err(err),
                Err(TryRecvError::Empty) => return Ok(newest),
                Err(TryRecvError::Disconnected) => {
                    return match newest {
                        Some(frame) => Ok(Some(frame)),
                        None => Err(AcquisitionError::StreamLost(format!(
                            "capture thread for {} exited",
                            self.path
                        ))),
                    };
                }
            }
        }
    }

    fn stop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("V4l2Camera: capture thread for {} panicked", self.path);
            }
        }
    }
}

impl Drop for V4l2Camera {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open_error(path: &str, what: &str, err: io::Error) -> AcquisitionError {
    let message = format!("{} {}: {}", what, path, err);
    match err.kind() {
        io::ErrorKind::PermissionDenied => AcquisitionError::PermissionDenied(message),
        _ => AcquisitionError::DeviceUnavailable(message),
    }
}

fn negotiate(
    device: &mut v4l::Device,
    path: &str,
    constraints: &CameraConstraints,
) -> Result<Negotiated, AcquisitionError> {
    use v4l::video::Capture;

    let mut format = device
        .format()
        .map_err(|err| open_error(path, "read format of", err))?;
    format.width = constraints.width;
    format.height = constraints.height;
    format.fourcc = v4l::FourCC::new(b"RGB3");

    let format = match device.set_format(&format) {
        Ok(format) => format,
        Err(err) => {
            log::warn!("V4l2Camera: failed to set format on {}: {}", path, err);
            device
                .format()
                .map_err(|err| open_error(path, "read format of", err))?
        }
    };

    if constraints.target_fps > 0 {
        let params = v4l::video::capture::Parameters::with_fps(constraints.target_fps);
        if let Err(err) = device.set_params(&params) {
            log::warn!("V4l2Camera: failed to set fps on {}: {}", path, err);
        }
    }

    let pixel_format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
        AcquisitionError::DeviceUnavailable(format!(
            "{} settled on unsupported pixel format {}",
            path, format.fourcc
        ))
    })?;
    Ok(Negotiated {
        width: format.width,
        height: format.height,
        format: pixel_format,
    })
}

fn capture_thread(
    path: &str,
    constraints: &CameraConstraints,
    ready_tx: SyncSender<Result<Negotiated, AcquisitionError>>,
    frame_tx: SyncSender<FrameResult>,
    stop: &AtomicBool,
) {
    use v4l::buffer::Type;
    use v4l::io::traits::CaptureStream;

    let mut device = match v4l::Device::with_path(path) {
        Ok(device) => device,
        Err(err) => {
            let _ = ready_tx.send(Err(open_error(path, "open", err)));
            return;
        }
    };
    let negotiated = match negotiate(&mut device, path, constraints) {
        Ok(negotiated) => negotiated,
        Err(err) => {
            let _ = ready_tx.send(Err(err));
            return;
        }
    };
    let (width, height, format) = (negotiated.width, negotiated.height, negotiated.format);
    let mut stream =
        match v4l::prelude::MmapStream::with_buffers(&mut device, Type::VideoCapture, BUFFER_COUNT)
        {
            Ok(stream) => stream,
            Err(err) => {
                let _ = ready_tx.send(Err(open_error(path, "create buffer stream for", err)));
                return;
            }
        };
    if ready_tx.send(Ok(negotiated)).is_err() {
        return;
    }

    let mut sequence = 0u64;
    while !stop.load(Ordering::SeqCst) {
        let result = match stream.next() {
            Ok((buf, _meta)) => {
                sequence += 1;
                normalize_to_rgb(buf, width, height, format)
                    .and_then(|rgb| Frame::from_rgb(rgb, width, height, sequence))
                    .map_err(|err| AcquisitionError::StreamLost(format!("{}: {:#}", path, err)))
            }
            Err(err) => Err(AcquisitionError::StreamLost(format!(
                "capture {}: {}",
                path, err
            ))),
        };
        let fatal = result.is_err();
        match frame_tx.try_send(result) {
            Ok(()) | Err(TrySendError::Full(_)) => {}
            Err(TrySendError::Disconnected(_)) => break,
        }
        if fatal {
            break;
        }
    }
    log::debug!("V4l2Camera: capture thread for {} exiting", path);
}
