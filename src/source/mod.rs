//! Frame sources.
//!
//! Two interchangeable frame producers with distinct lifecycles:
//! - `LiveCamera`: owns the camera device for as long as it is active
//! - `StaticImage`: an uploaded image, decoded off the loop thread
//!
//! Sources are responsible for:
//! - Reporting readiness: loaded/streaming AND non-zero dimensions
//! - Handing out the current frame
//! - Releasing their resource exactly once, however often `release` is called
//!
//! The camera device is the one exclusive resource in the system. Only the
//! active `LiveCamera` may hold it, and it is stopped on every exit path:
//! explicit release, mode switch, stream failure, or drop.

mod camera;
mod still;
#[cfg(feature = "camera-v4l2")]
mod normalize;
mod synthetic;
#[cfg(feature = "camera-v4l2")]
mod v4l2;

pub use camera::{
    CameraBackend, CameraConstraints, CameraDevice, CameraSource, DeviceCameraBackend, FacingMode,
};
pub use still::{ImageInput, ImageSource};
pub use synthetic::{SyntheticCamera, SyntheticScene};
#[cfg(feature = "camera-v4l2")]
pub use v4l2::V4l2Camera;

use crate::error::AcquisitionError;
use crate::frame::Frame;

/// Whether a source can hand a frame to the detector right now.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Readiness {
    Ready,
    /// Not yet: still decoding, warming up, or reporting zero dimensions.
    Pending,
    /// Never will be: decode failed, stream lost, or already released.
    Failed(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SourceKind {
    LiveCamera,
    StaticImage,
}

/// The active frame producer.
pub enum FrameSource {
    LiveCamera(CameraSource),
    StaticImage(ImageSource),
}

impl FrameSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            FrameSource::LiveCamera(_) => SourceKind::LiveCamera,
            FrameSource::StaticImage(_) => SourceKind::StaticImage,
        }
    }

    /// Re-check readiness, pulling the newest camera frame or decode result.
    pub fn readiness(&mut self) -> Readiness {
        match self {
            FrameSource::LiveCamera(source) => source.readiness(),
            FrameSource::StaticImage(source) => source.readiness(),
        }
    }

    /// The frame last observed by `readiness`, if it has dimensions.
    pub fn current_frame(&self) -> Option<Frame> {
        let frame = match self {
            FrameSource::LiveCamera(source) => source.current_frame(),
            FrameSource::StaticImage(source) => source.current_frame(),
        }?;
        frame.has_dimensions().then_some(frame)
    }

    /// Release the underlying resource. Idempotent.
    pub fn release(&mut self) {
        match self {
            FrameSource::LiveCamera(source) => source.release(),
            FrameSource::StaticImage(source) => source.release(),
        }
    }

    pub fn is_released(&self) -> bool {
        match self {
            FrameSource::LiveCamera(source) => source.is_released(),
            FrameSource::StaticImage(source) => source.is_released(),
        }
    }

    /// True while this source owns a live camera device.
    pub fn holds_camera(&self) -> bool {
        matches!(self, FrameSource::LiveCamera(source) if !source.is_released())
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match self {
            FrameSource::LiveCamera(source) => format!("camera {}", source.label()),
            FrameSource::StaticImage(source) => format!("image {}", source.label()),
        }
    }
}

/// What to acquire.
pub enum SourceRequest {
    Camera,
    Image(ImageInput),
}

/// Acquires frame sources for the session.
pub trait SourceProvider: Send {
    fn acquire(&mut self, request: SourceRequest) -> Result<FrameSource, AcquisitionError>;
}

/// Provider backed by a camera backend and the image decoder.
pub struct DefaultSourceProvider {
    camera: Box<dyn CameraBackend>,
    constraints: CameraConstraints,
}

impl DefaultSourceProvider {
    pub fn new(camera: Box<dyn CameraBackend>, constraints: CameraConstraints) -> Self {
        Self {
            camera,
            constraints,
        }
    }
}

impl SourceProvider for DefaultSourceProvider {
    fn acquire(&mut self, request: SourceRequest) -> Result<FrameSource, AcquisitionError> {
        match request {
            SourceRequest::Camera => {
                let device = self.camera.open(&self.constraints)?;
                Ok(FrameSource::LiveCamera(CameraSource::new(device)))
            }
            SourceRequest::Image(input) => Ok(FrameSource::StaticImage(ImageSource::decode(input))),
        }
    }
}
