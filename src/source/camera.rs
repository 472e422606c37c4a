//! Live camera frame source.
//!
//! `CameraSource` wraps an open `CameraDevice`. The device is stopped exactly
//! once: on `release`, or on drop if nobody released it first.

use crate::error::AcquisitionError;
use crate::frame::Frame;

use super::synthetic::SyntheticCamera;
use super::Readiness;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FacingMode {
    User,
    #[default]
    Environment,
}

/// Requested capture parameters. Devices may settle on something else.
#[derive(Clone, Debug)]
pub struct CameraConstraints {
    pub width: u32,
    pub height: u32,
    pub facing: FacingMode,
    pub target_fps: u32,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
            facing: FacingMode::Environment,
            target_fps: 30,
        }
    }
}

/// An open camera stream.
pub trait CameraDevice: Send {
    /// Device description for logs.
    fn describe(&self) -> String;

    /// Newest frame since the last call, `None` if nothing new. Never blocks
    /// for longer than one capture.
    fn read_frame(&mut self) -> Result<Option<Frame>, AcquisitionError>;

    /// Stop streaming and release the hardware.
    fn stop(&mut self);
}

/// Opens camera devices.
pub trait CameraBackend: Send {
    fn open(
        &mut self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn CameraDevice>, AcquisitionError>;
}

/// Backend selected by device string:
/// - `stub://name` synthetic scene (optional `?warmup=N` zero-sized frames first)
/// - `deny://name` permission always denied
/// - anything else is a V4L2 device path (feature `camera-v4l2`)
pub struct DeviceCameraBackend {
    device: String,
}

impl DeviceCameraBackend {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }
}

impl CameraBackend for DeviceCameraBackend {
    fn open(
        &mut self,
        constraints: &CameraConstraints,
    ) -> Result<Box<dyn CameraDevice>, AcquisitionError> {
        if self.device.starts_with("stub://") {
            let camera = SyntheticCamera::from_url(&self.device, constraints)?;
            return Ok(Box::new(camera));
        }
        if self.device.starts_with("deny://") {
            return Err(AcquisitionError::PermissionDenied(format!(
                "access to {} was refused",
                self.device
            )));
        }
        #[cfg(feature = "camera-v4l2")]
        {
            let camera = super::v4l2::V4l2Camera::open(&self.device, constraints)?;
            Ok(Box::new(camera))
        }
        #[cfg(not(feature = "camera-v4l2"))]
        {
            Err(AcquisitionError::DeviceUnavailable(format!(
                "{} requires the camera-v4l2 feature",
                self.device
            )))
        }
    }
}

/// Frame source owning a live camera device.
pub struct CameraSource {
    device: Option<Box<dyn CameraDevice>>,
    label: String,
    latest: Option<Frame>,
}

impl CameraSource {
    pub fn new(device: Box<dyn CameraDevice>) -> Self {
        let label = device.describe();
        log::info!("CameraSource: acquired {}", label);
        Self {
            device: Some(device),
            label,
            latest: None,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Pull the newest frame and report whether it can be detected on.
    pub fn readiness(&mut self) -> Readiness {
        let Some(device) = self.device.as_mut() else {
            return Readiness::Failed(format!("camera {} already released", self.label));
        };
        match device.read_frame() {
            Ok(Some(frame)) => self.latest = Some(frame),
            Ok(None) => {}
            Err(err) => return Readiness::Failed(err.to_string()),
        }
        match &self.latest {
            Some(frame) if frame.has_dimensions() => Readiness::Ready,
            _ => Readiness::Pending,
        }
    }

    pub fn current_frame(&self) -> Option<Frame> {
        self.latest.clone()
    }

    pub fn is_released(&self) -> bool {
        self.device.is_none()
    }

    /// Stop the device. Safe to call any number of times.
    pub fn release(&mut self) {
        if let Some(mut device) = self.device.take() {
            device.stop();
            self.latest = None;
            log::info!("CameraSource: released {}", self.label);
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.release();
    }
}
