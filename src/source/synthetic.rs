//! Synthetic camera for `stub://` devices.
//!
//! Renders a dark gradient with one bright square sweeping across it, which
//! is exactly what the stub detector looks for. Query parameters on the device
//! URL shape its behaviour:
//! - `warmup=N`: the first N reads report a zero-sized frame
//! - `lost_after=N`: reads after the Nth fail with a lost stream

use crate::error::AcquisitionError;
use crate::frame::Frame;

use super::camera::{CameraConstraints, CameraDevice};

/// Pixel generator for the synthetic camera.
#[derive(Clone, Debug)]
pub struct SyntheticScene {
    pub width: u32,
    pub height: u32,
    /// Edge length of the moving square, in pixels.
    pub square: u32,
    /// Horizontal movement per frame, in pixels.
    pub speed: u32,
}

impl SyntheticScene {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            square: (width.min(height) / 4).max(4),
            speed: 8,
        }
    }

    /// Top-left corner of the square in frame `index`.
    pub fn square_origin(&self, index: u64) -> (u32, u32) {
        let travel = self.width.saturating_sub(self.square).max(1) as u64;
        let x = (index * self.speed as u64) % travel;
        let y = self.height.saturating_sub(self.square) / 2;
        (x as u32, y)
    }

    pub fn render(&self, index: u64) -> Vec<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        let (sx, sy) = self.square_origin(index);
        let (sx, sy, side) = (sx as usize, sy as usize, self.square as usize);
        let mut pixels = vec![0u8; w * h * 3];
        for y in 0..h {
            for x in 0..w {
                let offset = (y * w + x) * 3;
                let inside = x >= sx && x < sx + side && y >= sy && y < sy + side;
                let px = if inside {
                    [250, 240, 230]
                } else {
                    let shade = (x * 64 / w.max(1)) as u8 + (y * 16 / h.max(1)) as u8;
                    [shade, shade / 2 + 10, 40]
                };
                pixels[offset..offset + 3].copy_from_slice(&px);
            }
        }
        pixels
    }
}

pub struct SyntheticCamera {
    name: String,
    scene: SyntheticScene,
    warmup: u64,
    lost_after: Option<u64>,
    reads: u64,
    stopped: bool,
}

impl SyntheticCamera {
    pub fn new(name: impl Into<String>, scene: SyntheticScene) -> Self {
        Self {
            name: name.into(),
            scene,
            warmup: 0,
            lost_after: None,
            reads: 0,
            stopped: false,
        }
    }

    pub fn with_warmup(mut self, frames: u64) -> Self {
        self.warmup = frames;
        self
    }

    pub fn with_lost_after(mut self, frames: u64) -> Self {
        self.lost_after = Some(frames);
        self
    }

    /// Build from a `stub://name?warmup=N&lost_after=N` device string.
    pub fn from_url(
        device: &str,
        constraints: &CameraConstraints,
    ) -> Result<Self, AcquisitionError> {
        let parsed = url::Url::parse(device).map_err(|err| {
            AcquisitionError::DeviceUnavailable(format!("invalid device {}: {}", device, err))
        })?;
        let name = parsed.host_str().unwrap_or("synthetic").to_string();
        let mut camera = Self::new(
            name,
            SyntheticScene::new(constraints.width, constraints.height),
        );
        for (key, value) in parsed.query_pairs() {
            let parsed_value = value.parse::<u64>().map_err(|_| {
                AcquisitionError::DeviceUnavailable(format!(
                    "invalid {} value {:?} in {}",
                    key, value, device
                ))
            })?;
            match key.as_ref() {
                "warmup" => camera = camera.with_warmup(parsed_value),
                "lost_after" => camera = camera.with_lost_after(parsed_value),
                other => log::warn!("SyntheticCamera: ignoring unknown option {}", other),
            }
        }
        Ok(camera)
    }
}

impl CameraDevice for SyntheticCamera {
    fn describe(&self) -> String {
        format!(
            "stub://{} ({}x{}, synthetic)",
            self.name, self.scene.width, self.scene.height
        )
    }

    fn read_frame(&mut self) -> Result<Option<Frame>, AcquisitionError> {
        if self.stopped {
            return Err(AcquisitionError::StreamLost(format!(
                "stub://{} stopped",
                self.name
            )));
        }
        self.reads += 1;
        if matches!(self.lost_after, Some(limit) if self.reads > limit) {
            return Err(AcquisitionError::StreamLost(format!(
                "stub://{} disconnected",
                self.name
            )));
        }
        let frame = if self.reads <= self.warmup {
            Frame::from_rgb(Vec::new(), 0, 0, self.reads)
        } else {
            let index = self.reads - self.warmup;
            Frame::from_rgb(
                self.scene.render(index),
                self.scene.width,
                self.scene.height,
                self.reads,
            )
        };
        frame
            .map(Some)
            .map_err(|err| AcquisitionError::StreamLost(err.to_string()))
    }

    fn stop(&mut self) {
        self.stopped = true;
        log::debug!("SyntheticCamera: stub://{} stopped", self.name);
    }
}
