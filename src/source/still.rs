//! Static image frame source.
//!
//! Decoding runs on a short-lived thread so a large upload never stalls the
//! loop. The source reports `Pending` until the decode thread answers.

use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};

use crate::error::AcquisitionError;
use crate::frame::Frame;

use super::Readiness;

/// Image to decode: a file on disk or an in-memory upload.
#[derive(Clone, Debug)]
pub enum ImageInput {
    Path(PathBuf),
    Bytes { name: String, data: Vec<u8> },
}

impl ImageInput {
    pub fn label(&self) -> String {
        match self {
            ImageInput::Path(path) => path.display().to_string(),
            ImageInput::Bytes { name, data } => format!("{} ({} bytes)", name, data.len()),
        }
    }
}

enum ImageState {
    Decoding(Receiver<Result<Frame, AcquisitionError>>),
    Decoded(Frame),
    Failed(AcquisitionError),
    Released,
}

pub struct ImageSource {
    label: String,
    state: ImageState,
}

impl ImageSource {
    /// Start decoding in the background.
    pub fn decode(input: ImageInput) -> Self {
        let label = input.label();
        let (tx, rx) = mpsc::channel();
        let spawned = std::thread::Builder::new()
            .name("image-decode".to_string())
            .spawn(move || {
                let _ = tx.send(decode_input(&input));
            });
        let state = match spawned {
            Ok(_) => ImageState::Decoding(rx),
            Err(err) => ImageState::Failed(AcquisitionError::Decode(format!(
                "spawn decoder: {}",
                err
            ))),
        };
        Self { label, state }
    }

    /// An already-decoded frame.
    pub fn from_frame(label: impl Into<String>, frame: Frame) -> Self {
        Self {
            label: label.into(),
            state: ImageState::Decoded(frame),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn readiness(&mut self) -> Readiness {
        if let ImageState::Decoding(rx) = &self.state {
            match rx.try_recv() {
                Ok(Ok(frame)) => {
                    log::info!(
                        "ImageSource: decoded {} ({}x{})",
                        self.label,
                        frame.width,
                        frame.height
                    );
                    self.state = ImageState::Decoded(frame);
                }
                Ok(Err(err)) => {
                    log::warn!("ImageSource: {}: {}", self.label, err);
                    self.state = ImageState::Failed(err);
                }
                Err(TryRecvError::Empty) => return Readiness::Pending,
                Err(TryRecvError::Disconnected) => {
                    self.state = ImageState::Failed(AcquisitionError::Decode(
                        "decoder exited without a result".to_string(),
                    ));
                }
            }
        }
        match &self.state {
            ImageState::Decoding(_) => Readiness::Pending,
            ImageState::Decoded(frame) if frame.has_dimensions() => Readiness::Ready,
            // A decoded image never grows, so zero dimensions are final.
            ImageState::Decoded(_) => {
                Readiness::Failed(format!("{} has zero dimensions", self.label))
            }
            ImageState::Failed(err) => Readiness::Failed(err.to_string()),
            ImageState::Released => Readiness::Failed(format!("{} released", self.label)),
        }
    }

    pub fn current_frame(&self) -> Option<Frame> {
        match &self.state {
            ImageState::Decoded(frame) => Some(frame.clone()),
            _ => None,
        }
    }

    /// The decode error, if decoding failed.
    pub fn error(&self) -> Option<&AcquisitionError> {
        match &self.state {
            ImageState::Failed(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_released(&self) -> bool {
        matches!(self.state, ImageState::Released)
    }

    pub fn release(&mut self) {
        if !self.is_released() {
            self.state = ImageState::Released;
            log::debug!("ImageSource: released {}", self.label);
        }
    }
}

fn decode_input(input: &ImageInput) -> Result<Frame, AcquisitionError> {
    let decoded = match input {
        ImageInput::Path(path) => image::open(path),
        ImageInput::Bytes { data, .. } => image::load_from_memory(data),
    }
    .map_err(|err| AcquisitionError::Decode(format!("{}: {}", input.label(), err)))?;
    let rgb = decoded.to_rgb8();
    let (width, height) = rgb.dimensions();
    Frame::from_rgb(rgb.into_raw(), width, height, 0)
        .map_err(|err| AcquisitionError::Decode(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::time::{Duration, Instant};

    fn wait_ready(source: &mut ImageSource) -> Readiness {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let readiness = source.readiness();
            if readiness != Readiness::Pending || Instant::now() > deadline {
                return readiness;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = image::RgbImage::from_pixel(width, height, image::Rgb([10, 200, 30]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Png).unwrap();
        out.into_inner()
    }

    #[test]
    fn decodes_png_upload() {
        let mut source = ImageSource::decode(ImageInput::Bytes {
            name: "upload.png".into(),
            data: png_bytes(12, 8),
        });
        assert_eq!(wait_ready(&mut source), Readiness::Ready);
        let frame = source.current_frame().unwrap();
        assert_eq!((frame.width, frame.height), (12, 8));
        assert_eq!(frame.rgb_at(0, 0), Some([10, 200, 30]));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        let mut source = ImageSource::decode(ImageInput::Bytes {
            name: "broken.jpg".into(),
            data: b"not an image".to_vec(),
        });
        assert!(matches!(wait_ready(&mut source), Readiness::Failed(_)));
        assert!(matches!(source.error(), Some(AcquisitionError::Decode(_))));
    }

    #[test]
    fn zero_sized_frame_is_never_ready() {
        let empty = Frame::from_rgb(Vec::new(), 0, 0, 0).unwrap();
        let mut source = ImageSource::from_frame("empty", empty);
        assert!(matches!(source.readiness(), Readiness::Failed(_)));
    }
}
