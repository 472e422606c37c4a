//! Frame container shared by sources, detectors and the overlay renderer.
//!
//! - `Frame`: RGB8 pixels plus native dimensions. Pixels sit behind an `Arc`
//!   so handing the same frame to inference and to the renderer never copies.
//! - `FrameSize`: native width/height pair.
//!
//! A frame with a zero dimension is representable (a camera that is still
//! warming up may report one) but is never "ready": `has_dimensions()` is the
//! gate every consumer checks before detection or drawing.

use anyhow::{anyhow, Result};
use image::{Rgba, RgbaImage};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Native pixel dimensions of a frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// One still visual sample from a live stream or a decoded image.
#[derive(Clone)]
pub struct Frame {
    pixels: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
    /// Monotonic per-source sequence number.
    pub sequence: u64,
    captured_at: Instant,
}

impl Frame {
    /// Wrap tightly packed RGB8 pixels. The buffer length must match the dimensions.
    pub fn from_rgb(pixels: Vec<u8>, width: u32, height: u32, sequence: u64) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels: pixels.into(),
            width,
            height,
            sequence,
            captured_at: Instant::now(),
        })
    }

    /// A frame of the given size filled with one colour.
    pub fn solid(width: u32, height: u32, rgb: [u8; 3], sequence: u64) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * 3);
        for _ in 0..count {
            pixels.extend_from_slice(&rgb);
        }
        Self {
            pixels: pixels.into(),
            width,
            height,
            sequence,
            captured_at: Instant::now(),
        }
    }

    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.width, self.height)
    }

    /// True when both natural dimensions are non-zero.
    pub fn has_dimensions(&self) -> bool {
        !self.size().is_empty()
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn age(&self) -> Duration {
        self.captured_at.elapsed()
    }

    /// RGB value at a pixel, if in bounds.
    pub fn rgb_at(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        Some([self.pixels[idx], self.pixels[idx + 1], self.pixels[idx + 2]])
    }

    /// Opaque RGBA copy for drawing.
    pub fn to_rgba_image(&self) -> RgbaImage {
        let mut image = RgbaImage::new(self.width, self.height);
        for (i, px) in image.pixels_mut().enumerate() {
            let idx = i * 3;
            *px = Rgba([
                self.pixels[idx],
                self.pixels[idx + 1],
                self.pixels[idx + 2],
                255,
            ]);
        }
        image
    }
}

impl std::fmt::Debug for Frame {
    // Pixel content is never printed.
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("sequence", &self.sequence)
            .finish()
    }
}
