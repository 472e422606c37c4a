//! Overlay renderer.
//!
//! Every pass starts by resizing the canvas to the frame's native size, then
//! draws the frame, then one box and one label tag per detection. A pass fully
//! replaces the previous one. Alongside the pixels, each pass is recorded as a
//! display list (`DrawOp`) so callers can see exactly what was drawn.

use std::path::Path;

use ab_glyph::{Font, FontVec, PxScale, ScaleFont};
use anyhow::{anyhow, Context, Result};
use image::{DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::detect::{BoundingBox, Detection};
use crate::frame::Frame;

/// Colours and metrics of boxes and label tags.
#[derive(Clone, Debug)]
pub struct OverlayStyle {
    pub box_color: Rgba<u8>,
    pub box_thickness: u32,
    pub label_color: Rgba<u8>,
    pub text_color: Rgba<u8>,
    pub font_px: f32,
    /// Height of the label tag.
    pub label_height: u32,
    /// Horizontal space around the text; half on each side.
    pub label_padding: u32,
    /// Distance from the tag's bottom edge up to the text baseline.
    pub baseline_offset: u32,
}

impl Default for OverlayStyle {
    fn default() -> Self {
        Self {
            box_color: Rgba([0, 255, 255, 255]),
            box_thickness: 2,
            label_color: Rgba([0, 255, 255, 255]),
            text_color: Rgba([0, 0, 0, 255]),
            font_px: 18.0,
            label_height: 25,
            label_padding: 10,
            baseline_offset: 7,
        }
    }
}

/// One recorded drawing step.
#[derive(Clone, Debug, PartialEq)]
pub enum DrawOp {
    Resize {
        width: u32,
        height: u32,
    },
    Clear,
    DrawFrame {
        sequence: u64,
    },
    StrokeRect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        thickness: u32,
    },
    FillRect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
    },
    /// `y` is the text baseline.
    Text {
        text: String,
        x: i32,
        y: i32,
    },
}

/// Presentation surface.
pub struct Canvas {
    image: RgbaImage,
    ops: Vec<DrawOp>,
}

impl Canvas {
    fn empty() -> Self {
        Self {
            image: RgbaImage::new(0, 0),
            ops: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// Display list of the last pass.
    pub fn ops(&self) -> &[DrawOp] {
        &self.ops
    }

    /// Label texts drawn in the last pass, in order.
    pub fn labels(&self) -> Vec<&str> {
        self.ops
            .iter()
            .filter_map(|op| match op {
                DrawOp::Text { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Write the canvas to disk. The format follows the file extension.
    pub fn save(&self, path: &Path) -> Result<()> {
        if self.width() == 0 || self.height() == 0 {
            return Err(anyhow!("canvas is empty, nothing to save"));
        }
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create {}", parent.display()))?;
        }
        // JPEG has no alpha channel.
        DynamicImage::ImageRgba8(self.image.clone())
            .to_rgb8()
            .save(path)
            .with_context(|| format!("save overlay {}", path.display()))
    }
}

/// Measures and optionally rasterizes label text.
pub enum LabelFont {
    /// Fixed advance per character; text extent is laid out, glyphs are not drawn.
    Metrics { advance_per_px: f32 },
    Glyphs(FontVec),
}

impl Default for LabelFont {
    fn default() -> Self {
        // Average advance of a proportional sans face.
        LabelFont::Metrics {
            advance_per_px: 0.55,
        }
    }
}

impl LabelFont {
    /// Load a TrueType/OpenType font file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read(path).with_context(|| format!("read font {}", path.display()))?;
        let font = FontVec::try_from_vec(data)
            .map_err(|err| anyhow!("invalid font {}: {}", path.display(), err))?;
        Ok(LabelFont::Glyphs(font))
    }

    pub fn text_width(&self, text: &str, font_px: f32) -> u32 {
        match self {
            LabelFont::Metrics { advance_per_px } => {
                (text.chars().count() as f32 * advance_per_px * font_px).ceil() as u32
            }
            LabelFont::Glyphs(font) => {
                imageproc::drawing::text_size(PxScale::from(font_px), font, text).0
            }
        }
    }

    fn draw(&self, image: &mut RgbaImage, text: &str, x: i32, baseline: i32, style: &OverlayStyle) {
        if let LabelFont::Glyphs(font) = self {
            let scale = PxScale::from(style.font_px);
            let ascent = font.as_scaled(scale).ascent().round() as i32;
            draw_text_mut(image, style.text_color, x, baseline - ascent, scale, font, text);
        }
    }
}

pub struct OverlayRenderer {
    style: OverlayStyle,
    font: LabelFont,
    canvas: Canvas,
}

impl OverlayRenderer {
    pub fn new(style: OverlayStyle, font: LabelFont) -> Self {
        Self {
            style,
            font,
            canvas: Canvas::empty(),
        }
    }

    pub fn style(&self) -> &OverlayStyle {
        &self.style
    }

    pub fn canvas(&self) -> &Canvas {
        &self.canvas
    }

    /// Redraw the canvas from scratch for `frame` and its detections.
    pub fn render(&mut self, frame: &Frame, detections: &[Detection]) -> &Canvas {
        let (width, height) = (frame.width, frame.height);
        let mut ops = vec![DrawOp::Resize { width, height }];
        if !frame.has_dimensions() {
            self.canvas = Canvas {
                image: RgbaImage::new(width, height),
                ops,
            };
            return &self.canvas;
        }

        let mut image = frame.to_rgba_image();
        ops.push(DrawOp::DrawFrame {
            sequence: frame.sequence,
        });
        for detection in detections {
            self.draw_detection(&mut image, &mut ops, detection);
        }
        self.canvas = Canvas { image, ops };
        &self.canvas
    }

    /// Blank the canvas, keeping its size.
    pub fn clear(&mut self) {
        let (width, height) = self.canvas.image.dimensions();
        self.canvas = Canvas {
            image: RgbaImage::new(width, height),
            ops: vec![DrawOp::Clear],
        };
    }

    fn draw_detection(&self, image: &mut RgbaImage, ops: &mut Vec<DrawOp>, detection: &Detection) {
        let style = &self.style;
        let (x, y, w, h) = pixel_rect(detection.bounding_box());
        ops.push(DrawOp::StrokeRect {
            x,
            y,
            width: w,
            height: h,
            thickness: style.box_thickness,
        });
        for t in 0..style.box_thickness {
            let inset = t as i32;
            let (iw, ih) = (
                w.saturating_sub(2 * t),
                h.saturating_sub(2 * t),
            );
            if iw == 0 || ih == 0 {
                break;
            }
            draw_hollow_rect_mut(
                image,
                Rect::at(x + inset, y + inset).of_size(iw, ih),
                style.box_color,
            );
        }

        let text = detection.label_text();
        let label_w = self.font.text_width(&text, style.font_px) + style.label_padding;
        let label_h = style.label_height as i32;
        // Directly above the box, or directly below when there is no room.
        let label_y = if y - label_h >= 0 { y - label_h } else { y + h as i32 };
        ops.push(DrawOp::FillRect {
            x,
            y: label_y,
            width: label_w,
            height: style.label_height,
        });
        if label_w > 0 && style.label_height > 0 {
            draw_filled_rect_mut(
                image,
                Rect::at(x, label_y).of_size(label_w, style.label_height),
                style.label_color,
            );
        }

        let text_x = x + (style.label_padding / 2) as i32;
        let baseline = label_y + label_h - style.baseline_offset as i32;
        self.font.draw(image, &text, text_x, baseline, style);
        ops.push(DrawOp::Text {
            text,
            x: text_x,
            y: baseline,
        });
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(OverlayStyle::default(), LabelFont::default())
    }
}

/// Round a box to whole pixels. Degenerate boxes keep a 1px extent.
fn pixel_rect(bbox: BoundingBox) -> (i32, i32, u32, u32) {
    let x = bbox.x.round() as i32;
    let y = bbox.y.round() as i32;
    let w = bbox.width.round().max(1.0) as u32;
    let h = bbox.height.round().max(1.0) as u32;
    (x, y, w, h)
}
