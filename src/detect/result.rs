use serde::{Deserialize, Serialize};

/// Axis-aligned box in frame pixels (origin top-left).
///
/// Serialized as `[x, y, width, height]`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn area(&self) -> f32 {
        self.width.max(0.0) * self.height.max(0.0)
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x0 = self.x.max(other.x);
        let y0 = self.y.max(other.y);
        let x1 = (self.x + self.width).min(other.x + other.width);
        let y1 = (self.y + self.height).min(other.y + other.height);
        let inter = (x1 - x0).max(0.0) * (y1 - y0).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x, b.y, b.width, b.height]
    }
}

/// One classified, localized object instance within a frame.
///
/// Immutable once created: each detection cycle produces a fresh list that
/// replaces the previous one wholesale.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "DetectionWire")]
pub struct Detection {
    #[serde(rename = "class")]
    class_label: String,
    #[serde(rename = "score")]
    confidence_score: f32,
    #[serde(rename = "bbox")]
    bounding_box: BoundingBox,
}

/// Wire shape of a detection; decoding goes through `Detection::new`.
#[derive(Deserialize)]
struct DetectionWire {
    class: String,
    score: f32,
    bbox: BoundingBox,
}

impl From<DetectionWire> for Detection {
    fn from(wire: DetectionWire) -> Self {
        Detection::new(wire.class, wire.score, wire.bbox)
    }
}

impl Detection {
    /// Scores outside `[0, 1]` are clamped.
    pub fn new(class_label: impl Into<String>, confidence_score: f32, bounding_box: BoundingBox) -> Self {
        let confidence_score = if confidence_score.is_finite() {
            confidence_score.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            class_label: class_label.into(),
            confidence_score,
            bounding_box,
        }
    }

    pub fn class_label(&self) -> &str {
        &self.class_label
    }

    pub fn confidence_score(&self) -> f32 {
        self.confidence_score
    }

    pub fn bounding_box(&self) -> BoundingBox {
        self.bounding_box
    }

    /// Confidence as a rounded whole percentage.
    pub fn confidence_percent(&self) -> u32 {
        (self.confidence_score * 100.0).round() as u32
    }

    /// Overlay label text, e.g. `cup 82%`.
    pub fn label_text(&self) -> String {
        format!("{} {}%", self.class_label, self.confidence_percent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detection_serializes_with_short_keys() {
        let det = Detection::new("cup", 0.82, BoundingBox::new(10.0, 20.0, 50.0, 60.0));
        let json = serde_json::to_value(&det).unwrap();
        assert_eq!(json["class"], "cup");
        assert_eq!(json["bbox"], serde_json::json!([10.0, 20.0, 50.0, 60.0]));
        let back: Detection = serde_json::from_value(json).unwrap();
        assert_eq!(back, det);
    }

    #[test]
    fn label_text_rounds_percentage() {
        let det = Detection::new("cup", 0.82, BoundingBox::default());
        assert_eq!(det.label_text(), "cup 82%");
        let det = Detection::new("person", 1.7, BoundingBox::default());
        assert_eq!(det.confidence_percent(), 100);
    }

    #[test]
    fn decoded_scores_are_clamped() {
        let det: Detection =
            serde_json::from_str(r#"{"class":"cup","score":1.7,"bbox":[0,0,1,1]}"#).unwrap();
        assert_eq!(det.confidence_score(), 1.0);
        assert_eq!(det.label_text(), "cup 100%");

        let det: Detection =
            serde_json::from_str(r#"{"class":"cup","score":-3,"bbox":[0,0,1,1]}"#).unwrap();
        assert_eq!(det.confidence_score(), 0.0);
    }

    #[test]
    fn non_finite_scores_become_zero() {
        for score in [f32::NAN, f32::INFINITY, f32::NEG_INFINITY] {
            let det = Detection::new("cup", score, BoundingBox::default());
            assert_eq!(det.confidence_score(), 0.0);
        }
    }

    #[test]
    fn iou_of_disjoint_and_identical_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(20.0, 20.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);
        assert!((a.iou(&a) - 1.0).abs() < f32::EPSILON);
    }
}
