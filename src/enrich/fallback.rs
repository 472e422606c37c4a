use serde_json::json;

use super::EnrichedDetection;
use crate::detect::Detection;

/// Placeholder enrichment, one entry per detection, same order.
pub fn synthesize_fallback(detections: &[Detection]) -> Vec<EnrichedDetection> {
    detections
        .iter()
        .map(|detection| {
            let enhanced = json!({
                "detailedDescription": format!(
                    "{} typically found in everyday environments.",
                    capitalize(detection.class_label())
                ),
                "objectInfo": {
                    "purpose": "Common object used by people for specific functions",
                    "capabilities": "Performs tasks related to its design and purpose",
                    "features": "Has distinctive characteristics typical of this category",
                },
            });
            EnrichedDetection::new(detection.clone(), Some(enhanced))
        })
        .collect()
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    #[test]
    fn placeholder_text() {
        let det = Detection::new("cell phone", 0.7, BoundingBox::default());
        let out = synthesize_fallback(&[det.clone()]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].detection, det);
        assert_eq!(
            out[0].description(),
            Some("Cell phone typically found in everyday environments.")
        );
        let keys: Vec<String> = out[0].object_info().into_iter().map(|(k, _)| k).collect();
        assert!(keys.contains(&"purpose".to_string()));
        assert!(keys.contains(&"capabilities".to_string()));
        assert!(keys.contains(&"features".to_string()));
    }

    #[test]
    fn capitalize_handles_empty_and_unicode() {
        assert_eq!(capitalize(""), "");
        assert_eq!(capitalize("éclair"), "Éclair");
    }
}
