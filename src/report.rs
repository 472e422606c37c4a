//! Plain-text results panel.

use std::fmt::Write as _;

use crate::enrich::{EnrichedDetection, EnrichmentSource};
use crate::model::ModelStatus;
use crate::session::{Mode, SessionSnapshot};

pub const NO_DETECTIONS_HINT: &str =
    "No objects detected. Try pointing the camera at an object or uploading a different image.";
pub const LIGHTING_TIP: &str = "Tip: Make sure objects are clearly visible with good lighting. \
The model works best with common objects like people, cars, furniture, and animals.";
pub const ENRICH_HINT: &str =
    "Request enrichment to get enhanced information about detected objects.";

/// `detailedDescription` -> `Detailed Description`.
pub fn humanize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for (i, ch) in key.chars().enumerate() {
        if i == 0 {
            out.extend(ch.to_uppercase());
        } else {
            if ch.is_uppercase() {
                out.push(' ');
            }
            out.push(ch);
        }
    }
    out
}

fn detection_count(n: usize) -> String {
    format!("{} object(s) detected", n)
}

fn write_card(out: &mut String, enriched: &EnrichedDetection) {
    let detection = &enriched.detection;
    let _ = writeln!(out, "[{}]", detection.class_label());
    let _ = writeln!(out, "  Confidence: {}%", detection.confidence_percent());
    if let Some(description) = enriched.description() {
        let _ = writeln!(out, "  Description: {}", description);
    }
    let info = enriched.object_info();
    if !info.is_empty() {
        let _ = writeln!(out, "  Object Information:");
        for (key, value) in info {
            let _ = writeln!(out, "    - {}: {}", humanize_key(&key), value);
        }
    }
}

/// Render the session's results the way the results panel shows them.
pub fn render_report(snapshot: &SessionSnapshot) -> String {
    let mut out = String::new();
    let mode = match snapshot.mode {
        Mode::Camera => "camera",
        Mode::Image => "image",
    };
    let model = match &snapshot.model {
        ModelStatus::Loading => "loading".to_string(),
        ModelStatus::Ready { backend } => format!("ready ({})", backend),
        ModelStatus::Unavailable { reason } => format!("unavailable: {}", reason),
    };
    let _ = writeln!(out, "Mode: {}    Model: {}", mode, model);
    if let Some(err) = &snapshot.last_error {
        let _ = writeln!(out, "Error: {}", err);
    }
    if let Some(err) = &snapshot.detection_error {
        let status = if snapshot.retrying { "retrying" } else { "gave up" };
        let _ = writeln!(out, "Detection failed ({}): {}", status, err);
    }
    let _ = writeln!(out, "{}", detection_count(snapshot.last_detections.len()));
    for detection in &snapshot.last_detections {
        let bbox = detection.bounding_box();
        let _ = writeln!(
            out,
            "  {} at ({:.0}, {:.0}) {:.0}x{:.0}",
            detection.label_text(),
            bbox.x,
            bbox.y,
            bbox.width,
            bbox.height
        );
    }
    let _ = writeln!(out);

    if snapshot.processing {
        let _ = writeln!(out, "Processing with enrichment service...");
    } else if !snapshot.last_enriched.is_empty() {
        match &snapshot.enrichment_source {
            Some(EnrichmentSource::Fallback { reason }) => {
                let _ = writeln!(out, "Enrichment (local placeholder, {}):", reason);
            }
            _ => {
                let _ = writeln!(out, "Enrichment:");
            }
        }
        for enriched in &snapshot.last_enriched {
            write_card(&mut out, enriched);
        }
    } else if snapshot.last_detections.is_empty() {
        let _ = writeln!(out, "{}", NO_DETECTIONS_HINT);
        let _ = writeln!(out, "{}", LIGHTING_TIP);
    } else {
        let _ = writeln!(out, "{}", ENRICH_HINT);
    }
    out
}
