//! Enrichment gateway.
//!
//! A one-shot exchange with a remote service that attaches descriptive
//! metadata to the last detection snapshot. The exchange never touches the
//! detection loop, and any failure degrades to a locally synthesized
//! placeholder list so the results panel stays populated.
//!
//! Results correspond to the request by array position only. The service is
//! expected to return one entry per detection, in order; a length mismatch is
//! logged and passed through unchanged.

mod fallback;
mod http;

pub use fallback::synthesize_fallback;
pub use http::HttpEnrichmentClient;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::detect::Detection;
use crate::error::NetworkError;

/// Surface the detections were drawn on, and when the request was made.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageContext {
    pub width: u32,
    pub height: u32,
    /// RFC 3339, UTC, millisecond precision.
    pub timestamp: String,
}

impl ImageContext {
    pub fn now(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// A detection plus the service's opaque payload.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EnrichedDetection {
    #[serde(flatten)]
    pub detection: Detection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enhanced: Option<Value>,
}

impl EnrichedDetection {
    pub fn new(detection: Detection, enhanced: Option<Value>) -> Self {
        Self {
            detection,
            enhanced,
        }
    }

    /// `enhanced.detailedDescription`, when present and a string.
    pub fn description(&self) -> Option<&str> {
        self.enhanced.as_ref()?.get("detailedDescription")?.as_str()
    }

    /// `enhanced.objectInfo` entries in payload order. Non-string values are
    /// rendered as compact JSON.
    pub fn object_info(&self) -> Vec<(String, String)> {
        let Some(Value::Object(info)) = self
            .enhanced
            .as_ref()
            .and_then(|enhanced| enhanced.get("objectInfo"))
        else {
            return Vec::new();
        };
        info.iter()
            .map(|(key, value)| {
                let value = match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (key.clone(), value)
            })
            .collect()
    }
}

#[derive(Serialize)]
pub(crate) struct EnrichmentRequestBody<'a> {
    pub detections: &'a [Detection],
    #[serde(rename = "imageContext")]
    pub image_context: &'a ImageContext,
}

#[derive(Deserialize)]
pub(crate) struct EnrichmentResponseBody {
    #[serde(rename = "enhancedDetections")]
    pub enhanced_detections: Vec<EnrichedDetection>,
}

/// Remote enrichment boundary.
pub trait EnrichmentGateway: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    fn enrich(
        &self,
        detections: &[Detection],
        context: &ImageContext,
    ) -> Result<Vec<EnrichedDetection>, NetworkError>;
}

/// Gateway used when no endpoint is configured. Always falls back.
pub struct DisabledGateway;

impl EnrichmentGateway for DisabledGateway {
    fn name(&self) -> &str {
        "disabled"
    }

    fn enrich(
        &self,
        _detections: &[Detection],
        _context: &ImageContext,
    ) -> Result<Vec<EnrichedDetection>, NetworkError> {
        Err(NetworkError::NotConfigured)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EnrichmentSource {
    Remote,
    Fallback { reason: String },
}

#[derive(Clone, Debug, PartialEq)]
pub struct EnrichmentOutcome {
    pub enriched: Vec<EnrichedDetection>,
    pub source: EnrichmentSource,
}

impl EnrichmentOutcome {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, EnrichmentSource::Fallback { .. })
    }
}

/// Run the gateway; on any network error synthesize placeholders instead.
pub fn enrich_or_fallback(
    gateway: &dyn EnrichmentGateway,
    detections: &[Detection],
    context: &ImageContext,
) -> EnrichmentOutcome {
    match gateway.enrich(detections, context) {
        Ok(enriched) => {
            if enriched.len() != detections.len() {
                log::warn!(
                    "Enrichment: {} returned {} entries for {} detections",
                    gateway.name(),
                    enriched.len(),
                    detections.len()
                );
            }
            log::info!(
                "Enrichment: {} enriched {} detection(s)",
                gateway.name(),
                enriched.len()
            );
            EnrichmentOutcome {
                enriched,
                source: EnrichmentSource::Remote,
            }
        }
        Err(err) => {
            match err {
                NetworkError::NotConfigured => {
                    log::debug!("Enrichment: no endpoint configured, using local fallback")
                }
                ref other => log::warn!(
                    "Enrichment: {} failed ({}), using local fallback",
                    gateway.name(),
                    other
                ),
            }
            EnrichmentOutcome {
                enriched: synthesize_fallback(detections),
                source: EnrichmentSource::Fallback {
                    reason: err.to_string(),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;
    use serde_json::json;

    fn cup() -> Detection {
        Detection::new("cup", 0.82, BoundingBox::new(10.0, 20.0, 50.0, 60.0))
    }

    #[test]
    fn request_body_shape() {
        let detections = vec![cup()];
        let context = ImageContext {
            width: 640,
            height: 480,
            timestamp: "2024-05-01T12:00:00.000Z".into(),
        };
        let body = serde_json::to_value(EnrichmentRequestBody {
            detections: &detections,
            image_context: &context,
        })
        .unwrap();
        assert_eq!(body["detections"][0]["class"], "cup");
        assert_eq!(body["imageContext"]["width"], 640);
        assert_eq!(body["imageContext"]["timestamp"], "2024-05-01T12:00:00.000Z");
    }

    #[test]
    fn timestamp_is_utc_rfc3339() {
        let context = ImageContext::now(1, 1);
        assert!(context.timestamp.ends_with('Z'));
        assert!(chrono::DateTime::parse_from_rfc3339(&context.timestamp).is_ok());
    }

    #[test]
    fn enriched_detection_flattens_detection_fields() {
        let payload = json!({
            "class": "cup",
            "score": 0.82,
            "bbox": [10.0, 20.0, 50.0, 60.0],
            "enhanced": {
                "detailedDescription": "A ceramic mug.",
                "objectInfo": { "purpose": "Holding drinks", "typicalPrice": 8 }
            }
        });
        let enriched: EnrichedDetection = serde_json::from_value(payload).unwrap();
        assert_eq!(enriched.detection, cup());
        assert_eq!(enriched.description(), Some("A ceramic mug."));
        assert_eq!(
            enriched.object_info(),
            vec![
                ("purpose".to_string(), "Holding drinks".to_string()),
                ("typicalPrice".to_string(), "8".to_string()),
            ]
        );
    }

    #[test]
    fn enriched_scores_are_clamped() {
        let payload = json!({ "class": "cup", "score": -3.0, "bbox": [0, 0, 1, 1] });
        let enriched: EnrichedDetection = serde_json::from_value(payload).unwrap();
        assert_eq!(enriched.detection.confidence_score(), 0.0);
        assert!(enriched.enhanced.is_none());
    }

    #[test]
    fn disabled_gateway_falls_back() {
        let detections = vec![cup(), cup()];
        let outcome =
            enrich_or_fallback(&DisabledGateway, &detections, &ImageContext::now(640, 480));
        assert!(outcome.is_fallback());
        assert_eq!(outcome.enriched.len(), 2);
    }
}
