use std::io::Read;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use url::Url;

use super::{
    EnrichedDetection, EnrichmentGateway, EnrichmentRequestBody, EnrichmentResponseBody,
    ImageContext,
};
use crate::detect::Detection;
use crate::error::NetworkError;

/// Response bodies larger than this are rejected.
const MAX_RESPONSE_BYTES: u64 = 4 * 1024 * 1024;

/// JSON-over-HTTP enrichment client.
pub struct HttpEnrichmentClient {
    endpoint: Url,
    agent: ureq::Agent,
}

impl HttpEnrichmentClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self> {
        let endpoint =
            Url::parse(endpoint).with_context(|| format!("parse enrichment url {}", endpoint))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(anyhow!(
                "enrichment url must be http or https, got {}",
                endpoint.scheme()
            ));
        }
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Ok(Self { endpoint, agent })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl EnrichmentGateway for HttpEnrichmentClient {
    fn name(&self) -> &str {
        self.endpoint.as_str()
    }

    fn enrich(
        &self,
        detections: &[Detection],
        context: &ImageContext,
    ) -> Result<Vec<EnrichedDetection>, NetworkError> {
        let body = serde_json::to_string(&EnrichmentRequestBody {
            detections,
            image_context: context,
        })
        .map_err(|err| NetworkError::InvalidBody(format!("encode request: {}", err)))?;

        let response = match self
            .agent
            .post(self.endpoint.as_str())
            .set("Content-Type", "application/json")
            .send_string(&body)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => return Err(NetworkError::Status(code)),
            Err(ureq::Error::Transport(transport)) => {
                return Err(NetworkError::Transport(transport.to_string()))
            }
        };
        let status = response.status();
        if !(200..300).contains(&status) {
            return Err(NetworkError::Status(status));
        }

        let mut text = String::new();
        response
            .into_reader()
            .take(MAX_RESPONSE_BYTES)
            .read_to_string(&mut text)
            .map_err(|err| NetworkError::Transport(format!("read response: {}", err)))?;
        let parsed: EnrichmentResponseBody = serde_json::from_str(&text)
            .map_err(|err| NetworkError::InvalidBody(err.to_string()))?;
        Ok(parsed.enhanced_detections)
    }
}
