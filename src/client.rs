//! HTTP client for the detection service.
//!
//! One request goes to the primary endpoint. A 404 there means an older
//! server, so the polygon alone is posted once to the legacy endpoint. Every
//! other failure is returned to the caller as is. There is no retry or
//! backoff beyond that single fallback.

use anyhow::{anyhow, Context, Result};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::io::Read;
use std::time::Duration;
use url::Url;

use crate::capture::decode_data_uri;
use crate::config::ServiceSettings;
use crate::geo::Coordinate;

const MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Request body: `{ "polygon": [{lat, lng}, ...], "screenshot": "data:..." }`.
#[derive(Debug, Serialize)]
pub struct DetectionRequest<'a> {
    pub polygon: &'a [Coordinate],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<&'a str>,
}

/// Response body as sent by the service.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DetectionResponse {
    #[serde(default)]
    detected_areas: Option<Vec<Value>>,
    /// Absolute or root-relative URL of a rendered satellite image.
    #[serde(default)]
    pub satellite_url: Option<String>,
}

impl DetectionResponse {
    pub fn new(detected_areas: Vec<Value>, satellite_url: Option<String>) -> Self {
        Self {
            detected_areas: Some(detected_areas),
            satellite_url,
        }
    }

    /// Raw detection records. Empty is a valid result, not an error.
    pub fn records(&self) -> &[Value] {
        self.detected_areas.as_deref().unwrap_or(&[])
    }

    pub fn from_json(raw: &str) -> Result<Self, DetectError> {
        serde_json::from_str(raw).map_err(|e| DetectError::Decode(e.to_string()))
    }
}

/// Which endpoint produced a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoint {
    Primary,
    Fallback,
}

#[derive(Clone, Debug)]
pub struct DetectionReply {
    pub response: DetectionResponse,
    pub endpoint: Endpoint,
}

#[derive(Debug, thiserror::Error)]
pub enum DetectError {
    /// Both the primary and the legacy endpoint answered 404.
    #[error("detection endpoint not found (tried {primary} and {fallback})")]
    NotFound { primary: String, fallback: String },

    /// A single resource outside the detect pair answered 404.
    #[error("{url} not found (404)")]
    ResourceNotFound { url: String },

    #[error("detection endpoint does not allow POST (405)")]
    MethodNotAllowed,

    #[error("detection service returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("network error: {0}")]
    Transport(String),

    #[error("invalid detection response: {0}")]
    Decode(String),
}

impl DetectError {
    /// Text shown to the user.
    pub fn user_message(&self) -> String {
        match self {
            DetectError::NotFound { .. } => {
                "Detection service not found. Check that the server is running and exposes the detect endpoint.".to_string()
            }
            DetectError::ResourceNotFound { url } => {
                format!("The detection service has nothing at {}.", url)
            }
            DetectError::MethodNotAllowed => {
                "The detection service refused the request method (405 Method Not Allowed).".to_string()
            }
            DetectError::Status { status, .. } => {
                format!("Detection failed: the service returned status {}.", status)
            }
            DetectError::Transport(_) => {
                "Network error: could not reach the detection service.".to_string()
            }
            DetectError::Decode(_) => {
                "The detection service returned a response that could not be read.".to_string()
            }
        }
    }
}

/// Seam between the pipeline and the remote service.
pub trait DetectionService {
    /// Submit the polygon (and optional snapshot data URI).
    fn detect(
        &self,
        polygon: &[Coordinate],
        screenshot: Option<&str>,
    ) -> Result<DetectionReply, DetectError>;

    /// Load the image a response refers to via `satellite_url`.
    fn load_image(&self, reference: &str) -> Result<RgbaImage>;
}

pub struct DetectionClient {
    agent: ureq::Agent,
    base_url: Url,
    primary_path: String,
    fallback_path: String,
}

impl DetectionClient {
    pub fn new(settings: &ServiceSettings) -> Result<Self> {
        let base_url = Url::parse(&settings.base_url)
            .with_context(|| format!("parse service url '{}'", settings.base_url))?;
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = settings.timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            agent: builder.build(),
            base_url,
            primary_path: settings.primary_path.clone(),
            fallback_path: settings.fallback_path.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `GET /` and return the service banner.
    pub fn ping(&self) -> Result<String, DetectError> {
        let response = self
            .agent
            .get(self.base_url.as_str())
            .set("Accept", "application/json")
            .call()
            .map_err(|err| self.map_error(err))?;
        let body = response
            .into_string()
            .map_err(|e| DetectError::Decode(e.to_string()))?;
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string));
        Ok(message.unwrap_or(body))
    }

    /// Resolve a `satellite_url` against the service base URL.
    pub fn resolve_url(&self, reference: &str) -> Result<Url> {
        match Url::parse(reference) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => self
                .base_url
                .join(reference)
                .with_context(|| format!("join '{}' onto {}", reference, self.base_url)),
            Err(err) => Err(anyhow!("invalid image url '{}': {}", reference, err)),
        }
    }

    fn endpoint(&self, path: &str) -> Result<Url, DetectError> {
        self.base_url
            .join(path)
            .map_err(|e| DetectError::Transport(format!("invalid endpoint '{}': {}", path, e)))
    }

    fn post_json(&self, url: &Url, body: &str, accept_json: bool) -> Result<ureq::Response, ureq::Error> {
        let mut request = self
            .agent
            .post(url.as_str())
            .set("Content-Type", "application/json");
        if accept_json {
            request = request.set("Accept", "application/json");
        }
        request.send_string(body)
    }

    fn map_error(&self, err: ureq::Error) -> DetectError {
        match err {
            ureq::Error::Status(404, response) => DetectError::ResourceNotFound {
                url: response.get_url().to_string(),
            },
            ureq::Error::Status(405, _) => DetectError::MethodNotAllowed,
            ureq::Error::Status(status, response) => {
                let body: String = response
                    .into_string()
                    .unwrap_or_default()
                    .chars()
                    .take(MAX_ERROR_BODY_CHARS)
                    .collect();
                DetectError::Status { status, body }
            }
            ureq::Error::Transport(transport) => DetectError::Transport(transport.to_string()),
        }
    }
}

impl DetectionService for DetectionClient {
    fn detect(
        &self,
        polygon: &[Coordinate],
        screenshot: Option<&str>,
    ) -> Result<DetectionReply, DetectError> {
        let primary = self.endpoint(&self.primary_path)?;
        let body = serde_json::to_string(&DetectionRequest { polygon, screenshot })
            .map_err(|e| DetectError::Decode(e.to_string()))?;
        log::info!(
            "POST {} ({} vertices, screenshot: {})",
            primary,
            polygon.len(),
            screenshot.is_some()
        );

        let (response, endpoint) = match self.post_json(&primary, &body, true) {
            Ok(response) => (response, Endpoint::Primary),
            Err(ureq::Error::Status(404, _)) => {
                let fallback = self.endpoint(&self.fallback_path)?;
                log::warn!("{} returned 404; retrying once at {}", primary, fallback);
                let body = serde_json::to_string(&DetectionRequest {
                    polygon,
                    screenshot: None,
                })
                .map_err(|e| DetectError::Decode(e.to_string()))?;
                match self.post_json(&fallback, &body, false) {
                    Ok(response) => (response, Endpoint::Fallback),
                    Err(ureq::Error::Status(404, _)) => {
                        return Err(DetectError::NotFound {
                            primary: primary.to_string(),
                            fallback: fallback.to_string(),
                        })
                    }
                    Err(err) => return Err(self.map_error(err)),
                }
            }
            Err(err) => return Err(self.map_error(err)),
        };

        let raw = response
            .into_string()
            .map_err(|e| DetectError::Decode(e.to_string()))?;
        let response = DetectionResponse::from_json(&raw)?;
        log::info!(
            "detection service returned {} records via {:?} endpoint",
            response.records().len(),
            endpoint
        );
        Ok(DetectionReply { response, endpoint })
    }

    fn load_image(&self, reference: &str) -> Result<RgbaImage> {
        if reference.starts_with("data:") {
            return decode_data_uri(reference);
        }
        let url = self.resolve_url(reference)?;
        let response = self
            .agent
            .get(url.as_str())
            .call()
            .with_context(|| format!("fetch image from {}", url))?;
        let mut bytes = Vec::new();
        response
            .into_reader()
            .take(MAX_IMAGE_BYTES)
            .read_to_end(&mut bytes)
            .context("read image body")?;
        if bytes.is_empty() {
            return Err(anyhow!("empty image body from {}", url));
        }
        let image = image::load_from_memory(&bytes).context("decode image")?;
        Ok(image.into_rgba8())
    }
}

/// Bound for `ServiceSettings::timeout`; zero means unbounded.
pub fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn client(base: &str) -> DetectionClient {
        DetectionClient::new(&ServiceSettings {
            base_url: base.to_string(),
            ..ServiceSettings::default()
        })
        .expect("client")
    }

    #[test]
    fn request_omits_missing_screenshot() -> Result<()> {
        let polygon = [Coordinate { lat: 1.0, lng: 2.0 }];
        let body = serde_json::to_value(DetectionRequest {
            polygon: &polygon,
            screenshot: None,
        })?;
        assert_eq!(body, json!({"polygon": [{"lat": 1.0, "lng": 2.0}]}));
        let body = serde_json::to_value(DetectionRequest {
            polygon: &polygon,
            screenshot: Some("data:image/png;base64,AA=="),
        })?;
        assert_eq!(body["screenshot"], "data:image/png;base64,AA==");
        Ok(())
    }

    #[test]
    fn response_tolerates_missing_and_null_detections() {
        let response = DetectionResponse::from_json("{}").expect("empty object");
        assert!(response.records().is_empty());
        let response =
            DetectionResponse::from_json(r#"{"detected_areas": null}"#).expect("null list");
        assert!(response.records().is_empty());
        assert!(DetectionResponse::from_json("not json").is_err());
    }

    #[test]
    fn resolves_root_relative_and_absolute_urls() -> Result<()> {
        let client = client("http://127.0.0.1:8000");
        assert_eq!(
            client.resolve_url("/img/x.png")?.as_str(),
            "http://127.0.0.1:8000/img/x.png"
        );
        assert_eq!(
            client.resolve_url("https://tiles.example.org/a.png")?.as_str(),
            "https://tiles.example.org/a.png"
        );
        Ok(())
    }

    #[test]
    fn user_messages_distinguish_failure_kinds() {
        let not_found = DetectError::NotFound {
            primary: "a".into(),
            fallback: "b".into(),
        };
        assert!(not_found.user_message().contains("not found"));
        assert!(DetectError::MethodNotAllowed.user_message().contains("405"));
        assert!(DetectError::Transport("refused".into())
            .user_message()
            .contains("Network error"));
    }

    #[test]
    fn zero_timeout_is_unbounded() {
        assert_eq!(timeout_from_secs(0), None);
        assert_eq!(timeout_from_secs(5), Some(Duration::from_secs(5)));
    }
}
