use std::sync::LazyLock;
use std::time::Duration;

use harvest_logging::{engine_debug, engine_warn};
use harvester_core::{ItemMatch, Record};
use regex::Regex;
use reqwest::header::RETRY_AFTER;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::links::{SearchLinkBuilder, DEFAULT_SEARCH_BASE};
use crate::parse::{parse_item_matches, ParseError};
use crate::payload::{ImagePayload, PayloadSource};
use crate::prompt::{build_instructions, CallMode};
use crate::retry::{CallFailure, RetryError, RetryPolicy};
use crate::types::PreferenceHints;

const MAX_ERROR_MESSAGE: usize = 300;

static RETRY_IN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)retry in ([0-9]+(?:\.[0-9]+)?)\s*(ms|s)\b").expect("constant input is valid")
});
static RETRY_DELAY_FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""retryDelay"\s*:\s*"([0-9]+(?:\.[0-9]+)?)s""#).expect("constant input is valid")
});

#[derive(Debug, Clone, PartialEq)]
pub struct InferenceSettings {
    /// Base URL of the generative API, without the `/models/...` suffix.
    pub endpoint: String,
    pub model: String,
    pub request_timeout: Duration,
    pub temperature: f32,
    pub mode: CallMode,
    pub retry: RetryPolicy,
    /// Retailer search used for locally built links.
    pub search_base: String,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            model: "gemini-2.0-flash".to_string(),
            request_timeout: Duration::from_secs(60),
            temperature: 0.2,
            mode: CallMode::default(),
            retry: RetryPolicy::default(),
            search_base: DEFAULT_SEARCH_BASE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnrichError {
    #[error("credential rejected by the inference service (status {status})")]
    Unauthorized { status: u16 },
    #[error("still rate limited after {attempts} attempts")]
    RateLimited { attempts: u32 },
    #[error("inference service returned status {status}: {message}")]
    Service { status: u16, message: String },
    #[error("transport failure: {0}")]
    Transport(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("invalid client configuration: {0}")]
    Config(String),
}

/// Identifies items in a prepared image.
#[async_trait::async_trait]
pub trait Enricher: Send + Sync {
    /// Whether calls go to the rate-limited remote service; selects the pacing interval.
    fn uses_remote_service(&self) -> bool {
        true
    }

    async fn identify(
        &self,
        payload: &ImagePayload,
        credential: &str,
        hints: &PreferenceHints,
    ) -> Result<Vec<ItemMatch>, EnrichError>;
}

/// Client for a `generateContent`-style multimodal endpoint.
#[derive(Debug, Clone)]
pub struct InferenceClient {
    http: reqwest::Client,
    url: Url,
    links: SearchLinkBuilder,
    settings: InferenceSettings,
}

impl InferenceClient {
    pub fn new(settings: InferenceSettings) -> Result<Self, EnrichError> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| EnrichError::Config(err.to_string()))?;
        let links = SearchLinkBuilder::new(&settings.search_base)
            .map_err(|err| EnrichError::Config(format!("search base: {err}")))?;
        let url = Url::parse(&format!(
            "{}/models/{}:generateContent",
            settings.endpoint.trim_end_matches('/'),
            settings.model
        ))
        .map_err(|err| EnrichError::Config(format!("endpoint: {err}")))?;
        Ok(Self {
            http,
            url,
            links,
            settings,
        })
    }

    /// Fetches, normalizes and identifies one record's image.
    ///
    /// Every failure collapses to `None`, the same as "no match".
    pub async fn enrich(
        &self,
        payloads: &dyn PayloadSource,
        record: &Record,
        credential: &str,
        hints: &PreferenceHints,
    ) -> Option<Vec<ItemMatch>> {
        match enrich_record(payloads, self, record, credential, hints).await {
            EnrichStep::Matched(matches) => Some(matches),
            EnrichStep::Unmatched => None,
            EnrichStep::Skipped(reason) => {
                engine_warn!("Payload unavailable for {}: {}", record.media_url, reason);
                None
            }
            EnrichStep::Rejected { status } => {
                engine_warn!("Credential rejected for {} (status {})", record.link, status);
                None
            }
            EnrichStep::Failed(reason) => {
                engine_warn!("Enrichment failed for {}: {}", record.link, reason);
                None
            }
        }
    }

    async fn attempt(&self, body: &GenerateRequest<'_>, credential: &str) -> Result<String, CallFailure> {
        // The URL carries the credential; it is never logged.
        let mut url = self.url.clone();
        url.query_pairs_mut().append_pair("key", credential);
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| CallFailure::Transport(err.without_url().to_string()))?;

        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs);
        let text = response
            .text()
            .await
            .map_err(|err| CallFailure::Transport(err.without_url().to_string()))?;

        if status.is_success() {
            return Ok(candidate_text(&text));
        }

        let message = error_message(&text);
        if status == StatusCode::TOO_MANY_REQUESTS {
            let advised = advised_delay(&message)
                .or_else(|| advised_delay(&text))
                .or(retry_after);
            return Err(CallFailure::RateLimited { advised, message });
        }
        Err(CallFailure::Terminal {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait::async_trait]
impl Enricher for InferenceClient {
    async fn identify(
        &self,
        payload: &ImagePayload,
        credential: &str,
        hints: &PreferenceHints,
    ) -> Result<Vec<ItemMatch>, EnrichError> {
        let instructions = build_instructions(self.settings.mode, hints, self.links.base());
        let body = GenerateRequest::new(&instructions, payload, self.settings.temperature);

        let text = self
            .settings
            .retry
            .run("inference", |_| self.attempt(&body, credential))
            .await
            .map_err(map_retry_error)?;
        engine_debug!("Inference response: {} chars", text.len());

        Ok(parse_item_matches(&text, &self.links, hints)?)
    }
}

/// Classified result of enriching one record.
#[derive(Debug, Clone, PartialEq)]
pub enum EnrichStep {
    Matched(Vec<ItemMatch>),
    /// Empty answer or no structured payload.
    Unmatched,
    /// The image could not be prepared; no call was made.
    Skipped(String),
    Rejected { status: u16 },
    Failed(String),
}

/// Prepares the record's image and asks `enricher` to identify it.
pub async fn enrich_record(
    payloads: &dyn PayloadSource,
    enricher: &dyn Enricher,
    record: &Record,
    credential: &str,
    hints: &PreferenceHints,
) -> EnrichStep {
    let payload = match payloads.prepare(&record.media_url).await {
        Ok(payload) => payload,
        Err(err) => return EnrichStep::Skipped(err.to_string()),
    };
    match enricher.identify(&payload, credential, hints).await {
        Ok(matches) if matches.is_empty() => EnrichStep::Unmatched,
        Ok(matches) => EnrichStep::Matched(matches),
        Err(EnrichError::Parse(err)) => {
            engine_debug!("No items for {}: {}", record.link, err);
            EnrichStep::Unmatched
        }
        Err(EnrichError::Unauthorized { status }) => EnrichStep::Rejected { status },
        Err(err) => EnrichStep::Failed(err.to_string()),
    }
}

fn map_retry_error(err: RetryError) -> EnrichError {
    match err {
        RetryError::Exhausted {
            attempts,
            last: CallFailure::RateLimited { .. },
        } => EnrichError::RateLimited { attempts },
        RetryError::Exhausted {
            last: CallFailure::Transport(message),
            ..
        } => EnrichError::Transport(message),
        RetryError::Exhausted {
            last: CallFailure::Terminal { status, message },
            ..
        }
        | RetryError::Terminal(CallFailure::Terminal { status, message }) => {
            if is_credential_rejection(status, &message) {
                EnrichError::Unauthorized { status }
            } else {
                EnrichError::Service { status, message }
            }
        }
        RetryError::Terminal(CallFailure::RateLimited { message, .. }) => EnrichError::Service {
            status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
            message,
        },
        RetryError::Terminal(CallFailure::Transport(message)) => EnrichError::Transport(message),
    }
}

fn is_credential_rejection(status: u16, message: &str) -> bool {
    match status {
        401 | 403 => true,
        400 => message.to_ascii_lowercase().contains("api key"),
        _ => false,
    }
}

/// Reads the service's own "retry in 12.3s" or `"retryDelay": "12s"` advice.
pub fn advised_delay(text: &str) -> Option<Duration> {
    if let Some(caps) = RETRY_IN.captures(text) {
        let value: f64 = caps[1].parse().ok()?;
        let seconds = if caps[2].eq_ignore_ascii_case("ms") {
            value / 1000.0
        } else {
            value
        };
        return Duration::try_from_secs_f64(seconds).ok();
    }
    let caps = RETRY_DELAY_FIELD.captures(text)?;
    let seconds: f64 = caps[1].parse().ok()?;
    Duration::try_from_secs_f64(seconds).ok()
}

fn candidate_text(body: &str) -> String {
    match serde_json::from_str::<GenerateResponse>(body) {
        Ok(response) => response
            .candidates
            .into_iter()
            .filter_map(|candidate| candidate.content)
            .flat_map(|content| content.parts)
            .filter_map(|part| part.text)
            .collect::<Vec<_>>()
            .join("\n"),
        // Proxies sometimes hand back the model text unwrapped.
        Err(_) => body.to_string(),
    }
}

fn error_message(body: &str) -> String {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|envelope| {
            if envelope.error.status.is_empty() {
                envelope.error.message
            } else {
                format!("{}: {}", envelope.error.status, envelope.error.message)
            }
        })
        .unwrap_or_else(|_| body.trim().to_string());
    truncate_to_char_boundary(&message, MAX_ERROR_MESSAGE).to_string()
}

fn truncate_to_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

impl<'a> GenerateRequest<'a> {
    fn new(instructions: &'a str, payload: &'a ImagePayload, temperature: f32) -> Self {
        Self {
            contents: vec![RequestContent {
                parts: vec![
                    RequestPart::Text { text: instructions },
                    RequestPart::Image {
                        inline_data: InlineData {
                            mime_type: payload.mime_type,
                            data: payload.to_base64(),
                        },
                    },
                ],
            }],
            generation_config: GenerationConfig { temperature },
        }
    }
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text { text: &'a str },
    Image { inline_data: InlineData<'a> },
}

#[derive(Debug, Serialize)]
struct InlineData<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advised_delay_reads_message_and_field_forms() {
        assert_eq!(
            advised_delay("Quota exceeded. Please retry in 12.5s."),
            Some(Duration::from_millis(12_500))
        );
        assert_eq!(
            advised_delay("Please retry in 250ms"),
            Some(Duration::from_millis(250))
        );
        assert_eq!(
            advised_delay(r#"{"details":[{"retryDelay": "7s"}]}"#),
            Some(Duration::from_secs(7))
        );
        assert_eq!(advised_delay("Resource exhausted"), None);
    }

    #[test]
    fn candidate_text_joins_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"[{\"item\":"},{"text":"\"Linen shirt\"}]"}]}}]}"#;
        assert_eq!(candidate_text(body), "[{\"item\":\n\"Linen shirt\"}]");
    }

    #[test]
    fn credential_rejection_detection() {
        assert!(is_credential_rejection(403, "PERMISSION_DENIED"));
        assert!(is_credential_rejection(
            400,
            "INVALID_ARGUMENT: API key not valid. Please pass a valid API key."
        ));
        assert!(!is_credential_rejection(400, "INVALID_ARGUMENT: bad image"));
        assert!(!is_credential_rejection(500, "API key"));
    }

    #[test]
    fn request_body_shape() {
        let payload = ImagePayload {
            mime_type: "image/jpeg",
            bytes: vec![0xff, 0xd8, 0xff],
            width: 1,
            height: 1,
        };
        let body = GenerateRequest::new("find items", &payload, 0.2);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "find items");
        assert_eq!(
            json["contents"][0]["parts"][1]["inline_data"]["mime_type"],
            "image/jpeg"
        );
        assert_eq!(json["contents"][0]["parts"][1]["inline_data"]["data"], "/9j/");
    }
}
