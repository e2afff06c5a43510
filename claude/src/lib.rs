//! Minimal Anthropic Claude API client.
//!
//! Text-only, non-streaming completions against the Messages API: a
//! conversation goes in, one block of text comes out. Rate-limit and
//! overload responses are retried with exponential backoff.

use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com/v1";
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const API_VERSION: &str = "2023-06-01";

#[derive(Debug, Error)]
pub enum Error {
    #[error("ANTHROPIC_API_KEY is not set")]
    NoApiKey,

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status} ({kind}): {message}")]
    Api {
        status: u16,
        kind: String,
        message: String,
    },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(&'static str),
}

impl Error {
    /// Worth another attempt: rate limits, overload and server errors.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api { status, .. } => *status == 429 || *status == 529 || *status >= 500,
            Error::Network(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }
}

/// Claude API client.
#[derive(Clone)]
pub struct Claude {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    max_retries: u32,
}

impl std::fmt::Debug for Claude {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Claude")
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("max_retries", &self.max_retries)
            .finish_non_exhaustive()
    }
}

impl Claude {
    pub fn new(api_key: impl Into<String>) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();

        Self {
            http,
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            max_retries: 2,
        }
    }

    /// Client keyed by `ANTHROPIC_API_KEY`. A blank key counts as missing.
    pub fn from_env() -> Result<Self, Error> {
        match std::env::var("ANTHROPIC_API_KEY") {
            Ok(key) if !key.trim().is_empty() => Ok(Self::new(key.trim())),
            _ => Err(Error::NoApiKey),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Point at a proxy or compatible endpoint. Trailing slashes are ignored.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send a completion request, retrying transient failures.
    pub async fn complete(&self, request: Request) -> Result<Response, Error> {
        request.validate()?;
        let body = WireRequest::new(&request, &self.model);

        let mut attempt = 0;
        loop {
            match self.send(&body).await {
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(error = %e, attempt, ?delay, "Retrying Claude request");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    async fn send(&self, body: &WireRequest<'_>) -> Result<Response, Error> {
        let response = self
            .http
            .post(format!("{}/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        let bytes = response.bytes().await?;
        if !status.is_success() {
            return Err(api_error(status, &bytes));
        }

        let wire: WireResponse =
            serde_json::from_slice(&bytes).map_err(|e| Error::Parse(e.to_string()))?;
        let response = Response::from(wire);
        debug!(
            id = %response.id,
            stop_reason = ?response.stop_reason,
            output_tokens = response.usage.output_tokens,
            "Claude response"
        );
        Ok(response)
    }
}

/// Error bodies look like `{"type":"error","error":{"type":..,"message":..}}`.
fn api_error(status: StatusCode, body: &[u8]) -> Error {
    #[derive(Deserialize)]
    struct Envelope {
        error: Detail,
    }
    #[derive(Deserialize)]
    struct Detail {
        #[serde(rename = "type")]
        kind: String,
        message: String,
    }

    match serde_json::from_slice::<Envelope>(body) {
        Ok(envelope) => Error::Api {
            status: status.as_u16(),
            kind: envelope.error.kind,
            message: envelope.error.message,
        },
        Err(_) => Error::Api {
            status: status.as_u16(),
            kind: "unknown".to_string(),
            message: String::from_utf8_lossy(body).into_owned(),
        },
    }
}

// ============================================================================
// Public types
// ============================================================================

/// A completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    pub model: Option<String>,
    pub max_tokens: usize,
    pub system: Option<String>,
    pub messages: Vec<Message>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
}

impl Request {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            model: None,
            max_tokens: 2048,
            system: None,
            messages,
            temperature: None,
            top_p: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// The API rejects empty conversations and ones opening with the
    /// assistant; catch both before the round trip.
    pub fn validate(&self) -> Result<(), Error> {
        match self.messages.first() {
            None => Err(Error::InvalidRequest("conversation is empty")),
            Some(m) if m.role != Role::User => {
                Err(Error::InvalidRequest("conversation must start with a user message"))
            }
            Some(_) if self.max_tokens == 0 => Err(Error::InvalidRequest("max_tokens must be positive")),
            Some(_) => Ok(()),
        }
    }
}

/// One turn of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub text: String,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub id: String,
    pub model: String,
    /// All text blocks joined together.
    pub text: String,
    pub stop_reason: StopReason,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    EndTurn,
    MaxTokens,
    StopSequence,
    Other,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct Usage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Serialize)]
struct WireRequest<'a> {
    model: &'a str,
    max_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
}

impl<'a> WireRequest<'a> {
    fn new(request: &'a Request, default_model: &'a str) -> Self {
        Self {
            model: request.model.as_deref().unwrap_or(default_model),
            max_tokens: request.max_tokens,
            system: request.system.as_deref(),
            messages: request
                .messages
                .iter()
                .map(|m| WireMessage {
                    role: m.role,
                    content: &m.text,
                })
                .collect(),
            temperature: request.temperature,
            top_p: request.top_p,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    id: String,
    model: String,
    content: Vec<WireBlock>,
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Ignored,
}

impl From<WireResponse> for Response {
    fn from(wire: WireResponse) -> Self {
        let text = wire
            .content
            .into_iter()
            .filter_map(|block| match block {
                WireBlock::Text { text } => Some(text),
                WireBlock::Ignored => None,
            })
            .collect();

        let stop_reason = match wire.stop_reason.as_deref() {
            Some("end_turn") | None => StopReason::EndTurn,
            Some("max_tokens") => StopReason::MaxTokens,
            Some("stop_sequence") => StopReason::StopSequence,
            Some(_) => StopReason::Other,
        };

        Response {
            id: wire.id,
            model: wire.model,
            text,
            stop_reason,
            usage: wire.usage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_builders() {
        let client = Claude::new("test-key")
            .with_model("claude-3-opus")
            .with_base_url("http://localhost:8080/v1/")
            .with_max_retries(0);
        assert_eq!(client.model(), "claude-3-opus");
        assert_eq!(client.base_url, "http://localhost:8080/v1");
        assert!(!format!("{client:?}").contains("test-key"));
    }

    #[test]
    fn test_request_validation() {
        assert!(matches!(
            Request::new(Vec::new()).validate(),
            Err(Error::InvalidRequest(_))
        ));
        assert!(matches!(
            Request::new(vec![Message::assistant("Hi")]).validate(),
            Err(Error::InvalidRequest(_))
        ));
        assert!(matches!(
            Request::new(vec![Message::user("Hi")]).with_max_tokens(0).validate(),
            Err(Error::InvalidRequest(_))
        ));
        assert!(Request::new(vec![Message::user("Hi")]).validate().is_ok());
    }

    #[test]
    fn test_wire_request_shape() {
        let request = Request::new(vec![Message::user("Hi"), Message::assistant("Hello")])
            .with_max_tokens(512)
            .with_top_p(0.9);
        let json = serde_json::to_value(WireRequest::new(&request, DEFAULT_MODEL)).unwrap();

        assert_eq!(json["model"], DEFAULT_MODEL);
        assert_eq!(json["max_tokens"], 512);
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["messages"][1]["role"], "assistant");
        assert_eq!(json["messages"][1]["content"], "Hello");
        assert!(json.get("system").is_none());
        assert!(json.get("temperature").is_none());
    }

    #[test]
    fn test_response_joins_text_blocks() {
        let raw = r#"{
            "id": "msg_1",
            "model": "m",
            "content": [
                {"type": "text", "text": "The door "},
                {"type": "thinking", "thinking": "hmm"},
                {"type": "text", "text": "creaks open."}
            ],
            "stop_reason": "max_tokens",
            "usage": {"input_tokens": 3, "output_tokens": 4}
        }"#;
        let response = Response::from(serde_json::from_str::<WireResponse>(raw).unwrap());

        assert_eq!(response.text, "The door creaks open.");
        assert_eq!(response.stop_reason, StopReason::MaxTokens);
        assert_eq!(response.usage.output_tokens, 4);
    }

    #[test]
    fn test_api_error_parsing() {
        let body = br#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let err = api_error(StatusCode::from_u16(529).unwrap(), body);
        assert!(matches!(&err, Error::Api { kind, .. } if kind == "overloaded_error"));
        assert!(err.is_retryable());

        let err = api_error(StatusCode::BAD_REQUEST, b"not json");
        assert!(matches!(&err, Error::Api { status: 400, kind, .. } if kind == "unknown"));
        assert!(!err.is_retryable());
    }
}
