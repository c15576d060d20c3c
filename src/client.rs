//! Webhook exchange and image fetching.
//!
//! One conversation turn is a single POST to the configured endpoint: a
//! fixed action tag, the session id, the user text, and an empty metadata
//! object. The caller never observes a failure; every exchange yields a
//! reply string, with failures substituted by a fixed error reply. The
//! substitution is tagged so tests can tell the two apart.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SessionId;

/// Reply used when the backend answers without an `output` field.
pub const NOT_UNDERSTOOD_REPLY: &str = "Sorry, I couldn't understand that.";

/// Reply substituted for any failed exchange.
pub const ERROR_REPLY: &str = "Sorry, there was an error processing your request.";

/// Per-request deadline for webhook calls and image fetches.
const REQUEST_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(30);

/// Error type for a single webhook exchange.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP error: status {0}")]
    Status(reqwest::StatusCode),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// The webhook seam, stubbed in tests.
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Exchange one user message for the backend's reply text.
    async fn send(&self, session: &SessionId, text: &str) -> Result<String, ClientError>;
}

/// Request body of one turn.
#[derive(Debug, Serialize)]
struct WebhookRequest<'a> {
    action: &'static str,
    #[serde(rename = "sessionId")]
    session_id: &'a str,
    #[serde(rename = "chatInput")]
    chat_input: &'a str,
    metadata: serde_json::Value,
}

/// Response body of one turn. Anything else the backend sends is ignored.
#[derive(Debug, Deserialize)]
struct WebhookReply {
    #[serde(default)]
    output: Option<String>,
}

/// Map the backend's `output` field to the reply text. Absent and empty
/// both read as "did not understand".
fn reply_from_output(output: Option<String>) -> String {
    output
        .filter(|reply| !reply.is_empty())
        .unwrap_or_else(|| NOT_UNDERSTOOD_REPLY.to_string())
}

/// reqwest-backed transport against the configured webhook endpoint.
pub struct WebhookClient {
    http: reqwest::Client,
    endpoint: String,
}

impl WebhookClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[async_trait]
impl ChatTransport for WebhookClient {
    async fn send(&self, session: &SessionId, text: &str) -> Result<String, ClientError> {
        let payload = WebhookRequest {
            action: "sendMessage",
            session_id: session.as_str(),
            chat_input: text,
            metadata: serde_json::json!({}),
        };

        let response = self
            .http
            .post(&self.endpoint)
            .timeout(REQUEST_TIMEOUT)
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ClientError::Status(response.status()));
        }

        let reply: WebhookReply = response.json().await?;
        Ok(reply_from_output(reply.output))
    }
}

/// Outcome of one send. Both variants render identically; the tag exists so
/// tests can distinguish a real reply from the substituted error reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplyOutcome {
    /// The backend answered (possibly with the not-understood reply).
    Answer(String),
    /// The exchange failed and the fixed error reply stands in.
    Fallback(String),
}

impl ReplyOutcome {
    pub fn text(&self) -> &str {
        match self {
            Self::Answer(text) | Self::Fallback(text) => text,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Answer(text) | Self::Fallback(text) => text,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Self::Fallback(_))
    }
}

/// The widget-facing send path. Never fails; a failed exchange is logged
/// and replaced by the fixed error reply.
pub async fn request_reply(
    transport: &dyn ChatTransport,
    session: &SessionId,
    text: &str,
) -> ReplyOutcome {
    match transport.send(session, text).await {
        Ok(reply) => ReplyOutcome::Answer(reply),
        Err(err) => {
            tracing::warn!(error = %err, "message exchange failed, substituting the error reply");
            ReplyOutcome::Fallback(ERROR_REPLY.to_string())
        }
    }
}

/// Pixel size of a fetched image, for the transcript's image cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageDimensions {
    pub width: u32,
    pub height: u32,
}

/// Error type for one image fetch.
#[derive(Debug, Error)]
pub enum ImageFetchError {
    #[error("HTTP error: status {0}")]
    Status(reqwest::StatusCode),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Decode failed: {0}")]
    Decode(#[from] image::ImageError),
}

/// The image-loading seam, stubbed in tests.
#[async_trait]
pub trait ImageFetcher: Send + Sync {
    /// Fetch and decode one image, yielding its dimensions.
    async fn fetch(&self, url: &str) -> Result<ImageDimensions, ImageFetchError>;
}

/// reqwest-backed fetcher that decodes the body to prove the URL really is
/// an image.
#[derive(Default)]
pub struct HttpImageFetcher {
    http: reqwest::Client,
}

impl HttpImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ImageFetcher for HttpImageFetcher {
    async fn fetch(&self, url: &str) -> Result<ImageDimensions, ImageFetchError> {
        let response = self.http.get(url).timeout(REQUEST_TIMEOUT).send().await?;

        if !response.status().is_success() {
            return Err(ImageFetchError::Status(response.status()));
        }

        let bytes = response.bytes().await?;
        let decoded = image::load_from_memory(&bytes)?;
        Ok(ImageDimensions {
            width: decoded.width(),
            height: decoded.height(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct ScriptedTransport {
        reply: Result<&'static str, u16>,
    }

    #[async_trait]
    impl ChatTransport for ScriptedTransport {
        async fn send(&self, _session: &SessionId, _text: &str) -> Result<String, ClientError> {
            match self.reply {
                Ok(reply) => Ok(reply.to_string()),
                Err(status) => Err(ClientError::Status(
                    reqwest::StatusCode::from_u16(status).unwrap(),
                )),
            }
        }
    }

    fn test_session() -> SessionId {
        let store = crate::session::MemorySessionStore::new();
        SessionId::acquire(&store)
    }

    // ==========================================================================
    // Wire format tests
    // ==========================================================================

    #[test]
    fn test_request_body_shape() {
        let payload = WebhookRequest {
            action: "sendMessage",
            session_id: "sid-1",
            chat_input: "hello",
            metadata: serde_json::json!({}),
        };
        let value = serde_json::to_value(&payload).unwrap();

        assert_eq!(
            value,
            serde_json::json!({
                "action": "sendMessage",
                "sessionId": "sid-1",
                "chatInput": "hello",
                "metadata": {},
            })
        );
    }

    #[test]
    fn test_reply_body_with_output() {
        let reply: WebhookReply = serde_json::from_str(r#"{"output":"hi there"}"#).unwrap();
        assert_eq!(reply.output.as_deref(), Some("hi there"));
    }

    #[test]
    fn test_reply_body_without_output() {
        let reply: WebhookReply = serde_json::from_str("{}").unwrap();
        assert!(reply.output.is_none());
    }

    #[test]
    fn test_reply_body_ignores_extra_fields() {
        let reply: WebhookReply =
            serde_json::from_str(r#"{"output":"ok","intermediateSteps":[1,2]}"#).unwrap();
        assert_eq!(reply.output.as_deref(), Some("ok"));
    }

    // ==========================================================================
    // Output mapping tests
    // ==========================================================================

    #[test]
    fn test_output_present() {
        assert_eq!(reply_from_output(Some("answer".into())), "answer");
    }

    #[test]
    fn test_output_absent_reads_as_not_understood() {
        assert_eq!(reply_from_output(None), NOT_UNDERSTOOD_REPLY);
    }

    #[test]
    fn test_output_empty_reads_as_not_understood() {
        assert_eq!(reply_from_output(Some(String::new())), NOT_UNDERSTOOD_REPLY);
    }

    // ==========================================================================
    // Outcome tests
    // ==========================================================================

    #[test]
    fn test_request_reply_tags_answers() {
        let transport = ScriptedTransport { reply: Ok("hello") };
        let outcome = tokio_test::block_on(request_reply(&transport, &test_session(), "hi"));

        assert_eq!(outcome, ReplyOutcome::Answer("hello".to_string()));
        assert!(!outcome.is_fallback());
        assert_eq!(outcome.text(), "hello");
    }

    #[test]
    fn test_request_reply_substitutes_error_reply() {
        let transport = ScriptedTransport { reply: Err(500) };
        let outcome = tokio_test::block_on(request_reply(&transport, &test_session(), "hi"));

        assert!(outcome.is_fallback());
        assert_eq!(outcome.text(), ERROR_REPLY);
    }

    #[test]
    fn test_outcome_into_text() {
        assert_eq!(ReplyOutcome::Answer("a".into()).into_text(), "a");
        assert_eq!(ReplyOutcome::Fallback("b".into()).into_text(), "b");
    }

    #[test]
    fn test_client_error_display_carries_status() {
        let err = ClientError::Status(reqwest::StatusCode::BAD_GATEWAY);
        assert!(err.to_string().contains("502"));
    }
}
