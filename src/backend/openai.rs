//! OpenAI-compatible chat completion backend
//!
//! Implements ChatBackend by POSTing to `{base_url}/chat/completions` on any
//! OpenAI-compatible endpoint (OpenAI, Ollama, vLLM, LM Studio, etc.).
//! Exactly one request per call: failures surface immediately.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LlmSettings;
use crate::error::{Error, Result};

use super::{ChatBackend, ChatMessage, ChatReply, ChatRequest, TokenUsage};

/// Longest slice of a raw error body echoed back to the user
const MAX_ERROR_BODY: usize = 300;

// ─────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────

/// Connection settings for an OpenAI-compatible endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API base URL (e.g., "https://api.openai.com/v1", "http://localhost:11434/v1")
    pub base_url: String,

    /// API key (empty string for local servers like Ollama)
    pub api_key: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            timeout_secs: 120,
        }
    }
}

impl From<&LlmSettings> for OpenAiConfig {
    fn from(settings: &LlmSettings) -> Self {
        Self {
            base_url: settings.base_url.clone(),
            api_key: settings.api_key.clone(),
            timeout_secs: settings.timeout_secs,
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// OpenAI API types (request/response)
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

// ─────────────────────────────────────────────────────────────────
// OpenAI Backend
// ─────────────────────────────────────────────────────────────────

/// OpenAI-compatible chat completion client
pub struct OpenAiBackend {
    config: OpenAiConfig,
    client: Client,
    total_requests: RwLock<u64>,
    total_tokens: RwLock<u64>,
}

impl OpenAiBackend {
    /// Create a new OpenAI backend with the given configuration
    pub fn new(config: OpenAiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        info!(base_url = %config.base_url, "OpenAI-compatible backend created");

        Ok(Self {
            config,
            client,
            total_requests: RwLock::new(0),
            total_tokens: RwLock::new(0),
        })
    }

    /// Full chat completions URL
    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    /// Build the authorization header value (if API key is set)
    fn auth_header(&self) -> Option<String> {
        if self.config.api_key.is_empty() {
            None
        } else {
            Some(format!("Bearer {}", self.config.api_key))
        }
    }

    /// Successful requests and tokens consumed so far
    pub fn usage_totals(&self) -> (u64, u64) {
        (*self.total_requests.read(), *self.total_tokens.read())
    }

    fn map_send_error(&self, url: &str, e: reqwest::Error) -> Error {
        if e.is_timeout() {
            Error::UpstreamTimeout {
                url: url.to_string(),
                timeout_secs: self.config.timeout_secs,
            }
        } else {
            Error::UpstreamConnection {
                url: url.to_string(),
                message: e.to_string(),
            }
        }
    }

    fn parse_reply(&self, body: &str) -> Result<ChatReply> {
        let parsed: ChatCompletionResponse = serde_json::from_str(body)
            .map_err(|e| Error::malformed(format!("Failed to parse API response: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::malformed("No choices in API response"))?;

        let text = choice.message.content.unwrap_or_default().trim().to_string();
        if text.is_empty() {
            return Err(Error::malformed("Empty message content in API response"));
        }

        let usage = parsed.usage.map(|u| {
            *self.total_tokens.write() += u64::from(u.prompt_tokens + u.completion_tokens);
            TokenUsage::new(u.prompt_tokens, u.completion_tokens)
        });
        *self.total_requests.write() += 1;

        Ok(ChatReply { text, usage })
    }
}

/// Map a non-success status and its body to an upstream error.
fn status_error(status: StatusCode, body: &str) -> Error {
    let message = error_message(status, body);
    match status.as_u16() {
        401 | 403 => Error::UpstreamAuthentication { message },
        429 => Error::UpstreamQuota { message },
        code => Error::UpstreamApi {
            status: code,
            message,
        },
    }
}

/// Prefer the provider's `error.message`, then the raw body, then the reason phrase.
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(envelope) = serde_json::from_str::<ApiErrorEnvelope>(body) {
        return envelope.error.message;
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string();
    }

    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

#[async_trait]
impl ChatBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatReply> {
        let url = self.endpoint();
        let body = ChatCompletionRequest {
            model: &request.model,
            messages: &request.messages,
        };

        let start = Instant::now();
        let mut req = self.client.post(&url).json(&body);
        if let Some(ref auth) = self.auth_header() {
            req = req.header("Authorization", auth);
        }

        let response = req.send().await.map_err(|e| self.map_send_error(&url, e))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.map_send_error(&url, e))?;

        debug!(
            status = %status,
            model = %request.model,
            messages = request.messages.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Chat completion response received"
        );

        if !status.is_success() {
            let err = status_error(status, &text);
            warn!(status = %status, error = %err, "Chat completion failed");
            return Err(err);
        }

        let reply = self.parse_reply(&text)?;
        let (requests, tokens) = self.usage_totals();
        debug!(requests, tokens, "Cumulative chat usage");
        Ok(reply)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::Mutex;

    /// What the fake endpoint saw
    #[derive(Debug, Default)]
    struct Captured {
        head: String,
        body: String,
    }

    /// Serve one canned HTTP response and record the request.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, Arc<Mutex<Captured>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let captured = Arc::new(Mutex::new(Captured::default()));
        let sink = captured.clone();

        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 4096];

            let header_end = loop {
                let n = stream.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                    break pos + 4;
                }
            };

            let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
            let content_length = head
                .lines()
                .find_map(|line| {
                    let lower = line.to_ascii_lowercase();
                    lower
                        .strip_prefix("content-length:")
                        .map(|v| v.trim().parse::<usize>().unwrap())
                })
                .unwrap_or(0);

            while buf.len() < header_end + content_length {
                let n = stream.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
            }

            {
                let mut c = sink.lock().await;
                c.head = head;
                c.body = String::from_utf8_lossy(&buf[header_end..]).to_string();
            }

            let response = format!(
                "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status_line,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            stream.shutdown().await.ok();
        });

        (format!("http://{}/v1", addr), captured)
    }

    fn backend(base_url: &str, api_key: &str) -> OpenAiBackend {
        OpenAiBackend::new(OpenAiConfig {
            base_url: base_url.to_string(),
            api_key: api_key.to_string(),
            timeout_secs: 5,
        })
        .unwrap()
    }

    fn request() -> ChatRequest {
        ChatRequest::new(
            "o3",
            vec![
                ChatMessage::system("You are simulating an investor."),
                ChatMessage::user("What do you invest in?"),
            ],
        )
    }

    #[test]
    fn test_default_config() {
        let config = OpenAiConfig::default();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
        assert!(config.api_key.is_empty());
        assert_eq!(config.timeout_secs, 120);
    }

    #[test]
    fn test_backend_name() {
        let backend = OpenAiBackend::new(OpenAiConfig::default()).unwrap();
        assert_eq!(backend.name(), "openai");
    }

    #[test]
    fn test_auth_header() {
        let config = OpenAiConfig {
            api_key: "sk-test-123".to_string(),
            ..Default::default()
        };
        let backend = OpenAiBackend::new(config).unwrap();
        assert_eq!(backend.auth_header(), Some("Bearer sk-test-123".to_string()));

        let no_key = OpenAiBackend::new(OpenAiConfig::default()).unwrap();
        assert_eq!(no_key.auth_header(), None);
    }

    #[test]
    fn test_endpoint_trailing_slash() {
        let backend = backend("http://localhost:11434/v1/", "");
        assert_eq!(backend.endpoint(), "http://localhost:11434/v1/chat/completions");
    }

    #[test]
    fn test_error_message_sources() {
        let json = r#"{"error": {"message": "Incorrect API key provided", "type": "invalid_request_error"}}"#;
        assert_eq!(
            error_message(StatusCode::UNAUTHORIZED, json),
            "Incorrect API key provided"
        );
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, "upstream down"), "upstream down");
        assert_eq!(error_message(StatusCode::BAD_GATEWAY, ""), "Bad Gateway");

        let long = "x".repeat(1000);
        assert!(error_message(StatusCode::BAD_REQUEST, &long).ends_with("..."));
    }

    #[test]
    fn test_status_error_mapping() {
        assert!(matches!(
            status_error(StatusCode::UNAUTHORIZED, ""),
            Error::UpstreamAuthentication { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::FORBIDDEN, ""),
            Error::UpstreamAuthentication { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::TOO_MANY_REQUESTS, ""),
            Error::UpstreamQuota { .. }
        ));
        assert!(matches!(
            status_error(StatusCode::INTERNAL_SERVER_ERROR, ""),
            Error::UpstreamApi { status: 500, .. }
        ));
    }

    #[tokio::test]
    async fn test_complete_success() {
        let (url, captured) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"choices": [{"message": {"role": "assistant", "content": "  Index funds, mostly.\n"}}],
                "usage": {"prompt_tokens": 20, "completion_tokens": 5, "total_tokens": 25}}"#,
        )
        .await;

        let backend = backend(&url, "sk-test");
        let reply = backend.complete(request()).await.unwrap();
        assert_eq!(reply.text, "Index funds, mostly.");
        assert_eq!(reply.usage, Some(TokenUsage::new(20, 5)));
        assert_eq!(backend.usage_totals(), (1, 25));

        let seen = captured.lock().await;
        assert!(seen.head.starts_with("POST /v1/chat/completions"));
        assert!(seen
            .head
            .to_ascii_lowercase()
            .contains("authorization: bearer sk-test"));

        let sent: serde_json::Value = serde_json::from_str(&seen.body).unwrap();
        assert_eq!(sent["model"], "o3");
        assert_eq!(sent["messages"][0]["role"], "system");
        assert_eq!(sent["messages"][1]["content"], "What do you invest in?");
    }

    #[tokio::test]
    async fn test_complete_without_key_sends_no_auth() {
        let (url, captured) = serve_once(
            "HTTP/1.1 200 OK",
            r#"{"choices": [{"message": {"content": "ok"}}]}"#,
        )
        .await;

        let reply = backend(&url, "").complete(request()).await.unwrap();
        assert_eq!(reply.text, "ok");
        assert_eq!(reply.usage, None);
        assert!(!captured
            .lock()
            .await
            .head
            .to_ascii_lowercase()
            .contains("authorization"));
    }

    #[tokio::test]
    async fn test_complete_auth_failure() {
        let (url, _) = serve_once(
            "HTTP/1.1 401 Unauthorized",
            r#"{"error": {"message": "Incorrect API key provided"}}"#,
        )
        .await;

        let err = backend(&url, "bad").complete(request()).await.unwrap_err();
        match err {
            Error::UpstreamAuthentication { message } => {
                assert_eq!(message, "Incorrect API key provided")
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_complete_quota_failure() {
        let (url, _) = serve_once(
            "HTTP/1.1 429 Too Many Requests",
            r#"{"error": {"message": "You exceeded your current quota"}}"#,
        )
        .await;

        let err = backend(&url, "k").complete(request()).await.unwrap_err();
        assert!(matches!(err, Error::UpstreamQuota { .. }));
        assert!(err.is_upstream());
    }

    #[tokio::test]
    async fn test_complete_empty_choices_is_malformed() {
        let (url, _) = serve_once("HTTP/1.1 200 OK", r#"{"choices": []}"#).await;

        let err = backend(&url, "k").complete(request()).await.unwrap_err();
        assert!(matches!(err, Error::UpstreamMalformed { .. }));
    }

    #[tokio::test]
    async fn test_complete_non_json_is_malformed() {
        let (url, _) = serve_once("HTTP/1.1 200 OK", "<html>gateway</html>").await;

        let err = backend(&url, "k").complete(request()).await.unwrap_err();
        assert!(matches!(err, Error::UpstreamMalformed { .. }));
    }

    #[tokio::test]
    async fn test_complete_connection_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = backend(&format!("http://{}/v1", addr), "k")
            .complete(request())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::UpstreamConnection { .. }));
    }

    #[tokio::test]
    async fn test_complete_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let backend = OpenAiBackend::new(OpenAiConfig {
            base_url: format!("http://{}/v1", addr),
            api_key: String::new(),
            timeout_secs: 1,
        })
        .unwrap();

        let err = backend.complete(request()).await.unwrap_err();
        assert!(matches!(err, Error::UpstreamTimeout { timeout_secs: 1, .. }));
    }
}
