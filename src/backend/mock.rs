//! Mock backend for testing
//!
//! Answers without touching the network. Used by unit tests, and selectable
//! as `llm.provider = "mock"` for offline demos and CLI tests.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;

use crate::error::{Error, Result};

use super::{ChatBackend, ChatReply, ChatRequest, Role, TokenUsage};

// ─────────────────────────────────────────────────────────────────
// Mock Backend Configuration
// ─────────────────────────────────────────────────────────────────

/// Configuration for mock backend behavior
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Simulated round-trip latency (ms)
    pub latency_ms: u64,

    /// Fixed response text (for deterministic testing)
    pub fixed_response: Option<String>,

    /// Fail every call
    pub fail_all: bool,

    /// Fail calls whose prompt mentions this text (e.g. one persona's name)
    pub fail_when_prompt_contains: Option<String>,
}

// ─────────────────────────────────────────────────────────────────
// Mock Backend
// ─────────────────────────────────────────────────────────────────

/// Mock implementation of ChatBackend for testing
pub struct MockBackend {
    config: MockConfig,
    requests: RwLock<Vec<ChatRequest>>,
}

impl MockBackend {
    /// Create a new mock backend with default configuration
    pub fn new() -> Self {
        Self::with_config(MockConfig::default())
    }

    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            requests: RwLock::new(Vec::new()),
        }
    }

    /// Always answer with `text`
    pub fn fixed(text: impl Into<String>) -> Self {
        Self::with_config(MockConfig {
            fixed_response: Some(text.into()),
            ..Default::default()
        })
    }

    /// Number of completed or failed calls
    pub fn call_count(&self) -> usize {
        self.requests.read().len()
    }

    /// Every request received, in call order
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.read().clone()
    }

    fn should_fail(&self, request: &ChatRequest) -> bool {
        if self.config.fail_all {
            return true;
        }
        match self.config.fail_when_prompt_contains {
            Some(ref needle) => request.messages.iter().any(|m| m.content.contains(needle)),
            None => false,
        }
    }

    /// Generate mock response text
    fn generate_response(&self, request: &ChatRequest) -> String {
        if let Some(ref fixed) = self.config.fixed_response {
            return fixed.clone();
        }

        let speaker = speaker_name(request).unwrap_or("Persona");
        let question = request.last_user_content().unwrap_or_default();
        format!("{} would say: {}", speaker, question)
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Pull the persona name out of an intro of the form "You are NAME, ...".
fn speaker_name(request: &ChatRequest) -> Option<&str> {
    request
        .messages
        .iter()
        .filter(|m| m.role == Role::User)
        .find_map(|m| m.content.strip_prefix("You are "))
        .and_then(|rest| rest.split(',').next())
        .map(str::trim)
        .filter(|name| !name.is_empty())
}

fn rough_tokens(text: &str) -> u32 {
    (text.split_whitespace().count() * 4 / 3) as u32
}

#[async_trait]
impl ChatBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, request: ChatRequest) -> Result<ChatReply> {
        self.requests.write().push(request.clone());

        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        if self.should_fail(&request) {
            return Err(Error::UpstreamApi {
                status: 500,
                message: "Mock chat completion failure".to_string(),
            });
        }

        let text = self.generate_response(&request).trim().to_string();
        if text.is_empty() {
            return Err(Error::malformed("Empty message content in mock response"));
        }
        let prompt_tokens = request
            .messages
            .iter()
            .map(|m| rough_tokens(&m.content))
            .sum();

        Ok(ChatReply {
            usage: Some(TokenUsage::new(prompt_tokens, rough_tokens(&text))),
            text,
        })
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
