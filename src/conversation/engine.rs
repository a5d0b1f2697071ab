//! Conversation engine: turns a question for a persona into one chat call,
//! recording the exchange only when the call succeeds.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::backend::{ChatBackend, ChatRequest};
use crate::config::{ConversationSettings, LlmSettings};
use crate::error::{Error, Result};
use crate::persona::{PersonaEntry, PersonaKey, PersonaStore};

use super::history::Exchange;
use super::prompt::{build_messages, persona_intro};
use super::session::Session;

// ─────────────────────────────────────────────────────────────────
// Ask-all policy
// ─────────────────────────────────────────────────────────────────

/// What "ask all" does once a persona's call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AskAllPolicy {
    /// Keep asking the remaining personas and report every failure
    #[default]
    Continue,
    /// Stop at the first failure; later personas are not asked
    Abort,
}

impl fmt::Display for AskAllPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AskAllPolicy::Continue => write!(f, "continue"),
            AskAllPolicy::Abort => write!(f, "abort"),
        }
    }
}

impl FromStr for AskAllPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "continue" => Ok(AskAllPolicy::Continue),
            "abort" => Ok(AskAllPolicy::Abort),
            _ => Err(format!("Unknown ask-all policy '{}'. Valid: continue, abort", s)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Ask-all report
// ─────────────────────────────────────────────────────────────────

/// Result of asking one persona during an "ask all".
#[derive(Debug)]
pub struct AskOutcome {
    pub persona: PersonaKey,
    pub result: Result<String>,
}

/// Per-persona results of an "ask all", in the order personas were asked.
#[derive(Debug, Default)]
pub struct AskAllReport {
    pub outcomes: Vec<AskOutcome>,

    /// Personas left unasked after an abort
    pub skipped: Vec<PersonaKey>,
}

impl AskAllReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn aborted(&self) -> bool {
        !self.skipped.is_empty()
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed() == 0 && !self.aborted()
    }
}

// ─────────────────────────────────────────────────────────────────
// Engine
// ─────────────────────────────────────────────────────────────────

/// Stateless apart from settings; all conversation state lives in the Session.
pub struct ConversationEngine {
    backend: Arc<dyn ChatBackend>,
    model: String,
    system_prompt: String,
    history_window: usize,
    policy: AskAllPolicy,
}

impl ConversationEngine {
    pub fn new(
        backend: Arc<dyn ChatBackend>,
        llm: &LlmSettings,
        conversation: &ConversationSettings,
    ) -> Self {
        Self {
            backend,
            model: llm.model.clone(),
            system_prompt: llm.system_prompt.clone(),
            history_window: conversation.history_window,
            policy: conversation.ask_all_policy,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Ask one persona. History grows only on success.
    pub async fn respond(
        &self,
        session: &mut Session,
        entry: PersonaEntry<'_>,
        question: &str,
    ) -> Result<String> {
        let question = validate_question(question)?;
        self.respond_unchecked(session, entry, question).await
    }

    async fn respond_unchecked(
        &self,
        session: &mut Session,
        entry: PersonaEntry<'_>,
        question: &str,
    ) -> Result<String> {
        let key = entry.key();
        let intro = persona_intro(entry.persona);
        let messages = build_messages(
            &self.system_prompt,
            &intro,
            session.history.for_persona(&key),
            self.history_window,
            question,
        );

        debug!(
            persona = %key,
            messages = messages.len(),
            model = %self.model,
            "Sending question"
        );

        let start = Instant::now();
        let reply = self
            .backend
            .complete(ChatRequest::new(&self.model, messages))
            .await
            .map_err(|e| {
                warn!(persona = %key, error = %e.format_for_log(), "Persona did not answer");
                e
            })?;

        info!(
            persona = %key,
            elapsed_ms = start.elapsed().as_millis() as u64,
            tokens = reply.usage.map(|u| u.total()),
            "Persona answered"
        );

        session
            .history
            .append(key, Exchange::new(question, reply.text.clone()));
        Ok(reply.text)
    }

    /// Ask the session's selected persona.
    pub async fn respond_selected(
        &self,
        session: &mut Session,
        store: &PersonaStore,
        question: &str,
    ) -> Result<String> {
        let question = validate_question(question)?;
        let key = session.selected.clone().ok_or(Error::NoPersonaSelected)?;
        let entry = store
            .get(&key)
            .ok_or_else(|| Error::persona_not_found(key.to_string()))?;
        self.respond_unchecked(session, entry, question).await
    }

    /// Ask each persona in turn, sequentially, following the configured policy.
    ///
    /// An empty question fails up front without asking anyone.
    pub async fn ask_all(
        &self,
        session: &mut Session,
        entries: &[PersonaEntry<'_>],
        question: &str,
    ) -> Result<AskAllReport> {
        let question = validate_question(question)?;
        let mut report = AskAllReport::default();

        info!(personas = entries.len(), policy = %self.policy, "Asking all personas");

        for (index, entry) in entries.iter().enumerate() {
            let result = self.respond_unchecked(session, *entry, question).await;
            let failed = result.is_err();
            report.outcomes.push(AskOutcome {
                persona: entry.key(),
                result,
            });

            if failed && self.policy == AskAllPolicy::Abort {
                report.skipped = entries[index + 1..].iter().map(PersonaEntry::key).collect();
                warn!(skipped = report.skipped.len(), "Ask all aborted after failure");
                break;
            }
        }

        Ok(report)
    }
}

fn validate_question(question: &str) -> Result<&str> {
    let trimmed = question.trim();
    if trimmed.is_empty() {
        Err(Error::EmptyQuestion)
    } else {
        Ok(trimmed)
    }
}
