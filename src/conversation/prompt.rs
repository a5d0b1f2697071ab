//! Prompt construction: persona intro plus a bounded slice of prior turns.

use crate::backend::ChatMessage;
use crate::persona::Persona;

use super::history::Exchange;

/// First-person framing sent ahead of every question for this persona.
pub fn persona_intro(persona: &Persona) -> String {
    format!(
        "You are {}, a {}-year-old {} from {}. Your values: {}. Respond as this individual.",
        persona.name,
        persona.age,
        persona.occupation,
        persona.location,
        persona.values.join(", ")
    )
}

/// Assemble the ordered message list.
///
/// Layout: system instruction, intro as a user turn, the last `window`
/// exchanges oldest first as user/assistant pairs, then the new question.
pub fn build_messages(
    system_prompt: &str,
    intro: &str,
    history: &[Exchange],
    window: usize,
    question: &str,
) -> Vec<ChatMessage> {
    let recent = &history[history.len().saturating_sub(window)..];

    let mut messages = Vec::with_capacity(3 + recent.len() * 2);
    messages.push(ChatMessage::system(system_prompt));
    messages.push(ChatMessage::user(intro));
    for exchange in recent {
        messages.push(ChatMessage::user(&exchange.question));
        messages.push(ChatMessage::assistant(&exchange.answer));
    }
    messages.push(ChatMessage::user(question));
    messages
}
