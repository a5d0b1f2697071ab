//! Interactive chat loop.
//!
//! Reads one line at a time. Lines starting with `/` are commands; any other
//! non-empty line is a question for the selected persona, or for every
//! filtered persona when ask-all is on.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info};

use crate::conversation::{ConversationEngine, Session};
use crate::error::{Error, Result};
use crate::persona::{PersonaStore, SegmentFilter};
use crate::render;

const HELP: &str = "\
Commands:
  /help               Show this help
  /segments           List segments with their overviews
  /segment <label>    Filter by segment (or 'all')
  /personas           List personas in the current filter
  /select <name>      Pick the persona to talk to
  /profile            Show the selected persona's profile
  /suggest [n]        Ask the selected persona's suggested question n (default 1)
  /all on|off         Send questions to every persona in the filter
  /history            Show the conversation so far
  /quit               Print the transcript and exit
Anything else is sent as a question.
";

// ─────────────────────────────────────────────────────────────────
// Command parsing
// ─────────────────────────────────────────────────────────────────

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Help,
    Segments,
    Segment(String),
    Personas,
    Select(String),
    Profile,
    Suggest(usize),
    AskAll(bool),
    History,
    Quit,
    Ask(String),
    Empty,
}

impl ChatCommand {
    /// Parse a line; `Err` carries a usage message.
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(ChatCommand::Empty);
        }
        let Some(rest) = line.strip_prefix('/') else {
            return Ok(ChatCommand::Ask(line.to_string()));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };

        match name.to_lowercase().as_str() {
            "help" | "h" | "?" => Ok(ChatCommand::Help),
            "segments" => Ok(ChatCommand::Segments),
            "segment" if !arg.is_empty() => Ok(ChatCommand::Segment(arg.to_string())),
            "segment" => Err("Usage: /segment <label|all>".to_string()),
            "personas" | "list" => Ok(ChatCommand::Personas),
            "select" if !arg.is_empty() => Ok(ChatCommand::Select(arg.to_string())),
            "select" => Err("Usage: /select <name>".to_string()),
            "profile" => Ok(ChatCommand::Profile),
            "suggest" if arg.is_empty() => Ok(ChatCommand::Suggest(1)),
            "suggest" => match arg.parse::<usize>() {
                Ok(n) if n > 0 => Ok(ChatCommand::Suggest(n)),
                _ => Err("Usage: /suggest [n] where n starts at 1".to_string()),
            },
            "all" => match arg.to_lowercase().as_str() {
                "on" => Ok(ChatCommand::AskAll(true)),
                "off" => Ok(ChatCommand::AskAll(false)),
                _ => Err("Usage: /all on|off".to_string()),
            },
            "history" => Ok(ChatCommand::History),
            "quit" | "exit" | "q" => Ok(ChatCommand::Quit),
            other => Err(format!("Unknown command '/{}'. Type /help for commands.", other)),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Chat loop
// ─────────────────────────────────────────────────────────────────

/// Drive a session until `/quit` or end of input, then print the transcript.
pub async fn run_chat<R, W>(
    store: &PersonaStore,
    engine: &ConversationEngine,
    session: &mut Session,
    input: R,
    out: &mut W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    info!(session = %session.id, filter = %session.filter, "Chat session started");
    writeln!(
        out,
        "Persona Portal: {} personas in {} segments (backend: {}). Type /help for commands.",
        store.persona_count(),
        store.list_segments().len(),
        engine.backend_name()
    )?;

    let mut lines = input.lines();
    loop {
        write!(out, "> ")?;
        out.flush()?;

        let Some(line) = lines.next_line().await? else {
            writeln!(out)?;
            break;
        };

        let command = match ChatCommand::parse(&line) {
            Ok(command) => command,
            Err(usage) => {
                writeln!(out, "{}", usage)?;
                continue;
            }
        };
        debug!(?command, "Chat command");

        if command == ChatCommand::Quit {
            break;
        }
        match handle(store, engine, session, command, out).await {
            Ok(()) => {}
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => write_error(out, &e)?,
        }
    }

    writeln!(out, "{}", render::transcript(&session.history))?;
    info!(
        session = %session.id,
        personas = session.history.persona_count(),
        exchanges = session.history.exchange_count(),
        duration_secs = session.elapsed().num_seconds(),
        "Chat session ended"
    );
    Ok(())
}

async fn handle<W: Write>(
    store: &PersonaStore,
    engine: &ConversationEngine,
    session: &mut Session,
    command: ChatCommand,
    out: &mut W,
) -> Result<()> {
    match command {
        ChatCommand::Empty | ChatCommand::Quit => {}
        ChatCommand::Help => write!(out, "{}", HELP)?,
        ChatCommand::Segments => write!(out, "{}", render::segment_list(store))?,
        ChatCommand::Segment(label) => {
            let filter = store.resolve_filter(&label)?;
            session.set_filter(filter);
            writeln!(out, "Segment filter: {}", session.filter)?;
            match session.filter {
                SegmentFilter::Named(ref label) => {
                    if let Some(summary) = store.summary(label) {
                        writeln!(out, "{}", summary)?;
                    }
                }
                SegmentFilter::All => write!(out, "{}", render::segment_list(store))?,
            }
        }
        ChatCommand::Personas => {
            write!(out, "{}", render::persona_grid(&store.filter(&session.filter)))?
        }
        ChatCommand::Select(name) => {
            let entry = store.find(&name, &session.filter)?;
            session.select(entry.key());
            write!(out, "{}", render::profile_card(entry))?;
        }
        ChatCommand::Profile => {
            let key = session.selected.as_ref().ok_or(Error::NoPersonaSelected)?;
            let entry = store
                .get(key)
                .ok_or_else(|| Error::persona_not_found(key.to_string()))?;
            write!(out, "{}", render::profile_card(entry))?;
        }
        ChatCommand::Suggest(n) => {
            let key = session.selected.clone().ok_or(Error::NoPersonaSelected)?;
            let entry = store
                .get(&key)
                .ok_or_else(|| Error::persona_not_found(key.to_string()))?;
            match entry.persona.suggestions.get(n - 1) {
                Some(question) => {
                    writeln!(out, "You: {}", question)?;
                    let answer = engine.respond(session, entry, question).await?;
                    write!(out, "{}", render::answer(&key.name, &answer))?;
                }
                None => writeln!(
                    out,
                    "{} has {} suggested questions.",
                    key.name,
                    entry.persona.suggestions.len()
                )?,
            }
        }
        ChatCommand::AskAll(on) => {
            session.ask_all = on;
            writeln!(out, "Ask all: {}", if on { "on" } else { "off" })?;
        }
        ChatCommand::History => write!(out, "{}", render::transcript(&session.history))?,
        ChatCommand::Ask(question) => {
            if session.ask_all {
                let entries = store.filter(&session.filter);
                if entries.is_empty() {
                    writeln!(out, "No personas match this segment.")?;
                    return Ok(());
                }
                let report = engine.ask_all(session, &entries, &question).await?;
                write!(out, "{}", render::ask_all_report(&report))?;
            } else {
                let answer = engine.respond_selected(session, store, &question).await?;
                let name = session
                    .selected
                    .as_ref()
                    .map(|k| k.name.as_str())
                    .unwrap_or_default();
                write!(out, "{}", render::answer(name, &answer))?;
            }
        }
    }
    Ok(())
}

fn write_error<W: Write>(out: &mut W, e: &Error) -> Result<()> {
    writeln!(out, "Error: {}", e)?;
    if let Some(hint) = e.suggestion() {
        writeln!(out, "Hint: {}", hint)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::backend::mock::MockConfig;
    use crate::backend::MockBackend;
    use crate::config::{ConversationSettings, LlmSettings};
    use crate::persona::PersonaKey;

    const PERSONAS: &str = r#"[
        {"segment": "Next Gen",
         "male": {"name": "Liam", "age": 21, "location": "Brisbane", "occupation": "Student",
                  "suggestions": ["Is crypto a good idea?"]},
         "female": {"name": "Zoe", "age": 23, "location": "Melbourne", "occupation": "Barista"}},
        {"segment": "Retirees (65+ years)",
         "male": {"name": "Sam", "age": 70, "location": "Hobart", "occupation": "Retired teacher"}}
    ]"#;

    async fn run(script: &str, backend: MockBackend) -> (String, Session) {
        let store = PersonaStore::from_json(PERSONAS).unwrap();
        let engine = ConversationEngine::new(
            Arc::new(backend),
            &LlmSettings::default(),
            &ConversationSettings::default(),
        );
        let mut session = Session::new();
        let mut out = Vec::new();

        run_chat(&store, &engine, &mut session, script.as_bytes(), &mut out)
            .await
            .unwrap();
        (String::from_utf8(out).unwrap(), session)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(ChatCommand::parse("  "), Ok(ChatCommand::Empty));
        assert_eq!(
            ChatCommand::parse("What's your plan?"),
            Ok(ChatCommand::Ask("What's your plan?".into()))
        );
        assert_eq!(
            ChatCommand::parse("/segment Retirees (65+ years)"),
            Ok(ChatCommand::Segment("Retirees (65+ years)".into()))
        );
        assert_eq!(ChatCommand::parse("/suggest"), Ok(ChatCommand::Suggest(1)));
        assert_eq!(ChatCommand::parse("/suggest 3"), Ok(ChatCommand::Suggest(3)));
        assert_eq!(ChatCommand::parse("/ALL on"), Ok(ChatCommand::AskAll(true)));
        assert_eq!(ChatCommand::parse("/quit"), Ok(ChatCommand::Quit));
    }

    #[test]
    fn test_parse_usage_errors() {
        assert!(ChatCommand::parse("/select").is_err());
        assert!(ChatCommand::parse("/suggest 0").is_err());
        assert!(ChatCommand::parse("/all maybe").is_err());
        assert!(ChatCommand::parse("/dance").unwrap_err().contains("/dance"));
    }

    #[tokio::test]
    async fn test_question_without_selection() {
        let (out, session) = run("Hello?\n/quit\n", MockBackend::new()).await;
        assert!(out.contains("Error: Please select a persona"));
        assert!(session.history.is_empty());
    }

    #[tokio::test]
    async fn test_select_and_ask() {
        let (out, session) = run("/select zoe\nWhat do you save for?\n", MockBackend::new()).await;

        assert!(out.contains("Zoe (Next Gen)"));
        assert!(out.contains("Zoe: Zoe would say: What do you save for?"));
        assert_eq!(
            session.selected,
            Some(PersonaKey::new("Next Gen", "Zoe"))
        );
        // transcript printed at end of input
        assert!(out.contains("#### Zoe (Next Gen)"));
    }

    #[tokio::test]
    async fn test_suggest_asks_suggestion() {
        let (out, session) = run("/select Liam\n/suggest\n/quit\n", MockBackend::new()).await;
        assert!(out.contains("You: Is crypto a good idea?"));
        assert_eq!(session.history.exchange_count(), 1);
    }

    #[tokio::test]
    async fn test_ask_all_within_segment() {
        let script = "/segment next gen\n/all on\nShares or property?\n/quit\n";
        let (out, session) = run(script, MockBackend::new()).await;

        assert_eq!(session.filter, SegmentFilter::Named("Next Gen".into()));
        assert!(out.contains("Liam: Liam would say: Shares or property?"));
        assert!(out.contains("Zoe: Zoe would say: Shares or property?"));
        assert!(!out.contains("Sam would say"));
        assert_eq!(session.history.exchange_count(), 2);
    }

    #[tokio::test]
    async fn test_failed_answer_reported() {
        let backend = MockBackend::with_config(MockConfig {
            fail_all: true,
            ..Default::default()
        });
        let (out, session) = run("/select Sam\nHow is retirement?\n/quit\n", backend).await;
        assert!(out.contains("Error: API error 500"));
        assert!(session.history.is_empty());
        assert!(out.contains("No conversation yet."));
    }

    #[tokio::test]
    async fn test_unknown_segment() {
        let (out, session) = run("/segment Martians\n/quit\n", MockBackend::new()).await;
        assert!(out.contains("Error: Segment not found: Martians"));
        assert_eq!(session.filter, SegmentFilter::All);
    }
}
