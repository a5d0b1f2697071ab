//! Persona Portal - ask simulated investor personas questions
//!
//! Entry point for the persona-portal binary. Loads configuration and the
//! persona file, then dispatches to a one-shot command or the chat loop.

mod backend;
mod chat;
mod cli;
mod config;
mod conversation;
mod error;
mod logging;
mod persona;
mod render;
mod version;

use std::io::Write;

use clap::Parser;
use tracing::{debug, info};

use crate::backend::build_backend;
use crate::cli::{AskArgs, Cli, Commands, ConfigSubcommand};
use crate::config::PortalConfig;
use crate::conversation::{ConversationEngine, Session};
use crate::error::{Error, Result};
use crate::persona::{PersonaStore, SegmentFilter};

fn main() {
    // Parse CLI arguments first (before logging, so we know verbosity)
    let cli = Cli::parse();

    match run(cli) {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprint!("{}", e.format_for_terminal());
            std::process::exit(e.exit_code());
        }
    }
}

/// Run the selected command, returning the process exit code.
fn run(cli: Cli) -> Result<i32> {
    // For commands that don't need full logging, use simple setup
    match cli.command {
        Commands::Version => {
            version::print_version();
            return Ok(0);
        }
        Commands::Config { ref subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            return handle_config_command(subcommand, cli.config.as_deref(), cli.personas);
        }
        _ => {}
    }

    let mut config = PortalConfig::load(cli.config.as_deref())?;
    if let Some(path) = cli.personas {
        config.data.personas_file = path;
    }

    // The guards must be kept alive for the lifetime of the program
    let _log_guards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    let build = version::build_info();
    info!(
        version = %build.full_version(),
        provider = %config.llm.provider,
        model = %config.llm.model,
        "Starting Persona Portal"
    );

    let store = PersonaStore::load(&config.personas_path())?;

    match cli.command {
        Commands::Segments => {
            print!("{}", render::segment_list(&store));
            Ok(0)
        }
        Commands::List { segment } => {
            let filter = resolve_filter(&store, segment.as_deref())?;
            print!("{}", render::persona_grid(&store.filter(&filter)));
            Ok(0)
        }
        Commands::Show { name, segment } => {
            let filter = resolve_filter(&store, segment.as_deref())?;
            let entry = store.find(&name, &filter)?;
            print!("{}", render::profile_card(entry));
            Ok(0)
        }
        Commands::Ask(args) => block_on(ask(&config, &store, args)),
        Commands::Chat { segment } => {
            let filter = resolve_filter(&store, segment.as_deref())?;
            block_on(chat(&config, &store, filter))
        }
        Commands::Version | Commands::Config { .. } => {
            // Already handled above
            unreachable!();
        }
    }
}

fn resolve_filter(store: &PersonaStore, segment: Option<&str>) -> Result<SegmentFilter> {
    match segment {
        Some(label) => store.resolve_filter(label),
        None => Ok(SegmentFilter::All),
    }
}

/// Single-threaded runtime: one request in flight at a time.
fn block_on<F: std::future::Future<Output = Result<i32>>>(future: F) -> Result<i32> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;

    runtime.block_on(future)
}

fn build_engine(config: &PortalConfig) -> Result<ConversationEngine> {
    let backend = build_backend(&config.llm)?;
    Ok(ConversationEngine::new(
        backend,
        &config.llm,
        &config.conversation,
    ))
}

/// One-shot ask. Exit code is non-zero if any persona failed to answer.
async fn ask(config: &PortalConfig, store: &PersonaStore, args: AskArgs) -> Result<i32> {
    let engine = build_engine(config)?;
    let filter = resolve_filter(store, args.segment.as_deref())?;
    let mut session = Session::with_filter(filter);
    debug!(session = %session.id, "One-shot ask");

    if args.all {
        let entries = store.filter(&session.filter);
        let report = engine.ask_all(&mut session, &entries, &args.question).await?;
        print!("{}", render::ask_all_report(&report));

        let first_failure = report
            .outcomes
            .iter()
            .find_map(|o| o.result.as_ref().err().map(Error::exit_code));
        return Ok(first_failure.unwrap_or(0));
    }

    let name = args.persona.ok_or(Error::NoPersonaSelected)?;
    let entry = store.find(&name, &session.filter)?;
    let answer = engine.respond(&mut session, entry, &args.question).await?;
    println!("{}", answer);
    Ok(0)
}

async fn chat(config: &PortalConfig, store: &PersonaStore, filter: SegmentFilter) -> Result<i32> {
    let engine = build_engine(config)?;
    let mut session = Session::with_filter(filter);
    let input = tokio::io::BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();

    chat::run_chat(store, &engine, &mut session, input, &mut stdout).await?;
    stdout.flush()?;
    Ok(0)
}

/// Handle configuration subcommands
fn handle_config_command(
    subcommand: &ConfigSubcommand,
    config_path: Option<&str>,
    personas: Option<String>,
) -> Result<i32> {
    match subcommand {
        ConfigSubcommand::Show => {
            let cfg = PortalConfig::load(config_path)?;
            println!("{}", toml::to_string_pretty(&cfg.redacted())?);
        }
        ConfigSubcommand::Init { path, force } => {
            let written = config::init_config(path.as_deref(), *force)?;
            println!("Configuration written to {}", written.display());
        }
        ConfigSubcommand::Validate => {
            let mut cfg = PortalConfig::load(config_path)?;
            if let Some(path) = personas {
                cfg.data.personas_file = path;
            }
            println!("Configuration is valid.");

            let store = PersonaStore::load(&cfg.personas_path())?;
            println!(
                "Persona source {} is valid: {} segments, {} personas.",
                store.source().display(),
                store.segments().len(),
                store.persona_count()
            );
        }
    }

    Ok(0)
}
