//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for persona-portal.

use clap::{Args, Parser, Subcommand};

/// Persona Portal - ask simulated investor personas questions
///
/// Loads investor personas grouped by segment from a JSON file and answers
/// questions in each persona's voice through an OpenAI-compatible chat endpoint.
#[derive(Parser, Debug)]
#[command(name = "persona-portal")]
#[command(author, version, long_about = None)]
#[command(about = "Persona Portal - ask simulated investor personas questions")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to configuration file
    #[arg(short, long, env = "PERSONA_PORTAL_CONFIG", global = true)]
    pub config: Option<String>,

    /// Persona JSON file (overrides data.personas_file)
    #[arg(short, long, global = true)]
    pub personas: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List segments with their overviews
    Segments,

    /// List personas, optionally within one segment
    List {
        /// Segment label, or "all"
        #[arg(short, long)]
        segment: Option<String>,
    },

    /// Show a persona's profile card
    Show {
        /// Persona name (case-insensitive)
        name: String,

        /// Segment to disambiguate names used in several segments
        #[arg(short, long)]
        segment: Option<String>,
    },

    /// Ask one persona, or every persona in a segment, a single question
    Ask(AskArgs),

    /// Start an interactive conversation
    Chat {
        /// Start with this segment filter
        #[arg(short, long)]
        segment: Option<String>,
    },

    /// Display version and build information
    Version,

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

/// Arguments for `ask`
#[derive(Args, Debug, Clone)]
pub struct AskArgs {
    /// The question to ask
    pub question: String,

    /// Persona to ask
    #[arg(long, required_unless_present = "all", conflicts_with = "all")]
    pub persona: Option<String>,

    /// Ask every persona in the segment filter
    #[arg(long)]
    pub all: bool,

    /// Segment label, or "all"
    #[arg(short, long)]
    pub segment: Option<String>,
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration (API key redacted)
    Show,

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the configuration file
    Validate,
}
