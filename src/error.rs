//! Error types for Persona Portal
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for portal operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // Persona source errors (2xx)
    SourceNotFound = 200,
    SourceParseError = 201,
    SourceInvalid = 202,
    IoError = 210,

    // Lookup / input errors (3xx)
    PersonaNotFound = 300,
    PersonaAmbiguous = 301,
    SegmentNotFound = 302,
    EmptyQuestion = 303,
    NoPersonaSelected = 304,

    // Upstream chat service errors (4xx)
    UpstreamConnection = 400,
    UpstreamTimeout = 401,
    UpstreamAuthentication = 402,
    UpstreamQuota = 403,
    UpstreamApi = 404,
    UpstreamMalformed = 405,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10,
            200..=299 => 20,
            300..=399 => 30,
            400..=499 => 40,
            900..=999 => 90,
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Configuration parse error
    #[error("Failed to parse configuration: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<toml::de::Error>,
    },

    /// Configuration validation error
    #[error("Configuration validation failed: {message}")]
    ConfigValidation { message: String, field: Option<String> },

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // ─────────────────────────────────────────────────────────────
    // Persona Source Errors (fatal at startup)
    // ─────────────────────────────────────────────────────────────

    /// Persona file missing or unreadable
    #[error("Persona source not found: {path}")]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Persona file is not valid JSON for the persona schema
    #[error("Failed to parse persona source {path}: {source}")]
    SourceParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Persona file parsed but violates a structural rule
    #[error("Invalid persona source: {message}")]
    SourceInvalid { message: String },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ─────────────────────────────────────────────────────────────
    // Lookup / Input Errors
    // ─────────────────────────────────────────────────────────────

    /// No persona with this name
    #[error("Persona not found: {name}")]
    PersonaNotFound { name: String },

    /// Name exists in more than one segment
    #[error("Persona '{name}' exists in several segments: {}", .segments.join(", "))]
    PersonaAmbiguous { name: String, segments: Vec<String> },

    /// No segment with this label
    #[error("Segment not found: {label}")]
    SegmentNotFound { label: String },

    /// Blank question submitted
    #[error("Please enter a question")]
    EmptyQuestion,

    /// Single-persona ask without a selection
    #[error("Please select a persona")]
    NoPersonaSelected,

    // ─────────────────────────────────────────────────────────────
    // Upstream Chat Service Errors
    // ─────────────────────────────────────────────────────────────

    /// Could not reach the chat endpoint
    #[error("Failed to reach {url}: {message}")]
    UpstreamConnection { url: String, message: String },

    /// Chat endpoint did not answer in time
    #[error("Request to {url} timed out after {timeout_secs}s")]
    UpstreamTimeout { url: String, timeout_secs: u64 },

    /// Credential rejected (401/403)
    #[error("Authentication failed: {message}")]
    UpstreamAuthentication { message: String },

    /// Rate or billing quota exhausted (429)
    #[error("Quota exceeded: {message}")]
    UpstreamQuota { message: String },

    /// Any other non-success status
    #[error("API error {status}: {message}")]
    UpstreamApi { status: u16, message: String },

    /// Response arrived but carried no usable text
    #[error("Malformed response from chat service: {message}")]
    UpstreamMalformed { message: String },

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    // ─────────────────────────────────────────────────────────────
    // Error Classification
    // ─────────────────────────────────────────────────────────────

    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::ConfigNotFound { .. } => ErrorCode::ConfigNotFound,
            Error::ConfigParse { .. } => ErrorCode::ConfigParseError,
            Error::ConfigValidation { .. } => ErrorCode::ConfigValidation,
            Error::Toml(_) => ErrorCode::ConfigParseError,

            Error::SourceNotFound { .. } => ErrorCode::SourceNotFound,
            Error::SourceParse { .. } => ErrorCode::SourceParseError,
            Error::SourceInvalid { .. } => ErrorCode::SourceInvalid,
            Error::Io(_) => ErrorCode::IoError,

            Error::PersonaNotFound { .. } => ErrorCode::PersonaNotFound,
            Error::PersonaAmbiguous { .. } => ErrorCode::PersonaAmbiguous,
            Error::SegmentNotFound { .. } => ErrorCode::SegmentNotFound,
            Error::EmptyQuestion => ErrorCode::EmptyQuestion,
            Error::NoPersonaSelected => ErrorCode::NoPersonaSelected,

            Error::UpstreamConnection { .. } => ErrorCode::UpstreamConnection,
            Error::UpstreamTimeout { .. } => ErrorCode::UpstreamTimeout,
            Error::UpstreamAuthentication { .. } => ErrorCode::UpstreamAuthentication,
            Error::UpstreamQuota { .. } => ErrorCode::UpstreamQuota,
            Error::UpstreamApi { .. } => ErrorCode::UpstreamApi,
            Error::UpstreamMalformed { .. } => ErrorCode::UpstreamMalformed,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Whether this error came from the chat service round-trip
    pub fn is_upstream(&self) -> bool {
        matches!(self.code() as u16, 400..=499)
    }

    /// Check if the error is fatal (startup cannot continue)
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ConfigNotFound { .. }
                | Error::ConfigParse { .. }
                | Error::ConfigValidation { .. }
                | Error::SourceNotFound { .. }
                | Error::SourceParse { .. }
                | Error::SourceInvalid { .. }
                | Error::Internal(_)
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    // ─────────────────────────────────────────────────────────────
    // User-Friendly Messages
    // ─────────────────────────────────────────────────────────────

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::ConfigNotFound { .. } => Some(
                "Run 'persona-portal config init' to create a default configuration file."
            ),
            Error::ConfigParse { .. } => Some(
                "Check your configuration file syntax. Run 'persona-portal config validate' to see details."
            ),
            Error::ConfigValidation { .. } => Some(
                "Review the configuration file and fix the invalid values."
            ),
            Error::SourceNotFound { .. } => Some(
                "Set 'data.personas_file' in the config or pass --personas <path>."
            ),
            Error::SourceParse { .. } | Error::SourceInvalid { .. } => Some(
                "The persona file must be a JSON list of segment records, each with a 'segment' label and optional 'male'/'female' personas."
            ),
            Error::PersonaNotFound { .. } => Some(
                "Run 'persona-portal list' to see available personas."
            ),
            Error::PersonaAmbiguous { .. } => Some(
                "Pass --segment to pick which persona you mean."
            ),
            Error::SegmentNotFound { .. } => Some(
                "Run 'persona-portal segments' to see available segments."
            ),
            Error::UpstreamConnection { .. } | Error::UpstreamTimeout { .. } => Some(
                "Check your network connection and the 'llm.base_url' setting."
            ),
            Error::UpstreamAuthentication { .. } => Some(
                "Set OPENAI_API_KEY or 'llm.api_key' to a valid key."
            ),
            Error::UpstreamQuota { .. } => Some(
                "Your API quota is exhausted. Wait or check your plan and billing details."
            ),
            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let mut output = format!(
            "\x1b[31mError [{}]\x1b[0m: {}\n",
            self.code().as_str(),
            self
        );

        if let Some(hint) = self.suggestion() {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }
}

// ─────────────────────────────────────────────────────────────────
// Error Constructors
// ─────────────────────────────────────────────────────────────────

impl Error {
    pub fn config_validation(message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: None,
        }
    }

    pub fn config_field_invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConfigValidation {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    pub fn source_invalid(message: impl Into<String>) -> Self {
        Error::SourceInvalid {
            message: message.into(),
        }
    }

    pub fn persona_not_found(name: impl Into<String>) -> Self {
        Error::PersonaNotFound { name: name.into() }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Error::UpstreamMalformed {
            message: message.into(),
        }
    }
}
