//! Configuration system for Persona Portal
//!
//! Supports multiple configuration sources with the following precedence (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (PERSONA_PORTAL_* prefix, plus OPENAI_API_KEY)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::conversation::AskAllPolicy;
use crate::error::{Error, Result};

/// Environment variable holding the chat service credential
pub const OPENAI_API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Instruction sent as the system turn of every persona conversation
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are simulating an investor responding in a realistic, conversational tone.";

/// Main portal configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Persona data source
    pub data: DataSettings,

    /// Chat completion endpoint settings
    pub llm: LlmSettings,

    /// Conversation engine behaviour
    pub conversation: ConversationSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Where persona records are loaded from
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSettings {
    /// Path to the persona JSON document
    pub personas_file: String,
}

/// Which chat backend answers questions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Any OpenAI-compatible chat completions endpoint
    OpenAi,
    /// Offline canned answers, no network
    Mock,
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LlmProvider::OpenAi => write!(f, "openai"),
            LlmProvider::Mock => write!(f, "mock"),
        }
    }
}

impl FromStr for LlmProvider {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(LlmProvider::OpenAi),
            "mock" => Ok(LlmProvider::Mock),
            _ => Err(format!("Unknown provider '{}'. Valid: openai, mock", s)),
        }
    }
}

/// Chat completion endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSettings {
    /// Backend used to answer questions
    pub provider: LlmProvider,

    /// API base URL (e.g., "https://api.openai.com/v1", "http://localhost:11434/v1")
    pub base_url: String,

    /// Bearer credential (empty = read OPENAI_API_KEY, or send no header)
    pub api_key: String,

    /// Model identifier sent with every request
    pub model: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,

    /// Fixed system instruction
    pub system_prompt: String,
}

/// Conversation engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationSettings {
    /// Number of most recent exchanges replayed to the model
    pub history_window: usize,

    /// What "ask all" does after one persona fails
    pub ask_all_policy: AskAllPolicy,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// File rotation: hourly, daily, never
    pub rotation: String,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

impl Default for DataSettings {
    fn default() -> Self {
        Self {
            personas_file: "personas.json".to_string(),
        }
    }
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::OpenAi,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "o3".to_string(),
            timeout_secs: 120,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self {
            history_window: 4,
            ask_all_policy: AskAllPolicy::Continue,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            file: None,
            rotation: "daily".to_string(),
            max_files: 5,
            json_format: false,
        }
    }
}

impl PortalConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(path) = Self::find_config_file(config_path)? {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path)?;
            config = toml::from_str(&content).map_err(|e| Error::ConfigParse {
                message: format!("{}: {}", path.display(), e.message()),
                source: Some(e),
            })?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        config.apply_env_overrides()?;
        config.expand_paths();
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit_path {
            let path = PathBuf::from(expand_path(path));
            if path.exists() {
                return Ok(Some(path));
            }
            return Err(Error::ConfigNotFound { path });
        }

        let search_paths = [
            Some(PathBuf::from("persona-portal.toml")),
            dirs::config_dir().map(|p| p.join("persona-portal").join("config.toml")),
            dirs::home_dir().map(|p| p.join(".persona-portal").join("config.toml")),
        ];

        for path in search_paths.into_iter().flatten() {
            if path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    ///
    /// A value that does not parse is an error, the same as in the file.
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("PERSONA_PORTAL_PERSONAS_FILE") {
            self.data.personas_file = val;
        }

        if let Some(provider) = env_parse("PERSONA_PORTAL_PROVIDER")? {
            self.llm.provider = provider;
        }
        if let Ok(val) = std::env::var("PERSONA_PORTAL_BASE_URL") {
            self.llm.base_url = val;
        }
        if let Ok(val) = std::env::var("PERSONA_PORTAL_API_KEY") {
            self.llm.api_key = val;
        }
        if self.llm.api_key.is_empty() {
            if let Ok(val) = std::env::var(OPENAI_API_KEY_ENV) {
                self.llm.api_key = val;
            }
        }
        if let Ok(val) = std::env::var("PERSONA_PORTAL_MODEL") {
            self.llm.model = val;
        }
        if let Some(secs) = env_parse("PERSONA_PORTAL_TIMEOUT_SECS")? {
            self.llm.timeout_secs = secs;
        }

        if let Some(window) = env_parse("PERSONA_PORTAL_HISTORY_WINDOW")? {
            self.conversation.history_window = window;
        }
        if let Some(policy) = env_parse("PERSONA_PORTAL_ASK_ALL_POLICY")? {
            self.conversation.ask_all_policy = policy;
        }

        if let Ok(val) = std::env::var("PERSONA_PORTAL_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("PERSONA_PORTAL_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("PERSONA_PORTAL_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
        Ok(())
    }

    /// Expand ~ and environment variables in paths
    fn expand_paths(&mut self) {
        self.data.personas_file = expand_path(&self.data.personas_file);
        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.data.personas_file.trim().is_empty() {
            return Err(Error::config_field_invalid(
                "data.personas_file",
                "personas_file cannot be empty",
            ));
        }

        if self.llm.provider == LlmProvider::OpenAi {
            let url = url::Url::parse(&self.llm.base_url).map_err(|e| {
                Error::config_field_invalid(
                    "llm.base_url",
                    format!("Invalid base_url '{}': {}", self.llm.base_url, e),
                )
            })?;
            if url.scheme() != "http" && url.scheme() != "https" {
                return Err(Error::config_field_invalid(
                    "llm.base_url",
                    "base_url must start with http:// or https://",
                ));
            }
            if self.llm.model.trim().is_empty() {
                return Err(Error::config_field_invalid("llm.model", "model cannot be empty"));
            }
        }

        if self.llm.timeout_secs == 0 {
            return Err(Error::config_field_invalid(
                "llm.timeout_secs",
                "timeout_secs must be greater than 0",
            ));
        }

        if self.conversation.history_window == 0 {
            return Err(Error::config_field_invalid(
                "conversation.history_window",
                "history_window must be at least 1",
            ));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Must be one of: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            ));
        }

        let valid_rotations = ["hourly", "daily", "never"];
        if !valid_rotations.contains(&self.logging.rotation.to_lowercase().as_str()) {
            return Err(Error::config_field_invalid(
                "logging.rotation",
                format!(
                    "Invalid rotation '{}'. Must be one of: {}",
                    self.logging.rotation,
                    valid_rotations.join(", ")
                ),
            ));
        }

        Ok(())
    }

    /// Path to the persona JSON document
    pub fn personas_path(&self) -> PathBuf {
        PathBuf::from(&self.data.personas_file)
    }

    /// Copy safe to print: the API key is masked
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if !copy.llm.api_key.is_empty() {
            copy.llm.api_key = mask_secret(&copy.llm.api_key);
        }
        copy
    }
}

/// Keep the first four characters of a secret, mask the rest
fn mask_secret(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}****", visible)
}

/// Parse an override variable if it is set.
fn env_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match std::env::var(name) {
        Ok(val) => val
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| Error::config_field_invalid(name, format!("{}: {}", name, e))),
        Err(_) => Ok(None),
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<PathBuf> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(default_config_path);

    if config_path.exists() && !force {
        return Err(Error::config_validation(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    if let Some(parent) = config_path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    fs::write(&config_path, generate_default_config())?;
    Ok(config_path)
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("persona-portal")
        .join("config.toml")
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    format!(
        r#"# Persona Portal Configuration

[data]
# Persona JSON document (list of segment records)
personas_file = "personas.json"

[llm]
# Backend: "openai" (any OpenAI-compatible endpoint) or "mock" (offline)
provider = "openai"

# API base URL (OpenAI, Ollama, vLLM, LM Studio, etc.)
base_url = "https://api.openai.com/v1"

# API key (leave empty to read OPENAI_API_KEY from the environment)
api_key = ""

# Model identifier
model = "o3"

# Request timeout in seconds
timeout_secs = 120

# System instruction for every persona conversation
system_prompt = "{}"

[conversation]
# Most recent exchanges replayed to the model for each persona
history_window = 4

# When asking all personas and one fails: "continue" or "abort"
ask_all_policy = "continue"

[logging]
# Log level: trace, debug, info, warn, error
level = "warn"

# Log file path (comment out to disable file logging)
# file = "~/.persona-portal/logs/portal.log"

# File rotation: hourly, daily, never
rotation = "daily"

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#,
        DEFAULT_SYSTEM_PROMPT
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = PortalConfig::default();
        assert_eq!(config.data.personas_file, "personas.json");
        assert_eq!(config.llm.provider, LlmProvider::OpenAi);
        assert_eq!(config.llm.model, "o3");
        assert_eq!(config.conversation.history_window, 4);
        assert_eq!(config.conversation.ask_all_policy, AskAllPolicy::Continue);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_env_override() {
        env::set_var("PERSONA_PORTAL_MODEL", "gpt-4o");
        env::set_var("PERSONA_PORTAL_HISTORY_WINDOW", "6");
        env::set_var("PERSONA_PORTAL_ASK_ALL_POLICY", "abort");

        let mut config = PortalConfig::default();
        config.apply_env_overrides().unwrap();

        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.conversation.history_window, 6);
        assert_eq!(config.conversation.ask_all_policy, AskAllPolicy::Abort);

        env::remove_var("PERSONA_PORTAL_MODEL");
        env::remove_var("PERSONA_PORTAL_HISTORY_WINDOW");
        env::remove_var("PERSONA_PORTAL_ASK_ALL_POLICY");
    }

    #[test]
    fn test_validation_invalid_url() {
        let mut config = PortalConfig::default();
        config.llm.base_url = "not a url".to_string();
        assert!(config.validate().is_err());

        config.llm.base_url = "ftp://example.com".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_mock_provider_skips_url_check() {
        let mut config = PortalConfig::default();
        config.llm.provider = LlmProvider::Mock;
        config.llm.base_url = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_zero_history_window() {
        let mut config = PortalConfig::default();
        config.conversation.history_window = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("history_window"));
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = PortalConfig::default();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_redacted_masks_key() {
        let mut config = PortalConfig::default();
        config.llm.api_key = "sk-secret-value".to_string();
        let shown = config.redacted();
        assert_eq!(shown.llm.api_key, "sk-s****");
        assert_eq!(config.llm.api_key, "sk-secret-value");
    }

    #[test]
    fn test_parse_config_file() {
        let config_str = r#"
[data]
personas_file = "/srv/personas.json"

[llm]
provider = "mock"
model = "gpt-4o-mini"

[conversation]
history_window = 2
ask_all_policy = "abort"
"#;

        let config: PortalConfig = toml::from_str(config_str).unwrap();
        assert_eq!(config.data.personas_file, "/srv/personas.json");
        assert_eq!(config.llm.provider, LlmProvider::Mock);
        assert_eq!(config.llm.model, "gpt-4o-mini");
        assert_eq!(config.llm.timeout_secs, 120);
        assert_eq!(config.conversation.history_window, 2);
        assert_eq!(config.conversation.ask_all_policy, AskAllPolicy::Abort);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn test_generated_default_config_parses() {
        let config: PortalConfig = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(config.llm.system_prompt, DEFAULT_SYSTEM_PROMPT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_init_config_refuses_overwrite() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("config.toml");
        let path_str = path.to_str().unwrap();

        let written = init_config(Some(path_str), false).unwrap();
        assert!(written.is_file());
        assert!(init_config(Some(path_str), false).is_err());
        assert!(init_config(Some(path_str), true).is_ok());
    }

    #[test]
    fn test_load_explicit_missing_file() {
        let err = PortalConfig::load(Some("/nonexistent/persona-portal.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigNotFound { .. }));
    }
}
