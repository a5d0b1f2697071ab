//! Common test utilities and fixtures
//!
//! This module provides shared test infrastructure

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_cmd::Command;

/// Get the path to the test fixtures directory
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Get a path to a specific fixture file
pub fn fixture_path(name: &str) -> PathBuf {
    fixtures_dir().join(name)
}

/// Get the valid config fixture path
pub fn valid_config_fixture() -> PathBuf {
    fixture_path("valid_config.toml")
}

/// Get the invalid config fixture path
pub fn invalid_config_fixture() -> PathBuf {
    fixture_path("invalid_config.toml")
}

/// Get the persona document fixture path
pub fn personas_fixture() -> PathBuf {
    fixture_path("personas.json")
}

/// Get the malformed persona document fixture path
pub fn malformed_personas_fixture() -> PathBuf {
    fixture_path("malformed_personas.json")
}

/// A persona-portal command isolated from the user's environment.
///
/// Runs in `home` with HOME and the config dir pointed there, so no real
/// config file or API key leaks in. The provider defaults to the offline mock.
pub fn portal_cmd(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("persona-portal").unwrap();
    cmd.current_dir(home)
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("PERSONA_PORTAL_PROVIDER", "mock")
        .env_remove("PERSONA_PORTAL_CONFIG")
        .env_remove("PERSONA_PORTAL_PERSONAS_FILE")
        .env_remove("PERSONA_PORTAL_API_KEY")
        .env_remove("PERSONA_PORTAL_BASE_URL")
        .env_remove("PERSONA_PORTAL_MODEL")
        .env_remove("RUST_LOG")
        .env_remove("OPENAI_API_KEY");
    cmd
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixtures_dir_exists() {
        assert!(fixtures_dir().exists(), "Fixtures directory should exist");
    }

    #[test]
    fn test_valid_config_exists() {
        assert!(
            valid_config_fixture().exists(),
            "Valid config fixture should exist"
        );
    }

    #[test]
    fn test_invalid_config_exists() {
        assert!(
            invalid_config_fixture().exists(),
            "Invalid config fixture should exist"
        );
    }

    #[test]
    fn test_persona_fixtures_exist() {
        assert!(personas_fixture().exists());
        assert!(malformed_personas_fixture().exists());
    }
}
