//! Chat completion backends
//!
//! This module provides the ChatBackend abstraction and its providers:
//! an OpenAI-compatible HTTP client and an offline mock.

pub mod mock;
mod openai;
mod traits;

use std::sync::Arc;

use tracing::debug;

use crate::config::{LlmProvider, LlmSettings};
use crate::error::Result;

pub use mock::MockBackend;
pub use openai::{OpenAiBackend, OpenAiConfig};
pub use traits::*;

/// Build the backend selected by `llm.provider`.
pub fn build_backend(settings: &LlmSettings) -> Result<Arc<dyn ChatBackend>> {
    debug!(provider = %settings.provider, model = %settings.model, "Creating chat backend");
    match settings.provider {
        LlmProvider::OpenAi => Ok(Arc::new(OpenAiBackend::new(OpenAiConfig::from(settings))?)),
        LlmProvider::Mock => Ok(Arc::new(MockBackend::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_backend_by_provider() {
        let mut settings = LlmSettings::default();
        assert_eq!(build_backend(&settings).unwrap().name(), "openai");

        settings.provider = LlmProvider::Mock;
        assert_eq!(build_backend(&settings).unwrap().name(), "mock");
    }
}
