//! LLM integration.
//!
//! Supports:
//! - **Anthropic**: direct Messages API access
//! - **OpenAI**: direct chat-completions access
//!
//! Both sit behind the `LlmProvider` trait so the classification client
//! (and tests) never know which backend is in play.

mod anthropic;
mod openai;
pub mod provider;

pub use anthropic::AnthropicProvider;
pub use openai::OpenAiProvider;
pub use provider::*;

use std::sync::Arc;

use secrecy::ExposeSecret;

use crate::error::LlmError;

/// Supported LLM backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Anthropic,
    OpenAi,
}

impl LlmBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "anthropic" => Some(Self::Anthropic),
            "openai" => Some(Self::OpenAi),
            _ => None,
        }
    }
}

/// Configuration for creating an LLM provider.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub api_key: secrecy::SecretString,
    pub model: String,
}

/// Create an LLM provider from configuration.
pub fn create_provider(config: &LlmConfig) -> Result<Arc<dyn LlmProvider>, LlmError> {
    match config.backend {
        LlmBackend::Anthropic => {
            let provider =
                AnthropicProvider::new(config.api_key.expose_secret(), config.model.clone())?;
            tracing::info!(model = %config.model, "Using Anthropic");
            Ok(Arc::new(provider))
        }
        LlmBackend::OpenAi => {
            let provider =
                OpenAiProvider::new(config.api_key.expose_secret(), config.model.clone())?;
            tracing::info!(model = %config.model, "Using OpenAI");
            Ok(Arc::new(provider))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_provider_accepts_any_key_at_construction() {
        // Auth is checked by the remote service per request, not here.
        let config = LlmConfig {
            backend: LlmBackend::Anthropic,
            api_key: secrecy::SecretString::from("test-key"),
            model: "claude-sonnet-4-20250514".to_string(),
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "claude-sonnet-4-20250514");
    }

    #[test]
    fn create_openai_provider() {
        let config = LlmConfig {
            backend: LlmBackend::OpenAi,
            api_key: secrecy::SecretString::from("sk-test"),
            model: "gpt-4o".to_string(),
        };
        let provider = create_provider(&config).unwrap();
        assert_eq!(provider.model_name(), "gpt-4o");
    }

    #[test]
    fn backend_parse() {
        assert_eq!(LlmBackend::parse("anthropic"), Some(LlmBackend::Anthropic));
        assert_eq!(LlmBackend::parse("OpenAI"), Some(LlmBackend::OpenAi));
        assert_eq!(LlmBackend::parse("llama"), None);
    }
}
