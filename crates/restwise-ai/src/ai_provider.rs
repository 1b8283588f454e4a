use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::{AdvisorConfig, ProviderKind};
use crate::providers::{ollama::OllamaProvider, openai::OpenAiProvider};

/// Trait for AI providers
#[async_trait]
pub trait AiProviderTrait: Send + Sync {
    /// Generate text response for a given prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Get the model name being used
    fn model_name(&self) -> &str;

    /// Check if the provider is available
    async fn is_available(&self) -> bool {
        true
    }
}

/// Create a provider instance based on configuration
///
/// # Errors
///
/// Returns an error if the API key is missing for providers that require one
/// (Groq, `OpenAI`).
pub fn create_provider(config: &AdvisorConfig) -> Result<Box<dyn AiProviderTrait>> {
    let model = config.effective_model();
    let base_url = config.effective_base_url();

    match config.provider {
        ProviderKind::Groq | ProviderKind::OpenAi => {
            let api_key = config
                .effective_api_key()
                .with_context(|| format!("API key required for {}", config.provider))?;
            Ok(Box::new(OpenAiProvider::new(&api_key, model, Some(base_url))))
        }
        ProviderKind::Ollama => Ok(Box::new(OllamaProvider::new(Some(base_url), model))),
    }
}
