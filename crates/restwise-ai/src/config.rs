use serde::{Deserialize, Serialize};

pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";

/// Which backend serves advisor prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Groq's OpenAI-compatible endpoint
    #[default]
    Groq,
    OpenAi,
    Ollama,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Groq => write!(f, "groq"),
            Self::OpenAi => write!(f, "openai"),
            Self::Ollama => write!(f, "ollama"),
        }
    }
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "groq" => Ok(Self::Groq),
            "openai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            _ => Err(format!("Unknown provider: {s}. Use: groq, openai, ollama")),
        }
    }
}

/// `[advisor]` section of the configuration file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorConfig {
    pub enabled: bool,
    pub provider: ProviderKind,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    /// Minimum spacing between two advisor calls
    pub cooldown_secs: u64,
    /// Hard limit for one advisor call
    pub timeout_secs: u64,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: ProviderKind::Groq,
            model: None,
            api_key: None,
            base_url: None,
            cooldown_secs: 60,
            timeout_secs: 10,
        }
    }
}

impl AdvisorConfig {
    #[must_use]
    pub fn effective_model(&self) -> &str {
        if let Some(model) = self.model.as_deref() {
            return model;
        }
        match self.provider {
            ProviderKind::Groq => "llama-3.1-8b-instant",
            ProviderKind::OpenAi => "gpt-4o-mini",
            ProviderKind::Ollama => "llama3.1",
        }
    }

    /// API key from the config file, falling back to the provider's environment variable
    #[must_use]
    pub fn effective_api_key(&self) -> Option<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return Some(key.clone());
        }
        let var = match self.provider {
            ProviderKind::Groq => "GROQ_API_KEY",
            ProviderKind::OpenAi => "OPENAI_API_KEY",
            ProviderKind::Ollama => return None,
        };
        std::env::var(var).ok().filter(|k| !k.trim().is_empty())
    }

    #[must_use]
    pub fn effective_base_url(&self) -> &str {
        if let Some(url) = self.base_url.as_deref() {
            return url;
        }
        match self.provider {
            ProviderKind::Groq => GROQ_BASE_URL,
            ProviderKind::OpenAi => OPENAI_BASE_URL,
            ProviderKind::Ollama => OLLAMA_BASE_URL,
        }
    }
}
