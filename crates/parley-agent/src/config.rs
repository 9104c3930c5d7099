use parley_core::{ParleyError, ParleyResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenAi,
    OpenRouter,
    /// Groq cloud inference, OpenAI-compatible API.
    Groq,
    /// Local Ollama server through its OpenAI-compatible endpoint.
    Ollama,
}

impl std::str::FromStr for LlmProvider {
    type Err = ParleyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "openrouter" => Ok(Self::OpenRouter),
            "groq" => Ok(Self::Groq),
            "ollama" => Ok(Self::Ollama),
            other => Err(ParleyError::Config(format!("Unknown model provider: {other}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub provider: LlmProvider,
    #[serde(default)]
    pub model_id: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_base_url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Messages kept per session agent, oldest dropped first.
    #[serde(default = "default_context_window")]
    pub context_window: usize,
    #[serde(default)]
    pub system_prompt: Option<String>,
}

fn default_temperature() -> f32 {
    0.3
}

fn default_max_tokens() -> u32 {
    2048
}

fn default_context_window() -> usize {
    20
}

/// System prompt used when none is configured.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Answer clearly and \
     concisely, and say so when you do not know something.";

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model_id: String::new(),
            api_key: None,
            api_base_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            context_window: default_context_window(),
            system_prompt: None,
        }
    }
}

impl ModelConfig {
    /// API root: the configured URL or the provider's default.
    pub fn base_url(&self) -> &str {
        if let Some(url) = &self.api_base_url {
            url.trim_end_matches('/')
        } else {
            match self.provider {
                LlmProvider::OpenAi => "https://api.openai.com",
                LlmProvider::OpenRouter => "https://openrouter.ai/api",
                LlmProvider::Groq => "https://api.groq.com/openai",
                LlmProvider::Ollama => "http://localhost:11434",
            }
        }
    }

    /// The configured system prompt or [`DEFAULT_SYSTEM_PROMPT`].
    pub fn system_prompt(&self) -> &str {
        self.system_prompt.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT)
    }

    /// Reject configurations no provider would accept.
    pub fn validate(&self) -> ParleyResult<()> {
        if self.model_id.trim().is_empty() {
            return Err(ParleyError::Config("model_id must be set".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ParleyError::Config(format!(
                "temperature {} is outside 0.0..=2.0",
                self.temperature
            )));
        }
        if self.max_tokens == 0 || self.context_window == 0 {
            return Err(ParleyError::Config(
                "max_tokens and context_window must be positive".into(),
            ));
        }
        Ok(())
    }
}
