//! Assistant provider configuration

use serde::Deserialize;
use std::time::Duration;

/// Which assistant answers prompts
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AssistantProvider {
    /// Offline replies composed from the policy list
    #[default]
    Scripted,
    /// OpenAI-compatible chat-completions endpoint
    OpenAi,
}

impl AssistantProvider {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "openai" | "open-ai" | "remote" => Self::OpenAi,
            _ => Self::Scripted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Scripted => "scripted",
            Self::OpenAi => "openai",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssistantConfig {
    pub provider: AssistantProvider,
    /// Base URL, `/chat/completions` is appended
    pub api_base: String,
    pub model: String,
    /// Resolved API key (LUMA_ASSISTANT_API_KEY or config file)
    pub api_key: Option<String>,
    /// Whole-request timeout
    pub timeout_secs: u64,
    /// Earlier messages sent along with each prompt
    pub max_history: usize,
    /// Delay between words of scripted replies
    pub scripted_delay_ms: u64,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            provider: AssistantProvider::Scripted,
            api_base: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key: None,
            timeout_secs: 60,
            max_history: 20,
            scripted_delay_ms: 40,
        }
    }
}

/// Assistant settings as loaded from config file
#[derive(Debug, Deserialize, Default)]
pub struct FileAssistant {
    pub provider: Option<String>,
    pub api_base: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_history: Option<usize>,
    pub scripted_delay_ms: Option<u64>,
}

impl AssistantConfig {
    /// Create from file config; the env API key takes precedence
    pub fn from_file(file: Option<FileAssistant>, env_api_key: Option<String>) -> Self {
        let file = file.unwrap_or_default();
        let defaults = Self::default();

        Self {
            provider: file
                .provider
                .map(|p| AssistantProvider::parse(&p))
                .unwrap_or(defaults.provider),
            api_base: file.api_base.unwrap_or(defaults.api_base),
            model: file.model.unwrap_or(defaults.model),
            api_key: env_api_key.or(file.api_key),
            timeout_secs: file.timeout_secs.unwrap_or(defaults.timeout_secs),
            max_history: file.max_history.unwrap_or(defaults.max_history),
            scripted_delay_ms: file.scripted_delay_ms.unwrap_or(defaults.scripted_delay_ms),
        }
    }

    pub fn scripted_delay(&self) -> Duration {
        Duration::from_millis(self.scripted_delay_ms)
    }
}
