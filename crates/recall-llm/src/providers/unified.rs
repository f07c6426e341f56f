use async_trait::async_trait;
use recall_core::{
    ChatMessage, FinishReason, LLMConfig, LLMError, LLMProvider, LLMResponse, Role, TokenUsage,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

/// Provider type enum
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderType {
    /// OpenAI (GPT models)
    OpenAI,
    /// Anthropic (Claude models)
    Anthropic,
    /// Ollama (local models)
    Ollama,
    /// DeepSeek
    DeepSeek,
    /// Groq
    Groq,
    /// Google (Gemini)
    Google,
    /// Mistral
    Mistral,
}

impl ProviderType {
    pub fn api_key_env_var(&self) -> Option<&'static str> {
        match self {
            Self::OpenAI => Some("OPENAI_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::DeepSeek => Some("DEEPSEEK_API_KEY"),
            Self::Groq => Some("GROQ_API_KEY"),
            Self::Google => Some("GOOGLE_API_KEY"),
            Self::Mistral => Some("MISTRAL_API_KEY"),
            Self::Ollama => None,
        }
    }

    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Self::Ollama => Some("http://localhost:11434"),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAI => "openai",
            Self::Anthropic => "anthropic",
            Self::Ollama => "ollama",
            Self::DeepSeek => "deepseek",
            Self::Groq => "groq",
            Self::Google => "google",
            Self::Mistral => "mistral",
        }
    }

    fn to_llm_backend(self) -> llm::builder::LLMBackend {
        match self {
            Self::OpenAI => llm::builder::LLMBackend::OpenAI,
            Self::Anthropic => llm::builder::LLMBackend::Anthropic,
            Self::Ollama => llm::builder::LLMBackend::Ollama,
            Self::DeepSeek => llm::builder::LLMBackend::DeepSeek,
            Self::Google => llm::builder::LLMBackend::Google,
            Self::Groq => llm::builder::LLMBackend::Groq,
            Self::Mistral => llm::builder::LLMBackend::Mistral,
        }
    }
}

impl FromStr for ProviderType {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "anthropic" => Ok(Self::Anthropic),
            "ollama" => Ok(Self::Ollama),
            "deepseek" => Ok(Self::DeepSeek),
            "groq" => Ok(Self::Groq),
            "google" => Ok(Self::Google),
            "mistral" => Ok(Self::Mistral),
            _ => Err("unknown provider type"),
        }
    }
}

/// Language-model client backed by the `llm` crate.
#[derive(Debug)]
pub struct UnifiedLLMProvider {
    provider_type: ProviderType,
    model: String,
    api_key: Option<String>,
    base_url: Option<String>,
}

impl UnifiedLLMProvider {
    pub fn new(
        provider_type: ProviderType,
        model: String,
        api_key: Option<String>,
        base_url: Option<String>,
    ) -> Result<Self, LLMError> {
        let api_key = match api_key {
            Some(key) => Some(key),
            None => match provider_type.api_key_env_var() {
                Some(env_var) => Some(std::env::var(env_var).map_err(|_| {
                    LLMError::Config(format!(
                        "API key not found in environment variable {}",
                        env_var
                    ))
                })?),
                None => None,
            },
        };

        let base_url = base_url.or_else(|| provider_type.default_base_url().map(str::to_string));

        Ok(Self {
            provider_type,
            model,
            api_key,
            base_url,
        })
    }

    pub fn from_env(
        provider_type: ProviderType,
        model: impl Into<String>,
    ) -> Result<Self, LLMError> {
        Self::new(provider_type, model.into(), None, None)
    }

    pub fn provider_type(&self) -> ProviderType {
        self.provider_type
    }

    pub fn model_name(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> Option<&str> {
        self.base_url.as_deref()
    }

    // The llm crate's chat API only distinguishes user and assistant turns.
    fn convert_message(&self, msg: &ChatMessage) -> llm::chat::ChatMessage {
        match msg.role {
            Role::User => llm::chat::ChatMessage::user().content(&msg.content).build(),
            Role::System => llm::chat::ChatMessage::user()
                .content(format!("[System instructions]\n{}", msg.content))
                .build(),
            Role::Assistant => llm::chat::ChatMessage::assistant()
                .content(&msg.content)
                .build(),
        }
    }

    fn build_llm(&self, config: Option<&LLMConfig>) -> Result<Box<dyn llm::LLMProvider>, LLMError> {
        let mut builder = llm::builder::LLMBuilder::new()
            .backend(self.provider_type.to_llm_backend())
            .model(&self.model);

        if let Some(ref key) = self.api_key {
            if !key.is_empty() {
                builder = builder.api_key(key);
            }
        }

        if let Some(ref url) = self.base_url {
            builder = builder.base_url(url);
        }

        if let Some(cfg) = config {
            if let Some(temp) = cfg.temperature {
                builder = builder.temperature(temp);
            }
            if let Some(max_tok) = cfg.max_tokens {
                builder = builder.max_tokens(max_tok);
            }
            if let Some(top_p) = cfg.top_p {
                builder = builder.top_p(top_p);
            }
        }

        builder
            .build()
            .map_err(|e| LLMError::Config(format!("Failed to build LLM: {}", e)))
    }
}

#[async_trait]
impl LLMProvider for UnifiedLLMProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        config: Option<&LLMConfig>,
    ) -> Result<LLMResponse, LLMError> {
        let llm_messages: Vec<llm::chat::ChatMessage> =
            messages.iter().map(|m| self.convert_message(m)).collect();

        let llm = self.build_llm(config)?;

        debug!(
            provider = self.provider_type.as_str(),
            model = %self.model,
            messages = llm_messages.len(),
            "Sending completion request"
        );

        let response = llm.chat(&llm_messages).await.map_err(|e| LLMError::API {
            message: format!("LLM provider error: {}", e),
            status: None,
        })?;

        let content = response.text().unwrap_or_default();

        let mut result = LLMResponse::new(content, FinishReason::Stop).with_model(&self.model);
        if let Some(u) = response.usage() {
            result = result.with_usage(TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });
        }

        Ok(result)
    }

    fn provider_name(&self) -> &str {
        self.provider_type.as_str()
    }
}

pub struct ProviderBuilder {
    provider_type: Option<ProviderType>,
    model: Option<String>,
    api_key: Option<String>,
    api_key_env: Option<String>,
    base_url: Option<String>,
}

impl ProviderBuilder {
    pub fn new() -> Self {
        Self {
            provider_type: None,
            model: None,
            api_key: None,
            api_key_env: None,
            base_url: None,
        }
    }

    pub fn provider(mut self, provider_type: ProviderType) -> Self {
        self.provider_type = Some(provider_type);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn api_key_env(mut self, env_var: impl Into<String>) -> Self {
        self.api_key_env = Some(env_var.into());
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn build(self) -> Result<UnifiedLLMProvider, LLMError> {
        let provider_type = self
            .provider_type
            .ok_or_else(|| LLMError::Config("Provider type not set".to_string()))?;

        let model = self
            .model
            .ok_or_else(|| LLMError::Config("Model not set".to_string()))?;

        let api_key = if let Some(key) = self.api_key {
            Some(key)
        } else if let Some(env_var) = self.api_key_env {
            Some(std::env::var(&env_var).map_err(|_| {
                LLMError::Config(format!(
                    "API key environment variable {} not found",
                    env_var
                ))
            })?)
        } else {
            None
        };

        UnifiedLLMProvider::new(provider_type, model, api_key, self.base_url)
    }
}

impl Default for ProviderBuilder {
    fn default() -> Self {
        Self::new()
    }
}
