use anyhow::{anyhow, Result};
use async_trait::async_trait;
use genai::chat::{ChatMessage, ChatOptions, ChatRequest, ChatResponse, ContentPart};
use genai::resolver::{AuthData, AuthResolver};
use genai::{Client, ModelIden};
use serde::{Deserialize, Serialize};

/// LLM Provider types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    Anthropic,
    OpenAI,
    Gemini,
}

impl LLMProvider {
    /// genai detects the provider from the model prefix (gemini-, gpt-, claude-)
    pub fn model_id(&self, model: &str) -> String {
        model.to_string()
    }

    /// Environment variable holding the API key
    pub fn api_key_env_var(&self) -> &'static str {
        match self {
            LLMProvider::Anthropic => "ANTHROPIC_API_KEY",
            LLMProvider::OpenAI => "OPENAI_API_KEY",
            LLMProvider::Gemini => "GEMINI_API_KEY",
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            LLMProvider::Anthropic => "claude-sonnet-4-20250514",
            LLMProvider::OpenAI => "gpt-4o",
            LLMProvider::Gemini => "gemini-2.5-flash",
        }
    }
}

impl std::str::FromStr for LLMProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Ok(LLMProvider::Anthropic),
            "openai" | "gpt" => Ok(LLMProvider::OpenAI),
            "gemini" | "google" => Ok(LLMProvider::Gemini),
            _ => Err(anyhow!("Unknown LLM provider: {}", s)),
        }
    }
}

/// LLM Configuration
#[derive(Debug, Clone)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub model: String,
    pub api_key: Option<String>,
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
}

impl LLMConfig {
    pub fn new(provider: LLMProvider, model: String) -> Self {
        Self {
            provider,
            model,
            api_key: None,
            max_tokens: Some(4096),
            temperature: Some(0.2),
        }
    }

    pub fn with_api_key(mut self, api_key: String) -> Self {
        self.api_key = Some(api_key);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptRole {
    System,
    User,
}

/// One message sent to a chat model
#[derive(Debug, Clone)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub text: String,
    /// Base64 PNG attached to a user message
    pub image: Option<String>,
}

impl PromptMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            text: text.into(),
            image: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            text: text.into(),
            image: None,
        }
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image;
        self
    }
}

/// Text-completion capability used by the planner and navigator
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn chat(&self, messages: Vec<PromptMessage>) -> Result<String>;
}

/// LLM Client for making requests to various providers
pub struct LLMClient {
    client: Client,
    config: LLMConfig,
}

impl LLMClient {
    /// Create a client; an explicit API key is passed through an auth resolver,
    /// otherwise genai reads the provider's environment variable
    pub fn new(config: LLMConfig) -> Result<Self> {
        let client = if let Some(api_key) = &config.api_key {
            let api_key = api_key.clone();
            let auth_resolver = AuthResolver::from_resolver_fn(
                move |_model_iden: ModelIden| -> std::result::Result<Option<AuthData>, genai::resolver::Error> {
                    Ok(Some(AuthData::from_single(api_key.clone())))
                },
            );
            Client::builder().with_auth_resolver(auth_resolver).build()
        } else {
            Client::default()
        };

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &LLMConfig {
        &self.config
    }

    fn to_chat_message(message: PromptMessage) -> ChatMessage {
        match message.role {
            PromptRole::System => ChatMessage::system(message.text),
            PromptRole::User => match message.image {
                Some(image) => ChatMessage::user(vec![
                    ContentPart::from_text(message.text),
                    ContentPart::from_binary_base64(
                        "image/png",
                        image,
                        Some("screenshot.png".to_string()),
                    ),
                ]),
                None => ChatMessage::user(message.text),
            },
        }
    }

    fn chat_options(&self) -> ChatOptions {
        let mut options = ChatOptions::default();
        if let Some(max_tokens) = self.config.max_tokens {
            options = options.with_max_tokens(max_tokens);
        }
        if let Some(temperature) = self.config.temperature {
            options = options.with_temperature(temperature as f64);
        }
        options
    }
}

#[async_trait]
impl ChatModel for LLMClient {
    async fn chat(&self, messages: Vec<PromptMessage>) -> Result<String> {
        let model_id = self.config.provider.model_id(&self.config.model);
        let request = ChatRequest::new(messages.into_iter().map(Self::to_chat_message).collect());
        let options = self.chat_options();

        tracing::debug!("Sending request to {}", model_id);

        let response: ChatResponse = self
            .client
            .exec_chat(&model_id, request, Some(&options))
            .await
            .map_err(|e| anyhow!("LLM request failed: {}", e))?;

        let text = response
            .first_text()
            .ok_or_else(|| anyhow!("No text in LLM response"))?
            .to_string();

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_models_pass_through() {
        for provider in [LLMProvider::Anthropic, LLMProvider::OpenAI, LLMProvider::Gemini] {
            let model = provider.default_model();
            assert_eq!(provider.model_id(model), model);
        }
        assert_eq!(LLMProvider::Gemini.default_model(), "gemini-2.5-flash");
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!(
            "anthropic".parse::<LLMProvider>().unwrap(),
            LLMProvider::Anthropic
        );
        assert_eq!("GPT".parse::<LLMProvider>().unwrap(), LLMProvider::OpenAI);
        assert_eq!(
            "google".parse::<LLMProvider>().unwrap(),
            LLMProvider::Gemini
        );
        assert!("mistral".parse::<LLMProvider>().is_err());
    }

    #[test]
    fn test_prompt_message_image() {
        let msg = PromptMessage::user("state").with_image(Some("aGk=".to_string()));
        assert_eq!(msg.role, PromptRole::User);
        assert_eq!(msg.image.as_deref(), Some("aGk="));
        assert!(PromptMessage::system("sys").image.is_none());
    }
}
