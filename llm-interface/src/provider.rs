use async_trait::async_trait;
use feedlens_core::{CoreError, LlmConfig, LlmError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

pub const SYSTEM_PROMPT: &str = "You analyze social media posts. You MUST respond with ONLY valid JSON, no other text. Format: {\"bias\":\"left|center|right\",\"sentiment\":\"positive|neutral|negative\",\"toxicity\":\"low|medium|high\"}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Groq,
    OpenAi,
}

impl ProviderKind {
    pub fn from_setting(name: &str) -> Result<Self, LlmError> {
        match name {
            "groq" => Ok(ProviderKind::Groq),
            "openai" => Ok(ProviderKind::OpenAi),
            other => Err(LlmError::UnknownProvider {
                provider: other.to_string(),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            ProviderKind::Groq => "groq",
            ProviderKind::OpenAi => "openai",
        }
    }
}

#[async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Sends one system/user exchange and returns the raw reply text.
    async fn complete(&self, system: &str, user: &str) -> Result<String, CoreError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

/// Chat-completions client; Groq and OpenAI share the wire format.
pub struct ChatCompletionProvider {
    kind: ProviderKind,
    api_key: String,
    url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    http: Client,
}

impl ChatCompletionProvider {
    pub fn new(kind: ProviderKind, api_key: String, config: &LlmConfig, http: Client) -> Self {
        let (url, model) = match kind {
            ProviderKind::Groq => (config.groq_url.clone(), config.groq_model.clone()),
            ProviderKind::OpenAi => (config.openai_url.clone(), config.openai_model.clone()),
        };

        Self {
            kind,
            api_key,
            url,
            model,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            http,
        }
    }
}

#[async_trait]
impl LlmProvider for ChatCompletionProvider {
    fn name(&self) -> &str {
        self.kind.name()
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String, CoreError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        debug!(model = %self.model, "{} chat request", self.name());

        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    CoreError::Llm(LlmError::RequestTimeout {
                        provider: self.name().to_string(),
                    })
                } else {
                    CoreError::Network(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("{} API error: {} {}", self.name().to_uppercase(), status, body);
            return Err(LlmError::HttpStatus {
                provider: self.name().to_string(),
                status_code: status.as_u16(),
                body,
            }
            .into());
        }

        let chat: ChatResponse = response.json().await.map_err(|_| LlmError::InvalidResponseFormat {
            provider: self.name().to_string(),
        })?;

        chat.choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .map(|content| content.trim().to_string())
            .ok_or_else(|| {
                LlmError::InvalidResponseFormat {
                    provider: self.name().to_string(),
                }
                .into()
            })
    }
}
