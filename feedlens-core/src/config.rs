use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{ConfigError, CoreError};

pub const DEFAULT_API_BASE: &str = "https://purrview.amethix.com";
pub const DEFAULT_CALLBACK_PATH: &str = "purrview.amethix.com/auth/twitter/callback";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub llm: LlmConfig,
    pub extractor: ExtractorConfig,
    pub oauth: OAuthConfig,
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    /// Substring identifying the redirect target once login has completed.
    pub callback_path: String,
    /// Applies to the identity backend and the X endpoints.
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE.to_string(),
            callback_path: DEFAULT_CALLBACK_PATH.to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl ApiConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub groq_url: String,
    pub groq_model: String,
    pub openai_url: String,
    pub openai_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            groq_url: "https://api.groq.com/openai/v1/chat/completions".to_string(),
            groq_model: "llama-3.3-70b-versatile".to_string(),
            openai_url: "https://api.openai.com/v1/chat/completions".to_string(),
            openai_model: "gpt-3.5-turbo".to_string(),
            temperature: 0.3,
            max_tokens: 50,
            request_timeout_secs: 30,
        }
    }
}

impl LlmConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub batch_size: usize,
    pub max_retries: u32,
    pub retry_delay_ms: u64,
    pub fallback_text_len: usize,
    pub max_status_ids: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            max_retries: 3,
            retry_delay_ms: 2000,
            fallback_text_len: 500,
            max_status_ids: 100,
        }
    }
}

impl ExtractorConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthConfig {
    /// Unset means a login tab may wait for its callback indefinitely.
    pub login_timeout_secs: Option<u64>,
}

impl OAuthConfig {
    pub fn login_timeout(&self) -> Option<Duration> {
        self.login_timeout_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://feedlens.db".to_string(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, CoreError> {
        let config: AppConfig = toml::from_str(raw).map_err(ConfigError::from)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.display().to_string(),
            }
            .into());
        }
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Loads `path` when given, otherwise returns the built-in defaults.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, CoreError> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("api.base_url", &self.api.base_url),
            ("llm.groq_url", &self.llm.groq_url),
            ("llm.openai_url", &self.llm.openai_url),
        ] {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(ConfigError::InvalidValue {
                    field: field.to_string(),
                    value: value.clone(),
                });
            }
        }

        if self.api.callback_path.is_empty() {
            return Err(ConfigError::MissingField {
                field: "api.callback_path".to_string(),
            });
        }

        if self.api.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "api.request_timeout_secs".to_string(),
                value: "0".to_string(),
            });
        }

        if self.extractor.batch_size == 0 {
            return Err(ConfigError::ValidationFailed {
                reason: "extractor.batch_size must be at least 1".to_string(),
            });
        }

        Ok(())
    }
}
