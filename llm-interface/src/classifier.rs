use feedlens_core::{
    ClassificationResult, CoreError, ErrorExt, LlmConfig, Settings, Store, StoreExt,
};
use reqwest::Client;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::keywords::classify_keywords;
use crate::provider::{ChatCompletionProvider, LlmProvider, ProviderKind, SYSTEM_PROMPT};
use crate::response::parse_classification;

/// Which path produced a result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationSource {
    Remote { provider: String },
    Keywords,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub result: ClassificationResult,
    pub source: ClassificationSource,
}

pub struct Classifier {
    config: LlmConfig,
    settings: RwLock<Settings>,
    http: Client,
}

impl Classifier {
    pub fn new(config: LlmConfig) -> Result<Self, CoreError> {
        let http = Client::builder().timeout(config.request_timeout()).build()?;

        Ok(Self {
            config,
            settings: RwLock::new(Settings::default()),
            http,
        })
    }

    pub async fn settings(&self) -> Settings {
        self.settings.read().await.clone()
    }

    pub async fn update_settings(&self, settings: Settings) {
        info!(
            use_ai = settings.use_ai,
            provider = %settings.api_provider,
            has_key = !settings.api_key.is_empty(),
            "Settings loaded"
        );
        *self.settings.write().await = settings;
    }

    pub async fn reload_settings(&self, store: &dyn Store) -> Result<(), CoreError> {
        let settings = store.load_settings().await?;
        self.update_settings(settings).await;
        Ok(())
    }

    /// Never fails: any problem on the remote path falls back to keyword scoring.
    pub async fn classify(&self, text: &str) -> ClassificationResult {
        self.classify_detailed(text).await.result
    }

    pub async fn classify_detailed(&self, text: &str) -> Classified {
        let settings = self.settings().await;

        if settings.remote_enabled() {
            match self.classify_remote(&settings, text).await {
                Ok(classified) => return classified,
                // Transport hiccups recover on their own; anything else is a settings problem.
                Err(e) if e.is_transient() => {
                    e.log_warn();
                    debug!("Remote classification failed, using keywords");
                }
                Err(e) => {
                    e.log_error();
                    debug!("Remote classification rejected, using keywords");
                }
            }
        }

        let result = classify_keywords(text);
        debug!(
            "Keyword analysis - Bias: {}, Sentiment: {}, Toxicity: {}",
            result.bias, result.sentiment, result.toxicity
        );
        Classified {
            result,
            source: ClassificationSource::Keywords,
        }
    }

    async fn classify_remote(&self, settings: &Settings, text: &str) -> Result<Classified, CoreError> {
        let kind = ProviderKind::from_setting(&settings.api_provider)?;
        let provider =
            ChatCompletionProvider::new(kind, settings.api_key.clone(), &self.config, self.http.clone());
        let result = classify_with(&provider, text).await?;

        info!(
            "{} analysis: bias={} sentiment={} toxicity={}",
            kind.name().to_uppercase(),
            result.bias,
            result.sentiment,
            result.toxicity
        );
        Ok(Classified {
            result,
            source: ClassificationSource::Remote {
                provider: kind.name().to_string(),
            },
        })
    }
}

/// One remote round trip with validation; errors are left to the caller.
pub async fn classify_with(
    provider: &dyn LlmProvider,
    text: &str,
) -> Result<ClassificationResult, CoreError> {
    let user = format!("Analyze: \"{}\"", text);
    let content = provider.complete(SYSTEM_PROMPT, &user).await?;
    Ok(parse_classification(&content, provider.name())?)
}
