use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::error::LlmError;

/// Store keys shared by every context.
pub mod keys {
    pub const BIAS_STATS: &str = "biasStats";
    pub const DIVERSITY_DATA: &str = "diversityData";
    pub const ANALYZED_POSTS: &str = "analyzedPosts";
    pub const TWITTER_AUTH: &str = "twitterAuth";
    pub const X_AUTH: &str = "xAuth";
    pub const USE_AI: &str = "useAI";
    pub const API_KEY: &str = "apiKey";
    pub const API_PROVIDER: &str = "apiProvider";
    pub const CONNECT_X: &str = "connectX";
    pub const DARK_MODE: &str = "darkMode";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bias {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Toxicity {
    Low,
    Medium,
    High,
}

macro_rules! label_enum {
    ($ty:ident, $field:literal, $($variant:ident => $text:literal),+) => {
        impl $ty {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($ty::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = LlmError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($ty::$variant),)+
                    other => Err(LlmError::InvalidLabel {
                        field: $field.to_string(),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

label_enum!(Bias, "bias", Left => "left", Center => "center", Right => "right");
label_enum!(Sentiment, "sentiment", Positive => "positive", Neutral => "neutral", Negative => "negative");
label_enum!(Toxicity, "toxicity", Low => "low", Medium => "medium", High => "high");

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub bias: Bias,
    pub sentiment: Sentiment,
    pub toxicity: Toxicity,
}

impl ClassificationResult {
    pub fn new(bias: Bias, sentiment: Sentiment, toxicity: Toxicity) -> Self {
        Self {
            bias,
            sentiment,
            toxicity,
        }
    }
}

/// A feed item that passed dedup and is ready to be classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub text: String,
    pub author: Option<String>,
    pub is_retweet: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatsSnapshot {
    pub left: u64,
    pub center: u64,
    pub right: u64,
    pub total: u64,
    pub positive: u64,
    pub neutral: u64,
    pub negative: u64,
    pub toxic_low: u64,
    pub toxic_medium: u64,
    pub toxic_high: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DiversitySnapshot {
    pub authors: BTreeSet<String>,
    pub original: u64,
    pub retweet: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

/// Delegated-login session persisted under `twitterAuth`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TwitterAuth {
    pub token: Option<String>,
    pub username: Option<String>,
    pub user_id: Option<String>,
    pub authenticated_at: Option<DateTime<Utc>>,
    pub is_authenticated: bool,
}

impl TwitterAuth {
    pub fn is_valid(&self) -> bool {
        self.is_authenticated && self.token.as_deref().is_some_and(|t| !t.is_empty())
    }
}

/// Linked-account session persisted under `xAuth`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct XAuth {
    pub auth_token: String,
    pub ct0: String,
    pub bearer_token: String,
    pub username: String,
    pub connected: bool,
    #[serde(rename = "connectedAt")]
    pub connected_at: DateTime<Utc>,
}

/// User-facing settings written by the options surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub use_ai: bool,
    pub api_key: String,
    pub api_provider: String,
    pub connect_x: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_ai: false,
            api_key: String::new(),
            api_provider: "groq".to_string(),
            connect_x: false,
        }
    }
}

impl Settings {
    /// Keys accepted for remote classification.
    pub const KEY_PREFIXES: [&'static str; 2] = ["sk-", "gsk_"];

    pub fn remote_enabled(&self) -> bool {
        self.use_ai
            && !self.api_key.is_empty()
            && Self::KEY_PREFIXES
                .iter()
                .any(|prefix| self.api_key.starts_with(prefix))
    }
}
