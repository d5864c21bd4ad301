//! Message contracts exchanged between the page context and the background context.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::StatsSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Request {
    AnalyzePost { text: String },
    GetStats,
    InitiateTwitterLogin,
    GetTwitterAuthStatus,
    LogoutTwitter,
    ExtractXTokens,
    ToggleSidebar,
    AnalyzeFeed,
    ReloadSettings,
    Ping,
}

impl Request {
    pub fn action(&self) -> &'static str {
        match self {
            Request::AnalyzePost { .. } => "analyzePost",
            Request::GetStats => "getStats",
            Request::InitiateTwitterLogin => "initiateTwitterLogin",
            Request::GetTwitterAuthStatus => "getTwitterAuthStatus",
            Request::LogoutTwitter => "logoutTwitter",
            Request::ExtractXTokens => "extractXTokens",
            Request::ToggleSidebar => "toggleSidebar",
            Request::AnalyzeFeed => "analyzeFeed",
            Request::ReloadSettings => "reloadSettings",
            Request::Ping => "ping",
        }
    }
}

/// Replies are serialized in the shapes the extension surfaces already expect.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    Pong { pong: bool },
    Stats(StatsSnapshot),
    AuthStatus(AuthStatus),
    Outcome(ActionOutcome),
    Ack { status: String },
}

impl Response {
    pub fn ack(status: impl Into<String>) -> Self {
        Response::Ack {
            status: status.into(),
        }
    }
}

/// Result of a user-triggered action such as login or account linking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            message: None,
            username: None,
            error: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_username(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message: None,
            username: None,
            error: Some(error.into()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthStatus {
    pub is_authenticated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub authenticated_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Request/response channel into the background context.
///
/// Implementations report [`CoreError::ContextInvalidated`] once the other side is gone.
#[async_trait]
pub trait MessageBus: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response, CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request: Request =
            serde_json::from_str(r#"{"action":"analyzePost","text":"hello"}"#).unwrap();
        assert_eq!(
            request,
            Request::AnalyzePost {
                text: "hello".to_string()
            }
        );

        let ping = serde_json::to_value(Request::Ping).unwrap();
        assert_eq!(ping["action"], "ping");

        let login: Request = serde_json::from_str(r#"{"action":"initiateTwitterLogin"}"#).unwrap();
        assert_eq!(login.action(), "initiateTwitterLogin");
    }

    #[test]
    fn test_unknown_action_is_rejected() {
        let result = serde_json::from_str::<Request>(r#"{"action":"deleteEverything"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_response_shapes() {
        let pong = serde_json::to_value(Response::Pong { pong: true }).unwrap();
        assert_eq!(pong, serde_json::json!({ "pong": true }));

        let failed = serde_json::to_value(Response::Outcome(ActionOutcome::failed("boom"))).unwrap();
        assert_eq!(failed, serde_json::json!({ "success": false, "error": "boom" }));

        let status = serde_json::to_value(Response::AuthStatus(AuthStatus::default())).unwrap();
        assert_eq!(status, serde_json::json!({ "isAuthenticated": false }));
    }
}
