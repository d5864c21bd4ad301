//! Delegated login driven through an externally opened tab.
//!
//! `initiate_login` asks the backend for an authorization URL, opens it in a tab and
//! spawns a monitor that waits for the tab to reach the callback path. Before a login
//! request there is no attempt at all; once the tab is open the monitor moves
//! `AwaitingCallback -> {Completed | Aborted}` exactly once and drops its listener pair
//! on every exit path.

use chrono::Utc;
use feedlens_core::{
    keys, ApiConfig, AuthError, CoreError, ErrorExt, OAuthConfig, Store, StoreExt, TwitterAuth,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::tabs::{TabEvent, TabEventHub, TabHost, TabId, TabSubscription};

pub const LOGIN_STARTED_MESSAGE: &str = "Opening Twitter login...";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    AwaitingCallback,
    Completed,
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginOutcome {
    /// A session was persisted and the tab closed.
    Authenticated(TwitterAuth),
    /// The callback was reached but yielded no usable session.
    Rejected { reason: String },
    /// The tab closed, or the optional deadline passed, before the callback.
    Aborted,
}

/// Broadcast to option surfaces; nobody listening is fine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum AuthEvent {
    TwitterAuthComplete { success: bool, username: String },
}

#[derive(Debug, Deserialize)]
struct AuthUrlResponse {
    auth_uri: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CallbackPayload {
    token: Option<String>,
    username: Option<String>,
    user_id: Option<Value>,
}

impl CallbackPayload {
    fn into_session(self) -> Result<TwitterAuth, AuthError> {
        let token = self.token.filter(|t| !t.is_empty());
        let username = self.username.filter(|u| !u.is_empty());
        let (Some(token), Some(username)) = (token, username) else {
            return Err(AuthError::InvalidCallback {
                reason: "token and username are both required".to_string(),
            });
        };

        let user_id = match self.user_id {
            Some(Value::String(id)) => Some(id),
            Some(Value::Number(id)) => Some(id.to_string()),
            _ => None,
        };

        Ok(TwitterAuth {
            token: Some(token),
            username: Some(username),
            user_id,
            authenticated_at: Some(Utc::now()),
            is_authenticated: true,
        })
    }
}

/// A login tab being watched.
#[derive(Debug)]
pub struct LoginAttempt {
    pub tab_id: TabId,
    state: watch::Receiver<MonitorState>,
    monitor: JoinHandle<LoginOutcome>,
}

impl LoginAttempt {
    pub fn state(&self) -> MonitorState {
        *self.state.borrow()
    }

    /// Handle that keeps observing the state after [`LoginAttempt::outcome`] consumes this.
    pub fn state_changes(&self) -> watch::Receiver<MonitorState> {
        self.state.clone()
    }

    /// Waits for the monitor to reach its terminal state.
    pub async fn outcome(self) -> LoginOutcome {
        match self.monitor.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Login monitor for tab {} failed: {}", self.tab_id, e);
                LoginOutcome::Aborted
            }
        }
    }
}

pub struct OAuthCoordinator {
    api: ApiConfig,
    login_timeout: Option<Duration>,
    http: Client,
    store: Arc<dyn Store>,
    tabs: Arc<dyn TabHost>,
    hub: TabEventHub,
    events: broadcast::Sender<AuthEvent>,
}

impl OAuthCoordinator {
    pub fn new(
        api: ApiConfig,
        oauth: &OAuthConfig,
        http: Client,
        store: Arc<dyn Store>,
        tabs: Arc<dyn TabHost>,
        hub: TabEventHub,
    ) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            api,
            login_timeout: oauth.login_timeout(),
            http,
            store,
            tabs,
            hub,
            events,
        }
    }

    pub fn hub(&self) -> &TabEventHub {
        &self.hub
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Fetches the authorization URL and opens it; no tab is opened on failure.
    pub async fn initiate_login(&self) -> Result<LoginAttempt, CoreError> {
        info!("Initiating Twitter OAuth login");
        let auth_uri = self.fetch_auth_uri().await?;

        let tab_id = self.tabs.open_tab(auth_uri.as_str()).await?;
        info!("Login tab created with ID: {}", tab_id);

        let subscription = self.hub.subscribe(tab_id);
        let (state_tx, state_rx) = watch::channel(MonitorState::AwaitingCallback);

        let monitor = TabMonitor {
            tab_id,
            callback_path: self.api.callback_path.clone(),
            deadline: self.login_timeout.map(|t| Instant::now() + t),
            http: self.http.clone(),
            store: Arc::clone(&self.store),
            tabs: Arc::clone(&self.tabs),
            events: self.events.clone(),
            state: state_tx,
        };

        Ok(LoginAttempt {
            tab_id,
            state: state_rx,
            monitor: tokio::spawn(monitor.run(subscription)),
        })
    }

    async fn fetch_auth_uri(&self) -> Result<Url, CoreError> {
        let url = format!("{}/auth/twitter", self.api.base_url.trim_end_matches('/'));
        debug!("Fetching auth URL from: {}", url);

        let response = self
            .http
            .get(&url)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(|e| AuthError::AuthUrlUnavailable {
                reason: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Auth URL request failed with status {}: {}", status, body);
            return Err(AuthError::AuthUrlUnavailable {
                reason: status
                    .canonical_reason()
                    .map(str::to_string)
                    .unwrap_or_else(|| status.to_string()),
            }
            .into());
        }

        let data: AuthUrlResponse = response.json().await.map_err(|e| {
            AuthError::AuthUrlUnavailable {
                reason: e.to_string(),
            }
        })?;

        let auth_uri = data
            .auth_uri
            .filter(|uri| !uri.is_empty())
            .ok_or(AuthError::MissingAuthUri)?;

        Url::parse(&auth_uri).map_err(|e| {
            AuthError::AuthUrlUnavailable {
                reason: format!("invalid auth_uri: {e}"),
            }
            .into()
        })
    }
}

struct TabMonitor {
    tab_id: TabId,
    callback_path: String,
    deadline: Option<Instant>,
    http: Client,
    store: Arc<dyn Store>,
    tabs: Arc<dyn TabHost>,
    events: broadcast::Sender<AuthEvent>,
    state: watch::Sender<MonitorState>,
}

impl TabMonitor {
    async fn run(self, mut subscription: TabSubscription) -> LoginOutcome {
        let outcome = loop {
            let event = match self.deadline {
                Some(deadline) => {
                    match tokio::time::timeout_at(deadline, subscription.recv()).await {
                        Ok(event) => event,
                        Err(_) => {
                            warn!("Login tab {} timed out waiting for callback", self.tab_id);
                            drop(subscription);
                            if let Err(e) = self.tabs.close_tab(self.tab_id).await {
                                e.log_warn();
                            }
                            break LoginOutcome::Aborted;
                        }
                    }
                }
                None => subscription.recv().await,
            };

            match event {
                Some(TabEvent::Navigated { url }) if url.contains(&self.callback_path) => {
                    info!("OAuth callback detected: {}", url);
                    drop(subscription);
                    break self.finish(&url).await;
                }
                Some(TabEvent::Navigated { .. }) => continue,
                Some(TabEvent::Closed) | None => {
                    info!("Login tab {} closed before callback", self.tab_id);
                    break LoginOutcome::Aborted;
                }
            }
        };

        let terminal = match outcome {
            LoginOutcome::Authenticated(_) => MonitorState::Completed,
            LoginOutcome::Rejected { .. } | LoginOutcome::Aborted => MonitorState::Aborted,
        };
        self.state.send_replace(terminal);
        outcome
    }

    async fn finish(&self, callback_url: &str) -> LoginOutcome {
        let session = match self.fetch_session(callback_url).await {
            Ok(session) => session,
            Err(e) => {
                e.log_warn();
                return LoginOutcome::Rejected {
                    reason: e.to_string(),
                };
            }
        };

        if let Err(e) = self.store.set_typed(keys::TWITTER_AUTH, &session).await {
            e.log_error();
            return LoginOutcome::Rejected {
                reason: e.to_string(),
            };
        }

        let username = session.username.clone().unwrap_or_default();
        info!("Twitter authentication successful: {}", username);

        if let Err(e) = self.tabs.close_tab(self.tab_id).await {
            e.log_warn();
        }

        if self
            .events
            .send(AuthEvent::TwitterAuthComplete {
                success: true,
                username,
            })
            .is_err()
        {
            debug!("No listeners for twitterAuthComplete");
        }

        LoginOutcome::Authenticated(session)
    }

    async fn fetch_session(&self, callback_url: &str) -> Result<TwitterAuth, CoreError> {
        let response = self.http.get(callback_url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AuthError::InvalidCallback {
                reason: format!("callback returned status {}", status.as_u16()),
            }
            .into());
        }

        let payload: CallbackPayload = response.json().await.map_err(|e| {
            AuthError::InvalidCallback {
                reason: e.to_string(),
            }
        })?;

        Ok(payload.into_session()?)
    }
}
