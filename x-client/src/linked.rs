//! Linked-account capture from the browser's X session cookies.

use async_trait::async_trait;
use chrono::Utc;
use feedlens_core::{keys, AuthError, CoreError, Store, StoreExt, XAuth};
use reqwest::{Client, Method};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;

/// Static bearer token used by X's own web client.
pub const X_WEB_BEARER_TOKEN: &str = "AAAAAAAAAAAAAAAAAAAAANRILgAAAAAAnNwIzUejRCOuH5E6I8xnZz4puTs%3D1Zv7ttfk8LF81IUq16cHjhLTvJu4FA33AGWWjCpTnA";

/// Searched in order; the first `auth_token` and `ct0` found win.
pub const COOKIE_DOMAINS: [&str; 2] = [".x.com", ".twitter.com"];

/// Stored until a real handle is resolved.
pub const PLACEHOLDER_USERNAME: &str = "Connected";

/// Shown to the user after a successful link.
pub const LINKED_DISPLAY_NAME: &str = "X Account";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

#[async_trait]
pub trait CookieSource: Send + Sync {
    async fn cookies_for(&self, domain: &str) -> Result<Vec<Cookie>, CoreError>;
}

pub struct LinkedAccount {
    http: Client,
    store: Arc<dyn Store>,
    cookies: Arc<dyn CookieSource>,
}

impl LinkedAccount {
    pub fn new(http: Client, store: Arc<dyn Store>, cookies: Arc<dyn CookieSource>) -> Self {
        Self {
            http,
            store,
            cookies,
        }
    }

    pub async fn current(&self) -> Result<Option<XAuth>, CoreError> {
        self.store.get_typed(keys::X_AUTH).await
    }

    /// Captures `auth_token` and `ct0` and persists them as `xAuth`.
    pub async fn extract_tokens(&self) -> Result<XAuth, CoreError> {
        debug!("Extracting X tokens");

        let mut all = Vec::new();
        for domain in COOKIE_DOMAINS {
            all.extend(self.cookies.cookies_for(domain).await?);
        }
        debug!("Found {} cookies", all.len());

        let mut auth_token = None;
        let mut ct0 = None;
        for cookie in all {
            match cookie.name.as_str() {
                "auth_token" if auth_token.is_none() => auth_token = Some(cookie.value),
                "ct0" if ct0.is_none() => ct0 = Some(cookie.value),
                _ => {}
            }
        }

        let (Some(auth_token), Some(ct0)) = (
            auth_token.filter(|v| !v.is_empty()),
            ct0.filter(|v| !v.is_empty()),
        ) else {
            info!("X session cookies missing");
            return Err(AuthError::MissingSessionCookies.into());
        };

        let x_auth = XAuth {
            auth_token,
            ct0,
            bearer_token: X_WEB_BEARER_TOKEN.to_string(),
            username: PLACEHOLDER_USERNAME.to_string(),
            connected: true,
            connected_at: Utc::now(),
        };
        self.store.set_typed(keys::X_AUTH, &x_auth).await?;

        info!("Tokens extracted successfully");
        Ok(x_auth)
    }

    pub async fn disconnect(&self) -> Result<(), CoreError> {
        self.store.remove(keys::X_AUTH).await
    }

    /// Calls an X endpoint with the captured session and returns the JSON body.
    pub async fn api_call(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Value, CoreError> {
        let x_auth = self
            .current()
            .await?
            .filter(|a| !a.auth_token.is_empty() && !a.ct0.is_empty())
            .ok_or(AuthError::AccountNotLinked)?;

        let url = Url::parse(endpoint).map_err(|e| CoreError::InvalidInput {
            message: format!("{endpoint}: {e}"),
        })?;

        let send_body = method != Method::GET;
        let mut builder = self
            .http
            .request(method, url)
            .bearer_auth(&x_auth.bearer_token)
            .header("x-csrf-token", &x_auth.ct0)
            .header(
                "Cookie",
                format!("auth_token={}; ct0={}", x_auth.auth_token, x_auth.ct0),
            )
            .header("Content-Type", "application/json");
        if let (true, Some(body)) = (send_body, body) {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            error!("X API error: {} for {}", status, endpoint);
            if status.as_u16() == 401 {
                warn!("X session rejected, removing linked account");
                self.disconnect().await?;
            }
            return Err(AuthError::ApiStatus {
                status_code: status.as_u16(),
            }
            .into());
        }

        Ok(response.json().await?)
    }
}
