use feedlens_core::{
    keys, ApiConfig, AuthError, AuthStatus, CoreError, Store, StoreExt, TwitterAuth,
};
use reqwest::{Client, Method, Response};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Delegated-login session persisted under `twitterAuth`.
pub struct DelegatedSession {
    api: ApiConfig,
    http: Client,
    store: Arc<dyn Store>,
}

impl DelegatedSession {
    pub fn new(api: ApiConfig, http: Client, store: Arc<dyn Store>) -> Self {
        Self { api, http, store }
    }

    pub async fn current(&self) -> Result<Option<TwitterAuth>, CoreError> {
        self.store.get_typed(keys::TWITTER_AUTH).await
    }

    /// Never fails; store problems are reported in the `error` field.
    pub async fn auth_status(&self) -> AuthStatus {
        match self.current().await {
            Ok(Some(auth)) if auth.is_valid() => AuthStatus {
                is_authenticated: true,
                username: auth.username,
                user_id: auth.user_id,
                authenticated_at: auth.authenticated_at,
                error: None,
            },
            Ok(_) => AuthStatus::default(),
            Err(e) => {
                warn!("Error getting Twitter auth status: {}", e);
                AuthStatus {
                    error: Some(e.to_string()),
                    ..AuthStatus::default()
                }
            }
        }
    }

    pub async fn logout(&self) -> Result<(), CoreError> {
        self.store.remove(keys::TWITTER_AUTH).await?;
        info!("Twitter logout successful");
        Ok(())
    }

    /// Bearer-authenticated call to `{base_url}{endpoint}`.
    ///
    /// A 401 tears the local session down before the error is returned.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> Result<Response, CoreError> {
        let token = self
            .current()
            .await?
            .and_then(|auth| auth.token)
            .filter(|t| !t.is_empty())
            .ok_or(AuthError::NotAuthenticated)?;

        let url = format!("{}{}", self.api.base_url.trim_end_matches('/'), endpoint);
        debug!("Authenticated request: {} {}", method, endpoint);

        let mut builder = self
            .http
            .request(method, &url)
            .bearer_auth(token)
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        if response.status().as_u16() == 401 {
            warn!("Session rejected by {}, logging out", endpoint);
            self.logout().await?;
            return Err(AuthError::SessionExpired.into());
        }

        Ok(response)
    }
}
