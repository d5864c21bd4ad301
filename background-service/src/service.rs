use async_trait::async_trait;
use feedlens_core::{
    ActionOutcome, AppConfig, CoreError, ErrorExt, MessageBus, Request, Response, StatsSnapshot,
    Store,
};
use llm_interface::Classifier;
use reqwest::Client;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use x_client::{
    CookieSource, DelegatedSession, LinkedAccount, LoginOutcome, OAuthCoordinator, TabEventHub,
    TabHost, LINKED_DISPLAY_NAME, LOGIN_STARTED_MESSAGE,
};

use crate::aggregator::Aggregator;

/// Host-provided browser capabilities.
pub struct BrowserHost {
    pub tabs: Arc<dyn TabHost>,
    pub hub: TabEventHub,
    pub cookies: Arc<dyn CookieSource>,
}

/// Coordinating context: owns classification, aggregation and both auth flows.
pub struct BackgroundService {
    classifier: Arc<Classifier>,
    aggregator: Arc<Aggregator>,
    store: Arc<dyn Store>,
    oauth: OAuthCoordinator,
    session: DelegatedSession,
    linked: LinkedAccount,
    pending: Mutex<JoinSet<()>>,
}

impl BackgroundService {
    pub fn new(
        config: &AppConfig,
        store: Arc<dyn Store>,
        browser: BrowserHost,
    ) -> Result<Self, CoreError> {
        let classifier = Arc::new(Classifier::new(config.llm.clone())?);
        let http = Client::builder().timeout(config.api.request_timeout()).build()?;

        let oauth = OAuthCoordinator::new(
            config.api.clone(),
            &config.oauth,
            http.clone(),
            Arc::clone(&store),
            browser.tabs,
            browser.hub,
        );
        let session = DelegatedSession::new(config.api.clone(), http.clone(), Arc::clone(&store));
        let linked = LinkedAccount::new(http, Arc::clone(&store), browser.cookies);

        Ok(Self {
            classifier,
            aggregator: Arc::new(Aggregator::new(Arc::clone(&store))),
            store,
            oauth,
            session,
            linked,
            pending: Mutex::new(JoinSet::new()),
        })
    }

    /// Loads user settings; call once at startup.
    pub async fn init(&self) -> Result<(), CoreError> {
        self.classifier.reload_settings(self.store.as_ref()).await
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }

    pub fn oauth(&self) -> &OAuthCoordinator {
        &self.oauth
    }

    /// Classifies one post and folds it into the stats.
    pub async fn analyze_post(&self, text: &str) -> Result<StatsSnapshot, CoreError> {
        let result = self.classifier.classify(text).await;
        self.aggregator.record(&result).await
    }

    /// Waits for every analysis spawned so far; new requests are not held up meanwhile.
    pub async fn wait_idle(&self) {
        let mut pending = std::mem::take(&mut *self.pending.lock().await);
        while let Some(joined) = pending.join_next().await {
            if let Err(e) = joined {
                warn!("Analysis task failed: {}", e);
            }
        }
    }

    pub async fn handle(&self, request: Request) -> Response {
        debug!("Background received message: {}", request.action());

        match request {
            Request::Ping => Response::Pong { pong: true },
            Request::AnalyzePost { text } => {
                debug!("Received post to analyze: {}", preview(&text));
                let classifier = Arc::clone(&self.classifier);
                let aggregator = Arc::clone(&self.aggregator);
                let mut pending = self.pending.lock().await;
                while pending.try_join_next().is_some() {}
                pending.spawn(async move {
                    let result = classifier.classify(&text).await;
                    if let Err(e) = aggregator.record(&result).await {
                        e.log_warn();
                    }
                });
                Response::ack("queued")
            }
            Request::GetStats => match self.aggregator.stats().await {
                Ok(stats) => Response::Stats(stats),
                Err(e) => {
                    e.log_warn();
                    Response::Stats(StatsSnapshot::default())
                }
            },
            Request::ReloadSettings => {
                if let Err(e) = self.init().await {
                    e.log_warn();
                }
                Response::ack("reloaded")
            }
            Request::InitiateTwitterLogin => Response::Outcome(self.initiate_login().await),
            Request::GetTwitterAuthStatus => Response::AuthStatus(self.session.auth_status().await),
            Request::LogoutTwitter => Response::Outcome(match self.session.logout().await {
                Ok(()) => ActionOutcome::ok(),
                Err(e) => ActionOutcome::failed(e.log_error().to_string()),
            }),
            Request::ExtractXTokens => Response::Outcome(match self.linked.extract_tokens().await {
                Ok(_) => ActionOutcome::ok().with_username(LINKED_DISPLAY_NAME),
                Err(e) => ActionOutcome::failed(e.log_warn().user_friendly_message()),
            }),
            Request::ToggleSidebar | Request::AnalyzeFeed => {
                warn!("{} must be sent to a page context", request.action());
                Response::Outcome(ActionOutcome::failed(format!(
                    "{} is handled by the page context",
                    request.action()
                )))
            }
        }
    }

    async fn initiate_login(&self) -> ActionOutcome {
        let attempt = match self.oauth.initiate_login().await {
            Ok(attempt) => attempt,
            Err(e) => return ActionOutcome::failed(e.log_error().user_friendly_message()),
        };

        let tab_id = attempt.tab_id;
        tokio::spawn(async move {
            match attempt.outcome().await {
                LoginOutcome::Authenticated(session) => {
                    info!(
                        "Login tab {} completed for {}",
                        tab_id,
                        session.username.unwrap_or_default()
                    );
                }
                LoginOutcome::Rejected { reason } => {
                    warn!("Login tab {} returned no session: {}", tab_id, reason);
                }
                LoginOutcome::Aborted => info!("Login tab {} aborted", tab_id),
            }
        });

        ActionOutcome::ok().with_message(LOGIN_STARTED_MESSAGE)
    }
}

/// In-process bus for hosts that run both contexts in one task tree.
#[async_trait]
impl MessageBus for BackgroundService {
    async fn send(&self, request: Request) -> Result<Response, CoreError> {
        Ok(self.handle(request).await)
    }
}

fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}
