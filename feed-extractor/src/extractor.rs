use async_trait::async_trait;
use chrono::Utc;
use feedlens_core::{
    keys, ActionOutcome, CoreError, DiversitySnapshot, ErrorExt, ExtractorConfig, MessageBus,
    Post, Request, Response, StatsSnapshot, Store, StoreExt,
};
use serde_json::json;
use std::collections::{BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::parse::{is_results_page, FeedItem, FeedSelectors};

/// Supplies the current rendered document.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    async fn snapshot(&self) -> Result<String, CoreError>;
}

/// What one `analyze_feed` trigger did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedRun {
    /// Another run was already in flight.
    Skipped,
    /// No feed items appeared within the retry budget.
    Empty { attempts: u32 },
    Forwarded { count: usize },
}

#[derive(Debug, Default)]
struct PageState {
    seen: BTreeSet<String>,
    authors: BTreeSet<String>,
    original: u64,
    retweet: u64,
    status_ids: HashSet<String>,
    results_page: bool,
    dark_mode: bool,
}

impl PageState {
    fn diversity(&self) -> DiversitySnapshot {
        DiversitySnapshot {
            authors: self.authors.clone(),
            original: self.original,
            retweet: self.retweet,
            last_updated: Some(Utc::now()),
        }
    }

    fn record_status_id(&mut self, id: &str, cap: usize) {
        if self.status_ids.len() >= cap || !self.status_ids.insert(id.to_string()) {
            return;
        }
        let total = self.status_ids.len();
        debug!("Tweet ID extracted: {} (Total: {})", id, total);
        if total == 50 {
            info!("50 tweet IDs extracted");
        } else if total == 100 {
            info!("100 tweet IDs extracted: {:?}", self.status_ids);
        }
    }
}

/// Clears the in-flight flag when a run ends.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Page-side pipeline: finds new posts, tracks diversity and forwards them for analysis.
pub struct FeedExtractor {
    config: ExtractorConfig,
    selectors: FeedSelectors,
    store: Arc<dyn Store>,
    bus: Arc<dyn MessageBus>,
    state: Mutex<PageState>,
    in_flight: AtomicBool,
}

impl FeedExtractor {
    pub fn new(
        config: ExtractorConfig,
        store: Arc<dyn Store>,
        bus: Arc<dyn MessageBus>,
        url: &str,
    ) -> Result<Self, CoreError> {
        let state = PageState {
            results_page: is_results_page(url),
            ..PageState::default()
        };

        Ok(Self {
            config,
            selectors: FeedSelectors::new()?,
            store,
            bus,
            state: Mutex::new(state),
            in_flight: AtomicBool::new(false),
        })
    }

    /// Seeds the seen-set, authors and counters from the store.
    pub async fn load_persisted(&self) -> Result<(), CoreError> {
        let dark_mode: bool = self.store.get_or_default(keys::DARK_MODE).await?;
        let diversity: DiversitySnapshot = self.store.get_or_default(keys::DIVERSITY_DATA).await?;
        let analyzed: Vec<String> = self.store.get_or_default(keys::ANALYZED_POSTS).await?;

        let mut state = self.state.lock().await;
        state.dark_mode = dark_mode;
        state.authors.extend(diversity.authors);
        state.original = diversity.original;
        state.retweet = diversity.retweet;
        state.seen.extend(analyzed);

        info!(
            "Loaded {} analyzed posts and {} authors",
            state.seen.len(),
            state.authors.len()
        );
        Ok(())
    }

    /// Tracks single-page navigation; entering a results page clears collected ids.
    pub async fn set_url(&self, url: &str) {
        let results_page = is_results_page(url);
        let mut state = self.state.lock().await;
        if results_page {
            debug!("Search page detected, will extract tweet IDs");
            state.status_ids.clear();
        }
        state.results_page = results_page;
    }

    pub async fn is_results_page(&self) -> bool {
        self.state.lock().await.results_page
    }

    /// Accepts at most `batch_size` unseen posts from `html`.
    pub async fn scan(&self, html: &str) -> Vec<Post> {
        let items = self.selectors.parse(html, self.config.fallback_text_len);
        self.accept(items).await
    }

    async fn accept(&self, items: Vec<FeedItem>) -> Vec<Post> {
        let mut state = self.state.lock().await;
        let mut accepted = Vec::new();

        for item in items {
            if state.results_page {
                if let Some(id) = &item.status_id {
                    state.record_status_id(id, self.config.max_status_ids);
                }
            }

            let Some(text) = item.text.filter(|t| !t.is_empty()) else {
                continue;
            };
            if !state.seen.insert(text.clone()) {
                continue;
            }

            debug!("New tweet found: {}", preview(&text));
            if let Some(author) = &item.author {
                state.authors.insert(author.clone());
            }
            if item.is_retweet {
                state.retweet += 1;
            } else {
                state.original += 1;
            }
            self.persist(&state).await;

            accepted.push(Post {
                text,
                author: item.author,
                is_retweet: item.is_retweet,
            });
            if accepted.len() >= self.config.batch_size {
                break;
            }
        }

        accepted
    }

    async fn persist(&self, state: &PageState) {
        let entries = match (
            serde_json::to_value(state.diversity()),
            serde_json::to_value(&state.seen),
        ) {
            (Ok(diversity), Ok(seen)) => vec![
                (keys::DIVERSITY_DATA.to_string(), diversity),
                (keys::ANALYZED_POSTS.to_string(), seen),
            ],
            (Err(e), _) | (_, Err(e)) => {
                warn!("Could not encode page state: {}", e);
                return;
            }
        };

        if let Err(e) = self.store.set_many(entries).await {
            e.log_warn();
        }
    }

    /// One trigger: waits for feed items, then forwards every new post.
    pub async fn analyze_feed(&self, source: &dyn DocumentSource) -> Result<FeedRun, CoreError> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("Already analyzing...");
            return Ok(FeedRun::Skipped);
        }
        let _guard = InFlight(&self.in_flight);

        let mut attempts = 0;
        let items = loop {
            attempts += 1;
            let html = source.snapshot().await?;
            let items = self.selectors.parse(&html, self.config.fallback_text_len);
            debug!("Found {} tweets on page", items.len());

            if !items.is_empty() {
                break items;
            }
            if attempts > self.config.max_retries {
                info!("No tweets found after {} attempts", attempts);
                return Ok(FeedRun::Empty { attempts });
            }
            debug!("No tweets found. Waiting and retrying...");
            tokio::time::sleep(self.config.retry_delay()).await;
        };

        let posts = self.accept(items).await;
        for post in &posts {
            let request = Request::AnalyzePost {
                text: post.text.clone(),
            };
            if let Err(e) = self.bus.send(request).await {
                warn!("Extension context error, message not sent: {}", e);
            }
        }

        info!(
            "Sent {} new posts for analysis ({} unique seen)",
            posts.len(),
            self.seen_count().await
        );
        Ok(FeedRun::Forwarded { count: posts.len() })
    }

    /// Page-context dispatcher for messages from the popup and options surfaces.
    ///
    /// `analyzeFeed` runs one scan before acknowledging; actions owned by the background
    /// context are relayed over the bus.
    pub async fn handle(&self, request: Request, source: &dyn DocumentSource) -> Response {
        debug!("Page received message: {}", request.action());

        match request {
            Request::AnalyzeFeed => {
                match self.analyze_feed(source).await {
                    Ok(run) => debug!("Requested scan finished: {:?}", run),
                    Err(e) => {
                        e.log_warn();
                    }
                }
                Response::ack("started")
            }
            Request::ToggleSidebar => Response::ack("toggled"),
            other => match self.bus.send(other).await {
                Ok(response) => response,
                Err(e) => Response::Outcome(ActionOutcome::failed(
                    e.log_warn().user_friendly_message(),
                )),
            },
        }
    }

    /// Writes zeroed stats and clears everything seen so far.
    pub async fn reset(&self) -> Result<(), CoreError> {
        self.store
            .set_many(vec![
                (
                    keys::BIAS_STATS.to_string(),
                    serde_json::to_value(StatsSnapshot::default())?,
                ),
                (
                    keys::DIVERSITY_DATA.to_string(),
                    serde_json::to_value(DiversitySnapshot::default())?,
                ),
                (keys::ANALYZED_POSTS.to_string(), json!([])),
            ])
            .await?;

        let mut state = self.state.lock().await;
        state.seen.clear();
        state.authors.clear();
        state.original = 0;
        state.retweet = 0;
        state.status_ids.clear();
        info!("Statistics reset");
        Ok(())
    }

    pub async fn dark_mode(&self) -> bool {
        self.state.lock().await.dark_mode
    }

    pub async fn toggle_dark_mode(&self) -> Result<bool, CoreError> {
        let mut state = self.state.lock().await;
        let dark_mode = !state.dark_mode;
        self.store.set_typed(keys::DARK_MODE, &dark_mode).await?;
        state.dark_mode = dark_mode;
        Ok(dark_mode)
    }

    pub async fn diversity(&self) -> DiversitySnapshot {
        self.state.lock().await.diversity()
    }

    pub async fn seen_count(&self) -> usize {
        self.state.lock().await.seen.len()
    }

    pub async fn status_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.state.lock().await.status_ids.iter().cloned().collect();
        ids.sort();
        ids
    }
}

fn preview(text: &str) -> String {
    text.chars().take(50).collect()
}
