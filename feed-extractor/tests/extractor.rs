use async_trait::async_trait;
use feed_extractor::{DocumentSource, FeedExtractor, FeedRun};
use feedlens_core::{
    keys, ActionOutcome, CoreError, DiversitySnapshot, ExtractorConfig, MemoryStore, MessageBus,
    Request, Response, StatsSnapshot, Store, StoreExt,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Default)]
struct RecordingBus {
    sent: Mutex<Vec<Request>>,
    disconnected: bool,
}

impl RecordingBus {
    fn texts(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter_map(|r| match r {
                Request::AnalyzePost { text } => Some(text.clone()),
                _ => None,
            })
            .collect()
    }
}

#[async_trait]
impl MessageBus for RecordingBus {
    async fn send(&self, request: Request) -> Result<Response, CoreError> {
        self.sent.lock().unwrap().push(request);
        if self.disconnected {
            return Err(CoreError::ContextInvalidated {
                context: "page".to_string(),
            });
        }
        Ok(Response::ack("queued"))
    }
}

/// Returns queued snapshots in order, then repeats the last one.
struct ScriptedSource {
    pages: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    fn new(pages: Vec<String>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DocumentSource for ScriptedSource {
    async fn snapshot(&self) -> Result<String, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut pages = self.pages.lock().unwrap();
        if pages.len() > 1 {
            Ok(pages.pop_front().unwrap_or_default())
        } else {
            Ok(pages.front().cloned().unwrap_or_default())
        }
    }
}

fn article(text: &str, author: &str, id: u64, repost: bool) -> String {
    let social = if repost { "<span>Someone reposted</span>" } else { "" };
    format!(
        r#"<article data-testid="tweet">{social}
            <div data-testid="User-Name"><a href="/{author}">{author}</a><a href="/{author}/status/{id}">1h</a></div>
            <div data-testid="tweetText">{text}</div>
          </article>"#
    )
}

fn page(articles: &[String]) -> String {
    format!("<html><body><main>{}</main></body></html>", articles.join("\n"))
}

fn fast_config() -> ExtractorConfig {
    ExtractorConfig {
        retry_delay_ms: 1,
        ..ExtractorConfig::default()
    }
}

fn extractor(
    store: Arc<MemoryStore>,
    bus: Arc<RecordingBus>,
    url: &str,
) -> FeedExtractor {
    FeedExtractor::new(fast_config(), store, bus, url).unwrap()
}

#[tokio::test]
async fn test_each_post_is_forwarded_once() {
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(RecordingBus::default());
    let extractor = extractor(store.clone(), bus.clone(), "https://x.com/home");

    let html = page(&[
        article("Medicare for all", "alice", 1, false),
        article("Lower taxes now", "bob", 2, true),
        article("Medicare for all", "carol", 3, false),
    ]);
    let source = ScriptedSource::new(vec![html]);

    assert_eq!(
        extractor.analyze_feed(&source).await.unwrap(),
        FeedRun::Forwarded { count: 2 }
    );
    assert_eq!(
        extractor.analyze_feed(&source).await.unwrap(),
        FeedRun::Forwarded { count: 0 }
    );
    assert_eq!(bus.texts(), vec!["Medicare for all", "Lower taxes now"]);

    let diversity: DiversitySnapshot = store.get_or_default(keys::DIVERSITY_DATA).await.unwrap();
    assert_eq!(diversity.original, 1);
    assert_eq!(diversity.retweet, 1);
    assert!(diversity.authors.contains("alice"));
    assert!(!diversity.authors.contains("carol"));

    let analyzed: Vec<String> = store.get_or_default(keys::ANALYZED_POSTS).await.unwrap();
    assert_eq!(analyzed.len(), 2);
}

#[tokio::test]
async fn test_batch_limit_defers_remaining_posts() {
    let store = Arc::new(MemoryStore::new());
    let bus = Arc::new(RecordingBus::default());
    let extractor = extractor(store, bus.clone(), "https://x.com/home");

    let articles: Vec<String> = (0..14)
        .map(|i| article(&format!("post number {i}"), "dana", i, false))
        .collect();
    let source = ScriptedSource::new(vec![page(&articles)]);

    assert_eq!(
        extractor.analyze_feed(&source).await.unwrap(),
        FeedRun::Forwarded { count: 10 }
    );
    assert_eq!(
        extractor.analyze_feed(&source).await.unwrap(),
        FeedRun::Forwarded { count: 4 }
    );
    assert_eq!(bus.texts().len(), 14);
}

#[tokio::test]
async fn test_empty_feed_retries_then_gives_up() {
    let bus = Arc::new(RecordingBus::default());
    let extractor = extractor(Arc::new(MemoryStore::new()), bus.clone(), "https://x.com/home");
    let source = ScriptedSource::new(vec![page(&[])]);

    assert_eq!(
        extractor.analyze_feed(&source).await.unwrap(),
        FeedRun::Empty { attempts: 4 }
    );
    assert_eq!(source.calls(), 4);
    assert!(bus.texts().is_empty());
}

#[tokio::test]
async fn test_retry_picks_up_late_items() {
    let bus = Arc::new(RecordingBus::default());
    let extractor = extractor(Arc::new(MemoryStore::new()), bus.clone(), "https://x.com/home");
    let source = ScriptedSource::new(vec![
        page(&[]),
        page(&[]),
        page(&[article("finally loaded", "erin", 5, false)]),
    ]);

    assert_eq!(
        extractor.analyze_feed(&source).await.unwrap(),
        FeedRun::Forwarded { count: 1 }
    );
    assert_eq!(source.calls(), 3);
}

#[tokio::test]
async fn test_trigger_during_a_run_is_skipped() {
    let bus = Arc::new(RecordingBus::default());
    let config = ExtractorConfig {
        retry_delay_ms: 200,
        ..ExtractorConfig::default()
    };
    let extractor =
        FeedExtractor::new(config, Arc::new(MemoryStore::new()), bus.clone(), "https://x.com/home")
            .unwrap();
    let source = ScriptedSource::new(vec![
        page(&[]),
        page(&[article("slow timeline", "lee", 7, false)]),
    ]);

    let (first, second) = tokio::join!(extractor.analyze_feed(&source), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        extractor.analyze_feed(&source).await
    });

    assert_eq!(second.unwrap(), FeedRun::Skipped);
    assert_eq!(first.unwrap(), FeedRun::Forwarded { count: 1 });
    assert_eq!(source.calls(), 2);
    assert_eq!(bus.texts(), vec!["slow timeline"]);

    // The flag is released once the run ends.
    assert_eq!(
        extractor.analyze_feed(&source).await.unwrap(),
        FeedRun::Forwarded { count: 0 }
    );
}

#[tokio::test]
async fn test_analyze_feed_request_runs_a_scan() {
    let bus = Arc::new(RecordingBus::default());
    let extractor = extractor(Arc::new(MemoryStore::new()), bus.clone(), "https://x.com/home");
    let source = ScriptedSource::new(vec![page(&[
        article("refresh one", "mo", 8, false),
        article("refresh two", "ned", 9, true),
    ])]);

    let response = extractor.handle(Request::AnalyzeFeed, &source).await;
    assert_eq!(response, Response::ack("started"));
    assert_eq!(
        serde_json::to_value(&response).unwrap(),
        json!({ "status": "started" })
    );
    assert_eq!(bus.texts(), vec!["refresh one", "refresh two"]);
    assert_eq!(extractor.seen_count().await, 2);
}

#[tokio::test]
async fn test_page_requests_stay_local_and_others_are_relayed() {
    let bus = Arc::new(RecordingBus::default());
    let extractor = extractor(Arc::new(MemoryStore::new()), bus.clone(), "https://x.com/home");
    let source = ScriptedSource::new(vec![page(&[])]);

    assert_eq!(
        extractor.handle(Request::ToggleSidebar, &source).await,
        Response::ack("toggled")
    );
    assert!(bus.sent.lock().unwrap().is_empty());
    assert_eq!(source.calls(), 0);

    extractor.handle(Request::GetStats, &source).await;
    assert_eq!(*bus.sent.lock().unwrap(), vec![Request::GetStats]);
}

#[tokio::test]
async fn test_relay_failure_reports_reload_hint() {
    let bus = Arc::new(RecordingBus {
        disconnected: true,
        ..RecordingBus::default()
    });
    let extractor = extractor(Arc::new(MemoryStore::new()), bus, "https://x.com/home");
    let source = ScriptedSource::new(vec![page(&[])]);

    assert_eq!(
        extractor.handle(Request::LogoutTwitter, &source).await,
        Response::Outcome(ActionOutcome::failed(
            "Extension was reloaded. Please refresh the page."
        ))
    );
}

#[tokio::test]
async fn test_bus_failures_are_swallowed() {
    let bus = Arc::new(RecordingBus {
        disconnected: true,
        ..RecordingBus::default()
    });
    let extractor = extractor(Arc::new(MemoryStore::new()), bus.clone(), "https://x.com/home");
    let source = ScriptedSource::new(vec![page(&[article("still counted", "fay", 6, false)])]);

    assert_eq!(
        extractor.analyze_feed(&source).await.unwrap(),
        FeedRun::Forwarded { count: 1 }
    );
    assert_eq!(extractor.seen_count().await, 1);
}

#[tokio::test]
async fn test_status_ids_only_on_results_page() {
    let bus = Arc::new(RecordingBus::default());
    let store = Arc::new(MemoryStore::new());
    let extractor = extractor(store.clone(), bus, "https://x.com/home");
    let html = page(&[
        article("one", "gus", 111, false),
        article("two", "gus", 222, false),
    ]);

    extractor.scan(&html).await;
    assert!(extractor.status_ids().await.is_empty());

    extractor.set_url("https://x.com/search?q=rust").await;
    assert!(extractor.is_results_page().await);
    // Ids are collected even for posts already seen.
    extractor.scan(&html).await;
    assert_eq!(extractor.status_ids().await, vec!["111", "222"]);

    extractor.set_url("https://x.com/search?q=other").await;
    assert!(extractor.status_ids().await.is_empty());

    // Ids are never persisted.
    assert!(store.get("statusIds").await.unwrap().is_none());
}

#[tokio::test]
async fn test_status_id_set_is_bounded() {
    let config = ExtractorConfig {
        max_status_ids: 3,
        ..fast_config()
    };
    let extractor = FeedExtractor::new(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingBus::default()),
        "https://x.com/search/live",
    )
    .unwrap();

    let articles: Vec<String> = (0..6)
        .map(|i| article(&format!("p{i}"), "hal", 1000 + i, false))
        .collect();
    extractor.scan(&page(&articles)).await;
    assert_eq!(extractor.status_ids().await.len(), 3);
}

#[tokio::test]
async fn test_persisted_state_suppresses_known_posts() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(keys::ANALYZED_POSTS, json!(["already seen"]))
        .await
        .unwrap();
    store
        .set(
            keys::DIVERSITY_DATA,
            json!({ "authors": ["ivy"], "original": 4, "retweet": 1 }),
        )
        .await
        .unwrap();
    store.set(keys::DARK_MODE, json!(true)).await.unwrap();

    let extractor = extractor(store, Arc::new(RecordingBus::default()), "https://x.com/home");
    extractor.load_persisted().await.unwrap();
    assert!(extractor.dark_mode().await);

    let posts = extractor
        .scan(&page(&[
            article("already seen", "ivy", 1, false),
            article("brand new", "jon", 2, false),
        ]))
        .await;
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].text, "brand new");

    let diversity = extractor.diversity().await;
    assert_eq!(diversity.original, 5);
    assert_eq!(diversity.authors.len(), 2);
}

#[tokio::test]
async fn test_reset_clears_everything() {
    let store = Arc::new(MemoryStore::new());
    let extractor = extractor(store.clone(), Arc::new(RecordingBus::default()), "https://x.com/home");

    let mut stats = StatsSnapshot::default();
    stats.left = 3;
    stats.total = 3;
    store.set_typed(keys::BIAS_STATS, &stats).await.unwrap();
    extractor
        .scan(&page(&[article("something", "kim", 1, false)]))
        .await;

    extractor.reset().await.unwrap();

    assert_eq!(extractor.seen_count().await, 0);
    assert_eq!(extractor.diversity().await.original, 0);
    let stats: StatsSnapshot = store.get_or_default(keys::BIAS_STATS).await.unwrap();
    assert_eq!(stats, StatsSnapshot::default());
    assert_eq!(store.get(keys::ANALYZED_POSTS).await.unwrap(), Some(json!([])));

    // A post seen before the reset is new again.
    let posts = extractor
        .scan(&page(&[article("something", "kim", 1, false)]))
        .await;
    assert_eq!(posts.len(), 1);
}

#[tokio::test]
async fn test_toggle_dark_mode_persists() {
    let store = Arc::new(MemoryStore::new());
    let extractor = extractor(store.clone(), Arc::new(RecordingBus::default()), "https://x.com/home");

    assert!(extractor.toggle_dark_mode().await.unwrap());
    assert_eq!(store.get(keys::DARK_MODE).await.unwrap(), Some(json!(true)));
    assert!(!extractor.toggle_dark_mode().await.unwrap());
}
