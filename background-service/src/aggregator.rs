use chrono::Utc;
use feedlens_core::{
    keys, ClassificationResult, CoreError, DiversitySnapshot, StatsReport, StatsSnapshot, Store,
    StoreExt,
};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Folds classification results into the persisted `biasStats` counters.
///
/// Records from this process are serialized; writers in other contexts still race with
/// last-writer-wins semantics.
pub struct Aggregator {
    store: Arc<dyn Store>,
    write_lock: Mutex<()>,
}

impl Aggregator {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
        }
    }

    pub async fn record(&self, result: &ClassificationResult) -> Result<StatsSnapshot, CoreError> {
        let _guard = self.write_lock.lock().await;

        let mut stats: StatsSnapshot = self.store.get_or_default(keys::BIAS_STATS).await?;
        stats.apply(result, Utc::now());
        self.store.set_typed(keys::BIAS_STATS, &stats).await?;

        debug!(
            "Stats updated: left={} center={} right={} total={}",
            stats.left, stats.center, stats.right, stats.total
        );
        Ok(stats)
    }

    pub async fn stats(&self) -> Result<StatsSnapshot, CoreError> {
        self.store.get_or_default(keys::BIAS_STATS).await
    }

    pub async fn report(&self) -> Result<StatsReport, CoreError> {
        let stats = self.stats().await?;
        let diversity: DiversitySnapshot = self.store.get_or_default(keys::DIVERSITY_DATA).await?;
        Ok(StatsReport::new(stats, &diversity))
    }
}
