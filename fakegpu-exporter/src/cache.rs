//! Cached exposition document and its periodic refresher.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tokio::sync::{Mutex, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::collector::MetricCollector;

/// One fully rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    /// Exposition text, or a single-line error marker.
    pub body: String,
    /// When the document was produced.
    pub rendered_at: DateTime<Utc>,
    /// Whether the pass that produced it succeeded.
    pub ok: bool,
}

impl RenderedDocument {
    pub fn new(body: String, ok: bool) -> Self {
        Self {
            body,
            rendered_at: Utc::now(),
            ok,
        }
    }
}

/// Cache statistics.
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    /// Refresh passes run.
    pub refreshes: u64,
    /// Passes that produced an error marker.
    pub failed_refreshes: u64,
    /// Last successful refresh.
    pub last_success: Option<DateTime<Utc>>,
}

/// Single-slot document cache.
///
/// A refresh holds the slot lock for the whole pass, so readers see either
/// the previous document or the new one, never a mix.
pub struct MetricCache {
    current: Mutex<Arc<RenderedDocument>>,
    stats: RwLock<CacheStats>,
}

impl MetricCache {
    /// Create a cache holding an empty document.
    pub fn new() -> Self {
        Self {
            current: Mutex::new(Arc::new(RenderedDocument::new(String::new(), true))),
            stats: RwLock::new(CacheStats::default()),
        }
    }

    /// Current document handle.
    pub async fn current(&self) -> Arc<RenderedDocument> {
        self.current.lock().await.clone()
    }

    /// Run one collection pass and replace the document with its result.
    ///
    /// A failed pass stores the error marker.
    pub async fn refresh(&self, collector: &mut MetricCollector) -> Arc<RenderedDocument> {
        let mut slot = self.current.lock().await;

        let document = match collector.render().await {
            Ok(body) => RenderedDocument::new(body, true),
            Err(e) => {
                warn!(error = %e, "Metric collection failed");
                RenderedDocument::new(e.marker().to_string(), false)
            }
        };
        let document = Arc::new(document);
        *slot = document.clone();
        drop(slot);

        let mut stats = self.stats.write();
        stats.refreshes += 1;
        if document.ok {
            stats.last_success = Some(document.rendered_at);
        } else {
            stats.failed_refreshes += 1;
        }

        document
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.read().clone()
    }
}

impl Default for MetricCache {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a shareable cache handle.
pub type SharedCache = Arc<MetricCache>;

/// Periodically refreshes the cache. Owns the collector.
pub struct Refresher {
    cache: SharedCache,
    collector: MetricCollector,
    interval: Duration,
}

impl Refresher {
    pub fn new(cache: SharedCache, collector: MetricCollector, interval: Duration) -> Self {
        Self {
            cache,
            collector,
            interval,
        }
    }

    /// Refresh now, outside the schedule.
    pub async fn refresh_now(&mut self) -> Arc<RenderedDocument> {
        self.cache.refresh(&mut self.collector).await
    }

    /// Refresh on a fixed period until the shutdown signal is received.
    ///
    /// A pass that overruns delays the next one.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; the initial pass already ran.
        interval.tick().await;

        info!(
            interval_secs = self.interval.as_secs_f64(),
            source = self.collector.source().name(),
            "Starting metric refresher"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    let document = self.cache.refresh(&mut self.collector).await;
                    debug!(ok = document.ok, bytes = document.body.len(), "Cache refreshed");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("Metric refresher stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{DeviceDirectory, DeviceSource};
    use crate::dcgmi::DcgmiSource;
    use fakegpu_profiles::{ProfileAssignment, ProfileEngine, ProfileKind};

    fn synthetic() -> MetricCollector {
        let engine = ProfileEngine::new(
            &ProfileAssignment::uniform(ProfileKind::Chaos),
            1..=2,
            Some(3),
        );
        MetricCollector::new(
            DeviceSource::Synthetic(engine),
            DeviceDirectory::new(1, 2),
            "cache-host".to_string(),
        )
    }

    #[tokio::test]
    async fn test_new_cache_is_empty() {
        let cache = MetricCache::new();
        assert!(cache.current().await.body.is_empty());
        assert_eq!(cache.stats().refreshes, 0);
    }

    #[tokio::test]
    async fn test_refresh_replaces_document() {
        let cache = MetricCache::new();
        let mut collector = synthetic();

        let document = cache.refresh(&mut collector).await;
        assert!(document.ok);
        assert_eq!(cache.current().await.body, document.body);
        assert!(document.body.contains("dcgm_gpu_temp{gpu=\"1\""));

        let stats = cache.stats();
        assert_eq!(stats.refreshes, 1);
        assert_eq!(stats.failed_refreshes, 0);
        assert!(stats.last_success.is_some());
    }

    #[tokio::test]
    async fn test_failed_refresh_stores_marker() {
        let cache = MetricCache::new();
        let source = DcgmiSource::new("/nonexistent/dcgmi", Duration::from_secs(1));
        let mut collector = MetricCollector::new(
            DeviceSource::Dcgmi(source),
            DeviceDirectory::new(1, 1),
            "cache-host".to_string(),
        );

        let document = cache.refresh(&mut collector).await;
        assert!(!document.ok);
        assert_eq!(document.body, "# Error: collection failed\n");
        assert_eq!(cache.stats().failed_refreshes, 1);
    }

    #[tokio::test]
    async fn test_concurrent_reads_are_identical() {
        let cache = Arc::new(MetricCache::new());
        let mut collector = synthetic();
        cache.refresh(&mut collector).await;

        let a = tokio::spawn({
            let cache = cache.clone();
            async move { cache.current().await }
        });
        let b = tokio::spawn({
            let cache = cache.clone();
            async move { cache.current().await }
        });

        let (a, b) = (a.await.unwrap(), b.await.unwrap());
        assert_eq!(a.body, b.body);
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[tokio::test]
    async fn test_refresher_stops_on_shutdown() {
        let cache = Arc::new(MetricCache::new());
        let refresher = Refresher::new(cache.clone(), synthetic(), Duration::from_millis(10));
        let (tx, rx) = watch::channel(false);

        let task = tokio::spawn(refresher.run(rx));
        tokio::time::sleep(Duration::from_millis(60)).await;
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .unwrap()
            .unwrap();
        assert!(cache.stats().refreshes >= 1);
    }
}
