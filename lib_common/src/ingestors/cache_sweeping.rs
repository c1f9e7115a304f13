//! # Cache Sweeping Ingestor
//!
//! Expired cache entries are normally dropped when a lookup trips over them.
//! Keys that are never asked for again would otherwise sit in the cache until
//! LRU pressure pushes them out, so this task purges them on a timer.
//!
//! The sweep period is the shortest default TTL among the swept caches.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::cache::ResponseCache;

/// Periodic purge of expired entries across a set of caches.
pub struct CacheSweeper {
    caches: Vec<Arc<ResponseCache>>,
    period: Duration,
}

impl CacheSweeper {
    /// Creates a sweeper over `caches`. The period never drops below one second.
    pub fn new(caches: Vec<Arc<ResponseCache>>) -> Self {
        let period = caches
            .iter()
            .map(|c| c.default_ttl())
            .min()
            .unwrap_or(Duration::from_secs(3600))
            .max(Duration::from_secs(1));
        Self { caches, period }
    }

    /// Time between sweeps.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Purges every cache once and returns the total number of removed entries.
    pub fn sweep_once(&self) -> usize {
        self.caches
            .iter()
            .map(|cache| {
                let removed = cache.purge_expired();
                if removed > 0 {
                    debug!(cache = cache.name(), removed, remaining = cache.len(), "Purged expired entries");
                }
                removed
            })
            .sum()
    }

    /// Spawns the sweep loop. It stops when `shutdown` fires or closes.
    pub fn start(self, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(period_secs = self.period.as_secs(), caches = self.caches.len(), "Cache sweeper starting");
            let mut ticker = interval_at(Instant::now() + self.period, self.period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.sweep_once();
                    }
                    _ = shutdown.recv() => break,
                }
            }
            info!("Cache sweeper stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn cache(name: &str, ttl_secs: u64) -> Arc<ResponseCache> {
        Arc::new(ResponseCache::new(name, Duration::from_secs(ttl_secs), 10))
    }

    #[test]
    fn period_follows_the_shortest_ttl() {
        let sweeper = CacheSweeper::new(vec![cache("image", 3600), cache("api", 600)]);
        assert_eq!(sweeper.period(), Duration::from_secs(600));

        assert_eq!(CacheSweeper::new(vec![cache("tiny", 0)]).period(), Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_once_purges_only_expired_entries() {
        let api = cache("api", 600);
        let image = cache("image", 3600);
        api.insert("dynamic_1", Bytes::from_static(b"{}"), None);
        image.insert("https://i0.hdslb.com/a.png", Bytes::from_static(b"png"), None);
        let sweeper = CacheSweeper::new(vec![Arc::clone(&api), Arc::clone(&image)]);

        assert_eq!(sweeper.sweep_once(), 0);

        tokio::time::advance(Duration::from_secs(601)).await;
        assert_eq!(sweeper.sweep_once(), 1);
        assert!(api.is_empty());
        assert_eq!(image.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_sweeps_on_each_period_and_stops_on_shutdown() {
        let api = cache("api", 10);
        api.insert("dynamic_1", Bytes::from_static(b"{}"), None);
        let (tx, rx) = broadcast::channel(1);

        let handle = CacheSweeper::new(vec![Arc::clone(&api)]).start(rx);
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(api.is_empty());

        tx.send(()).unwrap();
        handle.await.unwrap();
    }
}
