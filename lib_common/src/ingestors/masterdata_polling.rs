//! # Master Data Polling Ingestor
//!
//! Keeps the [`MasterStore`] current without blocking request handling.
//!
//! ## Workflow:
//! 1. [`MasterDataPoller::start`] refreshes once and waits for it, so the
//!    server never starts before the first attempt. A failure is logged and
//!    the store keeps serving whatever it held (the empty generation on a cold
//!    start).
//! 2. It then spawns a loop that refreshes every `interval`. A slow refresh
//!    delays the next tick instead of stacking ticks up.
//! 3. The loop stops as soon as the shutdown channel fires or closes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info};

use crate::masterdata::MasterStore;

/// Hourly.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(3600);

/// The periodic refresher.
pub struct MasterDataPoller {
    store: Arc<MasterStore>,
    interval: Duration,
}

impl MasterDataPoller {
    /// Creates a poller. A zero interval is bumped to one second.
    pub fn new(store: Arc<MasterStore>, interval: Duration) -> Self {
        Self {
            store,
            interval: interval.max(Duration::from_secs(1)),
        }
    }

    /// The effective interval.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    async fn refresh_once(&self) {
        if let Err(e) = self.store.refresh().await {
            error!(error = %e, "Master data refresh failed");
        }
    }

    /// Runs the startup refresh, then spawns the interval loop.
    pub async fn start(self, shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
        info!(interval_secs = self.interval.as_secs(), "Master data poller starting");
        self.refresh_once().await;
        tokio::spawn(async move { self.run(shutdown).await })
    }

    /// Refreshes on every tick until `shutdown` fires. The first tick comes
    /// one full interval after the call.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => self.refresh_once().await,
                _ = shutdown.recv() => break,
            }
        }
        info!("Master data poller stopped");
    }
}
