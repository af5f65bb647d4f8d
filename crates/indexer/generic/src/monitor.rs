use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};

use common::alert::{Alert, Alerter};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct Progress {
    name: String,
    last_block: u64,
    updated_at: Instant,
}

/// A chain whose scanner has not advanced within the staleness window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaleChain {
    pub chain_id: u64,
    pub name: String,
    pub last_block: u64,
    pub stalled_secs: u64,
}

/// Block intervals without progress before a chain counts as stalled.
pub const STALE_BLOCK_INTERVALS: u32 = 10;

/// Staleness window for a chain: the configured floor, widened to cover
/// `STALE_BLOCK_INTERVALS` blocks on slow chains.
pub fn stale_threshold(floor: Duration, block_time: Duration) -> Duration {
    floor.max(block_time.saturating_mul(STALE_BLOCK_INTERVALS))
}

/// Last processed block per chain, shared by the scanners of one process.
#[derive(Debug)]
pub struct ChainMonitor {
    progress: RwLock<HashMap<u64, Progress>>,
    thresholds: RwLock<HashMap<u64, Duration>>,
    stale_after: Duration,
}

impl ChainMonitor {
    /// `stale_after` applies to chains without their own threshold.
    pub fn new(stale_after: Duration) -> Self {
        Self {
            progress: RwLock::new(HashMap::new()),
            thresholds: RwLock::new(HashMap::new()),
            stale_after,
        }
    }

    pub fn default_stale_after(&self) -> Duration {
        self.stale_after
    }

    pub async fn set_threshold(&self, chain_id: u64, stale_after: Duration) {
        self.thresholds.write().await.insert(chain_id, stale_after);
    }

    pub async fn record(&self, chain_id: u64, name: &str, block: u64) {
        let mut progress = self.progress.write().await;
        progress.insert(
            chain_id,
            Progress {
                name: name.to_string(),
                last_block: block,
                updated_at: Instant::now(),
            },
        );
    }

    pub async fn last_block(&self, chain_id: u64) -> Option<u64> {
        self.progress
            .read()
            .await
            .get(&chain_id)
            .map(|p| p.last_block)
    }

    pub async fn stale_chains(&self, now: Instant) -> Vec<StaleChain> {
        let progress = self.progress.read().await;
        let thresholds = self.thresholds.read().await;
        let mut stale: Vec<_> = progress
            .iter()
            .filter_map(|(chain_id, p)| {
                let stalled = now.saturating_duration_since(p.updated_at);
                let limit = thresholds.get(chain_id).copied().unwrap_or(self.stale_after);
                (stalled >= limit).then(|| StaleChain {
                    chain_id: *chain_id,
                    name: p.name.clone(),
                    last_block: p.last_block,
                    stalled_secs: stalled.as_secs(),
                })
            })
            .collect();
        stale.sort_by_key(|s| s.chain_id);
        stale
    }

    /// Periodically alerts on chains that stopped advancing.
    pub async fn run(
        self: Arc<Self>,
        alerter: Arc<dyn Alerter>,
        interval: Duration,
        cancel: CancellationToken,
    ) {
        info!("Chain monitor started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Chain monitor cancelled");
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }

            let stale = self.stale_chains(Instant::now()).await;
            if stale.is_empty() {
                debug!("All chains advancing");
            }
            for chain in stale {
                alerter
                    .send(Alert::StaleChain {
                        chain: chain.name,
                        last_block: chain.last_block,
                        stalled_secs: chain.stalled_secs,
                    })
                    .await;
            }
        }
    }
}
