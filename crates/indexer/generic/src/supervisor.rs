use std::{sync::Arc, time::Duration};

use common::{alert::Alerter, config::IndexerSettings};
use database::DbClient;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::{
    adapter::ChainAdapter,
    indexer::{BlockScanner, ScanSettings},
    monitor::ChainMonitor,
};

/// Owns every chain task of the process, the shared cancellation token and
/// the staleness monitor.
pub struct Supervisor {
    db: Arc<DbClient>,
    alerter: Arc<dyn Alerter>,
    monitor: Arc<ChainMonitor>,
    monitor_interval: Duration,
    cancel: CancellationToken,
    tasks: JoinSet<()>,
    chains: Vec<String>,
}

impl Supervisor {
    pub fn new(db: Arc<DbClient>, alerter: Arc<dyn Alerter>, settings: &IndexerSettings) -> Self {
        Self {
            db,
            alerter,
            monitor: Arc::new(ChainMonitor::new(Duration::from_secs(
                settings.stale_after_secs,
            ))),
            monitor_interval: Duration::from_secs(settings.monitor_interval_secs.max(1)),
            cancel: CancellationToken::new(),
            tasks: JoinSet::new(),
            chains: Vec::new(),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn monitor(&self) -> Arc<ChainMonitor> {
        Arc::clone(&self.monitor)
    }

    pub fn chains(&self) -> &[String] {
        &self.chains
    }

    /// Starts a scanner task for the chain behind `adapter`.
    pub fn spawn_chain<A: ChainAdapter>(&mut self, adapter: A, settings: ScanSettings) {
        let scanner = BlockScanner::new(
            adapter,
            Arc::clone(&self.db),
            Arc::clone(&self.alerter),
            settings,
        )
        .with_monitor(Arc::clone(&self.monitor));

        info!("Spawning scanner for {} (chain id {})", scanner.name(), scanner.chain_id());
        self.chains.push(scanner.name().to_string());
        self.tasks.spawn(scanner.run(self.cancel.child_token()));
    }

    pub fn spawn_monitor(&mut self) {
        let monitor = Arc::clone(&self.monitor);
        self.tasks.spawn(monitor.run(
            Arc::clone(&self.alerter),
            self.monitor_interval,
            self.cancel.child_token(),
        ));
    }

    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Waits for every task to finish. Tasks only return after cancellation,
    /// so call `shutdown` (or cancel the token) first.
    pub async fn join(mut self) {
        while let Some(res) = self.tasks.join_next().await {
            if let Err(e) = res {
                if e.is_panic() {
                    error!("A scanner task panicked: {:?}", e);
                } else {
                    error!("A scanner task was cancelled: {:?}", e);
                }
            }
        }
        info!("All scanners stopped");
    }

    /// Runs until `shutdown_signal` resolves, then cancels and joins.
    pub async fn run_until<F>(self, shutdown_signal: F)
    where
        F: std::future::Future<Output = ()>,
    {
        shutdown_signal.await;
        info!("Shutdown requested, stopping {} chain(s)", self.chains.len());
        self.shutdown();
        self.join().await;
    }
}
