use std::{sync::Arc, time::Duration};

use common::{
    alert::{Alert, Alerter},
    config::ChainConfig,
    indexer::CURSOR_RETENTION,
};
use database::{CursorRecord, DbClient};
use tokio::{task::JoinSet, time::sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::{
    adapter::ChainAdapter,
    error::ScanError,
    matcher::PaymentMatcher,
    monitor::{stale_threshold, ChainMonitor},
    state::{ScanMode, ScanState},
    types::ChainBlock,
};

#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub confirmations: u64,
    pub concurrency: u64,
    pub idle_interval: Duration,
    pub retry_interval: Duration,
    pub catch_up_retry_interval: Duration,
}

impl From<&ChainConfig> for ScanSettings {
    fn from(cfg: &ChainConfig) -> Self {
        Self {
            confirmations: cfg.confirmations,
            concurrency: cfg.concurrency.max(1),
            idle_interval: Duration::from_millis(cfg.block_time_ms),
            retry_interval: Duration::from_millis(cfg.retry_interval_ms),
            catch_up_retry_interval: Duration::from_millis(cfg.catch_up_retry_interval_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// Nothing past the confirmation frontier yet.
    Idle,
    /// Processed up to and including this block.
    Advanced(u64),
    /// Fork detected; the pointer moved back to this block.
    Rewound(u64),
}

/// Scanning state machine of one chain.
pub struct BlockScanner<A: ChainAdapter> {
    adapter: Arc<A>,
    db: Arc<DbClient>,
    matcher: PaymentMatcher,
    alerter: Arc<dyn Alerter>,
    monitor: Option<Arc<ChainMonitor>>,
    settings: ScanSettings,
}

impl<A: ChainAdapter> BlockScanner<A> {
    pub fn new(
        adapter: A,
        db: Arc<DbClient>,
        alerter: Arc<dyn Alerter>,
        settings: ScanSettings,
    ) -> Self {
        let matcher = PaymentMatcher::new(adapter.name(), Arc::clone(&db), Arc::clone(&alerter));
        Self {
            adapter: Arc::new(adapter),
            db,
            matcher,
            alerter,
            monitor: None,
            settings,
        }
    }

    pub fn with_monitor(mut self, monitor: Arc<ChainMonitor>) -> Self {
        self.monitor = Some(monitor);
        self
    }

    pub fn chain_id(&self) -> u64 {
        self.adapter.chain_id()
    }

    pub fn name(&self) -> &str {
        self.adapter.name()
    }

    /// Resumes after the last stored cursor, or starts just past the tip on a
    /// fresh database.
    pub async fn initialize(&self) -> Result<ScanState, ScanError> {
        let chain_id = self.adapter.chain_id();
        let seed = match self.db.get_cursor(chain_id).await? {
            Some(cursor) => {
                info!(
                    "Resuming {} after stored block {}",
                    self.adapter.name(),
                    cursor.block_number
                );
                cursor.block_number
            }
            None => {
                let tip = self.adapter.tip_height().await?;
                info!("No cursor for {}, starting from tip {}", self.adapter.name(), tip);
                tip
            }
        };

        let mut state = ScanState::new(chain_id, seed);
        state.advance(1);
        Ok(state)
    }

    #[instrument(skip_all, fields(CHAIN = %self.adapter.name()))]
    pub async fn run(self, cancel: CancellationToken) {
        if let Some(monitor) = &self.monitor {
            let stale_after =
                stale_threshold(monitor.default_stale_after(), self.settings.idle_interval);
            monitor.set_threshold(self.adapter.chain_id(), stale_after).await;
            debug!("Stale after {:?} without progress", stale_after);
        }

        let Some(mut state) = self.initialize_with_retry(&cancel).await else {
            return;
        };
        info!("Scanning from block {}", state.current());

        while !cancel.is_cancelled() {
            let delay = match self.run_cycle(&mut state).await {
                Ok(CycleOutcome::Advanced(_)) | Ok(CycleOutcome::Rewound(_)) => None,
                Ok(CycleOutcome::Idle) => Some(self.settings.idle_interval),
                Err(e) => {
                    self.report_failure(&state, &e).await;
                    if state.is_catching_up() {
                        Some(self.settings.catch_up_retry_interval)
                    } else {
                        Some(self.settings.retry_interval)
                    }
                }
            };

            if let Some(delay) = delay {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = sleep(delay) => {}
                }
            }
        }

        info!("Scanner stopped at block {}", state.current());
    }

    async fn initialize_with_retry(&self, cancel: &CancellationToken) -> Option<ScanState> {
        loop {
            match self.initialize().await {
                Ok(state) => return Some(state),
                Err(e) => {
                    error!("Failed to initialize scanner: {:?}", e);
                    tokio::select! {
                        _ = cancel.cancelled() => return None,
                        _ = sleep(self.settings.retry_interval) => {}
                    }
                }
            }
        }
    }

    /// One iteration: poll the tip, then single-step, catch up or idle.
    pub async fn run_cycle(&self, state: &mut ScanState) -> Result<CycleOutcome, ScanError> {
        let tip = match self.adapter.tip_height().await {
            Ok(tip) => tip,
            Err(e) => {
                state.reset_mode();
                return Err(e);
            }
        };
        match state.plan(tip, self.settings.confirmations, self.settings.concurrency) {
            ScanMode::Idle => {
                debug!("At frontier: current {}, tip {}", state.current(), tip);
                Ok(CycleOutcome::Idle)
            }
            ScanMode::SingleStep(_) => self.single_step(state).await,
            ScanMode::CatchUp { from, count } => {
                debug!(
                    "Catching up blocks {} to {} ({} behind tip)",
                    from,
                    from + count - 1,
                    tip - from
                );
                self.catch_up(state, count).await
            }
        }
    }

    async fn single_step(&self, state: &mut ScanState) -> Result<CycleOutcome, ScanError> {
        let chain_id = state.chain_id();
        let number = state.current();
        let block = self.adapter.block(number).await?;

        if let Some(previous) = number.checked_sub(1) {
            if let Some(stored) = self.db.get_cursor_at(chain_id, previous).await? {
                if stored.block_hash != block.parent_hash {
                    warn!(
                        "Fork at block {}: parent {} does not match stored {}, rewinding",
                        number, block.parent_hash, stored.block_hash
                    );
                    self.db.delete_cursor(chain_id, previous).await?;
                    state.rewind();
                    return Ok(CycleOutcome::Rewound(state.current()));
                }
            }
        }

        self.matcher.process_block(&block).await?;
        self.db.upsert_cursor(&cursor_record(chain_id, &block)).await?;
        state.advance(1);
        self.after_advance(state, number).await?;
        Ok(CycleOutcome::Advanced(number))
    }

    async fn catch_up(&self, state: &mut ScanState, count: u64) -> Result<CycleOutcome, ScanError> {
        let chain_id = state.chain_id();
        let from = state.current();

        let mut fetches = JoinSet::new();
        for number in from..from + count {
            let adapter = Arc::clone(&self.adapter);
            fetches.spawn(async move { adapter.block(number).await });
        }

        let mut blocks = Vec::with_capacity(count as usize);
        while let Some(joined) = fetches.join_next().await {
            let fetched = joined
                .map_err(|e| ScanError::rpc(format!("block fetch task failed: {e}")))
                .and_then(|res| res);
            match fetched {
                Ok(block) => blocks.push(block),
                Err(e) => {
                    fetches.abort_all();
                    return Err(e);
                }
            }
        }
        blocks.sort_by_key(|b| b.number);

        for block in &blocks {
            self.matcher.process_block(block).await?;
        }

        let records: Vec<_> = blocks.iter().map(|b| cursor_record(chain_id, b)).collect();
        self.db.bulk_upsert_cursors(&records).await?;

        let last = from + count - 1;
        state.advance(count);
        self.after_advance(state, last).await?;
        Ok(CycleOutcome::Advanced(last))
    }

    async fn after_advance(&self, state: &ScanState, processed: u64) -> Result<(), ScanError> {
        if let Some(floor) = state.current().checked_sub(CURSOR_RETENTION) {
            self.db.prune_cursors_below(state.chain_id(), floor).await?;
        }
        if let Some(monitor) = &self.monitor {
            monitor
                .record(state.chain_id(), self.adapter.name(), processed)
                .await;
        }
        Ok(())
    }

    async fn report_failure(&self, state: &ScanState, e: &ScanError) {
        match e {
            ScanError::BlockNotAvailable(number) => {
                debug!("Block {} not available yet", number);
            }
            ScanError::Rpc(_) => {
                warn!("Scan cycle at block {} failed: {}", state.current(), e);
            }
            _ => {
                error!("Scan cycle at block {} failed: {:?}", state.current(), e);
            }
        }

        if e.should_alert() {
            self.alerter
                .send(Alert::ScanFailure {
                    chain: self.adapter.name().to_string(),
                    block_number: state.current(),
                    error: e.to_string(),
                })
                .await;
        }
    }
}

fn cursor_record(chain_id: u64, block: &ChainBlock) -> CursorRecord {
    CursorRecord {
        chain_id,
        block_number: block.number,
        block_hash: block.hash.clone(),
        parent_hash: block.parent_hash.clone(),
    }
}
