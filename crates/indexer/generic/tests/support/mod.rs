#![allow(dead_code)]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use common::alert::{Alert, Alerter};
use database::{connect::connect, DbClient};
use generic_indexer::{ChainAdapter, ChainBlock, ScanError, Transfer};
use migration::{Migrator, MigratorTrait};

pub const CHAIN_ID: u64 = 1;
pub const MERCHANT: &str = "0xmerchant";
pub const TOKEN: i64 = 7;

pub async fn setup_db() -> Arc<DbClient> {
    let conn = connect("sqlite::memory:").await.expect("sqlite connection");
    Migrator::up(&conn, None).await.expect("migrations");
    Arc::new(DbClient::new(conn))
}

pub fn hash(number: u64, fork: u8) -> String {
    format!("0x{:02x}{:062x}", fork, number)
}

pub fn block(number: u64, transfers: Vec<Transfer>) -> ChainBlock {
    ChainBlock {
        number,
        hash: hash(number, 0),
        parent_hash: hash(number.saturating_sub(1), 0),
        timestamp_ms: 1_700_000_000_000 + number as i64,
        transfers,
    }
}

pub fn transfer(tx_hash: &str, value: u128, tag: Option<&str>) -> Transfer {
    Transfer {
        tx_hash: tx_hash.to_string(),
        from: Some("0xpayer".to_string()),
        to: MERCHANT.to_string(),
        token_id: TOKEN,
        value,
        tag: tag.map(str::to_string),
        timestamp_ms: 1_700_000_000_000,
    }
}

/// How a mocked node call fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    Rpc,
    NotAvailable,
    Decode,
}

impl Failure {
    fn error(self, number: u64) -> ScanError {
        match self {
            Failure::Rpc => ScanError::rpc(format!("block {} unavailable", number)),
            Failure::NotAvailable => ScanError::BlockNotAvailable(number),
            Failure::Decode => ScanError::decode(format!("block {} is malformed", number)),
        }
    }
}

#[derive(Default)]
struct MockChain {
    tip: u64,
    tip_fails: bool,
    blocks: HashMap<u64, ChainBlock>,
    failing: HashMap<u64, Failure>,
    fetched: Vec<u64>,
}

/// In-memory chain. Blocks that were never inserted are generated on demand
/// with canonical hashes and no transfers.
#[derive(Clone, Default)]
pub struct MockAdapter {
    inner: Arc<Mutex<MockChain>>,
}

impl MockAdapter {
    pub fn new(tip: u64) -> Self {
        let adapter = Self::default();
        adapter.set_tip(tip);
        adapter
    }

    pub fn set_tip(&self, tip: u64) {
        self.inner.lock().unwrap().tip = tip;
    }

    pub fn insert(&self, block: ChainBlock) {
        self.inner.lock().unwrap().blocks.insert(block.number, block);
    }

    pub fn fail_on(&self, number: u64) {
        self.fail_with(number, Failure::Rpc);
    }

    pub fn fail_with(&self, number: u64, failure: Failure) {
        self.inner.lock().unwrap().failing.insert(number, failure);
    }

    pub fn fail_tip(&self, fails: bool) {
        self.inner.lock().unwrap().tip_fails = fails;
    }

    pub fn fetched(&self) -> Vec<u64> {
        self.inner.lock().unwrap().fetched.clone()
    }
}

#[async_trait]
impl ChainAdapter for MockAdapter {
    fn chain_id(&self) -> u64 {
        CHAIN_ID
    }

    fn name(&self) -> &str {
        "mockchain"
    }

    async fn tip_height(&self) -> Result<u64, ScanError> {
        let chain = self.inner.lock().unwrap();
        if chain.tip_fails {
            return Err(ScanError::rpc("tip unavailable"));
        }
        Ok(chain.tip)
    }

    async fn block(&self, number: u64) -> Result<ChainBlock, ScanError> {
        let mut chain = self.inner.lock().unwrap();
        chain.fetched.push(number);
        if let Some(failure) = chain.failing.get(&number) {
            return Err(failure.error(number));
        }
        Ok(chain
            .blocks
            .get(&number)
            .cloned()
            .unwrap_or_else(|| block(number, vec![])))
    }
}

#[derive(Clone, Default)]
pub struct RecordingAlerter {
    alerts: Arc<Mutex<Vec<Alert>>>,
}

impl RecordingAlerter {
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Alerter for RecordingAlerter {
    async fn send(&self, alert: Alert) {
        self.alerts.lock().unwrap().push(alert);
    }
}
