use async_trait::async_trait;
use common::config::{ChainConfig, TronConfig};
use generic_indexer::{ChainAdapter, ChainBlock, ScanError};
use tracing::info;

use crate::{
    client::TronClient,
    parser::{parse_block, WatchList},
};

pub struct TronAdapter {
    client: TronClient,
    watch: WatchList,
    config: ChainConfig,
}

impl TronAdapter {
    pub fn new(cfg: &TronConfig) -> eyre::Result<Self> {
        let client = TronClient::new(&cfg.common.http_rpc_url, cfg.api_key.clone())?;
        let watch = WatchList::from_config(cfg)?;
        info!(
            "Tron adapter watching {} recipient(s) and {} TRC-20 contract(s)",
            cfg.common.recipients.len(),
            cfg.tokens.len()
        );
        Ok(Self {
            client,
            watch,
            config: cfg.common.clone(),
        })
    }
}

#[async_trait]
impl ChainAdapter for TronAdapter {
    fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn tip_height(&self) -> Result<u64, ScanError> {
        let block = self.client.now_block().await.map_err(ScanError::rpc)?;
        block
            .block_header
            .map(|h| h.raw_data.number)
            .ok_or_else(|| ScanError::rpc("getnowblock returned no header"))
    }

    async fn block(&self, number: u64) -> Result<ChainBlock, ScanError> {
        let block = self
            .client
            .block_by_num(number)
            .await
            .map_err(ScanError::rpc)?;
        parse_block(number, block, &self.watch)
    }
}
