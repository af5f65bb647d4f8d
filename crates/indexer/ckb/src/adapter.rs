use async_trait::async_trait;
use common::config::{ChainConfig, CkbConfig};
use generic_indexer::{ChainAdapter, ChainBlock, ScanError};
use tracing::info;

use crate::{
    client::CkbRpcClient,
    parser::{parse_block, WatchList},
    types::parse_hex_u64,
};

/// Nervos CKB, read cell by cell from full blocks.
pub struct CkbAdapter {
    client: CkbRpcClient,
    watch: WatchList,
    config: ChainConfig,
}

impl CkbAdapter {
    pub fn new(cfg: &CkbConfig) -> eyre::Result<Self> {
        let client = CkbRpcClient::new(&cfg.common.http_rpc_url)?;
        info!(
            "CKB adapter watching {} lock arg(s) and {} UDT type(s)",
            cfg.common.recipients.len(),
            cfg.udts.len()
        );
        Ok(Self {
            client,
            watch: WatchList::from_config(cfg),
            config: cfg.common.clone(),
        })
    }
}

#[async_trait]
impl ChainAdapter for CkbAdapter {
    fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn tip_height(&self) -> Result<u64, ScanError> {
        let raw = self
            .client
            .tip_block_number()
            .await
            .map_err(ScanError::rpc)?
            .ok_or_else(|| ScanError::rpc("get_tip_block_number returned null"))?;
        parse_hex_u64(&raw).ok_or_else(|| ScanError::decode(format!("bad tip number {}", raw)))
    }

    async fn block(&self, number: u64) -> Result<ChainBlock, ScanError> {
        let block = self
            .client
            .block_by_number(number)
            .await
            .map_err(ScanError::rpc)?
            .ok_or(ScanError::BlockNotAvailable(number))?;
        parse_block(number, block, &self.watch)
    }
}
