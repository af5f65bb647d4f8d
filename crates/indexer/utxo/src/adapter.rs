use std::collections::HashSet;

use async_trait::async_trait;
use common::config::{ChainConfig, UtxoConfig};
use generic_indexer::{ChainAdapter, ChainBlock, ScanError};
use tracing::info;

use crate::{
    client::{RpcError, UtxoRpcClient, RPC_INVALID_PARAMETER},
    parser::parse_transaction,
    types::{BlockTx, UtxoTransaction},
};

/// Bitcoin-family chain (bitcoin, dogecoin) read over the node's JSON-RPC.
pub struct UtxoAdapter {
    client: UtxoRpcClient,
    recipients: HashSet<String>,
    block_verbosity: u8,
    config: ChainConfig,
}

impl UtxoAdapter {
    pub fn new(cfg: &UtxoConfig) -> eyre::Result<Self> {
        let client = UtxoRpcClient::new(
            &cfg.common.http_rpc_url,
            cfg.rpc_user.clone(),
            cfg.rpc_password.clone(),
        )?;
        info!(
            "UTXO adapter for {} watching {} recipient(s), block verbosity {}",
            cfg.common.name,
            cfg.common.recipients.len(),
            cfg.block_verbosity
        );
        Ok(Self {
            client,
            recipients: cfg.common.recipients.iter().cloned().collect(),
            block_verbosity: cfg.block_verbosity,
            config: cfg.common.clone(),
        })
    }

    async fn transactions(&self, txs: Vec<BlockTx>) -> Result<Vec<UtxoTransaction>, ScanError> {
        let mut decoded = Vec::with_capacity(txs.len());
        for tx in txs {
            match tx {
                BlockTx::Full(tx) => decoded.push(tx),
                BlockTx::Id(txid) => decoded.push(
                    self.client
                        .raw_transaction(&txid)
                        .await
                        .map_err(ScanError::rpc)?,
                ),
            }
        }
        Ok(decoded)
    }
}

#[async_trait]
impl ChainAdapter for UtxoAdapter {
    fn chain_id(&self) -> u64 {
        self.config.chain_id
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn tip_height(&self) -> Result<u64, ScanError> {
        self.client.block_count().await.map_err(ScanError::rpc)
    }

    async fn block(&self, number: u64) -> Result<ChainBlock, ScanError> {
        let hash = self
            .client
            .block_hash(number)
            .await
            .map_err(|e| match e {
                RpcError::Node { code, .. } if code == RPC_INVALID_PARAMETER => {
                    ScanError::BlockNotAvailable(number)
                }
                e => ScanError::rpc(e),
            })?;

        let block = self
            .client
            .block(&hash, self.block_verbosity)
            .await
            .map_err(ScanError::rpc)?;
        if block.height != number || block.hash != hash {
            return Err(ScanError::decode(format!(
                "getblock {} returned block {} at height {}",
                hash, block.hash, block.height
            )));
        }

        let timestamp_ms = block.time.saturating_mul(1000);
        let transfers = self
            .transactions(block.tx)
            .await?
            .iter()
            .flat_map(|tx| {
                parse_transaction(tx, &self.recipients, self.config.native_token_id, timestamp_ms)
            })
            .collect();

        Ok(ChainBlock {
            number,
            hash: block.hash,
            parent_hash: block.previous_block_hash.unwrap_or_default(),
            timestamp_ms,
            transfers,
        })
    }
}
