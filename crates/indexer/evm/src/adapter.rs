use alloy::{consensus::Transaction as ConsensusTx, network::TransactionResponse, rpc::types::Transaction};
use async_trait::async_trait;
use common::config::{ChainConfig, EvmConfig};
use generic_indexer::{ChainAdapter, ChainBlock, ScanError};
use tracing::{debug, info};

use crate::{
    parser::{format_hash, parse_transaction, EvmTx, WatchList},
    provider::EvmProvider,
};

/// Ethereum-compatible chain (ethereum, bsc) read over HTTP JSON-RPC.
pub struct EvmAdapter {
    provider: EvmProvider,
    watch: WatchList,
    config: ChainConfig,
}

impl EvmAdapter {
    pub fn new(cfg: &EvmConfig) -> eyre::Result<Self> {
        let provider = EvmProvider::new(&cfg.common.http_rpc_url, cfg.common.chain_id)?;
        let watch = WatchList::from_config(cfg)?;
        info!(
            "EVM adapter for {} watching {} recipient(s) and {} token contract(s)",
            cfg.common.name,
            cfg.common.recipients.len(),
            cfg.tokens.len()
        );
        Ok(Self {
            provider,
            watch,
            config: cfg.common.clone(),
        })
    }
}

impl From<&Transaction> for EvmTx {
    fn from(tx: &Transaction) -> Self {
        Self {
            hash: TransactionResponse::tx_hash(tx),
            from: TransactionResponse::from(tx),
            to: ConsensusTx::to(tx),
            value: ConsensusTx::value(tx),
            input: ConsensusTx::input(tx).clone(),
        }
    }
}

#[async_trait]
impl ChainAdapter for EvmAdapter {
    fn chain_id(&self) -> u64 {
        self.provider.get_chain_id()
    }

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn tip_height(&self) -> Result<u64, ScanError> {
        self.provider.get_block_number().await.map_err(ScanError::rpc)
    }

    async fn block(&self, number: u64) -> Result<ChainBlock, ScanError> {
        let block = self
            .provider
            .get_block_by_number(number)
            .await
            .map_err(ScanError::rpc)?
            .ok_or(ScanError::BlockNotAvailable(number))?;

        let txs = block.transactions.as_transactions().ok_or_else(|| {
            ScanError::decode(format!("block {} returned without transaction bodies", number))
        })?;

        let timestamp_ms = (block.header.inner.timestamp as i64).saturating_mul(1000);
        let mut transfers = Vec::new();
        for tx in txs {
            let evm_tx = EvmTx::from(tx);
            let Some(transfer) = parse_transaction(&evm_tx, &self.watch, timestamp_ms) else {
                continue;
            };

            let succeeded = self
                .provider
                .transaction_succeeded(evm_tx.hash)
                .await
                .map_err(ScanError::rpc)?;
            if succeeded {
                transfers.push(transfer);
            } else {
                debug!("Skipping reverted transfer {}", transfer.tx_hash);
            }
        }

        Ok(ChainBlock {
            number,
            hash: format_hash(&block.header.hash),
            parent_hash: format_hash(&block.header.inner.parent_hash),
            timestamp_ms,
            transfers,
        })
    }
}
