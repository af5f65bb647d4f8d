use std::{future::IntoFuture, sync::Arc};

use alloy::{
    eips::BlockNumberOrTag,
    primitives::B256,
    providers::{Provider, ProviderBuilder},
    rpc::types::{Block, BlockTransactionsKind},
};
use common::indexer::RPC_TIMEOUT;

#[derive(Clone)]
pub struct EvmProvider {
    http: Arc<dyn Provider + Send + Sync>,
    chain_id: u64,
}

async fn with_timeout<T, E, F>(call: F) -> eyre::Result<T>
where
    F: IntoFuture<Output = Result<T, E>>,
    E: Into<eyre::Report>,
{
    tokio::time::timeout(RPC_TIMEOUT, call)
        .await
        .map_err(|_| eyre::eyre!("request timed out after {:?}", RPC_TIMEOUT))?
        .map_err(Into::into)
}

impl EvmProvider {
    pub fn new(http_url: &str, chain_id: u64) -> eyre::Result<Self> {
        let parsed_http_url = http_url
            .parse()
            .map_err(|e| eyre::eyre!("Invalid HTTP URL: {}", e))?;
        let http = ProviderBuilder::new().on_http(parsed_http_url);

        Ok(Self {
            http: Arc::new(http),
            chain_id,
        })
    }

    pub fn get_chain_id(&self) -> u64 {
        self.chain_id
    }

    pub async fn get_block_number(&self) -> eyre::Result<u64> {
        with_timeout(self.http.get_block_number()).await
    }

    /// Block with full transaction bodies.
    pub async fn get_block_by_number(&self, block_number: u64) -> eyre::Result<Option<Block>> {
        with_timeout(
            self.http
                .get_block_by_number(
                    BlockNumberOrTag::Number(block_number),
                    BlockTransactionsKind::Full,
                ),
        )
        .await
    }

    /// Receipt status of a mined transaction.
    pub async fn transaction_succeeded(&self, tx_hash: B256) -> eyre::Result<bool> {
        let receipt = with_timeout(self.http.get_transaction_receipt(tx_hash)).await?;
        match receipt {
            Some(receipt) => Ok(receipt.status()),
            None => Err(eyre::eyre!("receipt for {} not found", tx_hash)),
        }
    }
}
