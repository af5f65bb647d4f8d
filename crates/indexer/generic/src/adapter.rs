use async_trait::async_trait;

use crate::{error::ScanError, types::ChainBlock};

/// Read access to one chain: tip height and decoded blocks.
///
/// Implementations only return transfers addressed to the chain's watched
/// recipients, with token ids already resolved.
#[async_trait]
pub trait ChainAdapter: Send + Sync + 'static {
    fn chain_id(&self) -> u64;

    fn name(&self) -> &str;

    async fn tip_height(&self) -> Result<u64, ScanError>;

    async fn block(&self, number: u64) -> Result<ChainBlock, ScanError>;
}
