//! Access to the full node the oracle indexes from.

use async_trait::async_trait;
use bitcoin::BlockHash;

use crate::error::Result;
use crate::structs::{Block, BlockHeader};

/// Node operations the oracle consumes.
///
/// Implementations report failures through [`crate::Error::Backend`] with the
/// failing call as context. The batched lookups have per-item defaults;
/// backends that can batch requests should override them.
#[async_trait]
pub trait ChainBackend: Send + Sync {
    async fn best_block_hash(&self) -> Result<BlockHash>;

    /// Height of the node's active chain tip.
    async fn tip_height(&self) -> Result<u32>;

    async fn block_hash(&self, height: u32) -> Result<BlockHash>;

    async fn block_header(&self, hash: &BlockHash) -> Result<BlockHeader>;

    /// Full block with every input's previous output resolved.
    async fn block(&self, hash: &BlockHash) -> Result<Block>;

    /// Hashes for `heights`, in the same order.
    async fn block_hashes(&self, heights: &[u32]) -> Result<Vec<BlockHash>> {
        let mut hashes = Vec::with_capacity(heights.len());
        for height in heights {
            hashes.push(self.block_hash(*height).await?);
        }
        Ok(hashes)
    }

    /// Headers for `hashes`, in the same order.
    async fn block_headers(&self, hashes: &[BlockHash]) -> Result<Vec<BlockHeader>> {
        let mut headers = Vec::with_capacity(hashes.len());
        for hash in hashes {
            headers.push(self.block_header(hash).await?);
        }
        Ok(headers)
    }
}
