use async_trait::async_trait;
use bitcoin::{BlockHash, OutPoint};
use futures::future::try_join_all;
use log::debug;
use spindex_core::{Block, BlockHeader, ChainBackend, PrevOut};

use crate::client::{HttpClient, RpcClient};
use crate::error::{Error, Result};

/// [`ChainBackend`] over a bitcoind JSON-RPC endpoint.
///
/// Blocks are fetched with `getblock` verbosity 3. Inputs whose spent output
/// the node leaves unresolved are looked up through `getrawtransaction`,
/// which needs `-txindex` on the node.
#[derive(Clone)]
pub struct BitcoindBackend<H: HttpClient> {
    client: RpcClient<H>,
}

impl<H: HttpClient> BitcoindBackend<H> {
    pub fn new(client: RpcClient<H>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &RpcClient<H> {
        &self.client
    }

    async fn fetch_block(&self, hash: &BlockHash) -> Result<Block> {
        let mut block = Block::try_from(self.client.block(hash).await?)?;

        let missing: Vec<(usize, usize, OutPoint)> = block
            .txs
            .iter()
            .enumerate()
            .flat_map(|(tx_index, tx)| {
                tx.inputs
                    .iter()
                    .enumerate()
                    .filter(|(_, input)| {
                        input.prevout.is_none() && !input.previous_output.is_null()
                    })
                    .map(move |(input_index, input)| {
                        (tx_index, input_index, input.previous_output)
                    })
            })
            .collect();

        if missing.is_empty() {
            return Ok(block);
        }
        debug!(
            "block {} has {} unresolved prevouts, querying node",
            block.height,
            missing.len()
        );

        let resolved = try_join_all(
            missing
                .iter()
                .map(|(_, _, outpoint)| self.resolve_prevout(*outpoint)),
        )
        .await?;

        for ((tx_index, input_index, _), prevout) in missing.into_iter().zip(resolved) {
            block.txs[tx_index].inputs[input_index].prevout = Some(prevout);
        }
        Ok(block)
    }

    /// Looks up a spent output and the height of the block that created it.
    async fn resolve_prevout(&self, outpoint: OutPoint) -> Result<PrevOut> {
        // the funding block is unknown, so no block hash hint can be passed
        let tx = self.client.raw_transaction(&outpoint.txid, None).await?;
        let funding_block = tx.blockhash.ok_or_else(|| {
            Error::InvalidResponse(format!("funding tx {} is unconfirmed", outpoint.txid))
        })?;
        let height = self.client.block_header(&funding_block).await?.height;

        let out = tx
            .vout
            .into_iter()
            .find(|out| out.n == outpoint.vout)
            .ok_or_else(|| Error::InvalidResponse(format!("no output {outpoint}")))?;

        Ok(PrevOut {
            txout: out.into(),
            height,
        })
    }
}

#[async_trait]
impl<H: HttpClient + 'static> ChainBackend for BitcoindBackend<H> {
    async fn best_block_hash(&self) -> spindex_core::Result<BlockHash> {
        Ok(self.client.best_block_hash().await?)
    }

    async fn tip_height(&self) -> spindex_core::Result<u32> {
        Ok(self.client.blockchain_info().await?.blocks)
    }

    async fn block_hash(&self, height: u32) -> spindex_core::Result<BlockHash> {
        Ok(self.client.block_hash(height).await?)
    }

    async fn block_header(&self, hash: &BlockHash) -> spindex_core::Result<BlockHeader> {
        Ok(self.client.block_header(hash).await?.into())
    }

    async fn block(&self, hash: &BlockHash) -> spindex_core::Result<Block> {
        Ok(self.fetch_block(hash).await?)
    }

    async fn block_hashes(&self, heights: &[u32]) -> spindex_core::Result<Vec<BlockHash>> {
        Ok(self.client.block_hashes(heights).await?)
    }

    async fn block_headers(&self, hashes: &[BlockHash]) -> spindex_core::Result<Vec<BlockHeader>> {
        let headers = self.client.block_headers(hashes).await?;
        Ok(headers.into_iter().map(BlockHeader::from).collect())
    }
}
