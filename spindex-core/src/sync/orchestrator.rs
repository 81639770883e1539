use std::sync::Arc;

use log::{debug, info};
use tokio_util::sync::CancellationToken;

use super::pipeline::BlockPipeline;
use crate::backend::ChainBackend;
use crate::config::OracleConfig;
use crate::error::{Error, Result};
use crate::store::{BatchWriter, Db, WriteBatch};
use crate::structs::{BlockHeader, BlockHeaderInv};

/// Bulk synchronisation from the configured start height up to the node tip.
pub struct ChainSync {
    backend: Arc<dyn ChainBackend>,
    db: Db,
    pipeline: BlockPipeline,
    config: OracleConfig,
}

impl ChainSync {
    pub fn new(
        backend: Arc<dyn ChainBackend>,
        db: Db,
        pipeline: BlockPipeline,
        config: OracleConfig,
    ) -> Self {
        Self {
            backend,
            db,
            pipeline,
            config,
        }
    }

    /// Syncs `[sync_start_height, tip)` window by window, re-reading the tip
    /// until it stops moving. Returns the number of blocks applied.
    pub async fn sync_to_tip(&self, cancel: &CancellationToken) -> Result<usize> {
        let start = self.config.sync_start_height;
        let window = self.config.sync_window.max(1);
        let mut applied = 0;
        let mut synced_to = start;

        loop {
            let tip = self.backend.tip_height().await?;
            if tip <= synced_to {
                break;
            }
            info!("syncing heights {synced_to}..{tip}");

            let mut window_start = synced_to;
            while window_start < tip {
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }
                let window_end = window_start.saturating_add(window).min(tip);
                applied += self.sync_window(window_start, window_end, cancel).await?;
                window_start = window_end;
            }
            synced_to = tip;
        }

        info!("bulk sync finished at height {synced_to}, {applied} blocks applied");
        Ok(applied)
    }

    /// Applies every unprocessed height in `[start, end)`.
    pub async fn sync_window(
        &self,
        start: u32,
        end: u32,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let heights = self.db.unprocessed_heights(start, end)?;
        if heights.is_empty() {
            debug!("window {start}..{end} already processed");
            return Ok(0);
        }

        let mut headers = self.fetch_headers(&heights).await?;
        self.record_headers(&headers)?;
        headers.sort_unstable_by_key(|header| header.height);

        let applied = self.pipeline.run(headers, cancel).await?;
        info!("window {start}..{end}: {applied} blocks applied");
        Ok(applied)
    }

    async fn fetch_headers(&self, heights: &[u32]) -> Result<Vec<BlockHeader>> {
        let mut headers = Vec::with_capacity(heights.len());
        for chunk in heights.chunks(self.config.header_batch_size.max(1)) {
            let hashes = self.backend.block_hashes(chunk).await?;
            let fetched = self.backend.block_headers(&hashes).await?;
            if hashes.len() != chunk.len() || fetched.len() != chunk.len() {
                return Err(Error::HeaderCount {
                    requested: chunk.len(),
                    got: hashes.len().min(fetched.len()),
                });
            }
            for (height, header) in chunk.iter().zip(fetched) {
                if header.height != *height {
                    return Err(Error::HeightMismatch {
                        hash: header.hash,
                        expected: *height,
                        got: header.height,
                    });
                }
                headers.push(header);
            }
        }
        Ok(headers)
    }

    /// Persists headers and unprocessed inventory entries ahead of the block
    /// bodies, so spends can resolve the hash of any height in the window.
    fn record_headers(&self, headers: &[BlockHeader]) -> Result<()> {
        let writer = BatchWriter::new(self.db.store().clone(), self.config.batch_flush_threshold);
        for header in headers {
            let mut ops = WriteBatch::new();
            ops.put_header(header);
            ops.put_header_inv(&BlockHeaderInv {
                hash: header.hash,
                height: header.height,
                processed: false,
            });
            writer.append(ops)?;
        }
        writer.flush()?;
        Ok(())
    }
}
