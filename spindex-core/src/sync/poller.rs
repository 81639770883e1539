use std::sync::Arc;

use log::{info, warn};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::pipeline::BlockPipeline;
use crate::backend::ChainBackend;
use crate::config::OracleConfig;
use crate::error::{Error, Result};
use crate::store::{Db, WriteBatch};
use crate::structs::BlockHeaderInv;

/// Follows the node tip after bulk sync.
pub struct TipPoller {
    backend: Arc<dyn ChainBackend>,
    db: Db,
    pipeline: BlockPipeline,
    config: OracleConfig,
}

impl TipPoller {
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

    /// Polls until `cancel` fires. Failed polls are logged and retried on the
    /// next tick.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<()> {
        let mut ticker = interval(self.config.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(()),
                _ = ticker.tick() => {}
            }
            match self.poll_once(cancel).await {
                Ok(0) => {}
                Ok(applied) => info!("applied {applied} new blocks"),
                Err(Error::Cancelled) => return Ok(()),
                Err(err) => warn!("tip poll failed: {err}"),
            }
        }
    }

    /// Applies every block between the last processed one and the node's best
    /// block. Walks back from the best block through parent hashes until it
    /// meets a processed block or the start height.
    pub async fn poll_once(&self, cancel: &CancellationToken) -> Result<usize> {
        let best = self.backend.best_block_hash().await?;
        let mut hash = best;
        let mut unseen = Vec::new();

        while !self.db.is_processed(&hash)? {
            let header = self.backend.block_header(&hash).await?;
            if header.height < self.config.sync_start_height {
                break;
            }
            unseen.push(header);
            if header.height == self.config.sync_start_height {
                break;
            }
            hash = header.prev_hash;
        }
        if unseen.is_empty() {
            return Ok(0);
        }
        unseen.reverse();

        let mut batch = WriteBatch::new();
        for header in &unseen {
            batch.put_header(header);
            batch.put_header_inv(&BlockHeaderInv {
                hash: header.hash,
                height: header.height,
                processed: false,
            });
        }
        self.db.write(&batch)?;

        self.pipeline.run(unseen, cancel).await
    }
}
