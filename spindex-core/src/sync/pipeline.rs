use std::sync::Arc;

use futures::{stream, StreamExt};
use log::{debug, warn};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::reorder::ReorderBuffer;
use crate::backend::ChainBackend;
use crate::error::{Error, Result};
use crate::store::Db;
use crate::structs::{Block, BlockHeader};
use crate::updater::BlockProcessor;

/// Output of the fetch stage.
enum Fetched {
    Block(Block),
    /// Already applied, only advances the ordering cursor.
    Skipped(u32),
}

impl Fetched {
    fn height(&self) -> u32 {
        match self {
            Fetched::Block(block) => block.height,
            Fetched::Skipped(height) => *height,
        }
    }
}

/// Fetches blocks concurrently and hands them to a [`BlockProcessor`] in
/// ascending height order.
#[derive(Clone)]
pub struct BlockPipeline {
    backend: Arc<dyn ChainBackend>,
    processor: Arc<dyn BlockProcessor>,
    db: Db,
    max_parallel_requests: usize,
    channel_capacity: usize,
}

impl BlockPipeline {
    pub fn new(
        backend: Arc<dyn ChainBackend>,
        processor: Arc<dyn BlockProcessor>,
        db: Db,
        max_parallel_requests: usize,
        channel_capacity: usize,
    ) -> Self {
        Self {
            backend,
            processor,
            db,
            max_parallel_requests: max_parallel_requests.max(1),
            channel_capacity: channel_capacity.max(1),
        }
    }

    /// Runs `headers` through fetch and apply. Returns the number of blocks
    /// applied; headers already processed are skipped.
    ///
    /// The first failure in either stage stops both and is returned.
    pub async fn run(&self, headers: Vec<BlockHeader>, cancel: &CancellationToken) -> Result<usize> {
        if headers.is_empty() {
            return Ok(0);
        }
        let heights: Vec<u32> = headers.iter().map(|header| header.height).collect();
        let fetch_cancel = cancel.child_token();
        let (tx, rx) = mpsc::channel(self.channel_capacity);

        let producer = tokio::spawn(fetch_blocks(
            self.backend.clone(),
            self.db.clone(),
            headers,
            self.max_parallel_requests,
            tx,
            fetch_cancel.clone(),
        ));

        let result = self.apply_in_order(heights, rx, cancel).await;
        fetch_cancel.cancel();
        if let Err(err) = producer.await {
            warn!("fetch task ended abnormally: {err}");
        }
        result
    }

    async fn apply_in_order(
        &self,
        heights: Vec<u32>,
        mut rx: mpsc::Receiver<Result<Fetched>>,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        let mut reorder = ReorderBuffer::new(heights);
        let mut applied = 0;

        while let Some(expected) = reorder.next_expected() {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                received = rx.recv() => received,
            };
            let fetched = received.ok_or(Error::FetchIncomplete(expected))??;
            reorder.push(fetched.height(), fetched)?;

            while let Some((height, ready)) = reorder.pop_ready() {
                match ready {
                    Fetched::Block(block) => {
                        self.processor.process_block(block, cancel).await?;
                        applied += 1;
                    }
                    Fetched::Skipped(_) => debug!("block {height} already processed"),
                }
            }
        }
        Ok(applied)
    }
}

async fn fetch_blocks(
    backend: Arc<dyn ChainBackend>,
    db: Db,
    headers: Vec<BlockHeader>,
    concurrency: usize,
    tx: mpsc::Sender<Result<Fetched>>,
    cancel: CancellationToken,
) {
    let mut fetched = stream::iter(headers)
        .map(move |header| {
            let backend = backend.clone();
            let db = db.clone();
            async move {
                if db.is_processed(&header.hash)? {
                    return Ok(Fetched::Skipped(header.height));
                }
                let block = backend.block(&header.hash).await?;
                if block.height != header.height {
                    return Err(Error::HeightMismatch {
                        hash: header.hash,
                        expected: header.height,
                        got: block.height,
                    });
                }
                Ok(Fetched::Block(block))
            }
        })
        .buffer_unordered(concurrency);

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = fetched.next() => next,
        };
        let Some(item) = next else {
            break;
        };
        let failed = item.is_err();
        if tx.send(item).await.is_err() || failed {
            break;
        }
    }
}
