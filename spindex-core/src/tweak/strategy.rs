//! Ways of spreading per-transaction tweak computation over tasks.
//!
//! Every strategy runs the same [`compute_tweak`] over the taproot-bearing
//! transactions of a block and returns the same set of tweaks. They differ
//! only in how work is scheduled, so the updater can pick one by block size.

use std::sync::Arc;

use async_trait::async_trait;
use bitcoin::secp256k1::{Secp256k1, VerifyOnly};
use tokio::sync::{mpsc, Mutex, OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use super::compute::{compute_tweak, TxTweak};
use crate::config::OracleConfig;
use crate::constants::LARGE_BLOCK_TX_THRESHOLD;
use crate::error::{Error, Result};
use crate::structs::BlockTx;

type Secp = Arc<Secp256k1<VerifyOnly>>;

#[async_trait]
pub trait TaskDistribution: Send + Sync {
    fn name(&self) -> &'static str;

    /// Tweaks of every transaction in `txs` that has a taproot output and a
    /// derivable tweak. Result order is unspecified.
    async fn compute(
        &self,
        txs: Arc<[BlockTx]>,
        cancel: &CancellationToken,
    ) -> Result<Vec<TxTweak>>;
}

/// Picks a strategy for a block with `tx_count` transactions.
pub fn select_distribution(tx_count: usize, config: &OracleConfig) -> Box<dyn TaskDistribution> {
    if tx_count < LARGE_BLOCK_TX_THRESHOLD {
        Box::new(Partition::new(config.parallelism))
    } else {
        Box::new(FanOut::new(config.max_in_flight))
    }
}

fn eligible_indices(txs: &[BlockTx]) -> Vec<usize> {
    txs.iter()
        .enumerate()
        .filter(|(_, tx)| tx.has_taproot_output())
        .map(|(i, _)| i)
        .collect()
}

fn tweak_one(
    secp: &Secp256k1<VerifyOnly>,
    tx: &BlockTx,
    cancel: &CancellationToken,
) -> Result<Option<TxTweak>> {
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(compute_tweak(secp, tx)?.into_tweak())
}

/// Everything on the calling task.
#[derive(Debug, Default, Clone, Copy)]
pub struct Serial;

#[async_trait]
impl TaskDistribution for Serial {
    fn name(&self) -> &'static str {
        "serial"
    }

    async fn compute(
        &self,
        txs: Arc<[BlockTx]>,
        cancel: &CancellationToken,
    ) -> Result<Vec<TxTweak>> {
        let secp = Secp256k1::verification_only();
        let mut tweaks = Vec::new();
        for idx in eligible_indices(&txs) {
            if let Some(tweak) = tweak_one(&secp, &txs[idx], cancel)? {
                tweaks.push(tweak);
            }
        }
        Ok(tweaks)
    }
}

/// One task per transaction, at most `max_in_flight` running, results pushed
/// into a shared accumulator.
#[derive(Debug, Clone, Copy)]
pub struct FanOut {
    max_in_flight: usize,
}

impl FanOut {
    pub fn new(max_in_flight: usize) -> Self {
        Self {
            max_in_flight: max_in_flight.max(1),
        }
    }
}

#[async_trait]
impl TaskDistribution for FanOut {
    fn name(&self) -> &'static str {
        "fan-out"
    }

    async fn compute(
        &self,
        txs: Arc<[BlockTx]>,
        cancel: &CancellationToken,
    ) -> Result<Vec<TxTweak>> {
        let secp: Secp = Arc::new(Secp256k1::verification_only());
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let accumulator = Arc::new(Mutex::new(Vec::new()));
        let mut tasks = JoinSet::new();

        for idx in eligible_indices(&txs) {
            let permit = acquire(&semaphore, cancel).await?;
            let (secp, txs, accumulator, cancel) =
                (secp.clone(), txs.clone(), accumulator.clone(), cancel.clone());
            tasks.spawn(async move {
                let _permit = permit;
                if let Some(tweak) = tweak_one(&secp, &txs[idx], &cancel)? {
                    accumulator.lock().await.push(tweak);
                }
                Ok::<_, Error>(())
            });

            // surface failures early instead of after the whole block was queued
            while let Some(done) = tasks.try_join_next() {
                done??;
            }
        }

        while let Some(done) = tasks.join_next().await {
            done??;
        }

        let tweaks = std::mem::take(&mut *accumulator.lock().await);
        Ok(tweaks)
    }
}

/// Contiguous slices, one task each, merged once at the end.
#[derive(Debug, Clone, Copy)]
pub struct Partition {
    parallelism: usize,
}

impl Partition {
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism: parallelism.max(1),
        }
    }
}

#[async_trait]
impl TaskDistribution for Partition {
    fn name(&self) -> &'static str {
        "partition"
    }

    async fn compute(
        &self,
        txs: Arc<[BlockTx]>,
        cancel: &CancellationToken,
    ) -> Result<Vec<TxTweak>> {
        let indices = eligible_indices(&txs);
        if indices.is_empty() {
            return Ok(Vec::new());
        }
        let chunk_size = indices.len().div_ceil(self.parallelism);
        let secp: Secp = Arc::new(Secp256k1::verification_only());

        let mut tasks = JoinSet::new();
        for chunk in indices.chunks(chunk_size) {
            let (secp, txs, cancel, chunk) =
                (secp.clone(), txs.clone(), cancel.clone(), chunk.to_vec());
            tasks.spawn(async move {
                let mut local = Vec::with_capacity(chunk.len());
                for idx in chunk {
                    if let Some(tweak) = tweak_one(&secp, &txs[idx], &cancel)? {
                        local.push(tweak);
                    }
                }
                Ok::<_, Error>(local)
            });
        }

        // dropping the set on an early return aborts the remaining slices
        let mut tweaks = Vec::with_capacity(indices.len());
        while let Some(done) = tasks.join_next().await {
            tweaks.extend(done??);
        }
        Ok(tweaks)
    }
}

/// A fixed set of workers pulling from a shared queue. A single aggregator
/// drains their results. The number of queued plus running items is bounded
/// by an admission semaphore.
#[derive(Debug, Clone, Copy)]
pub struct WorkerPool {
    workers: usize,
    max_in_flight: usize,
}

impl WorkerPool {
    pub fn new(workers: usize, max_in_flight: usize) -> Self {
        Self {
            workers: workers.max(1),
            max_in_flight: max_in_flight.max(1),
        }
    }
}

#[async_trait]
impl TaskDistribution for WorkerPool {
    fn name(&self) -> &'static str {
        "worker-pool"
    }

    async fn compute(
        &self,
        txs: Arc<[BlockTx]>,
        cancel: &CancellationToken,
    ) -> Result<Vec<TxTweak>> {
        let indices = eligible_indices(&txs);
        let (work_tx, work_rx) =
            async_channel::bounded::<(usize, OwnedSemaphorePermit)>(self.max_in_flight);
        let (result_tx, mut result_rx) =
            mpsc::channel::<Result<Option<TxTweak>>>(self.max_in_flight);
        let semaphore = Arc::new(Semaphore::new(self.max_in_flight));
        let secp: Secp = Arc::new(Secp256k1::verification_only());
        let mut tasks = JoinSet::new();

        for _ in 0..self.workers {
            let (secp, txs, cancel) = (secp.clone(), txs.clone(), cancel.clone());
            let (work_rx, result_tx) = (work_rx.clone(), result_tx.clone());
            tasks.spawn(async move {
                while let Ok((idx, permit)) = work_rx.recv().await {
                    let result = tweak_one(&secp, &txs[idx], &cancel);
                    drop(permit);
                    if result_tx.send(result).await.is_err() {
                        break;
                    }
                }
                Ok::<_, Error>(())
            });
        }
        drop(work_rx);
        drop(result_tx);

        let producer_cancel = cancel.clone();
        tasks.spawn(async move {
            for idx in indices {
                let permit = acquire(&semaphore, &producer_cancel).await?;
                if work_tx.send((idx, permit)).await.is_err() {
                    break;
                }
            }
            Ok(())
        });

        let mut tweaks = Vec::new();
        while let Some(result) = result_rx.recv().await {
            if let Some(tweak) = result? {
                tweaks.push(tweak);
            }
        }

        while let Some(done) = tasks.join_next().await {
            done??;
        }
        Ok(tweaks)
    }
}

async fn acquire(
    semaphore: &Arc<Semaphore>,
    cancel: &CancellationToken,
) -> Result<OwnedSemaphorePermit> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        permit = semaphore.clone().acquire_owned() => permit.map_err(|_| Error::Cancelled),
    }
}
