mod common;

use common::{block, block_hash, empty_blocks, funding, spend, Coin, Harness, MockChain};
use spindex_core::bitcoin::bip158::BlockFilter;
use spindex_core::bitcoin::BlockHash;
use spindex_core::filters::spent_outpoint_hash;
use spindex_core::{Block, BlockTx, FilterType, OracleConfig};
use tokio_util::sync::CancellationToken;

/// Heights 100..=110 where each block spends the larger output created one
/// block earlier. Only an in-order replay sees those spends.
fn spend_chain() -> (Vec<Block>, Vec<BlockTx>) {
    let mut txs = vec![funding(10, &[1_000, 2_000])];
    let mut blocks = empty_blocks(0, 100);
    blocks.push(block(100, vec![txs[0].clone()]));

    for height in 101..=110u32 {
        let i = (height - 100) as usize;
        let prev = Coin::of(&txs[i - 1], 1, height - 1);
        txs.push(spend(10 + i as u8, &[prev], &[1_000, 2_000]));
        blocks.push(block(height, vec![txs[i].clone()]));
    }
    blocks.push(block(111, Vec::new()));
    (blocks, txs)
}

fn config() -> OracleConfig {
    OracleConfig {
        sync_start_height: 100,
        sync_window: 4,
        header_batch_size: 3,
        max_parallel_requests: 11,
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn out_of_order_fetches_replay_in_height_order() {
    let (blocks, txs) = spend_chain();
    let harness = Harness::new(MockChain::new(blocks).with_jitter(), config());

    let applied = harness
        .sync
        .sync_to_tip(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(applied, 11);

    for (i, tx) in txs.iter().enumerate() {
        let origin = block_hash(100 + i as u32, 0);
        let tweak = harness.db.tweak(&origin, &tx.txid).unwrap().unwrap();
        let expected = if i == 10 { 2_000 } else { 1_000 };
        assert_eq!(tweak.highest_value, expected, "tweak of block {}", 100 + i);
    }
    assert_eq!(harness.db.unprocessed_heights(100, 112).unwrap(), vec![111]);
}

#[tokio::test]
async fn resync_of_processed_range_writes_nothing() {
    let (blocks, _) = spend_chain();
    let harness = Harness::new(MockChain::new(blocks), config());

    assert_eq!(harness.sync().await, 12);
    let writes = harness.store.writes();
    assert!(writes > 0);

    assert_eq!(harness.sync().await, 0);
    assert_eq!(harness.store.writes(), writes);
}

#[tokio::test]
async fn stored_filters_match_wallet_queries() {
    let (blocks, txs) = spend_chain();
    let harness = Harness::new(MockChain::new(blocks), config());
    harness.sync().await;

    let hash: BlockHash = block_hash(101, 0);
    let created = harness
        .db
        .filter(FilterType::NewUtxos, &hash)
        .unwrap()
        .unwrap();
    let filter = BlockFilter::new(&created.data);
    let keys: Vec<Vec<u8>> = txs[1]
        .outputs
        .iter()
        .map(|out| out.script_pubkey.as_bytes()[2..].to_vec())
        .collect();
    assert!(filter.match_any(&hash, &mut keys.iter().map(Vec::as_slice)).unwrap());

    let foreign = txs[5].outputs[0].script_pubkey.as_bytes()[2..].to_vec();
    assert!(!filter
        .match_any(&hash, &mut [foreign.as_slice()].into_iter())
        .unwrap());

    let spent = harness
        .db
        .filter(FilterType::Spent, &hash)
        .unwrap()
        .unwrap();
    let filter = BlockFilter::new(&spent.data);
    let query = spent_outpoint_hash(&txs[1].inputs[0].previous_output, &hash);
    assert!(filter.match_any(&hash, &mut [&query[..]].into_iter()).unwrap());

    let index = harness.db.spent_index(&hash).unwrap().unwrap();
    assert_eq!(index.data, vec![query]);
}

#[tokio::test]
async fn per_height_queries_see_applied_blocks() {
    let (blocks, txs) = spend_chain();
    let harness = Harness::new(MockChain::new(blocks), config());
    harness.sync().await;

    let tweaks = harness.db.tweaks_at_height(104).unwrap();
    assert_eq!(tweaks.len(), 1);
    assert_eq!(tweaks[0].txid, txs[4].txid);

    let utxos = harness.db.utxos_for_block(&block_hash(104, 0)).unwrap();
    assert_eq!(utxos.len(), 2);
    assert_eq!(harness.db.best_processed_height().unwrap(), Some(111));
}
