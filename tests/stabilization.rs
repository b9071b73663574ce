//! End-to-end scenarios across ingestion, stabilization, and querying
//! run against a fresh in-memory store.

use chain_index_core::store::diagnostics::get_debug_info;
use chain_index_core::store::ingest::save_block_and_txs;
use chain_index_core::store::query::{get_gql_blocks, get_gql_transaction, get_gql_transactions};
use chain_index_core::store::stabilize::stabilize;
use chain_index_core::{
    BigNumber, Block, ChainIndexStore, GqlBlocksArgs, GqlTransactionsArgs, Tag, Tier, Transaction,
};

fn block_at(height: i64, tx_ids: Vec<Vec<u8>>) -> Block {
    Block {
        height,
        indep_hash: format!("block-{height}").into_bytes(),
        previous_block: b"prev".to_vec(),
        nonce: b"nonce".to_vec(),
        hash: b"hash".to_vec(),
        block_timestamp: 1_700_000_000 + height,
        diff: BigNumber::Int(100),
        cumulative_diff: BigNumber::Int(100 * height),
        last_retarget: 0,
        reward_addr: b"reward-addr".to_vec(),
        reward_pool: BigNumber::Int(0),
        block_size: BigNumber::Int(1024),
        weave_size: BigNumber::Int(2048),
        usd_to_ar_rate_dividend: 1,
        usd_to_ar_rate_divisor: 2,
        scheduled_usd_to_ar_rate_dividend: 1,
        scheduled_usd_to_ar_rate_divisor: 2,
        hash_list_merkle: None,
        wallet_list: b"wallet-list".to_vec(),
        tx_root: None,
        txs: tx_ids,
    }
}

fn tx_with_tags(id: &[u8], tags: Vec<Tag>) -> Transaction {
    Transaction {
        id: id.to_vec(),
        signature: b"sig".to_vec(),
        format: 2,
        last_tx: b"last-tx".to_vec(),
        owner_public_modulus: format!("owner-of-{}", String::from_utf8_lossy(id)).into_bytes(),
        target: b"".to_vec(),
        quantity: BigNumber::Int(0),
        reward: BigNumber::Int(100),
        data_size: BigNumber::Int(512),
        data_root: None,
        tags,
    }
}

/// Scenario 2: ingesting blocks 1-200 with a documented set of absent ids
/// yields exactly that many MissingTransaction rows.
#[tokio::test]
async fn ingesting_200_blocks_records_documented_missing_transactions() {
    let store = ChainIndexStore::open_in_memory().await.unwrap();
    let missing_at_heights = [3, 11, 29, 40, 58, 71, 82, 90, 101, 120, 133, 150, 162, 181, 195];

    for h in 1..=200i64 {
        let present_id = format!("tx-{h}").into_bytes();
        let block = block_at(h, vec![present_id.clone()]);
        let tx = tx_with_tags(&present_id, vec![]);

        if missing_at_heights.contains(&h) {
            let missing_id = format!("missing-tx-{h}").into_bytes();
            let mut block = block;
            block.txs.push(missing_id.clone());
            save_block_and_txs(&store, &block, &[tx], &[missing_id]).await.unwrap();
        } else {
            save_block_and_txs(&store, &block, &[tx], &[]).await.unwrap();
        }
    }

    // Stabilization may have already promoted part of the range; block rows
    // carry their missing-tx count in both tiers, so summing across every
    // returned block (pending + confirmed) accounts for the whole fixture.
    let blocks = get_gql_blocks(&store, &GqlBlocksArgs { page_size: 200, ..Default::default() })
        .await
        .unwrap();
    let total_missing: i64 = blocks.edges.iter().map(|e| e.node.missing_tx_count).sum();
    assert_eq!(total_missing as usize, missing_at_heights.len());
}

/// Scenario 3: promoting a 200-block fixture at `endHeight = 200 - MAX_FORK_DEPTH`
/// leaves the confirmed tier holding every block below that height.
#[tokio::test]
async fn promotion_over_200_blocks_matches_end_height_minus_one() {
    let store = ChainIndexStore::open_in_memory().await.unwrap();
    for h in 1..=200i64 {
        let tx_id = format!("tx-{h}").into_bytes();
        let block = block_at(h, vec![tx_id.clone()]);
        let tx = tx_with_tags(&tx_id, vec![]);
        save_block_and_txs(&store, &block, &[tx], &[]).await.unwrap();
    }

    let end_height = 200 - 50; // MAX_FORK_DEPTH default
    stabilize(&store, end_height).await.unwrap();

    let info = get_debug_info(&store).await.unwrap();
    assert_eq!(info.confirmed_block_count, (end_height - 1) as i64);
}

/// Scenario 5: tag-filtered DESC paging visits a fixture's matches in
/// strictly decreasing order with no overlap between pages.
#[tokio::test]
async fn tag_filtered_desc_paging_is_strictly_ordered_and_non_overlapping() {
    let store = ChainIndexStore::open_in_memory().await.unwrap();
    for h in 1..=10i64 {
        let tx_id = format!("tx-{h}").into_bytes();
        let block = block_at(h, vec![tx_id.clone()]);
        let tx = tx_with_tags(
            &tx_id,
            vec![Tag { name: b"Content-Type".to_vec(), value: b"image/png".to_vec() }],
        );
        save_block_and_txs(&store, &block, &[tx], &[]).await.unwrap();
    }

    let args = GqlTransactionsArgs {
        page_size: 3,
        tags: vec![chain_index_core::TagFilter {
            name: b"Content-Type".to_vec(),
            values: vec![b"image/png".to_vec()],
        }],
        ..Default::default()
    };
    let first = get_gql_transactions(&store, &args).await.unwrap();
    assert_eq!(first.edges.len(), 3);
    assert!(first.page_info.has_next_page);
    assert_eq!(first.edges[0].node.height, 10);
    assert_eq!(first.edges[2].node.height, 8);

    let args2 = GqlTransactionsArgs {
        page_size: 3,
        cursor: Some(first.edges[2].cursor.clone()),
        tags: args.tags.clone(),
        ..Default::default()
    };
    let second = get_gql_transactions(&store, &args2).await.unwrap();
    assert_eq!(second.edges.len(), 3);
    assert_eq!(second.edges[0].node.height, 7);
    assert_eq!(second.edges[2].node.height, 5);

    let first_ids: Vec<_> = first.edges.iter().map(|e| e.node.id.clone()).collect();
    let second_ids: Vec<_> = second.edges.iter().map(|e| e.node.id.clone()).collect();
    assert!(first_ids.iter().all(|id| !second_ids.contains(id)));
}

/// Scenario 6: with matches spanning both tiers, DESC pagination returns
/// every pending match before any confirmed match, and the transition
/// height is strictly higher on the pending side.
#[tokio::test]
async fn two_tier_union_orders_pending_before_confirmed() {
    let store = ChainIndexStore::open_in_memory().await.unwrap();
    for h in 1..=20i64 {
        let tx_id = format!("tx-{h}").into_bytes();
        let block = block_at(h, vec![tx_id.clone()]);
        let tx = tx_with_tags(&tx_id, vec![]);
        save_block_and_txs(&store, &block, &[tx], &[]).await.unwrap();
    }
    stabilize(&store, 11).await.unwrap(); // confirms heights 1..=10

    let args = GqlTransactionsArgs { page_size: 20, ..Default::default() };
    let page = get_gql_transactions(&store, &args).await.unwrap();
    assert_eq!(page.edges.len(), 20);

    let first_confirmed_index = page.edges.iter().position(|e| e.node.tier == Tier::Confirmed);
    let last_pending_index = page
        .edges
        .iter()
        .rposition(|e| e.node.tier == Tier::Pending)
        .expect("at least one pending edge");

    assert!(first_confirmed_index.is_some());
    assert!(last_pending_index < first_confirmed_index.unwrap());

    let transition_pending_height = page.edges[last_pending_index].node.height;
    let transition_confirmed_height = page.edges[first_confirmed_index.unwrap()].node.height;
    assert!(transition_pending_height > transition_confirmed_height);
}

/// Idempotence property: replaying the same call never changes row counts.
#[tokio::test]
async fn replaying_save_block_and_txs_is_idempotent_end_to_end() {
    let store = ChainIndexStore::open_in_memory().await.unwrap();
    let block = block_at(1, vec![b"tx-a".to_vec()]);
    let tx = tx_with_tags(b"tx-a", vec![Tag { name: b"k".to_vec(), value: b"v".to_vec() }]);

    save_block_and_txs(&store, &block, &[tx.clone()], &[]).await.unwrap();
    let before = get_debug_info(&store).await.unwrap();
    save_block_and_txs(&store, &block, &[tx], &[]).await.unwrap();
    let after = get_debug_info(&store).await.unwrap();

    assert_eq!(before, after);
}

/// `getGqlTransaction` resolves pending rows as soon as they're ingested.
#[tokio::test]
async fn get_gql_transaction_resolves_pending_immediately() {
    let store = ChainIndexStore::open_in_memory().await.unwrap();
    let block = block_at(1, vec![b"tx-a".to_vec()]);
    let tx = tx_with_tags(b"tx-a", vec![]);
    save_block_and_txs(&store, &block, &[tx], &[]).await.unwrap();

    let found = get_gql_transaction(&store, b"tx-a").await.unwrap();
    assert!(found.is_some());
    assert_eq!(found.unwrap().tier, Tier::Pending);
}
