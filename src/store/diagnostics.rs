//! Counts, height summaries, and fork lookups, and the rest of
//! the surface consumed from outside this crate that doesn't belong to `query`.

use crate::error::{IndexError, Result};
use crate::store::ChainIndexStore;
use crate::types::DebugInfo;

/// The greatest height across both BlockHeight tiers, or `-1` if empty.
pub async fn get_max_height(store: &ChainIndexStore) -> Result<i64> {
    let max_height: Option<i64> = sqlx::query_scalar(
        "SELECT MAX(height) FROM (
            SELECT height FROM pending_block_heights
            UNION ALL
            SELECT height FROM confirmed_block_heights
        )",
    )
    .fetch_one(&store.pool)
    .await?;
    Ok(max_height.unwrap_or(-1))
}

/// The pending indep_hash at `height`, if any. Several pending rows can
/// share a height under a fork; the most recently inserted one is
/// returned, matching the canonical-height rule stabilization uses.
pub async fn get_new_block_hash_by_height(
    store: &ChainIndexStore,
    height: i64,
) -> Result<Option<Vec<u8>>> {
    if height < 0 {
        return Err(IndexError::InvalidArgument(format!(
            "height must be non-negative, got {height}"
        )));
    }
    let hash: Option<Vec<u8>> = sqlx::query_scalar(
        "SELECT indep_hash FROM pending_block_heights WHERE height = ? ORDER BY rowid DESC LIMIT 1",
    )
    .bind(height)
    .fetch_optional(&store.pool)
    .await?;
    Ok(hash)
}

pub async fn get_debug_info(store: &ChainIndexStore) -> Result<DebugInfo> {
    let wallet_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wallets")
        .fetch_one(&store.pool)
        .await?;
    let tag_name_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tag_names")
        .fetch_one(&store.pool)
        .await?;
    let tag_value_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tag_values")
        .fetch_one(&store.pool)
        .await?;
    let pending_tx_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_transactions")
        .fetch_one(&store.pool)
        .await?;
    let confirmed_tx_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM confirmed_transactions")
        .fetch_one(&store.pool)
        .await?;
    let pending_block_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pending_block_heights")
        .fetch_one(&store.pool)
        .await?;
    let confirmed_block_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM confirmed_block_heights")
            .fetch_one(&store.pool)
            .await?;
    let (min_pending_height, max_pending_height): (Option<i64>, Option<i64>) = sqlx::query_as(
        "SELECT MIN(height), MAX(height) FROM pending_block_heights",
    )
    .fetch_one(&store.pool)
    .await?;
    let (min_confirmed_height, max_confirmed_height): (Option<i64>, Option<i64>) = sqlx::query_as(
        "SELECT MIN(height), MAX(height) FROM confirmed_block_heights",
    )
    .fetch_one(&store.pool)
    .await?;

    let missing_stable_blocks = match (min_confirmed_height, max_confirmed_height) {
        (Some(min), Some(max)) => Some(max - (min - 1) - confirmed_block_count),
        _ => None,
    };

    Ok(DebugInfo {
        wallet_count,
        tag_name_count,
        tag_value_count,
        pending_tx_count,
        confirmed_tx_count,
        pending_block_count,
        confirmed_block_count,
        min_pending_height,
        max_pending_height,
        min_confirmed_height,
        max_confirmed_height,
        missing_stable_blocks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ingest::save_block_and_txs;
    use crate::store::stabilize::stabilize;
    use crate::types::{BigNumber, Block, Transaction};

    fn sample_block(height: i64, indep_hash: &str, tx_ids: Vec<Vec<u8>>) -> Block {
        Block {
            height,
            indep_hash: indep_hash.as_bytes().to_vec(),
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

    fn sample_tx(id: &[u8]) -> Transaction {
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
            tags: vec![],
        }
    }

    #[tokio::test]
    async fn max_height_is_minus_one_when_empty() {
        let store = ChainIndexStore::open_in_memory().await.unwrap();
        assert_eq!(get_max_height(&store).await.unwrap(), -1);
    }

    #[tokio::test]
    async fn max_height_spans_both_tiers() {
        let store = ChainIndexStore::open_in_memory().await.unwrap();
        for h in 1..=10 {
            let tx_id = format!("tx-{h}").into_bytes();
            let block = sample_block(h, &format!("block-{h}"), vec![tx_id.clone()]);
            let tx = sample_tx(&tx_id);
            save_block_and_txs(&store, &block, &[tx], &[]).await.unwrap();
        }
        stabilize(&store, 6).await.unwrap();
        assert_eq!(get_max_height(&store).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn new_block_hash_by_height_rejects_negative() {
        let store = ChainIndexStore::open_in_memory().await.unwrap();
        let err = get_new_block_hash_by_height(&store, -1).await.unwrap_err();
        assert!(matches!(err, IndexError::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn new_block_hash_by_height_returns_none_when_absent() {
        let store = ChainIndexStore::open_in_memory().await.unwrap();
        assert_eq!(get_new_block_hash_by_height(&store, 42).await.unwrap(), None);
    }

    #[tokio::test]
    async fn new_block_hash_by_height_prefers_most_recent_fork() {
        let store = ChainIndexStore::open_in_memory().await.unwrap();
        let a = sample_block(5, "block-5-a", vec![b"tx-a".to_vec()]);
        let tx_a = sample_tx(b"tx-a");
        save_block_and_txs(&store, &a, &[tx_a], &[]).await.unwrap();

        let b = sample_block(5, "block-5-b", vec![b"tx-b".to_vec()]);
        let tx_b = sample_tx(b"tx-b");
        save_block_and_txs(&store, &b, &[tx_b], &[]).await.unwrap();

        assert_eq!(
            get_new_block_hash_by_height(&store, 5).await.unwrap(),
            Some(b"block-5-b".to_vec())
        );
    }

    #[tokio::test]
    async fn missing_stable_blocks_accounts_for_confirmed_gaps() {
        let store = ChainIndexStore::open_in_memory().await.unwrap();
        for h in [1, 2, 4, 5, 6] {
            let tx_id = format!("tx-{h}").into_bytes();
            let block = sample_block(h, &format!("block-{h}"), vec![tx_id.clone()]);
            let tx = sample_tx(&tx_id);
            save_block_and_txs(&store, &block, &[tx], &[]).await.unwrap();
        }
        stabilize(&store, 7).await.unwrap();

        let info = get_debug_info(&store).await.unwrap();
        assert_eq!(info.min_confirmed_height, Some(1));
        assert_eq!(info.max_confirmed_height, Some(6));
        assert_eq!(info.confirmed_block_count, 5);
        // range [1, 6] has 6 slots, only 5 confirmed blocks: one gap (height 3).
        assert_eq!(info.missing_stable_blocks, Some(1));
    }

    #[tokio::test]
    async fn missing_stable_blocks_is_none_when_no_confirmed_blocks() {
        let store = ChainIndexStore::open_in_memory().await.unwrap();
        let info = get_debug_info(&store).await.unwrap();
        assert_eq!(info.missing_stable_blocks, None);
    }
}
