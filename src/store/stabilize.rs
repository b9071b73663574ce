//! Stabilization engine and height reset.
//!
//! Promotion moves pending rows whose height is strictly less than
//! `end_height` into the confirmed tier; cleanup then deletes pending rows
//! that have either been promoted or aged out. Both run as their own
//! single write transaction — promotion must never be interleaved with
//! cleanup, since cleanup's "below threshold" predicates depend on rows
//! that promotion either just copied or is about to make unreachable.

use crate::error::Result;
use crate::store::ChainIndexStore;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::info;

/// A height may map to several competing indep_hashes in the pending
/// tier (forks). This picks one canonical indep_hash per height — the
/// most recently inserted pending BlockHeight row, i.e. the highest
/// SQLite `rowid` — so a re-run of promotion for the same range is
/// deterministic. See DESIGN.md's Open Question decisions.
const CANONICAL_HEIGHTS_CTE: &str = "WITH canonical_heights AS (
    SELECT height, indep_hash FROM (
        SELECT height, indep_hash, ROW_NUMBER() OVER (PARTITION BY height ORDER BY rowid DESC) AS rn
        FROM pending_block_heights WHERE height < ?
    ) WHERE rn = 1
)";

/// Promote every pending row whose height is `< end_height` into the
/// confirmed tier, then clean up pending rows that are now redundant or
/// aged out. A no-op (but harmless) call when `end_height <= 0`.
pub async fn stabilize(store: &ChainIndexStore, end_height: i64) -> Result<()> {
    promote(&store.pool, end_height).await?;
    cleanup(store, end_height).await?;
    Ok(())
}

async fn promote(pool: &SqlitePool, end_height: i64) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(&format!(
        "{CANONICAL_HEIGHTS_CTE}
         INSERT OR IGNORE INTO confirmed_block_heights (height, indep_hash)
         SELECT height, indep_hash FROM canonical_heights"
    ))
    .bind(end_height)
    .execute(&mut *tx)
    .await?;

    sqlx::query(&format!(
        "{CANONICAL_HEIGHTS_CTE}
         INSERT OR IGNORE INTO confirmed_blocks
         SELECT pb.indep_hash, pb.height, pb.previous_block, pb.nonce, pb.hash, pb.block_timestamp,
                pb.diff, pb.cumulative_diff, pb.last_retarget, pb.reward_addr, pb.reward_pool,
                pb.block_size, pb.weave_size, pb.usd_to_ar_rate_dividend, pb.usd_to_ar_rate_divisor,
                pb.scheduled_usd_to_ar_rate_dividend, pb.scheduled_usd_to_ar_rate_divisor,
                pb.hash_list_merkle, pb.wallet_list, pb.tx_root, pb.tx_count, pb.missing_tx_count
         FROM pending_blocks pb
         JOIN canonical_heights ch ON ch.indep_hash = pb.indep_hash"
    ))
    .bind(end_height)
    .execute(&mut *tx)
    .await?;

    sqlx::query(&format!(
        "{CANONICAL_HEIGHTS_CTE}
         INSERT OR IGNORE INTO confirmed_block_transactions (block_indep_hash, transaction_id, block_transaction_index)
         SELECT pbt.block_indep_hash, pbt.transaction_id, pbt.block_transaction_index
         FROM pending_block_transactions pbt
         JOIN canonical_heights ch ON ch.indep_hash = pbt.block_indep_hash"
    ))
    .bind(end_height)
    .execute(&mut *tx)
    .await?;

    sqlx::query(&format!(
        "{CANONICAL_HEIGHTS_CTE}
         INSERT OR IGNORE INTO confirmed_transactions (
             id, signature, format, last_tx, owner_address, target, quantity, reward,
             data_size, data_root, content_type, tag_count, created_at, height, block_transaction_index
         )
         SELECT pt.id, pt.signature, pt.format, pt.last_tx, pt.owner_address, pt.target, pt.quantity,
                pt.reward, pt.data_size, pt.data_root, pt.content_type, pt.tag_count, pt.created_at,
                ch.height, pbt.block_transaction_index
         FROM pending_transactions pt
         JOIN pending_block_transactions pbt ON pbt.transaction_id = pt.id
         JOIN canonical_heights ch ON ch.indep_hash = pbt.block_indep_hash"
    ))
    .bind(end_height)
    .execute(&mut *tx)
    .await?;

    sqlx::query(&format!(
        "{CANONICAL_HEIGHTS_CTE}
         INSERT OR IGNORE INTO confirmed_transaction_tags (
             transaction_id, transaction_tag_index, tag_name_hash, tag_value_hash, height, block_transaction_index
         )
         SELECT ptt.transaction_id, ptt.transaction_tag_index, ptt.tag_name_hash, ptt.tag_value_hash,
                ch.height, pbt.block_transaction_index
         FROM pending_transaction_tags ptt
         JOIN pending_block_transactions pbt ON pbt.transaction_id = ptt.transaction_id
         JOIN canonical_heights ch ON ch.indep_hash = pbt.block_indep_hash"
    ))
    .bind(end_height)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(end_height, "promotion committed");
    Ok(())
}

async fn cleanup(store: &ChainIndexStore, height_threshold: i64) -> Result<()> {
    let mut tx = store.pool.begin().await?;

    let max_confirmed_timestamp: Option<i64> =
        sqlx::query_scalar("SELECT MAX(block_timestamp) FROM confirmed_blocks")
            .fetch_one(&mut *tx)
            .await?;
    let created_at_threshold = max_confirmed_timestamp
        .map(|t| t - store.config().stabilization.new_tx_cleanup_wait_secs);

    // Transactions to purge: belong to a pending block below the height
    // threshold, or are loose (never made it into any block) and have
    // aged past the cleanup window. Computed once, up front, since later
    // deletes in this function would otherwise make the same predicate
    // untestable.
    let purge_ids: Vec<Vec<u8>> = if let Some(created_at_threshold) = created_at_threshold {
        sqlx::query_scalar(
            "SELECT pt.id FROM pending_transactions pt WHERE pt.created_at < ?
             UNION
             SELECT pbt.transaction_id FROM pending_block_transactions pbt
             JOIN pending_block_heights pbh ON pbh.indep_hash = pbt.block_indep_hash
             WHERE pbh.height < ?",
        )
        .bind(created_at_threshold)
        .bind(height_threshold)
        .fetch_all(&mut *tx)
        .await?
    } else {
        sqlx::query_scalar(
            "SELECT pbt.transaction_id FROM pending_block_transactions pbt
             JOIN pending_block_heights pbh ON pbh.indep_hash = pbt.block_indep_hash
             WHERE pbh.height < ?",
        )
        .bind(height_threshold)
        .fetch_all(&mut *tx)
        .await?
    };

    delete_by_ids(&mut tx, "pending_transaction_tags", "transaction_id", &purge_ids).await?;
    delete_by_ids(&mut tx, "pending_transactions", "id", &purge_ids).await?;
    delete_by_ids(&mut tx, "pending_block_transactions", "transaction_id", &purge_ids).await?;

    sqlx::query("DELETE FROM pending_blocks WHERE height < ?")
        .bind(height_threshold)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM pending_block_heights WHERE height < ?")
        .bind(height_threshold)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "DELETE FROM missing_transactions
         WHERE height < ?
           AND EXISTS (
             SELECT 1 FROM confirmed_block_transactions cbt
             WHERE cbt.block_indep_hash = missing_transactions.block_indep_hash
               AND cbt.transaction_id = missing_transactions.transaction_id
           )",
    )
    .bind(height_threshold)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    info!(height_threshold, purged = purge_ids.len(), "cleanup committed");
    Ok(())
}

async fn delete_by_ids(
    tx: &mut sqlx::Transaction<'_, Sqlite>,
    table: &str,
    column: &str,
    ids: &[Vec<u8>],
) -> Result<()> {
    // SQLite caps bound parameters per statement (default 999); chunk to
    // stay well under that regardless of how many rows are being purged.
    for chunk in ids.chunks(500) {
        if chunk.is_empty() {
            continue;
        }
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new(format!("DELETE FROM {table} WHERE {column} IN ("));
        let mut separated = builder.separated(", ");
        for id in chunk {
            separated.push_bind(id.clone());
        }
        builder.push(")");
        builder.build().execute(&mut **tx).await?;
    }
    Ok(())
}

/// Delete every pending BlockHeight row above `h`. Rows whose
/// BlockHeight vanished become unreachable from any query and are cleaned
/// up by the next stabilization pass.
pub async fn reset_to_height(store: &ChainIndexStore, h: i64) -> Result<()> {
    sqlx::query("DELETE FROM pending_block_heights WHERE height > ?")
        .bind(h)
        .execute(&store.pool)
        .await?;
    info!(height = h, "reset pending chain to height");
    Ok(())
}
