//! Ingestion engine.
//!
//! `save_block_and_txs` atomically commits one block, its block↔tx
//! associations, its full transactions (with tags and owner wallets), and
//! its missing-tx placeholders, all in the pending tier. Every insert uses
//! insert-or-ignore semantics on its primary key, so replaying the same
//! call is idempotent — a retried ingest after a dropped connection never
//! produces duplicate rows or partial state.

use crate::encoding::{tag_fingerprint, wallet_address};
use crate::error::Result;
use crate::store::{stabilize, ChainIndexStore};
use crate::types::{Block, Transaction};
use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

/// Commit one block and its transactions to the pending tier, then — if
/// this block lands on a stabilization boundary — run the stabilization
/// engine for the caller.
///
/// `txs` must be the subset of `block.txs` that was successfully fetched;
/// `missing_tx_ids` must cover the remainder. Any database error aborts the
/// whole transaction — no partial block is ever persisted.
pub async fn save_block_and_txs(
    store: &ChainIndexStore,
    block: &Block,
    txs: &[Transaction],
    missing_tx_ids: &[Vec<u8>],
) -> Result<()> {
    let block_tx_index: HashMap<&[u8], i64> = block
        .txs
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_slice(), i as i64))
        .collect();

    let mut db_tx = store.pool.begin().await?;

    sqlx::query("INSERT OR IGNORE INTO pending_block_heights (height, indep_hash) VALUES (?, ?)")
        .bind(block.height)
        .bind(&block.indep_hash)
        .execute(&mut *db_tx)
        .await?;

    sqlx::query(
        "INSERT OR IGNORE INTO pending_blocks (
            indep_hash, height, previous_block, nonce, hash, block_timestamp,
            diff, cumulative_diff, last_retarget, reward_addr, reward_pool,
            block_size, weave_size, usd_to_ar_rate_dividend, usd_to_ar_rate_divisor,
            scheduled_usd_to_ar_rate_dividend, scheduled_usd_to_ar_rate_divisor,
            hash_list_merkle, wallet_list, tx_root, tx_count, missing_tx_count
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&block.indep_hash)
    .bind(block.height)
    .bind(&block.previous_block)
    .bind(&block.nonce)
    .bind(&block.hash)
    .bind(block.block_timestamp)
    .bind(block.diff.to_decimal_string())
    .bind(block.cumulative_diff.to_decimal_string())
    .bind(block.last_retarget)
    .bind(&block.reward_addr)
    .bind(block.reward_pool.to_decimal_string())
    .bind(block.block_size.to_decimal_string())
    .bind(block.weave_size.to_decimal_string())
    .bind(block.usd_to_ar_rate_dividend)
    .bind(block.usd_to_ar_rate_divisor)
    .bind(block.scheduled_usd_to_ar_rate_dividend)
    .bind(block.scheduled_usd_to_ar_rate_divisor)
    .bind(&block.hash_list_merkle)
    .bind(&block.wallet_list)
    .bind(&block.tx_root)
    .bind(block.tx_count())
    .bind(missing_tx_ids.len() as i64)
    .execute(&mut *db_tx)
    .await?;

    for tx in txs {
        let Some(&block_transaction_index) = block_tx_index.get(tx.id.as_slice()) else {
            continue;
        };

        let owner_address = wallet_address(&tx.owner_public_modulus);

        sqlx::query("INSERT OR IGNORE INTO wallets (address, public_modulus) VALUES (?, ?)")
            .bind(&owner_address)
            .bind(&tx.owner_public_modulus)
            .execute(&mut *db_tx)
            .await?;

        let content_type = derive_content_type(tx);
        let created_at = now_unix_secs();

        sqlx::query(
            "INSERT OR IGNORE INTO pending_transactions (
                id, signature, format, last_tx, owner_address, target,
                quantity, reward, data_size, data_root, content_type, tag_count, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&tx.id)
        .bind(&tx.signature)
        .bind(tx.format)
        .bind(&tx.last_tx)
        .bind(&owner_address)
        .bind(&tx.target)
        .bind(tx.quantity.to_decimal_string())
        .bind(tx.reward.to_decimal_string())
        .bind(tx.data_size.to_decimal_string())
        .bind(&tx.data_root)
        .bind(&content_type)
        .bind(tx.tags.len() as i64)
        .bind(created_at)
        .execute(&mut *db_tx)
        .await?;

        sqlx::query(
            "INSERT OR IGNORE INTO pending_block_transactions
                (block_indep_hash, transaction_id, block_transaction_index) VALUES (?, ?, ?)",
        )
        .bind(&block.indep_hash)
        .bind(&tx.id)
        .bind(block_transaction_index)
        .execute(&mut *db_tx)
        .await?;

        for (tag_index, tag) in tx.tags.iter().enumerate() {
            let name_hash = tag_fingerprint(&tag.name);
            let value_hash = tag_fingerprint(&tag.value);

            sqlx::query("INSERT OR IGNORE INTO tag_names (hash, name) VALUES (?, ?)")
                .bind(&name_hash)
                .bind(&tag.name)
                .execute(&mut *db_tx)
                .await?;
            sqlx::query("INSERT OR IGNORE INTO tag_values (hash, value) VALUES (?, ?)")
                .bind(&value_hash)
                .bind(&tag.value)
                .execute(&mut *db_tx)
                .await?;
            sqlx::query(
                "INSERT OR IGNORE INTO pending_transaction_tags
                    (transaction_id, transaction_tag_index, tag_name_hash, tag_value_hash)
                    VALUES (?, ?, ?, ?)",
            )
            .bind(&tx.id)
            .bind(tag_index as i64)
            .bind(&name_hash)
            .bind(&value_hash)
            .execute(&mut *db_tx)
            .await?;
        }
    }

    for missing_id in missing_tx_ids {
        sqlx::query(
            "INSERT OR IGNORE INTO missing_transactions (block_indep_hash, transaction_id, height)
                VALUES (?, ?, ?)",
        )
        .bind(&block.indep_hash)
        .bind(missing_id)
        .bind(block.height)
        .execute(&mut *db_tx)
        .await?;
    }

    db_tx.commit().await?;
    debug!(height = block.height, tx_count = txs.len(), "block ingested");

    let flush_interval = store.config().stabilization.stable_flush_interval as i64;
    if flush_interval > 0 && block.height % flush_interval == 0 {
        let end_height = block.height - store.config().stabilization.max_fork_depth as i64;
        info!(end_height, "stabilization boundary reached, promoting");
        stabilize::stabilize(store, end_height).await?;
    }

    Ok(())
}

/// The first tag (by position) whose lowercased UTF-8 name is
/// `content-type` wins; see DESIGN.md's Open Question decision.
fn derive_content_type(tx: &Transaction) -> Option<String> {
    tx.tags.iter().find_map(|tag| {
        let name = std::str::from_utf8(&tag.name).ok()?;
        if name.to_lowercase() == "content-type" {
            std::str::from_utf8(&tag.value).ok().map(|v| v.to_string())
        } else {
            None
        }
    })
}

fn now_unix_secs() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}
