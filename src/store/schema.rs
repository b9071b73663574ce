//! Table definitions and indices.
//!
//! Every entity in the data model that can be reorganized — Block,
//! BlockHeight, BlockTransaction, Transaction, TransactionTag — exists in
//! parallel `pending_*`/`confirmed_*` tables. TagName, TagValue, and Wallet
//! are shared and append-only. SQLite has no schema-level foreign keys
//! declared here: reachability from a confirmed/pending BlockHeight row is
//! enforced by the query and cleanup logic.

use crate::error::Result;
use sqlx::SqlitePool;

fn block_table_ddl(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            indep_hash BLOB PRIMARY KEY,
            height INTEGER NOT NULL,
            previous_block BLOB NOT NULL,
            nonce BLOB NOT NULL,
            hash BLOB NOT NULL,
            block_timestamp INTEGER NOT NULL,
            diff TEXT NOT NULL,
            cumulative_diff TEXT NOT NULL,
            last_retarget INTEGER NOT NULL,
            reward_addr BLOB NOT NULL,
            reward_pool TEXT NOT NULL,
            block_size TEXT NOT NULL,
            weave_size TEXT NOT NULL,
            usd_to_ar_rate_dividend INTEGER NOT NULL,
            usd_to_ar_rate_divisor INTEGER NOT NULL,
            scheduled_usd_to_ar_rate_dividend INTEGER NOT NULL,
            scheduled_usd_to_ar_rate_divisor INTEGER NOT NULL,
            hash_list_merkle BLOB,
            wallet_list BLOB NOT NULL,
            tx_root BLOB,
            tx_count INTEGER NOT NULL,
            missing_tx_count INTEGER NOT NULL
        )"
    )
}

fn block_height_table_ddl(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            height INTEGER NOT NULL,
            indep_hash BLOB NOT NULL
        )"
    )
}

fn block_transaction_table_ddl(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            block_indep_hash BLOB NOT NULL,
            transaction_id BLOB NOT NULL,
            block_transaction_index INTEGER NOT NULL,
            PRIMARY KEY (block_indep_hash, transaction_id)
        )"
    )
}

/// Pending transactions carry no height — a pending row belongs to
/// whichever BlockTransaction/BlockHeight rows currently join to it, which
/// can change under a fork. Confirmed transactions are append-only on a
/// linear chain, so `height`/`block_transaction_index` are denormalized
/// onto the row itself (carrying through height and
/// block_transaction_index"), avoiding a join for the common unfiltered sort.
fn transaction_table_ddl(table: &str, confirmed: bool) -> String {
    let extra_columns = if confirmed {
        "height INTEGER NOT NULL,\n            block_transaction_index INTEGER NOT NULL,\n            "
    } else {
        ""
    };
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (
            id BLOB NOT NULL,
            signature BLOB NOT NULL,
            format INTEGER NOT NULL,
            last_tx BLOB NOT NULL,
            owner_address BLOB NOT NULL,
            target BLOB NOT NULL,
            quantity TEXT NOT NULL,
            reward TEXT NOT NULL,
            data_size TEXT NOT NULL,
            data_root BLOB,
            content_type TEXT,
            tag_count INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            {extra_columns}PRIMARY KEY (id)
        )"
    )
}

const CREATE_SHARED_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS tag_names (
        hash BLOB PRIMARY KEY,
        name BLOB NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS tag_values (
        hash BLOB PRIMARY KEY,
        value BLOB NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS wallets (
        address BLOB PRIMARY KEY,
        public_modulus BLOB NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS pending_transaction_tags (
        transaction_id BLOB NOT NULL,
        transaction_tag_index INTEGER NOT NULL,
        tag_name_hash BLOB NOT NULL,
        tag_value_hash BLOB NOT NULL,
        PRIMARY KEY (transaction_id, transaction_tag_index)
    )",
    "CREATE TABLE IF NOT EXISTS confirmed_transaction_tags (
        transaction_id BLOB NOT NULL,
        transaction_tag_index INTEGER NOT NULL,
        tag_name_hash BLOB NOT NULL,
        tag_value_hash BLOB NOT NULL,
        height INTEGER NOT NULL,
        block_transaction_index INTEGER NOT NULL,
        PRIMARY KEY (transaction_id, transaction_tag_index)
    )",
    "CREATE TABLE IF NOT EXISTS missing_transactions (
        block_indep_hash BLOB NOT NULL,
        transaction_id BLOB NOT NULL,
        height INTEGER NOT NULL,
        PRIMARY KEY (block_indep_hash, transaction_id)
    )",
];

const CREATE_INDICES: &[&str] = &[
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_pending_block_heights_height_hash
        ON pending_block_heights (height, indep_hash)",
    "CREATE INDEX IF NOT EXISTS idx_pending_block_heights_height ON pending_block_heights (height)",
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_confirmed_block_heights_height_hash
        ON confirmed_block_heights (height, indep_hash)",
    "CREATE INDEX IF NOT EXISTS idx_confirmed_block_heights_height ON confirmed_block_heights (height)",
    "CREATE INDEX IF NOT EXISTS idx_pending_block_transactions_block
        ON pending_block_transactions (block_indep_hash)",
    "CREATE INDEX IF NOT EXISTS idx_pending_block_transactions_tx
        ON pending_block_transactions (transaction_id)",
    "CREATE INDEX IF NOT EXISTS idx_confirmed_block_transactions_block
        ON confirmed_block_transactions (block_indep_hash)",
    "CREATE INDEX IF NOT EXISTS idx_confirmed_block_transactions_tx
        ON confirmed_block_transactions (transaction_id)",
    "CREATE INDEX IF NOT EXISTS idx_pending_transactions_owner ON pending_transactions (owner_address)",
    "CREATE INDEX IF NOT EXISTS idx_pending_transactions_target ON pending_transactions (target)",
    "CREATE INDEX IF NOT EXISTS idx_confirmed_transactions_owner ON confirmed_transactions (owner_address)",
    "CREATE INDEX IF NOT EXISTS idx_confirmed_transactions_target ON confirmed_transactions (target)",
    "CREATE INDEX IF NOT EXISTS idx_confirmed_transactions_sort_key
        ON confirmed_transactions (height, block_transaction_index)",
    "CREATE INDEX IF NOT EXISTS idx_pending_transaction_tags_name_value
        ON pending_transaction_tags (tag_name_hash, tag_value_hash)",
    "CREATE INDEX IF NOT EXISTS idx_pending_transaction_tags_tx
        ON pending_transaction_tags (transaction_id)",
    "CREATE INDEX IF NOT EXISTS idx_confirmed_transaction_tags_name_value
        ON confirmed_transaction_tags (tag_name_hash, tag_value_hash)",
    "CREATE INDEX IF NOT EXISTS idx_confirmed_transaction_tags_sort_key
        ON confirmed_transaction_tags (height, block_transaction_index)",
    "CREATE INDEX IF NOT EXISTS idx_missing_transactions_height ON missing_transactions (height)",
];

/// Create every table and index, idempotently.
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    let statements: Vec<String> = vec![
        block_table_ddl("pending_blocks"),
        block_table_ddl("confirmed_blocks"),
        block_height_table_ddl("pending_block_heights"),
        block_height_table_ddl("confirmed_block_heights"),
        block_transaction_table_ddl("pending_block_transactions"),
        block_transaction_table_ddl("confirmed_block_transactions"),
        transaction_table_ddl("pending_transactions", false),
        transaction_table_ddl("confirmed_transactions", true),
    ];

    for statement in &statements {
        sqlx::query(statement).execute(pool).await?;
    }
    for statement in CREATE_SHARED_TABLES {
        sqlx::query(statement).execute(pool).await?;
    }
    for statement in CREATE_INDICES {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
