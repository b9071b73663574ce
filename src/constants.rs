//! Tunable defaults for the ingestion and stabilization engines.
//!
//! These are the compiled-in defaults; `config::StoreConfig` may override
//! each of them at runtime.

/// Number of accepted blocks between stabilization passes.
pub const STABLE_FLUSH_INTERVAL: u64 = 50;

/// Blocks back from the tip treated as potentially reorg-able; stabilization
/// never promotes a block newer than `tip - MAX_FORK_DEPTH`.
pub const MAX_FORK_DEPTH: u64 = 50;

/// Loose (never-mined) pending transactions older than this are purged
/// during cleanup, in seconds.
pub const NEW_TX_CLEANUP_WAIT_SECS: i64 = 86_400;

/// Historical multiplier from the `height * 1000 + block_transaction_index`
/// sort-key encoding. This crate compares `(height, block_transaction_index)`
/// lexicographically instead and keeps this constant
/// only so callers that still validate against it have something to check.
pub const BLOCK_TRANSACTION_INDEX_BOUND: i64 = 1000;
