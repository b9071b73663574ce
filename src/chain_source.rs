//! The interface consumed from outside this crate: the chain source collaborator that
//! supplies blocks and their transactions. This crate ships no HTTP
//! implementation of this trait — the client, retry logic, and JSON
//! decoding at the network boundary are deliberately out of scope
//! and live in the surrounding orchestrator.

use crate::types::{Block, Transaction};
use async_trait::async_trait;

/// One block's ingestible payload: the block itself, the transactions that
/// were successfully fetched, and the ids that were not.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceBlock {
    pub block: Block,
    pub txs: Vec<Transaction>,
    pub missing_tx_ids: Vec<Vec<u8>>,
}

#[async_trait]
pub trait ChainSource: Send + Sync {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Fetch the block at `height` along with as many of its transactions
    /// as could be retrieved; `txs` and `missing_tx_ids` together must
    /// cover every id in `block.txs`.
    async fn get_block_and_txs_by_height(&self, height: i64) -> Result<SourceBlock, Self::Error>;
}
