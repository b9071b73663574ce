//! Domain model for the chain indexing core.
//!
//! All identifier/signature/hash/address fields are raw bytes; large
//! integer-valued fields (quantity, reward, sizes, rates) are modeled as
//! [`BigNumber`], which keeps a 64-bit integer when the value fits and a
//! decimal string otherwise.

use serde::{Deserialize, Serialize};

/// A quantity that arrives as a decimal string but is stored as a 64-bit
/// integer when it fits, and as text otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BigNumber {
    Int(i64),
    Text(String),
}

impl BigNumber {
    pub fn parse(decimal: &str) -> Self {
        match decimal.parse::<i64>() {
            Ok(n) => BigNumber::Int(n),
            Err(_) => BigNumber::Text(decimal.to_string()),
        }
    }

    pub fn to_decimal_string(&self) -> String {
        match self {
            BigNumber::Int(n) => n.to_string(),
            BigNumber::Text(s) => s.clone(),
        }
    }
}

/// One block as accepted from the chain source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub height: i64,
    pub indep_hash: Vec<u8>,
    pub previous_block: Vec<u8>,
    pub nonce: Vec<u8>,
    pub hash: Vec<u8>,
    pub block_timestamp: i64,
    pub diff: BigNumber,
    pub cumulative_diff: BigNumber,
    pub last_retarget: i64,
    pub reward_addr: Vec<u8>,
    pub reward_pool: BigNumber,
    pub block_size: BigNumber,
    pub weave_size: BigNumber,
    pub usd_to_ar_rate_dividend: i64,
    pub usd_to_ar_rate_divisor: i64,
    pub scheduled_usd_to_ar_rate_dividend: i64,
    pub scheduled_usd_to_ar_rate_divisor: i64,
    pub hash_list_merkle: Option<Vec<u8>>,
    pub wallet_list: Vec<u8>,
    pub tx_root: Option<Vec<u8>>,
    /// Ordered transaction ids that make up this block, per the chain
    /// source. `txs` passed to `save_block_and_txs` is the subset that was
    /// successfully fetched; `missing_tx_ids` covers the remainder.
    pub txs: Vec<Vec<u8>>,
}

impl Block {
    pub fn tx_count(&self) -> i64 {
        self.txs.len() as i64
    }
}

/// A tag attached to a transaction, in raw (pre-hash) form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub name: Vec<u8>,
    pub value: Vec<u8>,
}

/// One fetched transaction. `content_type` is
/// derived at ingest time, not supplied by the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Vec<u8>,
    pub signature: Vec<u8>,
    pub format: i64,
    pub last_tx: Vec<u8>,
    pub owner_public_modulus: Vec<u8>,
    pub target: Vec<u8>,
    pub quantity: BigNumber,
    pub reward: BigNumber,
    pub data_size: BigNumber,
    pub data_root: Option<Vec<u8>>,
    pub tags: Vec<Tag>,
}

/// Sort direction for both query operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortOrder {
    HeightDesc,
    HeightAsc,
}

impl Default for SortOrder {
    fn default() -> Self {
        SortOrder::HeightDesc
    }
}

/// A single requested tag filter: `name == tag.name AND tag.value IN values`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagFilter {
    pub name: Vec<u8>,
    pub values: Vec<Vec<u8>>,
}

/// Arguments to `get_gql_transactions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GqlTransactionsArgs {
    pub page_size: u32,
    pub cursor: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub ids: Vec<Vec<u8>>,
    pub recipients: Vec<Vec<u8>>,
    pub owners: Vec<Vec<u8>>,
    /// Inclusive; `None` or a negative value means unbounded.
    pub min_height: Option<i64>,
    pub max_height: Option<i64>,
    pub tags: Vec<TagFilter>,
}

/// Arguments to `get_gql_blocks`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GqlBlocksArgs {
    pub page_size: u32,
    pub cursor: Option<String>,
    pub sort_order: Option<SortOrder>,
    pub ids: Vec<Vec<u8>>,
    pub min_height: Option<i64>,
    pub max_height: Option<i64>,
}

/// A resolved transaction row as returned to callers, including its
/// position in the total order and its tier of origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRow {
    pub id: Vec<u8>,
    pub signature: Vec<u8>,
    pub format: i64,
    pub last_tx: Vec<u8>,
    pub owner_address: Vec<u8>,
    pub target: Vec<u8>,
    pub quantity: BigNumber,
    pub reward: BigNumber,
    pub data_size: BigNumber,
    pub data_root: Option<Vec<u8>>,
    pub content_type: Option<String>,
    pub tag_count: i64,
    pub created_at: i64,
    pub height: i64,
    pub block_transaction_index: i64,
    pub tier: Tier,
}

/// A resolved block row as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockRow {
    pub indep_hash: Vec<u8>,
    pub height: i64,
    pub previous_block: Vec<u8>,
    pub nonce: Vec<u8>,
    pub hash: Vec<u8>,
    pub block_timestamp: i64,
    pub diff: BigNumber,
    pub cumulative_diff: BigNumber,
    pub last_retarget: i64,
    pub reward_addr: Vec<u8>,
    pub reward_pool: BigNumber,
    pub block_size: BigNumber,
    pub weave_size: BigNumber,
    pub usd_to_ar_rate_dividend: i64,
    pub usd_to_ar_rate_divisor: i64,
    pub scheduled_usd_to_ar_rate_dividend: i64,
    pub scheduled_usd_to_ar_rate_divisor: i64,
    pub hash_list_merkle: Option<Vec<u8>>,
    pub wallet_list: Vec<u8>,
    pub tx_root: Option<Vec<u8>>,
    pub tx_count: i64,
    pub missing_tx_count: i64,
    pub tier: Tier,
}

/// Which tier a resolved row came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tier {
    Pending,
    Confirmed,
}

/// One `{name, value}` tag pair as returned for a resolved transaction,
/// decoded back to UTF-8 strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GqlTag {
    pub name: String,
    pub value: String,
}

/// A page edge: a row plus the cursor pointing at it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GqlEdge<T> {
    pub cursor: String,
    pub node: T,
}

/// Forward-pagination metadata for a page of results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageInfo {
    pub has_next_page: bool,
}

/// A page of transaction edges plus their tags, keyed by transaction id
/// order (the canonical N+1 tag fetch).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GqlTransactionsPage {
    pub edges: Vec<GqlEdge<TransactionRow>>,
    pub tags_by_tx: Vec<Vec<GqlTag>>,
    pub page_info: PageInfo,
}

/// A page of block edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GqlBlocksPage {
    pub edges: Vec<GqlEdge<BlockRow>>,
    pub page_info: PageInfo,
}

/// Diagnostics surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugInfo {
    pub wallet_count: i64,
    pub tag_name_count: i64,
    pub tag_value_count: i64,
    pub pending_tx_count: i64,
    pub confirmed_tx_count: i64,
    pub pending_block_count: i64,
    pub confirmed_block_count: i64,
    pub min_pending_height: Option<i64>,
    pub max_pending_height: Option<i64>,
    pub min_confirmed_height: Option<i64>,
    pub max_confirmed_height: Option<i64>,
    pub missing_stable_blocks: Option<i64>,
}
