//! A two-tier (pending/confirmed) relational index over an append-only,
//! content-addressed chain with large tagged transactions.
//!
//! This crate owns ingestion, fork-tolerant promotion, aged-out cleanup,
//! and the paginated query engine described in its components. It does
//! not speak to the network: fetching blocks and transactions, serving a
//! GraphQL API, and process lifecycle all live in the surrounding binary.

pub mod chain_source;
pub mod config;
pub mod constants;
pub mod encoding;
pub mod error;
pub mod logging;
pub mod store;
pub mod types;

pub use chain_source::{ChainSource, SourceBlock};
pub use config::{StabilizationConfig, StoreConfig};
pub use error::{IndexError, Result};
pub use store::ChainIndexStore;
pub use types::{
    BigNumber, Block, BlockRow, DebugInfo, GqlBlocksArgs, GqlBlocksPage, GqlEdge, GqlTag,
    GqlTransactionsArgs, GqlTransactionsPage, PageInfo, SortOrder, Tag, TagFilter, Tier,
    Transaction, TransactionRow,
};
