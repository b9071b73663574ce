//! Paginated query engine: filter composition, tag-join
//! planning, cursor decoding, and unified pending+confirmed pagination.

use crate::encoding::{tag_fingerprint, BlockCursor, TransactionCursor};
use crate::error::Result;
use crate::store::ChainIndexStore;
use crate::types::{
    BigNumber, BlockRow, GqlBlocksArgs, GqlBlocksPage, GqlEdge, GqlTag, GqlTransactionsArgs,
    GqlTransactionsPage, PageInfo, SortOrder, TagFilter, Tier, TransactionRow,
};
use sqlx::sqlite::Sqlite;
use sqlx::QueryBuilder;

/// `-1` (or any negative height) means "unbounded" at the API boundary.
fn normalize_bound(h: Option<i64>) -> Option<i64> {
    h.filter(|&v| v >= 0)
}

#[derive(sqlx::FromRow)]
struct TxRawRow {
    id: Vec<u8>,
    signature: Vec<u8>,
    format: i64,
    last_tx: Vec<u8>,
    owner_address: Vec<u8>,
    target: Vec<u8>,
    quantity: String,
    reward: String,
    data_size: String,
    data_root: Option<Vec<u8>>,
    content_type: Option<String>,
    tag_count: i64,
    created_at: i64,
    height: i64,
    block_transaction_index: i64,
}

impl TxRawRow {
    fn into_row(self, tier: Tier) -> TransactionRow {
        TransactionRow {
            id: self.id,
            signature: self.signature,
            format: self.format,
            last_tx: self.last_tx,
            owner_address: self.owner_address,
            target: self.target,
            quantity: BigNumber::parse(&self.quantity),
            reward: BigNumber::parse(&self.reward),
            data_size: BigNumber::parse(&self.data_size),
            data_root: self.data_root,
            content_type: self.content_type,
            tag_count: self.tag_count,
            created_at: self.created_at,
            height: self.height,
            block_transaction_index: self.block_transaction_index,
            tier,
        }
    }
}

#[derive(sqlx::FromRow)]
struct BlockRawRow {
    indep_hash: Vec<u8>,
    height: i64,
    previous_block: Vec<u8>,
    nonce: Vec<u8>,
    hash: Vec<u8>,
    block_timestamp: i64,
    diff: String,
    cumulative_diff: String,
    last_retarget: i64,
    reward_addr: Vec<u8>,
    reward_pool: String,
    block_size: String,
    weave_size: String,
    usd_to_ar_rate_dividend: i64,
    usd_to_ar_rate_divisor: i64,
    scheduled_usd_to_ar_rate_dividend: i64,
    scheduled_usd_to_ar_rate_divisor: i64,
    hash_list_merkle: Option<Vec<u8>>,
    wallet_list: Vec<u8>,
    tx_root: Option<Vec<u8>>,
    tx_count: i64,
    missing_tx_count: i64,
}

impl BlockRawRow {
    fn into_row(self, tier: Tier) -> BlockRow {
        BlockRow {
            indep_hash: self.indep_hash,
            height: self.height,
            previous_block: self.previous_block,
            nonce: self.nonce,
            hash: self.hash,
            block_timestamp: self.block_timestamp,
            diff: BigNumber::parse(&self.diff),
            cumulative_diff: BigNumber::parse(&self.cumulative_diff),
            last_retarget: self.last_retarget,
            reward_addr: self.reward_addr,
            reward_pool: BigNumber::parse(&self.reward_pool),
            block_size: BigNumber::parse(&self.block_size),
            weave_size: BigNumber::parse(&self.weave_size),
            usd_to_ar_rate_dividend: self.usd_to_ar_rate_dividend,
            usd_to_ar_rate_divisor: self.usd_to_ar_rate_divisor,
            scheduled_usd_to_ar_rate_dividend: self.scheduled_usd_to_ar_rate_dividend,
            scheduled_usd_to_ar_rate_divisor: self.scheduled_usd_to_ar_rate_divisor,
            hash_list_merkle: self.hash_list_merkle,
            wallet_list: self.wallet_list,
            tx_root: self.tx_root,
            tx_count: self.tx_count,
            missing_tx_count: self.missing_tx_count,
            tier,
        }
    }
}

fn order_keyword(sort_order: SortOrder) -> &'static str {
    match sort_order {
        SortOrder::HeightDesc => "DESC",
        SortOrder::HeightAsc => "ASC",
    }
}

/// Appends ` AND (height, block_transaction_index) {< | >} (h, i)` — the
/// cursor predicate under a 2-tuple lexicographic comparison (see
/// DESIGN.md's Open Question decision on cursor ordering).
fn push_tx_cursor(
    qb: &mut QueryBuilder<Sqlite>,
    height_col: &str,
    index_col: &str,
    cursor: Option<&TransactionCursor>,
    sort_order: SortOrder,
) {
    let Some(cursor) = cursor else { return };
    let op = if sort_order == SortOrder::HeightDesc { "<" } else { ">" };
    qb.push(" AND (");
    qb.push(height_col);
    qb.push(op);
    qb.push_bind(cursor.height);
    qb.push(" OR (");
    qb.push(height_col);
    qb.push(" = ");
    qb.push_bind(cursor.height);
    qb.push(" AND ");
    qb.push(index_col);
    qb.push(op);
    qb.push_bind(cursor.block_transaction_index);
    qb.push("))");
}

fn push_in_clause<I: Iterator<Item = Vec<u8>>>(qb: &mut QueryBuilder<Sqlite>, column: &str, values: I) {
    let mut peekable = values.peekable();
    if peekable.peek().is_none() {
        return;
    }
    qb.push(" AND ");
    qb.push(column);
    qb.push(" IN (");
    let mut separated = qb.separated(", ");
    for v in peekable {
        separated.push_bind(v);
    }
    qb.push(")");
}

/// Each requested tag becomes an `EXISTS` semi-join rather than a plain
/// `JOIN`: a transaction can carry more than one tag row matching a given
/// name (duplicate tag names, or several of the OR'd values), and a plain
/// join would emit one output row per matching tag row instead of one per
/// transaction. `EXISTS` tests membership without multiplying rows, so a
/// transaction matching on several of `tag.values` still appears once.
fn push_tag_filters(qb: &mut QueryBuilder<Sqlite>, tags: &[TagFilter], confirmed: bool, row_alias: &str) {
    for (i, tag) in tags.iter().enumerate() {
        let alias = format!("tag{i}");
        let table = if confirmed { "confirmed_transaction_tags" } else { "pending_transaction_tags" };
        qb.push(" AND EXISTS (SELECT 1 FROM ");
        qb.push(table);
        qb.push(" ");
        qb.push(&alias);
        qb.push(" WHERE ");
        if confirmed {
            qb.push(&alias);
            qb.push(".height = ");
            qb.push(row_alias);
            qb.push(".height AND ");
            qb.push(&alias);
            qb.push(".block_transaction_index = ");
            qb.push(row_alias);
            qb.push(".block_transaction_index");
        } else {
            qb.push(&alias);
            qb.push(".transaction_id = ");
            qb.push(row_alias);
            qb.push(".id");
        }
        qb.push(" AND ");
        qb.push(&alias);
        qb.push(".tag_name_hash = ");
        qb.push_bind(tag_fingerprint(&tag.name));
        qb.push(" AND ");
        qb.push(&alias);
        qb.push(".tag_value_hash IN (");
        {
            let mut separated = qb.separated(", ");
            for v in &tag.values {
                separated.push_bind(tag_fingerprint(v));
            }
        }
        qb.push("))");
    }
}

#[allow(clippy::too_many_arguments)]
fn build_pending_tx_query(
    args: &GqlTransactionsArgs,
    min_height: Option<i64>,
    max_height: Option<i64>,
    cursor: Option<&TransactionCursor>,
    sort_order: SortOrder,
    limit: i64,
) -> QueryBuilder<'static, Sqlite> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "WITH ranked AS (
            SELECT pt.id, pt.signature, pt.format, pt.last_tx, pt.owner_address, pt.target,
                   pt.quantity, pt.reward, pt.data_size, pt.data_root, pt.content_type,
                   pt.tag_count, pt.created_at, pbh.height AS height,
                   pbt.block_transaction_index AS block_transaction_index,
                   ROW_NUMBER() OVER (PARTITION BY pt.id ORDER BY pbh.rowid DESC) AS rn
            FROM pending_transactions pt
            JOIN pending_block_transactions pbt ON pbt.transaction_id = pt.id
            JOIN pending_block_heights pbh ON pbh.indep_hash = pbt.block_indep_hash
        ), resolved AS (
            SELECT * FROM ranked WHERE rn = 1
        )
        SELECT resolved.id, resolved.signature, resolved.format, resolved.last_tx,
               resolved.owner_address, resolved.target, resolved.quantity, resolved.reward,
               resolved.data_size, resolved.data_root, resolved.content_type, resolved.tag_count,
               resolved.created_at, resolved.height, resolved.block_transaction_index
        FROM resolved",
    );
    qb.push(" WHERE 1 = 1");
    push_tag_filters(&mut qb, &args.tags, false, "resolved");
    push_in_clause(&mut qb, "resolved.id", args.ids.iter().cloned());
    push_in_clause(&mut qb, "resolved.target", args.recipients.iter().cloned());
    push_in_clause(&mut qb, "resolved.owner_address", args.owners.iter().cloned());
    if let Some(min) = min_height {
        qb.push(" AND resolved.height >= ");
        qb.push_bind(min);
    }
    if let Some(max) = max_height {
        qb.push(" AND resolved.height <= ");
        qb.push_bind(max);
    }
    push_tx_cursor(&mut qb, "resolved.height", "resolved.block_transaction_index", cursor, sort_order);
    qb.push(" ORDER BY resolved.height ");
    qb.push(order_keyword(sort_order));
    qb.push(", resolved.block_transaction_index ");
    qb.push(order_keyword(sort_order));
    qb.push(" LIMIT ");
    qb.push_bind(limit);
    qb
}

fn build_confirmed_tx_query(
    args: &GqlTransactionsArgs,
    min_height: Option<i64>,
    max_height: Option<i64>,
    cursor: Option<&TransactionCursor>,
    sort_order: SortOrder,
    limit: i64,
) -> QueryBuilder<'static, Sqlite> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT ct.id, ct.signature, ct.format, ct.last_tx, ct.owner_address, ct.target,
                ct.quantity, ct.reward, ct.data_size, ct.data_root, ct.content_type, ct.tag_count,
                ct.created_at, ct.height, ct.block_transaction_index
         FROM confirmed_transactions ct",
    );
    qb.push(" WHERE 1 = 1");
    push_tag_filters(&mut qb, &args.tags, true, "ct");
    push_in_clause(&mut qb, "ct.id", args.ids.iter().cloned());
    push_in_clause(&mut qb, "ct.target", args.recipients.iter().cloned());
    push_in_clause(&mut qb, "ct.owner_address", args.owners.iter().cloned());
    if let Some(min) = min_height {
        qb.push(" AND ct.height >= ");
        qb.push_bind(min);
    }
    if let Some(max) = max_height {
        qb.push(" AND ct.height <= ");
        qb.push_bind(max);
    }
    push_tx_cursor(&mut qb, "ct.height", "ct.block_transaction_index", cursor, sort_order);
    qb.push(" ORDER BY ct.height ");
    qb.push(order_keyword(sort_order));
    qb.push(", ct.block_transaction_index ");
    qb.push(order_keyword(sort_order));
    qb.push(" LIMIT ");
    qb.push_bind(limit);
    qb
}

async fn fetch_tags_for(store: &ChainIndexStore, tx_id: &[u8], confirmed: bool) -> Result<Vec<GqlTag>> {
    let table = if confirmed { "confirmed_transaction_tags" } else { "pending_transaction_tags" };
    let sql = format!(
        "SELECT tn.name, tv.value FROM {table} tt
         JOIN tag_names tn ON tn.hash = tt.tag_name_hash
         JOIN tag_values tv ON tv.hash = tt.tag_value_hash
         WHERE tt.transaction_id = ?
         ORDER BY tt.transaction_tag_index"
    );
    let rows: Vec<(Vec<u8>, Vec<u8>)> = sqlx::query_as(&sql)
        .bind(tx_id)
        .fetch_all(&store.pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(name, value)| GqlTag {
            name: String::from_utf8_lossy(&name).into_owned(),
            value: String::from_utf8_lossy(&value).into_owned(),
        })
        .collect())
}

/// Unified pending+confirmed transaction pagination.
pub async fn get_gql_transactions(
    store: &ChainIndexStore,
    args: &GqlTransactionsArgs,
) -> Result<GqlTransactionsPage> {
    let cursor = TransactionCursor::decode_opt(args.cursor.as_deref())?;
    let sort_order = args.sort_order.unwrap_or_default();
    let min_height = normalize_bound(args.min_height);
    let max_height = normalize_bound(args.max_height);
    let limit = args.page_size as i64 + 1;

    let mut combined: Vec<TransactionRow> = Vec::new();

    match sort_order {
        SortOrder::HeightDesc => {
            let pending_rows = build_pending_tx_query(args, min_height, max_height, cursor.as_ref(), sort_order, limit)
                .build_query_as::<TxRawRow>()
                .fetch_all(&store.pool)
                .await?;
            let pending_rows: Vec<TransactionRow> =
                pending_rows.into_iter().map(|r| r.into_row(Tier::Pending)).collect();

            let confirmed_max = pending_rows.last().map(|r| r.height - 1);
            let effective_max = match (max_height, confirmed_max) {
                (Some(m), Some(c)) => Some(m.min(c)),
                (Some(m), None) => Some(m),
                (None, Some(c)) => Some(c),
                (None, None) => None,
            };

            combined.extend(pending_rows);
            if combined.len() < limit as usize {
                let remaining = limit - combined.len() as i64;
                let confirmed_rows = build_confirmed_tx_query(
                    args,
                    min_height,
                    effective_max,
                    cursor.as_ref(),
                    sort_order,
                    remaining,
                )
                .build_query_as::<TxRawRow>()
                .fetch_all(&store.pool)
                .await?;
                combined.extend(confirmed_rows.into_iter().map(|r| r.into_row(Tier::Confirmed)));
            }
        }
        SortOrder::HeightAsc => {
            let confirmed_rows =
                build_confirmed_tx_query(args, min_height, max_height, cursor.as_ref(), sort_order, limit)
                    .build_query_as::<TxRawRow>()
                    .fetch_all(&store.pool)
                    .await?;
            let confirmed_rows: Vec<TransactionRow> =
                confirmed_rows.into_iter().map(|r| r.into_row(Tier::Confirmed)).collect();

            let pending_min = confirmed_rows.last().map(|r| r.height + 1);
            let effective_min = match (min_height, pending_min) {
                (Some(m), Some(p)) => Some(m.max(p)),
                (Some(m), None) => Some(m),
                (None, Some(p)) => Some(p),
                (None, None) => None,
            };

            combined.extend(confirmed_rows);
            if combined.len() < limit as usize {
                let remaining = limit - combined.len() as i64;
                let pending_rows = build_pending_tx_query(
                    args,
                    effective_min,
                    max_height,
                    cursor.as_ref(),
                    sort_order,
                    remaining,
                )
                .build_query_as::<TxRawRow>()
                .fetch_all(&store.pool)
                .await?;
                combined.extend(pending_rows.into_iter().map(|r| r.into_row(Tier::Pending)));
            }
        }
    }

    combined.truncate(limit as usize);
    let has_next_page = combined.len() > args.page_size as usize;
    let page_rows: Vec<TransactionRow> = combined.into_iter().take(args.page_size as usize).collect();

    let mut tags_by_tx = Vec::with_capacity(page_rows.len());
    for row in &page_rows {
        tags_by_tx.push(fetch_tags_for(store, &row.id, row.tier == Tier::Confirmed).await?);
    }

    let edges = page_rows
        .into_iter()
        .map(|row| GqlEdge {
            cursor: TransactionCursor::new(row.height, row.block_transaction_index).encode(),
            node: row,
        })
        .collect();

    Ok(GqlTransactionsPage {
        edges,
        tags_by_tx,
        page_info: PageInfo { has_next_page },
    })
}

fn build_block_query(
    args: &GqlBlocksArgs,
    min_height: Option<i64>,
    max_height: Option<i64>,
    cursor: Option<&BlockCursor>,
    sort_order: SortOrder,
    confirmed: bool,
    limit: i64,
) -> QueryBuilder<'static, Sqlite> {
    let table = if confirmed { "confirmed_blocks" } else { "pending_blocks" };
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT indep_hash, height, previous_block, nonce, hash, block_timestamp, diff,
                cumulative_diff, last_retarget, reward_addr, reward_pool, block_size, weave_size,
                usd_to_ar_rate_dividend, usd_to_ar_rate_divisor, scheduled_usd_to_ar_rate_dividend,
                scheduled_usd_to_ar_rate_divisor, hash_list_merkle, wallet_list, tx_root, tx_count,
                missing_tx_count
         FROM {table} WHERE 1 = 1"
    ));
    push_in_clause(&mut qb, "indep_hash", args.ids.iter().cloned());
    if let Some(min) = min_height {
        qb.push(" AND height >= ");
        qb.push_bind(min);
    }
    if let Some(max) = max_height {
        qb.push(" AND height <= ");
        qb.push_bind(max);
    }
    if let Some(cursor) = cursor {
        let op = if sort_order == SortOrder::HeightDesc { "<" } else { ">" };
        qb.push(" AND height ");
        qb.push(op);
        qb.push_bind(cursor.height);
    }
    qb.push(" ORDER BY height ");
    qb.push(order_keyword(sort_order));
    qb.push(", indep_hash ");
    qb.push(order_keyword(sort_order));
    qb.push(" LIMIT ");
    qb.push_bind(limit);
    qb
}

/// Unified pending+confirmed block pagination.
pub async fn get_gql_blocks(store: &ChainIndexStore, args: &GqlBlocksArgs) -> Result<GqlBlocksPage> {
    let cursor = BlockCursor::decode_opt(args.cursor.as_deref())?;
    let sort_order = args.sort_order.unwrap_or_default();
    let min_height = normalize_bound(args.min_height);
    let max_height = normalize_bound(args.max_height);
    let limit = args.page_size as i64 + 1;

    let mut combined: Vec<BlockRow> = Vec::new();

    match sort_order {
        SortOrder::HeightDesc => {
            let pending_rows =
                build_block_query(args, min_height, max_height, cursor.as_ref(), sort_order, false, limit)
                    .build_query_as::<BlockRawRow>()
                    .fetch_all(&store.pool)
                    .await?;
            let pending_rows: Vec<BlockRow> =
                pending_rows.into_iter().map(|r| r.into_row(Tier::Pending)).collect();

            let confirmed_max = pending_rows.last().map(|r| r.height - 1);
            let effective_max = match (max_height, confirmed_max) {
                (Some(m), Some(c)) => Some(m.min(c)),
                (Some(m), None) => Some(m),
                (None, Some(c)) => Some(c),
                (None, None) => None,
            };

            combined.extend(pending_rows);
            if combined.len() < limit as usize {
                let remaining = limit - combined.len() as i64;
                let confirmed_rows = build_block_query(
                    args,
                    min_height,
                    effective_max,
                    cursor.as_ref(),
                    sort_order,
                    true,
                    remaining,
                )
                .build_query_as::<BlockRawRow>()
                .fetch_all(&store.pool)
                .await?;
                combined.extend(confirmed_rows.into_iter().map(|r| r.into_row(Tier::Confirmed)));
            }
        }
        SortOrder::HeightAsc => {
            let confirmed_rows =
                build_block_query(args, min_height, max_height, cursor.as_ref(), sort_order, true, limit)
                    .build_query_as::<BlockRawRow>()
                    .fetch_all(&store.pool)
                    .await?;
            let confirmed_rows: Vec<BlockRow> =
                confirmed_rows.into_iter().map(|r| r.into_row(Tier::Confirmed)).collect();

            let pending_min = confirmed_rows.last().map(|r| r.height + 1);
            let effective_min = match (min_height, pending_min) {
                (Some(m), Some(p)) => Some(m.max(p)),
                (Some(m), None) => Some(m),
                (None, Some(p)) => Some(p),
                (None, None) => None,
            };

            combined.extend(confirmed_rows);
            if combined.len() < limit as usize {
                let remaining = limit - combined.len() as i64;
                let pending_rows = build_block_query(
                    args,
                    effective_min,
                    max_height,
                    cursor.as_ref(),
                    sort_order,
                    false,
                    remaining,
                )
                .build_query_as::<BlockRawRow>()
                .fetch_all(&store.pool)
                .await?;
                combined.extend(pending_rows.into_iter().map(|r| r.into_row(Tier::Pending)));
            }
        }
    }

    combined.truncate(limit as usize);
    let has_next_page = combined.len() > args.page_size as usize;
    let edges = combined
        .into_iter()
        .take(args.page_size as usize)
        .map(|row| GqlEdge {
            cursor: BlockCursor::new(row.height).encode(),
            node: row,
        })
        .collect();

    Ok(GqlBlocksPage {
        edges,
        page_info: PageInfo { has_next_page },
    })
}

/// Tries the confirmed tier, then pending; returns the first hit.
pub async fn get_gql_transaction(store: &ChainIndexStore, id: &[u8]) -> Result<Option<TransactionRow>> {
    let confirmed: Option<TxRawRow> = sqlx::query_as(
        "SELECT id, signature, format, last_tx, owner_address, target, quantity, reward,
                data_size, data_root, content_type, tag_count, created_at, height, block_transaction_index
         FROM confirmed_transactions WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(&store.pool)
    .await?;
    if let Some(row) = confirmed {
        return Ok(Some(row.into_row(Tier::Confirmed)));
    }

    let pending: Option<TxRawRow> = sqlx::query_as(
        "SELECT pt.id, pt.signature, pt.format, pt.last_tx, pt.owner_address, pt.target, pt.quantity,
                pt.reward, pt.data_size, pt.data_root, pt.content_type, pt.tag_count, pt.created_at,
                pbh.height AS height, pbt.block_transaction_index AS block_transaction_index
         FROM pending_transactions pt
         JOIN pending_block_transactions pbt ON pbt.transaction_id = pt.id
         JOIN pending_block_heights pbh ON pbh.indep_hash = pbt.block_indep_hash
         WHERE pt.id = ?
         ORDER BY pbh.rowid DESC
         LIMIT 1",
    )
    .bind(id)
    .fetch_optional(&store.pool)
    .await?;
    Ok(pending.map(|row| row.into_row(Tier::Pending)))
}

/// Tries the confirmed tier, then pending; returns the first hit.
pub async fn get_gql_block(store: &ChainIndexStore, indep_hash: &[u8]) -> Result<Option<BlockRow>> {
    let confirmed: Option<BlockRawRow> = sqlx::query_as(
        "SELECT indep_hash, height, previous_block, nonce, hash, block_timestamp, diff,
                cumulative_diff, last_retarget, reward_addr, reward_pool, block_size, weave_size,
                usd_to_ar_rate_dividend, usd_to_ar_rate_divisor, scheduled_usd_to_ar_rate_dividend,
                scheduled_usd_to_ar_rate_divisor, hash_list_merkle, wallet_list, tx_root, tx_count,
                missing_tx_count
         FROM confirmed_blocks WHERE indep_hash = ?",
    )
    .bind(indep_hash)
    .fetch_optional(&store.pool)
    .await?;
    if let Some(row) = confirmed {
        return Ok(Some(row.into_row(Tier::Confirmed)));
    }

    let pending: Option<BlockRawRow> = sqlx::query_as(
        "SELECT indep_hash, height, previous_block, nonce, hash, block_timestamp, diff,
                cumulative_diff, last_retarget, reward_addr, reward_pool, block_size, weave_size,
                usd_to_ar_rate_dividend, usd_to_ar_rate_divisor, scheduled_usd_to_ar_rate_dividend,
                scheduled_usd_to_ar_rate_divisor, hash_list_merkle, wallet_list, tx_root, tx_count,
                missing_tx_count
         FROM pending_blocks WHERE indep_hash = ?",
    )
    .bind(indep_hash)
    .fetch_optional(&store.pool)
    .await?;
    Ok(pending.map(|row| row.into_row(Tier::Pending)))
}
