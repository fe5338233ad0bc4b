use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{FromRow, SqlitePool};
use std::str::FromStr;

use super::store::StoreError;
use crate::models::{NewWhale, WhaleRecord, WhaleStatus};

const WHALE_COLUMNS: &str = "id, address, pair, pair_id, token0_symbol, token1_symbol, \
     amount_usd, token_amount, entry_time, last_notified, status";

/// Raw `whales` row. Amounts are stored as decimal text.
#[derive(Debug, FromRow)]
struct WhaleRow {
    id: i64,
    address: String,
    pair: String,
    pair_id: String,
    token0_symbol: String,
    token1_symbol: String,
    amount_usd: String,
    token_amount: String,
    entry_time: DateTime<Utc>,
    last_notified: DateTime<Utc>,
    status: String,
}

impl TryFrom<WhaleRow> for WhaleRecord {
    type Error = StoreError;

    fn try_from(row: WhaleRow) -> Result<Self, Self::Error> {
        let decimal = |field: &str, raw: &str| {
            Decimal::from_str(raw)
                .map_err(|e| StoreError::Corrupt(format!("row {}: bad {field} {raw:?}: {e}", row.id)))
        };

        Ok(WhaleRecord {
            amount_usd: decimal("amount_usd", &row.amount_usd)?,
            token_amount: decimal("token_amount", &row.token_amount)?,
            status: WhaleStatus::from_str(&row.status)
                .map_err(|e| StoreError::Corrupt(format!("row {}: {e}", row.id)))?,
            id: row.id,
            address: row.address,
            pair: row.pair,
            pair_id: row.pair_id,
            token0_symbol: row.token0_symbol,
            token1_symbol: row.token1_symbol,
            entry_time: row.entry_time,
            last_notified: row.last_notified,
        })
    }
}

fn into_records(rows: Vec<WhaleRow>) -> Result<Vec<WhaleRecord>, StoreError> {
    rows.into_iter().map(WhaleRecord::try_from).collect()
}

/// Insert a tracked whale. `last_notified` starts at the entry time.
pub async fn insert_whale(pool: &SqlitePool, whale: &NewWhale) -> Result<WhaleRecord, StoreError> {
    if whale.token_amount <= Decimal::ZERO {
        return Err(StoreError::InvalidRecord(format!(
            "token_amount must be positive, got {}",
            whale.token_amount
        )));
    }

    let row = sqlx::query_as::<_, WhaleRow>(&format!(
        r#"
        INSERT INTO whales (address, pair, pair_id, token0_symbol, token1_symbol,
                            amount_usd, token_amount, entry_time, last_notified, status)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        RETURNING {WHALE_COLUMNS}
        "#
    ))
    .bind(&whale.address)
    .bind(&whale.pair)
    .bind(&whale.pair_id)
    .bind(&whale.token0_symbol)
    .bind(&whale.token1_symbol)
    .bind(whale.amount_usd.to_string())
    .bind(whale.token_amount.to_string())
    .bind(whale.entry_time)
    .bind(whale.entry_time)
    .bind(WhaleStatus::Tracked.as_str())
    .fetch_one(pool)
    .await?;

    row.try_into()
}

/// Close every tracked row for `(address, pair)`. Returns whether anything changed.
pub async fn close_whale(
    pool: &SqlitePool,
    address: &str,
    pair: &str,
    closed_at: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let result = sqlx::query(
        "UPDATE whales SET status = ?, last_notified = ? \
         WHERE address = ? AND pair = ? AND status = ?",
    )
    .bind(WhaleStatus::Closed.as_str())
    .bind(closed_at)
    .bind(address)
    .bind(pair)
    .bind(WhaleStatus::Tracked.as_str())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Most recent alert time for `(address, pair)` across tracked and closed rows.
pub async fn last_notified(
    pool: &SqlitePool,
    address: &str,
    pair: &str,
) -> Result<Option<DateTime<Utc>>, StoreError> {
    let rows: Vec<(DateTime<Utc>,)> =
        sqlx::query_as("SELECT last_notified FROM whales WHERE address = ? AND pair = ?")
            .bind(address)
            .bind(pair)
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().map(|(t,)| t).max())
}

/// Latest tracked row per `(address, pair)`, oldest key first.
pub async fn get_tracked_whales(pool: &SqlitePool) -> Result<Vec<WhaleRecord>, StoreError> {
    let rows = sqlx::query_as::<_, WhaleRow>(&format!(
        r#"
        SELECT {WHALE_COLUMNS} FROM whales w
        WHERE w.status = ?1
          AND w.id = (
              SELECT MAX(x.id) FROM whales x
              WHERE x.address = w.address AND x.pair = w.pair AND x.status = ?1
          )
        ORDER BY w.id
        "#
    ))
    .bind(WhaleStatus::Tracked.as_str())
    .fetch_all(pool)
    .await?;

    into_records(rows)
}

/// Every row (any status) for one wallet, across pairs, in insertion order.
pub async fn get_whales_by_address(
    pool: &SqlitePool,
    address: &str,
) -> Result<Vec<WhaleRecord>, StoreError> {
    let rows = sqlx::query_as::<_, WhaleRow>(&format!(
        "SELECT {WHALE_COLUMNS} FROM whales WHERE address = ? ORDER BY id"
    ))
    .bind(address)
    .fetch_all(pool)
    .await?;

    into_records(rows)
}

/// Every row, in insertion order.
pub async fn get_all_whales(pool: &SqlitePool) -> Result<Vec<WhaleRecord>, StoreError> {
    let rows = sqlx::query_as::<_, WhaleRow>(&format!(
        "SELECT {WHALE_COLUMNS} FROM whales ORDER BY id"
    ))
    .fetch_all(pool)
    .await?;

    into_records(rows)
}
