//! Historical index price rows

use crate::baskets::BasketKind;
use crate::db::models::{format_timestamp, parse_timestamp, HistoricalSnapshot};
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, Row};

const COLUMNS: &str = "id, index_id, timestamp, price, market_cap, volume_24h, price_change_24h,
     price_change_7d, token_count, index_type, calculation_successful, error_message";

fn conversion_error<E>(column: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(err))
}

fn from_row(row: &Row<'_>) -> rusqlite::Result<HistoricalSnapshot> {
    let timestamp: String = row.get(2)?;
    let kind: String = row.get(9)?;

    Ok(HistoricalSnapshot {
        id: Some(row.get(0)?),
        basket_id: row.get(1)?,
        timestamp: parse_timestamp(&timestamp).map_err(|e| conversion_error(2, e))?,
        price: row.get(3)?,
        market_cap: row.get(4)?,
        volume_24h: row.get(5)?,
        price_change_24h: row.get(6)?,
        price_change_7d: row.get(7)?,
        member_count: row.get::<_, i64>(8)?.max(0) as usize,
        basket_kind: kind
            .parse::<BasketKind>()
            .map_err(|e| conversion_error(9, e))?,
        success: row.get::<_, i32>(10)? == 1,
        error_message: row.get(11)?,
    })
}

/// Insert one snapshot
pub fn append(conn: &Connection, snapshot: &HistoricalSnapshot) -> Result<i64> {
    conn.execute(
        r#"
        INSERT INTO historical_index_prices (index_id, timestamp, price, market_cap, volume_24h,
            price_change_24h, price_change_7d, token_count, index_type, calculation_successful,
            error_message)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
        params![
            snapshot.basket_id,
            format_timestamp(&snapshot.timestamp),
            snapshot.price,
            snapshot.market_cap,
            snapshot.volume_24h,
            snapshot.price_change_24h,
            snapshot.price_change_7d,
            snapshot.member_count as i64,
            snapshot.basket_kind.to_string(),
            snapshot.success as i32,
            snapshot.error_message,
        ],
    )?;

    let id = conn.last_insert_rowid();
    tracing::debug!(
        "Stored snapshot: id={}, index_id={}, success={}",
        id,
        snapshot.basket_id,
        snapshot.success
    );
    Ok(id)
}

/// Successful snapshots in range, oldest first
pub fn query_range(
    conn: &Connection,
    basket_id: &str,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Vec<HistoricalSnapshot>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM historical_index_prices
         WHERE index_id = ?1 AND timestamp >= ?2 AND timestamp <= ?3
           AND calculation_successful = 1
         ORDER BY timestamp ASC, id ASC",
        COLUMNS
    ))?;

    let rows = stmt
        .query_map(
            params![basket_id, format_timestamp(&start), format_timestamp(&end)],
            from_row,
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}

/// All snapshots of a basket, oldest first
pub fn list_all(conn: &Connection, basket_id: &str) -> Result<Vec<HistoricalSnapshot>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {} FROM historical_index_prices WHERE index_id = ?1
         ORDER BY timestamp ASC, id ASC",
        COLUMNS
    ))?;

    let rows = stmt
        .query_map([basket_id], from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(rows)
}
