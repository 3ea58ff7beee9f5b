//! Collector status rows

use crate::db::models::{format_timestamp, parse_timestamp, QuerierStatusRecord};
use crate::error::Result;
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

fn timestamp_at(row: &Row<'_>, column: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(column)?;
    parse_timestamp(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e)))
}

fn optional_timestamp_at(row: &Row<'_>, column: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(column)?;
    raw.map(|raw| {
        parse_timestamp(&raw).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(column, Type::Text, Box::new(e))
        })
    })
    .transpose()
}

/// Insert or replace the row for `status.querier_name`
pub fn upsert(conn: &Connection, status: &QuerierStatusRecord) -> Result<()> {
    conn.execute(
        r#"
        INSERT INTO querier_status (querier_name, last_run_at, last_success_at, last_error_at,
            last_error_message, total_runs, successful_runs, failed_runs, is_active,
            created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        ON CONFLICT(querier_name) DO UPDATE SET
            last_run_at = excluded.last_run_at,
            last_success_at = excluded.last_success_at,
            last_error_at = excluded.last_error_at,
            last_error_message = excluded.last_error_message,
            total_runs = excluded.total_runs,
            successful_runs = excluded.successful_runs,
            failed_runs = excluded.failed_runs,
            is_active = excluded.is_active,
            updated_at = excluded.updated_at
        "#,
        params![
            status.querier_name,
            status.last_run_at.as_ref().map(format_timestamp),
            status.last_success_at.as_ref().map(format_timestamp),
            status.last_error_at.as_ref().map(format_timestamp),
            status.last_error_message,
            status.total_runs as i64,
            status.successful_runs as i64,
            status.failed_runs as i64,
            status.is_active as i32,
            format_timestamp(&status.created_at),
            format_timestamp(&status.updated_at),
        ],
    )?;
    Ok(())
}

pub fn get(conn: &Connection, name: &str) -> Result<Option<QuerierStatusRecord>> {
    let status = conn
        .query_row(
            "SELECT querier_name, last_run_at, last_success_at, last_error_at, last_error_message,
                    total_runs, successful_runs, failed_runs, is_active, created_at, updated_at
             FROM querier_status WHERE querier_name = ?",
            [name],
            |row| {
                Ok(QuerierStatusRecord {
                    querier_name: row.get(0)?,
                    last_run_at: optional_timestamp_at(row, 1)?,
                    last_success_at: optional_timestamp_at(row, 2)?,
                    last_error_at: optional_timestamp_at(row, 3)?,
                    last_error_message: row.get(4)?,
                    total_runs: row.get::<_, i64>(5)?.max(0) as u64,
                    successful_runs: row.get::<_, i64>(6)?.max(0) as u64,
                    failed_runs: row.get::<_, i64>(7)?.max(0) as u64,
                    is_active: row.get::<_, i32>(8)? == 1,
                    created_at: timestamp_at(row, 9)?,
                    updated_at: timestamp_at(row, 10)?,
                })
            },
        )
        .optional()?;

    Ok(status)
}
