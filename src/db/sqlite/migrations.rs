//! SQLite database migrations

use crate::error::Result;
use rusqlite::Connection;

/// Run all database migrations
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
        [],
    )?;

    run_migration(conn, "001_historical_index_prices", CREATE_HISTORICAL_PRICES_TABLE)?;
    run_migration(conn, "002_querier_status", CREATE_QUERIER_STATUS_TABLE)?;

    tracing::info!("Database migrations completed");
    Ok(())
}

fn run_migration(conn: &Connection, name: &str, sql: &str) -> Result<()> {
    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM migrations WHERE name = ?)",
        [name],
        |row| row.get(0),
    )?;

    if !exists {
        tracing::info!("Running migration: {}", name);
        conn.execute_batch(sql)?;
        conn.execute("INSERT INTO migrations (name) VALUES (?)", [name])?;
    }

    Ok(())
}

const CREATE_HISTORICAL_PRICES_TABLE: &str = r#"
CREATE TABLE historical_index_prices (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    index_id TEXT NOT NULL,
    timestamp TEXT NOT NULL,
    price REAL NOT NULL,
    market_cap REAL NOT NULL DEFAULT 0.0,
    volume_24h REAL NOT NULL DEFAULT 0.0,
    price_change_24h REAL NOT NULL DEFAULT 0.0,
    price_change_7d REAL NOT NULL DEFAULT 0.0,
    token_count INTEGER NOT NULL DEFAULT 0,
    index_type TEXT NOT NULL DEFAULT 'static',
    calculation_successful INTEGER NOT NULL DEFAULT 1,
    error_message TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);
CREATE INDEX idx_index_timestamp ON historical_index_prices(index_id, timestamp);
CREATE INDEX idx_timestamp_index ON historical_index_prices(timestamp, index_id);
"#;

const CREATE_QUERIER_STATUS_TABLE: &str = r#"
CREATE TABLE querier_status (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    querier_name TEXT NOT NULL UNIQUE,
    last_run_at TEXT,
    last_success_at TEXT,
    last_error_at TEXT,
    last_error_message TEXT,
    total_runs INTEGER NOT NULL DEFAULT 0,
    successful_runs INTEGER NOT NULL DEFAULT 0,
    failed_runs INTEGER NOT NULL DEFAULT 0,
    is_active INTEGER NOT NULL DEFAULT 1,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_repeatable() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let applied: i64 = conn
            .query_row("SELECT COUNT(*) FROM migrations", [], |row| row.get(0))
            .unwrap();
        assert_eq!(applied, 2);
    }
}
