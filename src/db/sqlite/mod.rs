//! SQLite database module

mod migrations;
mod querier_status;
mod snapshots;

use crate::db::models::{HistoricalSnapshot, QuerierStatusRecord};
use crate::db::HistoryStore;
use crate::error::Result;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::path::Path;

/// SQLite database wrapper
pub struct SqliteDb {
    conn: Mutex<Connection>,
}

impl SqliteDb {
    /// Open (or create) the database file and apply migrations
    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        // WAL lets history reads proceed while the collector writes
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        Self::with_connection(conn)
    }

    /// Private in-memory database, used by tests
    pub fn new_in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.run_migrations()?;
        Ok(db)
    }

    fn run_migrations(&self) -> Result<()> {
        let conn = self.conn.lock();
        migrations::run_migrations(&conn)
    }
}

impl HistoryStore for SqliteDb {
    fn append_snapshot(&self, snapshot: &HistoricalSnapshot) -> Result<i64> {
        let conn = self.conn.lock();
        snapshots::append(&conn, snapshot)
    }

    fn query_snapshots(
        &self,
        basket_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoricalSnapshot>> {
        let conn = self.conn.lock();
        snapshots::query_range(&conn, basket_id, start, end)
    }

    fn list_snapshots(&self, basket_id: &str) -> Result<Vec<HistoricalSnapshot>> {
        let conn = self.conn.lock();
        snapshots::list_all(&conn, basket_id)
    }

    fn upsert_status(&self, status: &QuerierStatusRecord) -> Result<()> {
        let conn = self.conn.lock();
        querier_status::upsert(&conn, status)
    }

    fn read_status(&self, name: &str) -> Result<Option<QuerierStatusRecord>> {
        let conn = self.conn.lock();
        querier_status::get(&conn, name)
    }
}
