//! DuckDB destination store for ingested export records.

use std::path::Path;

use chrono::NaiveDate;
use duckdb::{Connection, params_from_iter};
use enpull_core::Operation;
use enpull_core::mapper::{PERSON_COLUMNS, SIGNING_DATE, Source};
use tracing::{debug, info};

use crate::StoreError;

/// Storage format of the `signing_date` column.
pub const SIGNING_DATE_FORMAT: &str = "%Y-%m-%d";

/// DuckDB store that receives mapped write operations.
///
/// Every [`apply`](Self::apply) runs in its own transaction and is committed
/// before returning, so a crash mid-day loses at most the record in flight.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
pub struct DuckStore {
    conn: Connection,
}

impl DuckStore {
    /// Open an in-memory DuckDB database.
    pub fn open() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Open or create a persistent DuckDB database at the given path.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        info!(path = %path.display(), "opened destination database");
        Ok(Self { conn })
    }

    /// Open `path` if given, otherwise an in-memory database.
    pub fn open_at(path: Option<&Path>) -> Result<Self, StoreError> {
        match path {
            Some(path) => Self::open_persistent(path),
            None => Self::open(),
        }
    }

    /// Create the person-event table if it does not exist yet.
    ///
    /// All sourced columns are text; `transfer_time` is a timestamp.
    pub fn ensure_person_table(&self, table: &str) -> Result<(), StoreError> {
        let columns: Vec<String> = PERSON_COLUMNS
            .iter()
            .map(|(name, source)| match source {
                Source::TransferTime => format!("{name} TIMESTAMP"),
                _ => format!("{name} VARCHAR"),
            })
            .collect();
        let sql = format!(
            "CREATE TABLE IF NOT EXISTS {table} ({})",
            columns.join(", ")
        );
        self.conn.execute_batch(&sql)?;
        Ok(())
    }

    /// Most recent signing date recorded in `table`.
    ///
    /// Blank values and values that are not `YYYY-MM-DD` are skipped, so the
    /// max is taken over real dates rather than over the raw text.
    pub fn last_signing_date(&self, table: &str) -> Result<Option<NaiveDate>, StoreError> {
        let sql = format!(
            "SELECT strftime(max(try_strptime(trim({SIGNING_DATE}), '{SIGNING_DATE_FORMAT}')), \
             '{SIGNING_DATE_FORMAT}') FROM {table}"
        );
        let max: Option<String> = self.conn.query_row(&sql, [], |row| row.get(0))?;
        let Some(raw) = max else {
            return Ok(None);
        };
        let date = NaiveDate::parse_from_str(raw.trim(), SIGNING_DATE_FORMAT)
            .map_err(|_| StoreError::BadSigningDate(raw.clone()))?;
        debug!(table, %date, "last ingested signing date");
        Ok(Some(date))
    }

    /// Execute one write and commit it. Returns the number of rows affected.
    pub fn apply(&mut self, op: &Operation) -> Result<usize, StoreError> {
        let prepared = op.prepared();
        let tx = self.conn.transaction()?;
        let affected = tx.execute(&prepared.sql, params_from_iter(prepared.params.iter()))?;
        tx.commit()?;
        debug!(table = op.table(), statement = %op, affected, "applied write");
        Ok(affected)
    }

    /// Number of rows in `table`.
    pub fn count_rows(&self, table: &str) -> Result<usize, StoreError> {
        let sql = format!("SELECT count(*)::BIGINT AS cnt FROM {table}");
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Access the underlying DuckDB connection.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
