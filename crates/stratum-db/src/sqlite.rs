use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, params};
use stratum_common::{Error, Result};
use tracing::{debug, info};

use crate::handle::DatabaseHandle;

/// [`DatabaseHandle`] over a single SQLite connection.
pub struct SqliteHandle {
    conn: Connection,
}

impl SqliteHandle {
    pub fn open(db_path: &Path) -> Result<Self> {
        info!("opening database at {}", db_path.display());
        let conn = Connection::open(db_path)
            .map_err(|e| Error::Database(format!("failed to open database: {e}")))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Ok(Self { conn })
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::Database(format!("failed to open in-memory database: {e}")))?;

        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(|e| Error::Database(format!("failed to set pragmas: {e}")))?;

        Ok(Self { conn })
    }

    /// The underlying connection, for SQLite-specific migration code.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn in_transaction(&self) -> bool {
        !self.conn.is_autocommit()
    }
}

impl DatabaseHandle for SqliteHandle {
    fn begin(&mut self) -> Result<()> {
        if self.in_transaction() {
            return Err(Error::Database("transaction already open".into()));
        }
        self.conn
            .execute_batch("BEGIN")
            .map_err(|e| Error::Database(format!("failed to begin transaction: {e}")))
    }

    fn commit(&mut self) -> Result<()> {
        self.conn
            .execute_batch("COMMIT")
            .map_err(|e| Error::Database(format!("failed to commit transaction: {e}")))
    }

    fn rollback(&mut self) -> Result<()> {
        // A failed statement may already have ended the transaction.
        if !self.in_transaction() {
            return Ok(());
        }
        self.conn
            .execute_batch("ROLLBACK")
            .map_err(|e| Error::Database(format!("failed to roll back transaction: {e}")))
    }

    fn execute(&mut self, sql: &str) -> Result<usize> {
        debug!("execute: {sql}");
        self.conn
            .execute(sql, [])
            .map_err(|e| Error::Database(format!("statement failed: {e}")))
    }

    fn execute_batch(&mut self, sql: &str) -> Result<()> {
        debug!("execute batch: {sql}");
        self.conn
            .execute_batch(sql)
            .map_err(|e| Error::Database(format!("batch failed: {e}")))
    }

    fn query_column(&mut self, sql: &str) -> Result<Vec<String>> {
        debug!("query: {sql}");
        let mut stmt = self
            .conn
            .prepare(sql)
            .map_err(|e| Error::Database(format!("failed to prepare query: {e}")))?;

        let rows = stmt
            .query_map([], |row| {
                Ok(match row.get_ref(0)? {
                    ValueRef::Null => None,
                    ValueRef::Integer(i) => Some(i.to_string()),
                    ValueRef::Real(f) => Some(f.to_string()),
                    ValueRef::Text(t) | ValueRef::Blob(t) => {
                        Some(String::from_utf8_lossy(t).into_owned())
                    }
                })
            })
            .map_err(|e| Error::Database(format!("query failed: {e}")))?;

        let mut values = Vec::new();
        for row in rows {
            if let Some(value) =
                row.map_err(|e| Error::Database(format!("failed to read row: {e}")))?
            {
                values.push(value);
            }
        }
        Ok(values)
    }

    fn table_exists(&mut self, name: &str) -> Result<bool> {
        self.conn
            .query_row(
                "SELECT count(*) > 0 FROM sqlite_master WHERE type='table' AND name=?1",
                params![name],
                |row| row.get(0),
            )
            .map_err(|e| Error::Database(format!("failed to check table {name}: {e}")))
    }
}
