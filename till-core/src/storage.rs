//! redb-based durable cache for the working state of the till
//!
//! # Tables
//!
//! | Table | Key | Value | Purpose |
//! |-------|-----|-------|---------|
//! | `tables` | `table_id` | `DiningTable` | Table layout and status |
//! | `drafts` | `table_id` | `Vec<OrderLine>` | In-flight comandas |
//! | `bills` | `table_id` | `Vec<OrderLine>` | Sent items awaiting payment |
//!
//! This is the low-latency working store, not the system of record:
//! sales and catalogs live in the external `RecordStore`. Payloads are
//! JSON; a malformed payload reverts to a default (empty draft/bill,
//! skipped table) with a warning rather than failing the read, so a
//! corrupt cache entry can never wedge the till.
//!
//! redb commits with `Durability::Immediate`, which keeps the cache
//! consistent across power loss on the till hardware.

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use shared::models::DiningTable;
use shared::order::OrderLine;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;

/// Table layout and occupancy: key = table_id, value = JSON DiningTable
const TABLES_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("tables");

/// In-flight drafts: key = table_id, value = JSON Vec<OrderLine>
const DRAFTS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("drafts");

/// Bills awaiting settlement: key = table_id, value = JSON Vec<OrderLine>
const BILLS_TABLE: TableDefinition<&str, &[u8]> = TableDefinition::new("bills");

/// Storage errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Storage error: {0}")]
    Storage(#[from] redb::StorageError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Durable working cache backed by redb
#[derive(Clone)]
pub struct TillStorage {
    db: Arc<Database>,
}

impl TillStorage {
    /// Open or create the cache database at the given path
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let db = Database::create(path)?;
        let storage = Self { db: Arc::new(db) };
        storage.init_tables()?;
        Ok(storage)
    }

    /// Open an in-memory cache (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let db = Database::builder().create_with_backend(redb::backends::InMemoryBackend::new())?;
        let storage = Self { db: Arc::new(db) };
        storage.init_tables()?;
        Ok(storage)
    }

    fn init_tables(&self) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let _ = txn.open_table(TABLES_TABLE)?;
            let _ = txn.open_table(DRAFTS_TABLE)?;
            let _ = txn.open_table(BILLS_TABLE)?;
        }
        txn.commit()?;
        Ok(())
    }

    // ========== Tables ==========

    /// Insert or replace a table record
    pub fn put_table(&self, table: &DiningTable) -> StorageResult<()> {
        let bytes = serde_json::to_vec(table)?;
        let txn = self.db.begin_write()?;
        {
            let mut t = txn.open_table(TABLES_TABLE)?;
            t.insert(table.id.as_str(), bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Remove a table record; no-op when absent
    pub fn remove_table(&self, table_id: &str) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut t = txn.open_table(TABLES_TABLE)?;
            t.remove(table_id)?;
        }
        txn.commit()?;
        Ok(())
    }

    /// Load all table records, skipping malformed payloads
    pub fn all_tables(&self) -> StorageResult<Vec<DiningTable>> {
        let txn = self.db.begin_read()?;
        let t = txn.open_table(TABLES_TABLE)?;
        let mut tables = Vec::new();
        for entry in t.iter()? {
            let (key, value) = entry?;
            match serde_json::from_slice::<DiningTable>(value.value()) {
                Ok(table) => tables.push(table),
                Err(e) => {
                    tracing::warn!(table_id = key.value(), error = %e, "Skipping malformed table record in cache");
                }
            }
        }
        Ok(tables)
    }

    // ========== Drafts ==========

    /// Persist the draft for a table; an empty draft removes the entry
    pub fn put_draft(&self, table_id: &str, lines: &[OrderLine]) -> StorageResult<()> {
        self.put_lines(DRAFTS_TABLE, table_id, lines)
    }

    /// Load the draft for a table; malformed data falls back to empty
    pub fn get_draft(&self, table_id: &str) -> StorageResult<Vec<OrderLine>> {
        self.get_lines(DRAFTS_TABLE, table_id)
    }

    /// Load all drafts keyed by table id
    pub fn all_drafts(&self) -> StorageResult<HashMap<String, Vec<OrderLine>>> {
        self.all_lines(DRAFTS_TABLE)
    }

    // ========== Bills ==========

    /// Persist the bill for a table; an empty bill removes the entry
    pub fn put_bill(&self, table_id: &str, lines: &[OrderLine]) -> StorageResult<()> {
        self.put_lines(BILLS_TABLE, table_id, lines)
    }

    /// Load the bill for a table; malformed data falls back to empty
    pub fn get_bill(&self, table_id: &str) -> StorageResult<Vec<OrderLine>> {
        self.get_lines(BILLS_TABLE, table_id)
    }

    /// Load all bills keyed by table id
    pub fn all_bills(&self) -> StorageResult<HashMap<String, Vec<OrderLine>>> {
        self.all_lines(BILLS_TABLE)
    }

    // ========== Line-list plumbing ==========

    fn put_lines(
        &self,
        def: TableDefinition<'_, &'static str, &'static [u8]>,
        table_id: &str,
        lines: &[OrderLine],
    ) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut t = txn.open_table(def)?;
            if lines.is_empty() {
                t.remove(table_id)?;
            } else {
                let bytes = serde_json::to_vec(lines)?;
                t.insert(table_id, bytes.as_slice())?;
            }
        }
        txn.commit()?;
        Ok(())
    }

    fn get_lines(
        &self,
        def: TableDefinition<'_, &'static str, &'static [u8]>,
        table_id: &str,
    ) -> StorageResult<Vec<OrderLine>> {
        let txn = self.db.begin_read()?;
        let t = txn.open_table(def)?;
        let Some(value) = t.get(table_id)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_slice::<Vec<OrderLine>>(value.value()) {
            Ok(lines) => Ok(lines),
            Err(e) => {
                // Parse-fallback policy: a corrupt entry becomes the
                // default instead of an error.
                tracing::warn!(table_id, error = %e, "Malformed line list in cache, falling back to empty");
                Ok(Vec::new())
            }
        }
    }

    fn all_lines(
        &self,
        def: TableDefinition<'_, &'static str, &'static [u8]>,
    ) -> StorageResult<HashMap<String, Vec<OrderLine>>> {
        let txn = self.db.begin_read()?;
        let t = txn.open_table(def)?;
        let mut out = HashMap::new();
        for entry in t.iter()? {
            let (key, value) = entry?;
            match serde_json::from_slice::<Vec<OrderLine>>(value.value()) {
                Ok(lines) => {
                    out.insert(key.value().to_string(), lines);
                }
                Err(e) => {
                    tracing::warn!(table_id = key.value(), error = %e, "Malformed line list in cache, falling back to empty");
                }
            }
        }
        Ok(out)
    }

    // Raw write used by tests to simulate cache corruption
    #[cfg(test)]
    pub(crate) fn put_raw_draft(&self, table_id: &str, bytes: &[u8]) -> StorageResult<()> {
        let txn = self.db.begin_write()?;
        {
            let mut t = txn.open_table(DRAFTS_TABLE)?;
            t.insert(table_id, bytes)?;
        }
        txn.commit()?;
        Ok(())
    }
}
