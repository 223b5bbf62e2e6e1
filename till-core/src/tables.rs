//! Floor layout and table occupancy
//!
//! In-memory registry of dining tables, written through to the local
//! cache on every change so the layout survives restarts. Occupancy is
//! a two-state machine (free / occupied); the transition into occupied
//! stamps the table's last-activity time.

use crate::storage::{StorageError, TillStorage};
use parking_lot::RwLock;
use shared::models::{DiningTable, TableStatus};
use shared::util::now_millis;
use std::collections::HashMap;
use tracing::{debug, info};

const DEFAULT_SEATS: i32 = 4;

/// Registry of dining tables
pub struct TableRegistry {
    storage: TillStorage,
    tables: RwLock<HashMap<String, DiningTable>>,
}

impl TableRegistry {
    /// Load the registry from the local cache
    pub fn load(storage: TillStorage) -> Result<Self, StorageError> {
        let tables = storage
            .all_tables()?
            .into_iter()
            .map(|t| (t.id.clone(), t))
            .collect::<HashMap<_, _>>();
        info!(count = tables.len(), "table registry loaded");
        Ok(Self {
            storage,
            tables: RwLock::new(tables),
        })
    }

    /// Create a table with default seat count, status free
    pub fn add_table(&self, zone: &str, name: &str) -> Result<DiningTable, StorageError> {
        let table = DiningTable {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            zone: zone.to_string(),
            seats: DEFAULT_SEATS,
            status: TableStatus::Free,
            last_activity: now_millis(),
        };
        self.storage.put_table(&table)?;
        self.tables.write().insert(table.id.clone(), table.clone());
        info!(table_id = %table.id, name = %table.name, zone = %table.zone, "table added");
        Ok(table)
    }

    /// Remove a table from the layout
    ///
    /// Does not cascade into drafts or bills; unknown ids are no-ops.
    pub fn delete_table(&self, table_id: &str) -> Result<(), StorageError> {
        if self.tables.write().remove(table_id).is_none() {
            debug!(table_id, "delete ignored, unknown table");
            return Ok(());
        }
        self.storage.remove_table(table_id)?;
        info!(table_id, "table deleted");
        Ok(())
    }

    /// Change a table's occupancy status
    ///
    /// Transitioning to occupied stamps last-activity. Unknown ids are
    /// no-ops.
    pub fn update_status(&self, table_id: &str, status: TableStatus) -> Result<(), StorageError> {
        let updated = {
            let mut tables = self.tables.write();
            match tables.get_mut(table_id) {
                Some(table) => {
                    table.status = status;
                    if status == TableStatus::Occupied {
                        table.last_activity = now_millis();
                    }
                    Some(table.clone())
                }
                None => None,
            }
        };
        match updated {
            Some(table) => {
                self.storage.put_table(&table)?;
                debug!(table_id, ?status, "table status updated");
                Ok(())
            }
            None => {
                debug!(table_id, "status update ignored, unknown table");
                Ok(())
            }
        }
    }

    /// Refresh a table's last-activity timestamp
    pub fn touch(&self, table_id: &str) -> Result<(), StorageError> {
        let updated = {
            let mut tables = self.tables.write();
            match tables.get_mut(table_id) {
                Some(table) => {
                    table.last_activity = now_millis();
                    Some(table.clone())
                }
                None => None,
            }
        };
        if let Some(table) = updated {
            self.storage.put_table(&table)?;
        }
        Ok(())
    }

    pub fn get(&self, table_id: &str) -> Option<DiningTable> {
        self.tables.read().get(table_id).cloned()
    }

    /// All tables, ordered by zone then name
    pub fn all(&self) -> Vec<DiningTable> {
        let mut tables: Vec<_> = self.tables.read().values().cloned().collect();
        tables.sort_by(|a, b| a.zone.cmp(&b.zone).then_with(|| a.name.cmp(&b.name)));
        tables
    }
}
