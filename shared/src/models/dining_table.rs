//! Dining Table Model

use serde::{Deserialize, Serialize};

/// Occupancy status of a table
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TableStatus {
    #[default]
    Free,
    Occupied,
}

/// Dining table entity
///
/// Status transitions are driven by the order/bill lifecycle (first
/// draft line occupies, settlement frees); direct status writes exist
/// only as an explicit override.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiningTable {
    pub id: String,
    pub name: String,
    /// Zone grouping tag (hall, terrace, bar, ...)
    pub zone: String,
    pub seats: i32,
    pub status: TableStatus,
    /// Last lifecycle activity (Unix milliseconds)
    pub last_activity: i64,
}

impl DiningTable {
    pub fn is_free(&self) -> bool {
        self.status == TableStatus::Free
    }
}
