//! Sale Model

use crate::order::OrderLine;
use serde::{Deserialize, Serialize};

/// Immutable record of a settlement
///
/// Created only by the settlement engine; never mutated afterwards.
/// Deletion exists solely as an explicit correction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sale {
    pub sale_id: String,
    /// Sequential human-facing ticket number. `None` when the external
    /// counter could not be reached: the sale proceeds regardless.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_number: Option<u64>,
    pub table_id: String,
    pub table_name: String,
    /// Itemized snapshot at settlement time
    pub items: Vec<OrderLine>,
    /// Final amount after discount/invitation
    pub total: f64,
    /// Discount applied (absolute amount)
    pub discount: f64,
    pub payment_method: String,
    #[serde(default)]
    pub is_invitation: bool,
    /// Settlement time (Unix milliseconds)
    pub timestamp: i64,
}
