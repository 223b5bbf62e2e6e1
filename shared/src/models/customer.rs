//! Customer Model

use serde::{Deserialize, Serialize};

/// Customer attached to a table for CRM tracking
///
/// Tax fields feed the receipt printer when the customer requests a
/// full invoice.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Customer {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_address: Option<String>,
}
