//! Company Info Model

use serde::{Deserialize, Serialize};

/// Restaurant identity printed on receipts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct CompanyInfo {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tax_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}
