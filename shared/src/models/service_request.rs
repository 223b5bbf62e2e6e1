//! Service Request Model

use serde::{Deserialize, Serialize};

/// Ancillary service request (waiter call, bill request, ...)
///
/// Sourced from the external store; the core only reads these.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceRequest {
    pub id: String,
    pub table_id: String,
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Request time (Unix milliseconds)
    pub created_at: i64,
}
