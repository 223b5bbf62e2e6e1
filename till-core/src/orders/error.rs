//! Order lifecycle errors
//!
//! Only two failure classes surface to callers: local cache failures
//! and financial external writes (a sale record that could not be
//! persisted). Everything else in the lifecycle is logged and
//! tolerated.

use crate::storage::StorageError;
use crate::store::StoreError;
use thiserror::Error;

/// Order errors
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Sale write failed for table {table_id}: {source}")]
    SaleWrite {
        table_id: String,
        #[source]
        source: StoreError,
    },

    #[error("Invalid operation: {0}")]
    InvalidOperation(String),
}

pub type OrderResult<T> = Result<T, OrderError>;
