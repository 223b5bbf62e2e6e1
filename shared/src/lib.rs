//! Shared types for the till-core workspace
//!
//! Pure data types used across crates: domain models, order line
//! types, and small time utilities. No I/O lives here.

pub mod models;
pub mod order;
pub mod util;

// Re-exports
pub use serde::{Deserialize, Serialize};
