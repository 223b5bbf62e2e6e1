//! Order lifecycle: draft, bill, settlement
//!
//! The [`manager::TillManager`] owns the per-table drafts and bills
//! and the active-table context; [`settlement`] adds the three
//! payment modes on top of it. Monetary arithmetic is decimal-based
//! and lives in [`money`].

pub mod error;
pub mod manager;
pub mod money;
pub mod settlement;
pub mod steps;

pub use error::{OrderError, OrderResult};
pub use steps::{step_failed, StepLog, StepOutcome, StepStatus};
