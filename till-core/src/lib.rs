//! till-core — restaurant order/table/bill lifecycle engine
//!
//! The in-process state machine behind a single-till restaurant POS:
//! tables and their occupancy, per-table order drafts (the comanda),
//! per-table bills awaiting payment, settlement into immutable sale
//! records, and stock reconciliation against that lifecycle.
//!
//! # Architecture
//!
//! ```text
//! LineInput → TillManager (draft) → send_to_kitchen → bill
//!                  │                      │
//!             TableRegistry          StockLedger
//!                  │                      │
//!             TillStorage (redb)     RecordStore (external)
//!                                         │
//!            settlement ─→ Sale ─→ sales collection + ReceiptPrinter
//! ```
//!
//! State is owned by explicit service objects constructed once and
//! passed by reference; there are no ambient globals. The external
//! record store and the receipt printer are trait boundaries, injected
//! at construction.

pub mod config;
pub mod history;
pub mod orders;
pub mod printing;
pub mod stock;
pub mod storage;
pub mod store;
pub mod tables;

// Re-exports
pub use config::TillConfig;
pub use history::{SalesHistory, SyncStatus};
pub use orders::manager::TillManager;
pub use orders::settlement::Settlement;
pub use orders::{OrderError, OrderResult};
pub use printing::{NoopPrinter, PrintError, PrintResult, ReceiptPrinter, ReceiptTicket};
pub use stock::StockLedger;
pub use storage::{StorageError, TillStorage};
pub use store::{Collection, MemoryStore, RecordStore, StoreError};
pub use tables::TableRegistry;
