//! Receipt printing boundary
//!
//! The core renders WHAT goes on a customer receipt into a
//! [`ReceiptTicket`] and hands it to a [`ReceiptPrinter`]. HOW it is
//! printed (ESC/POS, network, driver) is an adapter concern outside
//! this crate. Printing is fire-and-forget from the settlement path:
//! failures are logged and never abort a close.

use async_trait::async_trait;
use shared::models::{CompanyInfo, Customer};
use shared::order::OrderLine;
use thiserror::Error;
use tracing::info;

/// Printing error types
#[derive(Debug, Error)]
pub enum PrintError {
    /// Printer offline or unreachable
    #[error("Printer offline: {0}")]
    Offline(String),

    /// IO error during printing
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid printer configuration
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

pub type PrintResult<T> = Result<T, PrintError>;

/// Everything a rendered customer receipt needs
#[derive(Debug, Clone)]
pub struct ReceiptTicket {
    pub ticket_number: Option<u64>,
    pub table_name: String,
    pub lines: Vec<OrderLine>,
    pub total: f64,
    /// Absolute discount amount
    pub discount: f64,
    /// The percent the discount was computed from
    pub discount_percent: f64,
    pub payment_method: String,
    pub is_invitation: bool,
    pub company: CompanyInfo,
    pub customer: Option<Customer>,
    pub timestamp: i64,
}

/// Trait for receipt printer adapters
#[async_trait]
pub trait ReceiptPrinter: Send + Sync {
    async fn print_receipt(&self, ticket: &ReceiptTicket) -> PrintResult<()>;
}

/// Printer that logs the ticket and does nothing else
///
/// Used when no physical printer is configured.
#[derive(Debug, Clone, Default)]
pub struct NoopPrinter;

#[async_trait]
impl ReceiptPrinter for NoopPrinter {
    async fn print_receipt(&self, ticket: &ReceiptTicket) -> PrintResult<()> {
        info!(
            table = %ticket.table_name,
            ticket = ?ticket.ticket_number,
            total = ticket.total,
            "receipt printed (noop)"
        );
        Ok(())
    }
}
