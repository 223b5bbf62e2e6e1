//! Settlement: turning bills into sale records
//!
//! Three payment modes over the bills the manager holds:
//!
//! - [`close_table`](TillManager::close_table): settle everything and
//!   free the table. Fail-open: the table is released even when the
//!   sale record cannot be written, because a stuck occupied table
//!   blocks the floor while a lost sale is recoverable from the step
//!   log.
//! - [`pay_partial_table`](TillManager::pay_partial_table): settle a
//!   subset of bill lines. The sale write is financial here, so its
//!   failure is an error and the bill stays intact.
//! - [`pay_value_partial_table`](TillManager::pay_value_partial_table):
//!   settle an amount. The paid amount becomes a negative credit line
//!   on the live bill; the table frees once the net total reaches zero
//!   within tolerance.
//!
//! Nothing here guards against two concurrent settlements of the same
//! table. The single-till model serializes them at the caller.

use crate::orders::error::{OrderError, OrderResult};
use crate::orders::manager::TillManager;
use crate::orders::money;
use crate::orders::steps::{StepLog, StepOutcome};
use crate::printing::ReceiptTicket;
use crate::store::Collection;
use shared::models::{Sale, TableStatus};
use shared::order::{LineKind, OrderLine, PaidItem};
use shared::util::now_millis;
use tracing::{error, info, warn};

/// Outcome of a settlement operation
#[derive(Debug)]
pub struct Settlement {
    /// The recorded sale, `None` when nothing was (or could be) recorded
    pub sale: Option<Sale>,
    pub table_freed: bool,
    pub steps: StepLog,
}

impl Settlement {
    fn noop() -> Self {
        Self {
            sale: None,
            table_freed: false,
            steps: StepLog::new(),
        }
    }
}

impl TillManager {
    /// Close a table in full
    ///
    /// Works on any table, active or not; the active-table context is
    /// cleared only when it points at the closed table. Discount is
    /// the whole total on an invitation, otherwise
    /// `total × percent / 100`. The table always ends up free with
    /// draft, bill, and customer attachment cleared, sale written or
    /// not. An empty bill produces no sale but still frees the table.
    pub async fn close_table(
        &self,
        table_id: &str,
        payment_method: &str,
        discount_percent: f64,
        is_invitation: bool,
    ) -> OrderResult<Settlement> {
        money::validate_discount_percent(discount_percent)?;
        let mut steps = StepLog::new();
        let bill = self.bill(table_id);

        let sale = if bill.is_empty() {
            steps.push(StepOutcome::skipped("sale_write", "empty bill"));
            None
        } else {
            let total = money::lines_total(&bill);
            let discount = money::discount_amount(total, discount_percent, is_invitation);
            let final_total = money::to_f64((total - discount).max(rust_decimal::Decimal::ZERO));

            let sale = Sale {
                sale_id: uuid::Uuid::new_v4().to_string(),
                ticket_number: self.next_ticket(&mut steps).await,
                table_id: table_id.to_string(),
                table_name: self.table_name(table_id),
                items: bill,
                total: final_total,
                discount: money::to_f64(discount),
                payment_method: payment_method.to_string(),
                is_invitation,
                timestamp: now_millis(),
            };
            // Fail-open: the table is released either way
            match self.write_sale(&sale).await {
                Ok(()) => {
                    steps.push(StepOutcome::ok("sale_write"));
                    Some(sale)
                }
                Err(e) => {
                    error!(table_id = %table_id, error = %e, "sale write failed, table released anyway");
                    steps.push(StepOutcome::failed("sale_write", e.to_string()));
                    None
                }
            }
        };

        if let Some(sale) = &sale {
            self.print_sale(sale, discount_percent, &mut steps).await;
        }

        self.release_table(table_id)?;
        steps.push(StepOutcome::ok("table_release"));
        info!(table_id, recorded = sale.is_some(), "table closed");

        Ok(Settlement {
            sale,
            table_freed: true,
            steps,
        })
    }

    /// Settle a subset of a table's bill lines
    ///
    /// Requested quantities clamp to what the bill holds; unknown line
    /// ids are ignored. Nothing payable is a no-op. Discount and
    /// invitation apply to the subset total. A failed sale write is an
    /// error and leaves the bill untouched.
    pub async fn pay_partial_table(
        &self,
        table_id: &str,
        items: &[PaidItem],
        payment_method: &str,
        discount_percent: f64,
        is_invitation: bool,
    ) -> OrderResult<Settlement> {
        money::validate_discount_percent(discount_percent)?;
        let bill = self.bill(table_id);
        let paid: Vec<OrderLine> = items
            .iter()
            .filter_map(|paid| {
                bill.iter()
                    .find(|line| line.line_id == paid.line_id)
                    .and_then(|line| {
                        let quantity = paid.quantity.min(line.quantity);
                        (quantity > 0).then(|| {
                            let mut l = line.clone();
                            l.quantity = quantity;
                            l
                        })
                    })
            })
            .collect();
        if paid.is_empty() {
            return Ok(Settlement::noop());
        }

        let mut steps = StepLog::new();
        let subtotal = money::lines_total(&paid);
        let discount = money::discount_amount(subtotal, discount_percent, is_invitation);
        let sale = Sale {
            sale_id: uuid::Uuid::new_v4().to_string(),
            ticket_number: self.next_ticket(&mut steps).await,
            table_id: table_id.to_string(),
            table_name: self.table_name(table_id),
            items: paid.clone(),
            total: money::to_f64((subtotal - discount).max(rust_decimal::Decimal::ZERO)),
            discount: money::to_f64(discount),
            payment_method: payment_method.to_string(),
            is_invitation,
            timestamp: now_millis(),
        };
        // Financial write: failure surfaces and the bill stays intact
        self.write_sale(&sale)
            .await
            .map_err(|source| OrderError::SaleWrite {
                table_id: table_id.to_string(),
                source,
            })?;
        steps.push(StepOutcome::ok("sale_write"));

        let remaining = {
            let mut state = self.state.write();
            let bill = state.bills.entry(table_id.to_string()).or_default();
            for paid_line in &paid {
                if let Some(line) = bill.iter_mut().find(|l| l.line_id == paid_line.line_id) {
                    line.quantity -= paid_line.quantity;
                }
            }
            bill.retain(|l| l.quantity > 0);
            let snapshot = bill.clone();
            if snapshot.is_empty() {
                state.bills.remove(table_id);
            }
            snapshot
        };
        self.storage.put_bill(table_id, &remaining)?;

        // Print before release so the receipt still sees the customer
        self.print_sale(&sale, discount_percent, &mut steps).await;
        let table_freed = remaining.is_empty();
        if table_freed {
            self.release_table(table_id)?;
            steps.push(StepOutcome::ok("table_release"));
        }
        info!(table_id, total = sale.total, table_freed, "partial payment by items");

        Ok(Settlement {
            sale: Some(sale),
            table_freed,
            steps,
        })
    }

    /// Settle an amount against a table's bill
    ///
    /// Produces a synthetic single-line sale for the amount (discount
    /// and invitation apply to the amount, not the bill) and appends
    /// the paid amount as a negative credit line to the live bill. The
    /// table frees when the net total reaches zero within tolerance.
    /// Non-positive amounts are validation no-ops.
    pub async fn pay_value_partial_table(
        &self,
        table_id: &str,
        amount: f64,
        payment_method: &str,
        discount_percent: f64,
        is_invitation: bool,
    ) -> OrderResult<Settlement> {
        money::validate_amount(amount)?;
        money::validate_discount_percent(discount_percent)?;
        if amount <= 0.0 || self.bill(table_id).is_empty() {
            return Ok(Settlement::noop());
        }

        let mut steps = StepLog::new();
        let gross = money::to_decimal(amount);
        let discount = money::discount_amount(gross, discount_percent, is_invitation);
        let sale = Sale {
            sale_id: uuid::Uuid::new_v4().to_string(),
            ticket_number: self.next_ticket(&mut steps).await,
            table_id: table_id.to_string(),
            table_name: self.table_name(table_id),
            items: vec![OrderLine {
                line_id: uuid::Uuid::new_v4().to_string(),
                product_id: String::new(),
                name: "PAGO PARCIAL".to_string(),
                price: amount,
                quantity: 1,
                kind: LineKind::Adjustment,
                note: None,
                modifiers: None,
            }],
            total: money::to_f64((gross - discount).max(rust_decimal::Decimal::ZERO)),
            discount: money::to_f64(discount),
            payment_method: payment_method.to_string(),
            is_invitation,
            timestamp: now_millis(),
        };
        self.write_sale(&sale)
            .await
            .map_err(|source| OrderError::SaleWrite {
                table_id: table_id.to_string(),
                source,
            })?;
        steps.push(StepOutcome::ok("sale_write"));

        let (remaining, net) = {
            let mut state = self.state.write();
            let bill = state.bills.entry(table_id.to_string()).or_default();
            bill.push(OrderLine::adjustment("PAGO PARCIAL", amount));
            (bill.clone(), money::lines_total(bill))
        };
        self.storage.put_bill(table_id, &remaining)?;

        // Print before release so the receipt still sees the customer
        self.print_sale(&sale, discount_percent, &mut steps).await;
        let table_freed = money::is_settled(net);
        if table_freed {
            self.release_table(table_id)?;
            steps.push(StepOutcome::ok("table_release"));
        }
        info!(
            table_id,
            amount,
            net = money::to_f64(net),
            table_freed,
            "partial payment by amount"
        );

        Ok(Settlement {
            sale: Some(sale),
            table_freed,
            steps,
        })
    }

    // ===== Helpers =====

    async fn next_ticket(&self, steps: &mut StepLog) -> Option<u64> {
        match self.store.next_ticket_number().await {
            Ok(n) => {
                steps.push(StepOutcome::ok("ticket_number"));
                Some(n)
            }
            Err(e) => {
                // A sale without a ticket number beats no sale at all
                warn!(error = %e, "ticket counter unavailable");
                steps.push(StepOutcome::failed("ticket_number", e.to_string()));
                None
            }
        }
    }

    async fn write_sale(&self, sale: &Sale) -> Result<(), crate::store::StoreError> {
        let record = serde_json::to_value(sale).map_err(|e| {
            crate::store::StoreError::new(Collection::Sales, "serialize", e.to_string())
        })?;
        self.store.insert(Collection::Sales, record).await
    }

    async fn print_sale(&self, sale: &Sale, discount_percent: f64, steps: &mut StepLog) {
        if !self.print_receipts {
            steps.push(StepOutcome::skipped("receipt", "printing disabled"));
            return;
        }
        let ticket = ReceiptTicket {
            ticket_number: sale.ticket_number,
            table_name: sale.table_name.clone(),
            lines: sale.items.clone(),
            total: sale.total,
            discount: sale.discount,
            discount_percent,
            payment_method: sale.payment_method.clone(),
            is_invitation: sale.is_invitation,
            company: self.state.read().company.clone(),
            customer: self.attached_customer(&sale.table_id),
            timestamp: sale.timestamp,
        };
        match self.printer.print_receipt(&ticket).await {
            Ok(()) => steps.push(StepOutcome::ok("receipt")),
            Err(e) => {
                warn!(table_id = %sale.table_id, error = %e, "receipt print failed");
                steps.push(StepOutcome::failed("receipt", e.to_string()));
            }
        }
    }

    fn table_name(&self, table_id: &str) -> String {
        self.tables
            .get(table_id)
            .map(|t| t.name)
            .unwrap_or_else(|| table_id.to_string())
    }

    /// Free a table and drop all its lifecycle state
    fn release_table(&self, table_id: &str) -> OrderResult<()> {
        {
            let mut state = self.state.write();
            state.drafts.remove(table_id);
            state.bills.remove(table_id);
            state.customers.remove(table_id);
            if state.active_table.as_deref() == Some(table_id) {
                state.active_table = None;
            }
        }
        self.storage.put_draft(table_id, &[])?;
        self.storage.put_bill(table_id, &[])?;
        self.tables.update_status(table_id, TableStatus::Free)?;
        Ok(())
    }
}
