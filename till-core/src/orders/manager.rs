//! Till manager: active table context, drafts, and bills
//!
//! One manager instance runs per till. It owns the mutable lifecycle
//! state (which table is selected, the per-table comanda drafts, the
//! per-table bills) and writes every change through to the local
//! cache. Draft edits are pure local state; sending a comanda fans out
//! into stock, customer spend, and the kitchen ticket, each step
//! recorded in a [`StepLog`].
//!
//! There is no cross-till coordination: two managers over the same
//! cache would race. The deployment model is a single till process.

use crate::orders::error::OrderResult;
use crate::orders::money;
use crate::orders::steps::{StepLog, StepOutcome};
use crate::printing::ReceiptPrinter;
use crate::stock::StockLedger;
use crate::storage::TillStorage;
use crate::store::{Collection, RecordStore};
use crate::tables::TableRegistry;
use parking_lot::RwLock;
use serde_json::{json, Value};
use shared::models::{CompanyInfo, Customer, Recipe, StockEntry, TableStatus};
use shared::order::{LineInput, OrderLine};
use shared::util::now_millis;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub(crate) struct ManagerState {
    pub active_table: Option<String>,
    pub drafts: HashMap<String, Vec<OrderLine>>,
    pub bills: HashMap<String, Vec<OrderLine>>,
    /// Customer attached per table for spend tracking and receipts
    pub customers: HashMap<String, Customer>,
    pub company: CompanyInfo,
}

/// Order/table/bill lifecycle service
pub struct TillManager {
    pub(crate) storage: TillStorage,
    pub(crate) tables: Arc<TableRegistry>,
    pub(crate) stock: Arc<StockLedger>,
    pub(crate) store: Arc<dyn RecordStore>,
    pub(crate) printer: Arc<dyn ReceiptPrinter>,
    pub(crate) print_receipts: bool,
    pub(crate) state: RwLock<ManagerState>,
}

impl TillManager {
    /// Build a manager, reconstructing drafts and bills from the cache
    pub fn new(
        storage: TillStorage,
        tables: Arc<TableRegistry>,
        stock: Arc<StockLedger>,
        store: Arc<dyn RecordStore>,
        printer: Arc<dyn ReceiptPrinter>,
        print_receipts: bool,
    ) -> OrderResult<Self> {
        let drafts = storage.all_drafts()?;
        let bills = storage.all_bills()?;
        info!(
            drafts = drafts.len(),
            bills = bills.len(),
            "till manager restored from cache"
        );
        Ok(Self {
            storage,
            tables,
            stock,
            store,
            printer,
            print_receipts,
            state: RwLock::new(ManagerState {
                active_table: None,
                drafts,
                bills,
                customers: HashMap::new(),
                company: CompanyInfo::default(),
            }),
        })
    }

    /// Seed the stock ledger from the external store
    ///
    /// Wines become direct stock entries keyed by their product id.
    /// Unparseable records are skipped.
    pub async fn load_stock(&self) {
        let mut entries: Vec<StockEntry> = Vec::new();
        for collection in [Collection::Ingredients, Collection::Wines] {
            match self.store.select(collection).await {
                Ok(records) => {
                    entries.extend(records.into_iter().filter_map(|r| parse_record(collection, r)))
                }
                Err(e) => warn!(%collection, error = %e, "stock load skipped collection"),
            }
        }
        self.stock.seed_entries(entries);

        match self.store.select(Collection::Recipes).await {
            Ok(records) => {
                let recipes: Vec<Recipe> = records
                    .into_iter()
                    .filter_map(|r| parse_record(Collection::Recipes, r))
                    .collect();
                self.stock.seed_recipes(recipes);
            }
            Err(e) => warn!(error = %e, "recipe load skipped"),
        }
    }

    /// Company details printed on receipts
    pub fn set_company_info(&self, company: CompanyInfo) {
        self.state.write().company = company;
    }

    /// Pull company details from the restaurant settings record
    ///
    /// Keeps the current details when the store is unreachable or the
    /// record does not parse.
    pub async fn load_company_info(&self) {
        match self.store.select(Collection::RestaurantSettings).await {
            Ok(records) => {
                if let Some(company) = records
                    .into_iter()
                    .find_map(|r| parse_record(Collection::RestaurantSettings, r))
                {
                    self.state.write().company = company;
                }
            }
            Err(e) => warn!(error = %e, "company info load skipped"),
        }
    }

    // ===== Active table context =====

    /// Make a table the active editing context
    ///
    /// Unknown table ids are ignored. Selecting never changes any
    /// table's status.
    pub fn select_table(&self, table_id: &str) {
        if self.tables.get(table_id).is_none() {
            debug!(table_id, "select ignored, unknown table");
            return;
        }
        self.state.write().active_table = Some(table_id.to_string());
    }

    /// Drop the active editing context
    pub fn deselect_table(&self) {
        self.state.write().active_table = None;
    }

    pub fn active_table(&self) -> Option<String> {
        self.state.read().active_table.clone()
    }

    pub fn draft(&self, table_id: &str) -> Vec<OrderLine> {
        self.state
            .read()
            .drafts
            .get(table_id)
            .cloned()
            .unwrap_or_default()
    }

    pub fn bill(&self, table_id: &str) -> Vec<OrderLine> {
        self.state
            .read()
            .bills
            .get(table_id)
            .cloned()
            .unwrap_or_default()
    }

    // ===== Customer attachment =====

    /// Attach a customer to the active table
    pub fn attach_customer(&self, customer: Customer) {
        let mut state = self.state.write();
        if let Some(table_id) = state.active_table.clone() {
            info!(table_id = %table_id, customer_id = %customer.id, "customer attached");
            state.customers.insert(table_id, customer);
        }
    }

    /// Detach any customer from the active table
    pub fn detach_customer(&self) {
        let mut state = self.state.write();
        if let Some(table_id) = state.active_table.clone() {
            state.customers.remove(&table_id);
        }
    }

    pub fn attached_customer(&self, table_id: &str) -> Option<Customer> {
        self.state.read().customers.get(table_id).cloned()
    }

    // ===== Draft operations =====

    /// Add a product selection to the active table's draft
    ///
    /// Unmodified selections merge into an existing unmodified line
    /// for the same product; selections carrying modifiers always
    /// append a distinct line. A free active table flips to occupied.
    pub fn add_to_order(&self, input: &LineInput) -> OrderResult<()> {
        let Some(table_id) = self.active_table() else {
            debug!("add_to_order ignored, no active table");
            return Ok(());
        };
        money::validate_line_input(input)?;

        let draft = {
            let mut state = self.state.write();
            let draft = state.drafts.entry(table_id.clone()).or_default();
            match draft.iter_mut().find(|line| line.merges_with(input)) {
                Some(line) => line.quantity += 1,
                None => draft.push(OrderLine::from_input(input)),
            }
            draft.clone()
        };
        self.storage.put_draft(&table_id, &draft)?;

        if let Some(table) = self.tables.get(&table_id) {
            if table.is_free() {
                self.tables.update_status(&table_id, TableStatus::Occupied)?;
            }
        }
        Ok(())
    }

    /// Remove a draft line entirely
    pub fn remove_from_order(&self, line_id: &str) -> OrderResult<()> {
        self.mutate_draft(|draft| draft.retain(|line| line.line_id != line_id))
    }

    /// Apply a quantity delta to a draft line
    ///
    /// Floors at zero; zero-quantity lines are pruned.
    pub fn update_quantity(&self, line_id: &str, delta: i32) -> OrderResult<()> {
        money::validate_quantity(delta)?;
        self.mutate_draft(|draft| {
            if let Some(line) = draft.iter_mut().find(|l| l.line_id == line_id) {
                line.quantity = (line.quantity + delta).max(0);
            }
            draft.retain(|line| line.quantity > 0);
        })
    }

    /// Set or clear the kitchen note of a draft line
    pub fn update_item_note(&self, line_id: &str, note: Option<String>) -> OrderResult<()> {
        self.mutate_draft(|draft| {
            if let Some(line) = draft.iter_mut().find(|l| l.line_id == line_id) {
                line.note = note;
            }
        })
    }

    /// Discard the active table's draft
    pub fn clear_order(&self) -> OrderResult<()> {
        self.mutate_draft(|draft| draft.clear())
    }

    fn mutate_draft<F>(&self, mutate: F) -> OrderResult<()>
    where
        F: FnOnce(&mut Vec<OrderLine>),
    {
        let Some(table_id) = self.active_table() else {
            debug!("draft edit ignored, no active table");
            return Ok(());
        };
        let draft = {
            let mut state = self.state.write();
            let draft = state.drafts.entry(table_id.clone()).or_default();
            mutate(draft);
            let snapshot = draft.clone();
            if snapshot.is_empty() {
                state.drafts.remove(&table_id);
            }
            snapshot
        };
        self.storage.put_draft(&table_id, &draft)?;
        Ok(())
    }

    // ===== Bill operations =====

    /// Send the active table's draft to the kitchen
    ///
    /// No-op without an active table or with an empty draft. The
    /// effects apply in order with no transaction across them; the
    /// returned log records what happened to each:
    /// stock deduction, customer spend, kitchen ticket (both external,
    /// failures logged and tolerated), draft merged into the bill,
    /// draft cleared, table activity stamped.
    pub async fn send_to_kitchen(&self) -> OrderResult<StepLog> {
        let Some(table_id) = self.active_table() else {
            debug!("send_to_kitchen ignored, no active table");
            return Ok(StepLog::new());
        };
        let draft = self.draft(&table_id);
        if draft.is_empty() {
            debug!(table_id = %table_id, "send_to_kitchen ignored, empty draft");
            return Ok(StepLog::new());
        }

        let mut log = StepLog::new();

        // 1. Stock deduction (per-item best effort, never fails)
        self.stock.deduct_for_order(&draft);
        log.push(StepOutcome::ok("stock_deduct"));

        // 2. Customer spend, recorded externally at the draft total
        let draft_total = money::to_f64(money::lines_total(&draft));
        log.push(self.record_customer_spend(&table_id, draft_total).await);

        // 3. Kitchen ticket, fire-and-forget
        log.push(self.insert_kitchen_ticket(&table_id, &draft).await);

        // 4. Merge the draft into the bill
        let bill = {
            let mut state = self.state.write();
            let bill = state.bills.entry(table_id.clone()).or_default();
            for line in draft {
                match bill
                    .iter_mut()
                    .find(|b| b.merges_with_line(&line))
                {
                    Some(existing) => existing.quantity += line.quantity,
                    None => bill.push(line),
                }
            }
            bill.clone()
        };
        self.storage.put_bill(&table_id, &bill)?;
        log.push(StepOutcome::ok("bill_merge"));

        // 5. Clear the draft
        self.state.write().drafts.remove(&table_id);
        self.storage.put_draft(&table_id, &[])?;
        log.push(StepOutcome::ok("draft_clear"));

        // 6. Table activity
        self.tables.touch(&table_id)?;
        log.push(StepOutcome::ok("table_touch"));

        info!(table_id = %table_id, lines = bill.len(), "comanda sent to kitchen");
        Ok(log)
    }

    async fn record_customer_spend(&self, table_id: &str, amount: f64) -> StepOutcome {
        let Some(customer) = self.attached_customer(table_id) else {
            return StepOutcome::skipped("customer_spend", "no customer attached");
        };
        let previous = match self.store.select(Collection::Customers).await {
            Ok(records) => records
                .iter()
                .find(|r| r.get("id").and_then(Value::as_str) == Some(customer.id.as_str()))
                .and_then(|r| r.get("total_spent"))
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            Err(e) => {
                warn!(customer_id = %customer.id, error = %e, "customer spend read failed");
                return StepOutcome::failed("customer_spend", e.to_string());
            }
        };
        let patch = json!({
            "id": customer.id,
            "total_spent": previous + amount,
            "last_visit": now_millis(),
        });
        match self
            .store
            .update(Collection::Customers, &customer.id, patch)
            .await
        {
            Ok(()) => StepOutcome::ok("customer_spend"),
            Err(e) => {
                warn!(customer_id = %customer.id, error = %e, "customer spend write failed");
                StepOutcome::failed("customer_spend", e.to_string())
            }
        }
    }

    async fn insert_kitchen_ticket(&self, table_id: &str, lines: &[OrderLine]) -> StepOutcome {
        let table_name = self
            .tables
            .get(table_id)
            .map(|t| t.name)
            .unwrap_or_else(|| table_id.to_string());
        let ticket = json!({
            "id": uuid::Uuid::new_v4().to_string(),
            "table_id": table_id,
            "table_name": table_name,
            "items": lines,
            "created_at": now_millis(),
        });
        match self.store.insert(Collection::KitchenOrders, ticket).await {
            Ok(()) => StepOutcome::ok("kitchen_ticket"),
            Err(e) => {
                // No retry and no rollback; the kitchen copy is lost
                warn!(table_id, error = %e, "kitchen ticket insert failed");
                StepOutcome::failed("kitchen_ticket", e.to_string())
            }
        }
    }

    /// Remove quantity of a bill line, returning its stock
    ///
    /// Clamps to the remaining quantity. The table goes free when both
    /// bill and draft end up empty.
    pub fn remove_product_from_bill(
        &self,
        table_id: &str,
        line_id: &str,
        quantity: i32,
    ) -> OrderResult<()> {
        if quantity <= 0 {
            return Ok(());
        }
        let (bill, returned, drafts_empty) = {
            let mut state = self.state.write();
            let Some(bill) = state.bills.get_mut(table_id) else {
                debug!(table_id, "bill removal ignored, no bill");
                return Ok(());
            };
            let Some(line) = bill.iter_mut().find(|l| l.line_id == line_id) else {
                debug!(table_id, line_id, "bill removal ignored, unknown line");
                return Ok(());
            };
            let removed = quantity.min(line.quantity);
            line.quantity -= removed;
            let returned_line = {
                let mut l = line.clone();
                l.quantity = removed;
                l
            };
            bill.retain(|l| l.quantity > 0);
            let snapshot = bill.clone();
            if snapshot.is_empty() {
                state.bills.remove(table_id);
            }
            let drafts_empty = state
                .drafts
                .get(table_id)
                .map(|d| d.is_empty())
                .unwrap_or(true);
            (snapshot, returned_line, drafts_empty)
        };

        self.stock.return_quantity(&returned, returned.quantity);
        self.storage.put_bill(table_id, &bill)?;

        if bill.is_empty() && drafts_empty {
            self.tables.update_status(table_id, TableStatus::Free)?;
        }
        Ok(())
    }
}

fn parse_record<T: serde::de::DeserializeOwned>(collection: Collection, record: Value) -> Option<T> {
    match serde_json::from_value(record) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(%collection, error = %e, "unparseable record skipped");
            None
        }
    }
}
