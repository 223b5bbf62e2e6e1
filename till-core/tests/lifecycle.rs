//! End-to-end lifecycle tests over the full service stack
//!
//! Real redb cache on disk (tempfile), in-memory record store with
//! failure injection, recording receipt printer.

use async_trait::async_trait;
use parking_lot::Mutex;
use shared::models::{Customer, Recipe, RecipeComponent, StockEntry, TableStatus};
use shared::order::{LineInput, PaidItem};
use std::collections::BTreeMap;
use std::sync::Arc;
use tempfile::TempDir;
use till_core::orders::{step_failed, StepStatus};
use till_core::{
    Collection, MemoryStore, OrderError, PrintResult, ReceiptPrinter, ReceiptTicket, StockLedger,
    TableRegistry, TillManager, TillStorage,
};

#[derive(Default)]
struct RecordingPrinter {
    tickets: Mutex<Vec<ReceiptTicket>>,
}

impl RecordingPrinter {
    fn tickets(&self) -> Vec<ReceiptTicket> {
        self.tickets.lock().clone()
    }
}

#[async_trait]
impl ReceiptPrinter for RecordingPrinter {
    async fn print_receipt(&self, ticket: &ReceiptTicket) -> PrintResult<()> {
        self.tickets.lock().push(ticket.clone());
        Ok(())
    }
}

struct Till {
    manager: TillManager,
    tables: Arc<TableRegistry>,
    stock: Arc<StockLedger>,
    store: Arc<MemoryStore>,
    printer: Arc<RecordingPrinter>,
    _dir: TempDir,
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "till_core=debug".into()),
        )
        .with_test_writer()
        .try_init();
}

fn new_till() -> Till {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let storage = TillStorage::open(dir.path().join("till.redb")).unwrap();
    let tables = Arc::new(TableRegistry::load(storage.clone()).unwrap());
    let stock = Arc::new(StockLedger::new());
    let store = Arc::new(MemoryStore::new());
    let printer = Arc::new(RecordingPrinter::default());
    let manager = TillManager::new(
        storage,
        tables.clone(),
        stock.clone(),
        store.clone(),
        printer.clone(),
        true,
    )
    .unwrap();
    Till {
        manager,
        tables,
        stock,
        store,
        printer,
        _dir: dir,
    }
}

fn input(product_id: &str, price: f64) -> LineInput {
    LineInput {
        product_id: product_id.to_string(),
        name: format!("Product {product_id}"),
        price,
        is_wine: false,
        modifiers: None,
    }
}

fn wine(product_id: &str, price: f64) -> LineInput {
    LineInput {
        is_wine: true,
        ..input(product_id, price)
    }
}

fn seed_burger_stock(stock: &StockLedger) {
    stock.seed_entries(vec![
        StockEntry {
            id: "beef".to_string(),
            name: "Beef".to_string(),
            quantity: 10.0,
            unit: "kg".to_string(),
        },
        StockEntry {
            id: "rioja".to_string(),
            name: "Rioja".to_string(),
            quantity: 6.0,
            unit: "ud".to_string(),
        },
    ]);
    stock.seed_recipes(vec![Recipe {
        product_id: "burger".to_string(),
        components: vec![RecipeComponent {
            ingredient_id: "beef".to_string(),
            per_unit: 0.2,
        }],
    }]);
}

/// Select a fresh table and return its id
fn select_fresh_table(till: &Till) -> String {
    let table = till.tables.add_table("Sala", "M1").unwrap();
    till.manager.select_table(&table.id);
    table.id
}

// ===== Draft behavior =====

#[tokio::test]
async fn test_unmodified_lines_merge_modified_never_do() {
    let till = new_till();
    let table_id = select_fresh_table(&till);

    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    let mut modified = input("burger", 10.0);
    modified.modifiers = Some(BTreeMap::from([(
        "Punto".to_string(),
        "Poco hecho".to_string(),
    )]));
    till.manager.add_to_order(&modified).unwrap();
    till.manager.add_to_order(&input("burger", 10.0)).unwrap();

    let draft = till.manager.draft(&table_id);
    assert_eq!(draft.len(), 2);
    assert_eq!(draft[0].quantity, 3);
    assert_eq!(draft[1].quantity, 1);
    assert!(draft[1].modifiers.is_some());
}

#[tokio::test]
async fn test_adding_occupies_a_free_table() {
    let till = new_till();
    let table_id = select_fresh_table(&till);
    assert_eq!(till.tables.get(&table_id).unwrap().status, TableStatus::Free);

    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    assert_eq!(
        till.tables.get(&table_id).unwrap().status,
        TableStatus::Occupied
    );
}

#[tokio::test]
async fn test_draft_edits_without_active_table_are_noops() {
    let till = new_till();
    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    till.manager.update_quantity("any", 1).unwrap();
    till.manager.clear_order().unwrap();
    assert!(till.manager.send_to_kitchen().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_quantity_delta_floors_and_prunes() {
    let till = new_till();
    let table_id = select_fresh_table(&till);
    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    let line_id = till.manager.draft(&table_id)[0].line_id.clone();

    till.manager.update_quantity(&line_id, 2).unwrap();
    assert_eq!(till.manager.draft(&table_id)[0].quantity, 3);

    till.manager.update_quantity(&line_id, -10).unwrap();
    assert!(till.manager.draft(&table_id).is_empty());
}

// ===== Send to kitchen =====

#[tokio::test]
async fn test_send_to_kitchen_deducts_stock_and_builds_bill() {
    let till = new_till();
    seed_burger_stock(&till.stock);
    let table_id = select_fresh_table(&till);

    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    till.manager.add_to_order(&wine("rioja", 15.0)).unwrap();

    let log = till.manager.send_to_kitchen().await.unwrap();
    assert!(log.iter().all(|s| s.status != StepStatus::Failed));

    // stock: 2 burgers via recipe, 1 wine direct
    assert_eq!(till.stock.quantity("beef"), Some(10.0 - 0.4));
    assert_eq!(till.stock.quantity("rioja"), Some(5.0));

    // kitchen ticket inserted
    assert_eq!(till.store.records(Collection::KitchenOrders).len(), 1);

    // draft cleared, bill holds the lines
    assert!(till.manager.draft(&table_id).is_empty());
    let bill = till.manager.bill(&table_id);
    assert_eq!(bill.len(), 2);
    assert_eq!(bill[0].quantity, 2);
}

#[tokio::test]
async fn test_repeated_sends_merge_bill_by_product() {
    let till = new_till();
    let table_id = select_fresh_table(&till);

    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    till.manager.send_to_kitchen().await.unwrap();
    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    till.manager.send_to_kitchen().await.unwrap();

    let bill = till.manager.bill(&table_id);
    assert_eq!(bill.len(), 1);
    assert_eq!(bill[0].quantity, 2);
}

#[tokio::test]
async fn test_kitchen_ticket_failure_is_tolerated() {
    let till = new_till();
    let table_id = select_fresh_table(&till);
    till.store.fail_writes_on(Collection::KitchenOrders);

    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    let log = till.manager.send_to_kitchen().await.unwrap();

    assert!(step_failed(&log, "kitchen_ticket"));
    // the rest of the send still applied
    assert!(till.manager.draft(&table_id).is_empty());
    assert_eq!(till.manager.bill(&table_id).len(), 1);
}

#[tokio::test]
async fn test_customer_spend_recorded_on_send() {
    let till = new_till();
    select_fresh_table(&till);
    till.manager.attach_customer(Customer {
        id: "c1".to_string(),
        name: "Ana".to_string(),
        tax_id: None,
        tax_address: None,
    });

    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    let log = till.manager.send_to_kitchen().await.unwrap();

    assert!(!step_failed(&log, "customer_spend"));
    let customers = till.store.records(Collection::Customers);
    assert_eq!(customers.len(), 1);
    assert_eq!(customers[0]["total_spent"], 20.0);
}

// ===== Close table =====

#[tokio::test]
async fn test_close_with_percent_discount() {
    let till = new_till();
    let table_id = select_fresh_table(&till);
    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    till.manager.send_to_kitchen().await.unwrap();

    let settlement = till
        .manager
        .close_table(&table_id, "Tarjeta", 10.0, false)
        .await
        .unwrap();
    let sale = settlement.sale.unwrap();
    assert_eq!(sale.total, 18.0);
    assert_eq!(sale.discount, 2.0);
    assert_eq!(sale.ticket_number, Some(1));
    assert!(settlement.table_freed);
    assert_eq!(till.tables.get(&table_id).unwrap().status, TableStatus::Free);
    assert!(till.manager.bill(&table_id).is_empty());
    assert!(till.manager.active_table().is_none());

    // receipt rendered once, with the percent the discount came from
    assert_eq!(till.printer.tickets().len(), 1);
    assert_eq!(till.printer.tickets()[0].total, 18.0);
    assert_eq!(till.printer.tickets()[0].discount_percent, 10.0);
}

#[tokio::test]
async fn test_close_non_active_table_keeps_other_context() {
    let till = new_till();
    let first = select_fresh_table(&till);
    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    till.manager.send_to_kitchen().await.unwrap();

    // move on to a second table, then close the first one
    let second = select_fresh_table(&till);
    till.manager.add_to_order(&input("cola", 2.5)).unwrap();

    let settlement = till
        .manager
        .close_table(&first, "Efectivo", 0.0, false)
        .await
        .unwrap();
    assert!(settlement.table_freed);
    assert_eq!(till.tables.get(&first).unwrap().status, TableStatus::Free);
    // the active table stays selected with its draft untouched
    assert_eq!(till.manager.active_table().as_deref(), Some(second.as_str()));
    assert_eq!(till.manager.draft(&second).len(), 1);
}

#[tokio::test]
async fn test_invitation_overrides_percent() {
    let till = new_till();
    let table_id = select_fresh_table(&till);
    till.manager.add_to_order(&input("burger", 47.30)).unwrap();
    till.manager.send_to_kitchen().await.unwrap();

    let sale = till
        .manager
        .close_table(&table_id, "Efectivo", 15.0, true)
        .await
        .unwrap()
        .sale
        .unwrap();
    assert_eq!(sale.total, 0.0);
    assert_eq!(sale.discount, 47.30);
    assert!(sale.is_invitation);
}

#[tokio::test]
async fn test_close_fails_open_on_sale_write_failure() {
    let till = new_till();
    let table_id = select_fresh_table(&till);
    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    till.manager.send_to_kitchen().await.unwrap();

    till.store.fail_writes_on(Collection::Sales);
    let settlement = till
        .manager
        .close_table(&table_id, "Efectivo", 0.0, false)
        .await
        .unwrap();

    assert!(settlement.sale.is_none());
    assert!(step_failed(&settlement.steps, "sale_write"));
    // table released anyway
    assert!(settlement.table_freed);
    assert_eq!(till.tables.get(&table_id).unwrap().status, TableStatus::Free);
    assert!(till.store.records(Collection::Sales).is_empty());
}

#[tokio::test]
async fn test_close_empty_bill_frees_without_sale() {
    let till = new_till();
    let table_id = select_fresh_table(&till);
    till.tables
        .update_status(&table_id, TableStatus::Occupied)
        .unwrap();

    let settlement = till
        .manager
        .close_table(&table_id, "Efectivo", 0.0, false)
        .await
        .unwrap();
    assert!(settlement.sale.is_none());
    assert!(settlement.table_freed);
    assert_eq!(till.tables.get(&table_id).unwrap().status, TableStatus::Free);
}

#[tokio::test]
async fn test_ticket_counter_failure_yields_unnumbered_sale() {
    let till = new_till();
    let table_id = select_fresh_table(&till);
    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    till.manager.send_to_kitchen().await.unwrap();

    till.store.fail_counter(true);
    let sale = till
        .manager
        .close_table(&table_id, "Efectivo", 0.0, false)
        .await
        .unwrap()
        .sale
        .unwrap();
    assert_eq!(sale.ticket_number, None);
    assert_eq!(till.store.records(Collection::Sales).len(), 1);
}

// ===== Partial payments =====

#[tokio::test]
async fn test_pay_partial_reduces_bill_and_frees_when_empty() {
    let till = new_till();
    let table_id = select_fresh_table(&till);
    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    till.manager.send_to_kitchen().await.unwrap();
    let line_id = till.manager.bill(&table_id)[0].line_id.clone();

    let settlement = till
        .manager
        .pay_partial_table(
            &table_id,
            &[PaidItem {
                line_id: line_id.clone(),
                quantity: 1,
            }],
            "Efectivo",
            0.0,
            false,
        )
        .await
        .unwrap();
    assert_eq!(settlement.sale.as_ref().unwrap().total, 10.0);
    assert!(!settlement.table_freed);
    assert_eq!(till.manager.bill(&table_id)[0].quantity, 1);

    let settlement = till
        .manager
        .pay_partial_table(
            &table_id,
            &[PaidItem {
                line_id,
                quantity: 5, // clamps to the 1 remaining
            }],
            "Tarjeta",
            0.0,
            false,
        )
        .await
        .unwrap();
    assert_eq!(settlement.sale.as_ref().unwrap().total, 10.0);
    assert!(settlement.table_freed);
    assert_eq!(till.tables.get(&table_id).unwrap().status, TableStatus::Free);
    assert_eq!(till.store.records(Collection::Sales).len(), 2);
}

#[tokio::test]
async fn test_pay_partial_write_failure_keeps_bill_intact() {
    let till = new_till();
    let table_id = select_fresh_table(&till);
    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    till.manager.send_to_kitchen().await.unwrap();
    let line_id = till.manager.bill(&table_id)[0].line_id.clone();

    till.store.fail_writes_on(Collection::Sales);
    let result = till
        .manager
        .pay_partial_table(
            &table_id,
            &[PaidItem { line_id, quantity: 1 }],
            "Efectivo",
            0.0,
            false,
        )
        .await;

    assert!(matches!(result, Err(OrderError::SaleWrite { .. })));
    assert_eq!(till.manager.bill(&table_id)[0].quantity, 1);
    assert_eq!(
        till.tables.get(&table_id).unwrap().status,
        TableStatus::Occupied
    );
}

#[tokio::test]
async fn test_pay_partial_unknown_lines_are_noops() {
    let till = new_till();
    let table_id = select_fresh_table(&till);
    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    till.manager.send_to_kitchen().await.unwrap();

    let settlement = till
        .manager
        .pay_partial_table(
            &table_id,
            &[PaidItem {
                line_id: "ghost".to_string(),
                quantity: 1,
            }],
            "Efectivo",
            0.0,
            false,
        )
        .await
        .unwrap();
    assert!(settlement.sale.is_none());
    assert_eq!(till.manager.bill(&table_id).len(), 1);
}

#[tokio::test]
async fn test_pay_partial_discount_applies_to_subset() {
    let till = new_till();
    let table_id = select_fresh_table(&till);
    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    till.manager.send_to_kitchen().await.unwrap();
    let line_id = till.manager.bill(&table_id)[0].line_id.clone();

    let sale = till
        .manager
        .pay_partial_table(
            &table_id,
            &[PaidItem { line_id, quantity: 1 }],
            "Efectivo",
            50.0,
            false,
        )
        .await
        .unwrap()
        .sale
        .unwrap();
    assert_eq!(sale.total, 5.0);
    assert_eq!(sale.discount, 5.0);
    // bill still reduced by the paid quantity
    assert_eq!(till.manager.bill(&table_id)[0].quantity, 1);
}

#[tokio::test]
async fn test_final_partial_receipt_keeps_customer() {
    let till = new_till();
    let table_id = select_fresh_table(&till);
    till.manager.attach_customer(Customer {
        id: "c1".to_string(),
        name: "Ana".to_string(),
        tax_id: Some("B12345678".to_string()),
        tax_address: None,
    });
    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    till.manager.send_to_kitchen().await.unwrap();
    let line_id = till.manager.bill(&table_id)[0].line_id.clone();

    // paying the whole bill frees the table, but the receipt must
    // still carry the attached customer's tax data
    let settlement = till
        .manager
        .pay_partial_table(
            &table_id,
            &[PaidItem { line_id, quantity: 1 }],
            "Tarjeta",
            0.0,
            false,
        )
        .await
        .unwrap();
    assert!(settlement.table_freed);

    let tickets = till.printer.tickets();
    assert_eq!(tickets.len(), 1);
    let customer = tickets[0].customer.as_ref().unwrap();
    assert_eq!(customer.tax_id.as_deref(), Some("B12345678"));
}

#[tokio::test]
async fn test_pay_value_partial_appends_credit_and_settles() {
    let till = new_till();
    let table_id = select_fresh_table(&till);
    till.manager.add_to_order(&input("burger", 20.0)).unwrap();
    till.manager.send_to_kitchen().await.unwrap();

    let settlement = till
        .manager
        .pay_value_partial_table(&table_id, 5.0, "Efectivo", 0.0, false)
        .await
        .unwrap();
    assert_eq!(settlement.sale.as_ref().unwrap().total, 5.0);
    assert!(!settlement.table_freed);

    let bill = till.manager.bill(&table_id);
    assert_eq!(bill.len(), 2);
    assert_eq!(bill[1].name, "PAGO PARCIAL");
    assert_eq!(bill[1].price, -5.0);

    let settlement = till
        .manager
        .pay_value_partial_table(&table_id, 15.0, "Tarjeta", 0.0, false)
        .await
        .unwrap();
    assert!(settlement.table_freed);
    assert_eq!(till.tables.get(&table_id).unwrap().status, TableStatus::Free);
    assert!(till.manager.bill(&table_id).is_empty());
}

#[tokio::test]
async fn test_pay_value_non_positive_amounts_are_noops() {
    let till = new_till();
    let table_id = select_fresh_table(&till);
    till.manager.add_to_order(&input("burger", 20.0)).unwrap();
    till.manager.send_to_kitchen().await.unwrap();

    for amount in [0.0, -3.0] {
        let settlement = till
            .manager
            .pay_value_partial_table(&table_id, amount, "Efectivo", 0.0, false)
            .await
            .unwrap();
        assert!(settlement.sale.is_none());
    }
    assert_eq!(till.manager.bill(&table_id).len(), 1);
    assert!(till.store.records(Collection::Sales).is_empty());
}

// ===== Bill removal =====

#[tokio::test]
async fn test_remove_from_bill_returns_stock_and_frees() {
    let till = new_till();
    seed_burger_stock(&till.stock);
    let table_id = select_fresh_table(&till);
    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    till.manager.add_to_order(&input("burger", 10.0)).unwrap();
    till.manager.send_to_kitchen().await.unwrap();
    assert_eq!(till.stock.quantity("beef"), Some(9.6));
    let line_id = till.manager.bill(&table_id)[0].line_id.clone();

    till.manager
        .remove_product_from_bill(&table_id, &line_id, 1)
        .unwrap();
    assert_eq!(till.stock.quantity("beef"), Some(9.8));
    assert_eq!(till.manager.bill(&table_id)[0].quantity, 1);

    // quantity clamps to what remains
    till.manager
        .remove_product_from_bill(&table_id, &line_id, 99)
        .unwrap();
    assert_eq!(till.stock.quantity("beef"), Some(10.0));
    assert!(till.manager.bill(&table_id).is_empty());
    assert_eq!(till.tables.get(&table_id).unwrap().status, TableStatus::Free);
}

// ===== Persistence =====

#[tokio::test]
async fn test_drafts_and_bills_survive_restart() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("till.redb");
    let table_id;
    {
        let storage = TillStorage::open(&path)?;
        let tables = Arc::new(TableRegistry::load(storage.clone())?);
        let manager = TillManager::new(
            storage,
            tables.clone(),
            Arc::new(StockLedger::new()),
            Arc::new(MemoryStore::new()),
            Arc::new(RecordingPrinter::default()),
            false,
        )?;
        table_id = tables.add_table("Sala", "M1")?.id;
        manager.select_table(&table_id);
        manager.add_to_order(&input("burger", 10.0))?;
        manager.send_to_kitchen().await?;
        manager.add_to_order(&input("cola", 2.5))?;
    }

    let storage = TillStorage::open(&path)?;
    let tables = Arc::new(TableRegistry::load(storage.clone())?);
    let manager = TillManager::new(
        storage,
        tables.clone(),
        Arc::new(StockLedger::new()),
        Arc::new(MemoryStore::new()),
        Arc::new(RecordingPrinter::default()),
        false,
    )?;

    assert_eq!(
        tables.get(&table_id).unwrap().status,
        TableStatus::Occupied
    );
    assert_eq!(manager.bill(&table_id).len(), 1);
    assert_eq!(manager.draft(&table_id).len(), 1);
    assert_eq!(manager.draft(&table_id)[0].product_id, "cola");
    Ok(())
}

#[tokio::test]
async fn test_receipt_skipped_when_printing_disabled() {
    let printer = Arc::new(RecordingPrinter::default());
    let dir = tempfile::tempdir().unwrap();
    let storage = TillStorage::open(dir.path().join("till.redb")).unwrap();
    let tables = Arc::new(TableRegistry::load(storage.clone()).unwrap());
    let manager = TillManager::new(
        storage,
        tables.clone(),
        Arc::new(StockLedger::new()),
        Arc::new(MemoryStore::new()),
        printer.clone(),
        false,
    )
    .unwrap();
    let table_id = tables.add_table("Sala", "M9").unwrap().id;
    manager.select_table(&table_id);
    manager.add_to_order(&input("cola", 2.5)).unwrap();
    manager.send_to_kitchen().await.unwrap();
    manager
        .close_table(&table_id, "Efectivo", 0.0, false)
        .await
        .unwrap();

    assert!(printer.tickets().is_empty());
}
