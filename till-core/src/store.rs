//! External persistent record store contract
//!
//! The hosted backend (tables + realtime notifications) is an external
//! collaborator, not something this crate reimplements. The core talks
//! to it through [`RecordStore`]: generic select/insert/update/delete
//! over JSON records per named collection, plus the atomic
//! increment-and-return ticket counter kept in the settings row.
//!
//! Calls are asynchronous but never retried, cancelled, or
//! deduplicated; the error-handling asymmetry (financial writes
//! surface, the rest is logged) lives in the callers.
//!
//! [`MemoryStore`] is the in-process implementation used by tests and
//! demos, with per-collection failure injection.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use thiserror::Error;

/// Named collections of the external store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Ingredients,
    Products,
    Recipes,
    Wines,
    Sales,
    KitchenOrders,
    CashCloses,
    ServiceRequests,
    Suppliers,
    Invoices,
    Expenses,
    RestaurantSettings,
    Customers,
}

impl Collection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Ingredients => "ingredients",
            Collection::Products => "products",
            Collection::Recipes => "recipes",
            Collection::Wines => "wines",
            Collection::Sales => "sales",
            Collection::KitchenOrders => "kitchen_orders",
            Collection::CashCloses => "cash_closes",
            Collection::ServiceRequests => "service_requests",
            Collection::Suppliers => "suppliers",
            Collection::Invoices => "invoices",
            Collection::Expenses => "expenses",
            Collection::RestaurantSettings => "restaurant_settings",
            Collection::Customers => "customers",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Store errors
#[derive(Debug, Clone, Error)]
#[error("record store {op} on {collection} failed: {message}")]
pub struct StoreError {
    pub collection: &'static str,
    pub op: &'static str,
    pub message: String,
}

impl StoreError {
    pub fn new(collection: Collection, op: &'static str, message: impl Into<String>) -> Self {
        Self {
            collection: collection.as_str(),
            op,
            message: message.into(),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Contract with the hosted backend
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Fetch all records of a collection
    async fn select(&self, collection: Collection) -> StoreResult<Vec<Value>>;

    /// Append a record to a collection
    async fn insert(&self, collection: Collection, record: Value) -> StoreResult<()>;

    /// Merge `patch` into the record with the given id (upsert)
    async fn update(&self, collection: Collection, id: &str, patch: Value) -> StoreResult<()>;

    /// Delete the record with the given id
    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<()>;

    /// Atomically increment and return the sequential ticket counter
    async fn next_ticket_number(&self) -> StoreResult<u64>;
}

/// In-memory record store for tests and demos
///
/// Supports injecting read/write/counter failures per collection to
/// exercise the partial-application paths of the lifecycle.
#[derive(Default)]
pub struct MemoryStore {
    records: Mutex<HashMap<Collection, Vec<Value>>>,
    ticket_counter: AtomicU64,
    fail_reads: Mutex<HashSet<Collection>>,
    fail_writes: Mutex<HashSet<Collection>>,
    fail_counter: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inject read failures for a collection
    pub fn fail_reads_on(&self, collection: Collection) {
        self.fail_reads.lock().insert(collection);
    }

    /// Inject write failures for a collection
    pub fn fail_writes_on(&self, collection: Collection) {
        self.fail_writes.lock().insert(collection);
    }

    /// Clear injected write failures for a collection
    pub fn restore_writes_on(&self, collection: Collection) {
        self.fail_writes.lock().remove(&collection);
    }

    /// Make the ticket counter unavailable
    pub fn fail_counter(&self, fail: bool) {
        self.fail_counter.store(fail, Ordering::SeqCst);
    }

    /// Snapshot of a collection's records
    pub fn records(&self, collection: Collection) -> Vec<Value> {
        self.records
            .lock()
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    fn check_write(&self, collection: Collection, op: &'static str) -> StoreResult<()> {
        if self.fail_writes.lock().contains(&collection) {
            return Err(StoreError::new(collection, op, "injected write failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn select(&self, collection: Collection) -> StoreResult<Vec<Value>> {
        if self.fail_reads.lock().contains(&collection) {
            return Err(StoreError::new(
                collection,
                "select",
                "injected read failure",
            ));
        }
        Ok(self.records(collection))
    }

    async fn insert(&self, collection: Collection, record: Value) -> StoreResult<()> {
        self.check_write(collection, "insert")?;
        self.records.lock().entry(collection).or_default().push(record);
        Ok(())
    }

    async fn update(&self, collection: Collection, id: &str, patch: Value) -> StoreResult<()> {
        self.check_write(collection, "update")?;
        let mut records = self.records.lock();
        let entries = records.entry(collection).or_default();
        if let Some(existing) = entries
            .iter_mut()
            .find(|r| r.get("id").and_then(Value::as_str) == Some(id))
        {
            if let (Some(target), Some(source)) = (existing.as_object_mut(), patch.as_object()) {
                for (k, v) in source {
                    target.insert(k.clone(), v.clone());
                }
            } else {
                *existing = patch;
            }
        } else {
            entries.push(patch);
        }
        Ok(())
    }

    async fn delete(&self, collection: Collection, id: &str) -> StoreResult<()> {
        self.check_write(collection, "delete")?;
        if let Some(entries) = self.records.lock().get_mut(&collection) {
            entries.retain(|r| r.get("id").and_then(Value::as_str) != Some(id));
        }
        Ok(())
    }

    async fn next_ticket_number(&self) -> StoreResult<u64> {
        if self.fail_counter.load(Ordering::SeqCst) {
            return Err(StoreError::new(
                Collection::RestaurantSettings,
                "increment",
                "injected counter failure",
            ));
        }
        Ok(self.ticket_counter.fetch_add(1, Ordering::SeqCst) + 1)
    }
}
