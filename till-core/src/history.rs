//! Sales and service history
//!
//! Read-side views over the external store: the append-only sales
//! record and the service request feed. Reads never throw; a failed
//! refresh is captured in the per-collection [`SyncStatus`] and the
//! previous snapshot stays served.
//!
//! Change notifications from the backend are coalesced instead of
//! refetched one by one: [`notify_changed`](SalesHistory::notify_changed)
//! only marks a collection dirty, and a later
//! [`flush_dirty`](SalesHistory::flush_dirty) refetches each dirty
//! collection once.

use crate::store::{Collection, RecordStore, StoreResult};
use parking_lot::{Mutex, RwLock};
use shared::models::{Sale, ServiceRequest};
use shared::util::now_millis;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{info, warn};

/// Last refresh outcome of one collection
#[derive(Debug, Clone, Default)]
pub struct SyncStatus {
    /// Records currently held
    pub count: usize,
    /// Error of the last refresh, `None` on success
    pub last_error: Option<String>,
    /// When the last refresh attempt ran (millis)
    pub refreshed_at: i64,
}

/// Read-side history over the external store
pub struct SalesHistory {
    store: Arc<dyn RecordStore>,
    sales: RwLock<Vec<Sale>>,
    service_requests: RwLock<Vec<ServiceRequest>>,
    status: RwLock<HashMap<&'static str, SyncStatus>>,
    dirty: Mutex<HashSet<Collection>>,
}

impl SalesHistory {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            sales: RwLock::new(Vec::new()),
            service_requests: RwLock::new(Vec::new()),
            status: RwLock::new(HashMap::new()),
            dirty: Mutex::new(HashSet::new()),
        }
    }

    pub fn sales(&self) -> Vec<Sale> {
        self.sales.read().clone()
    }

    pub fn service_requests(&self) -> Vec<ServiceRequest> {
        self.service_requests.read().clone()
    }

    /// Last refresh outcome of a collection
    pub fn sync_status(&self, collection: Collection) -> Option<SyncStatus> {
        self.status.read().get(collection.as_str()).cloned()
    }

    /// Mark a collection dirty; the refetch happens on the next flush
    pub fn notify_changed(&self, collection: Collection) {
        self.dirty.lock().insert(collection);
    }

    /// Refetch every dirty collection once
    ///
    /// Returns the collections that were refreshed. Collections this
    /// module does not track are dropped from the dirty set untouched.
    pub async fn flush_dirty(&self) -> Vec<Collection> {
        let dirty: Vec<Collection> = self.dirty.lock().drain().collect();
        let mut refreshed = Vec::new();
        for collection in dirty {
            match collection {
                Collection::Sales | Collection::ServiceRequests => {
                    self.refresh(collection).await;
                    refreshed.push(collection);
                }
                _ => {}
            }
        }
        refreshed
    }

    /// Refetch one collection, recording the outcome
    pub async fn refresh(&self, collection: Collection) {
        match self.store.select(collection).await {
            Ok(records) => {
                let count = match collection {
                    Collection::Sales => {
                        let sales: Vec<Sale> = records
                            .into_iter()
                            .filter_map(|r| parse(collection, r))
                            .collect();
                        let count = sales.len();
                        *self.sales.write() = sales;
                        count
                    }
                    Collection::ServiceRequests => {
                        let requests: Vec<ServiceRequest> = records
                            .into_iter()
                            .filter_map(|r| parse(collection, r))
                            .collect();
                        let count = requests.len();
                        *self.service_requests.write() = requests;
                        count
                    }
                    _ => return,
                };
                self.status.write().insert(
                    collection.as_str(),
                    SyncStatus {
                        count,
                        last_error: None,
                        refreshed_at: now_millis(),
                    },
                );
            }
            Err(e) => {
                warn!(%collection, error = %e, "history refresh failed, keeping previous snapshot");
                let mut status = self.status.write();
                let entry = status.entry(collection.as_str()).or_default();
                entry.last_error = Some(e.to_string());
                entry.refreshed_at = now_millis();
            }
        }
    }

    /// Delete a sale as an explicit correction
    ///
    /// The only mutation history performs; everyday sales are
    /// append-only through settlement.
    pub async fn delete_sale(&self, sale_id: &str) -> StoreResult<()> {
        self.store.delete(Collection::Sales, sale_id).await?;
        self.sales.write().retain(|s| s.sale_id != sale_id);
        info!(sale_id, "sale deleted as correction");
        Ok(())
    }
}

fn parse<T: serde::de::DeserializeOwned>(
    collection: Collection,
    record: serde_json::Value,
) -> Option<T> {
    match serde_json::from_value(record) {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            warn!(%collection, error = %e, "unparseable history record skipped");
            None
        }
    }
}
