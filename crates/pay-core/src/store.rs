//! # Store Traits
//!
//! Collaborator seams for order and payment persistence. The engine
//! only ever sees these traits; the in-memory implementations back the
//! demo binary and the tests, a real deployment plugs in its own.
//!
//! Payment records are keyed on `(order_id, remote_id)` so retried
//! checkout sessions for the same order never collide.

use crate::error::{PaymentError, PaymentResult};
use crate::ledger::{LedgerError, PaymentRecord};
use crate::order::Order;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Order persistence seam
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Load an order by id
    async fn load(&self, order_id: &str) -> PaymentResult<Option<Order>>;

    /// Persist an order (status updates included)
    async fn save(&self, order: &Order) -> PaymentResult<()>;
}

/// Payment record persistence seam
#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Find the record for an (order, remote transaction) pair
    async fn find(&self, order_id: &str, remote_id: &str)
        -> PaymentResult<Option<PaymentRecord>>;

    /// Create a new record; fails `DuplicateRecord` if one exists
    async fn create(&self, record: &PaymentRecord) -> PaymentResult<()>;

    /// Persist an updated record
    async fn save(&self, record: &PaymentRecord) -> PaymentResult<()>;
}

/// Shared handles for dynamic dispatch
pub type BoxedOrderStore = Arc<dyn OrderStore>;
pub type BoxedPaymentStore = Arc<dyn PaymentStore>;

/// In-memory order store
#[derive(Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<String, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an order (registration path, tests)
    pub async fn insert(&self, order: Order) {
        self.orders.write().await.insert(order.id.clone(), order);
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn load(&self, order_id: &str) -> PaymentResult<Option<Order>> {
        Ok(self.orders.read().await.get(order_id).cloned())
    }

    async fn save(&self, order: &Order) -> PaymentResult<()> {
        self.orders
            .write()
            .await
            .insert(order.id.clone(), order.clone());
        Ok(())
    }
}

/// In-memory payment store keyed on (order_id, remote_id)
#[derive(Default)]
pub struct InMemoryPaymentStore {
    records: RwLock<HashMap<(String, String), PaymentRecord>>,
}

impl InMemoryPaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records (tests)
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn find(
        &self,
        order_id: &str,
        remote_id: &str,
    ) -> PaymentResult<Option<PaymentRecord>> {
        let key = (order_id.to_string(), remote_id.to_string());
        Ok(self.records.read().await.get(&key).cloned())
    }

    async fn create(&self, record: &PaymentRecord) -> PaymentResult<()> {
        let key = (record.order_id.clone(), record.remote_id.clone());
        let mut records = self.records.write().await;
        if records.contains_key(&key) {
            return Err(PaymentError::Ledger(LedgerError::DuplicateRecord {
                order_id: record.order_id.clone(),
                remote_id: record.remote_id.clone(),
            }));
        }
        records.insert(key, record.clone());
        Ok(())
    }

    async fn save(&self, record: &PaymentRecord) -> PaymentResult<()> {
        let key = (record.order_id.clone(), record.remote_id.clone());
        self.records.write().await.insert(key, record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::PaymentState;
    use crate::money::{Currency, Price};

    fn record(order_id: &str, remote_id: &str) -> PaymentRecord {
        PaymentRecord::new(
            order_id,
            remote_id,
            "approved",
            Price::from_minor(10000, Currency::EUR),
            PaymentState::Completed,
        )
    }

    #[tokio::test]
    async fn test_order_store_round_trip() {
        let store = InMemoryOrderStore::new();
        let order = Order::with_id("42", Price::from_minor(10000, Currency::EUR));
        store.save(&order).await.unwrap();

        let loaded = store.load("42").await.unwrap().unwrap();
        assert_eq!(loaded.id, "42");
        assert!(store.load("43").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_payment_store_duplicate_create() {
        let store = InMemoryPaymentStore::new();
        store.create(&record("42", "P1")).await.unwrap();

        let err = store.create(&record("42", "P1")).await.unwrap_err();
        assert!(matches!(
            err,
            PaymentError::Ledger(LedgerError::DuplicateRecord { .. })
        ));
    }

    #[tokio::test]
    async fn test_payment_store_keyed_per_transaction() {
        let store = InMemoryPaymentStore::new();
        store.create(&record("42", "P1")).await.unwrap();
        // Same order, different gateway transaction: distinct record
        store.create(&record("42", "P2")).await.unwrap();

        assert_eq!(store.len().await, 2);
        assert!(store.find("42", "P1").await.unwrap().is_some());
        assert!(store.find("42", "P3").await.unwrap().is_none());
    }
}
