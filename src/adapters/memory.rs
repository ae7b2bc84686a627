//! In-memory adapters
//!
//! Process-local implementations of the storage and source ports, used for
//! local runs without PostgreSQL and as collaborators in tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::debug;

use crate::domain::{Order, OrderRepository, OrderSource, SourceMessage};
use crate::error::{Error, Result};

// =============================================================================
// Repository
// =============================================================================

/// In-memory order repository.
///
/// A whole order is stored as one map value, so a save is visible all at
/// once or not at all. The first save of an identifier wins.
#[derive(Debug, Default)]
pub struct InMemoryOrderRepository {
    orders: DashMap<String, Order>,
    reads: AtomicU64,
    writes: AtomicU64,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored orders
    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Read operations served (single and list)
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Save operations attempted, duplicates included
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn get_order(&self, order_uid: &str) -> Result<Order> {
        self.reads.fetch_add(1, Ordering::Relaxed);
        self.orders
            .get(order_uid)
            .map(|order| order.value().clone())
            .ok_or(Error::OrderNotFound)
    }

    async fn get_orders(&self, limit: usize) -> Result<Vec<Order>> {
        self.reads.fetch_add(1, Ordering::Relaxed);

        let mut orders: Vec<Order> = self
            .orders
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        if orders.is_empty() {
            return Err(Error::OrdersNotFound);
        }

        // Newest first, same ordering as the SQL store
        orders.sort_by(|a, b| {
            b.date_created
                .cmp(&a.date_created)
                .then_with(|| a.order_uid.cmp(&b.order_uid))
        });
        orders.truncate(limit);
        Ok(orders)
    }

    async fn save_order(&self, order: &Order) -> Result<()> {
        self.writes.fetch_add(1, Ordering::Relaxed);

        match self.orders.entry(order.order_uid.clone()) {
            Entry::Occupied(_) => {
                debug!(order_uid = %order.order_uid, "Order already stored");
            }
            Entry::Vacant(slot) => {
                slot.insert(order.clone());
            }
        }
        Ok(())
    }
}

// =============================================================================
// Source
// =============================================================================

/// In-memory message source.
///
/// Messages are handed out in push order. Fetched but uncommitted messages
/// stay in flight until [`MemorySource::requeue_uncommitted`] puts them back.
#[derive(Debug, Default)]
pub struct MemorySource {
    queue: Mutex<VecDeque<SourceMessage>>,
    in_flight: DashMap<String, SourceMessage>,
    committed: AtomicUsize,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a raw payload.
    pub fn push(&self, id: impl Into<String>, payload: impl Into<Vec<u8>>) {
        self.queue.lock().push_back(SourceMessage {
            id: id.into(),
            payload: payload.into(),
        });
    }

    /// Enqueue an order in its JSON wire format.
    pub fn push_order(&self, order: &Order) -> Result<()> {
        let payload = serde_json::to_vec(order)?;
        self.push(order.order_uid.clone(), payload);
        Ok(())
    }

    /// Put every in-flight message back at the front of the queue.
    pub fn requeue_uncommitted(&self) -> usize {
        let ids: Vec<String> = self.in_flight.iter().map(|e| e.key().clone()).collect();
        let mut queue = self.queue.lock();
        let mut requeued = 0;
        for id in ids {
            if let Some((_, message)) = self.in_flight.remove(&id) {
                queue.push_front(message);
                requeued += 1;
            }
        }
        requeued
    }

    /// Messages waiting to be fetched
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Messages fetched but not committed
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Messages acknowledged so far
    pub fn committed(&self) -> usize {
        self.committed.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl OrderSource for MemorySource {
    async fn fetch(&self) -> Result<Option<SourceMessage>> {
        let message = self.queue.lock().pop_front();
        if let Some(message) = &message {
            self.in_flight.insert(message.id.clone(), message.clone());
        }
        Ok(message)
    }

    async fn commit(&self, message: &SourceMessage) -> Result<()> {
        if self.in_flight.remove(&message.id).is_some() {
            self.committed.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::fixtures;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn test_get_missing_order() {
        let repo = InMemoryOrderRepository::new();
        assert_matches!(repo.get_order("nope").await, Err(Error::OrderNotFound));
    }

    #[tokio::test]
    async fn test_save_then_get() {
        let repo = InMemoryOrderRepository::new();
        let order = fixtures::order("o1");
        repo.save_order(&order).await.unwrap();

        assert_eq!(repo.get_order("o1").await.unwrap(), order);
    }

    #[tokio::test]
    async fn test_duplicate_save_is_noop() {
        let repo = InMemoryOrderRepository::new();
        repo.save_order(&fixtures::order("o1")).await.unwrap();

        let mut second = fixtures::order("o1");
        second.locale = "ru".to_string();
        repo.save_order(&second).await.unwrap();

        assert_eq!(repo.len(), 1);
        assert_eq!(repo.writes(), 2);
        assert_eq!(repo.get_order("o1").await.unwrap().locale, "en");
    }

    #[tokio::test]
    async fn test_get_orders_empty_store() {
        let repo = InMemoryOrderRepository::new();
        assert_matches!(repo.get_orders(10).await, Err(Error::OrdersNotFound));
    }

    #[tokio::test]
    async fn test_get_orders_newest_first_with_limit() {
        let repo = InMemoryOrderRepository::new();
        for (uid, created) in [
            ("a", "2024-01-01T00:00:00Z"),
            ("b", "2024-03-01T00:00:00Z"),
            ("c", "2024-02-01T00:00:00Z"),
        ] {
            repo.save_order(&fixtures::order_at(uid, created)).await.unwrap();
        }

        let uids: Vec<String> = repo
            .get_orders(2)
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.order_uid)
            .collect();

        assert_eq!(uids, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn test_source_commit_and_requeue() {
        let source = MemorySource::new();
        source.push("m1", b"one".to_vec());
        source.push("m2", b"two".to_vec());

        let first = source.fetch().await.unwrap().unwrap();
        let second = source.fetch().await.unwrap().unwrap();
        assert_eq!(first.id, "m1");
        assert!(source.fetch().await.unwrap().is_none());

        source.commit(&first).await.unwrap();
        assert_eq!(source.committed(), 1);
        assert_eq!(source.in_flight(), 1);

        assert_eq!(source.requeue_uncommitted(), 1);
        let again = source.fetch().await.unwrap().unwrap();
        assert_eq!(again, second);
    }

    #[tokio::test]
    async fn test_push_order_round_trips_payload() {
        let source = MemorySource::new();
        source.push_order(&fixtures::order("o1")).unwrap();

        let message = source.fetch().await.unwrap().unwrap();
        assert_eq!(message.id, "o1");
        assert_eq!(Order::from_json(&message.payload).unwrap(), fixtures::order("o1"));
    }
}
