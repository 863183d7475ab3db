//! Aggregate store with injectable failures.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use firelog_core::{Error, Result};
use firelog_ingest::key::HourKey;
use firelog_ingest::store::{AggregateStore, HourlyAggregate, InMemoryAggregateStore};

/// Wraps an [`InMemoryAggregateStore`] and fails selected operations.
///
/// Failed puts leave the inner store untouched; successful ones land in it.
#[derive(Debug, Default)]
pub struct FailingAggregateStore {
    inner: InMemoryAggregateStore,
    puts: AtomicUsize,
    fail_put_at: Mutex<Option<usize>>,
    fail_keys: Mutex<Vec<HourKey>>,
    fail_queries: Mutex<bool>,
}

impl FailingAggregateStore {
    /// Creates a store that fails nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the put with this zero-based call index (counted across all puts).
    #[must_use]
    pub fn fail_put_at(self, index: usize) -> Self {
        *self.fail_put_at.lock().expect("lock") = Some(index);
        self
    }

    /// Fails every put for `key`.
    #[must_use]
    pub fn fail_key(self, key: HourKey) -> Self {
        self.fail_keys.lock().expect("lock").push(key);
        self
    }

    /// Fails every query.
    #[must_use]
    pub fn fail_queries(self) -> Self {
        *self.fail_queries.lock().expect("lock") = true;
        self
    }

    /// Clears all injected failures.
    pub fn heal(&self) {
        *self.fail_put_at.lock().expect("lock") = None;
        self.fail_keys.lock().expect("lock").clear();
        *self.fail_queries.lock().expect("lock") = false;
    }

    /// Number of put calls seen, failed ones included.
    pub fn put_calls(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    /// The store holding successful writes.
    pub fn inner(&self) -> &InMemoryAggregateStore {
        &self.inner
    }
}

#[async_trait]
impl AggregateStore for FailingAggregateStore {
    async fn put(&self, key: &HourKey, record: &HourlyAggregate) -> Result<()> {
        let index = self.puts.fetch_add(1, Ordering::SeqCst);
        let at_index = *self.fail_put_at.lock().expect("lock") == Some(index);
        let for_key = self.fail_keys.lock().expect("lock").contains(key);
        if at_index || for_key {
            return Err(Error::storage(format!("Injected put failure for {key}")));
        }
        self.inner.put(key, record).await
    }

    async fn query(&self, date: &str) -> Result<Vec<HourlyAggregate>> {
        if *self.fail_queries.lock().expect("lock") {
            return Err(Error::storage(format!("Injected query failure for {date}")));
        }
        self.inner.query(date).await
    }
}
