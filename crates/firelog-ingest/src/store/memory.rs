//! In-memory aggregate store for testing.
//!
//! Not durable and single-process only.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;

use firelog_core::{Error, Result};

use super::{AggregateStore, HourlyAggregate, check_key};
use crate::key::HourKey;

/// In-memory store keyed by [`HourKey`].
#[derive(Debug, Default)]
pub struct InMemoryAggregateStore {
    records: RwLock<BTreeMap<HourKey, HourlyAggregate>>,
}

fn poison_err<T>(_: PoisonError<T>) -> Error {
    Error::storage("lock poisoned")
}

impl InMemoryAggregateStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the record under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn get(&self, key: &HourKey) -> Result<Option<HourlyAggregate>> {
        let records = self.records.read().map_err(poison_err)?;
        Ok(records.get(key).cloned())
    }

    /// Returns the number of stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn len(&self) -> Result<usize> {
        Ok(self.records.read().map_err(poison_err)?.len())
    }

    /// Returns true if nothing is stored.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is poisoned.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

#[async_trait]
impl AggregateStore for InMemoryAggregateStore {
    async fn put(&self, key: &HourKey, record: &HourlyAggregate) -> Result<()> {
        check_key(key, record)?;
        self.records
            .write()
            .map_err(poison_err)?
            .insert(key.clone(), record.clone());
        Ok(())
    }

    async fn query(&self, date: &str) -> Result<Vec<HourlyAggregate>> {
        let records = self.records.read().map_err(poison_err)?;
        Ok(records
            .values()
            .filter(|r| r.log_date == date)
            .cloned()
            .collect())
    }
}
