//! Aggregate store over object storage.
//!
//! Each record is one JSON document at
//! `aggregates/date={date}/hour={HH}.json`, so a put is a single-object
//! replace and a date query is a prefix listing.

use async_trait::async_trait;
use bytes::Bytes;

use firelog_core::{FirelogPaths, PutOptions, Result, StorageBackend};

use super::{AggregateStore, HourlyAggregate, check_key};
use crate::key::HourKey;

/// Aggregate store persisting records through a [`StorageBackend`].
#[derive(Debug, Clone)]
pub struct ObjectAggregateStore<B> {
    backend: B,
}

impl<B: StorageBackend> ObjectAggregateStore<B> {
    /// Creates a store rooted at the backend's root.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self { backend }
    }

    /// Returns the underlying backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

#[async_trait]
impl<B: StorageBackend> AggregateStore for ObjectAggregateStore<B> {
    async fn put(&self, key: &HourKey, record: &HourlyAggregate) -> Result<()> {
        check_key(key, record)?;
        let path = FirelogPaths::aggregate(&key.date, &key.hour.to_string());
        let body = serde_json::to_vec(record)?;
        self.backend
            .put(&path, Bytes::from(body), PutOptions::json())
            .await
    }

    async fn query(&self, date: &str) -> Result<Vec<HourlyAggregate>> {
        let prefix = FirelogPaths::aggregate_date_dir(date);
        let mut listed = self.backend.list(&prefix).await?;
        listed.sort_by(|a, b| a.path.cmp(&b.path));

        let mut records = Vec::with_capacity(listed.len());
        for meta in listed {
            let body = match self.backend.get(&meta.path).await {
                Ok(body) => body,
                // Deleted between list and get.
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            };
            let record: HourlyAggregate = serde_json::from_slice(&body)?;
            if record.log_date == date {
                records.push(record);
            }
        }
        Ok(records)
    }
}
