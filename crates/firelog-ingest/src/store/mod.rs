//! Durable key-value store for hourly aggregates.
//!
//! ## Semantics
//!
//! - **Full replace**: `put` overwrites the whole record for its key. Nothing
//!   is merged or incremented, so reprocessing an archive is idempotent and
//!   overlapping archives overwrite each other.
//! - **Per-key atomicity only**: there are no cross-key transactions; a batch
//!   may be partially written.
//! - **Last writer wins** for concurrent writes to the same key.

pub mod memory;
pub mod object;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use firelog_core::Result;

use crate::aggregate::{DayAggregate, HourlyCounts};
use crate::error::Error;
use crate::key::{Hour, HourKey};

pub use memory::InMemoryAggregateStore;
pub use object::ObjectAggregateStore;

/// One persisted hour of counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourlyAggregate {
    /// Calendar day, `YYYY-MM-DD`.
    pub log_date: String,
    /// Hour of day, serialized as `HH:00`.
    pub hour: Hour,
    /// `CRITICAL` rows.
    pub critical_count: u64,
    /// `WARNING` rows.
    pub warning_count: u64,
    /// `critical_count + warning_count`.
    pub total_count: u64,
    /// Host seeded from the archive.
    pub hostname: Option<String>,
    /// When the archive was processed.
    pub processed_at: DateTime<Utc>,
    /// Key of the archive that produced this record.
    pub file_name: String,
}

impl HourlyAggregate {
    /// Builds a record from counts, deriving the total.
    #[must_use]
    pub fn new(
        key: &HourKey,
        counts: HourlyCounts,
        hostname: Option<String>,
        processed_at: DateTime<Utc>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            log_date: key.date.clone(),
            hour: key.hour,
            critical_count: counts.critical,
            warning_count: counts.warning,
            total_count: counts.total(),
            hostname,
            processed_at,
            file_name: file_name.into(),
        }
    }

    /// Returns this record's key.
    #[must_use]
    pub fn key(&self) -> HourKey {
        HourKey::new(self.log_date.clone(), self.hour)
    }
}

/// Storage abstraction for hourly aggregates.
///
/// Implementations must provide an atomic replace for a single key.
#[async_trait]
pub trait AggregateStore: Send + Sync {
    /// Replaces the record stored under `key`.
    ///
    /// Returns `Error::InvalidInput` if `record` does not belong to `key`.
    async fn put(&self, key: &HourKey, record: &HourlyAggregate) -> Result<()>;

    /// Returns every record whose date is `date`, in no particular order.
    async fn query(&self, date: &str) -> Result<Vec<HourlyAggregate>>;
}

pub(crate) fn check_key(key: &HourKey, record: &HourlyAggregate) -> Result<()> {
    if record.log_date == key.date && record.hour == key.hour {
        Ok(())
    } else {
        Err(firelog_core::Error::InvalidInput(format!(
            "record {} stored under key {key}",
            record.key()
        )))
    }
}

/// Writes one record per hour of `day`, in hour order.
///
/// Writes are sequential and independent: a failure stops the batch but the
/// keys already written stay written. An empty aggregate performs no writes.
/// Returns the number of records written.
///
/// # Errors
///
/// Returns [`Error::StoreWrite`] naming the key that failed and how far the
/// batch got.
pub async fn write_aggregates<S: AggregateStore + ?Sized>(
    store: &S,
    day: &DayAggregate,
    processed_at: DateTime<Utc>,
    file_name: &str,
) -> crate::error::Result<usize> {
    let total = day.hours.len();
    let mut written = 0;
    for (key, counts) in &day.hours {
        let record = HourlyAggregate::new(
            key,
            *counts,
            day.hostname.clone(),
            processed_at,
            file_name,
        );
        store
            .put(key, &record)
            .await
            .map_err(|source| Error::StoreWrite {
                key: key.clone(),
                written,
                total,
                source,
            })?;
        tracing::debug!(%key, total = record.total_count, "aggregate written");
        written += 1;
    }
    Ok(written)
}
