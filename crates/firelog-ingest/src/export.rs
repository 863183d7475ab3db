//! Day exporter: re-materializes a full day of aggregates as one JSON document.
//!
//! The export is always rebuilt from every stored record of its date, never
//! patched, so it can be regenerated at any time from the store alone.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::Instrument;

use firelog_core::observability::export_span;
use firelog_core::{FirelogPaths, PutOptions, StorageBackend};

use crate::error::{Error, Result};
use crate::key::Hour;
use crate::store::{AggregateStore, HourlyAggregate};

/// One hour row of a [`DayExport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourSummary {
    /// `HH:00`.
    pub hour: Hour,
    /// `CRITICAL` rows.
    pub critical: u64,
    /// `WARNING` rows.
    pub warning: u64,
    /// Sum of tracked counters.
    pub total: u64,
}

impl From<&HourlyAggregate> for HourSummary {
    fn from(record: &HourlyAggregate) -> Self {
        Self {
            hour: record.hour,
            critical: record.critical_count,
            warning: record.warning_count,
            total: record.total_count,
        }
    }
}

/// The per-day document consumed downstream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayExport {
    /// `YYYY-MM-DD`.
    pub log_date: String,
    /// Host, or `null` if unknown.
    pub hostname: Option<String>,
    /// Generation timestamp, RFC 3339 with microseconds.
    pub processed_at: String,
    /// Number of entries in `hourly_stats`.
    pub total_hours: usize,
    /// Hour-ascending summaries.
    pub hourly_stats: Vec<HourSummary>,
}

impl DayExport {
    /// Builds the document from a date's records, sorting them by hour.
    ///
    /// When `hostname` is `None` the host of the earliest stored hour is used.
    #[must_use]
    pub fn build(
        log_date: &str,
        hostname: Option<&str>,
        processed_at: DateTime<Utc>,
        mut records: Vec<HourlyAggregate>,
    ) -> Self {
        records.sort_by_key(|r| r.hour);
        let hostname = hostname
            .map(str::to_string)
            .or_else(|| records.iter().find_map(|r| r.hostname.clone()));
        let hourly_stats: Vec<HourSummary> = records.iter().map(HourSummary::from).collect();
        Self {
            log_date: log_date.to_string(),
            hostname,
            processed_at: processed_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            total_hours: hourly_stats.len(),
            hourly_stats,
        }
    }

    /// Renders the document as pretty-printed UTF-8 JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// Where an export landed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExportReceipt {
    /// Object path of the document.
    pub path: String,
    /// Hours in the document.
    pub total_hours: usize,
}

/// Why no export was attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The payload had no data rows, so there is no date to export.
    NoData,
    /// Exports are turned off in configuration.
    Disabled,
}

/// Outcome of the export step, reported next to the commit summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExportStatus {
    /// The document was written.
    Exported {
        /// Object path of the document.
        path: String,
        /// Hours in the document.
        total_hours: usize,
    },
    /// No export was attempted.
    Skipped {
        /// Why.
        reason: SkipReason,
    },
    /// The query or the write failed. Committed aggregates are unaffected.
    Failed {
        /// Rendered error.
        error: String,
    },
}

impl ExportStatus {
    /// Returns true if the export was written.
    #[must_use]
    pub const fn is_exported(&self) -> bool {
        matches!(self, Self::Exported { .. })
    }
}

impl From<ExportReceipt> for ExportStatus {
    fn from(receipt: ExportReceipt) -> Self {
        Self::Exported {
            path: receipt.path,
            total_hours: receipt.total_hours,
        }
    }
}

/// Reads a day from the aggregate store and writes its export.
#[derive(Clone)]
pub struct DayExporter {
    store: Arc<dyn AggregateStore>,
    sink: Arc<dyn StorageBackend>,
    prefix: String,
}

impl std::fmt::Debug for DayExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DayExporter")
            .field("prefix", &self.prefix)
            .finish_non_exhaustive()
    }
}

impl DayExporter {
    /// Creates an exporter writing under `prefix` in `sink`.
    pub fn new(
        store: Arc<dyn AggregateStore>,
        sink: Arc<dyn StorageBackend>,
        prefix: impl Into<String>,
    ) -> Self {
        Self {
            store,
            sink,
            prefix: prefix.into(),
        }
    }

    /// Returns the path the export for `date` is written to.
    #[must_use]
    pub fn path_for(&self, date: &str) -> String {
        FirelogPaths::day_export(&self.prefix, date)
    }

    /// Regenerates the export for `date`, fully overwriting any previous one.
    ///
    /// # Errors
    ///
    /// - [`Error::StoreQuery`] if the records cannot be read back.
    /// - [`Error::ExportWrite`] if the document cannot be written.
    pub async fn export(
        &self,
        date: &str,
        hostname: Option<&str>,
        processed_at: DateTime<Utc>,
    ) -> Result<ExportReceipt> {
        async {
            let records = self
                .store
                .query(date)
                .await
                .map_err(|source| Error::StoreQuery {
                    date: date.to_string(),
                    source,
                })?;

            let export = DayExport::build(date, hostname, processed_at, records);
            let body = export.to_json()?;
            let path = self.path_for(date);
            self.sink
                .put(&path, Bytes::from(body), PutOptions::json())
                .await
                .map_err(|source| Error::ExportWrite {
                    path: path.clone(),
                    source,
                })?;

            tracing::info!(%path, total_hours = export.total_hours, "day export written");
            Ok(ExportReceipt {
                path,
                total_hours: export.total_hours,
            })
        }
        .instrument(export_span(date))
        .await
    }
}
