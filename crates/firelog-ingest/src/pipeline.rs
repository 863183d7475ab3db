//! The ingestion pipeline: fetch → extract → aggregate → commit → export.
//!
//! Stages run sequentially. The first four are hard: a failure aborts the
//! invocation with an [`InvocationError`]. Export runs only after the commit
//! and is soft: its failure is logged and reported as
//! [`ExportStatus::Failed`], because the authoritative aggregates are
//! already durable and the export can be regenerated.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::Instrument;

use firelog_core::StorageBackend;
use firelog_core::observability::pipeline_span;

use crate::aggregate::{ParseStats, aggregate_csv};
use crate::archive::extract_payload;
use crate::config::PipelineConfig;
use crate::error::{Error, InvocationError, Stage};
use crate::export::{DayExporter, ExportStatus, SkipReason};
use crate::metrics;
use crate::notification::{ArchiveRef, EventNotification};
use crate::source::ArchiveSource;
use crate::store::{AggregateStore, write_aggregates};

/// Summary of a successful invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationOutcome {
    /// The archive that was processed.
    pub archive: ArchiveRef,
    /// Date of the payload; `None` when it had no data rows.
    pub log_date: Option<String>,
    /// Host of the payload.
    pub hostname: Option<String>,
    /// Hourly aggregates committed.
    pub hours_written: usize,
    /// Row counters.
    pub stats: ParseStats,
    /// What happened to the day export.
    pub export: ExportStatus,
}

/// Response body for a successful invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvocationReport {
    /// Human-readable summary.
    pub message: String,
    /// Date of the payload.
    pub log_date: Option<String>,
    /// Hours aggregated by this invocation.
    pub total_hours: usize,
    /// Export outcome.
    pub export: ExportStatus,
}

impl InvocationOutcome {
    /// Builds the response body.
    #[must_use]
    pub fn report(&self) -> InvocationReport {
        InvocationReport {
            message: format!("Successfully processed {}", self.archive.key),
            log_date: self.log_date.clone(),
            total_hours: self.hours_written,
            export: self.export.clone(),
        }
    }
}

/// Pipeline entry point with its service handles injected.
pub struct Pipeline {
    source: Arc<dyn ArchiveSource>,
    store: Arc<dyn AggregateStore>,
    exporter: DayExporter,
    config: PipelineConfig,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("exporter", &self.exporter)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Creates a pipeline.
    ///
    /// `sink` receives day exports under `config.export_prefix`.
    pub fn new(
        source: Arc<dyn ArchiveSource>,
        store: Arc<dyn AggregateStore>,
        sink: Arc<dyn StorageBackend>,
        config: PipelineConfig,
    ) -> Self {
        let exporter = DayExporter::new(Arc::clone(&store), sink, config.export_prefix.clone());
        Self {
            source,
            store,
            exporter,
            config,
        }
    }

    /// Returns the pipeline configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Processes one archive, stamping records with the current time.
    ///
    /// # Errors
    ///
    /// Returns an [`InvocationError`] if fetch, extract, aggregate or commit
    /// fails. Export failures are reported in the outcome instead.
    pub async fn process(&self, archive: &ArchiveRef) -> Result<InvocationOutcome, InvocationError> {
        self.process_at(archive, Utc::now()).await
    }

    /// Processes one archive with a fixed processing timestamp.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::process`].
    pub async fn process_at(
        &self,
        archive: &ArchiveRef,
        processed_at: DateTime<Utc>,
    ) -> Result<InvocationOutcome, InvocationError> {
        let started = Instant::now();
        async {
            tracing::info!("processing archive");
            let result = self.run(archive, processed_at).await;
            let elapsed = started.elapsed().as_secs_f64();
            match &result {
                Ok(outcome) => {
                    metrics::record_invocation("success", elapsed);
                    tracing::info!(
                        log_date = outcome.log_date.as_deref(),
                        hours_written = outcome.hours_written,
                        exported = outcome.export.is_exported(),
                        "archive processed"
                    );
                }
                Err(e) => {
                    metrics::record_invocation(e.stage.as_str(), elapsed);
                    tracing::error!(stage = %e.stage, error = %e.source, "archive processing failed");
                }
            }
            result
        }
        .instrument(pipeline_span(&archive.container, &archive.key))
        .await
    }

    async fn run(
        &self,
        archive: &ArchiveRef,
        processed_at: DateTime<Utc>,
    ) -> Result<InvocationOutcome, InvocationError> {
        let fail = |stage: Stage| {
            move |source: Error| InvocationError {
                archive: archive.to_string(),
                stage,
                source,
            }
        };

        let bytes = self.source.fetch(archive).await.map_err(fail(Stage::Fetch))?;
        let payload = extract_payload(bytes, &self.config.payload_extension)
            .map_err(fail(Stage::Extract))?;
        tracing::debug!(member = %payload.name, size = payload.data.len(), "payload extracted");

        let day = aggregate_csv(&payload.data, self.config.malformed_rows)
            .map_err(fail(Stage::Aggregate))?;
        metrics::record_parse(&day.stats);

        let hours_written = write_aggregates(self.store.as_ref(), &day, processed_at, &archive.key)
            .await
            .map_err(fail(Stage::Commit))?;
        metrics::record_aggregates_written(hours_written);

        let export = match &day.log_date {
            None => {
                tracing::info!("payload has no data rows; export skipped");
                ExportStatus::Skipped {
                    reason: SkipReason::NoData,
                }
            }
            Some(_) if !self.config.export_enabled => ExportStatus::Skipped {
                reason: SkipReason::Disabled,
            },
            Some(date) => {
                self.export_day(date, day.hostname.as_deref(), processed_at)
                    .await
            }
        };

        Ok(InvocationOutcome {
            archive: archive.clone(),
            log_date: day.log_date,
            hostname: day.hostname,
            hours_written,
            stats: day.stats,
            export,
        })
    }

    /// Regenerates the day export for `date` from the store.
    ///
    /// Never fails: a query or write error is logged and returned as
    /// [`ExportStatus::Failed`].
    pub async fn export_day(
        &self,
        date: &str,
        hostname: Option<&str>,
        processed_at: DateTime<Utc>,
    ) -> ExportStatus {
        match self.exporter.export(date, hostname, processed_at).await {
            Ok(receipt) => receipt.into(),
            Err(e) => {
                metrics::record_export_failure();
                tracing::warn!(
                    log_date = date,
                    error = %e,
                    "day export failed; committed aggregates are unaffected"
                );
                ExportStatus::Failed {
                    error: e.to_string(),
                }
            }
        }
    }

    /// Processes every archive of a notification, in order.
    ///
    /// Stops at the first hard failure; archives before it stay processed.
    ///
    /// # Errors
    ///
    /// Returns the first [`InvocationError`].
    pub async fn process_notification(
        &self,
        notification: &EventNotification,
    ) -> Result<Vec<InvocationOutcome>, InvocationError> {
        let mut outcomes = Vec::with_capacity(notification.archives().len());
        for archive in notification.archives() {
            outcomes.push(self.process(archive).await?);
        }
        Ok(outcomes)
    }
}
