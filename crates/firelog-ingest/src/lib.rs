//! # firelog-ingest
//!
//! Turns compressed firewall log batches into hourly severity counts.
//!
//! An invocation fetches a ZIP archive, extracts its CSV payload, counts
//! `CRITICAL` and `WARNING` rows per hour, replaces one
//! [`HourlyAggregate`](store::HourlyAggregate) per `(date, hour)` in the
//! aggregate store, and then regenerates the per-day JSON export at
//! `data/{date}.json`.
//!
//! ## Failure model
//!
//! Fetch, extract, aggregate and commit are hard stages and fail the
//! invocation with an [`InvocationError`]. Export is soft: it is reported as
//! [`ExportStatus::Failed`] while the invocation still succeeds.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use firelog_core::MemoryBackend;
//! use firelog_ingest::prelude::*;
//!
//! # async fn example() -> std::result::Result<(), InvocationError> {
//! let pipeline = Pipeline::new(
//!     Arc::new(Containers::new().with_container("syslog-input", MemoryBackend::new())),
//!     Arc::new(InMemoryAggregateStore::new()),
//!     Arc::new(MemoryBackend::new()),
//!     PipelineConfig::default(),
//! );
//! let outcome = pipeline
//!     .process(&ArchiveRef::new("syslog-input", "raw/2025-04-28/10.zip"))
//!     .await?;
//! println!("{}", outcome.report().message);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod aggregate;
pub mod archive;
pub mod classify;
pub mod config;
pub mod error;
pub mod export;
pub mod key;
pub mod metrics;
pub mod notification;
pub mod pipeline;
pub mod record;
pub mod source;
pub mod store;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::aggregate::{DayAggregate, HourlyCounts, ParseStats, aggregate_csv};
    pub use crate::config::{MalformedRowPolicy, PipelineConfig};
    pub use crate::error::{Error, InvocationError, Result, Stage};
    pub use crate::export::{DayExport, DayExporter, ExportStatus, HourSummary, SkipReason};
    pub use crate::key::{Hour, HourKey};
    pub use crate::notification::{ArchiveRef, EventNotification};
    pub use crate::pipeline::{InvocationOutcome, InvocationReport, Pipeline};
    pub use crate::source::{ArchiveSource, Containers};
    pub use crate::store::{
        AggregateStore, HourlyAggregate, InMemoryAggregateStore, ObjectAggregateStore,
    };
}

pub use error::{Error, InvocationError, Result, Stage};
pub use export::ExportStatus;
pub use pipeline::{InvocationOutcome, Pipeline};
