//! Shared test utilities for firelog integration tests.
//!
//! This crate provides:
//! - [`TracingMemoryBackend`]: in-memory storage with operation recording and
//!   prefix-based failure injection
//! - [`FailingAggregateStore`]: aggregate store that fails selected writes or queries
//! - Fixture builders for CSV payloads, ZIP archives and S3 events
//! - [`DayLogGenerator`]: seeded, reproducible log rows in the production column layout
//!
//! # Example
//!
//! ```rust
//! use firelog_test_utils::{CsvBuilder, log_record, zip_archive};
//! use firelog_ingest::record::Severity;
//!
//! let csv = CsvBuilder::standard()
//!     .record(&log_record("2025-04-28T10:15:30Z", "srx-fw01", Severity::Critical))
//!     .build();
//! let archive = zip_archive(&[("10.csv", &csv[..])]);
//! assert!(!archive.is_empty());
//! ```

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(rust_2018_idioms)]
#![warn(clippy::pedantic)]
#![allow(clippy::must_use_candidate)]
// Test utilities use expect/unwrap for cleaner test code - panics are acceptable in tests
#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::missing_panics_doc)]

pub mod fixtures;
pub mod storage;
pub mod store;

pub use fixtures::*;
pub use storage::*;
pub use store::*;

/// Initialize test logging (call once per test module).
pub fn init_test_logging() {
    use tracing_subscriber::{EnvFilter, fmt};

    let _ = fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("firelog_ingest=debug".parse().expect("valid directive")),
        )
        .with_test_writer()
        .try_init();
}
