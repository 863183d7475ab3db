//! Error types for the ingestion pipeline.
//!
//! [`Error`] is the stage-level taxonomy. Hard failures leave the pipeline as
//! an [`InvocationError`], which adds the archive and the stage that failed.

use std::fmt;

use serde::Serialize;

use crate::key::HourKey;

/// The result type used throughout firelog-ingest.
pub type Result<T> = std::result::Result<T, Error>;

/// Why a row violates the tabular schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedReason {
    /// The `Timestamp` column is absent from the row.
    #[error("missing Timestamp column")]
    MissingTimestamp,

    /// The timestamp is too short to carry an hour component.
    #[error("timestamp '{value}' is shorter than 13 characters")]
    ShortTimestamp {
        /// The offending value.
        value: String,
    },

    /// Characters 11-12 of the timestamp are not an hour in `00..=23`.
    #[error("timestamp '{value}' has no valid hour at positions 11-12")]
    InvalidHour {
        /// The offending value.
        value: String,
    },

    /// The `Severity` column is absent from the row.
    #[error("missing Severity column")]
    MissingSeverity,

    /// The row could not be decoded at all (e.g. invalid UTF-8).
    #[error("unreadable row: {message}")]
    Unreadable {
        /// Decoder message.
        message: String,
    },
}

/// Errors that can occur in pipeline stages.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The input bytes are not a readable archive.
    #[error("archive format error: {message}")]
    ArchiveFormat {
        /// Description of the failure.
        message: String,
        /// The underlying cause, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The archive holds no member with the payload extension.
    #[error("no archive member ending in '{extension}'")]
    PayloadNotFound {
        /// The extension that was searched for.
        extension: String,
    },

    /// A row violates the tabular schema.
    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord {
        /// 1-based line number in the payload.
        line: u64,
        /// What was wrong with the row.
        reason: MalformedReason,
    },

    /// Fetching the archive from the object store failed.
    #[error("failed to fetch {container}/{key}: {source}")]
    Fetch {
        /// Container (bucket) name.
        container: String,
        /// Object key.
        key: String,
        /// Storage cause; `NotFound` when the archive is missing.
        #[source]
        source: firelog_core::Error,
    },

    /// Writing one aggregate failed. Earlier keys stay written.
    #[error("failed to write aggregate {key} after {written} of {total} writes: {source}")]
    StoreWrite {
        /// Key whose write failed.
        key: HourKey,
        /// Aggregates written before the failure.
        written: usize,
        /// Aggregates in the batch.
        total: usize,
        /// Storage cause.
        #[source]
        source: firelog_core::Error,
    },

    /// Reading back aggregates for a date failed.
    #[error("failed to query aggregates for {date}: {source}")]
    StoreQuery {
        /// Date that was queried.
        date: String,
        /// Storage cause.
        #[source]
        source: firelog_core::Error,
    },

    /// Writing the day export failed.
    #[error("failed to write export {path}: {source}")]
    ExportWrite {
        /// Export path.
        path: String,
        /// Storage cause.
        #[source]
        source: firelog_core::Error,
    },

    /// A trigger notification could not be interpreted.
    #[error("invalid notification: {message}")]
    InvalidNotification {
        /// Description of the problem.
        message: String,
    },

    /// Pipeline wiring is invalid (e.g. an unknown container).
    #[error("configuration error: {message}")]
    Configuration {
        /// Description of the problem.
        message: String,
    },

    /// A JSON document could not be produced or read.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Creates an archive format error with a source cause.
    #[must_use]
    pub fn archive_format(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ArchiveFormat {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Returns true if the failure is a missing input object.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Fetch { source, .. } if source.is_not_found())
    }
}

/// Pipeline stage, used to attribute hard failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Reading the archive from the object store.
    Fetch,
    /// Opening the archive and locating the payload.
    Extract,
    /// Parsing and counting rows.
    Aggregate,
    /// Writing hourly aggregates to the durable store.
    Commit,
}

impl Stage {
    /// Returns the stage name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetch => "fetch",
            Self::Extract => "extract",
            Self::Aggregate => "aggregate",
            Self::Commit => "commit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A hard failure of one invocation.
#[derive(Debug, thiserror::Error)]
#[error("{stage} stage failed for {archive}: {source}")]
pub struct InvocationError {
    /// `container/key` of the archive being processed.
    pub archive: String,
    /// Stage that failed.
    pub stage: Stage,
    /// Stage error.
    #[source]
    pub source: Error,
}
