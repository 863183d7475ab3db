//! Hourly aggregator: streams payload rows into per-hour severity counts.
//!
//! # Preconditions
//!
//! An archive covers a single calendar date and a single host. The date and
//! host are captured from the first well-formed data row and every counted
//! row is keyed under that date. Later rows are **not** checked against it.

use std::collections::BTreeMap;
use std::io::Read;

use serde::Serialize;

use crate::classify::{ColumnIndex, Fields, classify};
use crate::config::MalformedRowPolicy;
use crate::error::{Error, MalformedReason, Result};
use crate::key::{Hour, HourKey};
use crate::record::TrackedSeverity;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Tracked-severity counters for one hour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct HourlyCounts {
    /// `CRITICAL` rows.
    pub critical: u64,
    /// `WARNING` rows.
    pub warning: u64,
}

impl HourlyCounts {
    /// Sum of all tracked counters.
    #[must_use]
    pub const fn total(&self) -> u64 {
        self.critical + self.warning
    }

    fn bump(&mut self, severity: TrackedSeverity) {
        match severity {
            TrackedSeverity::Critical => self.critical += 1,
            TrackedSeverity::Warning => self.warning += 1,
        }
    }
}

/// Row counters for observability. Not used for control flow.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ParseStats {
    /// Data rows read (excluding the header).
    pub total_rows: u64,
    /// Rows with a tracked severity.
    pub tracked_rows: u64,
    /// Malformed rows dropped under [`MalformedRowPolicy::Skip`].
    pub skipped_rows: u64,
}

impl ParseStats {
    /// Percentage of rows that were tracked, if any rows were read.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn filter_ratio(&self) -> Option<f64> {
        (self.total_rows > 0).then(|| self.tracked_rows as f64 / self.total_rows as f64 * 100.0)
    }
}

/// Result of aggregating one payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DayAggregate {
    /// Date seeded from the first row; `None` for an empty payload.
    pub log_date: Option<String>,
    /// Host seeded from the first row.
    pub hostname: Option<String>,
    /// Counts per hour key. Only hours with at least one tracked row appear.
    pub hours: BTreeMap<HourKey, HourlyCounts>,
    /// Row counters.
    pub stats: ParseStats,
}

impl DayAggregate {
    /// Returns true if no hour has any count.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hours.is_empty()
    }

    /// Sum of every counter across all hours.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.hours.values().map(HourlyCounts::total).sum()
    }
}

/// Incremental aggregator, fed one row at a time.
#[derive(Debug)]
pub struct HourlyAggregator {
    policy: MalformedRowPolicy,
    log_date: Option<String>,
    hostname: Option<String>,
    hours: BTreeMap<Hour, HourlyCounts>,
    stats: ParseStats,
}

impl HourlyAggregator {
    /// Creates an empty aggregator.
    #[must_use]
    pub fn new(policy: MalformedRowPolicy) -> Self {
        Self {
            policy,
            log_date: None,
            hostname: None,
            hours: BTreeMap::new(),
            stats: ParseStats::default(),
        }
    }

    /// Feeds one data row.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MalformedRecord`] for a schema violation under
    /// [`MalformedRowPolicy::Abort`].
    pub fn observe<F: Fields + ?Sized>(&mut self, line: u64, row: &F) -> Result<()> {
        self.stats.total_rows += 1;
        match classify(row) {
            Ok(classified) => {
                if self.log_date.is_none() {
                    self.log_date = Some(classified.date.to_string());
                    self.hostname = classified.host.map(str::to_string);
                }
                if let Some(severity) = classified.severity {
                    self.stats.tracked_rows += 1;
                    self.hours.entry(classified.hour).or_default().bump(severity);
                }
                Ok(())
            }
            Err(reason) => self.reject(line, reason),
        }
    }

    fn reject(&mut self, line: u64, reason: MalformedReason) -> Result<()> {
        match self.policy {
            MalformedRowPolicy::Abort => Err(Error::MalformedRecord { line, reason }),
            MalformedRowPolicy::Skip => {
                tracing::warn!(line, %reason, "skipping malformed row");
                self.stats.skipped_rows += 1;
                Ok(())
            }
        }
    }

    /// Finishes aggregation.
    #[must_use]
    pub fn finish(self) -> DayAggregate {
        let hours = match &self.log_date {
            Some(date) => self
                .hours
                .into_iter()
                .map(|(hour, counts)| (HourKey::new(date.clone(), hour), counts))
                .collect(),
            None => BTreeMap::new(),
        };
        DayAggregate {
            log_date: self.log_date,
            hostname: self.hostname,
            hours,
            stats: self.stats,
        }
    }
}

/// Aggregates a whole CSV payload with a header row.
///
/// Rows may have fewer or more fields than the header; a missing trailing
/// column reads as absent. A leading UTF-8 byte-order mark is ignored.
///
/// # Errors
///
/// - [`Error::MalformedRecord`] if the header cannot be decoded, or for a
///   malformed data row under [`MalformedRowPolicy::Abort`].
pub fn aggregate_csv(payload: &[u8], policy: MalformedRowPolicy) -> Result<DayAggregate> {
    let payload = payload.strip_prefix(UTF8_BOM).unwrap_or(payload);
    aggregate_reader(payload, policy)
}

fn aggregate_reader<R: Read>(reader: R, policy: MalformedRowPolicy) -> Result<DayAggregate> {
    let mut csv = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let headers = csv.headers().map_err(|e| Error::MalformedRecord {
        line: 1,
        reason: MalformedReason::Unreadable {
            message: e.to_string(),
        },
    })?;
    let index = ColumnIndex::new(headers);

    let mut aggregator = HourlyAggregator::new(policy);
    let mut record = csv::StringRecord::new();
    loop {
        match csv.read_record(&mut record) {
            Ok(true) => {
                let line = record.position().map_or(0, csv::Position::line);
                let bound = index.bind(&record);
                aggregator.observe(line, &bound)?;
            }
            Ok(false) => break,
            Err(e) => {
                let line = e.position().map_or(0, csv::Position::line);
                aggregator.stats.total_rows += 1;
                aggregator.reject(
                    line,
                    MalformedReason::Unreadable {
                        message: e.to_string(),
                    },
                )?;
            }
        }
    }

    let aggregate = aggregator.finish();
    let ratio = aggregate
        .stats
        .filter_ratio()
        .map_or_else(|| "n/a".to_string(), |r| format!("{r:.1}%"));
    tracing::info!(
        total_rows = aggregate.stats.total_rows,
        tracked_rows = aggregate.stats.tracked_rows,
        skipped_rows = aggregate.stats.skipped_rows,
        filter_ratio = %ratio,
        hours = aggregate.hours.len(),
        "aggregated payload"
    );
    Ok(aggregate)
}
