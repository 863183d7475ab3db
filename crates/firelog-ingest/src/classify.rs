//! Row classifier: timestamp → hour bucket, severity → counter.
//!
//! Two outcomes are kept apart on purpose:
//! - an **untracked** severity is a normal row with `severity == None`;
//! - a **malformed** row is an error ([`MalformedReason`]).

use std::collections::HashMap;

use csv::StringRecord;

use crate::error::MalformedReason;
use crate::key::Hour;
use crate::record::{COL_HOSTNAME, COL_SEVERITY, COL_TIMESTAMP, TrackedSeverity};

/// Column lookup over one tabular record.
pub trait Fields {
    /// Returns the value of `column`, or `None` if the row has no such column.
    fn field(&self, column: &str) -> Option<&str>;
}

impl Fields for HashMap<String, String> {
    fn field(&self, column: &str) -> Option<&str> {
        self.get(column).map(String::as_str)
    }
}

impl Fields for HashMap<&str, &str> {
    fn field(&self, column: &str) -> Option<&str> {
        self.get(column).copied()
    }
}

/// Header name → column position, built once per payload.
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    positions: HashMap<String, usize>,
}

impl ColumnIndex {
    /// Indexes a header record. On duplicate names the first column wins.
    #[must_use]
    pub fn new(headers: &StringRecord) -> Self {
        let mut positions = HashMap::with_capacity(headers.len());
        for (pos, name) in headers.iter().enumerate() {
            positions.entry(name.to_string()).or_insert(pos);
        }
        Self { positions }
    }

    /// Returns true if the header declares `column`.
    #[must_use]
    pub fn contains(&self, column: &str) -> bool {
        self.positions.contains_key(column)
    }

    /// Binds a data record to this header.
    #[must_use]
    pub fn bind<'a>(&'a self, record: &'a StringRecord) -> IndexedRecord<'a> {
        IndexedRecord {
            index: self,
            record,
        }
    }
}

/// A data record viewed through its header.
#[derive(Debug, Clone, Copy)]
pub struct IndexedRecord<'a> {
    index: &'a ColumnIndex,
    record: &'a StringRecord,
}

impl Fields for IndexedRecord<'_> {
    fn field(&self, column: &str) -> Option<&str> {
        let pos = *self.index.positions.get(column)?;
        self.record.get(pos)
    }
}

/// A row that passed schema checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedRow<'a> {
    /// First 10 characters of the timestamp (`YYYY-MM-DD`).
    pub date: &'a str,
    /// Hour component of the timestamp.
    pub hour: Hour,
    /// `Hostname`, if the row has that column.
    pub host: Option<&'a str>,
    /// Counting bucket; `None` for untracked severities.
    pub severity: Option<TrackedSeverity>,
}

impl ClassifiedRow<'_> {
    /// Returns true if the row contributes to a counter.
    #[must_use]
    pub const fn is_tracked(&self) -> bool {
        self.severity.is_some()
    }
}

/// Classifies one row.
///
/// The timestamp is read positionally from the fixed
/// `YYYY-MM-DDTHH:MM:SSZ` layout: characters 0-9 are the date and
/// characters 11-12 the hour.
///
/// # Errors
///
/// Returns a [`MalformedReason`] if `Timestamp` or `Severity` is absent, the
/// timestamp is shorter than 13 characters, or its hour is not `00..=23`.
pub fn classify<F: Fields + ?Sized>(row: &F) -> Result<ClassifiedRow<'_>, MalformedReason> {
    let timestamp = row
        .field(COL_TIMESTAMP)
        .ok_or(MalformedReason::MissingTimestamp)?;
    if timestamp.len() < 13 {
        return Err(MalformedReason::ShortTimestamp {
            value: timestamp.to_string(),
        });
    }

    let invalid_hour = || MalformedReason::InvalidHour {
        value: timestamp.to_string(),
    };
    let date = timestamp.get(..10).ok_or_else(invalid_hour)?;
    let hour = timestamp
        .get(11..13)
        .and_then(Hour::from_digits)
        .ok_or_else(invalid_hour)?;

    let severity = row
        .field(COL_SEVERITY)
        .ok_or(MalformedReason::MissingSeverity)?;

    Ok(ClassifiedRow {
        date,
        hour,
        host: row.field(COL_HOSTNAME),
        severity: TrackedSeverity::from_column(severity),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row<'a>(pairs: &[(&'a str, &'a str)]) -> HashMap<&'a str, &'a str> {
        pairs.iter().copied().collect()
    }

    #[test]
    fn extracts_date_and_hour() {
        let r = row(&[
            ("Timestamp", "2025-04-28T10:15:30Z"),
            ("Hostname", "srx-fw01"),
            ("Severity", "CRITICAL"),
        ]);
        let c = classify(&r).unwrap();
        assert_eq!(c.date, "2025-04-28");
        assert_eq!(c.hour.to_string(), "10:00");
        assert_eq!(c.host, Some("srx-fw01"));
        assert_eq!(c.severity, Some(TrackedSeverity::Critical));
    }

    #[test]
    fn last_hour_of_day() {
        let r = row(&[
            ("Timestamp", "2025-04-28T23:59:59Z"),
            ("Severity", "WARNING"),
        ]);
        let c = classify(&r).unwrap();
        assert_eq!(c.hour.to_string(), "23:00");
        assert_eq!(c.host, None);
    }

    #[test]
    fn untracked_severity_is_not_an_error() {
        for sev in ["INFO", "NOTICE", "DEBUG", "ERROR", "ALERT", "EMERGENCY", ""] {
            let r = row(&[("Timestamp", "2025-04-28T10:00:00Z"), ("Severity", sev)]);
            let c = classify(&r).unwrap();
            assert!(!c.is_tracked(), "{sev} must be untracked");
        }
    }

    #[test]
    fn missing_severity_is_malformed() {
        let r = row(&[("Timestamp", "2025-04-28T10:00:00Z")]);
        assert_eq!(classify(&r), Err(MalformedReason::MissingSeverity));
    }

    #[test]
    fn missing_or_short_timestamp_is_malformed() {
        let r = row(&[("Severity", "CRITICAL")]);
        assert_eq!(classify(&r), Err(MalformedReason::MissingTimestamp));

        let r = row(&[("Timestamp", "2025-04-28T1"), ("Severity", "CRITICAL")]);
        assert!(matches!(
            classify(&r),
            Err(MalformedReason::ShortTimestamp { .. })
        ));
    }

    #[test]
    fn non_numeric_hour_is_malformed() {
        let r = row(&[("Timestamp", "2025-04-28Txx:00:00Z"), ("Severity", "WARNING")]);
        assert!(matches!(
            classify(&r),
            Err(MalformedReason::InvalidHour { .. })
        ));

        let r = row(&[("Timestamp", "2025-04-28T24:00:00Z"), ("Severity", "WARNING")]);
        assert!(matches!(
            classify(&r),
            Err(MalformedReason::InvalidHour { .. })
        ));
    }

    #[test]
    fn multibyte_timestamp_does_not_panic() {
        let r = row(&[("Timestamp", "2025-04-2éT10:00:00Z"), ("Severity", "WARNING")]);
        assert!(classify(&r).is_err());
    }

    #[test]
    fn indexed_record_reads_by_header() {
        let headers = StringRecord::from(vec!["Severity", "Hostname", "Timestamp"]);
        let index = ColumnIndex::new(&headers);
        let record = StringRecord::from(vec!["WARNING", "srx-fw02", "2025-04-28T11:02:00Z"]);
        let bound = index.bind(&record);
        let c = classify(&bound).unwrap();
        assert_eq!(c.host, Some("srx-fw02"));
        assert_eq!(c.severity, Some(TrackedSeverity::Warning));

        // A short row lacks trailing columns entirely.
        let short = StringRecord::from(vec!["WARNING"]);
        let bound = index.bind(&short);
        assert_eq!(
            classify(&bound),
            Err(MalformedReason::MissingTimestamp)
        );
    }
}
