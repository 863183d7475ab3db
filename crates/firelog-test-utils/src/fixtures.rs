//! Pre-built test fixtures: CSV payloads, ZIP archives, S3 events and a
//! seeded day-log generator.

use std::io::{Cursor, Write};

use bytes::Bytes;
use chrono::{NaiveDate, NaiveTime, TimeDelta};
use firelog_ingest::record::{COLUMNS, LogRecord, LogType, Severity};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use zip::write::SimpleFileOptions;

/// Builds a log record with plausible defaults for the unused columns.
pub fn log_record(timestamp: &str, hostname: &str, severity: Severity) -> LogRecord {
    let threat = severity.tracked().is_some();
    LogRecord {
        timestamp: timestamp.to_string(),
        hostname: hostname.to_string(),
        app_name: if threat { "RT_IDP" } else { "RT_FLOW" }.to_string(),
        severity_level: severity.level(),
        severity,
        log_type: if threat { LogType::Threat } else { LogType::Normal },
        message: format!("test message Severity={}", severity.as_str()),
    }
}

/// Builder for CSV payloads.
///
/// Rows are written with a flexible writer, so malformed rows with missing
/// or extra fields can be mixed with well-formed ones.
#[derive(Debug, Clone)]
pub struct CsvBuilder {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl CsvBuilder {
    /// A payload with the standard seven-column header.
    pub fn standard() -> Self {
        Self::with_header(&COLUMNS)
    }

    /// A payload with a custom header.
    pub fn with_header(columns: &[&str]) -> Self {
        Self {
            header: columns.iter().map(ToString::to_string).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a full record in the standard column order.
    #[must_use]
    pub fn record(mut self, record: &LogRecord) -> Self {
        self.rows.push(vec![
            record.timestamp.clone(),
            record.hostname.clone(),
            record.app_name.clone(),
            record.severity_level.to_string(),
            record.severity.as_str().to_string(),
            match record.log_type {
                LogType::Normal => "NORMAL",
                LogType::Threat => "THREAT",
            }
            .to_string(),
            record.message.clone(),
        ]);
        self
    }

    /// Appends many records.
    #[must_use]
    pub fn records<'a>(self, records: impl IntoIterator<Item = &'a LogRecord>) -> Self {
        records.into_iter().fold(self, CsvBuilder::record)
    }

    /// Appends `count` copies of a standard row.
    #[must_use]
    pub fn repeat(self, count: usize, timestamp: &str, hostname: &str, severity: Severity) -> Self {
        let record = log_record(timestamp, hostname, severity);
        (0..count).fold(self, |b, _| b.record(&record))
    }

    /// Appends raw fields as-is.
    #[must_use]
    pub fn raw(mut self, fields: &[&str]) -> Self {
        self.rows
            .push(fields.iter().map(ToString::to_string).collect());
        self
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if there are no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Renders the payload.
    pub fn build(&self) -> Vec<u8> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_writer(Vec::new());
        writer.write_record(&self.header).expect("write header");
        for row in &self.rows {
            writer.write_record(row).expect("write row");
        }
        writer.into_inner().expect("flush csv")
    }
}

/// Packs members into a deflated ZIP archive, in the given order.
pub fn zip_archive(members: &[(&str, &[u8])]) -> Bytes {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
    for (name, data) in members {
        writer.start_file(*name, options).expect("start zip member");
        writer.write_all(data).expect("write zip member");
    }
    Bytes::from(writer.finish().expect("finish zip").into_inner())
}

/// An S3 `ObjectCreated:Put` event document for one object.
pub fn s3_event(bucket: &str, key: &str) -> Vec<u8> {
    s3_event_many(&[(bucket, key)])
}

/// An S3 event document with one record per `(bucket, key)`.
pub fn s3_event_many(objects: &[(&str, &str)]) -> Vec<u8> {
    let records: Vec<serde_json::Value> = objects
        .iter()
        .map(|(bucket, key)| {
            serde_json::json!({
                "eventVersion": "2.1",
                "eventSource": "aws:s3",
                "eventName": "ObjectCreated:Put",
                "s3": {
                    "bucket": { "name": bucket, "arn": format!("arn:aws:s3:::{bucket}") },
                    "object": { "key": key, "size": 1024 }
                }
            })
        })
        .collect();
    serde_json::to_vec(&serde_json::json!({ "Records": records })).expect("event json")
}

/// Seeded generator for one host's day of logs.
///
/// Rows follow the production generator's shape: a share of rows are threats
/// (30% `CRITICAL`, 70% `WARNING`); the rest are `INFO` or `NOTICE` traffic.
/// The same seed always yields the same rows.
#[derive(Debug)]
pub struct DayLogGenerator {
    date: NaiveDate,
    hostname: String,
    threat_ratio: f64,
    rng: StdRng,
}

impl DayLogGenerator {
    /// Creates a generator with a 10% threat ratio.
    pub fn new(date: NaiveDate, hostname: impl Into<String>, seed: u64) -> Self {
        Self {
            date,
            hostname: hostname.into(),
            threat_ratio: 0.1,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Sets the share of threat rows, `0.0..=1.0`.
    #[must_use]
    pub fn threat_ratio(mut self, ratio: f64) -> Self {
        self.threat_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    /// The date as `YYYY-MM-DD`.
    pub fn date(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Generates `rows` records with timestamps inside `hour`.
    pub fn hour(&mut self, hour: u32, rows: usize) -> Vec<LogRecord> {
        let base = self
            .date
            .and_time(NaiveTime::from_hms_opt(hour, 0, 0).expect("hour in 0..24"));
        (0..rows)
            .map(|_| {
                let offset = TimeDelta::seconds(self.rng.gen_range(0..3600));
                let timestamp = (base + offset).format("%Y-%m-%dT%H:%M:%SZ").to_string();
                let (severity, app_name, log_type, message) =
                    if self.rng.r#gen::<f64>() < self.threat_ratio {
                        let severity = if self.rng.r#gen::<f64>() < 0.3 {
                            Severity::Critical
                        } else {
                            Severity::Warning
                        };
                        let app = if self.rng.gen_bool(0.5) { "RT_SCREEN" } else { "RT_IDP" };
                        (severity, app, LogType::Threat, "RT_IDP_ATTACK_LOG: Port scan detected")
                    } else {
                        let severity = if self.rng.gen_bool(0.5) {
                            Severity::Info
                        } else {
                            Severity::Notice
                        };
                        (severity, "RT_FLOW", LogType::Normal, "RT_FLOW_SESSION_CREATE: session created")
                    };
                LogRecord {
                    timestamp,
                    hostname: self.hostname.clone(),
                    app_name: app_name.to_string(),
                    severity_level: severity.level(),
                    severity,
                    log_type,
                    message: format!(
                        "{message} protocol=tcp SeverityLevel={} Severity={}",
                        severity.level(),
                        severity.as_str()
                    ),
                }
            })
            .collect()
    }

    /// Generates `rows_per_hour` records for every hour of the day.
    pub fn day(&mut self, rows_per_hour: usize) -> Vec<LogRecord> {
        (0..24).flat_map(|h| self.hour(h, rows_per_hour)).collect()
    }
}
