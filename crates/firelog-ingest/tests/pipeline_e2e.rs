//! End-to-end pipeline tests over in-memory services.
//!
//! Each test wires a [`Pipeline`] to a tracing input container, an in-memory
//! aggregate store and a tracing export sink, then drives it with real ZIP
//! archives built from CSV fixtures.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use firelog_core::{MemoryBackend, ObjectStoreBackend};
use firelog_ingest::prelude::*;
use firelog_ingest::record::Severity;
use firelog_test_utils::{
    CsvBuilder, DayLogGenerator, TracingMemoryBackend, init_test_logging, s3_event_many,
    zip_archive,
};

const CONTAINER: &str = "syslog-input";
const DATE: &str = "2025-04-28";
const HOST: &str = "srx-fw01";

struct Harness {
    input: TracingMemoryBackend,
    store: Arc<InMemoryAggregateStore>,
    sink: TracingMemoryBackend,
    pipeline: Pipeline,
}

impl Harness {
    fn new(config: PipelineConfig) -> Self {
        init_test_logging();
        let input = TracingMemoryBackend::new();
        let store = Arc::new(InMemoryAggregateStore::new());
        let sink = TracingMemoryBackend::new();
        let pipeline = Pipeline::new(
            Arc::new(Containers::new().with_container(CONTAINER, input.clone())),
            store.clone(),
            Arc::new(sink.clone()),
            config,
        );
        Self {
            input,
            store,
            sink,
            pipeline,
        }
    }

    fn upload(&self, key: &str, csv: &CsvBuilder) -> ArchiveRef {
        let payload = csv.build();
        self.input.seed(key, zip_archive(&[("syslog.csv", &payload[..])]));
        ArchiveRef::new(CONTAINER, key)
    }

    fn export(&self) -> DayExport {
        let body = self
            .sink
            .object(&format!("data/{DATE}.json"))
            .expect("export written");
        serde_json::from_slice(&body).unwrap()
    }

    fn record(&self, hour: u8) -> HourlyAggregate {
        self.store
            .get(&HourKey::new(DATE, Hour::new(hour).unwrap()))
            .unwrap()
            .expect("record present")
    }
}

fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, 28, 12, 5, 0).unwrap()
}

fn reference_day() -> CsvBuilder {
    CsvBuilder::standard()
        .repeat(5, "2025-04-28T10:15:30Z", HOST, Severity::Critical)
        .repeat(3, "2025-04-28T11:45:00Z", HOST, Severity::Warning)
        .repeat(4, "2025-04-28T10:20:00Z", HOST, Severity::Info)
        .repeat(2, "2025-04-28T11:00:00Z", HOST, Severity::Notice)
}

#[tokio::test]
async fn reference_day_produces_two_hours() {
    let h = Harness::new(PipelineConfig::default());
    let archive = h.upload("raw/2025-04-28/10.zip", &reference_day());

    let outcome = h.pipeline.process_at(&archive, fixed_time()).await.unwrap();
    assert_eq!(outcome.log_date.as_deref(), Some(DATE));
    assert_eq!(outcome.hostname.as_deref(), Some(HOST));
    assert_eq!(outcome.hours_written, 2);
    assert_eq!(outcome.stats.total_rows, 14);
    assert_eq!(outcome.stats.tracked_rows, 8);

    let ten = h.record(10);
    assert_eq!(
        (ten.hour.to_string().as_str(), ten.critical_count, ten.warning_count, ten.total_count),
        ("10:00", 5, 0, 5)
    );
    assert_eq!(ten.hostname.as_deref(), Some(HOST));
    assert_eq!(ten.file_name, "raw/2025-04-28/10.zip");
    assert_eq!(ten.processed_at, fixed_time());

    let eleven = h.record(11);
    assert_eq!(
        (eleven.hour.to_string().as_str(), eleven.critical_count, eleven.warning_count, eleven.total_count),
        ("11:00", 0, 3, 3)
    );

    let export = h.export();
    assert_eq!(export.log_date, DATE);
    assert_eq!(export.hostname.as_deref(), Some(HOST));
    assert_eq!(export.total_hours, 2);
    assert_eq!(
        export.hourly_stats,
        vec![
            HourSummary {
                hour: Hour::new(10).unwrap(),
                critical: 5,
                warning: 0,
                total: 5
            },
            HourSummary {
                hour: Hour::new(11).unwrap(),
                critical: 0,
                warning: 3,
                total: 3
            },
        ]
    );

    let report = serde_json::to_value(outcome.report()).unwrap();
    assert_eq!(
        report,
        serde_json::json!({
            "message": "Successfully processed raw/2025-04-28/10.zip",
            "log_date": DATE,
            "total_hours": 2,
            "export": {"status": "exported", "path": "data/2025-04-28.json", "total_hours": 2}
        })
    );
}

#[tokio::test]
async fn reprocessing_is_byte_identical() {
    let h = Harness::new(PipelineConfig::default());
    let archive = h.upload("raw/2025-04-28/10.zip", &reference_day());

    h.pipeline.process_at(&archive, fixed_time()).await.unwrap();
    let first = h.sink.object("data/2025-04-28.json").unwrap();
    let mut first_records = h.store.query(DATE).await.unwrap();

    h.pipeline.process_at(&archive, fixed_time()).await.unwrap();
    let second = h.sink.object("data/2025-04-28.json").unwrap();

    assert_eq!(first, second);
    assert_eq!(h.store.len().unwrap(), 2);
    let mut second_records = h.store.query(DATE).await.unwrap();
    first_records.sort_by_key(|r| r.hour);
    second_records.sort_by_key(|r| r.hour);
    assert_eq!(first_records, second_records);
}

#[tokio::test]
async fn header_only_payload_writes_nothing() {
    let h = Harness::new(PipelineConfig::default());
    let archive = h.upload("raw/2025-04-28/empty.zip", &CsvBuilder::standard());

    let outcome = h.pipeline.process_at(&archive, fixed_time()).await.unwrap();
    assert_eq!(outcome.hours_written, 0);
    assert_eq!(outcome.log_date, None);
    assert_eq!(
        outcome.export,
        ExportStatus::Skipped {
            reason: SkipReason::NoData
        }
    );
    assert!(h.store.is_empty().unwrap());
    assert!(h.sink.operations().is_empty(), "no export attempt");
    assert_eq!(outcome.report().total_hours, 0);
}

#[tokio::test]
async fn untracked_only_payload_reexports_existing_day() {
    let h = Harness::new(PipelineConfig::default());
    let first = h.upload("raw/2025-04-28/10.zip", &reference_day());
    h.pipeline.process_at(&first, fixed_time()).await.unwrap();

    let quiet = CsvBuilder::standard().repeat(10, "2025-04-28T14:00:00Z", HOST, Severity::Info);
    let second = h.upload("raw/2025-04-28/14.zip", &quiet);
    let outcome = h.pipeline.process_at(&second, fixed_time()).await.unwrap();

    assert_eq!(outcome.hours_written, 0);
    assert_eq!(outcome.stats.tracked_rows, 0);
    assert!(outcome.export.is_exported());
    assert_eq!(h.export().total_hours, 2);
}

#[tokio::test]
async fn overlapping_archives_overwrite_counts() {
    let h = Harness::new(PipelineConfig::default());
    let a = h.upload(
        "raw/a.zip",
        &CsvBuilder::standard().repeat(5, "2025-04-28T10:00:00Z", HOST, Severity::Critical),
    );
    let b = h.upload(
        "raw/b.zip",
        &CsvBuilder::standard().repeat(2, "2025-04-28T10:30:00Z", HOST, Severity::Critical),
    );

    h.pipeline.process_at(&a, fixed_time()).await.unwrap();
    h.pipeline.process_at(&b, fixed_time()).await.unwrap();

    let record = h.record(10);
    assert_eq!(record.critical_count, 2, "replaced, not accumulated");
    assert_eq!(record.file_name, "raw/b.zip");
    assert_eq!(h.export().hourly_stats[0].total, 2);
}

#[tokio::test]
async fn hourly_archives_accumulate_into_one_day_export() {
    let h = Harness::new(PipelineConfig::default());
    for hour in [13_u8, 2, 7] {
        let csv = CsvBuilder::standard().repeat(
            usize::from(hour),
            &format!("2025-04-28T{hour:02}:10:00Z"),
            HOST,
            Severity::Warning,
        );
        let archive = h.upload(&format!("raw/2025-04-28/{hour:02}.zip"), &csv);
        h.pipeline.process_at(&archive, fixed_time()).await.unwrap();
    }

    let export = h.export();
    let hours: Vec<String> = export.hourly_stats.iter().map(|s| s.hour.to_string()).collect();
    assert_eq!(hours, ["02:00", "07:00", "13:00"]);
    assert_eq!(export.total_hours, 3);
    assert_eq!(export.hourly_stats[2].warning, 13);
}

#[tokio::test]
async fn missing_severity_column_aborts_deterministically() {
    let csv = CsvBuilder::with_header(&["Timestamp", "Hostname", "AppName"])
        .raw(&["2025-04-28T10:00:00Z", HOST, "RT_IDP"])
        .raw(&["2025-04-28T11:00:00Z", HOST, "RT_IDP"]);

    let mut messages = Vec::new();
    for _ in 0..3 {
        let h = Harness::new(PipelineConfig::default());
        let archive = h.upload("raw/bad.zip", &csv);
        let err = h.pipeline.process_at(&archive, fixed_time()).await.unwrap_err();
        assert_eq!(err.stage, Stage::Aggregate);
        assert!(matches!(
            err.source,
            Error::MalformedRecord { line: 2, .. }
        ));
        assert!(h.store.is_empty().unwrap());
        assert!(h.sink.operations().is_empty());
        messages.push(err.to_string());
    }
    messages.dedup();
    assert_eq!(messages.len(), 1, "{messages:?}");
}

#[tokio::test]
async fn missing_severity_column_skips_under_lenient_policy() {
    let csv = CsvBuilder::with_header(&["Timestamp", "Hostname", "AppName"])
        .raw(&["2025-04-28T10:00:00Z", HOST, "RT_IDP"])
        .raw(&["2025-04-28T11:00:00Z", HOST, "RT_IDP"]);
    let config = PipelineConfig {
        malformed_rows: MalformedRowPolicy::Skip,
        ..PipelineConfig::default()
    };

    for _ in 0..2 {
        let h = Harness::new(config.clone());
        let archive = h.upload("raw/bad.zip", &csv);
        let outcome = h.pipeline.process_at(&archive, fixed_time()).await.unwrap();
        assert_eq!(outcome.stats.skipped_rows, 2);
        assert_eq!(outcome.hours_written, 0);
        assert_eq!(outcome.log_date, None);
        assert!(h.store.is_empty().unwrap());
    }
}

#[tokio::test]
async fn skip_policy_keeps_good_rows() {
    let csv = reference_day()
        .raw(&["garbage"])
        .raw(&["2025-04-28", HOST, "X", "2", "CRITICAL", "THREAT", "short ts"]);
    let h = Harness::new(PipelineConfig {
        malformed_rows: MalformedRowPolicy::Skip,
        ..PipelineConfig::default()
    });
    let archive = h.upload("raw/mixed.zip", &csv);
    let outcome = h.pipeline.process_at(&archive, fixed_time()).await.unwrap();

    assert_eq!(outcome.stats.skipped_rows, 2);
    assert_eq!(h.record(10).critical_count, 5);
    assert_eq!(h.record(11).warning_count, 3);
}

#[tokio::test]
async fn first_csv_member_is_used() {
    let h = Harness::new(PipelineConfig::default());
    let first = CsvBuilder::standard()
        .repeat(1, "2025-04-28T05:00:00Z", HOST, Severity::Critical)
        .build();
    let second = CsvBuilder::standard()
        .repeat(9, "2025-04-28T06:00:00Z", HOST, Severity::Critical)
        .build();
    h.input.seed(
        "raw/multi.zip",
        zip_archive(&[
            ("README.txt", &b"not a payload"[..]),
            ("a.csv", &first[..]),
            ("b.csv", &second[..]),
        ]),
    );

    let outcome = h
        .pipeline
        .process_at(&ArchiveRef::new(CONTAINER, "raw/multi.zip"), fixed_time())
        .await
        .unwrap();
    assert_eq!(outcome.hours_written, 1);
    assert_eq!(h.record(5).critical_count, 1);
}

#[tokio::test]
async fn bad_archives_fail_extract() {
    let h = Harness::new(PipelineConfig::default());
    h.input.seed("raw/plain.zip", "Timestamp,Hostname\n");
    h.input
        .seed("raw/nocsv.zip", zip_archive(&[("notes.txt", &b"hello"[..])]));

    let err = h
        .pipeline
        .process(&ArchiveRef::new(CONTAINER, "raw/plain.zip"))
        .await
        .unwrap_err();
    assert_eq!(err.stage, Stage::Extract);
    assert!(matches!(err.source, Error::ArchiveFormat { .. }));

    let err = h
        .pipeline
        .process(&ArchiveRef::new(CONTAINER, "raw/nocsv.zip"))
        .await
        .unwrap_err();
    assert_eq!(err.stage, Stage::Extract);
    assert!(matches!(err.source, Error::PayloadNotFound { .. }));
    assert!(h.store.is_empty().unwrap());
}

#[tokio::test]
async fn notification_processes_records_in_order() {
    let h = Harness::new(PipelineConfig::default());
    h.upload(
        "raw/2025-04-28/10.zip",
        &CsvBuilder::standard().repeat(4, "2025-04-28T10:00:00Z", HOST, Severity::Critical),
    );
    h.upload(
        "raw/2025-04-28/10-retry.zip",
        &CsvBuilder::standard().repeat(1, "2025-04-28T10:00:00Z", HOST, Severity::Critical),
    );

    let body = s3_event_many(&[
        (CONTAINER, "raw/2025-04-28/10.zip"),
        (CONTAINER, "raw/2025-04-28/10-retry.zip"),
    ]);
    let notification = EventNotification::from_s3_event(&body).unwrap();
    let outcomes = h.pipeline.process_notification(&notification).await.unwrap();

    assert_eq!(outcomes.len(), 2);
    assert_eq!(h.record(10).critical_count, 1, "last record wins");
}

#[tokio::test]
async fn generated_day_totals_match_tracked_rows() {
    let date = NaiveDate::from_ymd_opt(2025, 4, 28).unwrap();
    let mut generator = DayLogGenerator::new(date, HOST, 42).threat_ratio(0.25);
    let rows = generator.day(40);
    let tracked = rows.iter().filter(|r| r.severity.tracked().is_some()).count() as u64;

    let h = Harness::new(PipelineConfig::default());
    let archive = h.upload("raw/2025-04-28/day.zip", &CsvBuilder::standard().records(&rows));
    let outcome = h.pipeline.process_at(&archive, fixed_time()).await.unwrap();

    assert_eq!(outcome.stats.total_rows, 24 * 40);
    assert_eq!(outcome.stats.tracked_rows, tracked);
    let stored: u64 = h.store.query(DATE).await.unwrap().iter().map(|r| r.total_count).sum();
    assert_eq!(stored, tracked);
    let exported: u64 = h.export().hourly_stats.iter().map(|s| s.total).sum();
    assert_eq!(exported, tracked);
}

#[tokio::test]
async fn object_backed_store_layout() {
    init_test_logging();
    let input = MemoryBackend::new();
    let aggregates = TracingMemoryBackend::new();
    let sink = MemoryBackend::new();
    let pipeline = Pipeline::new(
        Arc::new(Containers::new().with_container(CONTAINER, input.clone())),
        Arc::new(ObjectAggregateStore::new(aggregates.clone())),
        Arc::new(sink.clone()),
        PipelineConfig::default(),
    );

    let payload = reference_day().build();
    firelog_core::StorageBackend::put(
        &input,
        "raw/a.zip",
        zip_archive(&[("a.csv", &payload[..])]),
        firelog_core::PutOptions::default(),
    )
    .await
    .unwrap();

    pipeline
        .process_at(&ArchiveRef::new(CONTAINER, "raw/a.zip"), fixed_time())
        .await
        .unwrap();

    assert_eq!(
        aggregates.paths(),
        [
            "aggregates/date=2025-04-28/hour=10.json",
            "aggregates/date=2025-04-28/hour=11.json",
        ]
    );
    assert_eq!(sink.paths().unwrap(), ["data/2025-04-28.json"]);
}

#[tokio::test]
async fn local_filesystem_deployment_commits_and_exports() {
    init_test_logging();
    let root = std::env::temp_dir().join(format!("firelog-e2e-local-{}", std::process::id()));
    let url = |name: &str| format!("file://{}", root.join(name).display());

    let payload = reference_day().build();
    let raw = root.join("input").join(CONTAINER).join("raw");
    std::fs::create_dir_all(&raw).unwrap();
    std::fs::write(raw.join("a.zip"), zip_archive(&[("a.csv", &payload[..])])).unwrap();

    let store = Arc::new(ObjectAggregateStore::new(
        ObjectStoreBackend::from_url(&url("aggregates")).unwrap(),
    ));
    let pipeline = Pipeline::new(
        Arc::new(Containers::from_base_url(url("input"))),
        store.clone(),
        Arc::new(ObjectStoreBackend::from_url(&url("output")).unwrap()),
        PipelineConfig::default(),
    );
    let archive = ArchiveRef::new(CONTAINER, "raw/a.zip");

    let outcome = pipeline.process_at(&archive, fixed_time()).await.unwrap();
    assert_eq!(outcome.hours_written, 2);
    assert_eq!(
        outcome.export,
        ExportStatus::Exported {
            path: "data/2025-04-28.json".into(),
            total_hours: 2
        }
    );

    let stored = store.query(DATE).await.unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].critical_count, 5);
    assert_eq!(stored[1].warning_count, 3);
    assert!(root.join("aggregates/aggregates/date=2025-04-28/hour=10.json").is_file());

    let exported: DayExport =
        serde_json::from_slice(&std::fs::read(root.join("output/data/2025-04-28.json")).unwrap())
            .unwrap();
    assert_eq!(exported.total_hours, 2);

    // Reprocessing replaces the local files in place.
    pipeline.process_at(&archive, fixed_time()).await.unwrap();
    assert_eq!(store.query(DATE).await.unwrap(), stored);

    std::fs::remove_dir_all(&root).unwrap();
}
