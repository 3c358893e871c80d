use chrono::{DateTime, Duration, TimeZone, Utc};
use recordkeep_core::db::open_db_in_memory;
use recordkeep_core::{
    DailyReport, FixedClock, ImportSummary, LifecycleEvent, MemoryRecordRepository,
    PurgeSummary, RecordLifecycleService, RecordRepository, RecordingEventSink, RepoError,
    SeedSummary, SqliteRecordRepository,
};
use std::num::NonZeroUsize;
use std::sync::Arc;

struct Harness {
    service: RecordLifecycleService<SqliteRecordRepository>,
    clock: Arc<FixedClock>,
    sink: Arc<RecordingEventSink>,
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
}

fn harness() -> Harness {
    let clock = Arc::new(FixedClock::new(now()));
    let sink = Arc::new(RecordingEventSink::new());
    let repo = SqliteRecordRepository::new(open_db_in_memory().unwrap())
        .with_clock(clock.clone())
        .with_sink(sink.clone());
    let service = RecordLifecycleService::new(repo)
        .with_clock(clock.clone())
        .with_sink(sink.clone());
    Harness {
        service,
        clock,
        sink,
    }
}

fn insert_at(h: &Harness, at: DateTime<Utc>, count: usize, label: &str) {
    h.clock.set(at);
    let names: Vec<String> = (0..count).map(|index| format!("{label}-{index}")).collect();
    h.service.repository().bulk_insert(&names).unwrap();
    h.clock.set(now());
}

fn stored_names(h: &Harness) -> Vec<String> {
    h.service
        .records()
        .map(|record| record.unwrap().name)
        .collect()
}

#[test]
fn report_daily_counts_today_and_total() {
    let h = harness();
    insert_at(&h, now(), 2, "today");
    insert_at(&h, now() - Duration::hours(11), 1, "early-today");
    insert_at(&h, now() - Duration::days(1), 3, "yesterday");
    insert_at(&h, now() - Duration::days(40), 4, "old");

    let report = h.service.report_daily().unwrap();
    assert_eq!(
        report,
        DailyReport {
            today_count: 3,
            total_count: 10
        }
    );

    let events = h.sink.events();
    assert!(events.contains(&LifecycleEvent::ReportStarted));
    assert!(events.contains(&LifecycleEvent::DailyReport {
        today_count: 3,
        total_count: 10
    }));
}

#[test]
fn report_daily_does_not_mutate_and_excludes_tomorrow() {
    let h = harness();
    insert_at(&h, now() + Duration::hours(12), 1, "tomorrow");
    insert_at(&h, now(), 1, "today");

    let first = h.service.report_daily().unwrap();
    let second = h.service.report_daily().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.today_count, 1);
    assert_eq!(first.total_count, 2);
}

#[test]
fn purge_expired_removes_only_records_past_retention() {
    let h = harness();
    insert_at(&h, now() - Duration::days(31), 1_000, "aged");
    insert_at(&h, now(), 100, "fresh");

    let summary = h.service.purge_expired(30).unwrap();
    assert_eq!(
        summary,
        PurgeSummary {
            removed_count: 1_000
        }
    );
    assert_eq!(h.service.repository().count().unwrap(), 100);
    assert!(h.sink.contains(|event| matches!(
        event,
        LifecycleEvent::PurgeCompleted {
            removed_count: 1_000
        }
    )));

    let again = h.service.purge_expired(30).unwrap();
    assert_eq!(again.removed_count, 0);
}

#[test]
fn purge_with_zero_retention_removes_everything_before_now() {
    let h = harness();
    insert_at(&h, now() - Duration::seconds(1), 5, "earlier");
    insert_at(&h, now(), 2, "current");

    let summary = h.service.purge_expired(0).unwrap();
    assert_eq!(summary.removed_count, 5);
    assert_eq!(h.service.repository().count().unwrap(), 2);
}

#[test]
fn seed_from_catalog_inserts_then_skips_on_rerun() {
    let h = harness();
    let catalog = ["Alpha", "Beta", "Gamma"];

    let first = h.service.seed_from_catalog("Batch-", &catalog).unwrap();
    assert_eq!(
        first,
        SeedSummary {
            inserted: 3,
            skipped: 0
        }
    );
    assert_eq!(
        stored_names(&h),
        vec!["Batch-Alpha", "Batch-Beta", "Batch-Gamma"]
    );

    let second = h.service.seed_from_catalog("Batch-", &catalog).unwrap();
    assert_eq!(
        second,
        SeedSummary {
            inserted: 0,
            skipped: 3
        }
    );
    assert_eq!(h.service.repository().count().unwrap(), 3);
    assert!(h.sink.contains(|event| matches!(
        event,
        LifecycleEvent::SeedCompleted {
            inserted: 0,
            skipped: 3
        }
    )));
}

#[test]
fn seed_from_catalog_skips_existing_prefixed_names_only() {
    let h = harness();
    h.service.add_record("Batch-Alpha").unwrap();
    h.service.add_record("Beta").unwrap();

    let summary = h
        .service
        .seed_from_catalog("Batch-", &["Alpha", "Beta", "Gamma"])
        .unwrap();
    assert_eq!(
        summary,
        SeedSummary {
            inserted: 2,
            skipped: 1
        }
    );
    assert_eq!(h.service.repository().count().unwrap(), 4);
    assert!(h
        .service
        .repository()
        .exists_by_name("Batch-Beta")
        .unwrap());
}

#[test]
fn seed_from_catalog_fails_on_invalid_full_name() {
    let h = harness();
    let too_long = "z".repeat(500);
    let catalog = vec!["Alpha".to_string(), too_long];

    let err = h.service.seed_from_catalog("Batch-", &catalog).unwrap_err();
    assert!(matches!(err, RepoError::Validation(_)));
    assert_eq!(stored_names(&h), vec!["Batch-Alpha"]);
}

#[test]
fn concurrent_seeding_on_one_service_never_duplicates() {
    let clock = Arc::new(FixedClock::new(now()));
    let repo = MemoryRecordRepository::new().with_clock(clock.clone());
    let service = RecordLifecycleService::new(repo).with_clock(clock);
    let catalog: Vec<String> = (0..50).map(|index| format!("item-{index}")).collect();

    let summaries: Vec<SeedSummary> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let service = &service;
                let catalog = &catalog;
                scope.spawn(move || service.seed_from_catalog("Seed-", catalog).unwrap())
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().unwrap())
            .collect()
    });

    let inserted: usize = summaries.iter().map(|summary| summary.inserted).sum();
    assert_eq!(inserted, 50);
    assert_eq!(service.repository().count().unwrap(), 50);
}

#[test]
fn bulk_import_writes_sequential_load_test_names() {
    let h = harness();
    h.service.add_record("existing").unwrap();

    let summary = h.service.bulk_import(100).unwrap();
    assert_eq!(summary, ImportSummary { inserted: 100 });
    assert_eq!(h.service.repository().count().unwrap(), 101);

    let names = stored_names(&h);
    let expected: Vec<String> = (1..=100).map(|index| format!("LoadTest-{index}")).collect();
    assert_eq!(names[1..], expected[..]);
    assert!(h
        .sink
        .contains(|event| matches!(event, LifecycleEvent::ImportCompleted { inserted: 100 })));
}

#[test]
fn bulk_import_uses_bounded_batches() {
    let h = harness();
    let summary = h
        .service
        .bulk_import_batched(25, NonZeroUsize::new(10).unwrap())
        .unwrap();
    assert_eq!(summary.inserted, 25);

    let batch_sizes: Vec<usize> = h
        .sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            LifecycleEvent::BulkInserted { count } => Some(count),
            _ => None,
        })
        .collect();
    assert_eq!(batch_sizes, vec![10, 10, 5]);
}

#[test]
fn bulk_import_reports_progress_every_fifty_thousand() {
    let h = harness();
    let summary = h.service.bulk_import(120_000).unwrap();
    assert_eq!(summary.inserted, 120_000);

    let progress: Vec<u64> = h
        .sink
        .events()
        .into_iter()
        .filter_map(|event| match event {
            LifecycleEvent::ImportProgress { inserted, .. } => Some(inserted),
            _ => None,
        })
        .collect();
    assert_eq!(progress, vec![50_000, 100_000]);
    assert_eq!(h.service.repository().count().unwrap(), 120_000);
}

#[test]
fn bulk_import_rerun_duplicates_names() {
    let h = harness();
    h.service.bulk_import(3).unwrap();
    h.service.bulk_import(3).unwrap();

    assert_eq!(h.service.repository().count().unwrap(), 6);
    assert_eq!(
        stored_names(&h),
        vec![
            "LoadTest-1",
            "LoadTest-2",
            "LoadTest-3",
            "LoadTest-1",
            "LoadTest-2",
            "LoadTest-3"
        ]
    );
}

#[test]
fn direct_operations_pass_through_to_the_store() {
    let h = harness();
    let record = h.service.add_record("direct").unwrap();

    assert_eq!(h.service.get_record(record.id).unwrap(), Some(record.clone()));
    assert!(h.service.remove_record(record.id).unwrap());
    assert_eq!(h.service.get_record(record.id).unwrap(), None);
    assert!(!h.service.remove_record(record.id).unwrap());
    assert!(h.service.add_record("").is_err());
}
