//! Behavioral contract every record store must satisfy.
//!
//! The same suite runs against the SQLite and in-memory stores.

use chrono::{DateTime, Duration, TimeZone, Utc};
use recordkeep_core::db::open_db_in_memory;
use recordkeep_core::{
    FixedClock, LifecycleEvent, MemoryRecordRepository, RecordRepository, RecordScan,
    RecordValidationError, RecordingEventSink, RepoError, SqliteRecordRepository,
};
use std::collections::HashSet;
use std::sync::Arc;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 10, 12, 0, 0).unwrap()
}

fn sqlite_store(clock: Arc<FixedClock>, sink: Arc<RecordingEventSink>) -> SqliteRecordRepository {
    SqliteRecordRepository::new(open_db_in_memory().unwrap())
        .with_clock(clock)
        .with_sink(sink)
}

fn memory_store(clock: Arc<FixedClock>, sink: Arc<RecordingEventSink>) -> MemoryRecordRepository {
    MemoryRecordRepository::new()
        .with_clock(clock)
        .with_sink(sink)
}

fn names<R: RecordRepository>(repo: &R) -> Vec<String> {
    repo.get_all()
        .map(|record| record.unwrap().name)
        .collect()
}

macro_rules! store_contract {
    ($backend:ident, $make:ident) => {
        mod $backend {
            use super::*;

            fn fixture() -> (
                impl RecordRepository + Sync,
                Arc<FixedClock>,
                Arc<RecordingEventSink>,
            ) {
                let clock = Arc::new(FixedClock::new(start()));
                let sink = Arc::new(RecordingEventSink::new());
                ($make(clock.clone(), sink.clone()), clock, sink)
            }

            #[test]
            fn insert_keeps_name_exactly_and_roundtrips_by_id() {
                let (repo, _clock, sink) = fixture();
                let inputs = [
                    "a".to_string(),
                    "  padded name ".to_string(),
                    "ünïcödé ✓".to_string(),
                    "x".repeat(500),
                ];

                for input in &inputs {
                    let created = repo.insert(input).unwrap();
                    assert_eq!(&created.name, input);
                    assert!(created.id > 0);
                    assert_eq!(created.created_at, start());

                    let loaded = repo.get_by_id(created.id).unwrap().unwrap();
                    assert_eq!(loaded, created);
                }

                assert_eq!(repo.count().unwrap(), inputs.len() as u64);
                assert!(sink.contains(|event| matches!(
                    event,
                    LifecycleEvent::RecordAdded { name, .. } if name == "a"
                )));
            }

            #[test]
            fn invalid_names_are_rejected_without_mutation() {
                let (repo, _clock, sink) = fixture();
                repo.insert("keep").unwrap();

                for input in ["".to_string(), "   ".to_string(), "x".repeat(501)] {
                    let err = repo.insert(&input).unwrap_err();
                    assert!(matches!(err, RepoError::Validation(_)));
                }

                assert_eq!(repo.count().unwrap(), 1);
                let rejected = sink
                    .events()
                    .into_iter()
                    .filter(|event| matches!(event, LifecycleEvent::RecordRejected { .. }))
                    .count();
                assert_eq!(rejected, 3);
                assert!(sink.contains(|event| matches!(
                    event,
                    LifecycleEvent::RecordRejected {
                        reason: RecordValidationError::NameTooLong { actual: 501, .. }
                    }
                )));
            }

            #[test]
            fn name_limit_counts_utf16_code_units() {
                let (repo, _clock, _sink) = fixture();
                let at_limit = "\u{1F600}".repeat(250);
                let over_limit = "\u{1F600}".repeat(251);

                let created = repo.insert(&at_limit).unwrap();
                assert_eq!(repo.get_by_id(created.id).unwrap().unwrap().name, at_limit);

                let err = repo.insert(&over_limit).unwrap_err();
                assert!(matches!(
                    err,
                    RepoError::Validation(RecordValidationError::NameTooLong { actual: 502, .. })
                ));
                assert_eq!(repo.bulk_insert(&[over_limit]).unwrap(), 0);
                assert_eq!(repo.count().unwrap(), 1);
            }

            #[test]
            fn lookups_of_invalid_or_unknown_ids_are_absent() {
                let (repo, _clock, sink) = fixture();
                repo.insert("only").unwrap();

                assert_eq!(repo.get_by_id(0).unwrap(), None);
                assert_eq!(repo.get_by_id(-5).unwrap(), None);
                assert_eq!(repo.get_by_id(9_999).unwrap(), None);

                assert!(sink.contains(|event| matches!(
                    event,
                    LifecycleEvent::InvalidId { id: -5, operation: "get" }
                )));
                assert!(sink.contains(|event| matches!(
                    event,
                    LifecycleEvent::RecordNotFound { id: 9_999, operation: "get" }
                )));
            }

            #[test]
            fn delete_by_id_removes_once() {
                let (repo, _clock, sink) = fixture();
                let record = repo.insert("doomed").unwrap();
                let survivor = repo.insert("survivor").unwrap();

                assert!(repo.delete_by_id(record.id).unwrap());
                assert!(!repo.delete_by_id(record.id).unwrap());
                assert!(!repo.delete_by_id(0).unwrap());

                assert_eq!(repo.get_by_id(record.id).unwrap(), None);
                assert!(repo.get_by_id(survivor.id).unwrap().is_some());
                assert_eq!(repo.count().unwrap(), 1);
                assert!(sink.contains(|event| matches!(
                    event,
                    LifecycleEvent::RecordRemoved { name, .. } if name == "doomed"
                )));
                assert!(sink.contains(|event| matches!(
                    event,
                    LifecycleEvent::RecordNotFound { operation: "remove", .. }
                )));
            }

            #[test]
            fn scan_orders_by_created_at_then_insertion() {
                let (repo, clock, _sink) = fixture();
                clock.set(start() + Duration::hours(2));
                repo.insert("late").unwrap();
                clock.set(start());
                repo.insert("early").unwrap();
                clock.set(start() + Duration::hours(1));
                repo.insert("mid-a").unwrap();
                repo.insert("mid-b").unwrap();

                let expected = vec!["early", "mid-a", "mid-b", "late"];
                assert_eq!(names(&repo), expected);
                // Each call starts a fresh scan.
                assert_eq!(names(&repo), expected);

                let paged: Vec<String> = RecordScan::with_page_size(&repo, 1)
                    .map(|record| record.unwrap().name)
                    .collect();
                assert_eq!(paged, expected);

                let timestamps: Vec<_> = repo
                    .get_all()
                    .map(|record| record.unwrap().created_at)
                    .collect();
                assert!(timestamps.windows(2).all(|pair| pair[0] <= pair[1]));
            }

            #[test]
            fn count_created_between_is_half_open() {
                let (repo, clock, _sink) = fixture();
                clock.set(start() - Duration::milliseconds(1));
                repo.insert("before").unwrap();
                clock.set(start());
                repo.insert("at-start").unwrap();
                clock.set(start() + Duration::hours(1));
                repo.insert("inside").unwrap();
                clock.set(start() + Duration::hours(2));
                repo.insert("at-end").unwrap();

                let counted = repo
                    .count_created_between(start(), start() + Duration::hours(2))
                    .unwrap();
                assert_eq!(counted, 2);
                assert_eq!(
                    repo.count_created_between(start(), start()).unwrap(),
                    0
                );
            }

            #[test]
            fn exists_by_name_matches_exact_names_only() {
                let (repo, _clock, _sink) = fixture();
                repo.insert("Batch-Alpha").unwrap();

                assert!(repo.exists_by_name("Batch-Alpha").unwrap());
                assert!(!repo.exists_by_name("Batch-alpha").unwrap());
                assert!(!repo.exists_by_name("Batch-Alph").unwrap());
                assert!(!repo.exists_by_name("Alpha").unwrap());
            }

            #[test]
            fn delete_created_before_is_strict() {
                let (repo, clock, _sink) = fixture();
                clock.set(start() - Duration::days(3));
                repo.insert("old-1").unwrap();
                repo.insert("old-2").unwrap();
                clock.set(start());
                repo.insert("at-cutoff").unwrap();

                assert_eq!(repo.delete_created_before(start()).unwrap(), 2);
                assert_eq!(names(&repo), vec!["at-cutoff"]);
                assert!(!repo.exists_by_name("old-1").unwrap());
                assert_eq!(repo.delete_created_before(start()).unwrap(), 0);
            }

            #[test]
            fn bulk_insert_skips_invalid_names() {
                let (repo, _clock, sink) = fixture();
                let batch = vec![
                    "one".to_string(),
                    " ".to_string(),
                    "two".to_string(),
                    "y".repeat(600),
                    "three".to_string(),
                ];

                assert_eq!(repo.bulk_insert(&batch).unwrap(), 3);
                assert_eq!(names(&repo), vec!["one", "two", "three"]);
                assert!(sink.contains(|event| matches!(
                    event,
                    LifecycleEvent::BulkInserted { count: 3 }
                )));
                assert_eq!(repo.bulk_insert(&[]).unwrap(), 0);
            }

            #[test]
            fn concurrent_inserts_get_unique_ids() {
                let (repo, _clock, _sink) = fixture();
                let workers = 16;

                let ids: Vec<_> = std::thread::scope(|scope| {
                    let handles: Vec<_> = (0..workers)
                        .map(|index| {
                            let repo = &repo;
                            scope.spawn(move || repo.insert(&format!("worker-{index}")).unwrap().id)
                        })
                        .collect();
                    handles
                        .into_iter()
                        .map(|handle| handle.join().unwrap())
                        .collect()
                });

                let unique: HashSet<_> = ids.iter().copied().collect();
                assert_eq!(unique.len(), workers);
                assert_eq!(repo.count().unwrap(), workers as u64);
            }
        }
    };
}

store_contract!(sqlite, sqlite_store);
store_contract!(memory, memory_store);
