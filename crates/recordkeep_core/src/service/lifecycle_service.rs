//! Record lifecycle workflows.
//!
//! # Responsibility
//! - Daily reporting, retention purge, deduplicated catalog seeding and
//!   batched synthetic import over any `RecordRepository`.
//! - Emit workflow milestones to the event sink.
//!
//! # Invariants
//! - The service never keeps its own copy of stored records.
//! - Purge is one set-based store delete per call.
//! - Bulk import holds at most one batch of names in memory.
//! - Seeding on one service instance is serialized.

use crate::audit::{EventSink, LifecycleEvent, LogEventSink};
use crate::clock::{Clock, SystemClock};
use crate::model::record::{Record, RecordId};
use crate::repo::record_repo::{RecordRepository, RepoResult};
use crate::repo::scan::RecordScan;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, PoisonError};

/// Record count used by `bulk_import` callers that do not pick one.
pub const DEFAULT_IMPORT_COUNT: u64 = 1_000_000;

/// Number of synthetic records written per store call during import.
pub const IMPORT_BATCH_SIZE: NonZeroUsize = match NonZeroUsize::new(10_000) {
    Some(size) => size,
    None => panic!("import batch size must be non-zero"),
};

/// Import progress is reported each time this many more records are written.
pub const IMPORT_PROGRESS_INTERVAL: u64 = 50_000;

/// Name prefix of records produced by `bulk_import`.
pub const IMPORT_NAME_PREFIX: &str = "LoadTest-";

/// Counts produced by `report_daily`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyReport {
    /// Records created since midnight UTC.
    pub today_count: u64,
    pub total_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PurgeSummary {
    pub removed_count: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub inserted: usize,
    /// Catalog entries whose prefixed name already existed.
    pub skipped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub inserted: u64,
}

/// Use-case service over a record store.
pub struct RecordLifecycleService<R: RecordRepository> {
    repo: R,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
    seed_gate: Mutex<()>,
}

impl<R: RecordRepository> RecordLifecycleService<R> {
    /// Creates a service using the system clock and the `log` event sink.
    pub fn new(repo: R) -> Self {
        Self {
            repo,
            clock: Arc::new(SystemClock),
            sink: Arc::new(LogEventSink),
            seed_gate: Mutex::new(()),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    /// Counts records created today (UTC) and records overall.
    ///
    /// # Side effects
    /// - Emits `daily_report` start and result events. No mutation.
    pub fn report_daily(&self) -> RepoResult<DailyReport> {
        self.sink.emit(&LifecycleEvent::ReportStarted);

        let today_start = start_of_utc_day(self.clock.now());
        let tomorrow_start = today_start + Duration::days(1);
        let report = DailyReport {
            today_count: self
                .repo
                .count_created_between(today_start, tomorrow_start)?,
            total_count: self.repo.count()?,
        };

        self.sink.emit(&LifecycleEvent::DailyReport {
            today_count: report.today_count,
            total_count: report.total_count,
        });
        Ok(report)
    }

    /// Deletes every record created more than `retention_days` days ago.
    ///
    /// `0` removes everything created before the current instant.
    pub fn purge_expired(&self, retention_days: u32) -> RepoResult<PurgeSummary> {
        let cutoff = self
            .clock
            .now()
            .checked_sub_signed(Duration::days(i64::from(retention_days)))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        self.sink.emit(&LifecycleEvent::PurgeStarted {
            retention_days,
            cutoff,
        });

        let removed_count = self.repo.delete_created_before(cutoff)?;

        self.sink
            .emit(&LifecycleEvent::PurgeCompleted { removed_count });
        Ok(PurgeSummary { removed_count })
    }

    /// Inserts `prefix + name` for every catalog entry not already stored.
    ///
    /// Entries are handled in catalog order, one existence check and at most
    /// one insert each. Fails on the first invalid prefixed name; entries
    /// before it stay inserted.
    pub fn seed_from_catalog<S: AsRef<str>>(
        &self,
        prefix: &str,
        catalog: &[S],
    ) -> RepoResult<SeedSummary> {
        let _gate = self.seed_gate.lock().unwrap_or_else(PoisonError::into_inner);
        self.sink.emit(&LifecycleEvent::SeedStarted {
            prefix: prefix.to_string(),
            catalog_len: catalog.len(),
        });

        let mut summary = SeedSummary {
            inserted: 0,
            skipped: 0,
        };
        for base_name in catalog {
            let full_name = format!("{prefix}{}", base_name.as_ref());
            if self.repo.exists_by_name(&full_name)? {
                summary.skipped += 1;
                continue;
            }
            self.repo.insert(&full_name)?;
            summary.inserted += 1;
        }

        self.sink.emit(&LifecycleEvent::SeedCompleted {
            inserted: summary.inserted,
            skipped: summary.skipped,
        });
        Ok(summary)
    }

    /// Writes `total_count` records named `LoadTest-1..=total_count` in
    /// batches of [`IMPORT_BATCH_SIZE`].
    pub fn bulk_import(&self, total_count: u64) -> RepoResult<ImportSummary> {
        self.bulk_import_batched(total_count, IMPORT_BATCH_SIZE)
    }

    /// Same as [`Self::bulk_import`] with an explicit batch size.
    ///
    /// Not idempotent: a rerun after a failure writes the leading range again.
    pub fn bulk_import_batched(
        &self,
        total_count: u64,
        batch_size: NonZeroUsize,
    ) -> RepoResult<ImportSummary> {
        self.sink
            .emit(&LifecycleEvent::ImportStarted { total_count });

        let step = batch_size.get() as u64;
        let capacity = batch_size
            .get()
            .min(usize::try_from(total_count).unwrap_or(usize::MAX));
        let mut batch: Vec<String> = Vec::with_capacity(capacity);
        let mut inserted: u64 = 0;
        let mut next_progress = IMPORT_PROGRESS_INTERVAL;
        let mut first = 1u64;

        while first <= total_count {
            let last = first.saturating_add(step - 1).min(total_count);
            batch.clear();
            batch.extend((first..=last).map(|index| format!("{IMPORT_NAME_PREFIX}{index}")));

            inserted += self.repo.bulk_insert(&batch)? as u64;

            if inserted >= next_progress {
                self.sink.emit(&LifecycleEvent::ImportProgress {
                    inserted,
                    total_count,
                });
                next_progress = (inserted / IMPORT_PROGRESS_INTERVAL + 1) * IMPORT_PROGRESS_INTERVAL;
            }

            if last == total_count {
                break;
            }
            first = last + 1;
        }

        self.sink.emit(&LifecycleEvent::ImportCompleted { inserted });
        Ok(ImportSummary { inserted })
    }

    /// Stores one record directly.
    pub fn add_record(&self, name: &str) -> RepoResult<Record> {
        self.repo.insert(name)
    }

    pub fn get_record(&self, id: RecordId) -> RepoResult<Option<Record>> {
        self.repo.get_by_id(id)
    }

    pub fn remove_record(&self, id: RecordId) -> RepoResult<bool> {
        self.repo.delete_by_id(id)
    }

    /// Lazily iterates all records ordered by creation time.
    pub fn records(&self) -> RecordScan<'_, R> {
        self.sink.emit(&LifecycleEvent::ScanStarted);
        self.repo.get_all()
    }
}

fn start_of_utc_day(at: DateTime<Utc>) -> DateTime<Utc> {
    at.date_naive().and_time(NaiveTime::MIN).and_utc()
}
