//! Core record lifecycle logic for RecordKeep.
//! This crate is the single source of truth for record invariants.

pub mod audit;
pub mod clock;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use audit::{EventSink, LifecycleEvent, LogEventSink, RecordingEventSink};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::{ConfigError, RecordKeepConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::record::{
    validate_record_name, Record, RecordId, RecordValidationError, MAX_RECORD_NAME_UNITS,
};
pub use repo::memory_repo::MemoryRecordRepository;
pub use repo::record_repo::{RecordRepository, RepoError, RepoResult, SqliteRecordRepository};
pub use repo::scan::{RecordScan, ScanCursor, SCAN_PAGE_SIZE};
pub use service::lifecycle_service::{
    DailyReport, ImportSummary, PurgeSummary, RecordLifecycleService, SeedSummary,
    DEFAULT_IMPORT_COUNT, IMPORT_BATCH_SIZE, IMPORT_PROGRESS_INTERVAL,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
