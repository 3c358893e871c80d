//! Structured audit events for record lifecycle activity.
//!
//! # Responsibility
//! - Describe every observable store mutation and workflow milestone.
//! - Route events to a write-only sink chosen by the host.
//!
//! # Invariants
//! - Emitting is infallible and best-effort; core behavior never depends on it.
//! - Event lines follow `event=<name> module=<module> status=<status> ...`.

use crate::model::record::{RecordId, RecordValidationError};
use chrono::{DateTime, Utc};
use log::Level;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, PoisonError};

/// One observable lifecycle occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    RecordAdded {
        id: RecordId,
        name: String,
    },
    RecordRejected {
        reason: RecordValidationError,
    },
    InvalidId {
        id: RecordId,
        operation: &'static str,
    },
    RecordNotFound {
        id: RecordId,
        operation: &'static str,
    },
    RecordRemoved {
        id: RecordId,
        name: String,
    },
    BulkInserted {
        count: usize,
    },
    ScanStarted,
    ReportStarted,
    DailyReport {
        today_count: u64,
        total_count: u64,
    },
    PurgeStarted {
        retention_days: u32,
        cutoff: DateTime<Utc>,
    },
    PurgeCompleted {
        removed_count: u64,
    },
    SeedStarted {
        prefix: String,
        catalog_len: usize,
    },
    SeedCompleted {
        inserted: usize,
        skipped: usize,
    },
    ImportStarted {
        total_count: u64,
    },
    ImportProgress {
        inserted: u64,
        total_count: u64,
    },
    ImportCompleted {
        inserted: u64,
    },
}

impl LifecycleEvent {
    /// Severity used when the event is written to a log.
    pub fn level(&self) -> Level {
        match self {
            Self::RecordRejected { .. } | Self::InvalidId { .. } | Self::RecordNotFound { .. } => {
                Level::Warn
            }
            Self::BulkInserted { .. } | Self::ScanStarted => Level::Debug,
            _ => Level::Info,
        }
    }

    /// Stable event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::RecordAdded { .. } => "record_added",
            Self::RecordRejected { .. } => "record_rejected",
            Self::InvalidId { .. } => "invalid_id",
            Self::RecordNotFound { .. } => "record_not_found",
            Self::RecordRemoved { .. } => "record_removed",
            Self::BulkInserted { .. } => "bulk_inserted",
            Self::ScanStarted => "scan",
            Self::ReportStarted | Self::DailyReport { .. } => "daily_report",
            Self::PurgeStarted { .. } | Self::PurgeCompleted { .. } => "purge",
            Self::SeedStarted { .. } | Self::SeedCompleted { .. } => "seed",
            Self::ImportStarted { .. }
            | Self::ImportProgress { .. }
            | Self::ImportCompleted { .. } => "bulk_import",
        }
    }

    fn module(&self) -> &'static str {
        match self {
            Self::RecordAdded { .. }
            | Self::RecordRejected { .. }
            | Self::InvalidId { .. }
            | Self::RecordNotFound { .. }
            | Self::RecordRemoved { .. }
            | Self::BulkInserted { .. } => "repo",
            _ => "service",
        }
    }

    fn status(&self) -> &'static str {
        match self {
            Self::RecordRejected { .. } => "rejected",
            Self::InvalidId { .. } => "invalid",
            Self::RecordNotFound { .. } => "not_found",
            Self::ScanStarted
            | Self::ReportStarted
            | Self::PurgeStarted { .. }
            | Self::SeedStarted { .. }
            | Self::ImportStarted { .. } => "start",
            Self::ImportProgress { .. } => "progress",
            _ => "ok",
        }
    }
}

impl Display for LifecycleEvent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "event={} module={} status={}",
            self.name(),
            self.module(),
            self.status()
        )?;

        match self {
            Self::RecordAdded { id, name } | Self::RecordRemoved { id, name } => {
                write!(f, " id={id} name={name:?}")
            }
            Self::RecordRejected { reason } => {
                write!(f, " error_code={} error={reason}", reason.code())
            }
            Self::InvalidId { id, operation } | Self::RecordNotFound { id, operation } => {
                write!(f, " op={operation} id={id}")
            }
            Self::BulkInserted { count } => write!(f, " count={count}"),
            Self::ScanStarted | Self::ReportStarted => Ok(()),
            Self::DailyReport {
                today_count,
                total_count,
            } => write!(f, " today_count={today_count} total_count={total_count}"),
            Self::PurgeStarted {
                retention_days,
                cutoff,
            } => write!(
                f,
                " retention_days={retention_days} cutoff={}",
                cutoff.to_rfc3339()
            ),
            Self::PurgeCompleted { removed_count } => write!(f, " removed_count={removed_count}"),
            Self::SeedStarted {
                prefix,
                catalog_len,
            } => write!(f, " prefix={prefix:?} catalog_len={catalog_len}"),
            Self::SeedCompleted { inserted, skipped } => {
                write!(f, " inserted={inserted} skipped={skipped}")
            }
            Self::ImportStarted { total_count } => write!(f, " total_count={total_count}"),
            Self::ImportProgress {
                inserted,
                total_count,
            } => write!(f, " inserted={inserted} total_count={total_count}"),
            Self::ImportCompleted { inserted } => write!(f, " inserted={inserted}"),
        }
    }
}

/// Write-only destination for lifecycle events.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &LifecycleEvent);
}

/// Sink that forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn emit(&self, event: &LifecycleEvent) {
        log::log!(event.level(), "{event}");
    }
}

/// Sink that keeps every event in memory, in emission order.
#[derive(Debug, Default)]
pub struct RecordingEventSink {
    events: Mutex<Vec<LifecycleEvent>>,
}

impl RecordingEventSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of recorded events.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns whether any recorded event matches `predicate`.
    pub fn contains(&self, predicate: impl Fn(&LifecycleEvent) -> bool) -> bool {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(predicate)
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventSink for RecordingEventSink {
    fn emit(&self, event: &LifecycleEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}
