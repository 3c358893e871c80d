//! Record store contract and SQLite implementation.
//!
//! # Responsibility
//! - Provide insert, lookup, scan, count and delete APIs over `records`.
//! - Keep SQL details inside the core persistence boundary.
//! - Report every mutation and rejection to the configured event sink.
//!
//! # Invariants
//! - Write paths call `validate_record_name()` before SQL mutations.
//! - Bulk deletes are a single set-based statement.
//! - Read paths reject undecodable persisted rows instead of masking them.

use crate::audit::{EventSink, LifecycleEvent, LogEventSink};
use crate::clock::{Clock, SystemClock};
use crate::db::DbError;
use crate::model::record::{
    storage_timestamp, validate_record_name, Record, RecordId, RecordValidationError,
};
use crate::repo::scan::{RecordScan, ScanCursor};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const RECORD_SELECT_SQL: &str = "SELECT id, name, created_at FROM records";
const SCAN_FIRST_SQL: &str = "SELECT id, name, created_at FROM records
     ORDER BY created_at ASC, id ASC
     LIMIT ?1;";
// Must stay a row-value comparison so SQLite seeks `idx_records_created_at`.
const SCAN_AFTER_SQL: &str = "SELECT id, name, created_at FROM records
     WHERE (created_at, id) > (?1, ?2)
     ORDER BY created_at ASC, id ASC
     LIMIT ?3;";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for record persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    /// Input rejected before any mutation.
    Validation(RecordValidationError),
    /// Underlying storage failure, propagated unchanged.
    Db(DbError),
    /// Persisted row cannot be decoded.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::InvalidData(_) => None,
        }
    }
}

impl From<RecordValidationError> for RepoError {
    fn from(value: RecordValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage contract for records.
///
/// Every call is atomic with respect to other calls on the same store.
pub trait RecordRepository {
    /// Validates and stores one record stamped with the store clock.
    fn insert(&self, name: &str) -> RepoResult<Record>;
    /// Stores every valid name in one unit of work; invalid names are skipped.
    ///
    /// Returns the number of inserted records.
    fn bulk_insert(&self, names: &[String]) -> RepoResult<usize>;
    /// Returns up to `limit` records ordered by `(created_at, id)`, strictly
    /// after `after` when given.
    fn scan_page(&self, after: Option<&ScanCursor>, limit: usize) -> RepoResult<Vec<Record>>;
    fn count(&self) -> RepoResult<u64>;
    /// Counts records with `from <= created_at < to`.
    fn count_created_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> RepoResult<u64>;
    fn exists_by_name(&self, name: &str) -> RepoResult<bool>;
    /// Returns `None` for non-positive or unknown ids.
    fn get_by_id(&self, id: RecordId) -> RepoResult<Option<Record>>;
    /// Returns `false` for non-positive or unknown ids.
    fn delete_by_id(&self, id: RecordId) -> RepoResult<bool>;
    /// Removes every record with `created_at < cutoff` and returns the count.
    fn delete_created_before(&self, cutoff: DateTime<Utc>) -> RepoResult<u64>;

    /// Lazily iterates all records ordered by creation time.
    fn get_all(&self) -> RecordScan<'_, Self> {
        RecordScan::new(self)
    }
}

impl<R: RecordRepository + ?Sized> RecordRepository for &R {
    fn insert(&self, name: &str) -> RepoResult<Record> {
        (**self).insert(name)
    }

    fn bulk_insert(&self, names: &[String]) -> RepoResult<usize> {
        (**self).bulk_insert(names)
    }

    fn scan_page(&self, after: Option<&ScanCursor>, limit: usize) -> RepoResult<Vec<Record>> {
        (**self).scan_page(after, limit)
    }

    fn count(&self) -> RepoResult<u64> {
        (**self).count()
    }

    fn count_created_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> RepoResult<u64> {
        (**self).count_created_between(from, to)
    }

    fn exists_by_name(&self, name: &str) -> RepoResult<bool> {
        (**self).exists_by_name(name)
    }

    fn get_by_id(&self, id: RecordId) -> RepoResult<Option<Record>> {
        (**self).get_by_id(id)
    }

    fn delete_by_id(&self, id: RecordId) -> RepoResult<bool> {
        (**self).delete_by_id(id)
    }

    fn delete_created_before(&self, cutoff: DateTime<Utc>) -> RepoResult<u64> {
        (**self).delete_created_before(cutoff)
    }
}

impl<R: RecordRepository + ?Sized> RecordRepository for Arc<R> {
    fn insert(&self, name: &str) -> RepoResult<Record> {
        (**self).insert(name)
    }

    fn bulk_insert(&self, names: &[String]) -> RepoResult<usize> {
        (**self).bulk_insert(names)
    }

    fn scan_page(&self, after: Option<&ScanCursor>, limit: usize) -> RepoResult<Vec<Record>> {
        (**self).scan_page(after, limit)
    }

    fn count(&self) -> RepoResult<u64> {
        (**self).count()
    }

    fn count_created_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> RepoResult<u64> {
        (**self).count_created_between(from, to)
    }

    fn exists_by_name(&self, name: &str) -> RepoResult<bool> {
        (**self).exists_by_name(name)
    }

    fn get_by_id(&self, id: RecordId) -> RepoResult<Option<Record>> {
        (**self).get_by_id(id)
    }

    fn delete_by_id(&self, id: RecordId) -> RepoResult<bool> {
        (**self).delete_by_id(id)
    }

    fn delete_created_before(&self, cutoff: DateTime<Utc>) -> RepoResult<u64> {
        (**self).delete_created_before(cutoff)
    }
}

/// Validates `name`, reporting a rejection to `sink` on failure.
pub(crate) fn check_name(sink: &dyn EventSink, name: &str) -> RepoResult<()> {
    validate_record_name(name).map_err(|reason| {
        sink.emit(&LifecycleEvent::RecordRejected {
            reason: reason.clone(),
        });
        RepoError::Validation(reason)
    })
}

/// Reports a non-positive id to `sink`; returns whether `id` is usable.
pub(crate) fn check_id(sink: &dyn EventSink, id: RecordId, operation: &'static str) -> bool {
    if id <= 0 {
        sink.emit(&LifecycleEvent::InvalidId { id, operation });
        return false;
    }
    true
}

/// SQLite-backed record store.
///
/// Owns its connection; calls from multiple threads are serialized.
pub struct SqliteRecordRepository {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
}

impl SqliteRecordRepository {
    /// Wraps a migrated connection (see `db::open_db`).
    ///
    /// Uses the system clock and the `log` event sink.
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Mutex::new(conn),
            clock: Arc::new(SystemClock),
            sink: Arc::new(LogEventSink),
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

    /// Releases the underlying connection.
    pub fn into_inner(self) -> Connection {
        self.conn.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        // A panic mid-call leaves no uncommitted SQLite state behind.
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordRepository for SqliteRecordRepository {
    fn insert(&self, name: &str) -> RepoResult<Record> {
        check_name(self.sink.as_ref(), name)?;

        let created_at = storage_timestamp(self.clock.now());
        let id = {
            let conn = self.conn();
            conn.execute(
                "INSERT INTO records (name, created_at) VALUES (?1, ?2);",
                params![name, created_at.timestamp_millis()],
            )?;
            conn.last_insert_rowid()
        };

        self.sink.emit(&LifecycleEvent::RecordAdded {
            id,
            name: name.to_string(),
        });

        Ok(Record {
            id,
            name: name.to_string(),
            created_at,
        })
    }

    fn bulk_insert(&self, names: &[String]) -> RepoResult<usize> {
        let created_at = storage_timestamp(self.clock.now()).timestamp_millis();
        let mut inserted = 0;
        {
            let mut conn = self.conn();
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            {
                let mut stmt =
                    tx.prepare_cached("INSERT INTO records (name, created_at) VALUES (?1, ?2);")?;
                for name in names {
                    if check_name(self.sink.as_ref(), name).is_err() {
                        continue;
                    }
                    stmt.execute(params![name, created_at])?;
                    inserted += 1;
                }
            }
            tx.commit()?;
        }

        self.sink
            .emit(&LifecycleEvent::BulkInserted { count: inserted });
        Ok(inserted)
    }

    fn scan_page(&self, after: Option<&ScanCursor>, limit: usize) -> RepoResult<Vec<Record>> {
        let conn = self.conn();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let mut stmt = match after {
            Some(_) => conn.prepare_cached(SCAN_AFTER_SQL)?,
            None => conn.prepare_cached(SCAN_FIRST_SQL)?,
        };

        let mut rows = match after {
            Some(cursor) => stmt.query(params![
                cursor.created_at.timestamp_millis(),
                cursor.id,
                limit
            ])?,
            None => stmt.query(params![limit])?,
        };

        let mut records = Vec::new();
        while let Some(row) = rows.next()? {
            records.push(parse_record_row(row)?);
        }

        Ok(records)
    }

    fn count(&self) -> RepoResult<u64> {
        let total: i64 = self
            .conn()
            .query_row("SELECT COUNT(*) FROM records;", [], |row| row.get(0))?;
        to_count(total)
    }

    fn count_created_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> RepoResult<u64> {
        let total: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM records WHERE created_at >= ?1 AND created_at < ?2;",
            params![from.timestamp_millis(), to.timestamp_millis()],
            |row| row.get(0),
        )?;
        to_count(total)
    }

    fn exists_by_name(&self, name: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM records WHERE name = ?1);",
            [name],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn get_by_id(&self, id: RecordId) -> RepoResult<Option<Record>> {
        if !check_id(self.sink.as_ref(), id, "get") {
            return Ok(None);
        }

        let record = query_record(&self.conn(), id)?;
        if record.is_none() {
            self.sink.emit(&LifecycleEvent::RecordNotFound {
                id,
                operation: "get",
            });
        }
        Ok(record)
    }

    fn delete_by_id(&self, id: RecordId) -> RepoResult<bool> {
        if !check_id(self.sink.as_ref(), id, "remove") {
            return Ok(false);
        }

        let removed_name = self
            .conn()
            .query_row(
                "DELETE FROM records WHERE id = ?1 RETURNING name;",
                [id],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        match removed_name {
            Some(name) => {
                self.sink.emit(&LifecycleEvent::RecordRemoved { id, name });
                Ok(true)
            }
            None => {
                self.sink.emit(&LifecycleEvent::RecordNotFound {
                    id,
                    operation: "remove",
                });
                Ok(false)
            }
        }
    }

    fn delete_created_before(&self, cutoff: DateTime<Utc>) -> RepoResult<u64> {
        let removed = self.conn().execute(
            "DELETE FROM records WHERE created_at < ?1;",
            [cutoff.timestamp_millis()],
        )?;
        Ok(removed as u64)
    }
}

fn parse_record_row(row: &Row<'_>) -> RepoResult<Record> {
    let id: RecordId = row.get("id")?;
    let name: String = row.get("name")?;
    validate_record_name(&name).map_err(|err| {
        RepoError::InvalidData(format!("invalid name for record {id} in records.name: {err}"))
    })?;

    let created_at_ms: i64 = row.get("created_at")?;
    let created_at = DateTime::from_timestamp_millis(created_at_ms).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid created_at value `{created_at_ms}` for record {id} in records.created_at"
        ))
    })?;

    Ok(Record {
        id,
        name,
        created_at,
    })
}

fn query_record(conn: &Connection, id: RecordId) -> RepoResult<Option<Record>> {
    let mut stmt = conn.prepare_cached(&format!("{RECORD_SELECT_SQL} WHERE id = ?1;"))?;
    let mut rows = stmt.query([id])?;
    if let Some(row) = rows.next()? {
        return Ok(Some(parse_record_row(row)?));
    }

    Ok(None)
}

fn to_count(value: i64) -> RepoResult<u64> {
    u64::try_from(value).map_err(|_| RepoError::InvalidData(format!("negative count `{value}`")))
}
