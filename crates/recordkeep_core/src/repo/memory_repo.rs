//! In-memory record store.
//!
//! Satisfies the same contract as the SQLite store without any file I/O.
//! All state lives behind one lock, so every call is atomic.

use crate::audit::{EventSink, LifecycleEvent, LogEventSink};
use crate::clock::{Clock, SystemClock};
use crate::model::record::{storage_timestamp, Record, RecordId};
use crate::repo::record_repo::{check_id, check_name, RecordRepository, RepoResult};
use crate::repo::scan::ScanCursor;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

type OrderKey = (DateTime<Utc>, RecordId);

#[derive(Debug, Default)]
struct MemoryState {
    last_id: RecordId,
    by_order: BTreeMap<OrderKey, String>,
    created_by_id: HashMap<RecordId, DateTime<Utc>>,
    name_counts: HashMap<String, usize>,
}

impl MemoryState {
    fn push(&mut self, name: &str, created_at: DateTime<Utc>) -> RecordId {
        self.last_id += 1;
        let id = self.last_id;
        self.by_order.insert((created_at, id), name.to_string());
        self.created_by_id.insert(id, created_at);
        *self.name_counts.entry(name.to_string()).or_insert(0) += 1;
        id
    }

    fn forget_name(&mut self, name: &str) {
        if let Some(count) = self.name_counts.get_mut(name) {
            *count -= 1;
            if *count == 0 {
                self.name_counts.remove(name);
            }
        }
    }
}

/// Record store backed by ordered in-process maps.
pub struct MemoryRecordRepository {
    state: Mutex<MemoryState>,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
}

impl Default for MemoryRecordRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
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

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl RecordRepository for MemoryRecordRepository {
    fn insert(&self, name: &str) -> RepoResult<Record> {
        check_name(self.sink.as_ref(), name)?;

        let created_at = storage_timestamp(self.clock.now());
        let id = self.state().push(name, created_at);
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
        let created_at = storage_timestamp(self.clock.now());
        let mut inserted = 0;
        {
            let mut state = self.state();
            for name in names {
                if check_name(self.sink.as_ref(), name).is_err() {
                    continue;
                }
                state.push(name, created_at);
                inserted += 1;
            }
        }

        self.sink
            .emit(&LifecycleEvent::BulkInserted { count: inserted });
        Ok(inserted)
    }

    fn scan_page(&self, after: Option<&ScanCursor>, limit: usize) -> RepoResult<Vec<Record>> {
        let lower = match after {
            Some(cursor) => Bound::Excluded((cursor.created_at, cursor.id)),
            None => Bound::Unbounded,
        };

        let state = self.state();
        let page = state
            .by_order
            .range((lower, Bound::Unbounded))
            .take(limit)
            .map(|(&(created_at, id), name)| Record {
                id,
                name: name.clone(),
                created_at,
            })
            .collect();
        Ok(page)
    }

    fn count(&self) -> RepoResult<u64> {
        Ok(self.state().by_order.len() as u64)
    }

    fn count_created_between(&self, from: DateTime<Utc>, to: DateTime<Utc>) -> RepoResult<u64> {
        let from = storage_timestamp(from);
        let to = storage_timestamp(to);
        if from >= to {
            return Ok(0);
        }

        let state = self.state();
        let count = state
            .by_order
            .range((from, RecordId::MIN)..(to, RecordId::MIN))
            .count();
        Ok(count as u64)
    }

    fn exists_by_name(&self, name: &str) -> RepoResult<bool> {
        Ok(self.state().name_counts.contains_key(name))
    }

    fn get_by_id(&self, id: RecordId) -> RepoResult<Option<Record>> {
        if !check_id(self.sink.as_ref(), id, "get") {
            return Ok(None);
        }

        let record = {
            let state = self.state();
            state.created_by_id.get(&id).and_then(|&created_at| {
                state.by_order.get(&(created_at, id)).map(|name| Record {
                    id,
                    name: name.clone(),
                    created_at,
                })
            })
        };

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

        let removed_name = {
            let mut state = self.state();
            let removed = state
                .created_by_id
                .remove(&id)
                .and_then(|created_at| state.by_order.remove(&(created_at, id)));
            if let Some(name) = &removed {
                state.forget_name(name);
            }
            removed
        };

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
        let cutoff = storage_timestamp(cutoff);
        let mut state = self.state();

        let kept = state.by_order.split_off(&(cutoff, RecordId::MIN));
        let expired = std::mem::replace(&mut state.by_order, kept);
        for ((_, id), name) in &expired {
            state.created_by_id.remove(id);
            state.forget_name(name);
        }

        Ok(expired.len() as u64)
    }
}
