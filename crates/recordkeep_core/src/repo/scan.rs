//! Lazy, restartable scan over a record store.
//!
//! # Invariants
//! - Records are yielded ordered by `(created_at, id)` ascending.
//! - At most one page is held in memory at a time.
//! - The scan ends after the first storage error.

use crate::model::record::{Record, RecordId};
use crate::repo::record_repo::{RecordRepository, RepoResult};
use chrono::{DateTime, Utc};

/// Default number of records fetched per page.
pub const SCAN_PAGE_SIZE: usize = 500;

/// Keyset position of the last record seen by a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanCursor {
    pub created_at: DateTime<Utc>,
    pub id: RecordId,
}

impl From<&Record> for ScanCursor {
    fn from(record: &Record) -> Self {
        Self {
            created_at: record.created_at,
            id: record.id,
        }
    }
}

/// Iterator returned by [`RecordRepository::get_all`].
pub struct RecordScan<'repo, R: RecordRepository + ?Sized> {
    repo: &'repo R,
    page: std::vec::IntoIter<Record>,
    cursor: Option<ScanCursor>,
    page_size: usize,
    exhausted: bool,
}

impl<'repo, R: RecordRepository + ?Sized> RecordScan<'repo, R> {
    pub fn new(repo: &'repo R) -> Self {
        Self::with_page_size(repo, SCAN_PAGE_SIZE)
    }

    /// Creates a scan fetching `page_size` records per store call (min 1).
    pub fn with_page_size(repo: &'repo R, page_size: usize) -> Self {
        Self {
            repo,
            page: Vec::new().into_iter(),
            cursor: None,
            page_size: page_size.max(1),
            exhausted: false,
        }
    }
}

impl<R: RecordRepository + ?Sized> Iterator for RecordScan<'_, R> {
    type Item = RepoResult<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.page.next() {
                self.cursor = Some(ScanCursor::from(&record));
                return Some(Ok(record));
            }
            if self.exhausted {
                return None;
            }

            match self.repo.scan_page(self.cursor.as_ref(), self.page_size) {
                Ok(page) => {
                    if page.len() < self.page_size {
                        self.exhausted = true;
                    }
                    if page.is_empty() {
                        return None;
                    }
                    self.page = page.into_iter();
                }
                Err(err) => {
                    self.exhausted = true;
                    return Some(Err(err));
                }
            }
        }
    }
}
