//! Durable record store for job rows
//!
//! The store is the source of truth for status queries. One row per job,
//! keyed by `job_id`; a row with a non-empty summary is terminal.

mod database;

pub use database::SqliteRecordStore;

use crate::error::Result;
use crate::types::{JobRecord, NewJob};

/// Trait for the durable record store
///
/// Implementations must serialize concurrent writes to the same row.
pub trait RecordStore: Send + Sync {
    /// Insert the empty-result placeholder row for a newly admitted job
    fn insert_placeholder(&self, job: &NewJob) -> Result<()>;

    /// Look up a job row by identifier
    fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>>;

    /// Fill `summary`/`pages` on an existing, unfinished row.
    ///
    /// Returns `false` when no unfinished row matched (missing or already done).
    fn complete_job(&self, job_id: &str, summary: &str, pages: u32) -> Result<bool>;

    /// Like [`RecordStore::complete_job`], but creates the row when the
    /// placeholder is missing. A finished row is still never modified.
    fn upsert_result(&self, job: &NewJob, summary: &str, pages: u32) -> Result<bool>;

    /// Cheap liveness check
    fn ping(&self) -> Result<()>;
}
