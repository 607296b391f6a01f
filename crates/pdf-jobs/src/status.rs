//! Status resolution from the durable record store
//!
//! Read-only: a status query never touches the queue or the staging area.

use std::sync::Arc;
use uuid::Uuid;

use crate::error::Result;
use crate::storage::RecordStore;

/// Externally visible state of a job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Admitted but not finished, or unknown when `not_found` reporting is off
    Processing,
    /// Worker stored a summary
    Done { result: String, pages: u32 },
    /// No row exists (only reported when enabled)
    NotFound,
}

/// Maps a job identifier to its current state
pub struct StatusResolver {
    store: Arc<dyn RecordStore>,
    report_not_found: bool,
}

impl StatusResolver {
    pub fn new(store: Arc<dyn RecordStore>, report_not_found: bool) -> Self {
        Self {
            store,
            report_not_found,
        }
    }

    /// Resolve the state of `job_id`.
    ///
    /// UUIDs are matched in their lower-case hyphenated form whatever their
    /// spelling; other identifiers are used verbatim. Anything that matches
    /// no row is `Processing` unless `not_found` reporting is enabled.
    pub fn resolve(&self, job_id: &str) -> Result<JobState> {
        let key = match Uuid::parse_str(job_id) {
            Ok(uuid) => uuid.hyphenated().to_string(),
            Err(_) => job_id.to_string(),
        };

        let state = match self.store.get_job(&key)? {
            Some(record) if record.is_done() => JobState::Done {
                result: record.summary,
                pages: record.pages,
            },
            Some(_) => JobState::Processing,
            None if self.report_not_found => JobState::NotFound,
            None => JobState::Processing,
        };

        tracing::debug!("Status for {}: {:?}", job_id, state);
        Ok(state)
    }
}
