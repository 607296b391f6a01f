//! Job identity, queue payload and persisted job rows

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Opaque job identifier (random v4 UUID)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Generate a fresh identifier. Never fails, safe to call from any thread.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Underlying UUID
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Name of the staged PDF for this job
    pub fn staged_file_name(&self) -> String {
        format!("{}.pdf", self.0)
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<Uuid> for JobId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

/// How the source bytes were obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Upload,
    Url,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Upload => "upload",
            Origin::Url => "url",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "upload" => Some(Origin::Upload),
            "url" => Some(Origin::Url),
            _ => None,
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable job description pushed onto the work queue.
///
/// Wire format is one JSON object per entry:
/// `{"job_id": ..., "pdf_path": ..., "filename": ..., "is_url": ...}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobPayload {
    pub job_id: JobId,
    #[serde(rename = "pdf_path")]
    pub source_path: PathBuf,
    pub filename: String,
    #[serde(default)]
    pub is_url: bool,
}

impl JobPayload {
    /// Build the payload for an admitted job
    pub fn new(job_id: JobId, source_path: PathBuf, filename: impl Into<String>, origin: Origin) -> Self {
        Self {
            job_id,
            source_path,
            filename: filename.into(),
            is_url: origin == Origin::Url,
        }
    }

    pub fn origin(&self) -> Origin {
        if self.is_url {
            Origin::Url
        } else {
            Origin::Upload
        }
    }

    pub fn source_path(&self) -> &Path {
        &self.source_path
    }

    /// Serialize to a queue entry
    pub fn to_wire(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode a queue entry
    pub fn from_wire(entry: &str) -> Result<Self> {
        serde_json::from_str(entry)
            .map_err(|e| Error::Queue(format!("Malformed queue entry: {}", e)))
    }

    /// Row that should exist for this payload
    pub fn as_new_job(&self) -> NewJob {
        NewJob {
            job_id: self.job_id,
            filename: self.filename.clone(),
            origin: self.origin(),
        }
    }
}

/// Placeholder row data written at admission time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub job_id: JobId,
    pub filename: String,
    pub origin: Origin,
}

/// A job row as stored in the durable record store
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub job_id: String,
    pub filename: String,
    pub origin: Origin,
    pub pages: u32,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl JobRecord {
    /// An empty summary is the only "not yet processed" signal
    pub fn is_done(&self) -> bool {
        !self.summary.is_empty()
    }
}
