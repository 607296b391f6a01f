//! HTTP response bodies

use serde::{Deserialize, Serialize};

use crate::status::JobState;
use crate::types::JobId;

/// Body returned by both admission endpoints
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AdmitResponse {
    pub job_id: JobId,
    /// Always "queued"
    pub status: String,
}

impl AdmitResponse {
    pub fn queued(job_id: JobId) -> Self {
        Self {
            job_id,
            status: "queued".to_string(),
        }
    }
}

/// Body returned by `GET /status/{job_id}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusResponse {
    /// "processing", "done" or (when enabled) "not_found"
    pub status: String,
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pages: Option<u32>,
}

impl StatusResponse {
    pub fn from_state(job_id: impl Into<String>, state: JobState) -> Self {
        let job_id = job_id.into();
        match state {
            JobState::Processing => Self {
                status: "processing".to_string(),
                job_id,
                result: None,
                pages: None,
            },
            JobState::NotFound => Self {
                status: "not_found".to_string(),
                job_id,
                result: None,
                pages: None,
            },
            JobState::Done { result, pages } => Self {
                status: "done".to_string(),
                job_id,
                result: Some(result),
                pages: Some(pages),
            },
        }
    }
}

/// Liveness / readiness body
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthResponse {
    pub status: String,
}

impl HealthResponse {
    pub fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
        }
    }
}
