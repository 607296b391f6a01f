//! pdf-jobs: PDF job intake and status tracking
//!
//! Accepts PDFs by upload or URL, stages the bytes on disk, hands a job
//! payload to a work queue and records a placeholder row in a durable store.
//! Status queries read that store. A reference worker that consumes the
//! queue and stores summaries lives in [`processing`].

pub mod admission;
pub mod config;
pub mod error;
pub mod processing;
pub mod queue;
pub mod server;
pub mod status;
pub mod storage;
pub mod types;

#[cfg(test)]
mod test_support;

pub use config::ServiceConfig;
pub use error::{Error, Result};
pub use status::{JobState, StatusResolver};
pub use types::{
    job::{JobId, JobPayload, JobRecord, Origin},
    response::{AdmitResponse, StatusResponse},
};
