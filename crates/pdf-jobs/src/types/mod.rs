//! Core types for the job intake service

pub mod job;
pub mod response;

pub use job::{JobId, JobPayload, JobRecord, NewJob, Origin};
pub use response::{AdmitResponse, HealthResponse, StatusResponse};
