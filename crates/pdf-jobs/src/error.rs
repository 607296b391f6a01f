//! Error types for the job intake service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// Result type alias for job intake operations
pub type Result<T> = std::result::Result<T, Error>;

/// Job intake errors
#[derive(Debug, Error)]
pub enum Error {
    /// Client-correctable input problem (bad extension, missing field)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Remote source unreachable or answered with a non-success status
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// Infrastructure failure while admitting a job (disk, queue)
    #[error("Admission failed: {0}")]
    AdmissionFailed(String),

    /// Durable record store error
    #[error("Record store error: {0}")]
    Store(String),

    /// Work queue error
    #[error("Work queue error: {0}")]
    Queue(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Summarizer (LLM) error
    #[error("Summarization failed: {0}")]
    Summarization(String),

    /// Staged PDF could not be read as a document
    #[error("PDF extraction failed: {0}")]
    Extraction(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a fetch failure
    pub fn fetch_failed(message: impl Into<String>) -> Self {
        Self::FetchFailed(message.into())
    }

    /// Create an admission failure
    pub fn admission(message: impl Into<String>) -> Self {
        Self::AdmissionFailed(message.into())
    }

    /// Create a record store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// Create a work queue error
    pub fn queue(message: impl Into<String>) -> Self {
        Self::Queue(message.into())
    }

    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::InvalidInput(_) | Error::FetchFailed(_) | Error::Json(_) => {
                StatusCode::BAD_REQUEST
            }
            Error::Summarization(_) => StatusCode::BAD_GATEWAY,
            Error::AdmissionFailed(_)
            | Error::Store(_)
            | Error::Queue(_)
            | Error::Config(_)
            | Error::Extraction(_)
            | Error::Io(_)
            | Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "invalid_input",
            Error::FetchFailed(_) => "fetch_failed",
            Error::AdmissionFailed(_) => "admission_failed",
            Error::Store(_) => "store_error",
            Error::Queue(_) => "queue_error",
            Error::Config(_) => "config_error",
            Error::Summarization(_) => "summarization_error",
            Error::Extraction(_) => "extraction_error",
            Error::Io(_) => "io_error",
            Error::Json(_) => "json_error",
            Error::Internal(_) => "internal_error",
        }
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Store(err.to_string())
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Error::InvalidInput(msg)
            | Error::FetchFailed(msg)
            | Error::AdmissionFailed(msg)
            | Error::Store(msg)
            | Error::Queue(msg)
            | Error::Config(msg)
            | Error::Summarization(msg)
            | Error::Extraction(msg)
            | Error::Internal(msg) => msg.clone(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!("Request failed ({}): {}", status, message);
        }

        let body = Json(json!({
            "error": {
                "type": self.error_type(),
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}
