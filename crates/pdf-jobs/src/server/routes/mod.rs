//! API routes for the job intake server

pub mod status;
pub mod upload;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::server::state::AppState;

/// Build the job routes
pub fn job_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Multipart upload - with larger body limit
        .route(
            "/upload-pdf",
            post(upload::upload_pdf).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/upload-url", post(upload::upload_url))
        .route("/status/:job_id", get(status::get_status))
}
