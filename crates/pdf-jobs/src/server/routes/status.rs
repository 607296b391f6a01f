//! Job status endpoint

use axum::{
    extract::{Path, State},
    Json,
};

use crate::error::Result;
use crate::server::state::AppState;
use crate::types::StatusResponse;

/// GET /status/:job_id - Current state of a job
pub async fn get_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<StatusResponse>> {
    let job_state = state.resolver().resolve(&job_id)?;
    Ok(Json(StatusResponse::from_state(job_id, job_state)))
}
