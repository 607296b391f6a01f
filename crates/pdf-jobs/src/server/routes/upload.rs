//! Admission endpoints: multipart upload and remote URL

use axum::{
    extract::{rejection::JsonRejection, Multipart, State},
    Json,
};
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::AdmitResponse;

/// Name of the multipart field carrying the PDF
const FILE_FIELD: &str = "file";

/// Body of `POST /upload-url`
#[derive(Debug, Deserialize)]
pub struct UrlRequest {
    pub url: String,
}

/// POST /upload-pdf - Admit an uploaded PDF
pub async fn upload_pdf(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AdmitResponse>> {
    let mut upload: Option<(Option<String>, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::invalid_input(format!("No file uploaded: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(|s| s.to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| Error::invalid_input(format!("No file uploaded: {}", e)))?;

        tracing::info!(
            "Received upload: {} ({} bytes)",
            filename.as_deref().unwrap_or("<unnamed>"),
            data.len()
        );
        upload = Some((filename, data.to_vec()));
        break;
    }

    let (filename, data) = upload.unwrap_or((None, Vec::new()));
    let admission = state
        .admission()
        .admit_upload(filename.as_deref(), &data)
        .await?;

    Ok(Json(AdmitResponse::queued(admission.job_id)))
}

/// POST /upload-url - Admit a PDF fetched from a URL
pub async fn upload_url(
    State(state): State<AppState>,
    body: std::result::Result<Json<UrlRequest>, JsonRejection>,
) -> Result<Json<AdmitResponse>> {
    let Json(request) =
        body.map_err(|e| Error::invalid_input(format!("Invalid JSON: missing 'url' ({})", e)))?;

    let admission = state.admission().admit_url(&request.url).await?;

    Ok(Json(AdmitResponse::queued(admission.job_id)))
}
