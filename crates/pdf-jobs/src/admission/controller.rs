//! Admission controller: validate, stage, enqueue, record

use reqwest::Url;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::staging::StagingArea;
use crate::config::FetchConfig;
use crate::error::{Error, Result};
use crate::queue::WorkQueue;
use crate::storage::RecordStore;
use crate::types::{JobId, JobPayload, Origin};

const PDF_SUFFIX: &str = ".pdf";

/// Outcome of a successful admission
#[derive(Debug, Clone)]
pub struct Admission {
    pub job_id: JobId,
    pub source_path: PathBuf,
    pub filename: String,
    /// Whether the placeholder row was written. The caller is told "queued"
    /// either way, since the queue push already committed the job.
    pub recorded: bool,
}

/// Orchestrates job admission against an injected queue and record store
pub struct AdmissionController {
    queue: Arc<dyn WorkQueue>,
    store: Arc<dyn RecordStore>,
    staging: StagingArea,
    http: reqwest::Client,
}

impl AdmissionController {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        store: Arc<dyn RecordStore>,
        staging: StagingArea,
        http: reqwest::Client,
    ) -> Self {
        Self {
            queue,
            store,
            staging,
            http,
        }
    }

    /// Build the HTTP client used for URL admissions
    pub fn http_client(config: &FetchConfig) -> Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))
    }

    pub fn staging(&self) -> &StagingArea {
        &self.staging
    }

    /// Admit an uploaded file
    pub async fn admit_upload(&self, filename: Option<&str>, data: &[u8]) -> Result<Admission> {
        let filename = filename.ok_or_else(|| Error::invalid_input("No file uploaded"))?;
        if !has_pdf_suffix(filename) {
            return Err(Error::invalid_input("File must be PDF"));
        }

        let job_id = JobId::generate();
        let source_path = self.staging.write(&job_id, data).await?;

        let payload = JobPayload::new(job_id, source_path, filename, Origin::Upload);
        self.commit(payload).await
    }

    /// Admit a remote PDF by URL
    pub async fn admit_url(&self, source_url: &str) -> Result<Admission> {
        if source_url.is_empty() {
            return Err(Error::invalid_input("Invalid JSON: missing 'url'"));
        }
        if !has_pdf_suffix(source_url) {
            return Err(Error::invalid_input("URL must point to a PDF"));
        }
        let url = Url::parse(source_url)
            .map_err(|e| Error::invalid_input(format!("Invalid URL '{}': {}", source_url, e)))?;
        let filename = filename_from_url(&url);

        tracing::info!("Downloading PDF from {}", url);
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::fetch_failed(format!("Failed to download PDF from URL: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::fetch_failed(format!("Download failed: {}", status.as_u16())));
        }

        let job_id = JobId::generate();
        let source_path = self
            .staging
            .write_stream(&job_id, Box::pin(response.bytes_stream()))
            .await?;

        let payload = JobPayload::new(job_id, source_path, filename, Origin::Url);
        self.commit(payload).await
    }

    /// Push the payload, then insert the placeholder row.
    ///
    /// The two effects are not atomic. Once the push succeeds the job is
    /// committed, so a failed insert is logged and not surfaced.
    async fn commit(&self, payload: JobPayload) -> Result<Admission> {
        let entry = match payload.to_wire() {
            Ok(entry) => entry,
            Err(e) => {
                self.staging.discard(payload.source_path()).await;
                return Err(Error::admission(format!("Failed to marshal payload: {}", e)));
            }
        };

        if let Err(e) = self.queue.push(&entry) {
            self.staging.discard(payload.source_path()).await;
            return Err(Error::admission(format!("Failed to enqueue job: {}", e)));
        }
        tracing::info!(
            "Job {} queued to '{}' for {} ({})",
            payload.job_id,
            self.queue.key(),
            payload.filename,
            payload.origin()
        );

        let recorded = match self.store.insert_placeholder(&payload.as_new_job()) {
            Ok(()) => {
                tracing::info!("Placeholder inserted for job {}: {}", payload.job_id, payload.filename);
                true
            }
            Err(e) => {
                tracing::error!("Failed to insert placeholder for job {}: {}", payload.job_id, e);
                false
            }
        };

        Ok(Admission {
            job_id: payload.job_id,
            source_path: payload.source_path,
            filename: payload.filename,
            recorded,
        })
    }
}

/// Case-sensitive `.pdf` suffix check
pub fn has_pdf_suffix(name: &str) -> bool {
    name.ends_with(PDF_SUFFIX)
}

/// Final path segment of the URL
fn filename_from_url(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|last| !last.is_empty())
        .map(|last| last.to_string())
        .unwrap_or_else(|| "document.pdf".to_string())
}
