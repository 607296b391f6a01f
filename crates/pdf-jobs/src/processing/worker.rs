//! Queue consumer that turns staged PDFs into stored summaries

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::sleep;

use super::pdf::{self, ExtractedDocument};
use super::summarizer::Summarizer;
use crate::config::{CompletionMode, WorkerConfig};
use crate::error::{Error, Result};
use crate::queue::WorkQueue;
use crate::storage::RecordStore;
use crate::types::{JobId, JobPayload};

/// What happened to one popped queue entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Summary produced. `row_written` is false when the store already held
    /// a result, or (in update mode) when no placeholder row existed.
    Completed {
        job_id: JobId,
        pages: u32,
        row_written: bool,
    },
    /// Entry could not be decoded and was dropped
    Discarded,
    /// Job could not be processed; its row is left untouched
    Failed { job_id: JobId, reason: String },
}

/// Pops job payloads and writes results back to the record store
pub struct JobConsumer {
    queue: Arc<dyn WorkQueue>,
    store: Arc<dyn RecordStore>,
    summarizer: Arc<dyn Summarizer>,
    config: WorkerConfig,
}

impl JobConsumer {
    pub fn new(
        queue: Arc<dyn WorkQueue>,
        store: Arc<dyn RecordStore>,
        summarizer: Arc<dyn Summarizer>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            store,
            summarizer,
            config,
        }
    }

    /// Consume until `shutdown` flips to true or its sender is dropped
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        let poll_interval = Duration::from_millis(self.config.poll_interval_ms);
        let error_backoff = Duration::from_secs(self.config.error_backoff_secs);

        tracing::info!(
            "Worker started: waiting for jobs on '{}' (summarizer: {}, completion: {:?})",
            self.queue.key(),
            self.summarizer.name(),
            self.config.completion
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let pause = match self.process_next().await {
                Ok(Some(_)) => None,
                Ok(None) => Some(poll_interval),
                Err(e) => {
                    tracing::error!("Unexpected error in worker loop: {}", e);
                    Some(error_backoff)
                }
            };

            if let Some(pause) = pause {
                tokio::select! {
                    _ = sleep(pause) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        tracing::info!("Worker stopped");
    }

    /// Pop and process a single entry. `None` when the queue is empty.
    ///
    /// Per-job failures are reported through [`Outcome`]; only queue errors
    /// are returned as `Err`.
    pub async fn process_next(&self) -> Result<Option<Outcome>> {
        let Some(entry) = self.queue.pop()? else {
            return Ok(None);
        };

        let payload = match JobPayload::from_wire(&entry) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!("Discarding queue entry: {}", e);
                return Ok(Some(Outcome::Discarded));
            }
        };

        tracing::info!(
            "Processing job {}: {} from {}",
            payload.job_id,
            payload.filename,
            payload.source_path.display()
        );

        let outcome = match self.process(&payload).await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("Job {} failed: {}", payload.job_id, e);
                Outcome::Failed {
                    job_id: payload.job_id,
                    reason: e.to_string(),
                }
            }
        };

        self.remove_staged(payload.source_path()).await;
        Ok(Some(outcome))
    }

    async fn process(&self, payload: &JobPayload) -> Result<Outcome> {
        let data = match tokio::fs::read(&payload.source_path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::Extraction(format!(
                    "File not found at {}",
                    payload.source_path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };

        let document: ExtractedDocument = pdf::extract(data).await?;
        if !document.has_text() {
            tracing::warn!("No extractable text in {}", payload.filename);
        }

        let summary = self.summarizer.summarize(&document).await?;
        if summary.trim().is_empty() {
            return Err(Error::Summarization(format!(
                "{} returned an empty summary",
                self.summarizer.name()
            )));
        }

        if let Some(dir) = &self.config.backup_dir {
            if let Err(e) = write_backup(dir, payload, &document, &summary).await {
                tracing::warn!("Failed to write backup for {}: {}", payload.job_id, e);
            }
        }

        let job_id = payload.job_id.to_string();
        let row_written = match self.config.completion {
            CompletionMode::Update => self.store.complete_job(&job_id, &summary, document.pages)?,
            CompletionMode::Upsert => {
                self.store
                    .upsert_result(&payload.as_new_job(), &summary, document.pages)?
            }
        };

        if row_written {
            tracing::info!("Summary done for {} ({} pages)", job_id, document.pages);
        } else {
            tracing::warn!(
                "Result for {} not stored: no unfinished row matched ({:?} mode)",
                job_id,
                self.config.completion
            );
        }

        Ok(Outcome::Completed {
            job_id: payload.job_id,
            pages: document.pages,
            row_written,
        })
    }

    /// Remove a staged file, retrying transient failures
    async fn remove_staged(&self, path: &Path) {
        let attempts = self.config.cleanup_retries.max(1);
        let delay = Duration::from_millis(self.config.cleanup_retry_delay_ms);

        for attempt in 1..=attempts {
            match tokio::fs::remove_file(path).await {
                Ok(()) => return,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return,
                Err(e) if attempt < attempts => {
                    tracing::debug!("Failed to delete {} (attempt {}): {}", path.display(), attempt, e);
                    sleep(delay).await;
                }
                Err(e) => {
                    tracing::warn!(
                        "Could not delete {} after {} attempts: {}",
                        path.display(),
                        attempts,
                        e
                    );
                }
            }
        }
    }
}

/// Write the finished result to `{dir}/{job_id}.json`
async fn write_backup(
    dir: &Path,
    payload: &JobPayload,
    document: &ExtractedDocument,
    summary: &str,
) -> Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    let body = serde_json::to_vec_pretty(&serde_json::json!({
        "job_id": payload.job_id,
        "filename": payload.filename,
        "source": payload.origin().as_str(),
        "pages": document.pages,
        "text_length": document.text.chars().count(),
        "summary": summary,
        "processed_at": chrono::Utc::now().to_rfc3339(),
    }))?;
    tokio::fs::write(dir.join(format!("{}.json", payload.job_id)), body).await?;
    Ok(())
}
