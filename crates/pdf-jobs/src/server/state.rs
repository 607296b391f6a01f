//! Application state for the job intake server

use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::admission::{AdmissionController, StagingArea};
use crate::config::ServiceConfig;
use crate::error::Result;
use crate::processing::{JobConsumer, OllamaSummarizer, Summarizer};
use crate::queue::{open_queue, WorkQueue};
use crate::status::StatusResolver;
use crate::storage::{RecordStore, SqliteRecordStore};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    /// Configuration
    config: ServiceConfig,
    /// Admission controller for both upload endpoints
    admission: AdmissionController,
    /// Status resolver over the record store
    resolver: StatusResolver,
    /// Durable record store
    store: Arc<dyn RecordStore>,
    /// Work queue
    queue: Arc<dyn WorkQueue>,
    /// Embedded worker, if one was spawned
    worker: Option<EmbeddedWorker>,
}

struct EmbeddedWorker {
    shutdown: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl AppState {
    /// Open the configured store and queue and build the state
    pub async fn new(config: ServiceConfig) -> Result<Self> {
        tracing::info!("Initializing job intake state...");
        config.validate()?;

        let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::new(&config.store.path)?);
        tracing::info!("Record store opened at {}", config.store.path.display());

        let queue = open_queue(&config.queue)?;

        let summarizer: Option<Arc<dyn Summarizer>> = if config.worker.embedded {
            Some(Arc::new(OllamaSummarizer::new(&config.worker.summarizer)?))
        } else {
            None
        };

        Self::with_components(config, queue, store, summarizer)
    }

    /// Build the state from already-open components.
    ///
    /// When a summarizer is given, a [`JobConsumer`] is spawned on the
    /// current runtime and consumes the same queue.
    pub fn with_components(
        config: ServiceConfig,
        queue: Arc<dyn WorkQueue>,
        store: Arc<dyn RecordStore>,
        summarizer: Option<Arc<dyn Summarizer>>,
    ) -> Result<Self> {
        let staging = StagingArea::new(&config.staging.dir)?;
        tracing::info!("Staging PDFs under {}", staging.dir().display());

        let http = AdmissionController::http_client(&config.fetch)?;
        let admission = AdmissionController::new(Arc::clone(&queue), Arc::clone(&store), staging, http);
        let resolver = StatusResolver::new(Arc::clone(&store), config.status.report_not_found);

        let worker = summarizer.map(|summarizer| {
            let (shutdown, rx) = watch::channel(false);
            let consumer = JobConsumer::new(
                Arc::clone(&queue),
                Arc::clone(&store),
                summarizer,
                config.worker.clone(),
            );
            let handle = tokio::spawn(async move {
                consumer.run(rx).await;
            });
            tracing::info!("Embedded worker started");
            EmbeddedWorker {
                shutdown,
                handle: Mutex::new(Some(handle)),
            }
        });

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                admission,
                resolver,
                store,
                queue,
                worker,
            }),
        })
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.inner.config
    }

    pub fn admission(&self) -> &AdmissionController {
        &self.inner.admission
    }

    pub fn resolver(&self) -> &StatusResolver {
        &self.inner.resolver
    }

    /// Both backing services answer a ping
    pub fn is_ready(&self) -> bool {
        let store = self.inner.store.ping();
        let queue = self.inner.queue.ping();

        if let Err(e) = &store {
            tracing::warn!("Record store not ready: {}", e);
        }
        if let Err(e) = &queue {
            tracing::warn!("Work queue not ready: {}", e);
        }
        store.is_ok() && queue.is_ok()
    }

    /// Ask the embedded worker, if any, to stop after its current job and
    /// wait up to `worker.shutdown_timeout_secs` for it to finish
    pub async fn stop_worker(&self) {
        let Some(worker) = &self.inner.worker else {
            return;
        };
        let _ = worker.shutdown.send(true);

        let Some(handle) = worker.handle.lock().take() else {
            return;
        };
        let timeout = Duration::from_secs(self.inner.config.worker.shutdown_timeout_secs);
        match tokio::time::timeout(timeout, handle).await {
            Ok(Ok(())) => tracing::info!("Embedded worker finished"),
            Ok(Err(e)) => tracing::error!("Embedded worker task failed: {}", e),
            Err(_) => tracing::warn!(
                "Embedded worker still busy after {:?}; abandoning in-flight job",
                timeout
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QueueBackend;
    use crate::error::Error;
    use crate::processing::ExtractedDocument;
    use crate::queue::{MemoryQueue, QueueDiscipline};
    use crate::test_support::sample_pdf;
    use async_trait::async_trait;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_memory_queue_without_consumer_is_rejected() {
        let mut config = ServiceConfig::default();
        config.queue.backend = QueueBackend::Memory;
        config.worker.embedded = false;

        let err = AppState::new(config).await.err().unwrap();
        assert!(matches!(err, Error::Config(_)));
    }

    /// Signals when a summary starts, then takes a while to answer
    struct SlowSummarizer {
        started: Arc<Notify>,
    }

    #[async_trait]
    impl Summarizer for SlowSummarizer {
        async fn summarize(&self, _document: &ExtractedDocument) -> Result<String> {
            self.started.notify_one();
            tokio::time::sleep(Duration::from_millis(300)).await;
            Ok("finished after shutdown".to_string())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    #[tokio::test]
    async fn test_stop_worker_waits_for_in_flight_job() {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig::default();
        config.staging.dir = tmp.path().join("temp");
        config.worker.embedded = true;
        config.worker.poll_interval_ms = 10;
        config.worker.cleanup_retry_delay_ms = 1;

        let started = Arc::new(Notify::new());
        let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
        let state = AppState::with_components(
            config,
            Arc::new(MemoryQueue::new("pdf_jobs", QueueDiscipline::Fifo)),
            store.clone(),
            Some(Arc::new(SlowSummarizer {
                started: Arc::clone(&started),
            }) as Arc<dyn Summarizer>),
        )
        .unwrap();

        let admission = state
            .admission()
            .admit_upload(Some("report.pdf"), &sample_pdf(1))
            .await
            .unwrap();

        tokio::time::timeout(Duration::from_secs(5), started.notified())
            .await
            .unwrap();
        state.stop_worker().await;

        let record = store
            .get_job(&admission.job_id.to_string())
            .unwrap()
            .unwrap();
        assert!(record.is_done());
        assert_eq!(record.summary, "finished after shutdown");

        // A second call is a no-op
        state.stop_worker().await;
    }
}
