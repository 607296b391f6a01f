//! HTTP server for job intake and status

pub mod routes;
pub mod state;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use std::future::Future;
use std::net::SocketAddr;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::types::HealthResponse;
use state::AppState;

/// Job intake HTTP server
pub struct JobServer {
    config: ServiceConfig,
    state: AppState,
}

impl JobServer {
    /// Create a server with state opened from the configuration
    pub async fn new(config: ServiceConfig) -> Result<Self> {
        let state = AppState::new(config.clone()).await?;
        Ok(Self { config, state })
    }

    /// Create a server around prepared state
    pub fn with_state(state: AppState) -> Self {
        Self {
            config: state.config().clone(),
            state,
        }
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let router = Router::new()
            .route("/health", get(health_check))
            .route("/ready", get(readiness))
            .merge(routes::job_routes(self.config.server.max_upload_size))
            .with_state(self.state.clone())
            .layer(TraceLayer::new_for_http());

        if self.config.server.enable_cors {
            let cors = CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any);
            router.layer(cors)
        } else {
            router
        }
    }

    /// Start the server and run until Ctrl-C
    pub async fn start(self) -> Result<()> {
        self.start_with_shutdown(shutdown_signal()).await
    }

    /// Start the server and run until `signal` resolves
    pub async fn start_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = self
            .address()
            .parse()
            .map_err(|e| Error::Config(format!("Invalid address: {}", e)))?;

        let router = self.router();

        tracing::info!("Starting job intake server on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| Error::Config(format!("Failed to bind: {}", e)))?;

        axum::serve(listener, router)
            .with_graceful_shutdown(signal)
            .await
            .map_err(|e| Error::Internal(format!("Server error: {}", e)))?;

        self.state.stop_worker().await;
        tracing::info!("Server stopped");
        Ok(())
    }

    /// Get the server address
    pub fn address(&self) -> String {
        self.config.address()
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::new("OK"))
}

/// Readiness check endpoint
async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    if state.is_ready() {
        (StatusCode::OK, Json(HealthResponse::new("ready")))
    } else {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(HealthResponse::new("unavailable")),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processing::{ExtractedDocument, Summarizer};
    use crate::queue::{MemoryQueue, QueueDiscipline, WorkQueue};
    use crate::storage::{RecordStore, SqliteRecordStore};
    use crate::test_support::{sample_pdf, serve_pdfs, FailingQueue, MINIMAL_PDF};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;
    use uuid::Uuid;

    const BOUNDARY: &str = "----pdfjobsboundary";

    struct TestApp {
        _tmp: tempfile::TempDir,
        router: Router,
        queue: Arc<dyn WorkQueue>,
        store: Arc<SqliteRecordStore>,
    }

    fn app_with(
        queue: Arc<dyn WorkQueue>,
        summarizer: Option<Arc<dyn Summarizer>>,
        configure: impl FnOnce(&mut ServiceConfig),
    ) -> TestApp {
        let tmp = tempfile::tempdir().unwrap();
        let mut config = ServiceConfig::default();
        config.staging.dir = tmp.path().join("temp");
        config.worker.poll_interval_ms = 10;
        config.worker.cleanup_retry_delay_ms = 1;
        configure(&mut config);

        let store = Arc::new(SqliteRecordStore::in_memory().unwrap());
        let state =
            AppState::with_components(config, Arc::clone(&queue), store.clone(), summarizer).unwrap();
        TestApp {
            _tmp: tmp,
            router: JobServer::with_state(state).router(),
            queue,
            store,
        }
    }

    fn app() -> TestApp {
        app_with(
            Arc::new(MemoryQueue::new("pdf_jobs", QueueDiscipline::Fifo)),
            None,
            |_| {},
        )
    }

    fn multipart_request(field: &str, filename: &str, data: &[u8]) -> Request<Body> {
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{b}\r\nContent-Disposition: form-data; name=\"{f}\"; filename=\"{n}\"\r\nContent-Type: application/pdf\r\n\r\n",
                b = BOUNDARY,
                f = field,
                n = filename
            )
            .as_bytes(),
        );
        body.extend_from_slice(data);
        body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

        Request::post("/upload-pdf")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", BOUNDARY),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn json_request(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let app = app();
        let (status, body) = send(&app.router, get("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, serde_json::json!({"status": "OK"}));
    }

    #[tokio::test]
    async fn test_ready_reflects_backends() {
        let app = app();
        let (status, body) = send(&app.router, get("/ready")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ready");

        let broken = app_with(Arc::new(FailingQueue::default()), None, |_| {});
        let (status, body) = send(&broken.router, get("/ready")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["status"], "unavailable");
    }

    #[tokio::test]
    async fn test_upload_then_poll_until_done() {
        let app = app();

        let (status, body) =
            send(&app.router, multipart_request("file", "report.pdf", MINIMAL_PDF)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "queued");
        let job_id = body["job_id"].as_str().unwrap().to_string();
        assert!(Uuid::parse_str(&job_id).is_ok());
        assert_eq!(app.queue.len().unwrap(), 1);

        let uri = format!("/status/{}", job_id);
        let (status, body) = send(&app.router, get(&uri)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({"status": "processing", "job_id": job_id})
        );

        assert!(app
            .store
            .complete_job(&job_id, "Executive summary...", 12)
            .unwrap());

        let (_, body) = send(&app.router, get(&uri)).await;
        assert_eq!(body["status"], "done");
        assert_eq!(body["job_id"], job_id);
        assert_eq!(body["result"], "Executive summary...");
        assert_eq!(body["pages"], 12);
    }

    #[tokio::test]
    async fn test_non_pdf_upload_is_rejected() {
        let app = app();
        let (status, body) = send(&app.router, multipart_request("file", "notes.txt", b"hi")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "invalid_input");
        assert_eq!(body["error"]["message"], "File must be PDF");
        assert!(app.queue.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_upload_without_file_field() {
        let app = app();
        let (status, body) =
            send(&app.router, multipart_request("document", "report.pdf", MINIMAL_PDF)).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "No file uploaded");
    }

    #[tokio::test]
    async fn test_upload_queue_failure_is_500() {
        let app = app_with(Arc::new(FailingQueue::default()), None, |_| {});
        let (status, body) =
            send(&app.router, multipart_request("file", "report.pdf", MINIMAL_PDF)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"]["type"], "admission_failed");
    }

    #[tokio::test]
    async fn test_upload_url_validation() {
        let app = app();

        for body in [
            "{not json",
            "{}",
            r#"{"url": "https://example.com/index.html"}"#,
        ] {
            let (status, _) = send(&app.router, json_request("/upload-url", body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {:?}", body);
        }
        assert!(app.queue.is_empty().unwrap());
    }

    #[tokio::test]
    async fn test_upload_url_fetch() {
        let app = app();
        let base = serve_pdfs().await;

        let ok = format!(r#"{{"url": "{}/docs/paper.pdf"}}"#, base);
        let (status, body) = send(&app.router, json_request("/upload-url", &ok)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "queued");

        let missing = format!(r#"{{"url": "{}/gone.pdf"}}"#, base);
        let (status, body) = send(&app.router, json_request("/upload-url", &missing)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "fetch_failed");
        assert_eq!(body["error"]["message"], "Download failed: 404");

        assert_eq!(app.queue.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_unknown_job_status() {
        let app = app();
        let (status, body) = send(&app.router, get("/status/not-a-real-id")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "processing");

        let strict = app_with(
            Arc::new(MemoryQueue::new("pdf_jobs", QueueDiscipline::Fifo)),
            None,
            |config| config.status.report_not_found = true,
        );
        let (status, body) = send(&strict.router, get("/status/not-a-real-id")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({"status": "not_found", "job_id": "not-a-real-id"})
        );
    }

    struct EchoPages;

    #[async_trait]
    impl Summarizer for EchoPages {
        async fn summarize(&self, document: &ExtractedDocument) -> crate::error::Result<String> {
            Ok(format!("A {}-page report", document.pages))
        }

        fn name(&self) -> &str {
            "echo"
        }
    }

    #[tokio::test]
    async fn test_embedded_worker_completes_upload() {
        let app = app_with(
            Arc::new(MemoryQueue::new("pdf_jobs", QueueDiscipline::Fifo)),
            Some(Arc::new(EchoPages) as Arc<dyn Summarizer>),
            |config| config.worker.embedded = true,
        );

        let (_, body) =
            send(&app.router, multipart_request("file", "report.pdf", &sample_pdf(2))).await;
        let uri = format!("/status/{}", body["job_id"].as_str().unwrap());

        let mut last = Value::Null;
        for _ in 0..200 {
            let (_, body) = send(&app.router, get(&uri)).await;
            if body["status"] == "done" {
                last = body;
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(25)).await;
        }

        assert_eq!(last["result"], "A 2-page report");
        assert_eq!(last["pages"], 2);
        assert!(app.store.ping().is_ok());
    }
}
