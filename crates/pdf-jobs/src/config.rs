//! Configuration for the job intake service and its worker

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Staging directory for uploaded/fetched PDFs
    pub staging: StagingConfig,
    /// Durable record store
    pub store: StoreConfig,
    /// Work queue
    pub queue: QueueConfig,
    /// Remote PDF fetching
    pub fetch: FetchConfig,
    /// Status reporting
    pub status: StatusConfig,
    /// Worker (consumer) configuration
    pub worker: WorkerConfig,
}

impl ServiceConfig {
    /// Load from an optional TOML file (falling back to `PDF_JOBS_CONFIG`),
    /// then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let from_env = std::env::var_os("PDF_JOBS_CONFIG").map(PathBuf::from);
        let mut config = match path.or(from_env.as_deref()) {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings under which admitted jobs could never be consumed
    pub fn validate(&self) -> Result<()> {
        if self.queue.backend == QueueBackend::Memory && !self.worker.embedded {
            return Err(Error::Config(
                "queue.backend = \"memory\" requires worker.embedded = true".to_string(),
            ));
        }
        if self.queue.key.is_empty() {
            return Err(Error::Config("queue.key must not be empty".to_string()));
        }
        Ok(())
    }

    /// Check that a standalone worker process can reach the server's queue
    pub fn validate_standalone_worker(&self) -> Result<()> {
        if self.queue.backend == QueueBackend::Memory {
            return Err(Error::Config(
                "a standalone worker cannot share an in-process queue; use queue.backend = \"sqlite\""
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Parse a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml(&content)
    }

    /// Parse TOML text; missing sections and keys fall back to defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("Invalid config: {}", e)))
    }

    /// Apply `PDF_JOBS_*` / `OLLAMA_*` overrides from the given lookup
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("PDF_JOBS_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PDF_JOBS_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| Error::Config(format!("PDF_JOBS_PORT is not a port: {}", port)))?;
        }
        if let Some(dir) = lookup("PDF_JOBS_STAGING_DIR") {
            self.staging.dir = PathBuf::from(dir);
        }
        if let Some(path) = lookup("PDF_JOBS_STORE_PATH") {
            self.store.path = PathBuf::from(path);
        }
        if let Some(path) = lookup("PDF_JOBS_QUEUE_PATH") {
            self.queue.path = PathBuf::from(path);
        }
        if let Some(key) = lookup("PDF_JOBS_QUEUE_KEY") {
            if key.is_empty() {
                return Err(Error::Config("PDF_JOBS_QUEUE_KEY must not be empty".to_string()));
            }
            self.queue.key = key;
        }
        if let Some(url) = lookup("OLLAMA_BASE_URL") {
            self.worker.summarizer.base_url = url;
        }
        if let Some(model) = lookup("OLLAMA_MODEL") {
            self.worker.summarizer.model = model;
        }
        Ok(())
    }

    /// Listen address as `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable permissive CORS
    pub enable_cors: bool,
    /// Maximum upload size in bytes (default: 100MB)
    pub max_upload_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
            max_upload_size: 100 * 1024 * 1024, // 100MB
        }
    }
}

/// Staging directory configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StagingConfig {
    /// Directory holding `{job_id}.pdf` files (relative paths resolve against the working directory)
    pub dir: PathBuf,
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("temp"),
        }
    }
}

/// Durable record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// SQLite database path
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/jobs.db"),
        }
    }
}

/// Work queue backend
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueueBackend {
    /// Durable named list in a SQLite file, shareable with an external worker process
    #[default]
    Sqlite,
    /// In-process list; only useful with an embedded worker
    Memory,
}

/// Which end of the list the consumer reads from.
/// Producers always push at the head.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QueueDiscipline {
    /// Consumer pops the tail: entries are consumed in insertion order
    #[default]
    Fifo,
    /// Consumer pops the head: newest entry first
    Lifo,
}

/// Work queue configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueueConfig {
    pub backend: QueueBackend,
    /// SQLite file for the `sqlite` backend
    pub path: PathBuf,
    /// Name of the list jobs are pushed onto
    pub key: String,
    pub discipline: QueueDiscipline,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: QueueBackend::Sqlite,
            path: PathBuf::from("data/queue.db"),
            key: "pdf_jobs".to_string(),
            discipline: QueueDiscipline::Fifo,
        }
    }
}

/// Remote PDF fetch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Whole-request timeout in seconds
    pub timeout_secs: u64,
    /// User agent sent with fetches
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 60,
            user_agent: concat!("pdf-jobs/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Status reporting configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Report `not_found` for unknown ids instead of `processing`
    pub report_not_found: bool,
}

/// How the worker writes a finished result
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CompletionMode {
    /// Update the existing row only; a missing row drops the result
    Update,
    /// Create the row from the payload when the placeholder is missing
    #[default]
    Upsert,
}

/// Worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Spawn a consumer inside the server process
    pub embedded: bool,
    /// Sleep between polls of an empty queue (milliseconds)
    pub poll_interval_ms: u64,
    /// Sleep after an unexpected loop error (seconds)
    pub error_backoff_secs: u64,
    pub completion: CompletionMode,
    /// Attempts to remove a staged file after processing
    pub cleanup_retries: u32,
    /// Delay between removal attempts (milliseconds)
    pub cleanup_retry_delay_ms: u64,
    /// How long server shutdown waits for the embedded worker's current job (seconds)
    pub shutdown_timeout_secs: u64,
    /// Also write each finished result to `{backup_dir}/{job_id}.json`
    pub backup_dir: Option<PathBuf>,
    pub summarizer: SummarizerConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            embedded: false,
            poll_interval_ms: 1000,
            error_backoff_secs: 5,
            completion: CompletionMode::Upsert,
            cleanup_retries: 5,
            cleanup_retry_delay_ms: 1000,
            shutdown_timeout_secs: 30,
            backup_dir: None,
            summarizer: SummarizerConfig::default(),
        }
    }
}

/// Ollama summarizer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummarizerConfig {
    /// Ollama base URL
    pub base_url: String,
    /// Generation model name
    pub model: String,
    pub temperature: f32,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Number of retries for failed requests
    pub max_retries: u32,
    /// Extracted text beyond this many characters is cut off before prompting
    pub max_input_chars: usize,
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "llama3.2:3b".to_string(),
            temperature: 0.1,
            timeout_secs: 300,
            max_retries: 2,
            max_input_chars: 60_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.address(), "0.0.0.0:8080");
        assert_eq!(config.staging.dir, PathBuf::from("temp"));
        assert_eq!(config.queue.key, "pdf_jobs");
        assert_eq!(config.queue.discipline, QueueDiscipline::Fifo);
        assert_eq!(config.worker.completion, CompletionMode::Upsert);
        assert!(!config.status.report_not_found);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ServiceConfig::from_toml(
            r#"
            [server]
            port = 9090

            [queue]
            backend = "memory"
            discipline = "lifo"

            [worker]
            completion = "update"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.queue.backend, QueueBackend::Memory);
        assert_eq!(config.queue.discipline, QueueDiscipline::Lifo);
        assert_eq!(config.queue.key, "pdf_jobs");
        assert_eq!(config.worker.completion, CompletionMode::Update);
        assert_eq!(config.worker.poll_interval_ms, 1000);
    }

    #[test]
    fn test_example_file_matches_defaults() {
        let config = ServiceConfig::from_toml(include_str!("../../../pdf-jobs.example.toml")).unwrap();
        let defaults = ServiceConfig::default();

        assert_eq!(config.address(), defaults.address());
        assert_eq!(config.server.max_upload_size, defaults.server.max_upload_size);
        assert_eq!(config.queue.backend, QueueBackend::Sqlite);
        assert_eq!(config.worker.cleanup_retries, defaults.worker.cleanup_retries);
        assert_eq!(
            config.worker.shutdown_timeout_secs,
            defaults.worker.shutdown_timeout_secs
        );
        assert_eq!(config.worker.backup_dir, None);
        assert_eq!(config.worker.summarizer.model, defaults.worker.summarizer.model);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = ServiceConfig::from_toml("[server]\nport = \"eighty\"").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_memory_queue_requires_embedded_worker() {
        let mut config = ServiceConfig::default();
        config.queue.backend = QueueBackend::Memory;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.worker.embedded = true;
        assert!(config.validate().is_ok());
        assert!(ServiceConfig::default().validate().is_ok());
    }

    #[test]
    fn test_standalone_worker_refuses_memory_queue() {
        let mut config = ServiceConfig::default();
        assert!(config.validate_standalone_worker().is_ok());

        config.queue.backend = QueueBackend::Memory;
        config.worker.embedded = true;
        assert!(matches!(
            config.validate_standalone_worker(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("PDF_JOBS_PORT", "3000"),
            ("PDF_JOBS_STAGING_DIR", "/var/spool/pdf"),
            ("PDF_JOBS_QUEUE_KEY", "other_jobs"),
            ("OLLAMA_MODEL", "phi3"),
        ]
        .into_iter()
        .collect();

        let mut config = ServiceConfig::default();
        config
            .apply_env(|key| env.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.staging.dir, PathBuf::from("/var/spool/pdf"));
        assert_eq!(config.queue.key, "other_jobs");
        assert_eq!(config.worker.summarizer.model, "phi3");
    }

    #[test]
    fn test_bad_port_override_rejected() {
        let mut config = ServiceConfig::default();
        let err = config
            .apply_env(|key| (key == "PDF_JOBS_PORT").then(|| "not-a-port".to_string()))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
