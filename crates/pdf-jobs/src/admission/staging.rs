//! Staging directory for materialized PDF bytes
//!
//! Every admitted job owns exactly one file, `{job_id}.pdf`, under the
//! staging directory. The external worker reads it and removes it.

use futures_util::{Stream, StreamExt};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::error::{Error, Result};
use crate::types::JobId;

/// Staging directory with absolute paths
#[derive(Debug, Clone)]
pub struct StagingArea {
    dir: PathBuf,
}

impl StagingArea {
    /// Resolve `dir` against the working directory; the directory itself is created lazily
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let dir = if dir.is_absolute() {
            dir.to_path_buf()
        } else {
            std::env::current_dir()
                .map_err(|e| Error::Config(format!("Failed to resolve working directory: {}", e)))?
                .join(dir)
        };
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Absolute location of a job's staged PDF
    pub fn path_for(&self, job_id: &JobId) -> PathBuf {
        self.dir.join(job_id.staged_file_name())
    }

    async fn ensure_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            Error::admission(format!(
                "Failed to create staging dir {}: {}",
                self.dir.display(),
                e
            ))
        })
    }

    /// Write an in-memory upload to `{job_id}.pdf`
    pub async fn write(&self, job_id: &JobId, data: &[u8]) -> Result<PathBuf> {
        self.ensure_dir().await?;
        let path = self.path_for(job_id);

        if let Err(e) = tokio::fs::write(&path, data).await {
            self.discard(&path).await;
            return Err(Error::admission(format!("Failed to save file: {}", e)));
        }

        tracing::debug!("Staged {} bytes at {}", data.len(), path.display());
        Ok(path)
    }

    /// Stream a body to `{job_id}.pdf`.
    ///
    /// Body errors are fetch failures, write errors are admission failures;
    /// either way the partial file is removed.
    pub async fn write_stream<S, B, E>(&self, job_id: &JobId, mut body: S) -> Result<PathBuf>
    where
        S: Stream<Item = std::result::Result<B, E>> + Unpin,
        B: AsRef<[u8]>,
        E: Display,
    {
        self.ensure_dir().await?;
        let path = self.path_for(job_id);

        let mut file = tokio::fs::File::create(&path)
            .await
            .map_err(|e| Error::admission(format!("Failed to save file: {}", e)))?;

        let mut written = 0usize;
        let outcome: Result<()> = async {
            while let Some(chunk) = body.next().await {
                let chunk = chunk
                    .map_err(|e| Error::fetch_failed(format!("Failed to read download: {}", e)))?;
                file.write_all(chunk.as_ref())
                    .await
                    .map_err(|e| Error::admission(format!("Failed to copy file: {}", e)))?;
                written += chunk.as_ref().len();
            }
            file.flush()
                .await
                .map_err(|e| Error::admission(format!("Failed to copy file: {}", e)))?;
            Ok(())
        }
        .await;

        drop(file);
        if let Err(e) = outcome {
            self.discard(&path).await;
            return Err(e);
        }

        tracing::debug!("Staged {} bytes at {}", written, path.display());
        Ok(path)
    }

    /// Best-effort removal of a staged file
    pub async fn discard(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!("Removed staged file {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove staged file {}: {}", path.display(), e),
        }
    }
}
