//! Work queue: the hand-off channel between admission and the external worker
//!
//! A queue is a named list. Producers always push at the head; the
//! configured [`QueueDiscipline`] decides which end the consumer pops.

mod memory;
mod sqlite;

pub use memory::MemoryQueue;
pub use sqlite::SqliteListQueue;

use std::sync::Arc;

use crate::config::{QueueBackend, QueueConfig};
pub use crate::config::QueueDiscipline;
use crate::error::Result;

/// Trait for work queues carrying serialized job payloads
///
/// Implementations must serialize concurrent pushes so no entry is lost.
pub trait WorkQueue: Send + Sync {
    /// Push an entry at the head of the list
    fn push(&self, entry: &str) -> Result<()>;

    /// Pop one entry from the consuming end, if any
    fn pop(&self) -> Result<Option<String>>;

    /// Number of entries waiting
    fn len(&self) -> Result<usize>;

    /// Whether the list is empty
    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Cheap liveness check
    fn ping(&self) -> Result<()>;

    /// Name of the list
    fn key(&self) -> &str;
}

/// Open the queue backend selected in the configuration
pub fn open_queue(config: &QueueConfig) -> Result<Arc<dyn WorkQueue>> {
    let queue: Arc<dyn WorkQueue> = match config.backend {
        QueueBackend::Sqlite => Arc::new(SqliteListQueue::new(
            &config.path,
            config.key.clone(),
            config.discipline,
        )?),
        QueueBackend::Memory => Arc::new(MemoryQueue::new(config.key.clone(), config.discipline)),
    };

    tracing::info!(
        "Work queue ready (backend: {:?}, key: {}, discipline: {:?})",
        config.backend,
        config.key,
        config.discipline
    );
    Ok(queue)
}
