//! Durable named-list queue in a SQLite file
//!
//! Several processes may open the same file: the server pushes, an
//! external worker pops. Each pop is a single `DELETE ... RETURNING`
//! statement, so two consumers never receive the same entry.

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::time::Duration;

use super::{QueueDiscipline, WorkQueue};
use crate::error::{Error, Result};

const POP_TAIL: &str = r#"
    DELETE FROM queue_entries
    WHERE id = (SELECT id FROM queue_entries WHERE queue = ?1 ORDER BY id ASC LIMIT 1)
    RETURNING payload
"#;

const POP_HEAD: &str = r#"
    DELETE FROM queue_entries
    WHERE id = (SELECT id FROM queue_entries WHERE queue = ?1 ORDER BY id DESC LIMIT 1)
    RETURNING payload
"#;

/// SQLite-backed list queue
pub struct SqliteListQueue {
    conn: Mutex<Connection>,
    key: String,
    discipline: QueueDiscipline,
}

impl SqliteListQueue {
    /// Create or open the queue database at the given path
    pub fn new<P: AsRef<Path>>(path: P, key: String, discipline: QueueDiscipline) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::queue(format!("Failed to open queue database: {}", e)))?;
        Self::with_connection(conn, key, discipline)
    }

    /// Create an in-memory queue
    pub fn in_memory(key: String, discipline: QueueDiscipline) -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::queue(format!("Failed to open in-memory queue: {}", e)))?;
        Self::with_connection(conn, key, discipline)
    }

    fn with_connection(conn: Connection, key: String, discipline: QueueDiscipline) -> Result<Self> {
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| Error::queue(format!("Failed to set busy timeout: {}", e)))?;

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;

            CREATE TABLE IF NOT EXISTS queue_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                queue TEXT NOT NULL,
                payload TEXT NOT NULL,
                enqueued_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_queue_entries_queue ON queue_entries(queue, id);
        "#,
        )
        .map_err(|e| Error::queue(format!("Failed to run queue migrations: {}", e)))?;

        Ok(Self {
            conn: Mutex::new(conn),
            key,
            discipline,
        })
    }
}

impl WorkQueue for SqliteListQueue {
    fn push(&self, entry: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO queue_entries (queue, payload, enqueued_at) VALUES (?1, ?2, ?3)",
            params![self.key, entry, Utc::now().to_rfc3339()],
        )
        .map_err(|e| Error::queue(format!("Failed to push to '{}': {}", self.key, e)))?;
        Ok(())
    }

    fn pop(&self) -> Result<Option<String>> {
        let sql = match self.discipline {
            QueueDiscipline::Fifo => POP_TAIL,
            QueueDiscipline::Lifo => POP_HEAD,
        };

        let conn = self.conn.lock();
        conn.query_row(sql, params![self.key], |row| row.get::<_, String>(0))
            .optional()
            .map_err(|e| Error::queue(format!("Failed to pop from '{}': {}", self.key, e)))
    }

    fn len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM queue_entries WHERE queue = ?1",
                params![self.key],
                |row| row.get(0),
            )
            .map_err(|e| Error::queue(format!("Failed to count '{}': {}", self.key, e)))?;
        Ok(count as usize)
    }

    fn ping(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| Error::queue(format!("Ping failed: {}", e)))?;
        Ok(())
    }

    fn key(&self) -> &str {
        &self.key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_fifo_order() {
        let queue = SqliteListQueue::in_memory("pdf_jobs".into(), QueueDiscipline::Fifo).unwrap();
        queue.push("first").unwrap();
        queue.push("second").unwrap();

        assert_eq!(queue.len().unwrap(), 2);
        assert_eq!(queue.pop().unwrap().as_deref(), Some("first"));
        assert_eq!(queue.pop().unwrap().as_deref(), Some("second"));
        assert_eq!(queue.pop().unwrap(), None);
        assert!(queue.is_empty().unwrap());
    }

    #[test]
    fn test_lifo_order() {
        let queue = SqliteListQueue::in_memory("pdf_jobs".into(), QueueDiscipline::Lifo).unwrap();
        queue.push("first").unwrap();
        queue.push("second").unwrap();

        assert_eq!(queue.pop().unwrap().as_deref(), Some("second"));
    }

    #[test]
    fn test_lists_are_isolated_by_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");
        let jobs = SqliteListQueue::new(&path, "pdf_jobs".into(), QueueDiscipline::Fifo).unwrap();
        let other = SqliteListQueue::new(&path, "other".into(), QueueDiscipline::Fifo).unwrap();

        jobs.push("a").unwrap();
        assert_eq!(other.len().unwrap(), 0);
        assert_eq!(other.pop().unwrap(), None);
        assert_eq!(jobs.len().unwrap(), 1);
    }

    #[test]
    fn test_producer_and_consumer_share_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");
        let producer = SqliteListQueue::new(&path, "pdf_jobs".into(), QueueDiscipline::Fifo).unwrap();
        let consumer = SqliteListQueue::new(&path, "pdf_jobs".into(), QueueDiscipline::Fifo).unwrap();

        producer.push("entry").unwrap();
        assert_eq!(consumer.pop().unwrap().as_deref(), Some("entry"));
        assert_eq!(producer.len().unwrap(), 0);
    }

    #[test]
    fn test_concurrent_pushes_are_not_lost() {
        let queue = Arc::new(
            SqliteListQueue::in_memory("pdf_jobs".into(), QueueDiscipline::Fifo).unwrap(),
        );

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let queue = Arc::clone(&queue);
                std::thread::spawn(move || {
                    for i in 0..25 {
                        queue.push(&format!("{}-{}", t, i)).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(queue.len().unwrap(), 200);
    }
}
