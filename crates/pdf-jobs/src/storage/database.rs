//! SQLite database for durable job rows

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::RecordStore;
use crate::error::{Error, Result};
use crate::types::{JobRecord, NewJob, Origin};

/// SQLite-based job record store
pub struct SqliteRecordStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteRecordStore {
    /// Create or open the database at the given path
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::store(format!("Failed to open database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Create an in-memory database
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::store(format!("Failed to open in-memory database: {}", e)))?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };

        db.migrate()?;
        Ok(db)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.conn.lock();

        // The worker process writes to the same file
        conn.busy_timeout(Duration::from_secs(5))
            .map_err(|e| Error::store(format!("Failed to set busy timeout: {}", e)))?;

        conn.execute_batch(
            r#"
            PRAGMA journal_mode=WAL;
            PRAGMA synchronous=NORMAL;
        "#,
        )
        .map_err(|e| Error::store(format!("Failed to set pragmas: {}", e)))?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS summaries (
                job_id TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                pages INTEGER NOT NULL DEFAULT 0,
                source TEXT NOT NULL,
                summary TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_summaries_created_at ON summaries(created_at);
        "#,
        )
        .map_err(|e| Error::store(format!("Failed to run migrations: {}", e)))?;

        tracing::debug!("Record store migrations complete");
        Ok(())
    }
}

impl RecordStore for SqliteRecordStore {
    fn insert_placeholder(&self, job: &NewJob) -> Result<()> {
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO summaries (job_id, filename, source, summary, created_at) VALUES (?1, ?2, ?3, '', ?4)",
            params![
                job.job_id.to_string(),
                job.filename,
                job.origin.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )
        .map_err(|e| Error::store(format!("Failed to insert placeholder: {}", e)))?;

        Ok(())
    }

    fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>> {
        let conn = self.conn.lock();

        let mut stmt = conn
            .prepare_cached(
                "SELECT job_id, filename, source, pages, summary, created_at FROM summaries WHERE job_id = ?1",
            )
            .map_err(|e| Error::store(format!("Failed to prepare query: {}", e)))?;

        let record = stmt
            .query_row(params![job_id], row_to_job_record)
            .optional()
            .map_err(|e| Error::store(format!("Failed to query job: {}", e)))?;

        Ok(record)
    }

    fn complete_job(&self, job_id: &str, summary: &str, pages: u32) -> Result<bool> {
        if summary.is_empty() {
            return Err(Error::invalid_input("Summary must not be empty"));
        }

        let conn = self.conn.lock();

        let updated = conn
            .execute(
                "UPDATE summaries SET pages = ?1, summary = ?2 WHERE job_id = ?3 AND summary = ''",
                params![pages as i64, summary, job_id],
            )
            .map_err(|e| Error::store(format!("Failed to update job: {}", e)))?;

        Ok(updated > 0)
    }

    fn upsert_result(&self, job: &NewJob, summary: &str, pages: u32) -> Result<bool> {
        if summary.is_empty() {
            return Err(Error::invalid_input("Summary must not be empty"));
        }

        let conn = self.conn.lock();

        let changed = conn
            .execute(
                r#"
                INSERT INTO summaries (job_id, filename, source, pages, summary, created_at)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(job_id) DO UPDATE SET
                    pages = excluded.pages,
                    summary = excluded.summary
                WHERE summaries.summary = ''
                "#,
                params![
                    job.job_id.to_string(),
                    job.filename,
                    job.origin.as_str(),
                    pages as i64,
                    summary,
                    Utc::now().to_rfc3339(),
                ],
            )
            .map_err(|e| Error::store(format!("Failed to upsert job result: {}", e)))?;

        Ok(changed > 0)
    }

    fn ping(&self) -> Result<()> {
        let conn = self.conn.lock();
        conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))
            .map_err(|e| Error::store(format!("Ping failed: {}", e)))?;
        Ok(())
    }
}

fn row_to_job_record(row: &rusqlite::Row) -> rusqlite::Result<JobRecord> {
    let source: String = row.get(2)?;
    let pages: i64 = row.get(3)?;
    let created_at_str: String = row.get(5)?;

    Ok(JobRecord {
        job_id: row.get(0)?,
        filename: row.get(1)?,
        origin: Origin::parse(&source).unwrap_or(Origin::Upload),
        pages: pages.max(0) as u32,
        summary: row.get(4)?,
        created_at: DateTime::parse_from_rfc3339(&created_at_str)
            .map(|d| d.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now()),
    })
}
