//! Shared fixtures and test doubles for unit tests

use axum::{routing::get, Router};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::queue::WorkQueue;
use crate::storage::{RecordStore, SqliteRecordStore};
use crate::types::{JobRecord, NewJob};

/// Bytes of a tiny one-page PDF
pub const MINIMAL_PDF: &[u8] = b"%PDF-1.4
1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj
2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj
3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >> endobj
trailer << /Root 1 0 R >>
%%EOF
";

/// Build a real PDF with `pages` pages of text
pub fn sample_pdf(pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages);
    for n in 1..=pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("Quarterly report page {}", n))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let pages_dict = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => pages as i64,
        "Resources" => resources_id,
        "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages_dict));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// Serve `/docs/paper.pdf` on a throwaway port; every other path is a 404
pub async fn serve_pdfs() -> String {
    let app = Router::new().route("/docs/paper.pdf", get(|| async { MINIMAL_PDF.to_vec() }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Record store wrapper that can refuse placeholder inserts
pub struct FlakyStore {
    inner: SqliteRecordStore,
    fail_inserts: bool,
    inserts: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: SqliteRecordStore, fail_inserts: bool) -> Self {
        Self {
            inner,
            fail_inserts,
            inserts: AtomicUsize::new(0),
        }
    }

    /// Successful placeholder inserts so far
    pub fn inserts(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }
}

impl RecordStore for FlakyStore {
    fn insert_placeholder(&self, job: &NewJob) -> Result<()> {
        if self.fail_inserts {
            return Err(Error::store("connection refused"));
        }
        self.inner.insert_placeholder(job)?;
        self.inserts.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn get_job(&self, job_id: &str) -> Result<Option<JobRecord>> {
        self.inner.get_job(job_id)
    }

    fn complete_job(&self, job_id: &str, summary: &str, pages: u32) -> Result<bool> {
        self.inner.complete_job(job_id, summary, pages)
    }

    fn upsert_result(&self, job: &NewJob, summary: &str, pages: u32) -> Result<bool> {
        self.inner.upsert_result(job, summary, pages)
    }

    fn ping(&self) -> Result<()> {
        self.inner.ping()
    }
}

/// Queue whose every operation fails
#[derive(Default)]
pub struct FailingQueue {
    attempts: AtomicUsize,
}

impl FailingQueue {
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl WorkQueue for FailingQueue {
    fn push(&self, _entry: &str) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::queue("queue unavailable"))
    }

    fn pop(&self) -> Result<Option<String>> {
        Err(Error::queue("queue unavailable"))
    }

    fn len(&self) -> Result<usize> {
        Err(Error::queue("queue unavailable"))
    }

    fn ping(&self) -> Result<()> {
        Err(Error::queue("queue unavailable"))
    }

    fn key(&self) -> &str {
        "pdf_jobs"
    }
}
