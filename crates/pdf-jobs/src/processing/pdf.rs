//! Text and page extraction from staged PDFs

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};

/// pdf-extract can hang on unusual fonts
const EXTRACT_TIMEOUT: Duration = Duration::from_secs(60);

/// Text and page count read from a PDF
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedDocument {
    pub text: String,
    pub pages: u32,
}

impl ExtractedDocument {
    /// Whether any text could be extracted (image-only PDFs yield none)
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }
}

/// Extract text and page count from PDF bytes.
///
/// The page count comes from lopdf. Text comes from pdf-extract, falling
/// back to lopdf's own extractor when pdf-extract errors, panics or times out.
/// An unreadable document is an error; a readable one without text is not.
pub async fn extract(data: Vec<u8>) -> Result<ExtractedDocument> {
    let data = Arc::new(data);

    let doc = {
        let data = Arc::clone(&data);
        tokio::task::spawn_blocking(move || lopdf::Document::load_mem(&data))
            .await
            .map_err(|e| Error::Extraction(format!("PDF loader crashed: {}", e)))?
            .map_err(|e| Error::Extraction(format!("Failed to load PDF: {}", e)))?
    };
    let pages = doc.get_pages().len() as u32;

    let primary = {
        let data = Arc::clone(&data);
        tokio::time::timeout(
            EXTRACT_TIMEOUT,
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&data)),
        )
        .await
    };

    let raw = match primary {
        Ok(Ok(Ok(text))) => text,
        Ok(Ok(Err(e))) => {
            tracing::warn!("pdf-extract failed: {}, trying fallback", e);
            fallback_text(doc).await
        }
        Ok(Err(e)) => {
            tracing::error!("pdf-extract crashed: {}, trying fallback", e);
            fallback_text(doc).await
        }
        Err(_) => {
            tracing::error!("PDF extraction timeout after {:?}, trying fallback", EXTRACT_TIMEOUT);
            fallback_text(doc).await
        }
    };

    Ok(ExtractedDocument {
        text: clean_text(&raw),
        pages,
    })
}

async fn fallback_text(doc: lopdf::Document) -> String {
    let result = tokio::task::spawn_blocking(move || {
        let numbers: Vec<u32> = doc.get_pages().keys().copied().collect();
        doc.extract_text(&numbers)
    })
    .await;

    match result {
        Ok(Ok(text)) => text,
        Ok(Err(e)) => {
            tracing::warn!("Fallback extraction failed: {}", e);
            String::new()
        }
        Err(e) => {
            tracing::warn!("Fallback extraction crashed: {}", e);
            String::new()
        }
    }
}

/// Drop NUL characters and blank lines, trim each line
fn clean_text(raw: &str) -> String {
    raw.replace('\0', "")
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
