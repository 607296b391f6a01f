//! Worker side: consumes queued jobs, extracts PDF text, stores summaries
//!
//! The intake server only produces jobs. This module is the reference
//! consumer, run either as the `pdf-jobs-worker` binary or embedded in the
//! server process.

pub mod pdf;
mod summarizer;
mod worker;

pub use pdf::ExtractedDocument;
pub use summarizer::{build_prompt, OllamaSummarizer, Summarizer};
pub use worker::{JobConsumer, Outcome};
