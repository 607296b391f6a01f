//! Summary generation for extracted documents

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::sleep;

use super::pdf::ExtractedDocument;
use crate::config::SummarizerConfig;
use crate::error::{Error, Result};

/// Trait for summary generators
#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Produce a non-empty summary of the document
    async fn summarize(&self, document: &ExtractedDocument) -> Result<String>;

    /// Provider name for logs
    fn name(&self) -> &str;
}

#[derive(Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Upper bound on the wait between summarizer retries
const MAX_BACKOFF_SECS: u64 = 60;

fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(2u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS))
}

/// Summarizer backed by an Ollama `/api/generate` endpoint
pub struct OllamaSummarizer {
    client: Client,
    config: SummarizerConfig,
}

impl OllamaSummarizer {
    pub fn new(config: &SummarizerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(5)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config: config.clone(),
        })
    }

    /// Retry a request with exponential backoff
    async fn retry_request<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T>>,
    {
        let max_retries = self.config.max_retries;
        let mut last_error = None;

        for attempt in 0..=max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) => {
                    last_error = Some(e);
                    if attempt < max_retries {
                        let delay = backoff_delay(attempt);
                        tracing::warn!(
                            "Summarization request failed (attempt {}/{}), retrying in {:?}",
                            attempt + 1,
                            max_retries + 1,
                            delay
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Summarization("Unknown error".to_string())))
    }
}

#[async_trait]
impl Summarizer for OllamaSummarizer {
    async fn summarize(&self, document: &ExtractedDocument) -> Result<String> {
        let url = format!("{}/api/generate", self.config.base_url.trim_end_matches('/'));
        let prompt = build_prompt(document, self.config.max_input_chars);
        let model = self.config.model.clone();
        let temperature = self.config.temperature;

        tracing::info!(
            "Summarizing {} pages ({} chars) with model: {}",
            document.pages,
            document.text.len(),
            model
        );

        self.retry_request(|| {
            let url = url.clone();
            let prompt = prompt.clone();
            let model = model.clone();
            let client = self.client.clone();

            async move {
                let request = GenerateRequest {
                    model,
                    prompt,
                    stream: false,
                    options: GenerateOptions { temperature },
                };

                let response = client
                    .post(&url)
                    .json(&request)
                    .send()
                    .await
                    .map_err(|e| Error::Summarization(format!("Generation request failed: {}", e)))?;

                if !response.status().is_success() {
                    let status = response.status();
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::Summarization(format!(
                        "Generation failed: HTTP {} - {}",
                        status, body
                    )));
                }

                let generated: GenerateResponse = response.json().await.map_err(|e| {
                    Error::Summarization(format!("Failed to parse generation response: {}", e))
                })?;

                let summary = generated.response.trim().to_string();
                if summary.is_empty() {
                    return Err(Error::Summarization("Model returned an empty summary".to_string()));
                }
                Ok(summary)
            }
        })
        .await
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

const REVIEW_INSTRUCTIONS: &str = "You are an expert reviewer of academic papers. \
Summarize the full paper text provided below, following these instructions.

REVIEW INSTRUCTIONS:
1. Title and authors: give the title and the authors of the paper.
2. Main goal and core idea: state the main goal of the research and the hypothesis behind it in plain language.
3. Technical approach: explain the methodology, including the specific techniques, models or algorithms used.
4. Distinctive features: explain what sets this work apart from other studies in the field.
5. Experimental setup and results: describe the experiment design and summarize the key findings.
6. Strengths and limitations: discuss the benefits of the approach and its potential shortcomings.
7. Conclusion: wrap up the main points about the approach, its novelty, strengths and limitations.

OUTPUT INSTRUCTIONS:
1. Prefer headers that match the paper's own content over the generic headers above.
2. Format the output as clear, readable Markdown.
3. Output only the summary.";

/// Review-style prompt over the (possibly truncated) document text
pub fn build_prompt(document: &ExtractedDocument, max_input_chars: usize) -> String {
    let text = if document.has_text() {
        truncate_chars(&document.text, max_input_chars)
    } else {
        "(no extractable text: the PDF may be image-based)"
    };

    format!(
        "{}\n\nThe document has {} page(s). Full text:\n\n{}",
        REVIEW_INSTRUCTIONS, document.pages, text
    )
}

/// Cut `text` to at most `max_chars` characters on a char boundary
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
