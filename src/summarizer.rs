/// Summarizer collaborator backed by an Ollama-style generate endpoint.
///
/// Folds a query and the top retrieved snippets into one prompt and asks
/// the configured model for a natural-language answer. The network call is
/// bounded by the configured timeout. Failures surface as a `Result` here;
/// hosts that want the classic degrade-to-empty behavior use
/// [`Summarizer::summarize_or_empty`], which keeps that policy visible at
/// the boundary instead of swallowing errors inside the store.
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::SummarizerConfig;

/// Errors from the summarizer boundary. These never propagate out of
/// `summarize_or_empty`.
#[derive(Error, Debug)]
pub enum SummarizerError {
    #[error("http client error: {0}")]
    Client(String),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("bad status: {0}")]
    BadStatus(reqwest::StatusCode),
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    stream: bool,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: String,
}

/// Client for the generate endpoint of an Ollama-compatible server.
pub struct Summarizer {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    max_snippets: usize,
}

impl Summarizer {
    /// Build a summarizer from config; the HTTP client carries the timeout.
    pub fn new(config: &SummarizerConfig) -> Result<Self, SummarizerError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SummarizerError::Client(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            max_snippets: config.max_snippets,
        })
    }

    /// Fold the query and at most `max_snippets` snippets into one prompt.
    fn build_prompt(&self, query: &str, snippets: &[String]) -> String {
        let take = snippets.len().min(self.max_snippets);
        let context = snippets[..take].join("\n\n");
        format!(
            "You are a helpful assistant. Based on the following context, answer the query.\n\
             If context is insufficient, say so briefly.\n\n\
             Query: {query}\n\nContext:\n{context}\n\nAnswer concisely:"
        )
    }

    /// Ask the model to answer `query` grounded in `snippets`.
    pub async fn summarize(
        &self,
        query: &str,
        snippets: &[String],
    ) -> Result<String, SummarizerError> {
        let url = format!("{}/api/generate", self.endpoint);
        let body = GenerateRequest {
            model: &self.model,
            prompt: self.build_prompt(query, snippets),
            stream: false,
        };

        debug!("Summarizing query with {} snippets", snippets.len());

        let resp = self.client.post(&url).json(&body).send().await?;
        if !resp.status().is_success() {
            return Err(SummarizerError::BadStatus(resp.status()));
        }

        let data: GenerateResponse = resp.json().await?;
        Ok(data.response)
    }

    /// Like [`summarize`](Self::summarize), but any failure (timeout,
    /// network, bad status) degrades to an empty string.
    pub async fn summarize_or_empty(&self, query: &str, snippets: &[String]) -> String {
        match self.summarize(query, snippets).await {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Summarization failed, returning empty result: {e}");
                String::new()
            }
        }
    }
}
