//! # ragworker — in-memory embedding index and semantic search core
//!
//! Library core of a RAG worker: embeds text items into L2-normalized
//! vectors, keeps them in memory alongside ids and metadata, and answers
//! nearest-neighbor queries by cosine similarity. Thin host handlers call
//! into [`store::VectorStore`] and [`summarizer::Summarizer`]; transport
//! and durable persistence live outside this crate.
//!
//! ## Architecture
//!
//! - **[`config`]** — Configuration loading, defaults, and validation
//! - **[`embedder`]** — Text embedding via ONNX Runtime (all-MiniLM-L6-v2)
//! - **[`store`]** — In-memory vector store with flat and brute-force backends
//! - **[`summarizer`]** — Ollama-backed answer generation over retrieved snippets

pub mod config;
pub mod embedder;
pub mod store;
pub mod summarizer;

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::Config;
use crate::embedder::onnx::OnnxEmbedder;
use crate::store::VectorStore;

/// Build the process-wide vector store.
///
/// Intended to be called exactly once at host startup: ensures the model
/// files are present, loads the ONNX embedder, and allocates an empty store
/// with the configured search backend. The returned handle is shared by all
/// callers for the process lifetime; state is in-memory only and is lost on
/// exit.
pub fn init_store(config: &Config) -> Result<Arc<VectorStore>> {
    config.validate()?;

    let model_dir = config.model.dir();
    embedder::download::download_model_files(&model_dir, &config.model.name)
        .context("failed to fetch model files")?;

    let embedder = OnnxEmbedder::new(&model_dir, config.model.dimensions)
        .context("failed to load embedder")?;

    Ok(Arc::new(VectorStore::new(
        Arc::new(embedder),
        config.search.backend,
    )))
}
