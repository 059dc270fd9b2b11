/// Configuration module for the RAG worker core.
///
/// Handles loading, validating, and providing default configuration values.
/// Model identity and dimensionality are resolved here exactly once, when the
/// store singleton is built, and never change for the process lifetime.
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::store::backend::BackendKind;

// ── Default value functions ──────────────────────────────────────────

fn default_model_name() -> String {
    "sentence-transformers/all-MiniLM-L6-v2".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_top_k() -> usize {
    5
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_summarizer_model() -> String {
    "qwen2.5:3b".to_string()
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_snippets() -> usize {
    5
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub summarizer: SummarizerConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ModelConfig {
    #[serde(default = "default_model_name")]
    pub name: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Local directory holding the ONNX model and tokenizer files.
    /// Defaults to `models/<model basename>`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SearchConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    #[serde(default)]
    pub backend: BackendKind,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SummarizerConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_summarizer_model")]
    pub model: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_max_snippets")]
    pub max_snippets: usize,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model_name(),
            dimensions: default_dimensions(),
            dir: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            backend: BackendKind::default(),
        }
    }
}

impl Default for SummarizerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_summarizer_model(),
            timeout_secs: default_timeout_secs(),
            max_snippets: default_max_snippets(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist or contains invalid JSON, returns the
    /// default configuration.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            return Ok(Self::default());
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(!self.model.name.is_empty(), "model.name must not be empty");
        anyhow::ensure!(
            self.model.dimensions > 0,
            "model.dimensions must be positive"
        );
        anyhow::ensure!(self.search.top_k > 0, "search.top_k must be positive");
        anyhow::ensure!(
            self.summarizer.timeout_secs > 0,
            "summarizer.timeout_secs must be positive"
        );
        anyhow::ensure!(
            self.summarizer.max_snippets > 0,
            "summarizer.max_snippets must be positive"
        );
        Ok(())
    }
}

impl ModelConfig {
    /// Resolve the local model directory.
    ///
    /// Uses the configured `dir` when set, otherwise `models/<basename>`
    /// where the basename is the model name with any org prefix stripped.
    #[must_use]
    pub fn dir(&self) -> PathBuf {
        match &self.dir {
            Some(d) => PathBuf::from(d),
            None => {
                let basename = self.name.rsplit('/').next().unwrap_or(&self.name);
                PathBuf::from("models").join(basename)
            }
        }
    }
}
