//! In-memory vector store: items, embeddings, and nearest-neighbor queries.
//!
//! [`VectorStore`] owns four index-aligned parallel sequences (ids, texts,
//! metadatas, embeddings) plus a search backend mirroring the embeddings in
//! insertion order. One `RwLock` guards all of them, so a query can never
//! observe the backend and the canonical sequences disagreeing in length or
//! order. Embedding runs outside the lock; only the append and the search
//! itself take it.

pub mod backend;

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::embedder::{Embedder, EmbedderError};
use self::backend::{BackendKind, NO_MATCH, VectorBackend, new_backend};

/// Opaque per-item metadata, stored verbatim and never interpreted.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Errors surfaced by insert/query.
///
/// Validation failures are reported before any embedding work; embedding
/// failures propagate rather than degrade, since a zeroed or dropped vector
/// would corrupt the ranking.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("texts must not be empty")]
    EmptyBatch,

    #[error("{field} length {got} does not match texts length {expected}")]
    LengthMismatch {
        field: &'static str,
        got: usize,
        expected: usize,
    },

    #[error("duplicate id: {0}")]
    DuplicateId(String),

    #[error("embedding dimension {got} does not match store dimension {expected}")]
    DimensionMismatch { got: usize, expected: usize },

    #[error(transparent)]
    Embedding(#[from] EmbedderError),
}

/// One ranked query hit, JSON-serializable for host handlers.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub id: String,
    pub text: String,
    pub metadata: Metadata,
    pub score: f32,
}

/// Canonical collection state. All four sequences are index-aligned and the
/// backend holds the same vectors in the same insertion order.
struct Inner {
    ids: Vec<String>,
    texts: Vec<String>,
    metadatas: Vec<Metadata>,
    embeddings: Vec<Vec<f32>>,
    backend: Box<dyn VectorBackend>,
}

impl Inner {
    fn len(&self) -> usize {
        self.ids.len()
    }

    fn check_alignment(&self) {
        debug_assert_eq!(self.ids.len(), self.texts.len());
        debug_assert_eq!(self.ids.len(), self.metadatas.len());
        debug_assert_eq!(self.ids.len(), self.embeddings.len());
        debug_assert_eq!(self.ids.len(), self.backend.len());
    }
}

/// The embedding index.
///
/// Built once at process start (see [`crate::init_store`]) and shared by
/// handle for the process lifetime; state is in-memory only. Items are
/// append-only: there is no update-in-place and no delete.
pub struct VectorStore {
    embedder: Arc<dyn Embedder>,
    dimensions: usize,
    inner: RwLock<Inner>,
}

impl VectorStore {
    /// Create an empty store for the embedder's dimensionality.
    #[must_use]
    pub fn new(embedder: Arc<dyn Embedder>, kind: BackendKind) -> Self {
        let dimensions = embedder.dimensions();
        info!("Vector store initialized ({kind:?} backend, {dimensions} dimensions)");
        Self {
            embedder,
            dimensions,
            inner: RwLock::new(Inner {
                ids: Vec::new(),
                texts: Vec::new(),
                metadatas: Vec::new(),
                embeddings: Vec::new(),
                backend: new_backend(kind, dimensions),
            }),
        }
    }

    /// Insert a batch of texts, embedding them in one call.
    ///
    /// `metadatas` and `ids` must match `texts` in length when provided.
    /// Missing metadatas default to empty maps; missing ids are assigned as
    /// decimal strings counting from the collection size before the batch.
    /// An id collision (against stored items or within the batch) rejects
    /// the whole batch with the collection unchanged. Returns the number of
    /// items inserted.
    pub async fn insert(
        &self,
        texts: Vec<String>,
        metadatas: Option<Vec<Metadata>>,
        ids: Option<Vec<String>>,
    ) -> Result<usize, StoreError> {
        if texts.is_empty() {
            return Err(StoreError::EmptyBatch);
        }

        let metadatas = match metadatas {
            Some(m) if m.len() != texts.len() => {
                return Err(StoreError::LengthMismatch {
                    field: "metadatas",
                    got: m.len(),
                    expected: texts.len(),
                });
            }
            Some(m) => m,
            None => vec![Metadata::new(); texts.len()],
        };

        if let Some(ref ids) = ids {
            if ids.len() != texts.len() {
                return Err(StoreError::LengthMismatch {
                    field: "ids",
                    got: ids.len(),
                    expected: texts.len(),
                });
            }

            let mut seen = HashSet::new();
            for id in ids {
                if !seen.insert(id.as_str()) {
                    return Err(StoreError::DuplicateId(id.clone()));
                }
            }

            // Fail fast before paying for inference; rechecked under the
            // write lock, which is authoritative
            let inner = self.inner.read().await;
            if let Some(dup) = ids.iter().find(|id| inner.ids.contains(*id)) {
                return Err(StoreError::DuplicateId(dup.clone()));
            }
        }

        // Embed outside the lock: inference is slow and must not block readers
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = self.embedder.embed_batch(&refs)?;
        for v in &vectors {
            if v.len() != self.dimensions {
                return Err(StoreError::DimensionMismatch {
                    got: v.len(),
                    expected: self.dimensions,
                });
            }
        }

        let mut inner = self.inner.write().await;

        if let Some(ref ids) = ids {
            if let Some(dup) = ids.iter().find(|id| inner.ids.contains(*id)) {
                return Err(StoreError::DuplicateId(dup.clone()));
            }
        }

        let ids = ids.unwrap_or_else(|| {
            let start = inner.len();
            (start..start + texts.len()).map(|i| i.to_string()).collect()
        });

        // Single atomic step: backend first, then the canonical sequences,
        // all under the same write lock
        let count = texts.len();
        inner.backend.add(&vectors);
        inner.ids.extend(ids);
        inner.texts.extend(texts);
        inner.metadatas.extend(metadatas);
        inner.embeddings.extend(vectors);
        inner.check_alignment();

        info!("Inserted {count} items ({} total)", inner.len());
        Ok(count)
    }

    /// Query the `top_k` most similar items, best first.
    ///
    /// `top_k` is clamped to the collection size. An empty collection
    /// returns an empty result without invoking the embedder. Equal scores
    /// keep insertion order.
    pub async fn query(&self, text: &str, top_k: usize) -> Result<Vec<SearchResult>, StoreError> {
        if self.inner.read().await.ids.is_empty() {
            return Ok(Vec::new());
        }

        let query_vec = self.embedder.embed(text)?;

        let inner = self.inner.read().await;
        let effective_k = top_k.min(inner.len());
        let hits = inner.backend.search(&query_vec, effective_k);

        let results: Vec<SearchResult> = hits
            .into_iter()
            .filter(|&(idx, _)| idx != NO_MATCH)
            .map(|(idx, score)| SearchResult {
                id: inner.ids[idx].clone(),
                text: inner.texts[idx].clone(),
                metadata: inner.metadatas[idx].clone(),
                score,
            })
            .collect();

        debug!(
            "Query returned {} of {} requested results",
            results.len(),
            top_k
        );
        Ok(results)
    }

    /// Number of stored items.
    pub async fn len(&self) -> usize {
        self.inner.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::mock::MockEmbedder;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Counts embedder invocations to assert when embedding is skipped.
    struct CountingEmbedder {
        inner: MockEmbedder,
        calls: AtomicUsize,
    }

    impl CountingEmbedder {
        fn new() -> Self {
            Self {
                inner: MockEmbedder::new(64),
                calls: AtomicUsize::new(0),
            }
        }
    }

    impl Embedder for CountingEmbedder {
        fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed(text)
        }

        fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbedderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.embed_batch(texts)
        }

        fn dimensions(&self) -> usize {
            self.inner.dimensions()
        }
    }

    fn store() -> VectorStore {
        VectorStore::new(Arc::new(MockEmbedder::new(64)), BackendKind::Flat)
    }

    fn texts(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_empty_query_skips_embedder() {
        let embedder = Arc::new(CountingEmbedder::new());
        let store = VectorStore::new(embedder.clone(), BackendKind::Flat);

        let results = store.query("anything", 10).await.unwrap();
        assert!(results.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_validation_errors_before_embedding() {
        let embedder = Arc::new(CountingEmbedder::new());
        let store = VectorStore::new(embedder.clone(), BackendKind::Flat);

        let err = store.insert(Vec::new(), None, None).await.unwrap_err();
        assert!(matches!(err, StoreError::EmptyBatch));

        let err = store
            .insert(texts(&["a", "b"]), None, Some(vec!["only-one".to_string()]))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::LengthMismatch { field: "ids", .. }));

        let err = store
            .insert(texts(&["a"]), Some(vec![Metadata::new(), Metadata::new()]), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::LengthMismatch {
                field: "metadatas",
                ..
            }
        ));

        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_duplicate_id_within_batch_rejected() {
        let store = store();
        let err = store
            .insert(
                texts(&["a", "b"]),
                None,
                Some(vec!["x".to_string(), "x".to_string()]),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateId(id) if id == "x"));
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_auto_ids_count_from_collection_size() {
        let store = store();

        store.insert(texts(&["a", "b"]), None, None).await.unwrap();
        store.insert(texts(&["c", "d"]), None, None).await.unwrap();

        let results = store.query("c", 4).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
        assert!(ids.contains(&"0"));
        assert!(ids.contains(&"3"));

        // "c" is stored third, so its auto id is "2"
        let top = &results[0];
        assert_eq!(top.id, "2");
        assert_eq!(top.text, "c");
    }

    #[tokio::test]
    async fn test_metadata_stored_verbatim() {
        let store = store();

        let mut meta = Metadata::new();
        meta.insert("source".to_string(), serde_json::json!("rss"));
        meta.insert("rank".to_string(), serde_json::json!(3));

        store
            .insert(texts(&["hello"]), Some(vec![meta.clone()]), None)
            .await
            .unwrap();

        let results = store.query("hello", 1).await.unwrap();
        assert_eq!(results[0].metadata, meta);
    }
}
