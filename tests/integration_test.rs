/// End-to-end tests for the vector store pipeline.
///
/// Exercises the complete flow with the mock embedder:
///   insert → query → ranking, across both search backends.
use std::sync::Arc;

use ragworker::embedder::mock::MockEmbedder;
use ragworker::store::backend::BackendKind;
use ragworker::store::{Metadata, VectorStore};

fn store(kind: BackendKind) -> VectorStore {
    init_tracing();
    VectorStore::new(Arc::new(MockEmbedder::new(128)), kind)
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn texts(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

/// Inserting one item and querying its exact text returns it with
/// similarity 1.0 (self-similarity of a unit vector).
#[tokio::test]
async fn test_round_trip_self_similarity() {
    for kind in [BackendKind::Flat, BackendKind::BruteForce] {
        let store = store(kind);
        store
            .insert(texts(&["the quick brown fox"]), None, None)
            .await
            .unwrap();

        let results = store.query("the quick brown fox", 1).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "0");
        assert_eq!(results[0].text, "the quick brown fox");
        assert!(
            (results[0].score - 1.0).abs() < 1e-5,
            "self-similarity should be 1.0, got {}",
            results[0].score
        );
    }
}

#[tokio::test]
async fn test_empty_store_returns_no_results() {
    for kind in [BackendKind::Flat, BackendKind::BruteForce] {
        let store = store(kind);
        let results = store.query("anything at all", 50).await.unwrap();
        assert!(results.is_empty());
    }
}

/// top_k larger than the collection is clamped to the collection size.
#[tokio::test]
async fn test_top_k_clamped_to_collection_size() {
    let store = store(BackendKind::Flat);
    store
        .insert(texts(&["alpha", "beta", "gamma"]), None, None)
        .await
        .unwrap();

    let results = store.query("alpha", 10).await.unwrap();
    assert_eq!(results.len(), 3);

    // Descending score order
    for pair in results.windows(2) {
        assert!(pair[0].score >= pair[1].score);
    }
}

/// Auto-assigned ids count from the collection size before each batch.
#[tokio::test]
async fn test_id_auto_assignment_is_sequential() {
    let store = store(BackendKind::Flat);

    let inserted = store.insert(texts(&["one", "two"]), None, None).await.unwrap();
    assert_eq!(inserted, 2);
    store.insert(texts(&["three", "four"]), None, None).await.unwrap();

    let results = store.query("one", 4).await.unwrap();
    let mut ids: Vec<&str> = results.iter().map(|r| r.id.as_str()).collect();
    ids.sort_unstable();
    assert_eq!(ids, vec!["0", "1", "2", "3"]);

    // Exact text wins its own query
    assert_eq!(results[0].id, "0");
}

/// A colliding explicit id rejects the whole batch, leaving the
/// collection unchanged.
#[tokio::test]
async fn test_duplicate_id_rejects_whole_batch() {
    let store = store(BackendKind::Flat);
    store
        .insert(texts(&["first"]), None, Some(vec!["doc-1".to_string()]))
        .await
        .unwrap();

    let err = store
        .insert(
            texts(&["second", "third"]),
            None,
            Some(vec!["doc-2".to_string(), "doc-1".to_string()]),
        )
        .await;
    assert!(err.is_err());
    assert_eq!(store.len().await, 1);

    // The non-colliding id from the failed batch must not have landed
    let results = store.query("second", 5).await.unwrap();
    assert!(results.iter().all(|r| r.id != "doc-2"));
}

/// Flat and brute-force backends rank identically and agree on scores.
#[tokio::test]
async fn test_backend_equivalence() {
    let corpus = [
        "rust is a systems programming language",
        "the stock market fell sharply today",
        "a new language model was released",
        "rust prevents data races at compile time",
        "heavy rain expected over the weekend",
        "embedding vectors capture semantic meaning",
        "the championship game went to overtime",
    ];

    for n in 1..=corpus.len() {
        let flat = store(BackendKind::Flat);
        let brute = store(BackendKind::BruteForce);
        flat.insert(texts(&corpus[..n]), None, None).await.unwrap();
        brute.insert(texts(&corpus[..n]), None, None).await.unwrap();

        for query in ["rust language", "weather forecast", "semantic search"] {
            let a = flat.query(query, n).await.unwrap();
            let b = brute.query(query, n).await.unwrap();

            assert_eq!(a.len(), b.len(), "result count differs for n={n}");
            for (x, y) in a.iter().zip(&b) {
                assert_eq!(x.id, y.id, "ranking differs for n={n} query={query}");
                assert!(
                    (x.score - y.score).abs() < 1e-5,
                    "scores diverge for n={n}: {} vs {}",
                    x.score,
                    y.score
                );
            }
        }
    }
}

/// The parallel sequences stay aligned across mixed insert shapes.
#[tokio::test]
async fn test_alignment_after_mixed_inserts() {
    let store = store(BackendKind::Flat);

    store.insert(texts(&["a"]), None, None).await.unwrap();

    let mut meta = Metadata::new();
    meta.insert("lang".to_string(), serde_json::json!("en"));
    store
        .insert(
            texts(&["b", "c"]),
            Some(vec![meta.clone(), Metadata::new()]),
            Some(vec!["item-b".to_string(), "item-c".to_string()]),
        )
        .await
        .unwrap();

    store.insert(texts(&["d"]), None, None).await.unwrap();
    assert_eq!(store.len().await, 4);

    // Every stored item is reachable with its id, text, and metadata intact
    let results = store.query("b", 4).await.unwrap();
    assert_eq!(results.len(), 4);
    let b = results.iter().find(|r| r.text == "b").unwrap();
    assert_eq!(b.id, "item-b");
    assert_eq!(b.metadata, meta);

    // Auto id after an explicit-id batch still counts collection size
    let d = results.iter().find(|r| r.text == "d").unwrap();
    assert_eq!(d.id, "3");
}

/// Concurrent inserts and queries never observe a torn collection.
#[tokio::test]
async fn test_concurrent_insert_and_query() {
    let store = Arc::new(store(BackendKind::Flat));

    let mut tasks = Vec::new();
    for batch in 0..8 {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            let items: Vec<String> = (0..5).map(|i| format!("batch {batch} item {i}")).collect();
            store.insert(items, None, None).await.unwrap();
        }));
    }
    for reader in 0..4 {
        let store = Arc::clone(&store);
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                let results = store.query(&format!("item {reader}"), 100).await.unwrap();
                // Result count can never exceed the committed collection size
                assert!(results.len() <= 40);
            }
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(store.len().await, 40);
    let all = store.query("batch 0 item 0", 100).await.unwrap();
    assert_eq!(all.len(), 40);
}
