use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use invoicerag_core::{
    Chunk, CollectionStore, Embedding, EmbeddingError, Metadata, VectorStore,
};
use invoicerag_retrieval::{HashEmbedder, Indexer, LocalCollectionStore, RetrievalError};

fn chunk(id: &str, text: &str) -> Chunk {
    Chunk {
        id: id.to_string(),
        text: text.to_string(),
        metadata: Metadata::new(),
    }
}

fn chunks(n: usize) -> Vec<Chunk> {
    (0..n)
        .map(|i| chunk(&format!("invoice_{i}"), &format!("Invoice: invoice_{i}")))
        .collect()
}

/// Counts batch calls and fails on the configured call.
struct FlakyEmbedder {
    inner: HashEmbedder,
    calls: AtomicUsize,
    fail_on: Option<usize>,
}

impl FlakyEmbedder {
    fn new(fail_on: Option<usize>) -> Self {
        Self {
            inner: HashEmbedder::new(8),
            calls: AtomicUsize::new(0),
            fail_on,
        }
    }
}

#[async_trait]
impl Embedding for FlakyEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.inner.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_on == Some(call) {
            return Err(EmbeddingError::Provider("connection refused".to_string()));
        }
        self.inner.embed_batch(texts).await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}

/// Drops the last vector of every batch.
struct ShortEmbedder(HashEmbedder);

#[async_trait]
impl Embedding for ShortEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.0.embed(text).await
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut vectors = self.0.embed_batch(texts).await?;
        vectors.pop();
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.0.dimension()
    }

    fn model_id(&self) -> &str {
        self.0.model_id()
    }
}

#[tokio::test]
async fn indexer_counts_every_unique_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let indexer = Indexer::new(HashEmbedder::new(8), LocalCollectionStore::new(dir.path()));

    let built = indexer
        .build_index(chunks(5), "invoices_collection", 2)
        .await
        .unwrap();

    assert_eq!(built.count, 5);
    assert_eq!(built.collection.spec.embedding_model(), Some("hash-8"));
    assert_eq!(
        built.collection.spec.metadata.get("embedding_dimension"),
        Some(&json!(8))
    );
}

#[tokio::test]
async fn indexer_makes_one_embedding_call_per_batch() {
    let dir = tempfile::tempdir().unwrap();
    let embedder = Arc::new(FlakyEmbedder::new(None));
    let indexer = Indexer::new(embedder.clone(), LocalCollectionStore::new(dir.path()));

    indexer
        .build_index(chunks(70), "invoices_collection", 32)
        .await
        .unwrap();

    assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn indexer_rebuild_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let indexer = Indexer::new(HashEmbedder::new(8), LocalCollectionStore::new(dir.path()));

    let first = indexer
        .build_index(chunks(4), "invoices_collection", 32)
        .await
        .unwrap();
    let second = indexer
        .build_index(chunks(4), "invoices_collection", 32)
        .await
        .unwrap();

    assert_eq!(first.count, 4);
    assert_eq!(second.count, 4);
}

#[tokio::test]
async fn indexer_rebuild_replaces_previous_contents() {
    let dir = tempfile::tempdir().unwrap();
    let indexer = Indexer::new(HashEmbedder::new(8), LocalCollectionStore::new(dir.path()));

    indexer
        .build_index(chunks(6), "invoices_collection", 32)
        .await
        .unwrap();
    let rebuilt = indexer
        .build_index(chunks(2), "invoices_collection", 32)
        .await
        .unwrap();

    assert_eq!(rebuilt.count, 2);
}

#[tokio::test]
async fn indexer_duplicate_ids_collapse() {
    let dir = tempfile::tempdir().unwrap();
    let indexer = Indexer::new(HashEmbedder::new(8), LocalCollectionStore::new(dir.path()));

    let built = indexer
        .build_index(
            vec![
                chunk("invoice_0", "first"),
                chunk("invoice_1", "other"),
                chunk("invoice_0", "second"),
            ],
            "invoices_collection",
            1,
        )
        .await
        .unwrap();

    assert_eq!(built.count, 2);
}

#[tokio::test]
async fn indexer_results_do_not_depend_on_batch_size() {
    let embedder = HashEmbedder::new(8);
    let query = embedder.embed("Invoice: invoice_3").await.unwrap();

    let mut rankings = Vec::new();
    for batch_size in [1, 3, 32] {
        let dir = tempfile::tempdir().unwrap();
        let indexer = Indexer::new(embedder.clone(), LocalCollectionStore::new(dir.path()));
        let built = indexer
            .build_index(chunks(7), "invoices_collection", batch_size)
            .await
            .unwrap();
        assert_eq!(built.count, 7);

        let results = built.collection.store.search(&query, 3).await.unwrap();
        rankings.push(
            results
                .into_iter()
                .map(|r| r.document.id)
                .collect::<Vec<_>>(),
        );
    }

    assert_eq!(rankings[0][0], "invoice_3");
    assert_eq!(rankings[0], rankings[1]);
    assert_eq!(rankings[1], rankings[2]);
}

#[tokio::test]
async fn indexer_empty_input_creates_empty_collection() {
    let dir = tempfile::tempdir().unwrap();
    let collections = LocalCollectionStore::new(dir.path());
    let indexer = Indexer::new(HashEmbedder::new(8), collections.clone());

    let built = indexer
        .build_index(Vec::new(), "invoices_collection", 32)
        .await
        .unwrap();

    assert_eq!(built.count, 0);
    assert!(collections.open("invoices_collection").await.is_ok());
}

#[tokio::test]
async fn indexer_rejects_zero_batch_size() {
    let dir = tempfile::tempdir().unwrap();
    let indexer = Indexer::new(HashEmbedder::new(8), LocalCollectionStore::new(dir.path()));

    let err = indexer
        .build_index(chunks(1), "invoices_collection", 0)
        .await
        .err()
        .unwrap();

    assert!(matches!(err, RetrievalError::InvalidBatchSize(0)));
}

#[tokio::test]
async fn indexer_rejects_empty_id() {
    let dir = tempfile::tempdir().unwrap();
    let collections = LocalCollectionStore::new(dir.path());
    let indexer = Indexer::new(HashEmbedder::new(8), collections.clone());

    let err = indexer
        .build_index(vec![chunk("   ", "hello")], "invoices_collection", 32)
        .await
        .err()
        .unwrap();

    assert!(matches!(err, RetrievalError::InvalidId(id) if id.trim().is_empty()));
    assert!(collections.open("invoices_collection").await.is_err());
}

#[tokio::test]
async fn indexer_provider_failure_aborts_build() {
    let dir = tempfile::tempdir().unwrap();
    let collections = LocalCollectionStore::new(dir.path());
    let indexer = Indexer::new(FlakyEmbedder::new(Some(2)), collections.clone());

    let err = indexer
        .build_index(chunks(5), "invoices_collection", 2)
        .await
        .err()
        .unwrap();
    assert!(matches!(err, RetrievalError::Embedding(_)));

    let partial = collections.open("invoices_collection").await.unwrap();
    assert_eq!(partial.store.count().await.unwrap(), 2);
}

#[tokio::test]
async fn indexer_rejects_short_embedding_batches() {
    let dir = tempfile::tempdir().unwrap();
    let indexer = Indexer::new(
        ShortEmbedder(HashEmbedder::new(8)),
        LocalCollectionStore::new(dir.path()),
    );

    let err = indexer
        .build_index(chunks(3), "invoices_collection", 32)
        .await
        .err()
        .unwrap();

    assert!(matches!(
        err,
        RetrievalError::EmbeddingCount {
            expected: 3,
            got: 2
        }
    ));
}

#[tokio::test]
async fn indexer_drops_nested_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let indexer = Indexer::new(HashEmbedder::new(8), LocalCollectionStore::new(dir.path()));

    let mut nested = chunk("invoice_0", "Invoice: invoice_0");
    nested.metadata.insert("file_name".to_string(), json!("invoice_0.png"));
    nested.metadata.insert("source_index".to_string(), json!(0));
    nested.metadata.insert("structured_data".to_string(), json!({"total": 100}));
    nested.metadata.insert("tags".to_string(), json!(["a", "b"]));

    let built = indexer
        .build_index(vec![nested], "invoices_collection", 32)
        .await
        .unwrap();

    let query = HashEmbedder::new(8).embed("Invoice: invoice_0").await.unwrap();
    let results = built.collection.store.search(&query, 1).await.unwrap();
    let metadata = &results[0].document.metadata;
    assert_eq!(metadata.get("file_name"), Some(&json!("invoice_0.png")));
    assert_eq!(metadata.get("source_index"), Some(&json!(0)));
    assert!(!metadata.contains_key("structured_data"));
    assert!(!metadata.contains_key("tags"));
}
