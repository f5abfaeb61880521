use invoicerag_core::{
    scalar_metadata, Chunk, Collection, CollectionSpec, CollectionStore, DistanceMetric,
    Embedding, VectorStore, EMBEDDING_DIMENSION_KEY, EMBEDDING_MODEL_KEY,
};

use crate::RetrievalError;

pub const DEFAULT_BATCH_SIZE: usize = 32;

/// A freshly built collection and the number of distinct records it holds.
pub struct BuiltIndex<S> {
    pub collection: Collection<S>,
    pub count: usize,
}

/// Embeds chunks and writes them into a recreated collection.
pub struct Indexer<E, C> {
    embedder: E,
    collections: C,
    metric: DistanceMetric,
}

impl<E, C> Indexer<E, C>
where
    E: Embedding,
    C: CollectionStore,
{
    pub fn new(embedder: E, collections: C) -> Self {
        Self {
            embedder,
            collections,
            metric: DistanceMetric::Cosine,
        }
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    /// Drops any existing collection called `collection_name`, then embeds and
    /// upserts `chunks` in batches of `batch_size`. The first failing batch
    /// aborts the build; batches already written stay in the collection.
    pub async fn build_index(
        &self,
        chunks: Vec<Chunk>,
        collection_name: &str,
        batch_size: usize,
    ) -> Result<BuiltIndex<C::Store>, RetrievalError> {
        if batch_size == 0 {
            return Err(RetrievalError::InvalidBatchSize(batch_size));
        }
        if let Some(chunk) = chunks.iter().find(|chunk| chunk.id.trim().is_empty()) {
            return Err(RetrievalError::InvalidId(chunk.id.clone()));
        }

        let spec = CollectionSpec::new(collection_name)
            .with_metric(self.metric)
            .with_metadata(EMBEDDING_MODEL_KEY, self.embedder.model_id())
            .with_metadata(EMBEDDING_DIMENSION_KEY, self.embedder.dimension());
        let collection = self.collections.create_or_replace(spec).await?;

        let total_batches = chunks.len().div_ceil(batch_size);
        tracing::info!(
            collection = collection_name,
            chunks = chunks.len(),
            batches = total_batches,
            "building index"
        );

        let mut chunks = chunks.into_iter().peekable();
        let mut batch_number = 0;
        while chunks.peek().is_some() {
            batch_number += 1;
            let batch: Vec<Chunk> = chunks.by_ref().take(batch_size).collect();
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let embeddings = self.embedder.embed_batch(&texts).await?;
            if embeddings.len() != batch.len() {
                return Err(RetrievalError::EmbeddingCount {
                    expected: batch.len(),
                    got: embeddings.len(),
                });
            }

            let docs = batch
                .into_iter()
                .zip(embeddings)
                .map(|(mut chunk, embedding)| {
                    let before = chunk.metadata.len();
                    chunk.metadata = scalar_metadata(chunk.metadata);
                    if chunk.metadata.len() < before {
                        tracing::debug!(id = %chunk.id, "dropped non-scalar metadata");
                    }
                    let mut doc = chunk.into_document();
                    doc.embedding = Some(embedding);
                    doc
                })
                .collect();
            collection.store.add(docs).await?;
            tracing::info!(
                batch = batch_number,
                total = total_batches,
                "indexed batch"
            );
        }

        let count = collection.store.count().await?;
        tracing::info!(collection = collection_name, count, "index built");
        Ok(BuiltIndex { collection, count })
    }
}
