use std::sync::Arc;

use async_trait::async_trait;

use crate::{Document, StoreError};

#[derive(Clone, Debug)]
pub struct SearchResult {
    pub document: Document,
    pub score: f32,
}

/// One open collection. `add` is an upsert keyed on document id.
#[async_trait]
pub trait VectorStore: Send + Sync {
    async fn add(&self, docs: Vec<Document>) -> Result<(), StoreError>;
    /// Results are ordered best first; higher score means more similar.
    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>, StoreError>;
    async fn delete(&self, ids: &[String]) -> Result<(), StoreError>;
    async fn count(&self) -> Result<usize, StoreError>;
}

#[async_trait]
impl<T> VectorStore for Arc<T>
where
    T: VectorStore + ?Sized,
{
    async fn add(&self, docs: Vec<Document>) -> Result<(), StoreError> {
        (**self).add(docs).await
    }

    async fn search(
        &self,
        query_embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>, StoreError> {
        (**self).search(query_embedding, top_k).await
    }

    async fn delete(&self, ids: &[String]) -> Result<(), StoreError> {
        (**self).delete(ids).await
    }

    async fn count(&self) -> Result<usize, StoreError> {
        (**self).count().await
    }
}
