use std::collections::HashMap;

use invoicerag_core::{
    CollectionSpec, Embedding, SearchResult, Value, VectorStore, EMBEDDING_DIMENSION_KEY,
};

use crate::RetrievalError;

#[derive(Clone, Debug, PartialEq)]
pub struct RetrievedMatch {
    pub id: String,
    pub document: String,
    pub metadata: HashMap<String, Value>,
    pub score: f32,
}

impl RetrievedMatch {
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }
}

impl From<SearchResult> for RetrievedMatch {
    fn from(result: SearchResult) -> Self {
        Self {
            id: result.document.id,
            document: result.document.content,
            metadata: result.document.metadata,
            score: result.score,
        }
    }
}

/// Matches ordered best first. An empty result is valid.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RetrievalResult {
    pub matches: Vec<RetrievedMatch>,
}

impl RetrievalResult {
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RetrievedMatch> {
        self.matches.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.matches.iter().map(|m| m.id.as_str()).collect()
    }

    pub fn documents(&self) -> Vec<&str> {
        self.matches.iter().map(|m| m.document.as_str()).collect()
    }

    pub fn metadatas(&self) -> Vec<&HashMap<String, Value>> {
        self.matches.iter().map(|m| &m.metadata).collect()
    }
}

impl<'a> IntoIterator for &'a RetrievalResult {
    type Item = &'a RetrievedMatch;
    type IntoIter = std::slice::Iter<'a, RetrievedMatch>;

    fn into_iter(self) -> Self::IntoIter {
        self.matches.iter()
    }
}

pub struct Retriever<E, S> {
    embedder: E,
    store: S,
}

impl<E, S> Retriever<E, S>
where
    E: Embedding,
    S: VectorStore,
{
    pub fn new(embedder: E, store: S) -> Self {
        Self { embedder, store }
    }

    pub async fn retrieve(&self, query: &str, k: usize) -> Result<RetrievalResult, RetrievalError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::InvalidQuery);
        }
        if k == 0 {
            return Err(RetrievalError::InvalidTopK(k));
        }

        let embedding = self.embedder.embed(query).await?;
        let results = self.store.search(&embedding, k).await?;
        tracing::debug!(k, matches = results.len(), "retrieved");
        Ok(RetrievalResult {
            matches: results.into_iter().map(RetrievedMatch::from).collect(),
        })
    }

    /// Warns when the collection was built with a different embedding model or
    /// dimension than the one used for queries. Returns whether both agree.
    pub fn verify_model(&self, spec: &CollectionSpec) -> bool {
        let mut consistent = true;
        if let Some(recorded) = spec.embedding_model() {
            if recorded != self.embedder.model_id() {
                tracing::warn!(
                    collection = %spec.name,
                    recorded,
                    query_model = self.embedder.model_id(),
                    "collection was built with a different embedding model"
                );
                consistent = false;
            }
        }
        if let Some(recorded) = spec.metadata.get(EMBEDDING_DIMENSION_KEY).and_then(Value::as_u64) {
            if recorded as usize != self.embedder.dimension() {
                tracing::warn!(
                    collection = %spec.name,
                    recorded,
                    query_dimension = self.embedder.dimension(),
                    "collection embedding dimension differs from the query embedder"
                );
                consistent = false;
            }
        }
        consistent
    }
}
